use core::fmt;
use std::fmt::Display;

use crate::probe::ProbeResult;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Verdict {
    Pass,
    Fail,
}

/// How a [`ProbeResult`] is turned into a [`Verdict`].
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub enum ClassifyMode {
    /// Pass only on HTTP 200. This says nothing about CORS correctness: a 200
    /// without any `Access-Control-Allow-Origin` still passes, and a preflight
    /// answered with 204 fails.
    #[default]
    Status,
    /// Pass when `Access-Control-Allow-Origin` is `*` or echoes the origin
    /// that was sent, whatever the status code.
    AllowOrigin,
}

impl Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Pass => write!(
                f,
                "{} {}",
                console::style("✔").green().bold(),
                console::style("Pass").green().bold()
            ),
            Verdict::Fail => write!(
                f,
                "{} {}",
                console::style("✘").red().bold(),
                console::style("Fail").red().bold()
            ),
        }
    }
}

pub fn classify(result: &ProbeResult, mode: ClassifyMode, sent_origin: &str) -> Verdict {
    let ProbeResult::Success {
        status,
        cors_headers,
        ..
    } = result
    else {
        return Verdict::Fail;
    };

    let passed = match mode {
        ClassifyMode::Status => *status == 200,
        ClassifyMode::AllowOrigin => cors_headers
            .allow_origin
            .as_deref()
            .map(str::trim)
            .is_some_and(|allowed| allowed == "*" || allowed == sent_origin),
    };

    if passed { Verdict::Pass } else { Verdict::Fail }
}

#[cfg(test)]
mod test {
    use indexmap::IndexMap;

    use super::*;
    use crate::probe::CorsHeaders;
    use crate::probe::ProbeBody;

    const SENT: &str = "https://app.test";

    fn response(status: u16, allow_origin: Option<&str>) -> ProbeResult {
        ProbeResult::Success {
            status,
            status_text: String::new(),
            cors_headers: CorsHeaders {
                allow_origin: allow_origin.map(str::to_string),
                ..Default::default()
            },
            all_headers: IndexMap::new(),
            body: ProbeBody::Text(String::new()),
        }
    }

    #[test]
    fn status_mode_only_passes_200() {
        assert_eq!(classify(&response(200, None), ClassifyMode::Status, SENT), Verdict::Pass);

        for status in [201, 204, 301, 403, 404, 500] {
            assert_eq!(
                classify(&response(status, Some("*")), ClassifyMode::Status, SENT),
                Verdict::Fail,
                "status {status}"
            );
        }
    }

    #[test]
    fn failures_never_pass() {
        let failure = ProbeResult::Failure {
            message: "refused".into(),
        };

        assert_eq!(classify(&failure, ClassifyMode::Status, SENT), Verdict::Fail);
        assert_eq!(classify(&failure, ClassifyMode::AllowOrigin, SENT), Verdict::Fail);
    }

    #[test]
    fn allow_origin_mode_checks_the_header() {
        let mode = ClassifyMode::AllowOrigin;

        assert_eq!(classify(&response(204, Some("*")), mode, SENT), Verdict::Pass);
        assert_eq!(classify(&response(500, Some(SENT)), mode, SENT), Verdict::Pass);
        assert_eq!(
            classify(&response(200, Some("https://other.test")), mode, SENT),
            Verdict::Fail
        );
        assert_eq!(classify(&response(200, None), mode, SENT), Verdict::Fail);
    }
}
