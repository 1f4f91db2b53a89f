use std::error::Error as StdError;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use indexmap::IndexMap;
use reqwest::Client;
use reqwest::Request;
use reqwest::Response;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderName;
use reqwest::header::HeaderValue;
use reqwest::header::ORIGIN;
use thiserror::Error;
use tracing::debug;
use tracing::warn;

use crate::probe::ALLOW_CREDENTIALS;
use crate::probe::ALLOW_HEADERS;
use crate::probe::ALLOW_METHODS;
use crate::probe::ALLOW_ORIGIN;
use crate::probe::CorsHeaders;
use crate::probe::ProbeBody;
use crate::probe::ProbeConfig;
use crate::probe::ProbeResult;

const GENERIC_FAILURE: &str = "An error occurred while testing CORS";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RunnerError {
    #[error("a probe is already in flight")]
    AlreadyRunning,
}

#[derive(Error, Debug)]
enum BuildError {
    #[error("invalid header name `{0}`")]
    HeaderName(String),

    #[error("invalid value for header `{0}`")]
    HeaderValue(String),

    #[error(transparent)]
    Request(#[from] reqwest::Error),
}

/// Issues probes on behalf of one session. Only one probe may be in flight at
/// a time; a second call while busy is rejected rather than queued.
pub struct Runner {
    client: Client,
    own_origin: String,
    busy: AtomicBool,
}

/// Clears the busy flag when the in-flight probe finishes, however it ends.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Runner {
    pub fn new(own_origin: impl Into<String>) -> Self {
        Self::with_client(Client::new(), own_origin)
    }

    pub fn with_client(client: Client, own_origin: impl Into<String>) -> Self {
        Self {
            client,
            own_origin: own_origin.into(),
            busy: AtomicBool::new(false),
        }
    }

    pub fn own_origin(&self) -> &str {
        &self.own_origin
    }

    pub async fn run(&self, config: &ProbeConfig) -> Result<ProbeResult, RunnerError> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(RunnerError::AlreadyRunning);
        }
        let _guard = BusyGuard(&self.busy);

        Ok(execute(&self.client, config, &self.own_origin).await)
    }
}

/// Builds and sends one probe. Every failure ends up in
/// [`ProbeResult::Failure`]; nothing is returned as an error.
pub async fn execute(client: &Client, config: &ProbeConfig, own_origin: &str) -> ProbeResult {
    let request = match build_request(client, config, own_origin) {
        Ok(request) => request,
        Err(err) => return failure(&err),
    };

    debug!(method = %request.method(), url = %request.url(), "sending probe");

    let response = match client.execute(request).await {
        Ok(response) => response,
        Err(err) => return failure(&err),
    };

    match capture(response).await {
        Ok(result) => result,
        Err(err) => failure(&err),
    }
}

fn build_request(
    client: &Client,
    config: &ProbeConfig,
    own_origin: &str,
) -> Result<Request, BuildError> {
    let mut headers = HeaderMap::new();

    for (key, value) in &config.extra_headers {
        let name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|_| BuildError::HeaderName(key.clone()))?;

        // The probe exists to control this value.
        if name == ORIGIN {
            warn!(header = %key, "ignoring Origin in extra headers");
            continue;
        }

        let value =
            HeaderValue::from_str(value).map_err(|_| BuildError::HeaderValue(key.clone()))?;
        headers.insert(name, value);
    }

    let origin = config.effective_origin(own_origin);
    let origin =
        HeaderValue::from_str(origin).map_err(|_| BuildError::HeaderValue(ORIGIN.to_string()))?;
    headers.insert(ORIGIN, origin);

    let builder = client
        .request(config.method.into(), config.target_url.trim())
        .headers(headers);

    let builder = match config.request_body() {
        Some(body) => builder.body(body),
        None => builder,
    };

    Ok(builder.build()?)
}

async fn capture(response: Response) -> Result<ProbeResult, reqwest::Error> {
    let status = response.status();
    let headers = response.headers().clone();

    debug!(status = status.as_u16(), "probe response received");

    // Consume the body exactly once
    let body_text = response.text().await?;

    Ok(ProbeResult::Success {
        status: status.as_u16(),
        status_text: status.canonical_reason().unwrap_or_default().to_string(),
        cors_headers: cors_headers(&headers),
        all_headers: all_headers(&headers),
        body: ProbeBody::from_text(body_text),
    })
}

fn cors_headers(headers: &HeaderMap) -> CorsHeaders {
    let get = |name: &str| {
        headers
            .get(name)
            .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
    };

    CorsHeaders {
        allow_origin: get(ALLOW_ORIGIN),
        allow_methods: get(ALLOW_METHODS),
        allow_headers: get(ALLOW_HEADERS),
        allow_credentials: get(ALLOW_CREDENTIALS),
    }
}

fn all_headers(headers: &HeaderMap) -> IndexMap<String, String> {
    let mut all: IndexMap<String, String> = IndexMap::new();

    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes());
        all.entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert_with(|| value.into_owned());
    }

    all
}

fn failure(err: &(dyn StdError + 'static)) -> ProbeResult {
    let mut parts = vec![err.to_string()];
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !text.is_empty() && !parts.contains(&text) {
            parts.push(text);
        }
        source = cause.source();
    }
    parts.retain(|part| !part.is_empty());

    let message = if parts.is_empty() {
        GENERIC_FAILURE.to_string()
    } else {
        parts.join(": ")
    };

    debug!(%message, "probe failed");
    ProbeResult::Failure { message }
}
