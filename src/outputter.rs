use std::fmt::Write;
use std::time::Duration;

use console::Style;
use console::Term;
use indicatif::ProgressBar;
use indicatif::ProgressStyle;
use url::Url;

use crate::asserter::Verdict;
use crate::probe::ProbeBody;
use crate::probe::ProbeConfig;
use crate::probe::ProbeResult;

const NOTICE_DURATION: Duration = Duration::from_secs(3);

pub struct OutPutter;

impl OutPutter {
    /// Spinner shown while the probe is in flight.
    pub fn spinner() -> ProgressBar {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(style);
        }
        spinner.set_message("Testing...");
        spinner.enable_steady_tick(Duration::from_millis(80));
        spinner
    }

    pub fn print_result(result: &ProbeResult, verdict: Verdict) {
        print!("{}", render_result(result, verdict));
    }

    /// The result exactly as the web tester showed it.
    pub fn print_json(result: &ProbeResult) -> serde_json::Result<()> {
        println!("{}", serde_json::to_string_pretty(result)?);
        Ok(())
    }

    pub fn print_share_link(link: &Url) {
        println!();
        println!("{}", console::style("Share Link").bold().cyan());
        println!("  {link}");
    }

    pub fn print_config(config: &ProbeConfig) {
        print!("{}", render_config(config));
    }

    /// Shows the copy confirmation for a few seconds on a terminal, or once
    /// when stderr is not one. Stdout stays reserved for results and links.
    pub async fn copied_notice() {
        let text = format!(
            "{} Link copied to clipboard!",
            console::style("ℹ").cyan().bold()
        );
        let term = notice_term();

        if !term.is_term() {
            eprintln!("{text}");
            return;
        }

        if term.write_line(&text).is_ok() {
            tokio::time::sleep(NOTICE_DURATION).await;
            let _ = term.clear_last_lines(1);
        }
    }

    pub fn copy_failed(error: &dyn std::fmt::Display) {
        eprintln!(
            "{} could not copy the link: {error}",
            console::style("⚠").yellow().bold()
        );
    }
}

fn notice_term() -> Term {
    Term::stderr()
}

fn render_result(result: &ProbeResult, verdict: Verdict) -> String {
    let mut out = String::new();
    let heading = Style::new().bold();
    let key = Style::new().yellow().bold();

    let _ = writeln!(out, "{}  {verdict}", heading.apply_to("Result"));

    match result {
        ProbeResult::Failure { message } => {
            let _ = writeln!(
                out,
                "  {} {}",
                console::style("Request failed with error:").red(),
                console::style(message).red().bold()
            );
        }
        ProbeResult::Success {
            status,
            status_text,
            cors_headers,
            all_headers,
            body,
        } => {
            let _ = writeln!(out, "  Status: {status} {status_text}");

            let _ = writeln!(out, "\n  {}", heading.apply_to("CORS headers"));
            for (name, value) in cors_headers.entries() {
                match value {
                    Some(value) => {
                        let _ = writeln!(out, "    {}: {value}", key.apply_to(name));
                    }
                    None => {
                        let _ = writeln!(
                            out,
                            "    {}: {}",
                            key.apply_to(name),
                            console::style("<not set>").dim()
                        );
                    }
                }
            }

            let _ = writeln!(out, "\n  {}", heading.apply_to("All headers"));
            for (name, value) in all_headers {
                let _ = writeln!(out, "    {}: {value}", key.apply_to(name));
            }

            let _ = writeln!(out, "\n  {}", heading.apply_to("Body"));
            let body = match body {
                ProbeBody::Json(value) => {
                    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
                }
                ProbeBody::Text(text) if text.is_empty() => {
                    console::style("<empty>").dim().to_string()
                }
                ProbeBody::Text(text) => text.clone(),
            };
            for line in body.lines() {
                let _ = writeln!(out, "    {line}");
            }
        }
    }

    out
}

fn render_config(config: &ProbeConfig) -> String {
    let mut out = String::new();
    let key = Style::new().yellow().bold();
    let unset = console::style("<not set>").dim().to_string();
    let or_unset = |value: &str| {
        if value.is_empty() {
            unset.clone()
        } else {
            value.to_string()
        }
    };

    let _ = writeln!(out, "{} {}", key.apply_to("URL:"), or_unset(&config.target_url));
    let _ = writeln!(out, "{} {}", key.apply_to("Origin:"), or_unset(&config.origin_header));
    let _ = writeln!(out, "{} {}", key.apply_to("Method:"), config.method);

    let _ = writeln!(out, "{}", key.apply_to("Headers:"));
    if config.extra_headers.is_empty() {
        let _ = writeln!(out, "  {unset}");
    }
    for (name, value) in &config.extra_headers {
        let _ = writeln!(out, "  {name}: {value}");
    }

    let _ = writeln!(out, "{} {}", key.apply_to("Body type:"), config.body_mode);
    if !config.graphql_query.is_empty() {
        let _ = writeln!(out, "{} {}", key.apply_to("GraphQL:"), config.graphql_query);
    }
    if !config.raw_body.is_empty() {
        let _ = writeln!(out, "{} {}", key.apply_to("Raw body:"), config.raw_body);
    }

    out
}
