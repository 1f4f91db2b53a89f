#![allow(clippy::result_large_err)]

use std::io::ErrorKind;
use std::process::ExitCode;

use clap::Parser;
use miette::Diagnostic;
use miette::NamedSource;
use miette::Result;
use miette::SourceSpan;
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;
use url::Url;

use crate::asserter::ClassifyMode;
use crate::asserter::Verdict;
use crate::asserter::classify;
use crate::cli::Cli;
use crate::cli::Command;
use crate::cli::ProbeArgs;
use crate::outputter::OutPutter;
use crate::parser::Settings;
use crate::probe::ProbeResult;
use crate::runner::Runner;
use crate::runner::RunnerError;
use crate::validator::ValidationError;
use crate::validator::Validator;
use crate::validator::require_target;

mod asserter;
mod cli;
mod clipboard;
mod outputter;
mod parser;
mod probe;
mod runner;
mod share;
mod validator;

const DEFAULT_SETTINGS_PATH: &str = "cors-probe.toml";

#[derive(Error, Debug, Diagnostic)]
pub enum CorsProbeError {
    #[error("Failed to read settings file `{0}`")]
    FileError(String, #[source] std::io::Error),

    #[error("Failed to parse settings file: {message}")]
    TomlParsing {
        message: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("here")]
        span: Option<SourceSpan>,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    ValidationError(#[from] ValidationError),

    #[error("Failed to run probe: {0}")]
    RunnerError(#[from] RunnerError),

    #[error("Failed to print result")]
    OutputError(#[from] serde_json::Error),
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "cors_probe=debug"
    } else {
        "cors_probe=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Reads the settings file if there is one. The default path is optional; a
/// path given with `--config` must exist.
fn load_settings(cli: &Cli) -> Result<Validator, CorsProbeError> {
    let path = cli.config.as_deref().unwrap_or(DEFAULT_SETTINGS_PATH);

    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound && cli.config.is_none() => {
            return Ok(Validator::empty());
        }
        Err(e) => return Err(CorsProbeError::FileError(path.to_string(), e)),
    };

    let settings: Settings =
        toml::from_str(&contents).map_err(|e| CorsProbeError::TomlParsing {
            message: e.message().to_string(),
            span: e.span().map(SourceSpan::from),
            src: NamedSource::new(path, contents.clone()),
        })?;

    info!(path, "loaded settings");
    Ok(Validator::new(settings, &contents, path))
}

async fn copy_link(link: &Url) {
    match clipboard::copy(link.as_str()).await {
        Ok(_) => OutPutter::copied_notice().await,
        Err(error) => OutPutter::copy_failed(&error),
    }
}

async fn run_test(
    validator: &Validator,
    app_origin: &Url,
    probe: &ProbeArgs,
    strict: bool,
    json: bool,
    copy: bool,
) -> Result<ExitCode, CorsProbeError> {
    let config = validator.probe_config(probe)?;
    require_target(&config)?;

    let runner = Runner::new(app_origin.origin().ascii_serialization());

    let spinner = (!json).then(OutPutter::spinner);
    let result = runner.run(&config).await?;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    let mode = if strict {
        ClassifyMode::AllowOrigin
    } else {
        ClassifyMode::Status
    };
    let verdict = classify(&result, mode, config.effective_origin(runner.own_origin()));
    info!(?verdict, ?mode, "probe finished");

    if json {
        OutPutter::print_json(&result)?;
    } else {
        OutPutter::print_result(&result, verdict);
    }

    // Only a probe that reached the server is worth sharing
    if matches!(result, ProbeResult::Success { .. }) {
        let link = share::encode(&config, app_origin);
        if !json {
            OutPutter::print_share_link(&link);
        }
        if copy {
            copy_link(&link).await;
        }
    }

    Ok(match verdict {
        Verdict::Pass => ExitCode::SUCCESS,
        Verdict::Fail => ExitCode::FAILURE,
    })
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let validator = load_settings(&cli)?;
    let app_origin = validator
        .app_origin(cli.app_origin.as_deref())
        .map_err(CorsProbeError::from)?;

    let code = match &cli.command {
        Command::Test {
            probe,
            strict,
            json,
            copy,
        } => run_test(&validator, &app_origin, probe, *strict, *json, *copy).await?,

        Command::Share { probe, copy } => {
            let config = validator
                .probe_config(probe)
                .map_err(CorsProbeError::from)?;
            let link = share::encode(&config, &app_origin);
            println!("{link}");
            if *copy {
                copy_link(&link).await;
            }
            ExitCode::SUCCESS
        }

        Command::Inspect { link } => {
            let config = share::decode(link).apply(Default::default());
            OutPutter::print_config(&config);
            ExitCode::SUCCESS
        }
    };

    Ok(code)
}
