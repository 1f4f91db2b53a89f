use indexmap::IndexMap;
use miette::Diagnostic;
use miette::NamedSource;
use miette::SourceSpan;
use reqwest::header::HeaderName;
use reqwest::header::HeaderValue;
use thiserror::Error;
use url::Url;

use crate::cli::ProbeArgs;
use crate::parser::Settings;
use crate::probe::BodyMode;
use crate::probe::HttpMethod;
use crate::probe::ProbeConfig;
use crate::probe::ProbeOverrides;
use crate::share;

pub const DEFAULT_APP_ORIGIN: &str = "http://localhost:3000";

const METHOD_HELP: &str = "expected one of GET, POST, OPTIONS, PUT, PATCH, DELETE";
const BODY_TYPE_HELP: &str = "expected one of none, graphql, raw";
const HEADER_FORMAT: &str = "expected `Name: value`";

/// Turns command line flags, a shared link and the settings file into a
/// [`ProbeConfig`]. Flags win over the link, the link wins over the file.
pub struct Validator {
    settings: Settings,
    toml_src: String,
    file_name: String,
}

#[derive(Debug, Error, Diagnostic)]
#[error("Invalid field `{field}`: {message}")]
pub struct ValidationError {
    field: String,
    message: String,
    #[source_code]
    src: Option<NamedSource<String>>,
    #[label("invalid value here")]
    span: Option<SourceSpan>,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            src: None,
            span: None,
        }
    }
}

macro_rules! validation_err {
    ($field:expr, $msg:expr, $self:expr, $snippet:expr) => {
        ValidationError {
            field: $field.to_string(),
            message: $msg.to_string(),
            src: Some(NamedSource::new(
                $self.file_name.clone(),
                $self.toml_src.clone(),
            )),
            span: find_span($snippet, &$self.toml_src),
        }
    };
}

impl Validator {
    pub fn new(settings: Settings, toml_src: &str, file_name: &str) -> Self {
        Self {
            settings,
            toml_src: toml_src.into(),
            file_name: file_name.into(),
        }
    }

    /// A validator with no settings file behind it.
    pub fn empty() -> Self {
        Self::new(Settings::default(), "", "")
    }

    /// Our own origin, used as the share link base and as the fallback
    /// `Origin` header.
    pub fn app_origin(&self, flag: Option<&str>) -> Result<Url, ValidationError> {
        let (value, from_file) = match (flag, self.settings.app.origin.as_deref()) {
            (Some(value), _) => (value, false),
            (None, Some(value)) => (value, true),
            (None, None) => (DEFAULT_APP_ORIGIN, false),
        };

        let error = |message: String| {
            if from_file {
                validation_err!("app.origin", message, self, value)
            } else {
                ValidationError::new("app-origin", message)
            }
        };

        let url = Url::parse(value.trim()).map_err(|e| error(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(error("expected an http(s) origin such as https://example.com".into()));
        }

        Ok(url)
    }

    pub fn probe_config(&self, args: &ProbeArgs) -> Result<ProbeConfig, ValidationError> {
        let from_file = self.file_config()?;

        let from_link = match &args.link {
            Some(link) => share::decode(link).apply(from_file),
            None => from_file,
        };

        let mut flags = ProbeOverrides {
            target_url: args.url.clone(),
            origin_header: args.origin.clone(),
            graphql_query: args.graphql.clone(),
            raw_body: args.raw_body.clone(),
            ..Default::default()
        };

        if let Some(method) = &args.method {
            flags.method = Some(
                method
                    .parse::<HttpMethod>()
                    .map_err(|e| ValidationError::new("method", format!("{e}, {METHOD_HELP}")))?,
            );
        }

        if let Some(body_type) = &args.body_type {
            flags.body_mode = Some(body_type.parse::<BodyMode>().map_err(|e| {
                ValidationError::new("body-type", format!("{e}, {BODY_TYPE_HELP}"))
            })?);
        }

        if !args.headers.is_empty() {
            let mut headers = from_link.extra_headers.clone();
            for raw in &args.headers {
                let (name, value) = parse_header_flag(raw)?;
                headers.insert(name, value);
            }
            flags.extra_headers = Some(headers);
        }

        Ok(flags.apply(from_link))
    }

    fn file_config(&self) -> Result<ProbeConfig, ValidationError> {
        let probe = &self.settings.probe;
        let mut config = ProbeConfig {
            target_url: probe.url.clone().unwrap_or_default(),
            origin_header: probe.origin.clone().unwrap_or_default(),
            graphql_query: probe.graphql.clone().unwrap_or_default(),
            raw_body: probe.raw_body.clone().unwrap_or_default(),
            ..Default::default()
        };

        if let Some(method) = &probe.method {
            config.method = method.parse::<HttpMethod>().map_err(|e| {
                validation_err!("probe.method", format!("{e}, {METHOD_HELP}"), self, method)
            })?;
        }

        if let Some(body_type) = &probe.body_type {
            config.body_mode = body_type.parse::<BodyMode>().map_err(|e| {
                validation_err!("probe.body_type", format!("{e}, {BODY_TYPE_HELP}"), self, body_type)
            })?;
        }

        if let Some(headers) = &probe.headers {
            let mut checked = IndexMap::new();
            for (name, value) in headers {
                check_header(name, value).map_err(|message| ValidationError {
                    field: format!("probe.headers.{name}"),
                    message,
                    src: Some(NamedSource::new(
                        self.file_name.clone(),
                        self.toml_src.clone(),
                    )),
                    span: find_key_span(&self.toml_src, name),
                })?;
                checked.insert(name.clone(), value.clone());
            }
            config.extra_headers = checked;
        }

        Ok(config)
    }
}

/// The probe must have somewhere to go before anything is sent.
pub fn require_target(config: &ProbeConfig) -> Result<(), ValidationError> {
    if config.target_url.trim().is_empty() {
        return Err(ValidationError::new(
            "url",
            "please enter a URL to test (--url, a share link or the settings file)",
        ));
    }

    Ok(())
}

fn parse_header_flag(raw: &str) -> Result<(String, String), ValidationError> {
    let Some((name, value)) = raw.split_once(':') else {
        return Err(ValidationError::new("header", format!("`{raw}`: {HEADER_FORMAT}")));
    };
    let (name, value) = (name.trim(), value.trim());

    check_header(name, value).map_err(|message| ValidationError::new("header", message))?;

    Ok((name.to_string(), value.to_string()))
}

fn check_header(name: &str, value: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err(format!("empty header name, {HEADER_FORMAT}"));
    }
    HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| format!("invalid header name `{name}`: {e}"))?;
    HeaderValue::from_str(value).map_err(|e| format!("invalid value for `{name}`: {e}"))?;

    Ok(())
}

fn find_span(needle: &str, toml_src: &str) -> Option<SourceSpan> {
    let pattern = format!("\"{needle}\"");
    toml_src
        .find(&pattern)
        .map(|start| SourceSpan::new((start + 1).into(), needle.len()))
}

fn find_key_span(toml_src: &str, key: &str) -> Option<SourceSpan> {
    let start = toml_src.find(key)?;
    Some(SourceSpan::new(start.into(), key.len()))
}
