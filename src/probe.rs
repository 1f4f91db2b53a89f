use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use reqwest::Method;
use serde::Serialize;
use serde::Serializer;

pub const ALLOW_ORIGIN: &str = "Access-Control-Allow-Origin";
pub const ALLOW_METHODS: &str = "Access-Control-Allow-Methods";
pub const ALLOW_HEADERS: &str = "Access-Control-Allow-Headers";
pub const ALLOW_CREDENTIALS: &str = "Access-Control-Allow-Credentials";

/// The methods a probe can be issued with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Options,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub const ALL: [HttpMethod; 6] = [
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Options,
        HttpMethod::Put,
        HttpMethod::Patch,
        HttpMethod::Delete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }

    /// GET (and HEAD, which is never probed) must not carry a body.
    pub fn allows_body(&self) -> bool {
        !matches!(self, HttpMethod::Get)
    }
}

impl From<HttpMethod> for Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Options => Method::OPTIONS,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Delete => Method::DELETE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant(pub String);

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown value `{}`", self.0)
    }
}

impl FromStr for HttpMethod {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        HttpMethod::ALL
            .into_iter()
            .find(|m| m.as_str() == upper)
            .ok_or_else(|| UnknownVariant(s.to_string()))
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Selects how the request body is derived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BodyMode {
    #[default]
    None,
    Graphql,
    Raw,
}

impl BodyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BodyMode::None => "none",
            BodyMode::Graphql => "graphql",
            BodyMode::Raw => "raw",
        }
    }
}

impl FromStr for BodyMode {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(BodyMode::None),
            "graphql" => Ok(BodyMode::Graphql),
            "raw" => Ok(BodyMode::Raw),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

impl fmt::Display for BodyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything needed to issue one probe. Built fresh for every invocation and
/// never edited in place; use [`ProbeOverrides::apply`] to derive a new one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeConfig {
    pub target_url: String,
    pub origin_header: String,
    pub method: HttpMethod,
    pub extra_headers: IndexMap<String, String>,
    pub body_mode: BodyMode,
    pub graphql_query: String,
    pub raw_body: String,
}

impl ProbeConfig {
    /// The origin sent with the probe, falling back to the caller's own.
    pub fn effective_origin<'a>(&'a self, own_origin: &'a str) -> &'a str {
        if self.origin_header.trim().is_empty() {
            own_origin
        } else {
            &self.origin_header
        }
    }

    /// The body attached to the request, if any.
    pub fn request_body(&self) -> Option<String> {
        if !self.method.allows_body() {
            return None;
        }

        match self.body_mode {
            BodyMode::Graphql if !self.graphql_query.is_empty() => {
                Some(serde_json::json!({ "query": self.graphql_query }).to_string())
            }
            BodyMode::Raw if !self.raw_body.is_empty() => Some(self.raw_body.clone()),
            _ => None,
        }
    }
}

/// A partial [`ProbeConfig`]: only the fields that were supplied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeOverrides {
    pub target_url: Option<String>,
    pub origin_header: Option<String>,
    pub method: Option<HttpMethod>,
    pub extra_headers: Option<IndexMap<String, String>>,
    pub body_mode: Option<BodyMode>,
    pub graphql_query: Option<String>,
    pub raw_body: Option<String>,
}

impl ProbeOverrides {
    pub fn apply(self, base: ProbeConfig) -> ProbeConfig {
        ProbeConfig {
            target_url: self.target_url.unwrap_or(base.target_url),
            origin_header: self.origin_header.unwrap_or(base.origin_header),
            method: self.method.unwrap_or(base.method),
            extra_headers: self.extra_headers.unwrap_or(base.extra_headers),
            body_mode: self.body_mode.unwrap_or(base.body_mode),
            graphql_query: self.graphql_query.unwrap_or(base.graphql_query),
            raw_body: self.raw_body.unwrap_or(base.raw_body),
        }
    }
}

/// The four CORS response headers; `None` when the response did not set one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CorsHeaders {
    #[serde(rename = "Access-Control-Allow-Origin")]
    pub allow_origin: Option<String>,
    #[serde(rename = "Access-Control-Allow-Methods")]
    pub allow_methods: Option<String>,
    #[serde(rename = "Access-Control-Allow-Headers")]
    pub allow_headers: Option<String>,
    #[serde(rename = "Access-Control-Allow-Credentials")]
    pub allow_credentials: Option<String>,
}

impl CorsHeaders {
    pub fn entries(&self) -> [(&'static str, Option<&str>); 4] {
        [
            (ALLOW_ORIGIN, self.allow_origin.as_deref()),
            (ALLOW_METHODS, self.allow_methods.as_deref()),
            (ALLOW_HEADERS, self.allow_headers.as_deref()),
            (ALLOW_CREDENTIALS, self.allow_credentials.as_deref()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProbeBody {
    Json(serde_json::Value),
    Text(String),
}

impl ProbeBody {
    /// Best-effort: JSON when it parses, the raw text otherwise.
    pub fn from_text(text: String) -> Self {
        match serde_json::from_str::<serde_json::Value>(&text) {
            Ok(value) => ProbeBody::Json(value),
            Err(_) => ProbeBody::Text(text),
        }
    }
}

impl Serialize for ProbeBody {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ProbeBody::Json(value) => value.serialize(serializer),
            ProbeBody::Text(text) => serializer.serialize_str(text),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ProbeResult {
    #[serde(rename_all = "camelCase")]
    Success {
        status: u16,
        status_text: String,
        cors_headers: CorsHeaders,
        all_headers: IndexMap<String, String>,
        body: ProbeBody,
    },
    Failure {
        #[serde(rename = "error")]
        message: String,
    },
}
