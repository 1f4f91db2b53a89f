use indexmap::IndexMap;
use serde::Deserialize;

/// Contents of the optional `cors-probe.toml` settings file.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default)]
    pub app: App,
    #[serde(default)]
    pub probe: Probe,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct App {
    /// Our own origin: the fallback `Origin` header and the share link base.
    pub origin: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct Probe {
    pub url: Option<String>,
    pub origin: Option<String>,
    pub method: Option<String>,
    pub headers: Option<IndexMap<String, String>>,
    pub body_type: Option<String>,
    pub graphql: Option<String>,
    pub raw_body: Option<String>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_full_settings() {
        let src = r#"
            [app]
            origin = "https://cors.example.dev"

            [probe]
            url = "https://api.example.com/data"
            method = "post"
            body_type = "graphql"
            graphql = "{ viewer { id } }"

            [probe.headers]
            Authorization = "Bearer token"
        "#;

        let settings: Settings = toml::from_str(src).unwrap();
        assert_eq!(settings.app.origin.as_deref(), Some("https://cors.example.dev"));
        assert_eq!(settings.probe.method.as_deref(), Some("post"));
        assert_eq!(
            settings.probe.headers.unwrap()["Authorization"],
            "Bearer token"
        );
    }

    #[test]
    fn empty_file_is_all_defaults() {
        let settings: Settings = toml::from_str("").unwrap();
        assert!(settings.app.origin.is_none());
        assert!(settings.probe.url.is_none());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(toml::from_str::<Settings>("[probe]\nurls = \"x\"").is_err());
    }
}
