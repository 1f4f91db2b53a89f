//! Encoding a [`ProbeConfig`] into a link and back.
//!
//! Query parameters: `url`, `origin`, `method`, `headers` (base64 of a JSON
//! object), `bodyType`, `graphql` (base64 text) and `rawBody` (base64 text).
//! Decoding is best effort: a corrupt parameter is skipped on its own and the
//! remaining parameters still load.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use indexmap::IndexMap;
use tracing::warn;
use url::Url;
use url::form_urlencoded;

use crate::probe::BodyMode;
use crate::probe::HttpMethod;
use crate::probe::ProbeConfig;
use crate::probe::ProbeOverrides;

const URL: &str = "url";
const ORIGIN: &str = "origin";
const METHOD: &str = "method";
const HEADERS: &str = "headers";
const BODY_TYPE: &str = "bodyType";
const GRAPHQL: &str = "graphql";
const RAW_BODY: &str = "rawBody";

/// Outcome of decoding one optional parameter.
#[derive(Debug, PartialEq, Eq)]
enum Decoded<T> {
    Value(T),
    Skip,
}

/// Builds the share link for `config`, replacing any query already on `base`.
pub fn encode(config: &ProbeConfig, base: &Url) -> Url {
    let mut link = base.clone();
    link.set_query(None);

    let mut pairs: Vec<(&str, String)> = vec![];

    if !config.target_url.is_empty() {
        pairs.push((URL, config.target_url.clone()));
    }
    if !config.origin_header.is_empty() {
        pairs.push((ORIGIN, config.origin_header.clone()));
    }
    if config.method != HttpMethod::default() {
        pairs.push((METHOD, config.method.to_string()));
    }
    if !config.extra_headers.is_empty() {
        match serde_json::to_string(&config.extra_headers) {
            Ok(json) => pairs.push((HEADERS, STANDARD.encode(json))),
            Err(error) => warn!(%error, "could not serialize headers for share link"),
        }
    }
    if config.body_mode != BodyMode::None {
        pairs.push((BODY_TYPE, config.body_mode.to_string()));

        match config.body_mode {
            BodyMode::Graphql if !config.graphql_query.is_empty() => {
                pairs.push((GRAPHQL, STANDARD.encode(&config.graphql_query)));
            }
            BodyMode::Raw if !config.raw_body.is_empty() => {
                pairs.push((RAW_BODY, STANDARD.encode(&config.raw_body)));
            }
            _ => {}
        }
    }

    if !pairs.is_empty() {
        link.query_pairs_mut().extend_pairs(pairs);
    }

    link
}

/// Reads the fields present in a share link. Accepts a bare query string, one
/// with a leading `?`, or a whole link. Empty and corrupt parameters are
/// skipped, so a field keeps the last good value the query gave it.
pub fn decode(input: &str) -> ProbeOverrides {
    let query = query_of(input);
    let mut overrides = ProbeOverrides::default();

    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        if value.is_empty() {
            warn!(param = %key, "skipping empty share link parameter");
            continue;
        }

        match key.as_ref() {
            URL => overrides.target_url = Some(value.into_owned()),
            ORIGIN => overrides.origin_header = Some(value.into_owned()),
            METHOD => keep(&mut overrides.method, decode_method(&value)),
            HEADERS => keep(&mut overrides.extra_headers, decode_headers(&value)),
            BODY_TYPE => keep(&mut overrides.body_mode, decode_body_mode(&value)),
            GRAPHQL => keep(&mut overrides.graphql_query, decode_text(GRAPHQL, &value)),
            RAW_BODY => keep(&mut overrides.raw_body, decode_text(RAW_BODY, &value)),
            other => warn!(param = other, "ignoring unknown share link parameter"),
        }
    }

    overrides
}

/// The query part of `input`. Only a leading `?` or an absolute link marks
/// where the query starts, since a bare query may carry unescaped `?` in its
/// values.
fn query_of(input: &str) -> String {
    if let Some(query) = input.strip_prefix('?') {
        return without_fragment(query).to_string();
    }

    match Url::parse(input) {
        Ok(link) => link.query().unwrap_or_default().to_string(),
        Err(_) => without_fragment(input).to_string(),
    }
}

fn without_fragment(query: &str) -> &str {
    query.split('#').next().unwrap_or_default()
}

fn keep<T>(field: &mut Option<T>, decoded: Decoded<T>) {
    if let Decoded::Value(value) = decoded {
        *field = Some(value);
    }
}

fn decode_method(value: &str) -> Decoded<HttpMethod> {
    match value.parse::<HttpMethod>() {
        Ok(method) => Decoded::Value(method),
        Err(error) => {
            warn!(param = METHOD, %error, "skipping share link parameter");
            Decoded::Skip
        }
    }
}

fn decode_body_mode(value: &str) -> Decoded<BodyMode> {
    match value.parse::<BodyMode>() {
        Ok(mode) => Decoded::Value(mode),
        Err(error) => {
            warn!(param = BODY_TYPE, %error, "skipping share link parameter");
            Decoded::Skip
        }
    }
}

fn decode_text(param: &str, value: &str) -> Decoded<String> {
    let bytes = match STANDARD.decode(value) {
        Ok(bytes) => bytes,
        Err(error) => {
            warn!(param, %error, "skipping share link parameter: invalid base64");
            return Decoded::Skip;
        }
    };

    match String::from_utf8(bytes) {
        Ok(text) => Decoded::Value(text),
        Err(error) => {
            warn!(param, %error, "skipping share link parameter: invalid utf-8");
            Decoded::Skip
        }
    }
}

fn decode_headers(value: &str) -> Decoded<IndexMap<String, String>> {
    let Decoded::Value(json) = decode_text(HEADERS, value) else {
        return Decoded::Skip;
    };

    match serde_json::from_str::<IndexMap<String, String>>(&json) {
        Ok(headers) => Decoded::Value(headers),
        Err(error) => {
            warn!(param = HEADERS, %error, "skipping share link parameter: invalid json");
            Decoded::Skip
        }
    }
}

#[cfg(test)]
mod test {
    use indexmap::IndexMap;
    use proptest::prelude::*;
    use url::Url;

    use super::*;

    fn base() -> Url {
        Url::parse("https://x").unwrap()
    }

    fn roundtrip(config: &ProbeConfig) -> ProbeConfig {
        decode(encode(config, &base()).as_str()).apply(ProbeConfig::default())
    }

    #[test]
    fn default_config_encodes_to_bare_base() {
        let link = encode(&ProbeConfig::default(), &base());
        assert_eq!(link.query(), None);
    }

    #[test]
    fn encode_replaces_existing_query_and_skips_defaults() {
        let base = Url::parse("https://tester.dev/?url=stale").unwrap();
        let config = ProbeConfig {
            target_url: "https://api.test/items?id=1&x=y".into(),
            ..Default::default()
        };

        let link = encode(&config, &base);
        let pairs: Vec<(String, String)> = link.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![("url".to_string(), "https://api.test/items?id=1&x=y".to_string())]
        );
    }

    #[test]
    fn headers_are_base64_json() {
        let config = ProbeConfig {
            extra_headers: IndexMap::from([("X-Api-Key".to_string(), "k".to_string())]),
            ..Default::default()
        };

        let link = encode(&config, &base());
        let (_, headers) = link
            .query_pairs()
            .find(|(key, _)| key == "headers")
            .unwrap();
        let json = String::from_utf8(STANDARD.decode(headers.as_bytes()).unwrap()).unwrap();
        assert_eq!(json, r#"{"X-Api-Key":"k"}"#);
    }

    #[test]
    fn raw_body_survives_byte_for_byte() {
        let config = ProbeConfig {
            target_url: "https://api.test".into(),
            method: HttpMethod::Post,
            body_mode: BodyMode::Raw,
            raw_body: r#"{"a":1}"#.into(),
            ..Default::default()
        };

        assert_eq!(roundtrip(&config).raw_body, r#"{"a":1}"#);
    }

    #[test]
    fn body_type_is_written_even_without_content() {
        let config = ProbeConfig {
            body_mode: BodyMode::Graphql,
            ..Default::default()
        };

        let link = encode(&config, &base());
        assert_eq!(link.query(), Some("bodyType=graphql"));
        assert_eq!(roundtrip(&config), config);
    }

    #[test]
    fn malformed_headers_are_skipped() {
        let overrides = decode("url=https%3A%2F%2Fapi.test&headers=%%%not-base64");
        assert_eq!(overrides.target_url.as_deref(), Some("https://api.test"));
        assert_eq!(overrides.extra_headers, None);

        let config = overrides.apply(ProbeConfig::default());
        assert!(config.extra_headers.is_empty());
    }

    #[test]
    fn headers_that_are_not_a_string_map_are_skipped() {
        let not_json = STANDARD.encode("not json");
        let not_map = STANDARD.encode("[1, 2, 3]");

        assert_eq!(decode(&format!("headers={not_json}")).extra_headers, None);
        assert_eq!(decode(&format!("headers={not_map}")).extra_headers, None);
    }

    #[test]
    fn corrupt_body_fields_do_not_affect_others() {
        let overrides = decode("?method=put&bodyType=raw&rawBody=!!!&graphql=@@");
        assert_eq!(overrides.method, Some(HttpMethod::Put));
        assert_eq!(overrides.body_mode, Some(BodyMode::Raw));
        assert_eq!(overrides.raw_body, None);
        assert_eq!(overrides.graphql_query, None);
    }

    #[test]
    fn unknown_method_and_body_type_are_skipped() {
        let overrides = decode("method=TRACE&bodyType=xml&origin=https%3A%2F%2Fo.test");
        assert_eq!(overrides.method, None);
        assert_eq!(overrides.body_mode, None);
        assert_eq!(overrides.origin_header.as_deref(), Some("https://o.test"));
    }

    #[test]
    fn decode_accepts_full_links() {
        let overrides = decode("https://tester.dev/share?url=https%3A%2F%2Fapi.test#result");
        assert_eq!(overrides.target_url.as_deref(), Some("https://api.test"));
    }

    #[test]
    fn bare_query_keeps_question_marks_in_values() {
        let overrides = decode("url=https://api.test/items?id=1&method=POST");
        assert_eq!(
            overrides.target_url.as_deref(),
            Some("https://api.test/items?id=1")
        );
        assert_eq!(overrides.method, Some(HttpMethod::Post));
    }

    #[test]
    fn empty_values_leave_lower_layers_alone() {
        let file = ProbeConfig {
            target_url: "https://file.test".into(),
            origin_header: "https://o.test".into(),
            graphql_query: "{ me }".into(),
            ..Default::default()
        };

        let config = decode("?url=&origin=&graphql=").apply(file.clone());
        assert_eq!(config, file);
    }

    #[test]
    fn corrupt_repeat_keeps_earlier_value() {
        let headers = STANDARD.encode(r#"{"X-Api-Key":"k"}"#);
        let overrides = decode(&format!("headers={headers}&headers=%%%&method=put&method=trace"));

        assert_eq!(
            overrides.extra_headers,
            Some(IndexMap::from([("X-Api-Key".to_string(), "k".to_string())]))
        );
        assert_eq!(overrides.method, Some(HttpMethod::Put));
    }

    #[test]
    fn decode_of_empty_input_is_empty() {
        assert_eq!(decode(""), ProbeOverrides::default());
        assert_eq!(decode("?"), ProbeOverrides::default());
    }

    fn method_strategy() -> impl Strategy<Value = HttpMethod> {
        prop::sample::select(HttpMethod::ALL.to_vec())
    }

    fn body_mode_strategy() -> impl Strategy<Value = BodyMode> {
        prop::sample::select(vec![BodyMode::None, BodyMode::Graphql, BodyMode::Raw])
    }

    fn headers_strategy() -> impl Strategy<Value = IndexMap<String, String>> {
        prop::collection::vec(("[A-Za-z][A-Za-z0-9-]{0,12}", "\\PC{0,16}"), 0..4)
            .prop_map(|pairs| pairs.into_iter().collect())
    }

    fn config_strategy() -> impl Strategy<Value = ProbeConfig> {
        (
            "\\PC{0,40}",
            "\\PC{0,20}",
            method_strategy(),
            headers_strategy(),
            body_mode_strategy(),
            "\\PC{0,40}",
            "\\PC{0,40}",
        )
            .prop_map(
                |(target_url, origin_header, method, extra_headers, body_mode, graphql, raw)| {
                    ProbeConfig {
                        target_url,
                        origin_header,
                        method,
                        extra_headers,
                        body_mode,
                        graphql_query: graphql,
                        raw_body: raw,
                    }
                },
            )
    }

    proptest! {
        #[test]
        fn written_fields_roundtrip(config in config_strategy()) {
            let decoded = roundtrip(&config);

            prop_assert_eq!(&decoded.target_url, &config.target_url);
            prop_assert_eq!(&decoded.origin_header, &config.origin_header);
            prop_assert_eq!(decoded.method, config.method);
            prop_assert_eq!(&decoded.extra_headers, &config.extra_headers);
            prop_assert_eq!(decoded.body_mode, config.body_mode);

            if config.body_mode == BodyMode::Graphql {
                prop_assert_eq!(&decoded.graphql_query, &config.graphql_query);
            }
            if config.body_mode == BodyMode::Raw {
                prop_assert_eq!(&decoded.raw_body, &config.raw_body);
            }
        }
    }
}
