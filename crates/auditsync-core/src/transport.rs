//! HTTP transport seam.
//!
//! The orchestrator only sees [`PageTransport`]; [`HttpTransport`] is the
//! reqwest-backed implementation and `fakes` provides scripted ones.

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::{Client, Url};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::config::SyncConfig;
use crate::cursor::{parse_link_header, Links};
use crate::entry::Entry;
use crate::error::{Result, SyncError};

/// Response headers. Lookups go through [`header`], which ignores case.
pub type Headers = BTreeMap<String, String>;

pub const GITHUB_MEDIA_TYPE: &str = "application/vnd.github.v3+json";

/// Case-insensitive header lookup.
pub fn header<'a>(headers: &'a Headers, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .or_else(|| {
            headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v)
        })
        .map(String::as_str)
}

/// One page request, fully resolved to a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub url: String,
}

impl PageRequest {
    /// Audit log request for the page after `after` (`None` = first page).
    pub fn for_cursor(config: &SyncConfig, after: Option<&str>) -> Result<Self> {
        let base = config.audit_log_url();
        let mut url = Url::parse(&base)
            .map_err(|e| SyncError::Config(format!("invalid audit log URL {base:?}: {e}")))?;
        url.query_pairs_mut()
            .append_pair("phrase", "")
            .append_pair("include", config.event_types.as_str())
            .append_pair("after", after.unwrap_or_default())
            .append_pair("before", "")
            .append_pair("order", "asc")
            .append_pair("per_page", &config.per_page.to_string());
        Ok(PageRequest { url: url.into() })
    }
}

/// Raw page response as seen by the engine.
#[derive(Debug, Clone, Default)]
pub struct PageResponse {
    pub status: u16,
    /// URL the response was served for.
    pub url: String,
    pub headers: Headers,
    pub body: String,
}

impl PageResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        header(&self.headers, name)
    }

    /// Relations from the `Link` header, empty when absent.
    pub fn links(&self) -> Links {
        self.header("link")
            .map(parse_link_header)
            .unwrap_or_default()
    }

    /// Decode the body, a JSON array of event objects, in response order.
    pub fn entries(&self) -> Result<Vec<Entry>> {
        let value: Value = serde_json::from_str(&self.body).map_err(|e| {
            SyncError::MalformedResponse(format!("response body is not JSON: {e}"))
        })?;
        match value {
            Value::Array(items) => items.into_iter().map(Entry::from_value).collect(),
            other => Err(SyncError::MalformedResponse(format!(
                "expected a JSON array of events, got {}",
                type_name(&other)
            ))),
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Fetches one page. Implementations hold no per-run state and may be
/// shared by any number of concurrent runs.
#[async_trait]
pub trait PageTransport: Send + Sync {
    async fn get_page(&self, request: &PageRequest) -> Result<PageResponse>;
}

/// reqwest-backed transport.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    token: String,
}

impl HttpTransport {
    /// Build a client honouring the configured timeout and TLS policy.
    pub fn new(config: &SyncConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("auditsync/", env!("CARGO_PKG_VERSION")))
            .timeout(config.request_timeout())
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()?;

        Ok(HttpTransport {
            client,
            token: config.token().to_string(),
        })
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut h = HeaderMap::new();
        h.insert(ACCEPT, HeaderValue::from_static(GITHUB_MEDIA_TYPE));
        h.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        h.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("auditsync/", env!("CARGO_PKG_VERSION"))),
        );
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", self.token))
            .map_err(|e| SyncError::Config(format!("invalid access token: {e}")))?;
        auth.set_sensitive(true);
        h.insert(AUTHORIZATION, auth);
        Ok(h)
    }
}

#[async_trait]
impl PageTransport for HttpTransport {
    #[instrument(level = "debug", skip(self, request), fields(url = %request.url))]
    async fn get_page(&self, request: &PageRequest) -> Result<PageResponse> {
        let response = self
            .client
            .get(&request.url)
            .headers(self.headers()?)
            .send()
            .await?;

        let status = response.status().as_u16();
        let url = response.url().to_string();
        let mut headers = Headers::new();
        for (name, value) in response.headers() {
            let Ok(value) = value.to_str() else {
                continue;
            };
            headers
                .entry(name.as_str().to_string())
                .and_modify(|existing: &mut String| {
                    existing.push_str(", ");
                    existing.push_str(value);
                })
                .or_insert_with(|| value.to_string());
        }
        let body = response.text().await?;
        debug!(status, bytes = body.len(), "page received");

        Ok(PageResponse {
            status,
            url,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EventTypes;

    #[test]
    fn first_page_request_has_blank_cursor() {
        let config = SyncConfig::new("poizen-inc", "t").with_event_types(EventTypes::Git);
        let req = PageRequest::for_cursor(&config, None).unwrap();
        assert_eq!(
            req.url,
            "https://api.github.com/enterprises/poizen-inc/audit-log?phrase=&include=git&after=&before=&order=asc&per_page=100"
        );
    }

    #[test]
    fn cursor_token_is_percent_encoded() {
        let config = SyncConfig::new("acme", "t");
        let req = PageRequest::for_cursor(&config, Some("MS42fDY0N0w=")).unwrap();
        assert!(req.url.contains("after=MS42fDY0N0w%3D"));
    }

    #[test]
    fn header_lookup_ignores_case() {
        let mut headers = Headers::new();
        headers.insert("X-RateLimit-Limit".to_string(), "5000".to_string());
        assert_eq!(header(&headers, "x-ratelimit-limit"), Some("5000"));
        assert_eq!(header(&headers, "link"), None);
    }

    #[test]
    fn entries_decode_in_order() {
        let resp = PageResponse {
            status: 200,
            body: r#"[{"action":"a","_document_id":"1"},{"action":"b","_document_id":"2"}]"#
                .to_string(),
            ..Default::default()
        };
        let ids: Vec<String> = resp.entries().unwrap().iter().map(|e| e.identity()).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn non_array_body_is_malformed() {
        let resp = PageResponse {
            status: 200,
            body: r#"{"message":"Not Found"}"#.to_string(),
            ..Default::default()
        };
        assert!(matches!(
            resp.entries(),
            Err(SyncError::MalformedResponse(m)) if m.contains("an object")
        ));
    }

    #[test]
    fn http_transport_builds_with_insecure_tls() {
        let config = SyncConfig::new("acme", "t").with_verify_tls(false);
        let transport = HttpTransport::new(&config).unwrap();
        assert!(transport.headers().unwrap().contains_key(AUTHORIZATION));
    }
}
