//! In-memory transports (testing only)
//!
//! - `ScriptedTransport` replays a fixed queue of responses.
//! - `FeedTransport` serves a growing event feed with cursor pagination,
//!   `Link` headers and a request quota, the way the audit log API does.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::Url;
use serde_json::Value;

use crate::cursor::parse_query;
use crate::error::{Result, SyncError};
use crate::transport::{Headers, PageRequest, PageResponse, PageTransport};

/// Rate-limit headers for a canned response.
pub fn rate_limit_headers(limit: u64, remaining: u64, reset: i64) -> Headers {
    let mut headers = Headers::new();
    headers.insert("x-ratelimit-limit".into(), limit.to_string());
    headers.insert("x-ratelimit-remaining".into(), remaining.to_string());
    headers.insert("x-ratelimit-reset".into(), reset.to_string());
    headers.insert(
        "x-ratelimit-used".into(),
        limit.saturating_sub(remaining).to_string(),
    );
    headers
}

/// A 200 response holding `entries`, with a `next` link when `next_after`
/// is given. The URL is filled in by the transport that serves it.
pub fn json_page(entries: &[Value], next_after: Option<&str>, remaining: u64) -> PageResponse {
    let mut headers = rate_limit_headers(5000, remaining, 1_615_036_681);
    if let Some(after) = next_after {
        headers.insert(
            "link".into(),
            format!(r#"<https://api.github.com/enterprises/acme/audit-log?include=all&after={after}&per_page=100>; rel="next""#),
        );
    }
    PageResponse {
        status: 200,
        url: String::new(),
        headers,
        body: Value::Array(entries.to_vec()).to_string(),
    }
}

/// Replays queued responses in order and records every request.
#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<PageResponse>>>,
    requests: Mutex<Vec<PageRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(self, response: PageResponse) -> Self {
        self.responses.lock().unwrap().push_back(Ok(response));
        self
    }

    pub fn with_error(self, error: SyncError) -> Self {
        self.responses.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn requests(&self) -> Vec<PageRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageTransport for ScriptedTransport {
    async fn get_page(&self, request: &PageRequest) -> Result<PageResponse> {
        self.requests.lock().unwrap().push(request.clone());
        let next = self.responses.lock().unwrap().pop_front();
        let mut response = next.unwrap_or_else(|| {
            Err(SyncError::Transport("scripted transport exhausted".to_string()))
        })?;
        if response.url.is_empty() {
            response.url = request.url.clone();
        }
        Ok(response)
    }
}

#[derive(Debug)]
struct FeedState {
    events: Vec<Value>,
    limit: u64,
    used: u64,
    fail_status: Option<u16>,
    requests: Vec<PageRequest>,
}

/// Simulated audit log feed.
///
/// Cursor tokens are opaque strings of the form `c<offset>`. A page carries
/// a `next` link only when events exist beyond it.
#[derive(Debug)]
pub struct FeedTransport {
    state: Mutex<FeedState>,
}

impl FeedTransport {
    pub fn new(events: Vec<Value>) -> Self {
        FeedTransport {
            state: Mutex::new(FeedState {
                events,
                limit: 5000,
                used: 0,
                fail_status: None,
                requests: Vec::new(),
            }),
        }
    }

    /// Allow only `limit` requests before the quota reads zero.
    pub fn with_rate_limit(self, limit: u64) -> Self {
        self.state.lock().unwrap().limit = limit;
        self
    }

    /// Events appended upstream between runs.
    pub fn append(&self, events: impl IntoIterator<Item = Value>) {
        self.state.lock().unwrap().events.extend(events);
    }

    /// Answer every following request with `status`.
    pub fn fail_with_status(&self, status: u16) {
        self.state.lock().unwrap().fail_status = Some(status);
    }

    pub fn requests(&self) -> Vec<PageRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn request_count(&self) -> usize {
        self.state.lock().unwrap().requests.len()
    }
}

fn offset_of(token: Option<&String>) -> Option<usize> {
    match token {
        None => Some(0),
        Some(t) => t.strip_prefix('c')?.parse().ok(),
    }
}

fn page_url(request: &Url, after: &str, before: &str) -> String {
    let mut url = request.clone();
    let kept: Vec<(String, String)> = request
        .query_pairs()
        .filter(|(k, _)| k != "after" && k != "before")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    {
        let mut pairs = url.query_pairs_mut();
        pairs.clear();
        for (k, v) in &kept {
            pairs.append_pair(k, v);
        }
        pairs.append_pair("after", after).append_pair("before", before);
    }
    url.into()
}

#[async_trait]
impl PageTransport for FeedTransport {
    async fn get_page(&self, request: &PageRequest) -> Result<PageResponse> {
        let mut state = self.state.lock().unwrap();
        state.requests.push(request.clone());
        state.used += 1;

        let mut headers =
            rate_limit_headers(state.limit, state.limit.saturating_sub(state.used), 1_615_036_681);

        if let Some(status) = state.fail_status {
            return Ok(PageResponse {
                status,
                url: request.url.clone(),
                headers,
                body: r#"{"message":"Bad credentials"}"#.to_string(),
            });
        }

        let url = Url::parse(&request.url)
            .map_err(|e| SyncError::Transport(format!("bad request URL: {e}")))?;
        let query = parse_query(&request.url)?;
        let per_page: usize = query
            .get("per_page")
            .and_then(|v| v.first())
            .and_then(|v| v.parse().ok())
            .unwrap_or(100);
        let Some(offset) = offset_of(query.get("after").and_then(|v| v.first())) else {
            return Ok(PageResponse {
                status: 422,
                url: request.url.clone(),
                headers,
                body: r#"{"message":"Invalid cursor"}"#.to_string(),
            });
        };

        let start = offset.min(state.events.len());
        let end = (start + per_page).min(state.events.len());
        let page: Vec<Value> = state.events[start..end].to_vec();

        let mut links = vec![format!(r#"<{}>; rel="first""#, page_url(&url, "", ""))];
        if end < state.events.len() {
            links.push(format!(
                r#"<{}>; rel="next""#,
                page_url(&url, &format!("c{end}"), "")
            ));
        }
        if start > 0 {
            links.push(format!(
                r#"<{}>; rel="prev""#,
                page_url(&url, "", &format!("c{start}"))
            ));
        }
        headers.insert("link".into(), links.join(", "));

        Ok(PageResponse {
            status: 200,
            url: request.url.clone(),
            headers,
            body: Value::Array(page).to_string(),
        })
    }
}
