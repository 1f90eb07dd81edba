//! Pagination cursors.
//!
//! The audit log API pages with opaque `after`/`before` tokens carried in
//! the query strings of its `Link` header. [`decode_page_cursor`] turns
//! those links, plus the URL of the request just made, into a
//! [`PageCursor`].
//!
//! `first` holds the full query-parameter mapping of the `first` link, not
//! a single token like the other three fields.

use std::collections::BTreeMap;

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

/// Non-blank query parameters, each name mapped to all its values.
pub type QueryMap = BTreeMap<String, Vec<String>>;

/// Relation name to URL, as read from a `Link` header.
pub type Links = BTreeMap<String, String>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageCursor {
    /// `after` token of the following page. `None` means this was the last page.
    pub next: Option<String>,
    /// `before` token of the preceding page.
    pub prev: Option<String>,
    /// Query parameters of the first page.
    pub first: Option<QueryMap>,
    /// `after` token of the request that produced the current page.
    pub last: Option<String>,
}

impl PageCursor {
    pub fn has_next(&self) -> bool {
        self.next.is_some()
    }

    /// Token the next run resumes from: `next` if another page exists,
    /// else the token that fetched the current page, else the feed start.
    pub fn resume_token(&self) -> &str {
        self.next
            .as_deref()
            .or(self.last.as_deref())
            .unwrap_or_default()
    }
}

/// Build a [`PageCursor`] from response links and the request URL.
///
/// `last` comes from `request_url` alone, so it is populated even when the
/// response carried no links at all.
pub fn decode_page_cursor(links: &Links, request_url: Option<&str>) -> Result<PageCursor> {
    let next = links
        .get("next")
        .map(|url| required_token(url, "next", "after"))
        .transpose()?;
    let prev = links
        .get("prev")
        .map(|url| required_token(url, "prev", "before"))
        .transpose()?;
    let first = links.get("first").map(|url| parse_query(url)).transpose()?;
    let last = match request_url {
        Some(url) => first_value(&parse_query(url)?, "after"),
        None => None,
    };

    Ok(PageCursor {
        next,
        prev,
        first,
        last,
    })
}

/// Decode the query string of `url`, dropping blank values.
pub fn parse_query(url: &str) -> Result<QueryMap> {
    let parsed = Url::parse(url)
        .map_err(|e| SyncError::MalformedResponse(format!("unparseable URL {url:?}: {e}")))?;
    let mut query = QueryMap::new();
    for (key, value) in parsed.query_pairs() {
        if value.is_empty() {
            continue;
        }
        query
            .entry(key.into_owned())
            .or_default()
            .push(value.into_owned());
    }
    Ok(query)
}

/// Parse an RFC 8288 `Link` header into a relation → URL mapping.
///
/// The first link wins when a relation repeats.
pub fn parse_link_header(value: &str) -> Links {
    let mut links = Links::new();
    let mut rest = value;
    while let Some(open) = rest.find('<') {
        let Some(close) = rest[open..].find('>').map(|i| open + i) else {
            break;
        };
        let url = rest[open + 1..close].trim();
        let tail = &rest[close + 1..];
        let params_end = tail.find('<').unwrap_or(tail.len());

        for param in tail[..params_end].split(';') {
            let param = param.trim().trim_end_matches(',').trim();
            let Some((name, rels)) = param.split_once('=') else {
                continue;
            };
            if !name.trim().eq_ignore_ascii_case("rel") {
                continue;
            }
            for rel in rels.trim().trim_matches('"').split_whitespace() {
                links
                    .entry(rel.to_ascii_lowercase())
                    .or_insert_with(|| url.to_string());
            }
        }
        rest = &tail[params_end..];
    }
    links
}

fn required_token(url: &str, rel: &str, param: &str) -> Result<String> {
    first_value(&parse_query(url)?, param).ok_or_else(|| {
        SyncError::MalformedResponse(format!("{rel} link carries no {param} token: {url}"))
    })
}

fn first_value(query: &QueryMap, key: &str) -> Option<String> {
    query.get(key).and_then(|values| values.first()).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const NEXT: &str = "https://api.github.com/enterprises/1070/audit-log?phrase=&include=all&after=MS42MTQ2OTI2NDYwMzZlKzEyfDY0N0w0UXBHVWtVclZPbEZmNVZXRVE9PQ%3D%3D&before=&order=&per_page=10";
    const FIRST: &str = "https://api.github.com/enterprises/1070/audit-log?phrase=&include=all&after=&before=&order=&per_page=10";
    const PREV: &str = "https://api.github.com/enterprises/1070/audit-log?phrase=&include=all&after=&before=MS42MTQ2OTc2Mzg2NmUrMTJ8RzVnYmpBU1dUdVlYLV9CSmE2aTRlUT09&order=&per_page=10";

    fn links(pairs: &[(&str, &str)]) -> Links {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn decodes_all_relations() {
        let cursor = decode_page_cursor(
            &links(&[("next", NEXT), ("first", FIRST), ("prev", PREV)]),
            Some(FIRST),
        )
        .unwrap();

        assert_eq!(
            cursor.next.as_deref(),
            Some("MS42MTQ2OTI2NDYwMzZlKzEyfDY0N0w0UXBHVWtVclZPbEZmNVZXRVE9PQ==")
        );
        assert_eq!(
            cursor.prev.as_deref(),
            Some("MS42MTQ2OTc2Mzg2NmUrMTJ8RzVnYmpBU1dUdVlYLV9CSmE2aTRlUT09")
        );
        let first = cursor.first.unwrap();
        assert_eq!(first.get("include"), Some(&vec!["all".to_string()]));
        assert_eq!(first.get("per_page"), Some(&vec!["10".to_string()]));
        assert!(!first.contains_key("after"));
        // The first page was requested with a blank `after`.
        assert_eq!(cursor.last, None);
    }

    #[test]
    fn empty_links_without_after_is_all_none() {
        let cursor = decode_page_cursor(&Links::new(), Some(FIRST)).unwrap();
        assert_eq!(cursor, PageCursor::default());

        let cursor = decode_page_cursor(&Links::new(), None).unwrap();
        assert_eq!(cursor, PageCursor::default());
    }

    #[test]
    fn last_comes_from_request_url_independent_of_links() {
        let url = "https://api.github.com/orgs/acme/audit-log?include=all&after=Y3Vyc29y&per_page=100";
        let bare = decode_page_cursor(&Links::new(), Some(url)).unwrap();
        assert_eq!(bare.last.as_deref(), Some("Y3Vyc29y"));
        assert_eq!(bare.next, None);

        let linked = decode_page_cursor(&links(&[("next", NEXT)]), Some(url)).unwrap();
        assert_eq!(linked.last.as_deref(), Some("Y3Vyc29y"));
    }

    #[test]
    fn next_without_after_is_malformed() {
        let err = decode_page_cursor(&links(&[("next", FIRST)]), None).unwrap_err();
        assert!(matches!(err, SyncError::MalformedResponse(_)));
    }

    #[test]
    fn resume_token_prefers_next_then_last() {
        let mut cursor = PageCursor {
            next: Some("n".into()),
            last: Some("l".into()),
            ..Default::default()
        };
        assert_eq!(cursor.resume_token(), "n");
        cursor.next = None;
        assert_eq!(cursor.resume_token(), "l");
        cursor.last = None;
        assert_eq!(cursor.resume_token(), "");
    }

    #[test]
    fn parses_github_link_header() {
        let header = format!(r#"<{NEXT}>; rel="next", <{FIRST}>; rel="first", <{PREV}>; rel="prev""#);
        let parsed = parse_link_header(&header);
        assert_eq!(parsed, links(&[("next", NEXT), ("first", FIRST), ("prev", PREV)]));
    }

    #[test]
    fn link_header_tolerates_noise() {
        assert!(parse_link_header("").is_empty());
        assert!(parse_link_header("garbage").is_empty());
        let parsed = parse_link_header(r#"<https://x.test/?after=a>;rel="next last"; title="t""#);
        assert_eq!(parsed.get("next").map(String::as_str), Some("https://x.test/?after=a"));
        assert_eq!(parsed.get("last").map(String::as_str), Some("https://x.test/?after=a"));
    }
}
