//! Request quota tracking from `X-RateLimit-*` response headers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};
use crate::transport::{header, Headers};

pub const LIMIT_HEADER: &str = "x-ratelimit-limit";
pub const REMAINING_HEADER: &str = "x-ratelimit-remaining";
pub const RESET_HEADER: &str = "x-ratelimit-reset";
pub const USED_HEADER: &str = "x-ratelimit-used";

/// Quota snapshot taken from the most recent response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitStatus {
    pub limit: u64,
    pub remaining: u64,
    /// Epoch seconds at which the quota window resets.
    pub reset_timestamp: i64,
    pub used: u64,
}

impl RateLimitStatus {
    pub fn reset_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.reset_timestamp, 0)
    }
}

/// Holds the latest [`RateLimitStatus`] of a run.
///
/// Never reports exhaustion before the first successful `update`.
#[derive(Debug, Default)]
pub struct RateLimitGauge {
    status: Option<RateLimitStatus>,
}

impl RateLimitGauge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refresh from response headers. All four quota headers are required.
    pub fn update(&mut self, headers: &Headers) -> Result<RateLimitStatus> {
        let status = RateLimitStatus {
            limit: required(headers, LIMIT_HEADER)?,
            remaining: required(headers, REMAINING_HEADER)?,
            reset_timestamp: required(headers, RESET_HEADER)?,
            used: required(headers, USED_HEADER)?,
        };
        self.status = Some(status);
        Ok(status)
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self.status, Some(s) if s.remaining == 0)
    }

    pub fn status(&self) -> Option<RateLimitStatus> {
        self.status
    }
}

fn required<T: std::str::FromStr>(headers: &Headers, name: &str) -> Result<T> {
    let raw = header(headers, name)
        .ok_or_else(|| SyncError::MalformedResponse(format!("missing {name} header")))?;
    raw.trim()
        .parse()
        .map_err(|_| SyncError::MalformedResponse(format!("non-numeric {name} header: {raw:?}")))
}
