//! Per-run host configuration.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

pub const DEFAULT_API_HOST: &str = "api.github.com";
pub const DEFAULT_MAX_ENTRIES: usize = 1000;
pub const DEFAULT_PER_PAGE: u32 = 100;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Which kind of account owns the audit log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Orgs,
    #[default]
    Enterprises,
}

impl AccountType {
    /// URL path segment for this account type.
    pub fn path_segment(&self) -> &'static str {
        match self {
            AccountType::Orgs => "orgs",
            AccountType::Enterprises => "enterprises",
        }
    }
}

impl FromStr for AccountType {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "organization" | "org" | "orgs" => Ok(AccountType::Orgs),
            "enterprise" | "enterprises" => Ok(AccountType::Enterprises),
            other => Err(SyncError::InvalidArgument(format!(
                "account type not supported. Accepted values are: [organization, enterprise]. {other} provided."
            ))),
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path_segment())
    }
}

/// Event families to include in the feed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventTypes {
    /// Web (non-Git) events.
    Web,
    /// Git events.
    Git,
    #[default]
    All,
}

impl EventTypes {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventTypes::Web => "web",
            EventTypes::Git => "git",
            EventTypes::All => "all",
        }
    }
}

impl FromStr for EventTypes {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "web" => Ok(EventTypes::Web),
            "git" => Ok(EventTypes::Git),
            "all" => Ok(EventTypes::All),
            other => Err(SyncError::InvalidArgument(format!(
                "event_types not supported. Accepted values are: [web, git, all]. {other} provided."
            ))),
        }
    }
}

impl fmt::Display for EventTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything one run needs to know about its account.
#[derive(Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// API host, e.g. `api.github.com` or an Enterprise Server hostname.
    pub api_host: String,
    pub account_type: AccountType,
    /// Organization or enterprise slug.
    pub account: String,
    #[serde(default, skip_serializing)]
    token: String,
    pub event_types: EventTypes,
    /// Stop a run once this many entries have been collected.
    pub max_entries: usize,
    /// Set to `false` to accept self-signed certificates.
    pub verify_tls: bool,
    pub request_timeout_secs: u64,
    pub per_page: u32,
}

impl SyncConfig {
    pub fn new(account: impl Into<String>, token: impl Into<String>) -> Self {
        SyncConfig {
            api_host: DEFAULT_API_HOST.to_string(),
            account_type: AccountType::default(),
            account: account.into(),
            token: token.into(),
            event_types: EventTypes::default(),
            max_entries: DEFAULT_MAX_ENTRIES,
            verify_tls: true,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            per_page: DEFAULT_PER_PAGE,
        }
    }

    /// Build from `AUDITSYNC_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        let account = var("AUDITSYNC_ACCOUNT")
            .ok_or_else(|| SyncError::Config("AUDITSYNC_ACCOUNT is not set".to_string()))?;
        let token = var("AUDITSYNC_TOKEN")
            .ok_or_else(|| SyncError::Config("AUDITSYNC_TOKEN is not set".to_string()))?;

        let mut config = SyncConfig::new(account, token);
        if let Some(host) = var("AUDITSYNC_HOST") {
            config.api_host = host;
        }
        if let Some(kind) = var("AUDITSYNC_ACCOUNT_TYPE") {
            config.account_type = kind.parse()?;
        }
        if let Some(types) = var("AUDITSYNC_EVENT_TYPES") {
            config.event_types = types.parse()?;
        }
        if let Some(max) = var("AUDITSYNC_MAX_ENTRIES") {
            config.max_entries = max.trim().parse().map_err(|_| {
                SyncError::Config(format!("AUDITSYNC_MAX_ENTRIES must be an integer: {max}"))
            })?;
        }
        if let Some(insecure) = var("AUDITSYNC_INSECURE") {
            config.verify_tls = !matches!(insecure.as_str(), "1" | "true" | "yes");
        }
        config.validate()?;
        Ok(config)
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.api_host = host.into();
        self
    }

    pub fn with_account_type(mut self, account_type: AccountType) -> Self {
        self.account_type = account_type;
        self
    }

    pub fn with_event_types(mut self, event_types: EventTypes) -> Self {
        self.event_types = event_types;
        self
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    pub fn with_verify_tls(mut self, verify_tls: bool) -> Self {
        self.verify_tls = verify_tls;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_secs = timeout.as_secs().max(1);
        self
    }

    pub fn with_per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page;
        self
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Reject configurations that cannot produce a valid run.
    pub fn validate(&self) -> Result<()> {
        if self.account.trim().is_empty() {
            return Err(SyncError::Config("account must not be empty".to_string()));
        }
        if self.account.contains(['/', '?', '#']) {
            return Err(SyncError::Config(format!(
                "account must be a bare slug: {:?}",
                self.account
            )));
        }
        if self.token.trim().is_empty() {
            return Err(SyncError::Config("access token must not be empty".to_string()));
        }
        if self.api_host.trim().is_empty() || self.api_host.ends_with('/') {
            return Err(SyncError::Config(format!(
                "api host must be non-empty without a trailing '/': {:?}",
                self.api_host
            )));
        }
        if self.max_entries == 0 {
            return Err(SyncError::Config("max_entries must be positive".to_string()));
        }
        if self.per_page == 0 {
            return Err(SyncError::Config("per_page must be positive".to_string()));
        }
        Ok(())
    }

    /// REST API root for the configured host.
    ///
    /// `api.github.com` is served at the root; any other host is treated as
    /// an Enterprise Server, served under `/api/v3`. A host given with an
    /// explicit scheme is used as-is.
    pub fn base_url(&self) -> String {
        let host = self.api_host.trim();
        if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else if host == DEFAULT_API_HOST {
            format!("https://{host}")
        } else {
            format!("https://{host}/api/v3")
        }
    }

    /// Audit log endpoint without query parameters.
    pub fn audit_log_url(&self) -> String {
        format!(
            "{}/{}/{}/audit-log",
            self.base_url(),
            self.account_type.path_segment(),
            self.account
        )
    }

    /// Fingerprint identifying the credential across runs.
    pub fn credential_id(&self) -> String {
        auditsync_state::credential_fingerprint(&self.api_host, &self.token)
    }
}

impl fmt::Debug for SyncConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncConfig")
            .field("api_host", &self.api_host)
            .field("account_type", &self.account_type)
            .field("account", &self.account)
            .field("token", &"<redacted>")
            .field("event_types", &self.event_types)
            .field("max_entries", &self.max_entries)
            .field("verify_tls", &self.verify_tls)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("per_page", &self.per_page)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_hosted_api() {
        let config = SyncConfig::new("poizen-inc", "ghp_x");
        assert_eq!(config.max_entries, 1000);
        assert_eq!(config.event_types, EventTypes::All);
        assert_eq!(config.account_type, AccountType::Enterprises);
        assert!(config.verify_tls);
        assert_eq!(
            config.audit_log_url(),
            "https://api.github.com/enterprises/poizen-inc/audit-log"
        );
        config.validate().unwrap();
    }

    #[test]
    fn enterprise_server_uses_v3_prefix() {
        let config = SyncConfig::new("acme", "t")
            .with_host("ghe.example.com")
            .with_account_type(AccountType::Orgs);
        assert_eq!(
            config.audit_log_url(),
            "https://ghe.example.com/api/v3/orgs/acme/audit-log"
        );
    }

    #[test]
    fn explicit_scheme_is_kept() {
        let config = SyncConfig::new("acme", "t").with_host("http://127.0.0.1:8080");
        assert_eq!(config.base_url(), "http://127.0.0.1:8080");
    }

    #[test]
    fn account_type_parsing() {
        assert_eq!("Organization".parse::<AccountType>().unwrap(), AccountType::Orgs);
        assert_eq!("enterprise".parse::<AccountType>().unwrap(), AccountType::Enterprises);
        assert!("team".parse::<AccountType>().is_err());
    }

    #[test]
    fn event_types_parsing() {
        assert_eq!("web".parse::<EventTypes>().unwrap(), EventTypes::Web);
        assert_eq!("GIT".parse::<EventTypes>().unwrap(), EventTypes::Git);
        let err = "api".parse::<EventTypes>().unwrap_err();
        assert!(err.to_string().contains("[web, git, all]"));
    }

    #[test]
    fn validate_rejects_bad_values() {
        assert!(SyncConfig::new("", "t").validate().is_err());
        assert!(SyncConfig::new("a", " ").validate().is_err());
        assert!(SyncConfig::new("a/b", "t").validate().is_err());
        assert!(SyncConfig::new("a", "t").with_max_entries(0).validate().is_err());
        assert!(SyncConfig::new("a", "t")
            .with_host("api.github.com/")
            .validate()
            .is_err());
    }

    #[test]
    fn from_env_reads_auditsync_vars() {
        std::env::set_var("AUDITSYNC_ACCOUNT", "acme");
        std::env::set_var("AUDITSYNC_TOKEN", "ghp_env");
        std::env::set_var("AUDITSYNC_HOST", "ghe.example.com");
        std::env::set_var("AUDITSYNC_ACCOUNT_TYPE", "organization");
        std::env::set_var("AUDITSYNC_MAX_ENTRIES", "250");
        std::env::set_var("AUDITSYNC_INSECURE", "true");

        let config = SyncConfig::from_env().unwrap();
        assert_eq!(config.token(), "ghp_env");
        assert_eq!(config.max_entries, 250);
        assert!(!config.verify_tls);
        assert_eq!(
            config.audit_log_url(),
            "https://ghe.example.com/api/v3/orgs/acme/audit-log"
        );

        std::env::set_var("AUDITSYNC_MAX_ENTRIES", "lots");
        assert!(matches!(SyncConfig::from_env(), Err(SyncError::Config(_))));

        for name in [
            "AUDITSYNC_ACCOUNT",
            "AUDITSYNC_TOKEN",
            "AUDITSYNC_HOST",
            "AUDITSYNC_ACCOUNT_TYPE",
            "AUDITSYNC_MAX_ENTRIES",
            "AUDITSYNC_INSECURE",
        ] {
            std::env::remove_var(name);
        }
    }

    #[test]
    fn debug_redacts_token() {
        let config = SyncConfig::new("acme", "ghp_supersecret");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("ghp_supersecret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn serialized_config_omits_token() {
        let config = SyncConfig::new("acme", "ghp_supersecret");
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("ghp_supersecret"));
    }
}
