use serde::{Deserialize, Serialize};
use std::time::Duration;

use storefront_auth::TokenLifecycleConfig;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ClientConfig {
    #[serde(default)]
    pub api: ApiConfig,
    /// Token lifecycle and auth endpoint paths
    #[serde(default)]
    pub auth: AuthSettings,
    /// Catalog list endpoint and page cache tuning
    #[serde(default)]
    pub catalog: CatalogSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ClientConfig {
    pub fn validate(&self) -> Result<(), String> {
        // Api validations
        let base = url::Url::parse(&self.api.base_url)
            .map_err(|e| format!("api.base_url is not a valid URL: {e}"))?;
        if !base.has_host() {
            return Err("api.base_url must be absolute".into());
        }
        if self.api.timeout_ms == 0 {
            return Err("api.timeout_ms must be > 0".into());
        }
        // Auth validations
        for (name, path) in [
            ("auth.refresh_path", &self.auth.refresh_path),
            ("auth.logout_path", &self.auth.logout_path),
            ("auth.guest_session_path", &self.auth.guest_session_path),
        ] {
            if path.trim_matches('/').is_empty() {
                return Err(format!("{name} must not be empty"));
            }
        }
        if self.auth.default_token_lifetime_secs <= self.auth.expiry_skew_secs {
            return Err(
                "auth.default_token_lifetime_secs must be > auth.expiry_skew_secs".into(),
            );
        }
        // Catalog validations
        if self.catalog.page_size == 0 {
            return Err("catalog.page_size must be > 0".into());
        }
        if self.catalog.list_path.trim_matches('/').is_empty() {
            return Err("catalog.list_path must not be empty".into());
        }
        // Logging validation
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.api.timeout_ms)
    }

    pub fn lifecycle(&self) -> TokenLifecycleConfig {
        TokenLifecycleConfig::new()
            .with_expiry_skew(Duration::from_secs(self.auth.expiry_skew_secs))
            .with_refresh_cooldown(Duration::from_secs(self.auth.refresh_cooldown_secs))
            .with_default_token_lifetime(Duration::from_secs(
                self.auth.default_token_lifetime_secs,
            ))
    }

    pub fn bypass_paths(&self) -> [&str; 3] {
        [
            self.auth.refresh_path.as_str(),
            self.auth.logout_path.as_str(),
            self.auth.guest_session_path.as_str(),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8080/api".to_string()
}
fn default_timeout_ms() -> u64 {
    15_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSettings {
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,
    #[serde(default = "default_logout_path")]
    pub logout_path: String,
    #[serde(default = "default_guest_session_path")]
    pub guest_session_path: String,
    /// Seconds subtracted from the server-declared token lifetime
    #[serde(default = "default_expiry_skew_secs")]
    pub expiry_skew_secs: u64,
    /// Seconds refreshes stay suppressed after a failure
    #[serde(default = "default_refresh_cooldown_secs")]
    pub refresh_cooldown_secs: u64,
    /// Lifetime assumed when the refresh response omits one
    #[serde(default = "default_token_lifetime_secs")]
    pub default_token_lifetime_secs: u64,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            refresh_path: default_refresh_path(),
            logout_path: default_logout_path(),
            guest_session_path: default_guest_session_path(),
            expiry_skew_secs: default_expiry_skew_secs(),
            refresh_cooldown_secs: default_refresh_cooldown_secs(),
            default_token_lifetime_secs: default_token_lifetime_secs(),
        }
    }
}

fn default_refresh_path() -> String {
    "/auth/refresh".to_string()
}
fn default_logout_path() -> String {
    "/auth/logout".to_string()
}
fn default_guest_session_path() -> String {
    "/auth/guest".to_string()
}
fn default_expiry_skew_secs() -> u64 {
    30
}
fn default_refresh_cooldown_secs() -> u64 {
    30
}
fn default_token_lifetime_secs() -> u64 {
    900
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogSettings {
    #[serde(default = "default_list_path")]
    pub list_path: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Milliseconds a failed page stays blocked before it may be fetched again
    #[serde(default = "default_failure_cooldown_ms")]
    pub failure_cooldown_ms: u64,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            list_path: default_list_path(),
            page_size: default_page_size(),
            failure_cooldown_ms: default_failure_cooldown_ms(),
        }
    }
}

impl CatalogSettings {
    pub fn failure_cooldown(&self) -> Duration {
        Duration::from_millis(self.failure_cooldown_ms)
    }
}

fn default_list_path() -> String {
    "/products".to_string()
}
fn default_page_size() -> u32 {
    24
}
fn default_failure_cooldown_ms() -> u64 {
    5_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

pub mod loader {
    use super::ClientConfig;
    use config::{Config, Environment, File};

    pub const DEFAULT_CONFIG_FILE: &str = "storefront.toml";

    /// Layers the TOML file at `path` (or an optional `storefront.toml` in the
    /// working directory) under `STOREFRONT__SECTION__KEY` environment
    /// overrides, then validates. An explicit `path` must exist.
    pub fn load_config(path: Option<&str>) -> Result<ClientConfig, String> {
        let file = File::with_name(path.unwrap_or(DEFAULT_CONFIG_FILE)).required(path.is_some());
        let merged: ClientConfig = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix("STOREFRONT")
                    .try_parsing(true)
                    .separator("__"),
            )
            .build()
            .and_then(|cfg| cfg.try_deserialize::<ClientConfig>())
            .map_err(|e| format!("config error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}
