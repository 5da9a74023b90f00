use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::locale::Locale;

/// Application-level constants
pub const APP_NAME: &str = "symptom-intake";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_PROVIDER_IDLE_TIMEOUT_SECS: u64 = 60;

/// Default `tracing` filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "info,intake_lib=debug,tower_http=info"
}

/// Directory holding the default database.
///
/// Platform local data dir (e.g. `~/.local/share/symptom-intake`), or the
/// working directory when the platform has none.
pub fn app_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join(APP_NAME))
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn default_database_path() -> PathBuf {
    app_data_dir().join("intake.db")
}

/// Runtime configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Presence selects the live completion provider.
    pub openai_api_key: Option<String>,
    pub model: String,
    pub openai_base_url: String,
    /// Longest wait for the next fragment before the stream is failed.
    pub provider_idle_timeout: Duration,
    pub database_path: PathBuf,
    pub bind_addr: SocketAddr,
    pub locale: Locale,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            model: DEFAULT_MODEL.to_string(),
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            provider_idle_timeout: Duration::from_secs(DEFAULT_PROVIDER_IDLE_TIMEOUT_SECS),
            database_path: default_database_path(),
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
            locale: Locale::default(),
        }
    }
}

impl AppConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Blank values count as unset and
    /// unparseable values fall back to defaults with a warning.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        let provider_idle_timeout = get("PROVIDER_IDLE_TIMEOUT_SECS")
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.provider_idle_timeout);

        let host = match get("HOST").map(|h| h.parse::<IpAddr>()) {
            Some(Ok(ip)) => ip,
            Some(Err(e)) => {
                tracing::warn!(error = %e, "Invalid HOST, using default");
                defaults.bind_addr.ip()
            }
            None => defaults.bind_addr.ip(),
        };
        let port = match get("PORT").map(|p| p.parse::<u16>()) {
            Some(Ok(port)) => port,
            Some(Err(e)) => {
                tracing::warn!(error = %e, "Invalid PORT, using default");
                defaults.bind_addr.port()
            }
            None => defaults.bind_addr.port(),
        };

        let locale = match get("INTAKE_LOCALE").map(|l| l.parse::<Locale>()) {
            Some(Ok(locale)) => locale,
            Some(Err(e)) => {
                tracing::warn!(error = %e, "Invalid INTAKE_LOCALE, using default");
                defaults.locale
            }
            None => defaults.locale,
        };

        Self {
            openai_api_key: get("OPENAI_API_KEY"),
            model: get("OPENAI_MODEL").unwrap_or(defaults.model),
            openai_base_url: get("OPENAI_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.openai_base_url),
            provider_idle_timeout,
            database_path: get("DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),
            bind_addr: SocketAddr::new(host, port),
            locale,
        }
    }

    /// Whether a provider credential is configured.
    pub fn has_live_provider(&self) -> bool {
        self.openai_api_key.is_some()
    }
}
