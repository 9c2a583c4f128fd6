use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use crate::compliance::WarningWindow;

const DEFAULT_SIGNING_SECRET: &str = "renay-development-signing-secret";
const DEFAULT_STORAGE_BASE_URL: &str = "http://127.0.0.1:3000/files";
const DEFAULT_SIGNED_URL_TTL_SECS: u64 = 3600;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub compliance: ComplianceConfig,
    pub storage: StorageConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let format = LogFormat::from_str(&env::var("APP_LOG_FORMAT").unwrap_or_default());

        let compliance = ComplianceConfig::from_env()?;
        let storage = StorageConfig::from_env(environment)?;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level, format },
            compliance,
            storage,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub format: LogFormat,
}

/// Output encoding for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl LogFormat {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Compact,
        }
    }
}

/// Knobs consulted by the validity classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ComplianceConfig {
    pub warning_window: WarningWindow,
}

impl ComplianceConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let warning_window = match env::var("AVS_WARNING_EXPIRE_DAYS") {
            Ok(raw) => raw
                .trim()
                .parse::<u32>()
                .map(WarningWindow::days)
                .map_err(|_| ConfigError::InvalidWarningDays { value: raw })?,
            Err(_) => WarningWindow::default(),
        };

        Ok(Self { warning_window })
    }
}

/// Blob store addressing and signed URL issuance.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub base_url: String,
    pub signing_secret: String,
    pub signed_url_ttl_secs: u64,
}

impl StorageConfig {
    fn from_env(environment: AppEnvironment) -> Result<Self, ConfigError> {
        let base_url = env::var("STORAGE_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_STORAGE_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let signing_secret = match env::var("STORAGE_SIGNING_SECRET") {
            Ok(secret) if !secret.trim().is_empty() => secret,
            _ if environment == AppEnvironment::Production => {
                return Err(ConfigError::MissingSigningSecret)
            }
            _ => DEFAULT_SIGNING_SECRET.to_string(),
        };

        let signed_url_ttl_secs = match env::var("STORAGE_URL_TTL_SECS") {
            Ok(raw) => raw
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidUrlTtl { value: raw })?,
            Err(_) => DEFAULT_SIGNED_URL_TTL_SECS,
        };

        Ok(Self {
            base_url,
            signing_secret,
            signed_url_ttl_secs,
        })
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_STORAGE_BASE_URL.to_string(),
            signing_secret: DEFAULT_SIGNING_SECRET.to_string(),
            signed_url_ttl_secs: DEFAULT_SIGNED_URL_TTL_SECS,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidWarningDays { value: String },
    InvalidUrlTtl { value: String },
    MissingSigningSecret,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidWarningDays { value } => write!(
                f,
                "AVS_WARNING_EXPIRE_DAYS must be a non-negative integer (found '{}')",
                value
            ),
            ConfigError::InvalidUrlTtl { value } => write!(
                f,
                "STORAGE_URL_TTL_SECS must be a non-negative integer (found '{}')",
                value
            ),
            ConfigError::MissingSigningSecret => {
                write!(f, "STORAGE_SIGNING_SECRET is required in production")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidWarningDays { .. }
            | ConfigError::InvalidUrlTtl { .. }
            | ConfigError::MissingSigningSecret => None,
        }
    }
}
