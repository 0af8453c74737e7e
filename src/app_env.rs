use anyhow::Context;
use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

/// URL for accessing the PostgreSQL database (should contain a database name in the path)
pub const DB_URL: &str = "DATABASE_URL";
/// Maximum number of pooled database connections
pub const DB_MAX_CONNECTIONS: &str = "DB_MAX_CONNECTIONS";
/// Socket address the HTTP server binds to
pub const LISTEN_ADDR: &str = "LISTEN_ADDR";
/// Log level configuration for the application, in [EnvFilter](tracing_subscriber::EnvFilter) directive syntax
pub const LOG_LEVEL: &str = "LOG_LEVEL";

/// OpenTelemetry span export URL. Should be http://localhost:4317 by default, as the service should
/// have an OpenTelemetry collector sidecar which directs metrics to the correct place
pub const OTEL_SPAN_EXPORT_URL: &str = "OTEL_SPAN_EXPORT_URL";
/// OpenTelemetry metrics export URL. Should be http://localhost:4317 by default, as the service should
/// have an OpenTelemetry collector sidecar which directs metrics to the correct place
pub const OTEL_METRIC_EXPORT_URL: &str = "OTEL_METRIC_EXPORT_URL";

/// Name of the cookie carrying the session token
pub const SESSION_COOKIE_NAME: &str = "SESSION_COOKIE_NAME";
/// How long a login stays valid, in hours
pub const SESSION_TTL_HOURS: &str = "SESSION_TTL_HOURS";
/// Set to "true" to mark the session cookie `Secure` (required when served over HTTPS)
pub const SESSION_COOKIE_SECURE: &str = "SESSION_COOKIE_SECURE";

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_SESSION_COOKIE_NAME: &str = "board_session";
const DEFAULT_SESSION_TTL_HOURS: i64 = 168;
/// Ten years
const MAX_SESSION_TTL_HOURS: i64 = 24 * 365 * 10;

/// How login sessions are handed to browsers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub cookie_name: String,
    pub ttl_hours: i64,
    pub secure_cookie: bool,
}

impl SessionConfig {
    pub fn lifetime(&self) -> chrono::Duration {
        chrono::Duration::hours(self.ttl_hours)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            cookie_name: DEFAULT_SESSION_COOKIE_NAME.to_owned(),
            ttl_hours: DEFAULT_SESSION_TTL_HOURS,
            secure_cookie: false,
        }
    }
}

/// Everything the server reads from its environment at startup
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    pub listen_addr: SocketAddr,
    pub otel_span_export_url: Option<String>,
    pub otel_metric_export_url: Option<String>,
    pub session: SessionConfig,
}

impl ServerConfig {
    pub fn from_env() -> Result<ServerConfig, anyhow::Error> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from any variable source. Blank values count as unset.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<ServerConfig, anyhow::Error> {
        let lookup = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let database_url =
            lookup(DB_URL).with_context(|| format!("the {DB_URL} environment variable is required"))?;
        let session_defaults = SessionConfig::default();

        let ttl_hours = parse_or(lookup(SESSION_TTL_HOURS), SESSION_TTL_HOURS, DEFAULT_SESSION_TTL_HOURS)?;
        if ttl_hours <= 0 {
            anyhow::bail!("{SESSION_TTL_HOURS} must be a positive number of hours, got {ttl_hours}");
        }
        if ttl_hours > MAX_SESSION_TTL_HOURS {
            anyhow::bail!("{SESSION_TTL_HOURS} may be at most {MAX_SESSION_TTL_HOURS} hours, got {ttl_hours}");
        }

        Ok(ServerConfig {
            database_url,
            db_max_connections: parse_or(
                lookup(DB_MAX_CONNECTIONS),
                DB_MAX_CONNECTIONS,
                DEFAULT_DB_MAX_CONNECTIONS,
            )?,
            listen_addr: parse_or(
                lookup(LISTEN_ADDR),
                LISTEN_ADDR,
                SocketAddr::from_str(DEFAULT_LISTEN_ADDR)?,
            )?,
            otel_span_export_url: lookup(OTEL_SPAN_EXPORT_URL),
            otel_metric_export_url: lookup(OTEL_METRIC_EXPORT_URL),
            session: SessionConfig {
                cookie_name: lookup(SESSION_COOKIE_NAME).unwrap_or(session_defaults.cookie_name),
                ttl_hours,
                secure_cookie: parse_or(lookup(SESSION_COOKIE_SECURE), SESSION_COOKIE_SECURE, false)?,
            },
        })
    }
}

fn parse_or<T>(raw: Option<String>, name: &str, default: T) -> Result<T, anyhow::Error>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .with_context(|| format!("{name} has an invalid value: {value:?}")),
    }
}
