use crate::app::AppError;
use crate::domain::aggregation::AttributionPolicy;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub device_url: String,
    pub db_path: String,
    pub http_bind: String,
    pub poll_interval_ms: u64,
    pub device_timeout_ms: u64,
    pub session_min_joules: i64,
    pub session_history_days: i64,
    pub attribution: AttributionPolicy,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        load_dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            device_url: device_url(&lookup)?,
            db_path: string_or_default(&lookup, "DB_PATH", "/var/lib/evse/session.db"),
            http_bind: string_or_default(&lookup, "HTTP_BIND", "0.0.0.0:8080"),
            poll_interval_ms: parse_or_default(&lookup, "POLL_INTERVAL_MS", 1000_u64)?,
            device_timeout_ms: device_timeout_ms(&lookup)?,
            session_min_joules: parse_or_default(&lookup, "SESSION_MIN_JOULES", 1_500_000_i64)?,
            session_history_days: parse_or_default(&lookup, "SESSION_HISTORY_DAYS", 180_i64)?,
            attribution: match lookup("SESSION_ATTRIBUTION") {
                Some(raw) => parse_policy(&raw)?,
                None => AttributionPolicy::default(),
            },
        })
    }
}

/// Reads `.env` from the working directory when present.
pub(crate) fn load_dotenv() {
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!(path = %path.display(), "loaded environment file");
    }
}

pub(crate) fn device_url<F>(lookup: &F) -> Result<String, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup("DEVICE_URL")
        .map(|v| v.trim().trim_end_matches('/').to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::config("DEVICE_URL is required"))
}

pub(crate) fn device_timeout_ms<F>(lookup: &F) -> Result<u64, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    parse_or_default(lookup, "DEVICE_TIMEOUT_MS", 5000_u64)
}

pub(crate) fn parse_policy(raw: &str) -> Result<AttributionPolicy, AppError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "split" => Ok(AttributionPolicy::TimeProportional),
        "start" => Ok(AttributionPolicy::StartBucket),
        other => Err(AppError::config(format!(
            "unknown attribution policy `{other}` (expected split or start)"
        ))),
    }
}

fn string_or_default<F>(lookup: &F, key: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_or_default<T, F>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr + Copy,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::config(format!("{key} must be a valid number"))),
        None => Ok(default),
    }
}
