use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default User-Agent string for HTTP requests
pub const DEFAULT_USER_AGENT: &str = concat!("netcore/", env!("CARGO_PKG_VERSION"));

/// Additional attempts after the first one
pub const DEFAULT_MAX_RETRIES: usize = 3;

/// Fixed wait between attempts
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Response body cap for the hyper transport (10 MB)
pub const DEFAULT_MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// When the middleware chain runs relative to transport attempts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MiddlewareMode {
    /// Run the chain once per call; retries resend its output verbatim
    #[default]
    Once,
    /// Re-run the chain on the originally built request before every attempt
    /// (e.g. to re-sign with a fresh timestamp)
    PerAttempt,
}

/// Retry and middleware policy for [`ResilientExecutor`](crate::ResilientExecutor).
///
/// Durations use humantime notation when (de)serialized:
///
/// ```ignore
/// let config: ExecutorConfig = serde_json::from_str(
///     r#"{ "max_retries": 5, "retry_delay": "250ms", "middleware_mode": "per_attempt" }"#,
/// )?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExecutorConfig {
    /// Additional attempts after the first; total attempts are `max_retries + 1`
    pub max_retries: usize,

    /// Fixed delay between attempts (default: 1s)
    #[serde(with = "humantime_duration")]
    pub retry_delay: Duration,

    pub middleware_mode: MiddlewareMode,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            middleware_mode: MiddlewareMode::default(),
        }
    }
}

impl ExecutorConfig {
    /// Single attempt, no retries
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }
}

/// Settings for [`HyperTransport`](crate::HyperTransport).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransportConfig {
    /// Maximum response body size in bytes (default: 10 MB)
    pub max_body_size: usize,

    /// Idle timeout for pooled connections; `None` keeps them indefinitely
    #[serde(with = "humantime_duration::option")]
    pub pool_idle_timeout: Option<Duration>,

    pub pool_max_idle_per_host: usize,

    /// Allow plain `http://` URLs in addition to `https://`
    pub allow_http: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            pool_idle_timeout: Some(Duration::from_secs(90)),
            pool_max_idle_per_host: 32,
            allow_http: true,
        }
    }
}

/// `Duration` as a humantime string (`"1s"`, `"250ms"`).
mod humantime_duration {
    use serde::{Deserialize, Deserializer, Serializer, de};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&humantime::format_duration(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(d)?;
        humantime::parse_duration(&raw).map_err(de::Error::custom)
    }

    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer, de};
        use std::time::Duration;

        #[allow(clippy::ref_option)]
        pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
            match value {
                Some(d) => s.collect_str(&humantime::format_duration(*d)),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
            Option::<String>::deserialize(d)?
                .map(|raw| humantime::parse_duration(&raw).map_err(de::Error::custom))
                .transpose()
        }
    }
}
