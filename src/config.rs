use std::env::{self, VarError};
use std::str::FromStr;
use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};

use crate::ClientError;

/// Environment variable holding the API root URL.
pub const ENV_BASE_URL: &str = "REMOTE_MODELS_BASE_URL";
/// Environment variable holding the per-request timeout in seconds.
pub const ENV_TIMEOUT_SECS: &str = "REMOTE_MODELS_TIMEOUT_SECS";
/// Environment variable holding the retry count.
pub const ENV_MAX_RETRIES: &str = "REMOTE_MODELS_MAX_RETRIES";

pub(crate) const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Bounded automatic retry for transient transport failures.
///
/// Connect failures are retried for every method. Other transport failures,
/// timeouts included, are retried for idempotent methods only. HTTP statuses
/// are never retried.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of retries after the initial attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubled on every further retry.
    pub backoff: Duration,
    /// Upper bound for a single delay.
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Policy that surfaces the first failure.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub(crate) fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2_u32.saturating_pow(retry.saturating_sub(1));
        self.backoff.saturating_mul(factor).min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(2),
        }
    }
}

/// Settings shared by every request a remote model issues.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Per-attempt deadline.
    pub timeout: Duration,
    pub retry: RetryPolicy,
    /// Headers sent with every request.
    pub default_headers: HeaderMap,
}

impl ClientConfig {
    /// Reads the optional timeout and retry settings from the environment.
    ///
    /// Unset variables keep their defaults.
    pub fn from_env() -> Result<Self, ClientError> {
        let mut config = Self::default();
        if let Some(secs) = read_env::<u64>(ENV_TIMEOUT_SECS)? {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(retries) = read_env::<u32>(ENV_MAX_RETRIES)? {
            config.retry.max_retries = retries;
        }
        Ok(config)
    }

    /// Adds or replaces a default header.
    pub fn insert_header(&mut self, name: &str, value: &str) -> Result<(), ClientError> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ClientError::InvalidHeader(name.to_owned()))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| ClientError::InvalidHeader(format!("{name}: {value}")))?;
        self.default_headers.insert(name, value);
        Ok(())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Self {
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
            default_headers,
        }
    }
}

/// Reads the required base URL from [`ENV_BASE_URL`].
pub(crate) fn base_url_from_env() -> Result<String, ClientError> {
    lookup_env(ENV_BASE_URL)?
        .ok_or_else(|| ClientError::InvalidConfig(format!("{ENV_BASE_URL} is not set")))
}

fn read_env<T: FromStr>(key: &str) -> Result<Option<T>, ClientError> {
    match lookup_env(key)? {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ClientError::InvalidConfig(format!("{key}='{raw}'"))),
        None => Ok(None),
    }
}

fn lookup_env(key: &str) -> Result<Option<String>, ClientError> {
    match env::var(key) {
        Ok(raw) => Ok(Some(raw)),
        Err(VarError::NotPresent) => Ok(None),
        Err(VarError::NotUnicode(_)) => Err(ClientError::InvalidConfig(format!(
            "{key} is not valid unicode"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use reqwest::header::CONTENT_TYPE;

    use super::{ClientConfig, ENV_BASE_URL, ENV_MAX_RETRIES, ENV_TIMEOUT_SECS, RetryPolicy};
    use crate::{AsyncRemoteModel, ClientError, RemoteModel};

    fn set(key: &str, value: impl AsRef<std::ffi::OsStr>) {
        // SAFETY: only `environment_overrides_and_rejects_bad_values` touches these variables.
        unsafe { std::env::set_var(key, value) };
    }

    fn unset(key: &str) {
        // SAFETY: see `set`.
        unsafe { std::env::remove_var(key) };
    }

    #[test]
    fn defaults_send_json_content_type() {
        let config = ClientConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(
            config.default_headers.get(CONTENT_TYPE).map(|v| v.to_str().ok()),
            Some(Some("application/json"))
        );
    }

    #[test]
    fn backoff_doubles_until_capped() {
        let policy = RetryPolicy {
            max_retries: 6,
            backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(500),
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for(4), Duration::from_millis(500));
    }

    #[test]
    fn insert_header_rejects_invalid_names() {
        let mut config = ClientConfig::default();
        config
            .insert_header("authorization", "Token abc")
            .expect("valid header");
        assert!(config.default_headers.contains_key("authorization"));

        let error = config
            .insert_header("bad header", "x")
            .expect_err("space in name");
        assert!(matches!(error, ClientError::InvalidHeader(_)));
    }

    // One test owns every `REMOTE_MODELS_*` variable; env is process-global.
    #[test]
    fn environment_overrides_and_rejects_bad_values() {
        unset(ENV_BASE_URL);
        unset(ENV_TIMEOUT_SECS);
        unset(ENV_MAX_RETRIES);

        let config = ClientConfig::from_env().expect("defaults when unset");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.retry.max_retries, 3);

        let error = RemoteModel::from_env().expect_err("base url missing");
        assert!(matches!(
            error,
            ClientError::InvalidConfig(message) if message.contains(ENV_BASE_URL)
        ));

        set(ENV_BASE_URL, "http://benchmarks-api.test/api/v1");
        set(ENV_TIMEOUT_SECS, " 5 ");
        set(ENV_MAX_RETRIES, "0");
        let model = RemoteModel::from_env().expect("configured from env");
        assert_eq!(model.base_url().as_str(), "http://benchmarks-api.test/api/v1/");
        assert_eq!(model.config().timeout, Duration::from_secs(5));
        assert_eq!(model.config().retry.max_retries, 0);
        let model = AsyncRemoteModel::from_env().expect("configured from env");
        assert_eq!(model.config().timeout, Duration::from_secs(5));

        set(ENV_TIMEOUT_SECS, "ten");
        let error = ClientConfig::from_env().expect_err("unparsable timeout");
        assert!(matches!(
            error,
            ClientError::InvalidConfig(message) if message == "REMOTE_MODELS_TIMEOUT_SECS='ten'"
        ));

        set(ENV_TIMEOUT_SECS, "5");
        set(ENV_MAX_RETRIES, "-1");
        let error = ClientConfig::from_env().expect_err("negative retries");
        assert!(matches!(error, ClientError::InvalidConfig(_)));
        unset(ENV_MAX_RETRIES);

        #[cfg(unix)]
        {
            use std::ffi::OsStr;
            use std::os::unix::ffi::OsStrExt;

            let not_unicode = OsStr::from_bytes(&[0xff, 0xfe]);
            set(ENV_TIMEOUT_SECS, not_unicode);
            let error = ClientConfig::from_env().expect_err("set but not unicode");
            assert!(matches!(
                error,
                ClientError::InvalidConfig(message) if message.contains(ENV_TIMEOUT_SECS)
            ));
            unset(ENV_TIMEOUT_SECS);

            set(ENV_BASE_URL, not_unicode);
            let error = RemoteModel::from_env().expect_err("set but not unicode");
            assert!(matches!(
                error,
                ClientError::InvalidConfig(message) if message.contains("unicode")
            ));
        }

        unset(ENV_BASE_URL);
        unset(ENV_TIMEOUT_SECS);
        unset(ENV_MAX_RETRIES);
    }
}
