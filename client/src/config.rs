use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

const DEFAULT_API_URL: &str = "http://localhost:8000/";
const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_OUTPUT_DIR: &str = "predictions";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key} is not a valid URL: {source}")]
    InvalidUrl {
        key: &'static str,
        source: url::ParseError,
    },
    #[error("{key} must be an http(s) URL, got {value}")]
    UnsupportedScheme { key: &'static str, value: String },
    #[error("{key} has invalid value {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: Url,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub token_file: Option<PathBuf>,
    pub output_dir: PathBuf,
}

impl ClientConfig {
    /// Reads `SEGMENT_*` variables from the process environment. Callers are
    /// expected to have loaded `.env` beforehand.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_url = parse_api_url(
            "SEGMENT_API_URL",
            &lookup("SEGMENT_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
        )?;

        let poll_secs: u64 = parse_or(
            &lookup,
            "SEGMENT_POLL_INTERVAL_SECS",
            DEFAULT_POLL_INTERVAL_SECS,
        )?;
        if poll_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "SEGMENT_POLL_INTERVAL_SECS",
                value: "0".into(),
            });
        }
        let timeout_secs: u64 = parse_or(
            &lookup,
            "SEGMENT_REQUEST_TIMEOUT_SECS",
            DEFAULT_REQUEST_TIMEOUT_SECS,
        )?;
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "SEGMENT_REQUEST_TIMEOUT_SECS",
                value: "0".into(),
            });
        }

        let token_file = lookup("SEGMENT_TOKEN_FILE")
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from)
            .or_else(|| dirs::config_dir().map(|dir| dir.join("segment").join("token")));

        let output_dir = lookup("SEGMENT_OUTPUT_DIR")
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));

        Ok(Self {
            api_url,
            poll_interval: Duration::from_secs(poll_secs),
            request_timeout: Duration::from_secs(timeout_secs),
            token_file,
            output_dir,
        })
    }
}

fn parse_api_url(key: &'static str, raw: &str) -> Result<Url, ConfigError> {
    let mut url = Url::parse(raw.trim()).map_err(|source| ConfigError::InvalidUrl { key, source })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::UnsupportedScheme {
            key,
            value: raw.to_string(),
        });
    }
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

fn parse_or<T, F>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<ClientConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ClientConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.api_url.as_str(), DEFAULT_API_URL);
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.output_dir, PathBuf::from("predictions"));
    }

    #[test]
    fn overrides() {
        let config = config_from(&[
            ("SEGMENT_API_URL", "https://segment.example.org/app?x=1"),
            ("SEGMENT_POLL_INTERVAL_SECS", " 2 "),
            ("SEGMENT_TOKEN_FILE", "/tmp/segment-token"),
            ("SEGMENT_OUTPUT_DIR", "out"),
        ])
        .unwrap();
        assert_eq!(config.api_url.as_str(), "https://segment.example.org/app");
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.token_file, Some(PathBuf::from("/tmp/segment-token")));
        assert_eq!(config.output_dir, PathBuf::from("out"));
    }

    #[test]
    fn invalid_values_are_errors() {
        assert!(matches!(
            config_from(&[("SEGMENT_API_URL", "not a url")]),
            Err(ConfigError::InvalidUrl { .. })
        ));
        assert!(matches!(
            config_from(&[("SEGMENT_API_URL", "ftp://example.org/")]),
            Err(ConfigError::UnsupportedScheme { .. })
        ));
        assert!(matches!(
            config_from(&[("SEGMENT_POLL_INTERVAL_SECS", "soon")]),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            config_from(&[("SEGMENT_POLL_INTERVAL_SECS", "0")]),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn zero_request_timeout_is_rejected() {
        assert!(matches!(
            config_from(&[("SEGMENT_REQUEST_TIMEOUT_SECS", "0")]),
            Err(ConfigError::InvalidValue { key: "SEGMENT_REQUEST_TIMEOUT_SECS", .. })
        ));
        let config = config_from(&[("SEGMENT_REQUEST_TIMEOUT_SECS", "1")]).unwrap();
        assert_eq!(config.request_timeout, Duration::from_secs(1));
    }
}
