//! Configuration validation utilities.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use thiserror::Error;

/// Configuration error types.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse YAML configuration.
    #[error("failed to parse YAML config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// Configuration validation failed.
    #[error("config validation error: {0}")]
    ValidationError(String),

    /// Histogram bucket list could not be parsed.
    #[error("invalid bucket list: {0}")]
    InvalidBuckets(String),
}

/// Parse duration string using humantime.
///
/// Supports various formats: `30s`, `1m`, `5m30s`, `1h`, `100ms`, etc.
///
/// # Examples
///
/// ```
/// use smokeping_exporter::config::parse_duration;
///
/// assert_eq!(parse_duration("45s").unwrap().as_secs(), 45);
/// assert_eq!(parse_duration("2m").unwrap().as_secs(), 120);
/// ```
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("duration string is empty".to_string());
    }
    humantime::parse_duration(s).map_err(|e| e.to_string())
}

/// Parse a listen address.
///
/// Accepts a full socket address (`127.0.0.1:9374`, `[::1]:9374`) or the
/// bare `:port` form, which binds every IPv4 interface.
pub fn parse_listen_address(s: &str) -> Result<SocketAddr, ConfigError> {
    let s = s.trim();
    if let Some(port) = s.strip_prefix(':') {
        let port: u16 = port.parse().map_err(|_| {
            ConfigError::ValidationError(format!("invalid listen port in '{}'", s))
        })?;
        return Ok(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port));
    }
    s.parse::<SocketAddr>()
        .map_err(|_| ConfigError::ValidationError(format!("invalid listen address: '{}'", s)))
}

/// Expand environment variables in a string.
/// Supports ${VAR} and ${VAR:-default} syntax.
pub fn expand_env_vars(input: &str) -> String {
    static ENV_VAR_REGEX: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();

    let regex = ENV_VAR_REGEX.get_or_init(|| {
        regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
            .expect("failed to compile env var regex")
    });

    regex
        .replace_all(input, |caps: &regex::Captures| {
            let var_name = &caps[1];
            let default_value = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            std::env::var(var_name).unwrap_or_else(|_| default_value.to_string())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_valid() {
        assert_eq!(parse_duration("1s").unwrap(), Duration::from_secs(1));
        assert_eq!(parse_duration("45s").unwrap(), Duration::from_secs(45));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
    }

    #[test]
    fn test_parse_duration_invalid() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("   ").is_err());
        assert!(parse_duration("abc").is_err());
        assert!(parse_duration("30").is_err());
    }

    #[test]
    fn test_parse_listen_address_port_only() {
        let addr = parse_listen_address(":9374").unwrap();
        assert_eq!(addr.port(), 9374);
        assert!(addr.ip().is_unspecified());
    }

    #[test]
    fn test_parse_listen_address_full() {
        let addr = parse_listen_address("127.0.0.1:8080").unwrap();
        assert_eq!(addr, "127.0.0.1:8080".parse::<SocketAddr>().unwrap());

        let addr = parse_listen_address("[::1]:9374").unwrap();
        assert!(addr.is_ipv6());
    }

    #[test]
    fn test_parse_listen_address_invalid() {
        assert!(parse_listen_address(":notaport").is_err());
        assert!(parse_listen_address("localhost").is_err());
        assert!(parse_listen_address(":70000").is_err());
    }

    #[test]
    fn test_expand_env_vars_no_vars() {
        assert_eq!(expand_env_vars("hosts: [10.0.0.1]"), "hosts: [10.0.0.1]");
    }

    #[test]
    fn test_expand_env_vars_with_default() {
        let result = expand_env_vars("listen: ${NONEXISTENT_LISTEN_12345:-:9374}");
        assert_eq!(result, "listen: :9374");
    }

    #[test]
    fn test_expand_env_vars_from_env() {
        // SAFETY: This test runs in isolation and only modifies a test-specific variable.
        unsafe {
            std::env::set_var("SMOKEPING_TEST_TARGET", "192.0.2.7");
        }
        let result = expand_env_vars("- ${SMOKEPING_TEST_TARGET}");
        assert_eq!(result, "- 192.0.2.7");
        // SAFETY: Cleanup test variable.
        unsafe {
            std::env::remove_var("SMOKEPING_TEST_TARGET");
        }
    }
}
