//! Client configuration loaded from the environment.

use std::fmt;
use std::time::Duration;

use crate::error::ConfigError;
use crate::transport::UreqTransport;

pub const HOST_VAR: &str = "TEAMCITY_HOST";
pub const USERNAME_VAR: &str = "TEAMCITY_USERNAME";
pub const PASSWORD_VAR: &str = "TEAMCITY_PASSWORD";
pub const TIMEOUT_VAR: &str = "TEAMCITY_TIMEOUT_SECS";

/// Connection settings for a `TeamCityClient`.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub host: String,
    pub username: String,
    pub password: String,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(host: &str, username: &str, password: &str) -> Self {
        Self {
            host: host.to_string(),
            username: username.to_string(),
            password: password.to_string(),
            timeout: UreqTransport::DEFAULT_TIMEOUT,
        }
    }

    /// Read `TEAMCITY_HOST`, `TEAMCITY_USERNAME`, `TEAMCITY_PASSWORD` and the
    /// optional `TEAMCITY_TIMEOUT_SECS` from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ClientConfig::from_env`] over an arbitrary lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::Missing(key))
        };

        let timeout = match lookup(TIMEOUT_VAR) {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| ConfigError::InvalidTimeout(raw))?,
            None => UreqTransport::DEFAULT_TIMEOUT,
        };

        Ok(Self {
            host: required(HOST_VAR)?,
            username: required(USERNAME_VAR)?,
            password: required(PASSWORD_VAR)?,
            timeout,
        })
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &"***")
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn loads_required_values_with_default_timeout() {
        let config = ClientConfig::from_lookup(lookup_from(&[
            (HOST_VAR, "tc.example.com"),
            (USERNAME_VAR, "bob"),
            (PASSWORD_VAR, "s3cret"),
        ]))
        .unwrap();

        assert_eq!(config.host, "tc.example.com");
        assert_eq!(config.username, "bob");
        assert_eq!(config.password, "s3cret");
        assert_eq!(config.timeout, UreqTransport::DEFAULT_TIMEOUT);
    }

    #[test]
    fn parses_timeout() {
        let config = ClientConfig::from_lookup(lookup_from(&[
            (HOST_VAR, "tc.example.com"),
            (USERNAME_VAR, "bob"),
            (PASSWORD_VAR, "s3cret"),
            (TIMEOUT_VAR, " 5 "),
        ]))
        .unwrap();
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn missing_password_is_reported() {
        let err = ClientConfig::from_lookup(lookup_from(&[
            (HOST_VAR, "tc.example.com"),
            (USERNAME_VAR, "bob"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Missing(PASSWORD_VAR)));
    }

    #[test]
    fn missing_host_is_reported() {
        let err = ClientConfig::from_lookup(lookup_from(&[(USERNAME_VAR, "bob")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(HOST_VAR)));
    }

    #[test]
    fn empty_username_counts_as_missing() {
        let err = ClientConfig::from_lookup(lookup_from(&[
            (HOST_VAR, "tc.example.com"),
            (USERNAME_VAR, ""),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Missing(USERNAME_VAR)));
    }

    #[test]
    fn bad_timeout_is_rejected() {
        let err = ClientConfig::from_lookup(lookup_from(&[
            (HOST_VAR, "tc.example.com"),
            (USERNAME_VAR, "bob"),
            (TIMEOUT_VAR, "soon"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTimeout(ref v) if v == "soon"));
    }

    #[test]
    fn debug_hides_password() {
        let config = ClientConfig::new("tc.example.com", "bob", "s3cret");
        assert!(!format!("{config:?}").contains("s3cret"));
    }
}
