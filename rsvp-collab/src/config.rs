use std::env;

use thiserror::Error;
use url::Url;

/// The configuration of the RSVP service, read once at startup
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// The postgres url, if absent the data is kept in memory
    pub database_url: Option<String>,
    /// The shared secret that turns a user into an admin
    pub admin_password: Option<String>,
    pub mail: MailConfig,
}

/// How broadcast emails are sent
#[derive(Debug, Clone)]
pub struct MailConfig {
    /// The sender of every broadcast
    pub from: String,
    pub reply_to: Option<String>,
    /// The Resend API key, broadcasts are only logged without one
    pub api_key: Option<String>,
    /// The endpoint emails are posted to
    pub api_url: Url,
    /// How many times a job is attempted before it is dead-lettered
    pub max_attempts: u32,
    /// How many jobs can wait in the queue
    pub queue_capacity: usize,
    /// How many failed jobs are kept around for inspection
    pub dead_letter_capacity: usize,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} is not a valid url: {source}")]
    InvalidUrl {
        key: &'static str,
        source: url::ParseError,
    },
    #[error("{key} must be a positive number, got {value}")]
    InvalidNumber { key: &'static str, value: String },
}

impl Config {
    pub const DATABASE_URL: &'static str = "DATABASE_URL";
    pub const ADMIN_PASSWORD: &'static str = "ADMIN_PASSWORD";
    pub const MAIL_API_KEY: &'static str = "RESEND_API_KEY";
    pub const MAIL_FROM: &'static str = "RSVP_MAIL_FROM";
    pub const MAIL_REPLY_TO: &'static str = "RSVP_MAIL_REPLY_TO";
    pub const MAIL_API_URL: &'static str = "RSVP_MAIL_API_URL";
    pub const MAIL_MAX_ATTEMPTS: &'static str = "RSVP_MAIL_MAX_ATTEMPTS";

    /// Reads the configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads the configuration with the given lookup, falling back to defaults.
    /// Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = MailConfig::default();

        let api_url = match get(Self::MAIL_API_URL) {
            Some(url) => Url::parse(&url).map_err(|source| ConfigError::InvalidUrl {
                key: Self::MAIL_API_URL,
                source,
            })?,
            None => defaults.api_url,
        };

        let max_attempts = match get(Self::MAIL_MAX_ATTEMPTS) {
            Some(value) => value
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::InvalidNumber {
                    key: Self::MAIL_MAX_ATTEMPTS,
                    value,
                })?,
            None => defaults.max_attempts,
        };

        Ok(Self {
            database_url: get(Self::DATABASE_URL),
            admin_password: get(Self::ADMIN_PASSWORD),
            mail: MailConfig {
                from: get(Self::MAIL_FROM).unwrap_or(defaults.from),
                reply_to: get(Self::MAIL_REPLY_TO),
                api_key: get(Self::MAIL_API_KEY),
                api_url,
                max_attempts,
                ..defaults
            },
        })
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            from: "RSVP <rsvp@localhost>".to_string(),
            reply_to: None,
            api_key: None,
            api_url: Url::parse("https://api.resend.com/emails").expect("default url parses"),
            // Failed sends are reported, not retried
            max_attempts: 1,
            queue_capacity: 64,
            dead_letter_capacity: 100,
        }
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = Config::from_lookup(lookup(&[])).unwrap();

        assert!(config.database_url.is_none());
        assert!(config.admin_password.is_none());
        assert!(config.mail.api_key.is_none());
        assert_eq!(config.mail.max_attempts, 1);
        assert_eq!(config.mail.api_url.as_str(), "https://api.resend.com/emails");
    }

    #[test]
    fn test_reads_values() {
        let config = Config::from_lookup(lookup(&[
            ("ADMIN_PASSWORD", "open sesame"),
            ("RSVP_MAIL_FROM", "Party <party@example.com>"),
            ("RSVP_MAIL_MAX_ATTEMPTS", "3"),
            ("DATABASE_URL", "  "),
        ]))
        .unwrap();

        assert_eq!(config.admin_password.as_deref(), Some("open sesame"));
        assert_eq!(config.mail.from, "Party <party@example.com>");
        assert_eq!(config.mail.max_attempts, 3);
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_rejects_invalid_values() {
        let zero = Config::from_lookup(lookup(&[("RSVP_MAIL_MAX_ATTEMPTS", "0")]));
        assert!(matches!(zero, Err(ConfigError::InvalidNumber { .. })));

        let url = Config::from_lookup(lookup(&[("RSVP_MAIL_API_URL", "not a url")]));
        assert!(matches!(url, Err(ConfigError::InvalidUrl { .. })));
    }
}
