use crate::error::{BallotError, Result};
use std::env;
use std::time::Duration;

const DEFAULT_API_BASE: &str = "http://localhost:4000";
const DEFAULT_DATABASE_URL: &str = "sqlite:rusty_tally.db";
const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Http,
    Sqlite,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_base: String,
    pub token: Option<String>,
    pub timeout: Duration,
    pub database_url: String,
    pub backend: Backend,
}

impl Config {
    /// Load configuration from the environment (and `.env` if present).
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    // Split out so tests don't have to touch process-wide env vars
    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_base = lookup("BALLOT_API_BASE")
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
            .trim_end_matches('/')
            .to_string();

        let token = lookup("BALLOT_TOKEN").filter(|t| !t.trim().is_empty());

        let timeout_secs = match lookup("BALLOT_TIMEOUT_SECS") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
                BallotError::validation(format!("BALLOT_TIMEOUT_SECS must be a number, got {:?}", raw))
            })?,
            None => DEFAULT_TIMEOUT_SECS,
        };
        if timeout_secs == 0 {
            return Err(BallotError::validation("BALLOT_TIMEOUT_SECS must be greater than zero"));
        }

        let database_url =
            lookup("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        let backend = match lookup("BALLOT_BACKEND").as_deref().map(str::trim) {
            None | Some("") | Some("http") => Backend::Http,
            Some("sqlite") => Backend::Sqlite,
            Some(other) => {
                return Err(BallotError::validation(format!("Unknown BALLOT_BACKEND: {}", other)));
            }
        };

        Ok(Self {
            api_base,
            token,
            timeout: Duration::from_secs(timeout_secs),
            database_url,
            backend,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.api_base, "http://localhost:4000");
        assert_eq!(config.token, None);
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.backend, Backend::Http);
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("BALLOT_API_BASE", "https://votes.example.org/"),
            ("BALLOT_TOKEN", "abc"),
            ("BALLOT_TIMEOUT_SECS", "3"),
            ("BALLOT_BACKEND", "sqlite"),
            ("DATABASE_URL", "sqlite::memory:"),
        ]))
        .unwrap();
        assert_eq!(config.api_base, "https://votes.example.org");
        assert_eq!(config.token.as_deref(), Some("abc"));
        assert_eq!(config.timeout, Duration::from_secs(3));
        assert_eq!(config.backend, Backend::Sqlite);
        assert_eq!(config.database_url, "sqlite::memory:");
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = Config::from_lookup(lookup_from(&[("BALLOT_TIMEOUT_SECS", "0")])).unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let err = Config::from_lookup(lookup_from(&[("BALLOT_BACKEND", "redis")])).unwrap_err();
        assert!(matches!(err, BallotError::Validation(_)));
    }
}
