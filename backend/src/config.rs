use std::env;
use thiserror::Error;
use uuid::Uuid;

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("{0} has an invalid value: {1}")]
    Invalid(&'static str, String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database_url: String,
    pub election_id: Uuid,
    pub max_connections: u32,
    /// Voter whose own picks are highlighted in the logged tally.
    pub viewer_id: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let required = |key: &'static str| lookup(key).ok_or(ConfigError::Missing(key));

        let database_url = required("DATABASE_URL")?;
        let election_id = required("ELECTION_ID")
            .and_then(|v| Uuid::parse_str(v.trim()).map_err(|_| ConfigError::Invalid("ELECTION_ID", v)))?;
        let max_connections = lookup("DB_MAX_CONNECTIONS")
            .map(|v| v.trim().parse().map_err(|_| ConfigError::Invalid("DB_MAX_CONNECTIONS", v)))
            .transpose()?
            .unwrap_or(DEFAULT_MAX_CONNECTIONS);

        let viewer_id = lookup("VIEWER_ID").filter(|v| !v.trim().is_empty());

        Ok(Self { database_url, election_id, max_connections, viewer_id })
    }
}
