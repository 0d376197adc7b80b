use std::{env, fmt::Display, net::IpAddr, path::PathBuf, str::FromStr};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("Invalid {key} value: {info}")]
    Invalid { key: &'static str, info: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: IpAddr,
    pub port: u16,
    pub secret: Option<String>,
    pub token_ttl_hours: i64,
    pub media_root: PathBuf,
    pub media_url: String,
    pub db_max_connections: u32,
}

impl Config {
    /// Reads the process environment, after loading `.env` if one exists.
    pub fn load() -> Result<Self, ConfigError> {
        if dotenv::dotenv().is_ok() {
            log::info!("Loaded environment from .env");
        }
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = lookup("DATABASE_URL")
            .filter(|url| !url.is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let token_ttl_hours: i64 = try_load(&lookup, "FOODGRAM_TOKEN_TTL_HOURS", "720")?;
        if token_ttl_hours <= 0 {
            return Err(ConfigError::Invalid {
                key: "FOODGRAM_TOKEN_TTL_HOURS",
                info: "must be positive".to_owned(),
            });
        }

        Ok(Self {
            database_url,
            host: try_load(&lookup, "FOODGRAM_HOST", "0.0.0.0")?,
            port: try_load(&lookup, "FOODGRAM_PORT", "8000")?,
            secret: lookup("FOODGRAM_SECRET").filter(|s| !s.is_empty()),
            token_ttl_hours,
            media_root: try_load(&lookup, "FOODGRAM_MEDIA_ROOT", "media")?,
            media_url: try_load(&lookup, "FOODGRAM_MEDIA_URL", "/media/")?,
            db_max_connections: try_load(&lookup, "FOODGRAM_DB_MAX_CONNECTIONS", "10")?,
        })
    }

    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.token_ttl_hours)
    }

    pub fn address(&self) -> (IpAddr, u16) {
        (self.host, self.port)
    }
}

fn try_load<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: &str,
) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    lookup(key)
        .unwrap_or_else(|| {
            log::debug!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e: T::Err| ConfigError::Invalid {
            key,
            info: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply() {
        let config = Config::from_lookup(lookup(&[("DATABASE_URL", "postgres://localhost/foodgram")])).unwrap();
        assert_eq!(config.port, 8000);
        assert_eq!(config.host.to_string(), "0.0.0.0");
        assert_eq!(config.media_url, "/media/");
        assert_eq!(config.token_ttl_hours, 720);
        assert!(config.secret.is_none());
    }

    #[test]
    fn database_url_is_required() {
        assert!(matches!(
            Config::from_lookup(lookup(&[])),
            Err(ConfigError::Missing("DATABASE_URL"))
        ));
    }

    #[test]
    fn invalid_values_fail() {
        let result = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/foodgram"),
            ("FOODGRAM_PORT", "eighty"),
        ]));
        assert!(matches!(result, Err(ConfigError::Invalid { key: "FOODGRAM_PORT", .. })));

        let result = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/foodgram"),
            ("FOODGRAM_TOKEN_TTL_HOURS", "0"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn overrides_are_read() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://db/foodgram"),
            ("FOODGRAM_PORT", "9000"),
            ("FOODGRAM_SECRET", "s3cret"),
            ("FOODGRAM_MEDIA_ROOT", "/var/lib/foodgram/media"),
        ]))
        .unwrap();
        assert_eq!(config.address().1, 9000);
        assert_eq!(config.secret.as_deref(), Some("s3cret"));
        assert_eq!(config.media_root, PathBuf::from("/var/lib/foodgram/media"));
    }
}
