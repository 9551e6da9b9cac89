use std::{env, fmt::Display, str::FromStr};

use anyhow::Context;
use tracing::{info, warn};

pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")
            .context("DATABASE_URL must be set to a production Postgres instance")?;

        Ok(Self {
            database_url,
            max_connections: try_load("DATABASE_MAX_CONNECTIONS", 5),
        })
    }
}

fn try_load<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    parse_or_default(key, env::var(key).ok(), default)
}

fn parse_or_default<T>(key: &str, raw: Option<String>, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    let Some(raw) = raw else {
        info!("{key} not set, using default: {default}");
        return default;
    };

    raw.trim().parse().unwrap_or_else(|e| {
        warn!("Invalid {key} value {raw:?}: {e}, using default: {default}");
        default
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_values_fall_back() {
        assert_eq!(parse_or_default::<u32>("POOL", None, 5), 5);
    }

    #[test]
    fn valid_values_are_parsed() {
        assert_eq!(parse_or_default::<u32>("POOL", Some(" 12 ".to_string()), 5), 12);
    }

    #[test]
    fn invalid_values_fall_back() {
        assert_eq!(parse_or_default::<u32>("POOL", Some("many".to_string()), 5), 5);
    }
}
