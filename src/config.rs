// src/config.rs

use std::env;

use anyhow::{bail, Context};

const MIN_SECRET_LEN: usize = 32;
const MAX_TTL_HOURS: i64 = 24 * 30;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub max_connections: u32,
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    pub slot_minutes: u32,
    pub run_migrations: bool,
}

impl Config {
    /// Reads the process environment (after `.env` has been loaded).
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(get: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = get("DATABASE_URL").context("DATABASE_URL must be set")?;
        let jwt_secret = get("JWT_SECRET").context("JWT_SECRET must be set")?;
        if jwt_secret.len() < MIN_SECRET_LEN {
            bail!("JWT_SECRET must be at least {MIN_SECRET_LEN} bytes");
        }

        let slot_minutes = parse_or(&get, "SLOT_MINUTES", 30u32)?;
        if slot_minutes == 0 || slot_minutes > 240 {
            bail!("SLOT_MINUTES must be between 1 and 240, got {slot_minutes}");
        }

        let jwt_ttl_hours = parse_or(&get, "JWT_TTL_HOURS", 12i64)?;
        if !(1..=MAX_TTL_HOURS).contains(&jwt_ttl_hours) {
            bail!("JWT_TTL_HOURS must be between 1 and {MAX_TTL_HOURS}, got {jwt_ttl_hours}");
        }

        Ok(Self {
            database_url,
            port: parse_or(&get, "PORT", 8080u16)?,
            max_connections: parse_or(&get, "DB_MAX_CONNECTIONS", 10u32)?,
            jwt_secret,
            jwt_ttl_hours,
            slot_minutes,
            run_migrations: parse_or(&get, "RUN_MIGRATIONS", true)?,
        })
    }
}

fn parse_or<T, F>(get: &F, key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid {key}={raw:?}: {e}")),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn load(pairs: &[(&str, &str)]) -> anyhow::Result<Config> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_apply() {
        let cfg = load(&[("DATABASE_URL", "postgres://x"), ("JWT_SECRET", SECRET)]).unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.max_connections, 10);
        assert_eq!(cfg.jwt_ttl_hours, 12);
        assert_eq!(cfg.slot_minutes, 30);
        assert!(cfg.run_migrations);
    }

    #[test]
    fn overrides_are_parsed() {
        let cfg = load(&[
            ("DATABASE_URL", "postgres://x"),
            ("JWT_SECRET", SECRET),
            ("PORT", "9000"),
            ("SLOT_MINUTES", "15"),
            ("RUN_MIGRATIONS", "false"),
        ])
        .unwrap();
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.slot_minutes, 15);
        assert!(!cfg.run_migrations);
    }

    #[test]
    fn rejects_short_secret_and_bad_numbers() {
        assert!(load(&[("DATABASE_URL", "postgres://x"), ("JWT_SECRET", "short")]).is_err());
        assert!(load(&[
            ("DATABASE_URL", "postgres://x"),
            ("JWT_SECRET", SECRET),
            ("PORT", "eighty"),
        ])
        .is_err());
        assert!(load(&[
            ("DATABASE_URL", "postgres://x"),
            ("JWT_SECRET", SECRET),
            ("SLOT_MINUTES", "0"),
        ])
        .is_err());
    }

    #[test]
    fn token_lifetime_is_bounded() {
        let with_ttl = |ttl: &str| {
            load(&[
                ("DATABASE_URL", "postgres://x"),
                ("JWT_SECRET", SECRET),
                ("JWT_TTL_HOURS", ttl),
            ])
        };
        assert_eq!(with_ttl("720").unwrap().jwt_ttl_hours, 720);
        assert!(with_ttl("721").is_err());
        assert!(with_ttl("0").is_err());
        assert!(with_ttl("9223372036854775807").is_err());
    }

    #[test]
    fn database_url_is_required() {
        assert!(load(&[("JWT_SECRET", SECRET)]).is_err());
    }
}
