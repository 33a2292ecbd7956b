use std::env;
use std::str::FromStr;
use std::time::Duration;

use chrono_tz::Tz;
use dotenvy::dotenv;

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_acquire_timeout: Duration,
    /// Zone whose midnight starts "today" and in which cron expressions fire.
    pub timezone: Tz,
    pub generate_cron: String,
    pub cleanup_cron: String,
    pub run_generate_on_start: bool,
    pub log_level: String,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let db_host = var("DB_HOST", "localhost");
        let db_port = var("DB_PORT", "5432");
        let db_name = var("DB_DATABASE", "fleet_docs");
        let db_user = var("DB_USER", "fleet");
        let db_pwd = var("DB_PWD", "fleet");

        let database_url = format!(
            "postgres://{}:{}@{}:{}/{}",
            db_user, db_pwd, db_host, db_port, db_name
        );

        let db_max_connections = parse_var(&lookup, "DB_MAX_CONNECTIONS", 10u32)?;
        let db_acquire_timeout =
            Duration::from_secs(parse_var(&lookup, "DB_ACQUIRE_TIMEOUT_SECS", 30u64)?);

        let timezone_name = var("ALERTS_TIMEZONE", "Africa/Maputo");
        let timezone = timezone_name.parse::<Tz>().map_err(|_| {
            Error::config(format!("ALERTS_TIMEZONE: unknown time zone '{timezone_name}'"))
        })?;

        let generate_cron = var("ALERTS_GENERATE_CRON", "0 1 * * *");
        let cleanup_cron = var("ALERTS_CLEANUP_CRON", "0 2 * * *");
        let run_generate_on_start = parse_var(&lookup, "RUN_GENERATE_ON_START", false)?;

        let log_level = var("LOG_LEVEL", "info");

        if db_max_connections == 0 {
            return Err(Error::config("DB_MAX_CONNECTIONS must be at least 1"));
        }

        Ok(Self {
            database_url,
            db_max_connections,
            db_acquire_timeout,
            timezone,
            generate_cron,
            cleanup_cron,
            run_generate_on_start,
            log_level,
        })
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| Error::config(format!("{key}: cannot parse '{raw}': {e}"))),
    }
}
