use std::collections::HashMap;
use std::str::FromStr;
use thiserror::Error;

use crate::domain::BusinessTz;
use crate::engine::PointsRules;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    /// Offset east of UTC, in minutes, that defines a calendar day.
    pub business_utc_offset_minutes: i32,
    pub max_batch_rows: usize,
    pub materialize_interval_secs: u64,
    /// Local hour at which winners are archived and daily highlights awarded.
    pub winner_archive_hour: u32,
    pub winners_per_period: i64,
    pub preserve_partial_high_value_bonus: bool,
    pub scheduler_enabled: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = parse_or(&env_map, "PORT", 8080u16, "must be a valid u16")?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let business_utc_offset_minutes = parse_or(
            &env_map,
            "BUSINESS_UTC_OFFSET_MINUTES",
            330i32,
            "must be minutes east of UTC",
        )?;
        if BusinessTz::from_offset_minutes(business_utc_offset_minutes).is_none() {
            return Err(ConfigError::InvalidValue(
                "BUSINESS_UTC_OFFSET_MINUTES".to_string(),
                format!("offset out of range: {}", business_utc_offset_minutes),
            ));
        }

        let max_batch_rows = parse_or(
            &env_map,
            "MAX_BATCH_ROWS",
            100_000usize,
            "must be a positive integer",
        )?;
        if max_batch_rows == 0 {
            return Err(ConfigError::InvalidValue(
                "MAX_BATCH_ROWS".to_string(),
                "must be a positive integer".to_string(),
            ));
        }

        let materialize_interval_secs = parse_or(
            &env_map,
            "MATERIALIZE_INTERVAL_SECS",
            60u64,
            "must be a number of seconds",
        )?;
        if materialize_interval_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "MATERIALIZE_INTERVAL_SECS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let winner_archive_hour =
            parse_or(&env_map, "WINNER_ARCHIVE_HOUR", 8u32, "must be an hour 0-23")?;
        if winner_archive_hour > 23 {
            return Err(ConfigError::InvalidValue(
                "WINNER_ARCHIVE_HOUR".to_string(),
                "must be an hour 0-23".to_string(),
            ));
        }

        let winners_per_period =
            parse_or(&env_map, "WINNERS_PER_PERIOD", 3i64, "must be a valid i64")?;
        if winners_per_period < 1 {
            return Err(ConfigError::InvalidValue(
                "WINNERS_PER_PERIOD".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let preserve_partial_high_value_bonus =
            parse_bool(&env_map, "PRESERVE_PARTIAL_HIGH_VALUE_BONUS", true)?;
        let scheduler_enabled = parse_bool(&env_map, "SCHEDULER_ENABLED", true)?;

        Ok(Config {
            port,
            database_path,
            business_utc_offset_minutes,
            max_batch_rows,
            materialize_interval_secs,
            winner_archive_hour,
            winners_per_period,
            preserve_partial_high_value_bonus,
            scheduler_enabled,
        })
    }

    /// The business timezone. Falls back to UTC for an offset that `from_env_map` would reject.
    pub fn business_tz(&self) -> BusinessTz {
        BusinessTz::from_offset_minutes(self.business_utc_offset_minutes)
            .unwrap_or_else(BusinessTz::utc)
    }

    pub fn points_rules(&self) -> PointsRules {
        PointsRules::new(self.preserve_partial_high_value_bonus)
    }

    /// Defaults with the given database path; used by tests and tools.
    pub fn with_database_path(database_path: impl Into<String>) -> Self {
        Config {
            port: 0,
            database_path: database_path.into(),
            business_utc_offset_minutes: 330,
            max_batch_rows: 100_000,
            materialize_interval_secs: 60,
            winner_archive_hour: 8,
            winners_per_period: 3,
            preserve_partial_high_value_bonus: true,
            scheduler_enabled: false,
        }
    }
}

fn parse_or<T: FromStr>(
    env_map: &HashMap<String, String>,
    key: &str,
    default: T,
    expectation: &str,
) -> Result<T, ConfigError> {
    match env_map.get(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue(key.to_string(), expectation.to_string())),
    }
}

fn parse_bool(
    env_map: &HashMap<String, String>,
    key: &str,
    default: bool,
) -> Result<bool, ConfigError> {
    match env_map.get(key).map(|s| s.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(ConfigError::InvalidValue(
                key.to_string(),
                format!("must be true or false, got {}", other),
            )),
        },
    }
}
