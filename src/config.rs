use std::{env, fmt::Display, str::FromStr};

use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
#[error("invalid value for {key}: {reason}")]
pub struct ConfigError {
	pub key: &'static str,
	pub reason: String,
}

#[derive(Debug, Clone)]
pub struct Config {
	pub database_url: String,
	pub port: u16,
	pub max_connections: u32,
	pub acquire_timeout_secs: u64,
	pub busy_timeout_ms: u64,
	pub session_ttl_hours: i64,
	pub default_page_limit: i64,
	pub max_page_limit: i64,
	pub low_stock_threshold: i64,
	pub expiry_warning_days: i64,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			database_url: "sqlite://pharmacy.db".to_string(),
			port: 8080,
			max_connections: 5,
			acquire_timeout_secs: 3,
			busy_timeout_ms: 5000,
			session_ttl_hours: 24,
			default_page_limit: 10,
			max_page_limit: 100,
			low_stock_threshold: 10,
			expiry_warning_days: 30,
		}
	}
}

impl Config {
	pub fn load() -> Result<Self, ConfigError> {
		let defaults = Self::default();
		Ok(Self {
			database_url: try_load("DATABASE_URL", defaults.database_url)?,
			port: try_load("PORT", defaults.port)?,
			max_connections: try_load("DB_MAX_CONNECTIONS", defaults.max_connections)?,
			acquire_timeout_secs: try_load("DB_ACQUIRE_TIMEOUT_SECS", defaults.acquire_timeout_secs)?,
			busy_timeout_ms: try_load("DB_BUSY_TIMEOUT_MS", defaults.busy_timeout_ms)?,
			session_ttl_hours: try_load("SESSION_TTL_HOURS", defaults.session_ttl_hours)?,
			default_page_limit: try_load("DEFAULT_PAGE_LIMIT", defaults.default_page_limit)?,
			max_page_limit: try_load("MAX_PAGE_LIMIT", defaults.max_page_limit)?,
			low_stock_threshold: try_load("LOW_STOCK_THRESHOLD", defaults.low_stock_threshold)?,
			expiry_warning_days: try_load("EXPIRY_WARNING_DAYS", defaults.expiry_warning_days)?,
		})
	}

	/// In-memory store, everything else default.
	pub fn in_memory() -> Self {
		Self {
			database_url: "sqlite::memory:".to_string(),
			..Self::default()
		}
	}
}

fn try_load<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
	T: FromStr + Display,
	T::Err: Display,
{
	match env::var(key) {
		Ok(raw) => raw.trim().parse().map_err(|e: T::Err| {
			warn!("Invalid {key} value: {e}");
			ConfigError { key, reason: e.to_string() }
		}),
		Err(_) => {
			info!("{key} not set, using default: {default}");
			Ok(default)
		}
	}
}
