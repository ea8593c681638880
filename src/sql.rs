use std::{str::FromStr, time::Duration};

use sqlx::{
	sqlite::{SqliteConnectOptions, SqlitePoolOptions},
	Pool, Sqlite,
};
use tracing::info;

use crate::config::Config;

pub type DB = Pool<Sqlite>;

pub async fn connect(config: &Config) -> Result<DB, sqlx::Error> {
	let options = SqliteConnectOptions::from_str(&config.database_url)?
		.create_if_missing(true)
		.foreign_keys(true)
		.busy_timeout(Duration::from_millis(config.busy_timeout_ms));

	let in_memory = config.database_url.contains(":memory:");
	// every pooled connection to :memory: is its own database, keep exactly one alive
	let pool_options = if in_memory {
		SqlitePoolOptions::new()
			.max_connections(1)
			.min_connections(1)
			.idle_timeout(None)
			.max_lifetime(None)
	} else {
		SqlitePoolOptions::new().max_connections(config.max_connections)
	};

	let pool = pool_options
		.acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
		.connect_with(options)
		.await?;

	schema(&pool).await?;
	info!("Connected to {}", config.database_url);
	Ok(pool)
}

/// Applies [`TABLE_SCHEMA`] one statement at a time; safe to rerun.
pub async fn schema(db: &DB) -> Result<(), sqlx::Error> {
	let mut tx = db.begin().await?;
	for statement in TABLE_SCHEMA.split(';').map(str::trim).filter(|s| !s.is_empty()) {
		sqlx::query(statement).execute(&mut *tx).await?;
	}
	tx.commit().await
}

pub const TABLE_SCHEMA: &str = r#"

CREATE TABLE IF NOT EXISTS medicines (
	item_no INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
	drug_description TEXT NOT NULL,
	brand_name TEXT NOT NULL,
	lot_batch_no TEXT NOT NULL,
	expiry_date TEXT NOT NULL,
	physical_balance INTEGER NOT NULL DEFAULT 0,
	CHECK(physical_balance >= 0)
);

CREATE TABLE IF NOT EXISTS expired_medicines (
	id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
	original_item_no INTEGER NOT NULL,
	drug_description TEXT NOT NULL,
	brand_name TEXT NOT NULL,
	lot_batch_no TEXT NOT NULL,
	expiry_date TEXT NOT NULL,
	physical_balance INTEGER NOT NULL DEFAULT 0,
	reason TEXT NOT NULL,
	expired_at TEXT NOT NULL,
	is_archived BOOL NOT NULL DEFAULT false,
	archived_at TEXT DEFAULT NULL,
	archived_by TEXT DEFAULT NULL,
	CHECK((archived_at IS NULL) == (is_archived == false))
);

CREATE INDEX IF NOT EXISTS expired_medicines_original
	ON expired_medicines(original_item_no);

CREATE TABLE IF NOT EXISTS archived_medicines (
	id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
	original_item_no INTEGER NOT NULL,
	drug_description TEXT NOT NULL,
	brand_name TEXT NOT NULL,
	lot_batch_no TEXT NOT NULL,
	expiry_date TEXT NOT NULL,
	physical_balance INTEGER NOT NULL DEFAULT 0,
	reason TEXT NOT NULL,
	type TEXT NOT NULL,
	archived_at TEXT NOT NULL,
	archived_by TEXT NOT NULL,
	CHECK(type IN ('active', 'expired'))
);

CREATE INDEX IF NOT EXISTS archived_medicines_original
	ON archived_medicines(original_item_no, type);

CREATE TABLE IF NOT EXISTS users (
	id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
	name TEXT NOT NULL,
	email TEXT NOT NULL UNIQUE,
	password_hash TEXT NOT NULL,
	created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS sessions (
	token TEXT NOT NULL PRIMARY KEY,
	user_id INTEGER NOT NULL,
	created_at TEXT NOT NULL,
	expires_at TEXT NOT NULL,
	FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE
);

"#;
