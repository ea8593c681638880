//! Accounts and bearer sessions.
//!
//! Passwords are stored as Argon2id PHC strings. A session is an opaque v4
//! UUID handed to the client at login and looked up on every request that
//! presents it, either as `Authorization: Bearer <token>` or as the
//! `session` cookie.

use argon2::{
	password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
	Argon2,
};
use axum::{
	async_trait,
	extract::FromRequestParts,
	http::{header::AUTHORIZATION, request::Parts},
};
use chrono::{DateTime, Duration, Utc};
use tower_cookies::Cookies;
use tracing::info;
use uuid::Uuid;

use crate::{
	error::{AppError, Result},
	sql::DB,
	state::SharedState,
	types::{Account, Uid},
};

pub const SESSION_COOKIE: &str = "session";
const MIN_PASSWORD_LEN: usize = 6;

fn hash_blocking(password: &str) -> Result<String> {
	let salt = SaltString::encode_b64(Uuid::new_v4().as_bytes())?;
	let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
	Ok(hash.to_string())
}

fn verify_blocking(password: &str, stored: &str) -> bool {
	PasswordHash::new(stored)
		.map(|parsed| Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
		.unwrap_or(false)
}

/// Argon2 is CPU bound, so hashing runs on the blocking pool.
pub async fn hash_password(password: &str) -> Result<String> {
	let password = password.to_string();
	tokio::task::spawn_blocking(move || hash_blocking(&password)).await?
}

pub async fn verify_password(password: &str, stored: &str) -> Result<bool> {
	let (password, stored) = (password.to_string(), stored.to_string());
	Ok(tokio::task::spawn_blocking(move || verify_blocking(&password, &stored)).await?)
}

fn normalize_email(email: &str) -> String {
	email.trim().to_lowercase()
}

pub async fn find_by_email(db: &DB, email: &str) -> Result<Option<Account>> {
	let account = sqlx::query_as("SELECT * FROM users WHERE email = ?")
		.bind(normalize_email(email))
		.fetch_optional(db)
		.await?;
	Ok(account)
}

pub async fn signup(db: &DB, name: &str, email: &str, password: &str) -> Result<Uid> {
	let name = name.trim();
	let email = normalize_email(email);
	if name.is_empty() {
		return Err(AppError::validation("name is required"));
	}
	if !email.contains('@') {
		return Err(AppError::validation("email is not valid"));
	}
	if password.len() < MIN_PASSWORD_LEN {
		return Err(AppError::validation(format!(
			"password must be at least {MIN_PASSWORD_LEN} characters"
		)));
	}
	if find_by_email(db, &email).await?.is_some() {
		return Err(AppError::conflict(format!("Email {email} is already registered")));
	}

	let hash = hash_password(password).await?;
	let done = sqlx::query("INSERT INTO users (name, email, password_hash, created_at) VALUES (?, ?, ?, ?)")
		.bind(name)
		.bind(&email)
		.bind(hash)
		.bind(Utc::now())
		.execute(db)
		.await
		.map_err(|e| match e {
			sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
				AppError::conflict(format!("Email {email} is already registered"))
			}
			e => AppError::Database(e),
		})?;

	let id = done.last_insert_rowid();
	info!("Registered user {id}");
	Ok(id)
}

#[derive(Debug, Clone)]
pub struct Session {
	pub token: Uuid,
	pub expires_at: DateTime<Utc>,
	pub account: Account,
}

pub async fn login(db: &DB, email: &str, password: &str, ttl_hours: i64) -> Result<Session> {
	let invalid = || AppError::Unauthorized("Invalid email or password".to_string());
	let account = find_by_email(db, email).await?.ok_or_else(invalid)?;
	if !verify_password(password, &account.password_hash).await? {
		return Err(invalid());
	}

	let token = Uuid::new_v4();
	let now = Utc::now();
	let expires_at = now + Duration::hours(ttl_hours);
	sqlx::query("INSERT INTO sessions (token, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)")
		.bind(token.to_string())
		.bind(account.id)
		.bind(now)
		.bind(expires_at)
		.execute(db)
		.await?;

	info!("User {} logged in", account.id);
	Ok(Session {
		token,
		expires_at,
		account,
	})
}

pub async fn logout(db: &DB, token: Uuid) -> Result<()> {
	sqlx::query("DELETE FROM sessions WHERE token = ?")
		.bind(token.to_string())
		.execute(db)
		.await?;
	Ok(())
}

/// The account behind a live session token; expired sessions are purged on sight.
pub async fn lookup(db: &DB, token: Uuid) -> Result<Option<Account>> {
	let now = Utc::now();
	sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
		.bind(now)
		.execute(db)
		.await?;

	let account = sqlx::query_as(
		"SELECT users.* FROM sessions JOIN users ON users.id = sessions.user_id
		WHERE sessions.token = ? AND sessions.expires_at > ?",
	)
	.bind(token.to_string())
	.bind(now)
	.fetch_optional(db)
	.await?;
	Ok(account)
}

/// Signed-in user resolved from the request. Use `Option<CurrentUser>` where a
/// session is optional.
#[derive(Debug, Clone)]
pub struct CurrentUser {
	pub token: Uuid,
	pub account: Account,
}

pub fn presented_token(parts: &Parts, cookies: Option<&Cookies>) -> Option<Uuid> {
	let bearer = parts
		.headers
		.get(AUTHORIZATION)
		.and_then(|value| value.to_str().ok())
		.and_then(|value| value.strip_prefix("Bearer "))
		.map(|token| token.trim().to_string());
	let cookie = || cookies.and_then(|c| c.get(SESSION_COOKIE)).map(|c| c.value().to_string());

	bearer.or_else(cookie).and_then(|raw| Uuid::parse_str(&raw).ok())
}

#[async_trait]
impl FromRequestParts<SharedState> for CurrentUser {
	type Rejection = AppError;

	async fn from_request_parts(parts: &mut Parts, state: &SharedState) -> Result<Self, Self::Rejection> {
		let cookies = Cookies::from_request_parts(parts, state).await.ok();
		let token = presented_token(parts, cookies.as_ref())
			.ok_or_else(|| AppError::Unauthorized("Not signed in".to_string()))?;

		let account = lookup(&state.db, token)
			.await?
			.ok_or_else(|| AppError::Unauthorized("Session expired or invalid".to_string()))?;
		Ok(CurrentUser { token, account })
	}
}
