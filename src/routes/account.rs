use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};
use tower_cookies::{Cookie, Cookies};

use super::{required, ApiJson};
use crate::{
	auth::{self, CurrentUser, SESSION_COOKIE},
	error::Result,
	state::SharedState,
	types::{FormLogin, FormRegister},
};

pub async fn signup(
	State(state): State<SharedState>,
	ApiJson(form): ApiJson<FormRegister>,
) -> Result<(StatusCode, Json<Value>)> {
	let name = required(form.name, "name")?;
	let email = required(form.email, "email")?;
	let password = required(form.password, "password")?;

	let id = auth::signup(&state.db, &name, &email, &password).await?;

	Ok((StatusCode::CREATED, Json(json!({ "message": "User created", "id": id }))))
}

pub async fn login(
	State(state): State<SharedState>,
	cookies: Cookies,
	ApiJson(form): ApiJson<FormLogin>,
) -> Result<Json<Value>> {
	let email = required(form.email, "email")?;
	let password = required(form.password, "password")?;

	let session = auth::login(&state.db, &email, &password, state.config.session_ttl_hours).await?;

	let mut cookie = Cookie::new(SESSION_COOKIE, session.token.to_string());
	cookie.set_path("/");
	cookie.set_http_only(true);
	cookies.add(cookie);

	Ok(Json(json!({
		"message": "Logged in",
		"token": session.token.to_string(),
		"expires_at": session.expires_at,
		"user": session.account,
	})))
}

pub async fn logout(
	State(state): State<SharedState>,
	cookies: Cookies,
	user: Option<CurrentUser>,
) -> Result<Json<Value>> {
	if let Some(user) = user {
		auth::logout(&state.db, user.token).await?;
	}
	let mut cookie = Cookie::new(SESSION_COOKIE, "");
	cookie.set_path("/");
	cookies.remove(cookie);

	Ok(Json(json!({ "message": "Logged out" })))
}

pub async fn session(user: CurrentUser) -> Json<Value> {
	Json(json!({ "user": user.account }))
}
