use axum::{
	extract::{FromRequest, FromRequestParts},
	routing::{get, post},
	Router,
};

use crate::{auth::CurrentUser, error::AppError, lifecycle::SYSTEM_ACTOR, state::SharedState};

mod account;
mod archive;
mod dashboard;
mod expired;
mod medicines;

/// `Json` whose rejections come back as [`AppError::Validation`].
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// `Query` whose rejections come back as [`AppError::Validation`].
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

/// Name recorded as `archived_by`.
fn actor(user: &Option<CurrentUser>) -> String {
	user.as_ref()
		.map(|u| u.account.name.clone())
		.unwrap_or_else(|| SYSTEM_ACTOR.to_string())
}

fn required<T>(value: Option<T>, name: &str) -> Result<T, AppError> {
	value.ok_or_else(|| AppError::validation(format!("{name} is required")))
}

pub fn router() -> Router<SharedState> {
	Router::new()
		.route(
			"/medicines",
			get(medicines::list)
				.post(medicines::create)
				.put(medicines::update)
				.delete(medicines::remove),
		)
		.route(
			"/expired-medicines",
			get(expired::list)
				.post(expired::expire)
				.put(expired::update)
				.delete(expired::remove),
		)
		.route(
			"/archive",
			get(archive::list)
				.post(archive::create)
				.put(archive::restore)
				.delete(archive::remove),
		)
		.route("/dashboard", get(dashboard::summary))
		.route("/signup", post(account::signup))
		.route("/login", post(account::login))
		.route("/logout", post(account::logout))
		.route("/session", get(account::session))
}
