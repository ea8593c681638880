//! Pharmacy inventory service.
//!
//! A medicine lives in exactly one of three tables at a time:
//!
//! - `medicines`: active stock, keyed by item number
//! - `expired_medicines`: past its expiry date, possibly flagged as archived
//! - `archived_medicines`: set aside from either of the above, tagged with where it came from
//!
//! [`lifecycle`] owns every move between them. Reads of the active and expired
//! lists first run a reconciliation sweep so that a date passing, or an edit
//! pushing a date forward, is reflected lazily.

use std::time::Duration;

use axum::{
	http::{
		header::{AUTHORIZATION, CONTENT_TYPE},
		Method,
	},
	Router,
};
use tower_cookies::CookieManagerLayer;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod auth;
pub mod config;
pub mod error;
pub mod inventory;
pub mod lifecycle;
pub mod listing;
pub mod routes;
pub mod sql;
pub mod state;
pub mod types;

use state::SharedState;

pub fn app(state: SharedState) -> Router {
	let cors = CorsLayer::new()
		.allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
		.allow_headers([CONTENT_TYPE, AUTHORIZATION])
		.max_age(Duration::from_secs(60 * 60));

	routes::router()
		.layer(CookieManagerLayer::new())
		.layer(TraceLayer::new_for_http())
		.layer(cors)
		.with_state(state)
}
