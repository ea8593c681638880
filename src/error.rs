use axum::{
	extract::rejection::{JsonRejection, QueryRejection},
	http::StatusCode,
	response::{IntoResponse, Response},
	Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum AppError {
	#[error("{0}")]
	Validation(String),

	#[error("{0}")]
	Unauthorized(String),

	#[error("{0}")]
	NotFound(String),

	#[error("{0}")]
	Conflict(String),

	#[error("{0}")]
	InvalidTransition(String),

	#[error("{message}")]
	Internal {
		message: String,
		suggestion: Option<&'static str>,
	},

	#[error("Database error: {0}")]
	Database(#[from] sqlx::Error),
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;

impl AppError {
	pub fn validation(msg: impl Into<String>) -> Self {
		AppError::Validation(msg.into())
	}

	pub fn not_found(msg: impl Into<String>) -> Self {
		AppError::NotFound(msg.into())
	}

	pub fn conflict(msg: impl Into<String>) -> Self {
		AppError::Conflict(msg.into())
	}

	pub fn invalid_transition(msg: impl Into<String>) -> Self {
		AppError::InvalidTransition(msg.into())
	}

	/// Attaches a diagnostic hint to server-side failures; client errors pass through.
	pub fn with_suggestion(self, suggestion: &'static str) -> Self {
		match self {
			AppError::Database(e) => AppError::Internal {
				message: format!("Database error: {e}"),
				suggestion: Some(suggestion),
			},
			AppError::Internal { message, .. } => AppError::Internal {
				message,
				suggestion: Some(suggestion),
			},
			other => other,
		}
	}

	pub fn status(&self) -> StatusCode {
		match self {
			AppError::Validation(_) => StatusCode::BAD_REQUEST,
			AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
			AppError::NotFound(_) => StatusCode::NOT_FOUND,
			AppError::Conflict(_) => StatusCode::CONFLICT,
			AppError::InvalidTransition(_) => StatusCode::BAD_REQUEST,
			AppError::Internal { .. } | AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}
}

impl From<JsonRejection> for AppError {
	fn from(rejection: JsonRejection) -> Self {
		AppError::Validation(rejection.body_text())
	}
}

impl From<QueryRejection> for AppError {
	fn from(rejection: QueryRejection) -> Self {
		AppError::Validation(rejection.body_text())
	}
}

impl From<argon2::password_hash::Error> for AppError {
	fn from(e: argon2::password_hash::Error) -> Self {
		AppError::Internal {
			message: format!("Password hashing failed: {e}"),
			suggestion: None,
		}
	}
}

impl From<tokio::task::JoinError> for AppError {
	fn from(e: tokio::task::JoinError) -> Self {
		AppError::Internal {
			message: format!("Background task failed: {e}"),
			suggestion: None,
		}
	}
}

impl IntoResponse for AppError {
	fn into_response(self) -> Response {
		let status = self.status();
		if status.is_server_error() {
			error!("{self}");
		}

		let body = match &self {
			AppError::Internal { suggestion: Some(hint), .. } => {
				json!({ "error": self.to_string(), "suggestion": hint })
			}
			_ => json!({ "error": self.to_string() }),
		};

		(status, Json(body)).into_response()
	}
}
