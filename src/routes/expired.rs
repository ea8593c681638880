use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{actor, required, ApiJson, ApiQuery};
use crate::{
	auth::CurrentUser,
	error::{AppError, Result},
	inventory, lifecycle,
	listing::{ExpiredSort, Filter, ListParams, Listing, Page},
	state::SharedState,
	types::{ArchiveKind, ExpireForm, ExpiredMedicine, ExpiredUpdateForm, IdParam},
};

const DELETE_SUGGESTION: &str =
	"Check that the archived_medicines table exists and that no other request is holding the record";

#[derive(Debug, Default, Deserialize)]
pub struct ExpiredFilter {
	pub archived: Option<String>,
}

impl ExpiredFilter {
	/// `None` means both archived and live rows.
	fn archived(&self) -> Result<Option<bool>> {
		match self.archived.as_deref().map(str::trim) {
			None | Some("") | Some("false") | Some("0") => Ok(Some(false)),
			Some("true") | Some("1") => Ok(Some(true)),
			Some("all") => Ok(None),
			Some(other) => Err(AppError::validation(format!(
				"archived must be true, false or all, got {other}"
			))),
		}
	}
}

pub async fn list(
	State(state): State<SharedState>,
	ApiQuery(params): ApiQuery<ListParams>,
	ApiQuery(filter): ApiQuery<ExpiredFilter>,
) -> Result<Json<Page<ExpiredMedicine>>> {
	let archived = filter.archived()?;
	lifecycle::reconcile(&state.db, lifecycle::today()).await;

	let mut listing = Listing::<ExpiredSort>::new("expired_medicines", "id", &params, &state.config);
	if let Some(archived) = archived {
		listing = listing.filter(Filter::Flag("is_archived", archived));
	}
	Ok(Json(listing.fetch(&state.db).await?))
}

pub async fn expire(
	State(state): State<SharedState>,
	ApiJson(form): ApiJson<ExpireForm>,
) -> Result<(StatusCode, Json<Value>)> {
	let item_no = required(form.item_no, "item_no")?;
	let reason = form
		.reason
		.as_deref()
		.map(str::trim)
		.filter(|r| !r.is_empty())
		.unwrap_or(lifecycle::MANUAL_EXPIRE_REASON);

	let id = lifecycle::expire(&state.db, item_no, reason, lifecycle::today()).await?;

	Ok((
		StatusCode::CREATED,
		Json(json!({ "message": "Medicine moved to expired list", "id": id, "item_no": item_no })),
	))
}

pub async fn update(
	State(state): State<SharedState>,
	user: Option<CurrentUser>,
	ApiJson(form): ApiJson<ExpiredUpdateForm>,
) -> Result<Json<Value>> {
	let id = required(form.id, "id")?;

	match form.archive {
		Some(_) if !form.fields.is_empty() => Err(AppError::validation(
			"archive cannot be combined with field updates",
		)),
		Some(true) => {
			let reason = form
				.reason
				.as_deref()
				.map(str::trim)
				.filter(|r| !r.is_empty())
				.unwrap_or(lifecycle::ARCHIVE_REASON);
			let archived_id = lifecycle::archive(&state.db, ArchiveKind::Expired, id, reason, &actor(&user)).await?;
			Ok(Json(json!({ "message": "Expired medicine archived", "id": id, "archived_id": archived_id })))
		}
		Some(false) => {
			lifecycle::unarchive_expired(&state.db, id).await?;
			Ok(Json(json!({ "message": "Expired medicine unarchived", "id": id })))
		}
		None => {
			if form.fields.is_empty() && form.reason.is_none() {
				return Err(AppError::validation("archive or at least one field to update is required"));
			}
			let expired = inventory::update_expired(&state.db, id, &form.fields, form.reason.as_deref()).await?;
			Ok(Json(json!({ "message": "Expired medicine updated", "medicine": expired })))
		}
	}
}

pub async fn remove(
	State(state): State<SharedState>,
	user: Option<CurrentUser>,
	ApiQuery(param): ApiQuery<IdParam>,
) -> Result<Json<Value>> {
	let id = required(param.id, "id")?;
	let archived_id = lifecycle::delete_expired(&state.db, id, lifecycle::today(), &actor(&user))
		.await
		.map_err(|e| e.with_suggestion(DELETE_SUGGESTION))?;

	Ok(Json(json!({
		"message": "Expired medicine permanently deleted",
		"id": id,
		"archived_id": archived_id,
	})))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn filter(raw: Option<&str>) -> Result<Option<bool>> {
		ExpiredFilter {
			archived: raw.map(String::from),
		}
		.archived()
	}

	#[test]
	fn archived_filter_defaults_to_live_rows() {
		assert_eq!(filter(None).unwrap(), Some(false));
		assert_eq!(filter(Some("true")).unwrap(), Some(true));
		assert_eq!(filter(Some("all")).unwrap(), None);
		assert!(filter(Some("maybe")).is_err());
	}
}
