use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{actor, required, ApiJson, ApiQuery};
use crate::{
	auth::CurrentUser,
	error::{AppError, Result},
	lifecycle,
	listing::{ArchiveSort, Filter, ListParams, Listing, Page},
	state::SharedState,
	types::{ArchiveForm, ArchiveKind, ArchivedMedicine, IdParam, RestoreForm},
};

const DELETE_SUGGESTION: &str = "Check that the archived_medicines table exists and is writable";

#[derive(Debug, Default, Deserialize)]
pub struct ArchiveFilter {
	#[serde(rename = "type")]
	pub kind: Option<String>,
}

fn parse_kind(raw: Option<&str>, name: &str) -> Result<ArchiveKind> {
	let raw = required(raw, name)?;
	ArchiveKind::parse(raw)
		.ok_or_else(|| AppError::validation(format!("{name} must be active or expired, got {raw}")))
}

pub async fn list(
	State(state): State<SharedState>,
	ApiQuery(params): ApiQuery<ListParams>,
	ApiQuery(filter): ApiQuery<ArchiveFilter>,
) -> Result<Json<Page<ArchivedMedicine>>> {
	let mut listing = Listing::<ArchiveSort>::new("archived_medicines", "id", &params, &state.config);
	match filter.kind.as_deref().map(str::trim) {
		None | Some("") | Some("all") => {}
		Some(raw) => {
			let kind = parse_kind(Some(raw), "type")?;
			listing = listing.filter(Filter::Text("type", kind.as_str()));
		}
	}
	Ok(Json(listing.fetch(&state.db).await?))
}

pub async fn create(
	State(state): State<SharedState>,
	user: Option<CurrentUser>,
	ApiJson(form): ApiJson<ArchiveForm>,
) -> Result<(StatusCode, Json<Value>)> {
	let id = required(form.id, "id")?;
	let kind = parse_kind(form.kind.as_deref(), "type")?;
	let reason = form
		.reason
		.as_deref()
		.map(str::trim)
		.filter(|r| !r.is_empty())
		.unwrap_or(lifecycle::ARCHIVE_REASON);

	let archived_id = lifecycle::archive(&state.db, kind, id, reason, &actor(&user)).await?;

	Ok((
		StatusCode::CREATED,
		Json(json!({ "message": format!("Archived {kind} record"), "id": archived_id, "source_id": id })),
	))
}

pub async fn restore(
	State(state): State<SharedState>,
	ApiJson(form): ApiJson<RestoreForm>,
) -> Result<Json<Value>> {
	let id = required(form.id, "id")?;
	let target = parse_kind(form.restore_to.as_deref(), "restoreTo")?;

	let restored = lifecycle::restore(&state.db, id, target, form.new_expiry_date).await?;

	Ok(Json(json!({
		"message": format!("Record restored to {target}"),
		"restoredTo": restored.target,
		"item_no": restored.item_no,
		"id": restored.id,
	})))
}

pub async fn remove(
	State(state): State<SharedState>,
	ApiQuery(param): ApiQuery<IdParam>,
) -> Result<Json<Value>> {
	let id = required(param.id, "id")?;
	lifecycle::delete_archived(&state.db, id)
		.await
		.map_err(|e| e.with_suggestion(DELETE_SUGGESTION))?;

	Ok(Json(json!({ "message": "Archived record permanently deleted", "id": id })))
}
