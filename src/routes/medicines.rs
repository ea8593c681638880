use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use super::{required, ApiJson, ApiQuery};
use crate::{
	error::Result,
	inventory, lifecycle,
	listing::{ListParams, Listing, MedicineSort, Page},
	state::SharedState,
	types::{DetailsPatch, ItemParam, Medicine, UpdateMedicineForm},
};

pub async fn list(
	State(state): State<SharedState>,
	ApiQuery(params): ApiQuery<ListParams>,
) -> Result<Json<Page<Medicine>>> {
	lifecycle::reconcile(&state.db, lifecycle::today()).await;

	let page = Listing::<MedicineSort>::new("medicines", "item_no", &params, &state.config)
		.fetch(&state.db)
		.await?;
	Ok(Json(page))
}

pub async fn create(
	State(state): State<SharedState>,
	ApiJson(form): ApiJson<DetailsPatch>,
) -> Result<(StatusCode, Json<Value>)> {
	let details = form.complete()?;
	let item_no = inventory::create(&state.db, &details).await?;

	Ok((
		StatusCode::CREATED,
		Json(json!({ "message": "Medicine added", "item_no": item_no })),
	))
}

pub async fn update(
	State(state): State<SharedState>,
	ApiJson(form): ApiJson<UpdateMedicineForm>,
) -> Result<Json<Value>> {
	let item_no = required(form.item_no, "item_no")?;
	let medicine = inventory::update(&state.db, item_no, &form.fields).await?;

	Ok(Json(json!({ "message": "Medicine updated", "medicine": medicine })))
}

pub async fn remove(
	State(state): State<SharedState>,
	ApiQuery(param): ApiQuery<ItemParam>,
) -> Result<Json<Value>> {
	let item_no = required(param.item_no, "item_no")?;
	inventory::delete(&state.db, item_no).await?;

	Ok(Json(json!({ "message": "Medicine deleted", "item_no": item_no })))
}
