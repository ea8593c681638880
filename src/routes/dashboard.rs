use axum::{extract::State, Json};

use crate::{
	error::Result,
	inventory::{self, Dashboard},
	lifecycle,
	state::SharedState,
};

pub async fn summary(State(state): State<SharedState>) -> Result<Json<Dashboard>> {
	let today = lifecycle::today();
	lifecycle::reconcile(&state.db, today).await;

	let stats = inventory::dashboard(
		&state.db,
		today,
		state.config.low_stock_threshold,
		state.config.expiry_warning_days,
	)
	.await?;
	Ok(Json(stats))
}
