use chrono::{Duration, NaiveDate};
use serde::Serialize;
use sqlx::{FromRow, QueryBuilder, Sqlite};
use tracing::info;

use crate::{
	error::{AppError, Result},
	sql::DB,
	types::{DetailsPatch, ExpiredId, ExpiredMedicine, ItemNo, Medicine, MedicineDetails},
};

impl DetailsPatch {
	/// Rejects blank text and negative balances among the fields that are set.
	pub fn validate(&self) -> Result<()> {
		let texts = [
			("drug_description", &self.drug_description),
			("brand_name", &self.brand_name),
			("lot_batch_no", &self.lot_batch_no),
		];
		for (name, value) in texts {
			if matches!(value, Some(v) if v.trim().is_empty()) {
				return Err(AppError::validation(format!("{name} must not be empty")));
			}
		}
		if matches!(self.physical_balance, Some(n) if n < 0) {
			return Err(AppError::validation("physical_balance must not be negative"));
		}
		Ok(())
	}

	/// Every field present, as needed for a new record.
	pub fn complete(&self) -> Result<MedicineDetails> {
		self.validate()?;
		let missing = |name: &str| AppError::validation(format!("{name} is required"));
		Ok(MedicineDetails {
			drug_description: self
				.drug_description
				.as_deref()
				.map(str::trim)
				.ok_or_else(|| missing("drug_description"))?
				.to_string(),
			brand_name: self
				.brand_name
				.as_deref()
				.map(str::trim)
				.ok_or_else(|| missing("brand_name"))?
				.to_string(),
			lot_batch_no: self
				.lot_batch_no
				.as_deref()
				.map(str::trim)
				.ok_or_else(|| missing("lot_batch_no"))?
				.to_string(),
			expiry_date: self.expiry_date.ok_or_else(|| missing("expiry_date"))?,
			physical_balance: self.physical_balance.ok_or_else(|| missing("physical_balance"))?,
		})
	}

	fn push_assignments(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
		let mut sep = qb.separated(", ");
		if let Some(v) = &self.drug_description {
			sep.push("drug_description = ").push_bind_unseparated(v.trim().to_string());
		}
		if let Some(v) = &self.brand_name {
			sep.push("brand_name = ").push_bind_unseparated(v.trim().to_string());
		}
		if let Some(v) = &self.lot_batch_no {
			sep.push("lot_batch_no = ").push_bind_unseparated(v.trim().to_string());
		}
		if let Some(v) = self.expiry_date {
			sep.push("expiry_date = ").push_bind_unseparated(v);
		}
		if let Some(v) = self.physical_balance {
			sep.push("physical_balance = ").push_bind_unseparated(v);
		}
	}
}

pub async fn create(db: &DB, details: &MedicineDetails) -> Result<ItemNo> {
	let done = sqlx::query(
		"INSERT INTO medicines
			(drug_description, brand_name, lot_batch_no, expiry_date, physical_balance)
		VALUES (?, ?, ?, ?, ?)",
	)
	.bind(&details.drug_description)
	.bind(&details.brand_name)
	.bind(&details.lot_batch_no)
	.bind(details.expiry_date)
	.bind(details.physical_balance)
	.execute(db)
	.await?;

	let item_no = done.last_insert_rowid();
	info!("Created medicine {item_no} ({})", details.drug_description);
	Ok(item_no)
}

pub async fn get(db: &DB, item_no: ItemNo) -> Result<Option<Medicine>> {
	let medicine = sqlx::query_as("SELECT * FROM medicines WHERE item_no = ?")
		.bind(item_no)
		.fetch_optional(db)
		.await?;
	Ok(medicine)
}

pub async fn update(db: &DB, item_no: ItemNo, patch: &DetailsPatch) -> Result<Medicine> {
	patch.validate()?;
	if !patch.is_empty() {
		let mut qb = QueryBuilder::<Sqlite>::new("UPDATE medicines SET ");
		patch.push_assignments(&mut qb);
		qb.push(" WHERE item_no = ").push_bind(item_no);
		let done = qb.build().execute(db).await?;
		if done.rows_affected() == 0 {
			return Err(AppError::not_found(format!("Medicine {item_no} not found")));
		}
		info!("Updated medicine {item_no}");
	}

	get(db, item_no)
		.await?
		.ok_or_else(|| AppError::not_found(format!("Medicine {item_no} not found")))
}

pub async fn delete(db: &DB, item_no: ItemNo) -> Result<()> {
	let done = sqlx::query("DELETE FROM medicines WHERE item_no = ?")
		.bind(item_no)
		.execute(db)
		.await?;
	if done.rows_affected() == 0 {
		return Err(AppError::not_found(format!("Medicine {item_no} not found")));
	}
	info!("Deleted medicine {item_no}");
	Ok(())
}

/// In-place edit of an expired record. A pushed-forward expiry date is left for
/// the next un-expiry sweep to act on.
pub async fn update_expired(
	db: &DB,
	id: ExpiredId,
	patch: &DetailsPatch,
	reason: Option<&str>,
) -> Result<ExpiredMedicine> {
	patch.validate()?;
	let reason = reason.map(str::trim);
	if matches!(reason, Some("")) {
		return Err(AppError::validation("reason must not be empty"));
	}

	if !patch.is_empty() || reason.is_some() {
		let mut qb = QueryBuilder::<Sqlite>::new("UPDATE expired_medicines SET ");
		if let Some(reason) = reason {
			qb.push("reason = ").push_bind(reason.to_string());
			if !patch.is_empty() {
				qb.push(", ");
			}
		}
		patch.push_assignments(&mut qb);
		qb.push(" WHERE id = ").push_bind(id);
		let done = qb.build().execute(db).await?;
		if done.rows_affected() == 0 {
			return Err(AppError::not_found(format!("Expired medicine {id} not found")));
		}
		info!("Updated expired record {id}");
	}

	sqlx::query_as("SELECT * FROM expired_medicines WHERE id = ?")
		.bind(id)
		.fetch_optional(db)
		.await?
		.ok_or_else(|| AppError::not_found(format!("Expired medicine {id} not found")))
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, FromRow)]
pub struct Dashboard {
	pub total_medicines: i64,
	pub total_stock: i64,
	pub low_stock: i64,
	pub expiring_soon: i64,
	pub expired: i64,
	pub archived: i64,
}

pub async fn dashboard(db: &DB, today: NaiveDate, low_stock_threshold: i64, warning_days: i64) -> Result<Dashboard> {
	let horizon = today + Duration::days(warning_days);
	let stats = sqlx::query_as(
		"SELECT
			(SELECT COUNT(*) FROM medicines) AS total_medicines,
			(SELECT COALESCE(SUM(physical_balance), 0) FROM medicines) AS total_stock,
			(SELECT COUNT(*) FROM medicines WHERE physical_balance < ?) AS low_stock,
			(SELECT COUNT(*) FROM medicines WHERE expiry_date > ? AND expiry_date <= ?) AS expiring_soon,
			(SELECT COUNT(*) FROM expired_medicines WHERE is_archived = false) AS expired,
			(SELECT COUNT(*) FROM archived_medicines) AS archived",
	)
	.bind(low_stock_threshold)
	.bind(today)
	.bind(horizon)
	.fetch_one(db)
	.await?;
	Ok(stats)
}
