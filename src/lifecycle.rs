//! Moves a medicine between `medicines`, `expired_medicines` and
//! `archived_medicines`.
//!
//! Every transition runs in one transaction whose first statement is a no-op
//! `UPDATE` of the source row. SQLite has no `SELECT ... FOR UPDATE`; the touch
//! takes the database write lock up front so concurrent transitions on the same
//! record queue behind each other, and its affected-row count doubles as the
//! existence check. Dropping a transaction on an error path rolls it back.

use chrono::{DateTime, Local, NaiveDate, Utc};
use sqlx::SqliteConnection;
use tracing::{info, warn};

use crate::{
	error::{AppError, Result},
	sql::DB,
	types::{ArchiveKind, ArchivedId, ArchivedMedicine, ExpiredId, ExpiredMedicine, ItemNo, Medicine, MedicineDetails},
};

pub const SYSTEM_ACTOR: &str = "system";
pub const AUTO_EXPIRE_REASON: &str = "Automatically expired";
pub const MANUAL_EXPIRE_REASON: &str = "Manually expired";
pub const ARCHIVE_REASON: &str = "Archived";

pub fn today() -> NaiveDate {
	Local::now().date_naive()
}

#[derive(Debug, Clone)]
pub struct Restored {
	pub target: ArchiveKind,
	pub item_no: ItemNo,
	/// Row id in the target table (the item number itself for `active`).
	pub id: i64,
}

async fn touch_medicine(conn: &mut SqliteConnection, item_no: ItemNo) -> Result<bool> {
	let done = sqlx::query("UPDATE medicines SET item_no = item_no WHERE item_no = ?")
		.bind(item_no)
		.execute(conn)
		.await?;
	Ok(done.rows_affected() > 0)
}

async fn touch_expired(conn: &mut SqliteConnection, id: ExpiredId) -> Result<bool> {
	let done = sqlx::query("UPDATE expired_medicines SET id = id WHERE id = ?")
		.bind(id)
		.execute(conn)
		.await?;
	Ok(done.rows_affected() > 0)
}

async fn touch_archived(conn: &mut SqliteConnection, id: ArchivedId) -> Result<bool> {
	let done = sqlx::query("UPDATE archived_medicines SET id = id WHERE id = ?")
		.bind(id)
		.execute(conn)
		.await?;
	Ok(done.rows_affected() > 0)
}

async fn fetch_medicine(conn: &mut SqliteConnection, item_no: ItemNo) -> Result<Medicine> {
	sqlx::query_as::<_, Medicine>("SELECT * FROM medicines WHERE item_no = ?")
		.bind(item_no)
		.fetch_optional(conn)
		.await?
		.ok_or_else(|| AppError::not_found(format!("Medicine {item_no} not found")))
}

async fn fetch_expired(conn: &mut SqliteConnection, id: ExpiredId) -> Result<ExpiredMedicine> {
	sqlx::query_as::<_, ExpiredMedicine>("SELECT * FROM expired_medicines WHERE id = ?")
		.bind(id)
		.fetch_optional(conn)
		.await?
		.ok_or_else(|| AppError::not_found(format!("Expired medicine {id} not found")))
}

async fn fetch_archived(conn: &mut SqliteConnection, id: ArchivedId) -> Result<ArchivedMedicine> {
	sqlx::query_as::<_, ArchivedMedicine>("SELECT * FROM archived_medicines WHERE id = ?")
		.bind(id)
		.fetch_optional(conn)
		.await?
		.ok_or_else(|| AppError::not_found(format!("Archived medicine {id} not found")))
}

async fn has_active(conn: &mut SqliteConnection, item_no: ItemNo) -> Result<bool> {
	let found = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM medicines WHERE item_no = ?)")
		.bind(item_no)
		.fetch_one(conn)
		.await?;
	Ok(found)
}

async fn has_live_expired(conn: &mut SqliteConnection, item_no: ItemNo) -> Result<bool> {
	let found = sqlx::query_scalar(
		"SELECT EXISTS(SELECT 1 FROM expired_medicines WHERE original_item_no = ? AND is_archived = false)",
	)
	.bind(item_no)
	.fetch_one(conn)
	.await?;
	Ok(found)
}

/// Where the single live record for `item_no` sits, if anywhere.
pub async fn live_record(conn: &mut SqliteConnection, item_no: ItemNo) -> Result<Option<ArchiveKind>> {
	if has_active(conn, item_no).await? {
		return Ok(Some(ArchiveKind::Active));
	}
	Ok(has_live_expired(conn, item_no).await?.then_some(ArchiveKind::Expired))
}

async fn insert_medicine(conn: &mut SqliteConnection, item_no: ItemNo, details: &MedicineDetails) -> Result<()> {
	sqlx::query(
		"INSERT INTO medicines
			(item_no, drug_description, brand_name, lot_batch_no, expiry_date, physical_balance)
		VALUES (?, ?, ?, ?, ?, ?)",
	)
	.bind(item_no)
	.bind(&details.drug_description)
	.bind(&details.brand_name)
	.bind(&details.lot_batch_no)
	.bind(details.expiry_date)
	.bind(details.physical_balance)
	.execute(conn)
	.await?;
	Ok(())
}

async fn insert_expired(
	conn: &mut SqliteConnection,
	item_no: ItemNo,
	details: &MedicineDetails,
	reason: &str,
	now: DateTime<Utc>,
) -> Result<ExpiredId> {
	let done = sqlx::query(
		"INSERT INTO expired_medicines
			(original_item_no, drug_description, brand_name, lot_batch_no, expiry_date, physical_balance,
			reason, expired_at, is_archived)
		VALUES (?, ?, ?, ?, ?, ?, ?, ?, false)",
	)
	.bind(item_no)
	.bind(&details.drug_description)
	.bind(&details.brand_name)
	.bind(&details.lot_batch_no)
	.bind(details.expiry_date)
	.bind(details.physical_balance)
	.bind(reason)
	.bind(now)
	.execute(conn)
	.await?;
	Ok(done.last_insert_rowid())
}

async fn insert_archived(
	conn: &mut SqliteConnection,
	item_no: ItemNo,
	details: &MedicineDetails,
	reason: &str,
	kind: ArchiveKind,
	actor: &str,
	now: DateTime<Utc>,
) -> Result<ArchivedId> {
	let done = sqlx::query(
		"INSERT INTO archived_medicines
			(original_item_no, drug_description, brand_name, lot_batch_no, expiry_date, physical_balance,
			reason, type, archived_at, archived_by)
		VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
	)
	.bind(item_no)
	.bind(&details.drug_description)
	.bind(&details.brand_name)
	.bind(&details.lot_batch_no)
	.bind(details.expiry_date)
	.bind(details.physical_balance)
	.bind(reason)
	.bind(kind)
	.bind(now)
	.bind(actor)
	.execute(conn)
	.await?;
	Ok(done.last_insert_rowid())
}

/// Active -> Expired on request.
pub async fn expire(db: &DB, item_no: ItemNo, reason: &str, today: NaiveDate) -> Result<ExpiredId> {
	let mut tx = db.begin().await?;

	if !touch_medicine(&mut tx, item_no).await? {
		return Err(AppError::not_found(format!("Medicine {item_no} not found")));
	}
	let medicine = fetch_medicine(&mut tx, item_no).await?;

	if medicine.details.expiry_date > today {
		return Err(AppError::invalid_transition(format!(
			"Medicine {item_no} does not expire until {}",
			medicine.details.expiry_date
		)));
	}

	if has_live_expired(&mut tx, item_no).await? {
		return Err(AppError::conflict(format!("Medicine {item_no} is already in the expired list")));
	}

	let id = insert_expired(&mut tx, item_no, &medicine.details, reason, Utc::now()).await?;
	sqlx::query("DELETE FROM medicines WHERE item_no = ?")
		.bind(item_no)
		.execute(&mut *tx)
		.await?;

	tx.commit().await?;
	info!("Expired medicine {item_no} as expired record {id}");
	Ok(id)
}

/// Moves every active record whose expiry date has been reached into the
/// expired table. Returns how many moved.
pub async fn expire_due(db: &DB, today: NaiveDate) -> Result<u64> {
	let mut tx = db.begin().await?;

	sqlx::query("UPDATE medicines SET item_no = item_no WHERE expiry_date <= ?")
		.bind(today)
		.execute(&mut *tx)
		.await?;
	let due = sqlx::query_as::<_, Medicine>("SELECT * FROM medicines WHERE expiry_date <= ? ORDER BY item_no")
		.bind(today)
		.fetch_all(&mut *tx)
		.await?;

	let now = Utc::now();
	let mut moved = 0;
	for medicine in due {
		if has_live_expired(&mut tx, medicine.item_no).await? {
			warn!("Medicine {} already has a live expired record, leaving it active", medicine.item_no);
			continue;
		}
		insert_expired(&mut tx, medicine.item_no, &medicine.details, AUTO_EXPIRE_REASON, now).await?;
		sqlx::query("DELETE FROM medicines WHERE item_no = ?")
			.bind(medicine.item_no)
			.execute(&mut *tx)
			.await?;
		moved += 1;
	}

	tx.commit().await?;
	if moved > 0 {
		info!("Moved {moved} due medicines to the expired list");
	}
	Ok(moved)
}

/// Moves every non-archived expired record whose expiry date now lies in the
/// future back into the active table under its original item number.
pub async fn unexpire(db: &DB, today: NaiveDate) -> Result<u64> {
	let mut tx = db.begin().await?;

	sqlx::query("UPDATE expired_medicines SET id = id WHERE is_archived = false AND expiry_date > ?")
		.bind(today)
		.execute(&mut *tx)
		.await?;
	let revived = sqlx::query_as::<_, ExpiredMedicine>(
		"SELECT * FROM expired_medicines WHERE is_archived = false AND expiry_date > ? ORDER BY id",
	)
	.bind(today)
	.fetch_all(&mut *tx)
	.await?;

	let mut moved = 0;
	for expired in revived {
		if has_active(&mut tx, expired.original_item_no).await? {
			warn!(
				"Medicine {} is already active, keeping expired record {}",
				expired.original_item_no, expired.id
			);
			continue;
		}
		insert_medicine(&mut tx, expired.original_item_no, &expired.details).await?;
		sqlx::query("DELETE FROM expired_medicines WHERE id = ?")
			.bind(expired.id)
			.execute(&mut *tx)
			.await?;
		moved += 1;
	}

	tx.commit().await?;
	if moved > 0 {
		info!("Returned {moved} medicines with future expiry dates to the active list");
	}
	Ok(moved)
}

/// Both lazy corrections, best-effort: failures are logged and swallowed so the
/// read that triggered them still goes ahead.
pub async fn reconcile(db: &DB, today: NaiveDate) {
	if let Err(e) = expire_due(db, today).await {
		warn!("Expiry sweep failed: {e}");
	}
	if let Err(e) = unexpire(db, today).await {
		warn!("Un-expiry sweep failed: {e}");
	}
}

/// Active|Expired -> Archived. `id` is the item number for `Active` and the
/// expired record id for `Expired`.
pub async fn archive(db: &DB, kind: ArchiveKind, id: i64, reason: &str, actor: &str) -> Result<ArchivedId> {
	let mut tx = db.begin().await?;
	let now = Utc::now();

	let archived_id = match kind {
		ArchiveKind::Active => {
			if !touch_medicine(&mut tx, id).await? {
				return Err(AppError::not_found(format!("Medicine {id} not found")));
			}
			let medicine = fetch_medicine(&mut tx, id).await?;
			let archived_id = insert_archived(&mut tx, id, &medicine.details, reason, kind, actor, now).await?;
			sqlx::query("DELETE FROM medicines WHERE item_no = ?")
				.bind(id)
				.execute(&mut *tx)
				.await?;
			archived_id
		}
		ArchiveKind::Expired => {
			if !touch_expired(&mut tx, id).await? {
				return Err(AppError::not_found(format!("Expired medicine {id} not found")));
			}
			let expired = fetch_expired(&mut tx, id).await?;
			if expired.is_archived {
				return Err(AppError::conflict(format!("Expired medicine {id} is already archived")));
			}
			let archived_id = insert_archived(
				&mut tx,
				expired.original_item_no,
				&expired.details,
				reason,
				kind,
				actor,
				now,
			)
			.await?;
			sqlx::query(
				"UPDATE expired_medicines SET is_archived = true, archived_at = ?, archived_by = ? WHERE id = ?",
			)
			.bind(now)
			.bind(actor)
			.bind(id)
			.execute(&mut *tx)
			.await?;
			archived_id
		}
	};

	tx.commit().await?;
	info!("Archived {kind} record {id} as archived record {archived_id}");
	Ok(archived_id)
}

/// Clears the archival flag of an expired record and consumes the archived copy
/// made when it was flagged.
pub async fn unarchive_expired(db: &DB, id: ExpiredId) -> Result<()> {
	let mut tx = db.begin().await?;

	if !touch_expired(&mut tx, id).await? {
		return Err(AppError::not_found(format!("Expired medicine {id} not found")));
	}
	let expired = fetch_expired(&mut tx, id).await?;
	if !expired.is_archived {
		return Err(AppError::conflict(format!("Expired medicine {id} is not archived")));
	}
	if let Some(kind) = live_record(&mut tx, expired.original_item_no).await? {
		return Err(AppError::conflict(format!(
			"Medicine {} already has a live {kind} record",
			expired.original_item_no
		)));
	}

	sqlx::query("UPDATE expired_medicines SET is_archived = false, archived_at = NULL, archived_by = NULL WHERE id = ?")
		.bind(id)
		.execute(&mut *tx)
		.await?;
	sqlx::query(
		"DELETE FROM archived_medicines WHERE id = (
			SELECT id FROM archived_medicines
			WHERE original_item_no = ? AND type = 'expired'
			ORDER BY archived_at DESC, id DESC LIMIT 1
		)",
	)
	.bind(expired.original_item_no)
	.execute(&mut *tx)
	.await?;

	tx.commit().await?;
	info!("Unarchived expired record {id}");
	Ok(())
}

/// Permanently removes an expired record, first making sure an archived copy
/// of it exists. Returns that archived record's id.
pub async fn delete_expired(db: &DB, id: ExpiredId, today: NaiveDate, actor: &str) -> Result<ArchivedId> {
	let mut tx = db.begin().await?;

	if !touch_expired(&mut tx, id).await? {
		return Err(AppError::not_found(format!("Expired medicine {id} not found")));
	}
	let expired = fetch_expired(&mut tx, id).await?;
	if expired.details.expiry_date > today {
		return Err(AppError::invalid_transition(format!(
			"Expired medicine {id} has a future expiry date ({}); it should be returned to the active list",
			expired.details.expiry_date
		)));
	}

	let existing: Option<ArchivedId> = if expired.is_archived {
		sqlx::query_scalar(
			"SELECT id FROM archived_medicines WHERE original_item_no = ? AND type = 'expired'
			ORDER BY id DESC LIMIT 1",
		)
		.bind(expired.original_item_no)
		.fetch_optional(&mut *tx)
		.await?
	} else {
		None
	};
	let archived_id = match existing {
		Some(archived_id) => archived_id,
		None => {
			insert_archived(
				&mut tx,
				expired.original_item_no,
				&expired.details,
				&expired.reason,
				ArchiveKind::Expired,
				actor,
				Utc::now(),
			)
			.await?
		}
	};

	sqlx::query("DELETE FROM expired_medicines WHERE id = ?")
		.bind(id)
		.execute(&mut *tx)
		.await?;

	tx.commit().await?;
	info!("Deleted expired record {id}, kept as archived record {archived_id}");
	Ok(archived_id)
}

/// Archived -> Active|Expired. `new_expiry` replaces the archived expiry date.
pub async fn restore(
	db: &DB,
	id: ArchivedId,
	target: ArchiveKind,
	new_expiry: Option<NaiveDate>,
) -> Result<Restored> {
	let mut tx = db.begin().await?;

	if !touch_archived(&mut tx, id).await? {
		return Err(AppError::not_found(format!("Archived medicine {id} not found")));
	}
	let archived = fetch_archived(&mut tx, id).await?;
	let item_no = archived.original_item_no;

	if let Some(kind) = live_record(&mut tx, item_no).await? {
		return Err(AppError::conflict(format!("Medicine {item_no} already has a live {kind} record")));
	}

	let mut details = archived.details;
	if let Some(expiry) = new_expiry {
		details.expiry_date = expiry;
	}

	let restored_id = match target {
		ArchiveKind::Active => {
			insert_medicine(&mut tx, item_no, &details).await?;
			sqlx::query("DELETE FROM expired_medicines WHERE original_item_no = ? AND is_archived = true")
				.bind(item_no)
				.execute(&mut *tx)
				.await?;
			item_no
		}
		ArchiveKind::Expired => {
			let flagged: Option<ExpiredId> = sqlx::query_scalar(
				"SELECT id FROM expired_medicines WHERE original_item_no = ? AND is_archived = true
				ORDER BY id DESC LIMIT 1",
			)
			.bind(item_no)
			.fetch_optional(&mut *tx)
			.await?;

			match flagged {
				Some(expired_id) => {
					sqlx::query(
						"UPDATE expired_medicines SET
							drug_description = ?, brand_name = ?, lot_batch_no = ?, expiry_date = ?,
							physical_balance = ?, reason = ?,
							is_archived = false, archived_at = NULL, archived_by = NULL
						WHERE id = ?",
					)
					.bind(&details.drug_description)
					.bind(&details.brand_name)
					.bind(&details.lot_batch_no)
					.bind(details.expiry_date)
					.bind(details.physical_balance)
					.bind(&archived.reason)
					.bind(expired_id)
					.execute(&mut *tx)
					.await?;
					expired_id
				}
				None => insert_expired(&mut tx, item_no, &details, &archived.reason, Utc::now()).await?,
			}
		}
	};

	sqlx::query("DELETE FROM archived_medicines WHERE id = ?")
		.bind(id)
		.execute(&mut *tx)
		.await?;

	tx.commit().await?;
	info!("Restored archived record {id} to {target} as {restored_id}");
	Ok(Restored {
		target,
		item_no,
		id: restored_id,
	})
}

/// Terminal: drops an archived record for good.
pub async fn delete_archived(db: &DB, id: ArchivedId) -> Result<()> {
	let done = sqlx::query("DELETE FROM archived_medicines WHERE id = ?")
		.bind(id)
		.execute(db)
		.await?;
	if done.rows_affected() == 0 {
		return Err(AppError::not_found(format!("Archived medicine {id} not found")));
	}
	info!("Permanently deleted archived record {id}");
	Ok(())
}
