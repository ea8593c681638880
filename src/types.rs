use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Item number of an active medicine; expired and archived copies keep it as
/// `original_item_no`.
pub type ItemNo = i64;
pub type ExpiredId = i64;
pub type ArchivedId = i64;
pub type Uid = i64;

/// The descriptive part of a medicine, carried unchanged through every table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct MedicineDetails {
	pub drug_description: String,
	pub brand_name: String,
	pub lot_batch_no: String,
	pub expiry_date: NaiveDate,
	pub physical_balance: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Medicine {
	pub item_no: ItemNo,
	#[sqlx(flatten)]
	#[serde(flatten)]
	pub details: MedicineDetails,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ExpiredMedicine {
	pub id: ExpiredId,
	pub original_item_no: ItemNo,
	#[sqlx(flatten)]
	#[serde(flatten)]
	pub details: MedicineDetails,
	pub reason: String,
	pub expired_at: DateTime<Utc>,
	pub is_archived: bool,
	pub archived_at: Option<DateTime<Utc>>,
	pub archived_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ArchivedMedicine {
	pub id: ArchivedId,
	pub original_item_no: ItemNo,
	#[sqlx(flatten)]
	#[serde(flatten)]
	pub details: MedicineDetails,
	pub reason: String,
	#[sqlx(rename = "type")]
	#[serde(rename = "type")]
	pub kind: ArchiveKind,
	pub archived_at: DateTime<Utc>,
	pub archived_by: String,
}

/// Which lifecycle table an archived record came from, or is restored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ArchiveKind {
	Active,
	Expired,
}

impl ArchiveKind {
	pub fn as_str(self) -> &'static str {
		match self {
			ArchiveKind::Active => "active",
			ArchiveKind::Expired => "expired",
		}
	}

	pub fn parse(raw: &str) -> Option<Self> {
		match raw.trim().to_ascii_lowercase().as_str() {
			"active" => Some(ArchiveKind::Active),
			"expired" => Some(ArchiveKind::Expired),
			_ => None,
		}
	}
}

impl std::fmt::Display for ArchiveKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Account {
	pub id: Uid,
	pub name: String,
	pub email: String,
	#[serde(skip)]
	pub password_hash: String,
	pub created_at: DateTime<Utc>,
}

/// Partial set of descriptive fields; `None` leaves the stored value alone.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DetailsPatch {
	pub drug_description: Option<String>,
	pub brand_name: Option<String>,
	pub lot_batch_no: Option<String>,
	pub expiry_date: Option<NaiveDate>,
	pub physical_balance: Option<i64>,
}

impl DetailsPatch {
	pub fn is_empty(&self) -> bool {
		self.drug_description.is_none()
			&& self.brand_name.is_none()
			&& self.lot_batch_no.is_none()
			&& self.expiry_date.is_none()
			&& self.physical_balance.is_none()
	}
}

#[derive(Debug, Deserialize)]
pub struct UpdateMedicineForm {
	pub item_no: Option<ItemNo>,
	#[serde(flatten)]
	pub fields: DetailsPatch,
}

#[derive(Debug, Deserialize)]
pub struct ItemParam {
	pub item_no: Option<ItemNo>,
}

#[derive(Debug, Deserialize)]
pub struct IdParam {
	pub id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ExpireForm {
	pub item_no: Option<ItemNo>,
	pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExpiredUpdateForm {
	pub id: Option<ExpiredId>,
	pub archive: Option<bool>,
	pub reason: Option<String>,
	#[serde(flatten)]
	pub fields: DetailsPatch,
}

#[derive(Debug, Deserialize)]
pub struct ArchiveForm {
	pub id: Option<i64>,
	#[serde(rename = "type")]
	pub kind: Option<String>,
	pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreForm {
	pub id: Option<ArchivedId>,
	pub restore_to: Option<String>,
	pub new_expiry_date: Option<NaiveDate>,
}

#[derive(Deserialize, Debug)]
pub struct FormLogin {
	pub email: Option<String>,
	pub password: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct FormRegister {
	pub name: Option<String>,
	pub email: Option<String>,
	pub password: Option<String>,
}
