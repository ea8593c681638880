//! Paginated, searchable, sortable reads shared by every list endpoint.
//!
//! Sort columns come from per-table enums, never from the query string, so the
//! only text spliced into SQL is an allow-listed column name. Everything the
//! caller supplies is bound as a parameter.

use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, FromRow, QueryBuilder, Row, Sqlite};

use crate::{config::Config, sql::DB};

/// Columns every medicine table shares and free-text search looks at.
const SEARCH_COLUMNS: [&str; 3] = ["drug_description", "brand_name", "lot_batch_no"];

#[derive(Debug, Default, Clone, Deserialize)]
pub struct ListParams {
	pub page: Option<i64>,
	pub limit: Option<i64>,
	pub search: Option<String>,
	pub sort: Option<String>,
	pub order: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
	Asc,
	Desc,
}

impl Order {
	pub fn resolve(raw: Option<&str>, default: Order) -> Order {
		match raw.map(|r| r.trim().to_ascii_lowercase()).as_deref() {
			Some("asc") => Order::Asc,
			Some("desc") => Order::Desc,
			_ => default,
		}
	}

	pub fn sql(self) -> &'static str {
		match self {
			Order::Asc => "ASC",
			Order::Desc => "DESC",
		}
	}
}

pub trait SortColumn: Copy + Sized + 'static {
	const DEFAULT: Self;
	const DEFAULT_ORDER: Order;
	const ALL: &'static [Self];

	fn column(self) -> &'static str;

	/// Unknown or missing names fall back to [`SortColumn::DEFAULT`].
	fn resolve(raw: Option<&str>) -> Self {
		raw.map(str::trim)
			.and_then(|raw| Self::ALL.iter().copied().find(|c| c.column().eq_ignore_ascii_case(raw)))
			.unwrap_or(Self::DEFAULT)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MedicineSort {
	ItemNo,
	DrugDescription,
	BrandName,
	LotBatchNo,
	ExpiryDate,
	PhysicalBalance,
}

impl SortColumn for MedicineSort {
	const DEFAULT: Self = MedicineSort::ItemNo;
	const DEFAULT_ORDER: Order = Order::Asc;
	const ALL: &'static [Self] = &[
		MedicineSort::ItemNo,
		MedicineSort::DrugDescription,
		MedicineSort::BrandName,
		MedicineSort::LotBatchNo,
		MedicineSort::ExpiryDate,
		MedicineSort::PhysicalBalance,
	];

	fn column(self) -> &'static str {
		match self {
			MedicineSort::ItemNo => "item_no",
			MedicineSort::DrugDescription => "drug_description",
			MedicineSort::BrandName => "brand_name",
			MedicineSort::LotBatchNo => "lot_batch_no",
			MedicineSort::ExpiryDate => "expiry_date",
			MedicineSort::PhysicalBalance => "physical_balance",
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiredSort {
	ExpiredAt,
	Id,
	OriginalItemNo,
	DrugDescription,
	BrandName,
	LotBatchNo,
	ExpiryDate,
	PhysicalBalance,
	Reason,
}

impl SortColumn for ExpiredSort {
	const DEFAULT: Self = ExpiredSort::ExpiredAt;
	const DEFAULT_ORDER: Order = Order::Desc;
	const ALL: &'static [Self] = &[
		ExpiredSort::ExpiredAt,
		ExpiredSort::Id,
		ExpiredSort::OriginalItemNo,
		ExpiredSort::DrugDescription,
		ExpiredSort::BrandName,
		ExpiredSort::LotBatchNo,
		ExpiredSort::ExpiryDate,
		ExpiredSort::PhysicalBalance,
		ExpiredSort::Reason,
	];

	fn column(self) -> &'static str {
		match self {
			ExpiredSort::ExpiredAt => "expired_at",
			ExpiredSort::Id => "id",
			ExpiredSort::OriginalItemNo => "original_item_no",
			ExpiredSort::DrugDescription => "drug_description",
			ExpiredSort::BrandName => "brand_name",
			ExpiredSort::LotBatchNo => "lot_batch_no",
			ExpiredSort::ExpiryDate => "expiry_date",
			ExpiredSort::PhysicalBalance => "physical_balance",
			ExpiredSort::Reason => "reason",
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveSort {
	ArchivedAt,
	Id,
	OriginalItemNo,
	DrugDescription,
	BrandName,
	LotBatchNo,
	ExpiryDate,
	PhysicalBalance,
	Kind,
}

impl SortColumn for ArchiveSort {
	const DEFAULT: Self = ArchiveSort::ArchivedAt;
	const DEFAULT_ORDER: Order = Order::Desc;
	const ALL: &'static [Self] = &[
		ArchiveSort::ArchivedAt,
		ArchiveSort::Id,
		ArchiveSort::OriginalItemNo,
		ArchiveSort::DrugDescription,
		ArchiveSort::BrandName,
		ArchiveSort::LotBatchNo,
		ArchiveSort::ExpiryDate,
		ArchiveSort::PhysicalBalance,
		ArchiveSort::Kind,
	];

	fn column(self) -> &'static str {
		match self {
			ArchiveSort::ArchivedAt => "archived_at",
			ArchiveSort::Id => "id",
			ArchiveSort::OriginalItemNo => "original_item_no",
			ArchiveSort::DrugDescription => "drug_description",
			ArchiveSort::BrandName => "brand_name",
			ArchiveSort::LotBatchNo => "lot_batch_no",
			ArchiveSort::ExpiryDate => "expiry_date",
			ArchiveSort::PhysicalBalance => "physical_balance",
			ArchiveSort::Kind => "type",
		}
	}
}

/// Extra equality predicates on top of search.
#[derive(Debug, Clone, Copy)]
pub enum Filter {
	Flag(&'static str, bool),
	Text(&'static str, &'static str),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
	pub page: i64,
	pub limit: i64,
	pub total: i64,
	pub total_pages: i64,
}

#[derive(Debug, Serialize)]
pub struct SortInfo {
	pub column: &'static str,
	pub direction: &'static str,
}

#[derive(Debug, Serialize)]
pub struct Page<T> {
	pub data: Vec<T>,
	pub pagination: Pagination,
	pub sort: SortInfo,
}

#[derive(Debug)]
pub struct Listing<S> {
	table: &'static str,
	key: &'static str,
	search: Option<String>,
	filters: Vec<Filter>,
	sort: S,
	order: Order,
	page: i64,
	limit: i64,
}

impl<S: SortColumn> Listing<S> {
	pub fn new(table: &'static str, key: &'static str, params: &ListParams, config: &Config) -> Self {
		let limit = params
			.limit
			.unwrap_or(config.default_page_limit)
			.clamp(1, config.max_page_limit.max(1));
		// SQLite's LOWER and LIKE fold ASCII only
		let search = params
			.search
			.as_deref()
			.map(str::trim)
			.filter(|s| !s.is_empty())
			.map(str::to_ascii_lowercase);

		Self {
			table,
			key,
			search,
			filters: Vec::new(),
			sort: S::resolve(params.sort.as_deref()),
			order: Order::resolve(params.order.as_deref(), S::DEFAULT_ORDER),
			page: params.page.unwrap_or(1).clamp(1, i64::MAX / limit),
			limit,
		}
	}

	pub fn filter(mut self, filter: Filter) -> Self {
		self.filters.push(filter);
		self
	}

	pub fn offset(&self) -> i64 {
		(self.page - 1).saturating_mul(self.limit)
	}

	fn push_where(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
		let mut sep = " WHERE ";

		if let Some(search) = &self.search {
			let pattern = format!("%{}%", escape_like(search));
			qb.push(sep).push("(");
			for (i, column) in SEARCH_COLUMNS.iter().enumerate() {
				if i > 0 {
					qb.push(" OR ");
				}
				qb.push("LOWER(")
					.push(*column)
					.push(") LIKE ")
					.push_bind(pattern.clone())
					.push(" ESCAPE '\\'");
			}
			qb.push(")");
			sep = " AND ";
		}

		for filter in &self.filters {
			qb.push(sep);
			match *filter {
				Filter::Flag(column, value) => qb.push(column).push(" = ").push_bind(value),
				Filter::Text(column, value) => qb.push(column).push(" = ").push_bind(value),
			};
			sep = " AND ";
		}
	}

	pub async fn fetch<T>(&self, db: &DB) -> Result<Page<T>, sqlx::Error>
	where
		T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
	{
		let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM ");
		count.push(self.table);
		self.push_where(&mut count);
		let total: i64 = count.build().fetch_one(db).await?.try_get(0)?;

		let mut select = QueryBuilder::<Sqlite>::new("SELECT * FROM ");
		select.push(self.table);
		self.push_where(&mut select);
		let direction = self.order.sql();
		select
			.push(" ORDER BY ")
			.push(self.sort.column())
			.push(" ")
			.push(direction)
			.push(", ")
			.push(self.key)
			.push(" ")
			.push(direction)
			.push(" LIMIT ")
			.push_bind(self.limit)
			.push(" OFFSET ")
			.push_bind(self.offset());
		let data = select.build_query_as::<T>().fetch_all(db).await?;

		Ok(Page {
			data,
			pagination: Pagination {
				page: self.page,
				limit: self.limit,
				total,
				total_pages: total_pages(total, self.limit),
			},
			sort: SortInfo {
				column: self.sort.column(),
				direction,
			},
		})
	}
}

pub fn total_pages(total: i64, limit: i64) -> i64 {
	if limit <= 0 {
		return 0;
	}
	(total + limit - 1) / limit
}

fn escape_like(raw: &str) -> String {
	let mut out = String::with_capacity(raw.len());
	for c in raw.chars() {
		if matches!(c, '%' | '_' | '\\') {
			out.push('\\');
		}
		out.push(c);
	}
	out
}
