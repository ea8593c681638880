use axum::{
	body::{to_bytes, Body},
	http::{header, Method, Request, StatusCode},
	Router,
};
use pharmacy::{config::Config, sql, sql::DB, state::new_shared_state};
use serde_json::{json, Value};
use tower::ServiceExt;

struct TestApp {
	router: Router,
	db: DB,
}

impl TestApp {
	async fn new() -> Self {
		let config = Config::in_memory();
		let db = sql::connect(&config).await.unwrap();
		let router = pharmacy::app(new_shared_state(db.clone(), config));
		Self { router, db }
	}

	async fn call(&self, method: Method, uri: &str, body: Option<Value>, token: Option<&str>) -> (StatusCode, Value) {
		let mut builder = Request::builder().method(method).uri(uri);
		if let Some(token) = token {
			builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
		}
		let request = match body {
			Some(body) => builder
				.header(header::CONTENT_TYPE, "application/json")
				.body(Body::from(serde_json::to_vec(&body).unwrap()))
				.unwrap(),
			None => builder.body(Body::empty()).unwrap(),
		};

		let response = self.router.clone().oneshot(request).await.unwrap();
		let status = response.status();
		let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
		let value = if bytes.is_empty() {
			Value::Null
		} else {
			serde_json::from_slice(&bytes).unwrap()
		};
		(status, value)
	}

	async fn get(&self, uri: &str) -> (StatusCode, Value) {
		self.call(Method::GET, uri, None, None).await
	}

	async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
		self.call(Method::POST, uri, Some(body), None).await
	}

	async fn put(&self, uri: &str, body: Value) -> (StatusCode, Value) {
		self.call(Method::PUT, uri, Some(body), None).await
	}

	async fn delete(&self, uri: &str) -> (StatusCode, Value) {
		self.call(Method::DELETE, uri, None, None).await
	}

	async fn add_medicine(&self, description: &str, brand: &str, expiry: &str) -> i64 {
		let (status, body) = self
			.post(
				"/medicines",
				json!({
					"drug_description": description,
					"brand_name": brand,
					"lot_batch_no": "B1",
					"expiry_date": expiry,
					"physical_balance": 100,
				}),
			)
			.await;
		assert_eq!(status, StatusCode::CREATED, "{body}");
		body["item_no"].as_i64().unwrap()
	}

	async fn expire(&self, item_no: i64) -> i64 {
		let (status, body) = self
			.post("/expired-medicines", json!({ "item_no": item_no, "reason": "Past date" }))
			.await;
		assert_eq!(status, StatusCode::CREATED, "{body}");
		body["id"].as_i64().unwrap()
	}
}

#[tokio::test]
async fn creating_a_medicine_returns_its_item_number() {
	let app = TestApp::new().await;
	let (status, body) = app
		.post(
			"/medicines",
			json!({
				"drug_description": "Paracetamol",
				"brand_name": "Biogesic",
				"lot_batch_no": "B1",
				"expiry_date": "2099-01-01",
				"physical_balance": 100,
			}),
		)
		.await;

	assert_eq!(status, StatusCode::CREATED);
	let item_no = body["item_no"].as_i64().unwrap();

	let (status, list) = app.get("/medicines").await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(list["data"][0]["item_no"], item_no);
	assert_eq!(list["data"][0]["brand_name"], "Biogesic");
	assert_eq!(list["data"][0]["expiry_date"], "2099-01-01");
}

#[tokio::test]
async fn missing_fields_are_validation_errors() {
	let app = TestApp::new().await;
	let (status, body) = app
		.post("/medicines", json!({ "drug_description": "Paracetamol" }))
		.await;
	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert!(body["error"].as_str().unwrap().contains("required"));

	let (status, body) = app
		.post(
			"/medicines",
			json!({
				"drug_description": "Paracetamol",
				"brand_name": "Biogesic",
				"lot_batch_no": "B1",
				"expiry_date": "not-a-date",
				"physical_balance": 1,
			}),
		)
		.await;
	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert!(body["error"].is_string());

	let (status, _) = app.delete("/medicines").await;
	assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn expiring_a_future_medicine_is_an_invalid_transition() {
	let app = TestApp::new().await;
	let item_no = app.add_medicine("Paracetamol", "Biogesic", "2099-01-01").await;

	let (status, body) = app.post("/expired-medicines", json!({ "item_no": item_no })).await;
	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert!(body["error"].as_str().unwrap().contains("does not expire"));

	let (status, _) = app.post("/expired-medicines", json!({ "item_no": item_no + 100 })).await;
	assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn restoring_over_a_live_record_conflicts() {
	let app = TestApp::new().await;
	let item_no = app.add_medicine("Paracetamol", "Biogesic", "2099-01-01").await;

	let (status, body) = app.post("/archive", json!({ "id": item_no, "type": "active" })).await;
	assert_eq!(status, StatusCode::CREATED, "{body}");
	let archived_id = body["id"].as_i64().unwrap();

	sqlx::query(
		"INSERT INTO medicines (item_no, drug_description, brand_name, lot_batch_no, expiry_date, physical_balance)
		VALUES (?, 'Paracetamol', 'Biogesic', 'B2', '2099-01-01', 5)",
	)
	.bind(item_no)
	.execute(&app.db)
	.await
	.unwrap();

	let (status, body) = app
		.put("/archive", json!({ "id": archived_id, "restoreTo": "active" }))
		.await;
	assert_eq!(status, StatusCode::CONFLICT, "{body}");

	let (_, archive) = app.get("/archive").await;
	assert_eq!(archive["pagination"]["total"], 1);
}

#[tokio::test]
async fn archive_round_trip_restores_descriptive_fields() {
	let app = TestApp::new().await;
	let item_no = app.add_medicine("Ibuprofen 200mg", "Advil", "2099-05-01").await;
	let (_, before) = app.get("/medicines").await;

	let (_, body) = app.post("/archive", json!({ "id": item_no, "type": "active" })).await;
	let archived_id = body["id"].as_i64().unwrap();
	let (_, list) = app.get("/medicines").await;
	assert_eq!(list["pagination"]["total"], 0);

	let (status, body) = app
		.put("/archive", json!({ "id": archived_id, "restoreTo": "active" }))
		.await;
	assert_eq!(status, StatusCode::OK, "{body}");
	assert_eq!(body["restoredTo"], "active");
	assert_eq!(body["item_no"], item_no);

	let (_, after) = app.get("/medicines").await;
	assert_eq!(after["data"], before["data"]);
}

#[tokio::test]
async fn deleting_an_expired_medicine_archives_it() {
	let app = TestApp::new().await;
	let item_no = app.add_medicine("Cetirizine", "Zyrtec", "2001-01-01").await;
	let expired_id = app.expire(item_no).await;

	let (status, body) = app.delete(&format!("/expired-medicines?id={expired_id}")).await;
	assert_eq!(status, StatusCode::OK, "{body}");

	let (_, expired) = app.get("/expired-medicines?archived=all").await;
	assert_eq!(expired["pagination"]["total"], 0);

	let (_, archive) = app.get("/archive?type=expired").await;
	assert_eq!(archive["pagination"]["total"], 1);
	assert_eq!(archive["data"][0]["original_item_no"], item_no);
	assert_eq!(archive["data"][0]["type"], "expired");
	assert_eq!(archive["data"][0]["archived_by"], "system");

	let (status, _) = app.delete(&format!("/expired-medicines?id={expired_id}")).await;
	assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn pushing_the_expiry_forward_returns_the_medicine() {
	let app = TestApp::new().await;
	let item_no = app.add_medicine("Loratadine", "Claritin", "2001-01-01").await;

	// the list read sweeps the past-dated medicine into the expired table
	let (_, list) = app.get("/medicines").await;
	assert_eq!(list["pagination"]["total"], 0);
	let (_, expired) = app.get("/expired-medicines").await;
	assert_eq!(expired["pagination"]["total"], 1);
	assert_eq!(expired["data"][0]["reason"], "Automatically expired");
	let expired_id = expired["data"][0]["id"].as_i64().unwrap();

	let (status, body) = app
		.put("/expired-medicines", json!({ "id": expired_id, "expiry_date": "2099-01-01" }))
		.await;
	assert_eq!(status, StatusCode::OK, "{body}");

	let (_, expired) = app.get("/expired-medicines").await;
	assert_eq!(expired["pagination"]["total"], 0);
	let (_, list) = app.get("/medicines").await;
	assert_eq!(list["data"][0]["item_no"], item_no);
	assert_eq!(list["data"][0]["expiry_date"], "2099-01-01");
}

#[tokio::test]
async fn archive_toggle_on_expired_records() {
	let app = TestApp::new().await;
	let item_no = app.add_medicine("Omeprazole", "Losec", "2001-01-01").await;
	let expired_id = app.expire(item_no).await;

	let (status, _) = app.put("/expired-medicines", json!({ "id": expired_id, "archive": true })).await;
	assert_eq!(status, StatusCode::OK);
	let (status, _) = app.put("/expired-medicines", json!({ "id": expired_id, "archive": true })).await;
	assert_eq!(status, StatusCode::CONFLICT);

	let (_, live) = app.get("/expired-medicines").await;
	assert_eq!(live["pagination"]["total"], 0);
	let (_, archived) = app.get("/expired-medicines?archived=true").await;
	assert_eq!(archived["data"][0]["is_archived"], true);
	let (_, archive) = app.get("/archive").await;
	assert_eq!(archive["pagination"]["total"], 1);

	let (status, _) = app.put("/expired-medicines", json!({ "id": expired_id, "archive": false })).await;
	assert_eq!(status, StatusCode::OK);
	let (_, archive) = app.get("/archive").await;
	assert_eq!(archive["pagination"]["total"], 0);

	let (status, _) = app.put("/expired-medicines", json!({ "id": expired_id })).await;
	assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn lists_search_sort_and_paginate() {
	let app = TestApp::new().await;
	app.add_medicine("Paracetamol 500mg", "Biogesic", "2099-01-01").await;
	app.add_medicine("Paracetamol 250mg", "Tempra", "2098-01-01").await;
	app.add_medicine("Ascorbic Acid", "Biogesic C", "2097-01-01").await;

	let (status, body) = app.get("/medicines?search=BIOGESIC&limit=1&page=2").await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(
		body["pagination"],
		json!({ "page": 2, "limit": 1, "total": 2, "totalPages": 2 })
	);
	assert_eq!(body["data"].as_array().unwrap().len(), 1);
	assert_eq!(body["data"][0]["drug_description"], "Ascorbic Acid");

	let (_, body) = app.get("/medicines?sort=expiry_date&order=asc").await;
	assert_eq!(body["sort"], json!({ "column": "expiry_date", "direction": "ASC" }));
	assert_eq!(body["data"][0]["drug_description"], "Ascorbic Acid");

	let (_, body) = app.get("/medicines?sort=password&order=up").await;
	assert_eq!(body["sort"], json!({ "column": "item_no", "direction": "ASC" }));

	let (status, _) = app.get("/medicines?page=first").await;
	assert_eq!(status, StatusCode::BAD_REQUEST);

	let (status, _) = app.get("/archive?type=deleted").await;
	assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn signup_login_and_attribution() {
	let app = TestApp::new().await;
	let account = json!({ "name": "Maria", "email": "maria@pharmacy.test", "password": "s3cret!" });

	let (status, _) = app.post("/signup", account.clone()).await;
	assert_eq!(status, StatusCode::CREATED);
	let (status, body) = app.post("/signup", account).await;
	assert_eq!(status, StatusCode::CONFLICT, "{body}");

	let (status, _) = app
		.post("/login", json!({ "email": "maria@pharmacy.test", "password": "nope!!" }))
		.await;
	assert_eq!(status, StatusCode::UNAUTHORIZED);

	let (status, body) = app
		.post("/login", json!({ "email": "maria@pharmacy.test", "password": "s3cret!" }))
		.await;
	assert_eq!(status, StatusCode::OK);
	assert!(body["user"].get("password_hash").is_none());
	let token = body["token"].as_str().unwrap().to_string();

	let (status, body) = app.call(Method::GET, "/session", None, Some(&token)).await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["user"]["name"], "Maria");

	let item_no = app.add_medicine("Metformin", "Glucophage", "2099-01-01").await;
	let (status, _) = app
		.call(
			Method::POST,
			"/archive",
			Some(json!({ "id": item_no, "type": "active", "reason": "Recalled batch" })),
			Some(&token),
		)
		.await;
	assert_eq!(status, StatusCode::CREATED);
	let (_, archive) = app.get("/archive").await;
	assert_eq!(archive["data"][0]["archived_by"], "Maria");
	assert_eq!(archive["data"][0]["reason"], "Recalled batch");

	let (status, _) = app.call(Method::POST, "/logout", None, Some(&token)).await;
	assert_eq!(status, StatusCode::OK);
	let (status, _) = app.call(Method::GET, "/session", None, Some(&token)).await;
	assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_json_is_a_validation_error() {
	let app = TestApp::new().await;
	let request = Request::builder()
		.method(Method::POST)
		.uri("/medicines")
		.header(header::CONTENT_TYPE, "application/json")
		.body(Body::from("{not json"))
		.unwrap();

	let response = app.router.clone().oneshot(request).await.unwrap();
	assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn dashboard_summarises_all_tables() {
	let app = TestApp::new().await;
	app.add_medicine("Paracetamol", "Biogesic", "2099-01-01").await;
	let gone = app.add_medicine("Amoxicillin", "Amoxil", "2001-01-01").await;
	let archived = app.add_medicine("Aspirin", "Bayer", "2099-01-01").await;
	app.post("/archive", json!({ "id": archived, "type": "active" })).await;

	let (status, body) = app.get("/dashboard").await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["total_medicines"], 1);
	assert_eq!(body["total_stock"], 100);
	assert_eq!(body["expired"], 1);
	assert_eq!(body["archived"], 1);

	let (_, expired) = app.get("/expired-medicines").await;
	assert_eq!(expired["data"][0]["original_item_no"], gone);
}

#[tokio::test]
async fn huge_page_numbers_return_an_empty_page() {
	let app = TestApp::new().await;
	app.add_medicine("Paracetamol", "Biogesic", "2099-01-01").await;

	let (status, body) = app.get("/medicines?page=9223372036854775807").await;
	assert_eq!(status, StatusCode::OK, "{body}");
	assert!(body["data"].as_array().unwrap().is_empty());
	assert_eq!(body["pagination"]["total"], 1);
}

#[tokio::test]
async fn search_matches_non_ascii_names() {
	let app = TestApp::new().await;
	app.add_medicine("Éter anestésico", "Genérico", "2099-01-01").await;
	app.add_medicine("Paracetamol", "Biogesic", "2099-01-01").await;

	let (status, body) = app.get("/medicines?search=%C3%89ter").await;
	assert_eq!(status, StatusCode::OK, "{body}");
	assert_eq!(body["pagination"]["total"], 1);
	assert_eq!(body["data"][0]["drug_description"], "Éter anestésico");

	let (_, body) = app.get("/medicines?search=%C3%89TER").await;
	assert_eq!(body["pagination"]["total"], 1);
}

#[tokio::test]
async fn archiving_an_expired_record_rejects_field_edits_and_defaults_reason() {
	let app = TestApp::new().await;
	let item = app.add_medicine("Amoxicillin", "Amoxil", "2020-01-01").await;
	let id = app.expire(item).await;

	let (status, _) = app
		.put("/expired-medicines", json!({ "id": id, "archive": true, "brand_name": "Other" }))
		.await;
	assert_eq!(status, StatusCode::BAD_REQUEST);

	let (status, body) = app
		.put("/expired-medicines", json!({ "id": id, "archive": true, "reason": "   " }))
		.await;
	assert_eq!(status, StatusCode::OK, "{body}");

	let (_, archived) = app.get("/archive").await;
	assert_eq!(archived["data"][0]["reason"], "Archived");
	assert_eq!(archived["data"][0]["brand_name"], "Amoxil");
}

#[tokio::test]
async fn archive_delete_failures_carry_a_suggestion() {
	let app = TestApp::new().await;
	sqlx::query("DROP TABLE archived_medicines")
		.execute(&app.db)
		.await
		.unwrap();

	let (status, body) = app.delete("/archive?id=1").await;
	assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
	assert!(body["suggestion"].is_string(), "{body}");
}
