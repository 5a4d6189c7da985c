use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use rentdesk_api::config::AppConfig;
use rentdesk_auth::{JwtClaims, Permission, Role};
use rentdesk_core::UserId;
use rentdesk_infra::services::AdminSeed;
use reqwest::StatusCode;
use serde_json::{json, Value};

const ADMIN_USERNAME: &str = "admin";
const ADMIN_PASSWORD: &str = "correct-horse-battery";

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(jwt_secret: &str) -> Self {
        let config = AppConfig::in_memory(
            jwt_secret,
            Some(AdminSeed {
                username: ADMIN_USERNAME.to_string(),
                email: "admin@example.com".to_string(),
                password: ADMIN_PASSWORD.to_string(),
            }),
        );
        let app = rentdesk_api::app::build_app(&config)
            .await
            .expect("failed to build app");
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(jwt_secret: &str, permissions: &[&'static str]) -> String {
    let now = Utc::now();
    let claims = JwtClaims {
        sub: UserId::new(),
        username: "minted".to_string(),
        roles: vec![Role::new("staff")],
        permissions: permissions.iter().map(|p| Permission::new(*p)).collect(),
        issued_at: now,
        expires_at: now + ChronoDuration::minutes(10),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
    .expect("failed to encode jwt")
}

async fn admin_token(client: &reqwest::Client, srv: &TestServer) -> String {
    let res = client
        .post(srv.url("/auth/login"))
        .json(&json!({ "username": ADMIN_USERNAME, "password": ADMIN_PASSWORD }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["token_type"], "Bearer");
    body["access_token"].as_str().unwrap().to_string()
}

async fn post_json(client: &reqwest::Client, url: String, token: &str, body: Value) -> (StatusCode, Value) {
    let res = client.post(url).bearer_auth(token).json(&body).send().await.unwrap();
    let status = res.status();
    let body = res.json().await.unwrap_or(Value::Null);
    (status, body)
}

async fn get_json(client: &reqwest::Client, url: String, token: &str) -> (StatusCode, Value) {
    let res = client.get(url).bearer_auth(token).send().await.unwrap();
    let status = res.status();
    let body = res.json().await.unwrap_or(Value::Null);
    (status, body)
}

async fn put_json(client: &reqwest::Client, url: String, token: &str, body: Value) -> (StatusCode, Value) {
    let res = client.put(url).bearer_auth(token).json(&body).send().await.unwrap();
    let status = res.status();
    let body = res.json().await.unwrap_or(Value::Null);
    (status, body)
}

fn id_of(body: &Value) -> String {
    body["id"].as_str().expect("response has an id").to_string()
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn("test-secret").await;
    let res = reqwest::get(srv.url("/health")).await.unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().contains_key("x-request-id"));
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let srv = TestServer::spawn("test-secret").await;

    let res = reqwest::Client::new().get(srv.url("/whoami")).send().await.unwrap();

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "unauthenticated");
}

#[tokio::test]
async fn token_signed_with_another_secret_is_rejected() {
    let srv = TestServer::spawn("test-secret").await;
    let token = mint_jwt("other-secret", &["*"]);

    let res = reqwest::Client::new()
        .get(srv.url("/whoami"))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn wrong_password_is_unauthenticated() {
    let srv = TestServer::spawn("test-secret").await;

    let res = reqwest::Client::new()
        .post(srv.url("/auth/login"))
        .json(&json!({ "username": ADMIN_USERNAME, "password": "not-the-password" }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_login_builds_category_tree() {
    let srv = TestServer::spawn("test-secret").await;
    let client = reqwest::Client::new();
    let token = admin_token(&client, &srv).await;

    let res = client.get(srv.url("/whoami")).bearer_auth(&token).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let me: Value = res.json().await.unwrap();
    assert_eq!(me["username"], ADMIN_USERNAME);

    let (status, root) = post_json(&client, srv.url("/categories"), &token, json!({ "name": "Equipment" })).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(root["category_path"], "Equipment");
    assert_eq!(root["category_level"], 1);

    let (status, child) = post_json(
        &client,
        srv.url("/categories"),
        &token,
        json!({ "name": "Cameras", "parent_id": root["id"] }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(child["category_path"], "Equipment/Cameras");
    assert_eq!(child["category_level"], 2);

    let res = client
        .get(srv.url(&format!("/categories/{}", root["id"].as_str().unwrap())))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let root: Value = res.json().await.unwrap();
    assert_eq!(root["is_leaf"], false);

    // Same name under the same parent.
    let (status, body) = post_json(
        &client,
        srv.url("/categories"),
        &token,
        json!({ "name": "Cameras", "parent_id": root["id"] }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");
}

#[tokio::test]
async fn customer_blacklist_round_trip() {
    let srv = TestServer::spawn("test-secret").await;
    let client = reqwest::Client::new();
    let token = admin_token(&client, &srv).await;

    let (status, customer) = post_json(
        &client,
        srv.url("/customers"),
        &token,
        json!({
            "customer_code": "CUST-001",
            "customer_type": "INDIVIDUAL",
            "first_name": "Ada",
            "last_name": "Lovelace",
            "contact": { "email": "ada@example.com" }
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = customer["id"].as_str().unwrap().to_string();

    let (status, blacklisted) = post_json(
        &client,
        srv.url(&format!("/customers/{id}/blacklist")),
        &token,
        json!({ "reason": "unpaid rentals" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(blacklisted["blacklist_status"], "BLACKLISTED");

    let res = client
        .get(srv.url("/customers/code/CUST-001"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let fetched: Value = res.json().await.unwrap();
    assert_eq!(fetched["id"], id.as_str());
}

#[tokio::test]
async fn missing_permission_is_forbidden() {
    let srv = TestServer::spawn("test-secret").await;
    let token = mint_jwt("test-secret", &["categories.read"]);
    let client = reqwest::Client::new();

    let res = client.get(srv.url("/categories")).bearer_auth(&token).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let (status, body) = post_json(&client, srv.url("/categories"), &token, json!({ "name": "Tools" })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");
}

#[tokio::test]
async fn malformed_id_is_a_bad_request() {
    let srv = TestServer::spawn("test-secret").await;
    let token = mint_jwt("test-secret", &["*"]);

    let res = reqwest::Client::new()
        .get(srv.url("/customers/not-a-uuid"))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_id");
}

/// Location, customer, rental item and one unit; returns (customer_id, item_id, unit_id).
async fn seed_rental_stock(client: &reqwest::Client, srv: &TestServer, token: &str) -> (String, String, String) {
    let (status, location) = post_json(
        client,
        srv.url("/locations"),
        token,
        json!({
            "code": "WH1",
            "name": "Warehouse",
            "location_type": "WAREHOUSE",
            "address": "9 Dock Road",
            "city": "Springfield",
            "state": "IL",
            "country": "US"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{location}");

    let (status, customer) = post_json(
        client,
        srv.url("/customers"),
        token,
        json!({
            "customer_code": "CUST-100",
            "customer_type": "INDIVIDUAL",
            "first_name": "Jordan",
            "last_name": "Lee",
            "contact": { "email": "jordan@example.com" }
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{customer}");

    let (status, item) = post_json(
        client,
        srv.url("/inventory/items"),
        token,
        json!({
            "item_code": "DRL-18V",
            "item_name": "18V hammer drill",
            "item_type": "RENTAL",
            "purchase_price": 18000,
            "rental_price_per_day": 2000,
            "security_deposit": 5000,
            "max_rental_days": 14
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{item}");

    let (status, unit) = post_json(
        client,
        srv.url("/inventory/units"),
        token,
        json!({
            "item_id": item["id"],
            "location_id": location["id"],
            "unit_code": "DRL-18V-001",
            "condition": "GOOD",
            "purchase_cost": 18000
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{unit}");

    (id_of(&customer), id_of(&item), id_of(&unit))
}

async fn draft_rental(client: &reqwest::Client, srv: &TestServer, token: &str, customer_id: &str) -> Value {
    let (status, rental) = post_json(
        client,
        srv.url("/transactions"),
        token,
        json!({
            "transaction_type": "RENTAL",
            "customer_id": customer_id,
            "transaction_date": "2026-07-01",
            "due_date": "2026-07-04",
            "rental_start_date": "2026-07-01",
            "rental_end_date": "2026-07-04"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{rental}");
    assert_eq!(rental["status"], "DRAFT");
    rental
}

#[tokio::test]
async fn rental_flow_from_draft_to_completed_return() {
    let srv = TestServer::spawn("test-secret").await;
    let client = reqwest::Client::new();
    let token = admin_token(&client, &srv).await;
    let (customer_id, item_id, unit_id) = seed_rental_stock(&client, &srv, &token).await;

    let rental = draft_rental(&client, &srv, &token, &customer_id).await;
    let rental_id = id_of(&rental);

    let (status, with_line) = post_json(
        &client,
        srv.url(&format!("/transactions/{rental_id}/lines")),
        &token,
        json!({
            "line_type": "PRODUCT",
            "item_id": item_id,
            "inventory_unit_id": unit_id,
            "description": "Hammer drill, 3 days",
            "quantity": 1,
            "unit_price": 6000,
            "rental_period_value": 3,
            "rental_period_unit": "DAY",
            "rental_start_date": "2026-07-01",
            "rental_end_date": "2026-07-04"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{with_line}");
    assert_eq!(with_line["total_amount"], 6000);
    let line_id = with_line["lines"][0]["id"].clone();

    for next in ["PENDING", "CONFIRMED", "IN_PROGRESS"] {
        let (status, body) = post_json(
            &client,
            srv.url(&format!("/transactions/{rental_id}/status")),
            &token,
            json!({ "status": next }),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{next}: {body}");
        assert_eq!(body["status"], next);
    }

    // Rentals complete through their return, never through the status route.
    let (status, body) = post_json(
        &client,
        srv.url(&format!("/transactions/{rental_id}/status")),
        &token,
        json!({ "status": "COMPLETED" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "invariant_violation");

    let (status, _) = post_json(
        &client,
        srv.url(&format!("/inventory/units/{unit_id}/rent")),
        &token,
        json!({ "rental_days": 3 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, paid) = post_json(
        &client,
        srv.url(&format!("/transactions/{rental_id}/payments")),
        &token,
        json!({ "amount": 6000, "method": "CREDIT_CARD", "reference": "AUTH-1" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{paid}");
    assert_eq!(paid["paid_amount"], 6000);
    assert_eq!(paid["payment_status"], "PAID");

    let (status, due) = get_json(
        &client,
        srv.url("/transactions/reports/due-for-return?today=2026-07-03&days_ahead=2"),
        &token,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(due.as_array().map(Vec::len), Some(1));

    let res = client
        .get(srv.url("/transactions/reports/due-for-return?today=next-tuesday"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let (status, ret) = post_json(
        &client,
        srv.url("/rentals/returns"),
        &token,
        json!({
            "rental_transaction_id": rental_id,
            "return_date": "2026-07-04",
            "return_type": "FULL"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{ret}");
    let return_id = id_of(&ret);

    let (status, ret) = post_json(
        &client,
        srv.url(&format!("/rentals/returns/{return_id}/lines")),
        &token,
        json!({
            "inventory_unit_id": unit_id,
            "original_line_id": line_id,
            "original_quantity": 1,
            "returned_quantity": 1,
            "condition_on_return": "GOOD"
        }),
    )
    .await;
    assert!(status.is_success(), "{status}: {ret}");
    let return_line_id = ret["lines"][0]["id"].as_str().unwrap().to_string();

    let (status, body) = post_json(
        &client,
        srv.url(&format!("/rentals/returns/{return_id}/status")),
        &token,
        json!({ "status": "IN_INSPECTION" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    for next in ["INSPECTED", "PROCESSED"] {
        let (status, body) = post_json(
            &client,
            srv.url(&format!("/rentals/returns/{return_id}/lines/{return_line_id}/status")),
            &token,
            json!({ "status": next }),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{next}: {body}");
    }

    // Inspecting is not enough to finalize.
    let inspector = mint_jwt("test-secret", &["rentals.read", "rentals.update"]);
    let (status, body) = post_json(
        &client,
        srv.url(&format!("/rentals/returns/{return_id}/finalize")),
        &inspector,
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    let (status, done) = post_json(
        &client,
        srv.url(&format!("/rentals/returns/{return_id}/finalize")),
        &token,
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{done}");
    assert_eq!(done["status"], "COMPLETED");

    let (_, rental) = get_json(&client, srv.url(&format!("/transactions/{rental_id}")), &token).await;
    assert_eq!(rental["status"], "COMPLETED");
    assert_eq!(rental["lines"][0]["returned_quantity"], 1);

    let (_, unit) = get_json(&client, srv.url(&format!("/inventory/units/{unit_id}")), &token).await;
    assert_eq!(unit["status"], "AVAILABLE");

    let (_, customer) = get_json(&client, srv.url(&format!("/customers/{customer_id}")), &token).await;
    assert_eq!(customer["lifetime_value"], 6000);

    // Refunds have their own route.
    let (status, body) = post_json(
        &client,
        srv.url(&format!("/transactions/{rental_id}/status")),
        &token,
        json!({ "status": "REFUNDED" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "invariant_violation");
}

#[tokio::test]
async fn illegal_transitions_and_cancel_permission() {
    let srv = TestServer::spawn("test-secret").await;
    let client = reqwest::Client::new();
    let token = admin_token(&client, &srv).await;
    let (customer_id, _, _) = seed_rental_stock(&client, &srv, &token).await;
    let rental_id = id_of(&draft_rental(&client, &srv, &token, &customer_id).await);
    let status_url = srv.url(&format!("/transactions/{rental_id}/status"));

    let (status, body) = post_json(&client, status_url.clone(), &token, json!({ "status": "COMPLETED" })).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "invariant_violation");
    assert!(body["message"].as_str().unwrap_or_default().contains("DRAFT"), "{body}");

    let clerk = mint_jwt("test-secret", &["transactions.read", "transactions.update"]);
    let (status, body) = post_json(&client, status_url.clone(), &clerk, json!({ "status": "CANCELLED" })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    // Ordinary transitions only need `transactions.update`.
    let (status, body) = post_json(&client, status_url.clone(), &clerk, json!({ "status": "PENDING" })).await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let supervisor = mint_jwt(
        "test-secret",
        &["transactions.read", "transactions.update", "transactions.cancel"],
    );
    let (status, body) = post_json(&client, status_url, &supervisor, json!({ "status": "CANCELLED" })).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "CANCELLED");
}

#[tokio::test]
async fn system_settings_lifecycle() {
    let srv = TestServer::spawn("test-secret").await;
    let client = reqwest::Client::new();
    let token = admin_token(&client, &srv).await;

    let (status, created) = post_json(&client, srv.url("/system/settings/initialize"), &token, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    let seeded = created.as_array().map(Vec::len).unwrap_or_default();
    assert!(seeded > 0);
    let (_, again) = post_json(&client, srv.url("/system/settings/initialize"), &token, json!({})).await;
    assert_eq!(again, json!([]));

    let (status, rental) = get_json(&client, srv.url("/system/settings?category=RENTAL"), &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rental[0]["key"], "minimum_rental_days");

    let (status, updated) = put_json(
        &client,
        srv.url("/system/settings/maximum_rental_days"),
        &token,
        json!({ "value": 90 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{updated}");
    assert_eq!(updated["value"], "90");
    assert_eq!(updated["is_default"], false);

    let (_, value) = get_json(&client, srv.url("/system/settings/maximum_rental_days/value"), &token).await;
    assert_eq!(value["value"], 90);

    let (status, body) = put_json(
        &client,
        srv.url("/system/settings/maximum_rental_days"),
        &token,
        json!({ "value": "a lot" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (status, reset) = post_json(
        &client,
        srv.url("/system/settings/maximum_rental_days/reset"),
        &token,
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reset["value"], "365");

    let (status, _) = put_json(&client, srv.url("/system/settings/app_name"), &token, json!({ "value": "Other" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, secret) = post_json(
        &client,
        srv.url("/system/settings"),
        &token,
        json!({
            "key": "payment_gateway_key",
            "name": "Payment Gateway Key",
            "setting_type": "STRING",
            "category": "INTEGRATION",
            "value": "sk_live_123",
            "is_sensitive": true
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{secret}");
    assert_eq!(secret["value"], "***MASKED***");

    let reader = mint_jwt("test-secret", &["system.read"]);
    let (status, _) = get_json(&client, srv.url("/system/settings/payment_gateway_key/value"), &reader).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, body) = get_json(&client, srv.url("/system/settings/payment_gateway_key/value"), &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["value"], "sk_live_123");

    let res = client
        .delete(srv.url("/system/settings/payment_gateway_key"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let (status, info) = get_json(&client, srv.url("/system/info"), &reader).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(info["system_name"], "Rentdesk");
    assert_eq!(info["settings_count"], seeded);
    assert_eq!(info["status"], "healthy");
}
