use chrono::{DateTime, Duration as ChronoDuration, Utc};
use invoicechain_api::config::ApiConfig;
use invoicechain_auth::CallerClaims;
use invoicechain_core::Address;
use invoicechain_infra::RegistryConfig;
use invoicechain_invoicing::ContractVariant;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{Value, json};

const JWT_SECRET: &str = "test-secret";

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(variant: ContractVariant) -> Self {
        // Build app (same router as prod), but bind to an ephemeral port.
        let config = ApiConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            jwt_secret: JWT_SECRET.to_string(),
            registry: RegistryConfig {
                variant,
                ..RegistryConfig::default()
            },
        };
        let app = invoicechain_api::app::build_app(&config).expect("failed to build app");
        let listener = tokio::net::TcpListener::bind(config.bind_addr)
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

fn alice() -> Address {
    Address::repeat_byte(0xa1)
}

fn bob() -> Address {
    Address::repeat_byte(0xb0)
}

fn carol() -> Address {
    Address::repeat_byte(0xc4)
}

fn mint_jwt(sub: Address) -> String {
    let now = Utc::now();
    let claims = CallerClaims {
        sub,
        issued_at: now - ChronoDuration::seconds(5),
        expires_at: now + ChronoDuration::minutes(10),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("failed to encode jwt")
}

async fn post(client: &reqwest::Client, url: String, as_: Address, body: Value) -> reqwest::Response {
    client
        .post(url)
        .bearer_auth(mint_jwt(as_))
        .json(&body)
        .send()
        .await
        .unwrap()
}

async fn get(client: &reqwest::Client, url: String, as_: Address) -> reqwest::Response {
    client
        .get(url)
        .bearer_auth(mint_jwt(as_))
        .send()
        .await
        .unwrap()
}

async fn error_code(res: reqwest::Response) -> String {
    let body: Value = res.json().await.unwrap();
    body["error"].as_str().unwrap_or_default().to_string()
}

async fn create_plain(
    client: &reqwest::Client,
    srv: &TestServer,
    sender: Address,
    recipient: Address,
    amount: u64,
) -> u64 {
    let res = post(
        client,
        srv.url("/invoices"),
        sender,
        json!({ "recipient": recipient, "amount": amount, "description": "services" }),
    )
    .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await.unwrap();
    body["id"].as_u64().unwrap()
}

/// Encrypt `value` through the relayer as `user`, for the served registry.
async fn encrypt(client: &reqwest::Client, srv: &TestServer, user: Address, value: u64) -> Value {
    let res = post(client, srv.url("/relayer/encrypt"), user, json!({ "value": value })).await;
    assert_eq!(res.status(), StatusCode::OK);
    res.json().await.unwrap()
}

async fn decrypt(client: &reqwest::Client, srv: &TestServer, user: Address, handle: &Value) -> reqwest::Response {
    post(client, srv.url("/relayer/decrypt"), user, json!({ "handle": handle })).await
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn(ContractVariant::Plaintext).await;

    let res = reqwest::get(srv.url("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let srv = TestServer::spawn(ContractVariant::Plaintext).await;
    let client = reqwest::Client::new();

    let res = client.get(srv.url("/whoami")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .get(srv.url("/whoami"))
        .bearer_auth("not-a-jwt")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn caller_address_is_derived_from_token() {
    let srv = TestServer::spawn(ContractVariant::Plaintext).await;
    let client = reqwest::Client::new();

    let res = get(&client, srv.url("/whoami"), alice()).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["address"], json!(alice()));
}

#[tokio::test]
async fn rent_invoice_lifecycle() {
    let srv = TestServer::spawn(ContractVariant::Plaintext).await;
    let client = reqwest::Client::new();

    let id = create_plain(&client, &srv, alice(), bob(), 1_000).await;
    assert_eq!(id, 0);

    let res = get(&client, srv.url("/invoices/0"), carol()).await;
    assert_eq!(res.status(), StatusCode::OK);
    let inv: Value = res.json().await.unwrap();
    assert_eq!(inv["status"], "pending");
    assert_eq!(inv["amount"], 1_000);
    assert_eq!(inv["sender"], json!(alice()));
    assert!(inv.get("encrypted_amount").is_none());

    let created: DateTime<Utc> = serde_json::from_value(inv["created_at"].clone()).unwrap();
    let due: DateTime<Utc> = serde_json::from_value(inv["due_date"].clone()).unwrap();
    assert_eq!(due - created, ChronoDuration::days(30));

    let res = post(&client, srv.url("/invoices/0/pay"), bob(), json!({})).await;
    assert_eq!(res.status(), StatusCode::OK);
    let inv: Value = res.json().await.unwrap();
    assert_eq!(inv["status"], "paid");

    let res = post(&client, srv.url("/invoices/0/pay"), bob(), json!({})).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    assert_eq!(error_code(res).await, "invalid_status");

    let res = post(&client, srv.url("/invoices/0/cancel"), alice(), json!({})).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = get(&client, srv.url("/invoices/count"), carol()).await;
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["count"], 1);
}

#[tokio::test]
async fn only_the_right_party_may_transition() {
    let srv = TestServer::spawn(ContractVariant::Plaintext).await;
    let client = reqwest::Client::new();
    let id = create_plain(&client, &srv, alice(), bob(), 10).await;

    for (path, caller) in [("cancel", bob()), ("pay", alice()), ("dispute", alice()), ("pay", carol())] {
        let res = post(&client, srv.url(&format!("/invoices/{id}/{path}")), caller, json!({})).await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN, "{path} as {caller}");
        assert_eq!(error_code(res).await, "unauthorized");
    }

    let res = post(&client, srv.url(&format!("/invoices/{id}/dispute")), bob(), json!({})).await;
    assert_eq!(res.status(), StatusCode::OK);
    let inv: Value = res.json().await.unwrap();
    assert_eq!(inv["status"], "disputed");
}

#[tokio::test]
async fn invalid_requests_are_rejected() {
    let srv = TestServer::spawn(ContractVariant::Plaintext).await;
    let client = reqwest::Client::new();

    let res = post(
        &client,
        srv.url("/invoices"),
        alice(),
        json!({ "recipient": alice(), "amount": 5 }),
    )
    .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(res).await, "invalid_recipient");

    let res = post(
        &client,
        srv.url("/invoices"),
        alice(),
        json!({ "recipient": bob(), "amount": 0 }),
    )
    .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(res).await, "invalid_amount");

    let res = get(&client, srv.url("/invoices/7"), alice()).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    // Unparseable bodies still answer with the JSON error shape.
    let res = post(
        &client,
        srv.url("/invoices"),
        alice(),
        json!({ "recipient": "0xnot-an-address", "amount": 5 }),
    )
    .await;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error_code(res).await, "invalid_request");

    let res = client
        .post(srv.url("/balances/deposit"))
        .bearer_auth(mint_jwt(alice()))
        .header("content-type", "application/json")
        .body("{")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(res).await, "invalid_request");

    let res = get(
        &client,
        srv.url(&format!("/accounts/{}/sent?limit=many", alice())),
        alice(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(res).await, "invalid_request");

    let res = get(&client, srv.url("/invoices/seven"), alice()).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(res).await, "invalid_id");

    let res = get(&client, srv.url("/invoices/count"), alice()).await;
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn invoice_indices_are_paginated() {
    let srv = TestServer::spawn(ContractVariant::Plaintext).await;
    let client = reqwest::Client::new();

    for amount in 1..=5 {
        create_plain(&client, &srv, alice(), bob(), amount).await;
    }
    create_plain(&client, &srv, bob(), alice(), 9).await;

    let res = get(
        &client,
        srv.url(&format!("/accounts/{}/received?offset=2&limit=2", bob())),
        carol(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["ids"], json!([2, 3]));

    let res = get(&client, srv.url(&format!("/accounts/{}/sent", alice())), carol()).await;
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["ids"], json!([0, 1, 2, 3, 4]));

    let res = get(
        &client,
        srv.url(&format!("/accounts/{}/sent?offset=10", alice())),
        carol(),
    )
    .await;
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["ids"], json!([]));

    let res = get(&client, srv.url(&format!("/accounts/{}/received", alice())), carol()).await;
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["ids"], json!([5]));
}

#[tokio::test]
async fn activity_projection_catches_up() {
    let srv = TestServer::spawn(ContractVariant::Plaintext).await;
    let client = reqwest::Client::new();

    let id = create_plain(&client, &srv, alice(), bob(), 42).await;
    post(&client, srv.url(&format!("/invoices/{id}/pay")), bob(), json!({})).await;

    // Projections are eventually consistent with the command path.
    let mut activity = Value::Null;
    for _ in 0..50 {
        let res = get(&client, srv.url(&format!("/accounts/{}/activity", alice())), alice()).await;
        if res.status() == StatusCode::OK {
            activity = res.json().await.unwrap();
            if activity["invoices_collected"] == 1 {
                break;
            }
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }

    assert_eq!(activity["invoices_sent"], 1);
    assert_eq!(activity["invoices_collected"], 1);
}

#[tokio::test]
async fn confidential_balance_payment_with_insufficient_funds_moves_nothing() {
    let srv = TestServer::spawn(ContractVariant::ConfidentialBalance).await;
    let client = reqwest::Client::new();

    // Bob deposits 500.
    let input = encrypt(&client, &srv, bob(), 500).await;
    let res = post(&client, srv.url("/balances/deposit"), bob(), input).await;
    assert_eq!(res.status(), StatusCode::OK);

    // Alice invoices Bob for 800.
    let input = encrypt(&client, &srv, alice(), 800).await;
    let res = post(
        &client,
        srv.url("/invoices"),
        alice(),
        json!({ "recipient": bob(), "description": "audit", "encrypted_amount": input }),
    )
    .await;
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = get(&client, srv.url("/invoices/0"), carol()).await;
    let inv: Value = res.json().await.unwrap();
    assert!(inv.get("amount").is_none());
    assert!(inv["encrypted_amount"].is_string());

    // Both parties can read and decrypt the amount; outsiders cannot.
    let res = get(&client, srv.url("/invoices/0/encrypted-amount"), bob()).await;
    assert_eq!(res.status(), StatusCode::OK);
    let handle = res.json::<Value>().await.unwrap()["handle"].clone();
    let res = decrypt(&client, &srv, bob(), &handle).await;
    assert_eq!(res.json::<Value>().await.unwrap()["value"], 800);
    let res = get(&client, srv.url("/invoices/0/encrypted-amount"), carol()).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let res = decrypt(&client, &srv, carol(), &handle).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    // Payment succeeds, but the encrypted transfer moves zero.
    let res = post(&client, srv.url("/invoices/0/pay"), bob(), json!({})).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<Value>().await.unwrap()["status"], "paid");

    let res = get(&client, srv.url(&format!("/accounts/{}/balance", bob())), bob()).await;
    let handle = res.json::<Value>().await.unwrap()["handle"].clone();
    let res = decrypt(&client, &srv, bob(), &handle).await;
    assert_eq!(res.json::<Value>().await.unwrap()["value"], 500);

    let res = get(&client, srv.url(&format!("/accounts/{}/balance", alice())), alice()).await;
    let handle = res.json::<Value>().await.unwrap()["handle"].clone();
    let res = decrypt(&client, &srv, alice(), &handle).await;
    assert_eq!(res.json::<Value>().await.unwrap()["value"], 0);

    // Balances are private to their owner.
    let res = get(&client, srv.url(&format!("/accounts/{}/balance", bob())), alice()).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn confidential_variant_rules() {
    let srv = TestServer::spawn(ContractVariant::ConfidentialBalance).await;
    let client = reqwest::Client::new();

    let res = post(
        &client,
        srv.url("/invoices"),
        alice(),
        json!({ "recipient": bob(), "amount": 10 }),
    )
    .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // Input bound to Bob cannot be submitted by Alice.
    let input = encrypt(&client, &srv, bob(), 10).await;
    let res = post(
        &client,
        srv.url("/invoices"),
        alice(),
        json!({ "recipient": bob(), "encrypted_amount": input }),
    )
    .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(res).await, "invalid_proof");

    let res = post(&client, srv.url("/invoices/0/dispute"), bob(), json!({})).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(res).await, "unsupported_operation");
}

#[tokio::test]
async fn confidential_direct_has_no_balance_ledger() {
    let srv = TestServer::spawn(ContractVariant::ConfidentialDirect).await;
    let client = reqwest::Client::new();

    let input = encrypt(&client, &srv, alice(), 75).await;
    let res = post(
        &client,
        srv.url("/invoices"),
        alice(),
        json!({ "recipient": bob(), "encrypted_amount": input }),
    )
    .await;
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = post(&client, srv.url("/invoices/0/dispute"), bob(), json!({})).await;
    assert_eq!(res.status(), StatusCode::OK);

    let input = encrypt(&client, &srv, bob(), 5).await;
    let res = post(&client, srv.url("/balances/deposit"), bob(), input).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(res).await, "unsupported_operation");
}
