use chrono::{Duration as ChronoDuration, Utc};
use devportal_auth::JwtClaims;
use devportal_core::UserId;
use devportal_infra::PortalConfig;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{json, Value};

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(jwt_secret: &str) -> Self {
        // Same router as prod, bound to an ephemeral port.
        let config = PortalConfig {
            jwt_secret: jwt_secret.to_string(),
            ..PortalConfig::default()
        };
        let app = devportal_api::app::build_app(config).expect("failed to build app");
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

fn mint_jwt(jwt_secret: &str, sub: UserId) -> String {
    let now = Utc::now();
    let claims = JwtClaims {
        sub,
        issued_at: now - ChronoDuration::seconds(5),
        expires_at: now + ChronoDuration::minutes(10),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
    .expect("failed to encode jwt")
}

async fn send(req: reqwest::RequestBuilder, expected: StatusCode) -> Value {
    let res = req.send().await.unwrap();
    let status = res.status();
    let body = res.text().await.unwrap_or_default();
    assert_eq!(status, expected, "unexpected status, body={body}");
    serde_json::from_str(&body).unwrap_or(Value::Null)
}

async fn environment_id(client: &reqwest::Client, srv: &TestServer, token: &str, name: &str) -> String {
    let envs = send(
        client.get(srv.url("/environments")).bearer_auth(token),
        StatusCode::OK,
    )
    .await;
    envs.as_array()
        .unwrap()
        .iter()
        .find(|e| e["name"] == name)
        .map(|e| e["id"].as_str().unwrap().to_string())
        .unwrap_or_else(|| panic!("environment {name} not seeded"))
}

#[tokio::test]
async fn health_is_public_and_routes_require_a_token() {
    let srv = TestServer::spawn("test-secret").await;
    let client = reqwest::Client::new();

    let res = client.get(srv.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client.get(srv.url("/products")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let forged = mint_jwt("other-secret", UserId::new());
    let res = client
        .get(srv.url("/products"))
        .bearer_auth(forged)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn acting_user_is_the_token_subject() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let client = reqwest::Client::new();

    let user = UserId::new();
    let token = mint_jwt(jwt_secret, user);

    let me = send(client.get(srv.url("/whoami")).bearer_auth(&token), StatusCode::OK).await;
    assert_eq!(me["user_id"].as_str().unwrap(), user.to_string());

    let product = send(
        client
            .post(srv.url("/products"))
            .bearer_auth(&token)
            .json(&json!({ "name": "Payments" })),
        StatusCode::CREATED,
    )
    .await;
    assert_eq!(product["created_by"].as_str().unwrap(), user.to_string());
}

#[tokio::test]
async fn subscription_lifecycle_over_http() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let client = reqwest::Client::new();
    let token = mint_jwt(jwt_secret, UserId::new());

    let production = environment_id(&client, &srv, &token, "production").await;
    let development = environment_id(&client, &srv, &token, "development").await;

    let product = send(
        client
            .post(srv.url("/products"))
            .bearer_auth(&token)
            .json(&json!({ "name": "Payments" })),
        StatusCode::CREATED,
    )
    .await;
    let product_id = product["id"].as_str().unwrap().to_string();

    let app = send(
        client
            .post(srv.url("/applications"))
            .bearer_auth(&token)
            .json(&json!({ "name": "Checkout", "grant_types": ["client_credentials"] })),
        StatusCode::CREATED,
    )
    .await;
    let app_id = app["id"].as_str().unwrap().to_string();
    assert_eq!(app["status"], "draft");

    let body = json!({
        "application_id": app_id,
        "product_id": product_id,
        "environment_id": production,
    });
    let s1 = send(
        client.post(srv.url("/subscriptions")).bearer_auth(&token).json(&body),
        StatusCode::CREATED,
    )
    .await;

    // Same triple again.
    let conflict = send(
        client.post(srv.url("/subscriptions")).bearer_auth(&token).json(&body),
        StatusCode::CONFLICT,
    )
    .await;
    assert_eq!(conflict["error"], "DP-409");
    assert_eq!(conflict["kind"], "conflict");

    let app = send(
        client.get(srv.url(&format!("/applications/{app_id}"))).bearer_auth(&token),
        StatusCode::OK,
    )
    .await;
    assert_eq!(app["status"], "active");

    send(
        client.post(srv.url("/subscriptions")).bearer_auth(&token).json(&json!({
            "application_id": app_id,
            "product_id": product_id,
            "environment_id": development,
        })),
        StatusCode::CREATED,
    )
    .await;

    let prod_cred = send(
        client
            .get(srv.url(&format!("/applications/{app_id}/credentials/{production}")))
            .bearer_auth(&token),
        StatusCode::OK,
    )
    .await;
    let dev_cred = send(
        client
            .get(srv.url(&format!("/applications/{app_id}/credentials/{development}")))
            .bearer_auth(&token),
        StatusCode::OK,
    )
    .await;
    assert_ne!(prod_cred["client_id"], dev_cred["client_id"]);

    let entitlements_url = srv.url(&format!("/applications/{app_id}/entitlements/{production}"));
    let entitled = send(client.get(&entitlements_url).bearer_auth(&token), StatusCode::OK).await;
    assert_eq!(entitled.as_array().unwrap().len(), 1);

    send(
        client
            .post(srv.url(&format!("/products/{product_id}/deprecate")))
            .bearer_auth(&token),
        StatusCode::OK,
    )
    .await;

    // Subscribed but no longer entitled.
    let entitled = send(client.get(&entitlements_url).bearer_auth(&token), StatusCode::OK).await;
    assert!(entitled.as_array().unwrap().is_empty());
    let s1_id = s1["id"].as_str().unwrap();
    send(
        client.get(srv.url(&format!("/subscriptions/{s1_id}"))).bearer_auth(&token),
        StatusCode::OK,
    )
    .await;

    let rejected = send(
        client.post(srv.url("/subscriptions")).bearer_auth(&token).json(&json!({
            "application_id": app_id,
            "product_id": product_id,
            "environment_id": production,
        })),
        StatusCode::PRECONDITION_FAILED,
    )
    .await;
    assert_eq!(rejected["kind"], "invalid_state");

    send(
        client.delete(srv.url(&format!("/subscriptions/{s1_id}"))).bearer_auth(&token),
        StatusCode::OK,
    )
    .await;
    send(
        client
            .get(srv.url(&format!("/applications/{app_id}/credentials/{production}")))
            .bearer_auth(&token),
        StatusCode::NOT_FOUND,
    )
    .await;
}

#[tokio::test]
async fn deprecated_product_cannot_be_subscribed() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let client = reqwest::Client::new();
    let token = mint_jwt(jwt_secret, UserId::new());
    let production = environment_id(&client, &srv, &token, "production").await;

    let product = send(
        client
            .post(srv.url("/products"))
            .bearer_auth(&token)
            .json(&json!({ "name": "Legacy" })),
        StatusCode::CREATED,
    )
    .await;
    let product_id = product["id"].as_str().unwrap().to_string();
    send(
        client
            .post(srv.url(&format!("/products/{product_id}/deprecate")))
            .bearer_auth(&token),
        StatusCode::OK,
    )
    .await;

    let app = send(
        client
            .post(srv.url("/applications"))
            .bearer_auth(&token)
            .json(&json!({ "name": "Late", "grant_types": ["client_credentials"] })),
        StatusCode::CREATED,
    )
    .await;

    let err = send(
        client.post(srv.url("/subscriptions")).bearer_auth(&token).json(&json!({
            "application_id": app["id"],
            "product_id": product_id,
            "environment_id": production,
        })),
        StatusCode::PRECONDITION_FAILED,
    )
    .await;
    assert_eq!(err["error"], "DP-412");
}

#[tokio::test]
async fn credential_rotation_and_verification() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let client = reqwest::Client::new();
    let token = mint_jwt(jwt_secret, UserId::new());
    let production = environment_id(&client, &srv, &token, "production").await;

    let app = send(
        client
            .post(srv.url("/applications"))
            .bearer_auth(&token)
            .json(&json!({ "name": "Billing", "grant_types": ["client_credentials"] })),
        StatusCode::CREATED,
    )
    .await;
    let app_id = app["id"].as_str().unwrap().to_string();
    let slot_url = srv.url(&format!("/applications/{app_id}/credentials/{production}"));

    let issued = send(client.post(&slot_url).bearer_auth(&token), StatusCode::CREATED).await;
    let client_id = issued["handle"]["client_id"].as_str().unwrap().to_string();
    let first_secret = issued["client_secret"].as_str().unwrap().to_string();

    // Idempotent: same client id, no secret.
    let again = send(client.post(&slot_url).bearer_auth(&token), StatusCode::OK).await;
    assert_eq!(again["handle"]["client_id"], client_id.as_str());
    assert!(again.get("client_secret").is_none());

    let rotated = send(
        client.post(format!("{slot_url}/rotate")).bearer_auth(&token),
        StatusCode::OK,
    )
    .await;
    assert_eq!(rotated["handle"]["client_id"], client_id.as_str());
    let second_secret = rotated["client_secret"].as_str().unwrap().to_string();

    let verify = |secret: String| {
        client
            .post(format!("{slot_url}/verify"))
            .bearer_auth(&token)
            .json(&json!({ "client_id": client_id, "client_secret": secret }))
    };
    let old = send(verify(first_secret), StatusCode::OK).await;
    assert_eq!(old["valid"], false);
    let new = send(verify(second_secret), StatusCode::OK).await;
    assert_eq!(new["valid"], true);

    let revoked = send(client.delete(&slot_url).bearer_auth(&token), StatusCode::OK).await;
    assert_eq!(revoked["revoked_client_id"], client_id.as_str());

    let reissued = send(client.post(&slot_url).bearer_auth(&token), StatusCode::CREATED).await;
    assert_ne!(reissued["handle"]["client_id"], client_id.as_str());
}

#[tokio::test]
async fn validation_errors_and_paging() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let client = reqwest::Client::new();
    let token = mint_jwt(jwt_secret, UserId::new());

    let err = send(
        client.get(srv.url("/products/not-a-uuid")).bearer_auth(&token),
        StatusCode::UNPROCESSABLE_ENTITY,
    )
    .await;
    assert_eq!(err["kind"], "validation_error");

    let missing = uuid::Uuid::now_v7();
    send(
        client.get(srv.url(&format!("/products/{missing}"))).bearer_auth(&token),
        StatusCode::NOT_FOUND,
    )
    .await;

    for name in ["Alpha", "Beta", "Gamma"] {
        send(
            client
                .post(srv.url("/products"))
                .bearer_auth(&token)
                .json(&json!({ "name": name })),
            StatusCode::CREATED,
        )
        .await;
    }
    let page = send(
        client
            .get(srv.url("/products?limit=2&sort=name&order=desc"))
            .bearer_auth(&token),
        StatusCode::OK,
    )
    .await;
    assert_eq!(page["total"], 3);
    let names: Vec<_> = page["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["Gamma", "Beta"]);

    send(
        client.get(srv.url("/products?limit=0")).bearer_auth(&token),
        StatusCode::UNPROCESSABLE_ENTITY,
    )
    .await;
    send(
        client.get(srv.url("/products?sort=colour")).bearer_auth(&token),
        StatusCode::UNPROCESSABLE_ENTITY,
    )
    .await;
}

#[tokio::test]
async fn categories_and_tags_feed_the_index() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let client = reqwest::Client::new();
    let token = mint_jwt(jwt_secret, UserId::new());

    let category = send(
        client
            .post(srv.url("/categories"))
            .bearer_auth(&token)
            .json(&json!({ "name": "Finance", "weight": 1 })),
        StatusCode::CREATED,
    )
    .await;
    let category_id = category["id"].as_str().unwrap().to_string();

    send(
        client
            .post(srv.url("/product-tags"))
            .bearer_auth(&token)
            .json(&json!({ "name": "Beta" })),
        StatusCode::CREATED,
    )
    .await;
    send(
        client
            .post(srv.url("/product-tags"))
            .bearer_auth(&token)
            .json(&json!({ "name": "beta" })),
        StatusCode::CONFLICT,
    )
    .await;

    let product = send(
        client.post(srv.url("/products")).bearer_auth(&token).json(&json!({
            "name": "Ledger",
            "categories": [category_id],
            "tags": ["beta"],
        })),
        StatusCode::CREATED,
    )
    .await;

    let in_category = send(
        client
            .get(srv.url(&format!("/categories/{category_id}/products")))
            .bearer_auth(&token),
        StatusCode::OK,
    )
    .await;
    assert_eq!(in_category["items"][0]["id"], product["id"]);

    let tagged = send(
        client.get(srv.url("/product-tags/beta/products")).bearer_auth(&token),
        StatusCode::OK,
    )
    .await;
    assert_eq!(tagged["total"], 1);

    let overview = send(client.get(srv.url("/catalog")).bearer_auth(&token), StatusCode::OK).await;
    assert_eq!(overview[0]["category_id"].as_str().unwrap(), category_id);
}

#[tokio::test]
async fn application_update_retags_and_freezes_on_revoke() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;
    let client = reqwest::Client::new();
    let owner = UserId::new();
    let editor = UserId::new();
    let owner_token = mint_jwt(jwt_secret, owner);
    let editor_token = mint_jwt(jwt_secret, editor);

    let app = send(
        client.post(srv.url("/applications")).bearer_auth(&owner_token).json(&json!({
            "name": "Storefront",
            "grant_types": ["client_credentials"],
            "tags": ["retail"],
        })),
        StatusCode::CREATED,
    )
    .await;
    let app_url = srv.url(&format!("/applications/{}", app["id"].as_str().unwrap()));

    let updated = send(
        client.patch(&app_url).bearer_auth(&editor_token).json(&json!({
            "name": "Storefront v2",
            "tags": ["Partner"],
        })),
        StatusCode::OK,
    )
    .await;
    assert_eq!(updated["name"], "Storefront v2");
    assert_eq!(updated["created_by"].as_str().unwrap(), owner.to_string());
    assert_eq!(updated["changed_by"].as_str().unwrap(), editor.to_string());

    let retail = send(
        client.get(srv.url("/application-tags/retail/applications")).bearer_auth(&owner_token),
        StatusCode::OK,
    )
    .await;
    assert_eq!(retail["total"], 0);
    let partner = send(
        client.get(srv.url("/application-tags/partner/applications")).bearer_auth(&owner_token),
        StatusCode::OK,
    )
    .await;
    assert_eq!(partner["items"][0]["id"], app["id"]);

    let err = send(
        client.patch(&app_url).bearer_auth(&owner_token).json(&json!({ "grant_types": [] })),
        StatusCode::UNPROCESSABLE_ENTITY,
    )
    .await;
    assert_eq!(err["kind"], "validation_error");

    send(
        client.post(format!("{app_url}/revoke")).bearer_auth(&owner_token),
        StatusCode::OK,
    )
    .await;
    let err = send(
        client.patch(&app_url).bearer_auth(&owner_token).json(&json!({ "description": "late" })),
        StatusCode::PRECONDITION_FAILED,
    )
    .await;
    assert_eq!(err["kind"], "invalid_state");
}
