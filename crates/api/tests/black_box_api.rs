use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{Value, json};

use storefront_api::app::services::AppServices;
use storefront_auth::{AccessClaims, Role};
use storefront_core::{Money, ProductId, SystemClock, UserId, VariantId};
use storefront_infra::StorefrontConfig;
use storefront_infra::store::{InMemoryStore, ProductRecord, VariantRecord};

const JWT_SECRET: &str = "black-box-secret";

struct TestServer {
    base_url: String,
    store: Arc<InMemoryStore>,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("JWT_SECRET", JWT_SECRET),
            ("PASSWORD_HASH_MEMORY_KIB", "8"),
            ("PASSWORD_HASH_ITERATIONS", "1"),
        ]);
        let config = StorefrontConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()))
            .expect("valid test config");

        // Same router as prod, over a store the test can seed, on an ephemeral port.
        let store = Arc::new(InMemoryStore::new());
        let services = AppServices::new(store.clone(), Arc::new(SystemClock), &config)
            .expect("services start");
        let app = storefront_api::app::build_app(Arc::new(services));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            store,
            client: reqwest::Client::new(),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn seed(&self, name: &str, price_cents: i64, stock: u32) -> VariantId {
        let product = ProductRecord {
            id: ProductId::new(),
            name: name.to_string(),
            images: vec![format!("https://cdn.example.com/{name}.png")],
        };
        let variant = VariantRecord {
            id: VariantId::new(),
            product_id: product.id,
            price: Money::from_cents(price_cents),
            stock,
            active: true,
        };
        let id = variant.id;
        self.store.seed_product(product).await;
        self.store.seed_variant(variant).await;
        id
    }

    async fn register(&self, username: &str, role: Option<&str>) -> Value {
        let res = self
            .client
            .post(self.url("/auth/register"))
            .json(&json!({
                "username": username,
                "email": format!("{username}@example.com"),
                "password": "correct horse",
                "role": role,
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        res.json().await.unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn access_token(tokens: &Value) -> String {
    tokens["access_token"].as_str().unwrap().to_string()
}

fn mint_jwt(secret: &str, role: Role) -> String {
    let now = Utc::now();
    let claims = AccessClaims {
        sub: UserId::new(),
        email: "mallory@example.com".into(),
        role,
        iss: "storefront".into(),
        iat: now.timestamp(),
        exp: (now + ChronoDuration::minutes(10)).timestamp(),
        jti: uuid::Uuid::now_v7(),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("failed to encode jwt")
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn().await;
    let res = srv.client.get(srv.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let srv = TestServer::spawn().await;

    let res = srv.client.get(srv.url("/orders")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_or_expired_token");
}

#[tokio::test]
async fn tokens_signed_with_another_key_are_rejected() {
    let srv = TestServer::spawn().await;
    let forged = mint_jwt("not-the-server-secret", Role::admin());

    let res = srv
        .client
        .get(srv.url("/orders"))
        .bearer_auth(forged)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // A present-but-bad token is not downgraded to anonymous on cart routes.
    let res = srv
        .client
        .get(srv.url("/cart?session_id=abc"))
        .bearer_auth("garbage")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn cart_to_order_checkout_flow() {
    let srv = TestServer::spawn().await;
    let a = srv.seed("mug", 1000, 5).await;
    let b = srv.seed("lamp", 8500, 2).await;
    let token = access_token(&srv.register("ada", None).await);

    for (variant, quantity) in [(a, 2), (b, 1)] {
        let res = srv
            .client
            .post(srv.url("/cart/items"))
            .bearer_auth(&token)
            .json(&json!({ "variant_id": variant.to_string(), "quantity": quantity }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    let cart: Value = srv
        .client
        .get(srv.url("/cart"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(cart["lines"].as_array().unwrap().len(), 2);
    assert_eq!(cart["total"], "113.40");

    let res = srv
        .client
        .post(srv.url("/orders"))
        .bearer_auth(&token)
        .json(&json!({ "phone": "+1 555 0100", "shipping_address": "1 Main St", "payment_method": "cash" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let order: Value = res.json().await.unwrap();
    assert_eq!(order["status"], "PENDING");
    assert_eq!(order["payment_method"], "cash");
    assert_eq!(order["subtotal"], "105.00");
    assert_eq!(order["shipping"], "0.00");
    assert_eq!(order["tax"], "8.40");
    assert_eq!(order["total"], "113.40");
    assert!(order["order_number"].as_str().unwrap().starts_with("ORD-"));

    assert_eq!(srv.store.stock_of(a).await, Some(3));
    assert_eq!(srv.store.stock_of(b).await, Some(1));

    let orders: Value = srv
        .client
        .get(srv.url("/orders"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(orders.as_array().unwrap().len(), 1);

    let id = order["id"].as_str().unwrap();
    let res = srv
        .client
        .get(srv.url(&format!("/orders/{id}")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = srv
        .client
        .post(srv.url("/orders"))
        .bearer_auth(&token)
        .json(&json!({ "phone": "+1 555 0100", "shipping_address": "1 Main St" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "empty_cart");
}

#[tokio::test]
async fn insufficient_stock_is_a_conflict() {
    let srv = TestServer::spawn().await;
    let scarce = srv.seed("vase", 2500, 1).await;
    let token = access_token(&srv.register("ada", None).await);

    srv.client
        .post(srv.url("/cart/items"))
        .bearer_auth(&token)
        .json(&json!({ "variant_id": scarce.to_string(), "quantity": 2 }))
        .send()
        .await
        .unwrap();

    let res = srv
        .client
        .post(srv.url("/orders"))
        .bearer_auth(&token)
        .json(&json!({ "phone": "555", "shipping_address": "1 Main St" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "insufficient_stock");
    assert_eq!(srv.store.stock_of(scarce).await, Some(1));
}

#[tokio::test]
async fn anonymous_carts_use_the_session_id() {
    let srv = TestServer::spawn().await;
    let v = srv.seed("mug", 1000, 5).await;

    let res = srv.client.get(srv.url("/cart")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = srv
        .client
        .post(srv.url("/cart/items?session_id=guest-1"))
        .json(&json!({ "variant_id": v.to_string() }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let cart: Value = res.json().await.unwrap();
    assert_eq!(cart["session_id"], "guest-1");
    assert_eq!(cart["lines"][0]["quantity"], 1);

    let res = srv
        .client
        .delete(srv.url(&format!("/cart/items/{v}?session_id=guest-1")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let cart: Value = res.json().await.unwrap();
    assert!(cart["lines"].as_array().unwrap().is_empty());
    assert_eq!(cart["total"], "0.00");
}

#[tokio::test]
async fn refresh_rotates_and_logout_revokes() {
    let srv = TestServer::spawn().await;
    let tokens = srv.register("ada", None).await;
    let first_refresh = tokens["refresh_token"].as_str().unwrap().to_string();

    let res = srv
        .client
        .post(srv.url("/auth/refresh"))
        .json(&json!({ "refresh_token": first_refresh }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let rotated: Value = res.json().await.unwrap();

    let res = srv
        .client
        .post(srv.url("/auth/refresh"))
        .json(&json!({ "refresh_token": first_refresh }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = srv
        .client
        .post(srv.url("/auth/logout"))
        .bearer_auth(access_token(&rotated))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["revoked"], 1);

    let res = srv
        .client
        .post(srv.url("/auth/refresh"))
        .json(&json!({ "refresh_token": rotated["refresh_token"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_failures_do_not_reveal_which_part_was_wrong() {
    let srv = TestServer::spawn().await;
    srv.register("ada", None).await;

    let mut bodies = Vec::new();
    for (login, password) in [("ada", "wrong password"), ("nobody", "correct horse")] {
        let res = srv
            .client
            .post(srv.url("/auth/login"))
            .json(&json!({ "login": login, "password": password }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        bodies.push(res.json::<Value>().await.unwrap());
    }
    assert_eq!(bodies[0], bodies[1]);

    let res = srv
        .client
        .post(srv.url("/auth/login"))
        .json(&json!({ "login": "ADA@example.com", "password": "correct horse" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn only_admins_change_order_status() {
    let srv = TestServer::spawn().await;
    let v = srv.seed("mug", 1000, 5).await;
    let customer = access_token(&srv.register("ada", None).await);
    let admin = access_token(&srv.register("root", Some("admin")).await);

    srv.client
        .post(srv.url("/cart/items"))
        .bearer_auth(&customer)
        .json(&json!({ "variant_id": v.to_string(), "quantity": 1 }))
        .send()
        .await
        .unwrap();
    let order: Value = srv
        .client
        .post(srv.url("/orders"))
        .bearer_auth(&customer)
        .json(&json!({ "phone": "555", "shipping_address": "1 Main St" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let status_url = srv.url(&format!("/admin/orders/{}/status", order["id"].as_str().unwrap()));

    let res = srv
        .client
        .put(&status_url)
        .bearer_auth(&customer)
        .json(&json!({ "status": "CANCELLED" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = srv
        .client
        .put(&status_url)
        .bearer_auth(&admin)
        .json(&json!({ "status": "cancelled" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "CANCELLED");

    let res = srv
        .client
        .put(&status_url)
        .bearer_auth(&admin)
        .json(&json!({ "status": "PROCESSING" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_transition");
}

#[tokio::test]
async fn malformed_bodies_are_validation_errors() {
    let srv = TestServer::spawn().await;
    let v = srv.seed("mug", 1000, 5).await;

    let cases = [
        ("/auth/login", json!({ "login": "ada" })),
        ("/auth/login", json!({ "username": "ada", "email": "ada@example.com", "password": "x" })),
        ("/auth/register", json!({ "username": "ada", "email": "ada@example.com" })),
        ("/auth/refresh", json!({})),
        ("/cart/items?session_id=guest-1", json!({ "variant_id": v.to_string(), "quantity": -1 })),
    ];
    for (path, body) in cases {
        let res = srv.client.post(srv.url(path)).json(&body).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "{path} {body}");
        let err: Value = res.json().await.unwrap();
        assert_eq!(err["error"], "validation_error", "{path} {body}");
        assert!(err["message"].as_str().is_some_and(|m| !m.is_empty()));
    }

    let res = srv
        .client
        .post(srv.url("/auth/login"))
        .body("login=ada&password=x")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let err: Value = res.json().await.unwrap();
    assert_eq!(err["error"], "validation_error");
}

#[tokio::test]
async fn me_echoes_the_access_token_identity() {
    let srv = TestServer::spawn().await;
    let tokens = srv.register("ada", None).await;

    let res = srv
        .client
        .get(srv.url("/auth/me"))
        .bearer_auth(access_token(&tokens))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let me: Value = res.json().await.unwrap();
    assert_eq!(me["user_id"], tokens["user"]["id"]);
    assert_eq!(me["email"], "ada@example.com");
    assert_eq!(me["role"], "customer");

    let res = srv.client.get(srv.url("/auth/me")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}
