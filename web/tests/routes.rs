//! End-to-end HTTP tests over the in-memory storefront.

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use serde_json::{Value, json};
use std::sync::Arc;
use storefront_core::catalog::Product;
use storefront_core::{Money, UserId};
use storefront_runtime::{CacheService, Environment, MemoryCache, StoreSettings};
use storefront_testing::{InMemoryStorefront, RecordingPublisher, fixtures, test_clock};
use storefront_web::{AppState, USER_ID_HEADER, build_router};

struct TestApp {
    server: TestServer,
    store: InMemoryStorefront,
    events: RecordingPublisher,
    user: UserId,
}

fn app() -> TestApp {
    storefront_testing::helpers::init_tracing();
    let clock = test_clock();
    let store = InMemoryStorefront::new();
    let events = RecordingPublisher::new();
    let env = Environment::new(
        Arc::new(store.clone()),
        CacheService::new(Arc::new(MemoryCache::new(Arc::new(clock.clone())))),
        Arc::new(events.clone()),
        Arc::new(clock),
        Arc::new(StoreSettings::default()),
    );
    let server = TestServer::new(build_router(AppState::new(&env))).expect("test server");

    TestApp {
        server,
        store,
        events,
        user: UserId::new(),
    }
}

impl TestApp {
    fn seed(&self, name: &str, price_cents: i64, stock: u32) -> Product {
        let category = self.store.insert_category(fixtures::category("Games"));
        self.store
            .insert_product(fixtures::product(category.id, name, price_cents, stock))
    }

    fn user_header(&self) -> (HeaderName, HeaderValue) {
        (
            HeaderName::from_static("x-user-id"),
            HeaderValue::from_str(&self.user.to_string()).unwrap(),
        )
    }

    async fn post_json(&self, path: &str, body: &Value) -> axum_test::TestResponse {
        let (name, value) = self.user_header();
        self.server.post(path).add_header(name, value).json(body).await
    }

    async fn get(&self, path: &str) -> axum_test::TestResponse {
        let (name, value) = self.user_header();
        self.server.get(path).add_header(name, value).await
    }
}

fn checkout_form() -> Vec<(&'static str, &'static str)> {
    vec![
        ("recipient", "Maria Silva"),
        ("street", "Avenida Paulista"),
        ("number", "1000"),
        ("city", "São Paulo"),
        ("state", "SP"),
        ("postal_code", "01310-100"),
        ("coupon_code", "desconto10"),
    ]
}

#[tokio::test]
async fn health_and_readiness() {
    let app = app();

    let response = app.server.get("/health").await;
    response.assert_status_ok();
    response.assert_text("ok");

    let response = app.server.get("/ready").await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["database"], json!(true));

    app.store.set_failing(true);
    let response = app.server.get("/ready").await;
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn user_header_is_required() {
    let app = app();

    let response = app.server.get("/cart").await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(response.json::<Value>()["code"], json!("UNAUTHORIZED"));

    let response = app
        .server
        .get("/cart")
        .add_header(
            HeaderName::from_static("x-user-id"),
            HeaderValue::from_static("not-a-uuid"),
        )
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(USER_ID_HEADER.to_ascii_lowercase(), "x-user-id");
}

#[tokio::test]
async fn add_to_cart_contract() {
    let app = app();
    let product = app.seed("Chess", 10_000, 5);

    let response = app
        .post_json("/cart/add", &json!({"product_id": product.id, "quantity": 2}))
        .await;
    response.assert_status_ok();
    let body = response.json::<Value>();
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["cart_count"], json!(2));
    assert!(body["item_id"].is_string());

    let response = app
        .post_json("/cart/add", &json!({"product_id": product.id, "quantity": 4}))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body = response.json::<Value>();
    assert_eq!(body["success"], json!(false));
    assert!(body["message"].as_str().unwrap().contains("not available"));

    let response = app
        .post_json("/cart/add", &json!({"product_id": product.id, "quantity": 0}))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = app.get("/cart/count").await;
    assert_eq!(response.json::<Value>(), json!({"cart_count": 2}));
}

#[tokio::test]
async fn update_remove_and_clear() {
    let app = app();
    let chess = app.seed("Chess", 10_000, 5);
    let go = app.seed("Go", 2_500, 5);

    let added = app
        .post_json("/cart/add", &json!({"product_id": chess.id}))
        .await
        .json::<Value>();
    app.post_json("/cart/add", &json!({"product_id": go.id, "quantity": 2}))
        .await
        .assert_status_ok();

    let response = app
        .post_json("/cart/update", &json!({"item_id": added["item_id"], "quantity": 3}))
        .await;
    response.assert_status_ok();
    let body = response.json::<Value>();
    assert_eq!(body["cart_count"], json!(5));
    assert_eq!(body["item_total"], json!("300.00"));
    assert_eq!(body["cart_total"], json!("350.00"));

    let response = app
        .post_json("/cart/remove", &json!({"item_id": added["item_id"]}))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["cart_count"], json!(2));

    let response = app
        .post_json("/cart/remove", &json!({"item_id": added["item_id"]}))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = app.post_json("/cart/clear", &json!({})).await;
    assert_eq!(response.json::<Value>()["removed"], json!(1));
    assert_eq!(app.get("/cart").await.json::<Value>()["item_count"], json!(0));
}

#[tokio::test]
async fn checkout_redirects_to_the_order() {
    let app = app();
    app.store.insert_coupon(fixtures::desconto10());
    let product = app.seed("Chess", 10_000, 5);
    app.post_json("/cart/add", &json!({"product_id": product.id, "quantity": 2}))
        .await
        .assert_status_ok();

    let (name, value) = app.user_header();
    let response = app
        .server
        .post("/checkout")
        .add_header(name, value)
        .form(&checkout_form())
        .await;

    response.assert_status(StatusCode::SEE_OTHER);
    let location = response.header("location");
    let location = location.to_str().unwrap();
    assert!(location.starts_with("/orders/"));
    let cookie = response.header("set-cookie");
    assert!(cookie.to_str().unwrap().starts_with("flash=success%3AOrder%20ORD-20250101-0001"));

    let order = app.get(location).await.json::<Value>();
    assert_eq!(order["status"], json!("pending"));
    assert_eq!(order["coupon_code"], json!("DESCONTO10"));
    assert_eq!(app.store.stock_of(product.id), Some(3));
    assert!(app.events.event_types().contains(&"OrderPlaced.v1"));
}

#[tokio::test]
async fn failed_checkout_returns_to_cart_with_flash() {
    let app = app();

    let (name, value) = app.user_header();
    let response = app
        .server
        .post("/checkout")
        .add_header(name, value)
        .form(&checkout_form()[..6])
        .await;

    response.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(response.header("location"), "/cart");
    let cookie = response.header("set-cookie");
    assert!(cookie.to_str().unwrap().starts_with("flash=error%3ACart%20is%20empty"));
}

#[tokio::test]
async fn customers_cancel_their_own_orders_only() {
    let app = app();
    let product = app.seed("Chess", 10_000, 5);
    app.post_json("/cart/add", &json!({"product_id": product.id}))
        .await
        .assert_status_ok();
    let (name, value) = app.user_header();
    let location = app
        .server
        .post("/checkout")
        .add_header(name, value)
        .form(&checkout_form()[..6])
        .await
        .header("location");
    let path = location.to_str().unwrap();

    let stranger = app
        .server
        .post(&format!("{path}/cancel"))
        .add_header(
            HeaderName::from_static("x-user-id"),
            HeaderValue::from_str(&UserId::new().to_string()).unwrap(),
        )
        .await;
    stranger.assert_status(StatusCode::NOT_FOUND);

    let response = app
        .post_json(&format!("{path}/cancel"), &json!({"reason": "changed my mind"}))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["status"], json!("cancelled"));
    assert_eq!(app.store.stock_of(product.id), Some(5));

    let again = app.post_json(&format!("{path}/cancel"), &json!({})).await;
    again.assert_status(StatusCode::CONFLICT);

    let orders = app.get("/orders").await.json::<Vec<Value>>();
    assert_eq!(orders.len(), 1);
}

#[tokio::test]
async fn catalog_listing_and_detail() {
    let app = app();
    let chess = app.seed("Chess", 10_000, 5);
    let go = app.seed("Go Board", 5_000, 5);
    app.store.update_product(go.id, |p| {
        p.promotional_price = Some(Money::from_cents(4_000));
    });

    let all = app.server.get("/products").await.json::<Vec<Value>>();
    assert_eq!(all.len(), 2);

    let on_sale = app
        .server
        .get("/products")
        .add_query_param("on_sale", "true")
        .await
        .json::<Vec<Value>>();
    assert_eq!(on_sale.len(), 1);
    assert_eq!(on_sale[0]["name"], json!("Go Board"));

    app.server
        .get(&format!("/products/{}", chess.id))
        .await
        .assert_status_ok();
    app.server
        .get(&format!("/products/{}", UserId::new()))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn wishlist_toggle() {
    let app = app();
    let product = app.seed("Chess", 10_000, 5);

    let on = app
        .post_json("/wishlist/toggle", &json!({"product_id": product.id}))
        .await
        .json::<Value>();
    assert_eq!(on["in_wishlist"], json!(true));
    assert_eq!(app.get("/wishlist").await.json::<Vec<Value>>().len(), 1);

    let off = app
        .post_json("/wishlist/toggle", &json!({"product_id": product.id}))
        .await
        .json::<Value>();
    assert_eq!(off["in_wishlist"], json!(false));
}

#[tokio::test]
async fn admin_dashboard_cache_clear_flow() {
    let app = app();
    app.seed("Chess", 10_000, 1);

    let dashboard = app.server.get("/admin/dashboard").await.json::<Value>();
    assert_eq!(dashboard["counts"]["total_products"], json!(1));
    assert_eq!(dashboard["revenue_series"].as_array().unwrap().len(), 30);
    assert!(dashboard.get("flash").is_none());

    let response = app.server.post("/admin/dashboard/clear-cache").await;
    response.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(response.header("location"), "/admin/dashboard");
    let cookie = response.header("set-cookie");
    let pair = cookie.to_str().unwrap().split(';').next().unwrap().to_string();

    let response = app
        .server
        .get("/admin/dashboard")
        .add_header(
            HeaderName::from_static("cookie"),
            HeaderValue::from_str(&pair).unwrap(),
        )
        .await;
    let body = response.json::<Value>();
    assert_eq!(body["flash"]["level"], json!("success"));
    assert!(response.header("set-cookie").to_str().unwrap().contains("Max-Age=0"));
}

#[tokio::test]
async fn admin_order_lifecycle_and_stock() {
    let app = app();
    let product = app.seed("Chess", 10_000, 5);
    app.post_json("/cart/add", &json!({"product_id": product.id}))
        .await
        .assert_status_ok();
    let (name, value) = app.user_header();
    let location = app
        .server
        .post("/checkout")
        .add_header(name, value)
        .form(&checkout_form()[..6])
        .await
        .header("location");
    let id = location.to_str().unwrap().trim_start_matches("/orders/").to_string();

    let confirmed = app
        .server
        .post(&format!("/admin/orders/{id}/status"))
        .await
        .json::<Value>();
    assert_eq!(confirmed["status"], json!("confirmed"));

    app.server
        .post(&format!("/admin/orders/{id}/status"))
        .json(&json!({"status": "delivered"}))
        .await
        .assert_status(StatusCode::CONFLICT);

    app.server
        .post(&format!("/admin/orders/{id}/payment-status"))
        .json(&json!({"payment_status": "refunded"}))
        .await
        .assert_status(StatusCode::CONFLICT);
    let paid = app
        .server
        .post(&format!("/admin/orders/{id}/payment-status"))
        .json(&json!({"payment_status": "paid"}))
        .await
        .json::<Value>();
    assert_eq!(paid["payment_status"], json!("paid"));

    app.server
        .delete(&format!("/admin/products/{}", product.id))
        .await
        .assert_status(StatusCode::CONFLICT);

    let restocked = app
        .server
        .post(&format!("/admin/products/{}/stock", product.id))
        .json(&json!({"quantity": 40}))
        .await
        .json::<Value>();
    assert_eq!(restocked["stock_quantity"], json!(40));

    let cancelled = app
        .server
        .post(&format!("/admin/orders/{id}/cancel"))
        .await
        .json::<Value>();
    assert_eq!(cancelled["status"], json!("cancelled"));
    assert_eq!(app.store.stock_of(product.id), Some(41));
}

async fn place_order(app: &TestApp) -> String {
    let product = app.seed("Chess", 10_000, 5);
    app.post_json("/cart/add", &json!({"product_id": product.id}))
        .await
        .assert_status_ok();
    let (name, value) = app.user_header();
    let location = app
        .server
        .post("/checkout")
        .add_header(name, value)
        .form(&checkout_form()[..6])
        .await
        .header("location");
    location.to_str().unwrap().to_string()
}

#[tokio::test]
async fn misspelled_admin_status_is_rejected() {
    let app = app();
    let path = place_order(&app).await;
    let id = path.trim_start_matches("/orders/");

    let response = app
        .server
        .post(&format!("/admin/orders/{id}/status"))
        .json(&json!({"status": "shiped"}))
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.json::<Value>()["code"], json!("VALIDATION_ERROR"));

    let response = app
        .server
        .post(&format!("/admin/orders/{id}/status"))
        .text("{\"status\":")
        .content_type("application/json")
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    assert_eq!(app.get(&path).await.json::<Value>()["status"], json!("pending"));
}

#[tokio::test]
async fn malformed_cancel_body_keeps_the_order() {
    let app = app();
    let path = place_order(&app).await;

    let response = app
        .post_json(&format!("{path}/cancel"), &json!({"reason": 42}))
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    let (name, value) = app.user_header();
    let response = app
        .server
        .post(&format!("{path}/cancel"))
        .add_header(name, value)
        .text("reason=changed")
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let order = app.get(&path).await.json::<Value>();
    assert_eq!(order["status"], json!("pending"));

    let response = app
        .post_json(&format!("{path}/cancel"), &json!({"reason": "wrong size"}))
        .await;
    response.assert_status_ok();
    assert_eq!(
        response.json::<Value>()["cancellation_reason"],
        json!("wrong size")
    );
}

#[tokio::test]
async fn unreadable_cart_bodies_get_the_cart_envelope() {
    let app = app();
    let product = app.seed("Chess", 10_000, 5);

    for (path, body) in [
        ("/cart/add", json!({"product_id": product.id, "quantity": -1})),
        ("/cart/add", json!({"product_id": "chess"})),
        ("/cart/update", json!({"item_id": "x", "quantity": 1})),
        ("/cart/remove", json!({})),
    ] {
        let response = app.post_json(path, &body).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body = response.json::<Value>();
        assert_eq!(body["success"], json!(false), "{path}");
        assert!(body["message"].is_string(), "{path}");
    }

    assert_eq!(
        app.get("/cart/count").await.json::<Value>(),
        json!({"cart_count": 0})
    );
}
