//! Integration tests for the API server.

use std::sync::OnceLock;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use common::{CouponId, Decimal, MenuItemId, Money, TableId, UserId};
use jsonwebtoken::{EncodingKey, Header, encode};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use store::{
    CouponRecord, CouponTarget, DiscountType, InMemoryStore, MenuItemRecord, TableRecord,
    TableStatus,
};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

const JWT_SECRET: &str = "api-test-secret";

struct TestApp {
    app: axum::Router,
    store: InMemoryStore,
    table_id: TableId,
    pho: MenuItemId,
    tea: MenuItemId,
    sold_out: MenuItemId,
}

async fn setup() -> TestApp {
    let store = InMemoryStore::new();

    let table_id = TableId::new();
    store
        .insert_table(TableRecord {
            id: table_id,
            number: 1,
            status: TableStatus::Available,
            capacity: 4,
        })
        .await;

    let pho = MenuItemId::new();
    let tea = MenuItemId::new();
    let sold_out = MenuItemId::new();
    for (id, name, price, is_available) in [
        (pho, "Pho", 50_000, true),
        (tea, "Iced tea", 10_000, true),
        (sold_out, "Seasonal soup", 40_000, false),
    ] {
        store
            .insert_menu_item(MenuItemRecord {
                id,
                name: name.to_string(),
                price: Money::from_minor(price),
                is_available,
            })
            .await;
    }

    store
        .insert_coupon(CouponRecord {
            id: CouponId::new(),
            code: "SAVE10".to_string(),
            discount_type: DiscountType::Percent,
            discount_value: Decimal::from(10),
            max_discount_value: Some(Money::from_minor(5_000)),
            min_order_value: Money::zero(),
            usage_limit: None,
            used_count: 0,
            limit_per_user: None,
            target_type: CouponTarget::Any,
            start_date: Utc::now() - chrono::Duration::days(1),
            end_date: Utc::now() + chrono::Duration::days(1),
            is_active: true,
        })
        .await;

    let config = api::config::Config {
        jwt_secret: Some(JWT_SECRET.to_string()),
        ..api::config::Config::default()
    };
    let state = api::create_default_state(store.clone(), &config);
    let app = api::create_app(state, get_metrics_handle());

    TestApp {
        app,
        store,
        table_id,
        pho,
        tea,
        sold_out,
    }
}

async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or(Value::Null)
    };
    (status, json)
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn create_order(t: &TestApp, items: Value) -> Value {
    let (status, json) = send(
        &t.app,
        json_request(
            "POST",
            "/orders",
            json!({ "table_id": t.table_id, "items": items }),
        ),
    )
    .await;
    assert!(status.is_success(), "create failed: {status} {json}");
    json["order"].clone()
}

#[tokio::test]
async fn test_health_check() {
    let t = setup().await;

    let (status, json) = send(&t.app, get_request("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let t = setup().await;

    let response = t
        .app
        .clone()
        .oneshot(get_request("/metrics"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_create_order_with_coupon() {
    let t = setup().await;

    let (status, json) = send(
        &t.app,
        json_request(
            "POST",
            "/orders",
            json!({
                "table_id": t.table_id,
                "items": [{ "menu_item_id": t.pho, "quantity": 2, "notes": "no onion" }],
                "coupon_code": "SAVE10"
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["merged"], false);
    let order = &json["order"];
    assert_eq!(order["status"], "pending");
    assert_eq!(order["subtotal"], 100_000);
    assert_eq!(order["tax_amount"], 8_000);
    assert_eq!(order["discount_amount"], 5_000);
    assert_eq!(order["total_amount"], 103_000);
    assert_eq!(order["items"][0]["notes"], "no onion");
}

#[tokio::test]
async fn test_second_create_merges() {
    let t = setup().await;
    let first = create_order(&t, json!([{ "menu_item_id": t.pho, "quantity": 1 }])).await;

    let (status, json) = send(
        &t.app,
        json_request(
            "POST",
            "/orders",
            json!({
                "table_id": t.table_id,
                "items": [{ "menu_item_id": t.tea, "quantity": 1 }]
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["merged"], true);
    assert_eq!(json["order"]["id"], first["id"]);
    assert_eq!(json["order"]["subtotal"], 60_000);
    assert_eq!(t.store.order_count().await, 1);
}

#[tokio::test]
async fn test_create_rejects_unavailable_item() {
    let t = setup().await;

    let (status, json) = send(
        &t.app,
        json_request(
            "POST",
            "/orders",
            json!({
                "table_id": t.table_id,
                "items": [{ "menu_item_id": t.sold_out, "quantity": 1 }]
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("unavailable"));
}

#[tokio::test]
async fn test_create_rejects_oversized_quantity() {
    let t = setup().await;

    let (status, json) = send(
        &t.app,
        json_request(
            "POST",
            "/orders",
            json!({
                "table_id": t.table_id,
                "items": [{ "menu_item_id": t.pho, "quantity": 3_000_000_000u32 }]
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("Quantity"));
    assert_eq!(t.store.order_count().await, 0);
}

#[tokio::test]
async fn test_create_rejects_ineligible_coupon() {
    let t = setup().await;

    let (status, json) = send(
        &t.app,
        json_request(
            "POST",
            "/orders",
            json!({
                "table_id": t.table_id,
                "items": [{ "menu_item_id": t.pho, "quantity": 1 }],
                "coupon_code": "NOPE"
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(json["error"].is_string());
    assert_eq!(t.store.order_count().await, 0);
}

#[tokio::test]
async fn test_customer_taken_from_bearer_token() {
    let t = setup().await;
    let user_id = UserId::new();
    let token = encode(
        &Header::default(),
        &realtime::Claims {
            sub: user_id.to_string(),
            role: "customer".to_string(),
            exp: (Utc::now() + chrono::Duration::hours(1)).timestamp(),
        },
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap();

    let mut request = json_request(
        "POST",
        "/orders",
        json!({
            "table_id": t.table_id,
            "items": [{ "menu_item_id": t.tea, "quantity": 1 }]
        }),
    );
    request.headers_mut().insert(
        "authorization",
        format!("Bearer {token}").parse().unwrap(),
    );
    let (status, json) = send(&t.app, request).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["order"]["customer_id"], user_id.to_string());
}

#[tokio::test]
async fn test_get_order() {
    let t = setup().await;
    let created = create_order(&t, json!([{ "menu_item_id": t.pho, "quantity": 1 }])).await;
    let order_id = created["id"].as_str().unwrap();

    let (status, order) = send(&t.app, get_request(&format!("/orders/{order_id}"))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["id"], order_id);
    assert_eq!(order["items"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_get_nonexistent_order() {
    let t = setup().await;
    let fake_id = uuid::Uuid::new_v4();

    let (status, json) = send(&t.app, get_request(&format!("/orders/{fake_id}"))).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn test_invalid_order_id_format() {
    let t = setup().await;

    let (status, _) = send(&t.app, get_request("/orders/not-a-uuid")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_orders_filters_by_status() {
    let t = setup().await;
    let created = create_order(&t, json!([{ "menu_item_id": t.pho, "quantity": 1 }])).await;

    let (status, page) = send(&t.app, get_request("/orders?status=pending&per_page=5")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 1);
    assert_eq!(page["per_page"], 5);
    assert_eq!(page["items"][0]["id"], created["id"]);

    let (_, page) = send(&t.app, get_request("/orders?status=completed")).await;
    assert_eq!(page["total"], 0);

    let (status, _) = send(&t.app, get_request("/orders?status=lost")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_kitchen_flow_to_served() {
    let t = setup().await;
    let created = create_order(&t, json!([{ "menu_item_id": t.pho, "quantity": 1 }])).await;
    let order_id = created["id"].as_str().unwrap();
    let item_id = created["items"][0]["id"].as_str().unwrap();

    let (status, _) = send(
        &t.app,
        json_request(
            "PATCH",
            &format!("/orders/{order_id}/served"),
            json!({ "is_served": true }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, order) = send(
        &t.app,
        json_request("POST", &format!("/orders/{order_id}/approve"), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "processing");
    assert_eq!(order["items"][0]["status"], "preparing");

    let (status, order) = send(
        &t.app,
        json_request(
            "PATCH",
            &format!("/orders/{order_id}/items/{item_id}/status"),
            json!({ "status": "ready" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["items"][0]["status"], "ready");

    let (status, order) = send(
        &t.app,
        json_request(
            "PATCH",
            &format!("/orders/{order_id}/served"),
            json!({ "is_served": true }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["is_served"], true);
}

#[tokio::test]
async fn test_reject_items_refunds() {
    let t = setup().await;
    let created = create_order(
        &t,
        json!([
            { "menu_item_id": t.pho, "quantity": 1 },
            { "menu_item_id": t.tea, "quantity": 2 }
        ]),
    )
    .await;
    let order_id = created["id"].as_str().unwrap();
    let tea_line = created["items"][1]["id"].clone();

    let (status, json) = send(
        &t.app,
        json_request(
            "POST",
            &format!("/orders/{order_id}/items/reject"),
            json!({ "item_ids": [tea_line] }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["refunded_amount"], 20_000);
    assert_eq!(json["order"]["subtotal"], 50_000);
    assert_eq!(json["order"]["total_amount"], 54_000);
}

#[tokio::test]
async fn test_append_items() {
    let t = setup().await;
    let created = create_order(&t, json!([{ "menu_item_id": t.pho, "quantity": 1 }])).await;
    let order_id = created["id"].as_str().unwrap();

    let (status, order) = send(
        &t.app,
        json_request(
            "POST",
            &format!("/orders/{order_id}/items"),
            json!({ "items": [{ "menu_item_id": t.tea, "quantity": 3 }] }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["items"].as_array().unwrap().len(), 2);
    assert_eq!(order["subtotal"], 80_000);
}

#[tokio::test]
async fn test_checkout_releases_table() {
    let t = setup().await;
    let created = create_order(&t, json!([{ "menu_item_id": t.pho, "quantity": 1 }])).await;
    let order_id = created["id"].as_str().unwrap();

    let (_, tables) = send(&t.app, get_request("/tables")).await;
    assert_eq!(tables[0]["status"], "occupied");

    let (status, order) = send(
        &t.app,
        json_request(
            "POST",
            &format!("/orders/{order_id}/checkout"),
            json!({ "payment_method": "cash" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "completed");
    assert_eq!(order["payment_status"], "paid");

    let (_, tables) = send(&t.app, get_request("/tables")).await;
    assert_eq!(tables[0]["status"], "available");

    let (status, _) = send(
        &t.app,
        json_request("POST", &format!("/orders/{order_id}/checkout"), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_update_status_validation() {
    let t = setup().await;
    let created = create_order(&t, json!([{ "menu_item_id": t.pho, "quantity": 1 }])).await;
    let order_id = created["id"].as_str().unwrap();

    let (status, _) = send(
        &t.app,
        json_request(
            "PATCH",
            &format!("/orders/{order_id}/status"),
            json!({ "status": "teleported" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, order) = send(
        &t.app,
        json_request(
            "PATCH",
            &format!("/orders/{order_id}/status"),
            json!({ "status": "cancelled" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "cancelled");

    let (status, _) = send(
        &t.app,
        json_request(
            "PATCH",
            &format!("/orders/{order_id}/status"),
            json!({ "status": "processing" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_validate_voucher() {
    let t = setup().await;

    let (status, json) = send(
        &t.app,
        json_request(
            "POST",
            "/vouchers/validate",
            json!({ "code": "SAVE10", "cart_total": 100_000 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["valid"], true);
    assert_eq!(json["discount"], 5_000);

    let (status, json) = send(
        &t.app,
        json_request(
            "POST",
            "/vouchers/validate",
            json!({ "code": "MISSING", "cart_total": 100_000 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["valid"], false);
    assert_eq!(json["rejection"]["reason"], "not_found");
}
