//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use chrono::{Duration, Utc};
use common::{CouponId, MenuItemId, ModifierId, Money, OrderId, OrderItemId, TableId, UserId};
use rust_decimal::Decimal;
use sqlx::PgPool;
use store::{
    CouponRecord, CouponTarget, CouponUsageChange, DiscountType, ItemModifierSnapshot, ItemStatus,
    MenuItemRecord, ModifierRecord, OrderItemRecord, OrderQuery, OrderRecord, OrderStatus,
    OrderStore, OrderStoreExt, PaymentStatus, PostgresStore, StoreError, TableRecord, TableStatus,
    Version,
};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_restaurant_schema.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query(
        "TRUNCATE TABLE coupon_usages, order_item_modifiers, order_items, orders, coupons, \
         modifiers, menu_items, restaurant_tables, settings",
    )
    .execute(&pool)
    .await
    .unwrap();

    PostgresStore::new(pool)
}

async fn seed_table(store: &PostgresStore, number: i32) -> TableId {
    let table = TableRecord {
        id: TableId::new(),
        number,
        status: TableStatus::Available,
        capacity: 4,
    };
    store.upsert_table(&table).await.unwrap();
    table.id
}

fn order_on(table_id: TableId, customer_id: Option<UserId>) -> OrderRecord {
    let order_id = OrderId::new();
    let unit_price = Money::from_minor(55_000);
    let now = Utc::now();
    OrderRecord {
        id: order_id,
        table_id,
        customer_id,
        status: OrderStatus::Pending,
        subtotal: unit_price.multiply(2),
        tax_amount: Money::from_minor(8_800),
        discount_amount: Money::zero(),
        coupon_code: None,
        total_amount: unit_price.multiply(2) + Money::from_minor(8_800),
        payment_status: PaymentStatus::Unpaid,
        payment_method: None,
        is_served: false,
        version: Version::first(),
        created_at: now,
        updated_at: now,
        items: vec![OrderItemRecord {
            id: OrderItemId::new(),
            order_id,
            menu_item_id: MenuItemId::new(),
            name: "Pho bo".to_string(),
            quantity: 2,
            unit_price,
            total_price: unit_price.multiply(2),
            notes: Some("no onion".to_string()),
            status: ItemStatus::Pending,
            modifiers: vec![ItemModifierSnapshot {
                modifier_id: ModifierId::new(),
                name: "Extra beef".to_string(),
                price: Money::from_minor(10_000),
            }],
            created_at: now,
        }],
    }
}

#[tokio::test]
async fn insert_and_load_order_with_items() {
    let store = get_test_store().await;
    let table_id = seed_table(&store, 1).await;
    let order = order_on(table_id, None);

    store.insert_order(&order, None).await.unwrap();

    let loaded = store.require_order(order.id).await.unwrap();
    assert_eq!(loaded.version, Version::first());
    assert_eq!(loaded.total_amount, order.total_amount);
    assert_eq!(loaded.items.len(), 1);
    assert_eq!(loaded.items[0].notes.as_deref(), Some("no onion"));
    assert_eq!(loaded.items[0].modifiers.len(), 1);
    assert_eq!(loaded.items[0].modifiers[0].name, "Extra beef");
}

#[tokio::test]
async fn one_active_order_per_table() {
    let store = get_test_store().await;
    let table_id = seed_table(&store, 2).await;

    store
        .insert_order(&order_on(table_id, None), None)
        .await
        .unwrap();
    let result = store.insert_order(&order_on(table_id, None), None).await;

    assert!(matches!(
        result,
        Err(StoreError::ActiveOrderExists { table_id: t }) if t == table_id
    ));
}

#[tokio::test]
async fn update_checks_version() {
    let store = get_test_store().await;
    let table_id = seed_table(&store, 3).await;
    let mut order = order_on(table_id, None);
    store.insert_order(&order, None).await.unwrap();

    order.items[0].status = ItemStatus::Preparing;
    order.status = OrderStatus::Processing;
    let version = store.update_order(&order, None).await.unwrap();
    assert_eq!(version, Version::new(2));

    // Writing with the stale version must fail
    let result = store.update_order(&order, None).await;
    assert!(matches!(
        result,
        Err(StoreError::ConcurrencyConflict { actual, .. }) if actual == Version::new(2)
    ));

    let loaded = store.require_order(order.id).await.unwrap();
    assert_eq!(loaded.status, OrderStatus::Processing);
    assert_eq!(loaded.items[0].status, ItemStatus::Preparing);
}

#[tokio::test]
async fn update_of_missing_order_is_not_found() {
    let store = get_test_store().await;
    let order = order_on(TableId::new(), None);

    let result = store.update_order(&order, None).await;
    assert!(matches!(result, Err(StoreError::OrderNotFound(_))));
}

#[tokio::test]
async fn appended_items_are_upserted() {
    let store = get_test_store().await;
    let table_id = seed_table(&store, 4).await;
    let mut order = order_on(table_id, None);
    store.insert_order(&order, None).await.unwrap();

    let mut extra = order.items[0].clone();
    extra.id = OrderItemId::new();
    extra.modifiers.clear();
    extra.quantity = 1;
    extra.total_price = extra.unit_price;
    order.items.push(extra);
    order.subtotal += order.items[1].total_price;
    order.total_amount = order.subtotal + order.tax_amount;
    store.update_order(&order, None).await.unwrap();

    let loaded = store.require_order(order.id).await.unwrap();
    assert_eq!(loaded.items.len(), 2);
    assert_eq!(loaded.subtotal, order.subtotal);
}

#[tokio::test]
async fn coupon_bookkeeping_commits_with_order() {
    let store = get_test_store().await;
    let table_id = seed_table(&store, 5).await;
    let user_id = UserId::new();
    let coupon = CouponRecord {
        id: CouponId::new(),
        code: "LUNCH10".to_string(),
        discount_type: DiscountType::Percent,
        discount_value: Decimal::from(10),
        max_discount_value: Some(Money::from_minor(50_000)),
        min_order_value: Money::zero(),
        usage_limit: Some(100),
        used_count: 0,
        limit_per_user: Some(1),
        target_type: CouponTarget::Any,
        start_date: Utc::now() - Duration::days(1),
        end_date: Utc::now() + Duration::days(30),
        is_active: true,
    };
    store.upsert_coupon(&coupon).await.unwrap();

    let mut order = order_on(table_id, Some(user_id));
    order.coupon_code = Some(coupon.code.clone());
    order.discount_amount = Money::from_minor(11_000);
    order.total_amount = order.subtotal + order.tax_amount - order.discount_amount;

    store
        .insert_order(
            &order,
            Some(&CouponUsageChange::redeem(coupon.id, order.id, Some(user_id))),
        )
        .await
        .unwrap();

    let stored = store.get_coupon_by_code("LUNCH10").await.unwrap().unwrap();
    assert_eq!(stored.used_count, 1);
    assert_eq!(stored.discount_value, Decimal::from(10));
    assert_eq!(stored.max_discount_value, Some(Money::from_minor(50_000)));
    assert_eq!(store.count_coupon_usages(coupon.id, user_id).await.unwrap(), 1);

    order.status = OrderStatus::Cancelled;
    store
        .update_order(
            &order,
            Some(&CouponUsageChange::release(coupon.id, order.id, Some(user_id))),
        )
        .await
        .unwrap();

    let stored = store.get_coupon_by_code("LUNCH10").await.unwrap().unwrap();
    assert_eq!(stored.used_count, 0);
    assert_eq!(store.count_coupon_usages(coupon.id, user_id).await.unwrap(), 0);
}

#[tokio::test]
async fn redemption_stops_at_usage_limit() {
    let store = get_test_store().await;
    let first_table = seed_table(&store, 41).await;
    let second_table = seed_table(&store, 42).await;
    let coupon = CouponRecord {
        id: CouponId::new(),
        code: "ONCEONLY".to_string(),
        discount_type: DiscountType::Fixed,
        discount_value: Decimal::from(5_000),
        max_discount_value: None,
        min_order_value: Money::zero(),
        usage_limit: Some(1),
        used_count: 0,
        limit_per_user: None,
        target_type: CouponTarget::Any,
        start_date: Utc::now() - Duration::days(1),
        end_date: Utc::now() + Duration::days(30),
        is_active: true,
    };
    store.upsert_coupon(&coupon).await.unwrap();

    let first = order_on(first_table, None);
    store
        .insert_order(&first, Some(&CouponUsageChange::redeem(coupon.id, first.id, None)))
        .await
        .unwrap();

    let second = order_on(second_table, None);
    let result = store
        .insert_order(&second, Some(&CouponUsageChange::redeem(coupon.id, second.id, None)))
        .await;

    assert!(matches!(result, Err(StoreError::CouponExhausted { .. })));
    assert!(store.get_order(second.id).await.unwrap().is_none());
    let stored = store.get_coupon_by_code("ONCEONLY").await.unwrap().unwrap();
    assert_eq!(stored.used_count, 1);
}

#[tokio::test]
async fn catalog_lookups_and_vat() {
    let store = get_test_store().await;
    let item = MenuItemRecord {
        id: MenuItemId::new(),
        name: "Banh mi".to_string(),
        price: Money::from_minor(35_000),
        is_available: true,
    };
    let modifier = ModifierRecord {
        id: ModifierId::new(),
        menu_item_id: item.id,
        name: "Extra pate".to_string(),
        price_adjustment: Money::from_minor(5_000),
    };
    store.upsert_menu_item(&item).await.unwrap();
    store.upsert_modifier(&modifier).await.unwrap();

    let items = store
        .get_menu_items(&[item.id, MenuItemId::new()])
        .await
        .unwrap();
    assert_eq!(items, vec![item]);

    let modifiers = store.get_modifiers(&[modifier.id]).await.unwrap();
    assert_eq!(modifiers, vec![modifier]);

    assert_eq!(store.get_vat_rate().await.unwrap(), None);
    store.set_vat_rate(Decimal::from(10)).await.unwrap();
    assert_eq!(store.get_vat_rate().await.unwrap(), Some(Decimal::from(10)));
}

#[tokio::test]
async fn table_status_and_listing() {
    let store = get_test_store().await;
    let second = seed_table(&store, 12).await;
    let first = seed_table(&store, 11).await;

    store
        .set_table_status(second, TableStatus::Occupied)
        .await
        .unwrap();

    let tables = store.list_tables().await.unwrap();
    assert_eq!(tables.len(), 2);
    assert_eq!(tables[0].id, first);
    assert_eq!(tables[1].status, TableStatus::Occupied);

    let missing = store
        .set_table_status(TableId::new(), TableStatus::Available)
        .await;
    assert!(matches!(missing, Err(StoreError::TableNotFound(_))));
}

#[tokio::test]
async fn query_orders_by_status() {
    let store = get_test_store().await;
    let user_id = UserId::new();

    let mut completed = order_on(seed_table(&store, 21).await, Some(user_id));
    store.insert_order(&completed, None).await.unwrap();
    completed.status = OrderStatus::Completed;
    completed.payment_status = PaymentStatus::Paid;
    store.update_order(&completed, None).await.unwrap();

    let pending = order_on(seed_table(&store, 22).await, None);
    store.insert_order(&pending, None).await.unwrap();

    let page = store
        .query_orders(OrderQuery::new().status(OrderStatus::Pending))
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].id, pending.id);
    assert_eq!(page.items[0].items.len(), 1);

    let all = store.query_orders(OrderQuery::new()).await.unwrap();
    assert_eq!(all.total, 2);
    assert_eq!(store.count_completed_orders(user_id).await.unwrap(), 1);
}
