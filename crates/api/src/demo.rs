//! Demo catalog for local runs against the in-memory store.

use chrono::{Duration, Utc};
use common::{CouponId, Decimal, MenuItemId, ModifierId, Money, TableId};
use store::{
    CouponRecord, CouponTarget, DiscountType, InMemoryStore, MenuItemRecord, ModifierRecord,
    TableRecord, TableStatus,
};

const MENU: [(&str, i64); 5] = [
    ("Beef pho", 55_000),
    ("Broken rice with pork chop", 50_000),
    ("Spring rolls", 35_000),
    ("Iced milk coffee", 25_000),
    ("Lime juice", 20_000),
];

const TABLES: i32 = 6;

/// Seeds tables, a small menu and two coupons.
pub async fn seed(store: &InMemoryStore) {
    for number in 1..=TABLES {
        store
            .insert_table(TableRecord {
                id: TableId::new(),
                number,
                status: TableStatus::Available,
                capacity: if number % 2 == 0 { 4 } else { 2 },
            })
            .await;
    }

    for (index, (name, price)) in MENU.into_iter().enumerate() {
        let id = MenuItemId::new();
        store
            .insert_menu_item(MenuItemRecord {
                id,
                name: name.to_string(),
                price: Money::from_minor(price),
                is_available: true,
            })
            .await;

        if index == 0 {
            store
                .insert_modifier(ModifierRecord {
                    id: ModifierId::new(),
                    menu_item_id: id,
                    name: "Extra beef".to_string(),
                    price_adjustment: Money::from_minor(15_000),
                })
                .await;
        }
    }

    let now = Utc::now();
    store
        .insert_coupon(CouponRecord {
            id: CouponId::new(),
            code: "SAVE10".to_string(),
            discount_type: DiscountType::Percent,
            discount_value: Decimal::from(10),
            max_discount_value: Some(Money::from_minor(50_000)),
            min_order_value: Money::from_minor(100_000),
            usage_limit: Some(100),
            used_count: 0,
            limit_per_user: None,
            target_type: CouponTarget::Any,
            start_date: now,
            end_date: now + Duration::days(90),
            is_active: true,
        })
        .await;
    store
        .insert_coupon(CouponRecord {
            id: CouponId::new(),
            code: "WELCOME".to_string(),
            discount_type: DiscountType::Fixed,
            discount_value: Decimal::from(20_000),
            max_discount_value: None,
            min_order_value: Money::zero(),
            usage_limit: None,
            used_count: 0,
            limit_per_user: Some(1),
            target_type: CouponTarget::NewUser,
            start_date: now,
            end_date: now + Duration::days(365),
            is_active: true,
        })
        .await;

    tracing::info!(
        tables = TABLES,
        menu_items = MENU.len(),
        "Seeded demo catalog"
    );
}
