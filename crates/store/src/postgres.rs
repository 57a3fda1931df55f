use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use common::{
    CouponId, MenuItemId, ModifierId, Money, OrderId, OrderItemId, TableId, UserId,
};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::model::{
    CouponRecord, CouponUsageChange, ItemModifierSnapshot, MenuItemRecord, ModifierRecord,
    OrderItemRecord, OrderRecord, TableRecord, TableStatus, UnknownVariant, UsageChangeKind,
};
use crate::store::{OrderStore, validate_order_for_write};
use crate::{OrderQuery, Page, Result, StoreError, Version};

const ORDER_COLUMNS: &str = "id, table_id, customer_id, status, subtotal, tax_amount, \
     discount_amount, coupon_code, total_amount, payment_status, payment_method, is_served, \
     version, created_at, updated_at";

const VAT_RATE_KEY: &str = "vat_rate";

/// PostgreSQL-backed store implementation.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects a pool to `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    pub async fn upsert_menu_item(&self, item: &MenuItemRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO menu_items (id, name, price, is_available)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name, price = EXCLUDED.price, is_available = EXCLUDED.is_available
            "#,
        )
        .bind(item.id.as_uuid())
        .bind(&item.name)
        .bind(item.price.minor())
        .bind(item.is_available)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn upsert_modifier(&self, modifier: &ModifierRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO modifiers (id, menu_item_id, name, price_adjustment)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name, price_adjustment = EXCLUDED.price_adjustment
            "#,
        )
        .bind(modifier.id.as_uuid())
        .bind(modifier.menu_item_id.as_uuid())
        .bind(&modifier.name)
        .bind(modifier.price_adjustment.minor())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn upsert_table(&self, table: &TableRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO restaurant_tables (id, number, status, capacity)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
            SET number = EXCLUDED.number, status = EXCLUDED.status, capacity = EXCLUDED.capacity
            "#,
        )
        .bind(table.id.as_uuid())
        .bind(table.number)
        .bind(table.status.as_str())
        .bind(table.capacity)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn upsert_coupon(&self, coupon: &CouponRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO coupons (id, code, discount_type, discount_value, max_discount_value,
                                 min_order_value, usage_limit, used_count, limit_per_user,
                                 target_type, start_date, end_date, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (id) DO UPDATE
            SET code = EXCLUDED.code,
                discount_type = EXCLUDED.discount_type,
                discount_value = EXCLUDED.discount_value,
                max_discount_value = EXCLUDED.max_discount_value,
                min_order_value = EXCLUDED.min_order_value,
                usage_limit = EXCLUDED.usage_limit,
                used_count = EXCLUDED.used_count,
                limit_per_user = EXCLUDED.limit_per_user,
                target_type = EXCLUDED.target_type,
                start_date = EXCLUDED.start_date,
                end_date = EXCLUDED.end_date,
                is_active = EXCLUDED.is_active
            "#,
        )
        .bind(coupon.id.as_uuid())
        .bind(&coupon.code)
        .bind(coupon.discount_type.as_str())
        .bind(coupon.discount_value)
        .bind(coupon.max_discount_value.map(|m| m.minor()))
        .bind(coupon.min_order_value.minor())
        .bind(coupon.usage_limit.map(to_i32).transpose()?)
        .bind(to_i32(coupon.used_count)?)
        .bind(coupon.limit_per_user.map(to_i32).transpose()?)
        .bind(coupon.target_type.as_str())
        .bind(coupon.start_date)
        .bind(coupon.end_date)
        .bind(coupon.is_active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_vat_rate(&self, rate: Decimal) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO settings (key, value) VALUES ($1, $2)
            ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value
            "#,
        )
        .bind(VAT_RATE_KEY)
        .bind(rate.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    fn row_to_order(row: &PgRow) -> Result<OrderRecord> {
        Ok(OrderRecord {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            table_id: TableId::from_uuid(row.try_get::<Uuid, _>("table_id")?),
            customer_id: row
                .try_get::<Option<Uuid>, _>("customer_id")?
                .map(UserId::from_uuid),
            status: parse_text(row.try_get("status")?)?,
            subtotal: Money::from_minor(row.try_get("subtotal")?),
            tax_amount: Money::from_minor(row.try_get("tax_amount")?),
            discount_amount: Money::from_minor(row.try_get("discount_amount")?),
            coupon_code: row.try_get("coupon_code")?,
            total_amount: Money::from_minor(row.try_get("total_amount")?),
            payment_status: parse_text(row.try_get("payment_status")?)?,
            payment_method: row.try_get("payment_method")?,
            is_served: row.try_get("is_served")?,
            version: Version::new(row.try_get("version")?),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            items: Vec::new(),
        })
    }

    fn row_to_item(row: &PgRow) -> Result<OrderItemRecord> {
        let quantity: i32 = row.try_get("quantity")?;
        Ok(OrderItemRecord {
            id: OrderItemId::from_uuid(row.try_get::<Uuid, _>("id")?),
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            menu_item_id: MenuItemId::from_uuid(row.try_get::<Uuid, _>("menu_item_id")?),
            name: row.try_get("name")?,
            quantity: from_i32(quantity)?,
            unit_price: Money::from_minor(row.try_get("unit_price")?),
            total_price: Money::from_minor(row.try_get("total_price")?),
            notes: row.try_get("notes")?,
            status: parse_text(row.try_get("status")?)?,
            modifiers: Vec::new(),
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_table(row: &PgRow) -> Result<TableRecord> {
        Ok(TableRecord {
            id: TableId::from_uuid(row.try_get::<Uuid, _>("id")?),
            number: row.try_get("number")?,
            status: parse_text(row.try_get("status")?)?,
            capacity: row.try_get("capacity")?,
        })
    }

    fn row_to_coupon(row: &PgRow) -> Result<CouponRecord> {
        Ok(CouponRecord {
            id: CouponId::from_uuid(row.try_get::<Uuid, _>("id")?),
            code: row.try_get("code")?,
            discount_type: parse_text(row.try_get("discount_type")?)?,
            discount_value: row.try_get("discount_value")?,
            max_discount_value: row
                .try_get::<Option<i64>, _>("max_discount_value")?
                .map(Money::from_minor),
            min_order_value: Money::from_minor(row.try_get("min_order_value")?),
            usage_limit: row
                .try_get::<Option<i32>, _>("usage_limit")?
                .map(from_i32)
                .transpose()?,
            used_count: from_i32(row.try_get("used_count")?)?,
            limit_per_user: row
                .try_get::<Option<i32>, _>("limit_per_user")?
                .map(from_i32)
                .transpose()?,
            target_type: parse_text(row.try_get("target_type")?)?,
            start_date: row.try_get("start_date")?,
            end_date: row.try_get("end_date")?,
            is_active: row.try_get("is_active")?,
        })
    }

    /// Loads items and modifier snapshots for the given orders.
    async fn attach_items(&self, orders: &mut [OrderRecord]) -> Result<()> {
        if orders.is_empty() {
            return Ok(());
        }
        let order_ids: Vec<Uuid> = orders.iter().map(|o| o.id.as_uuid()).collect();

        let item_rows = sqlx::query(
            r#"
            SELECT id, order_id, menu_item_id, name, quantity, unit_price, total_price,
                   notes, status, created_at
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(&order_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut items = item_rows
            .iter()
            .map(Self::row_to_item)
            .collect::<Result<Vec<_>>>()?;

        let item_ids: Vec<Uuid> = items.iter().map(|i| i.id.as_uuid()).collect();
        let modifier_rows = sqlx::query(
            r#"
            SELECT order_item_id, modifier_id, name, price
            FROM order_item_modifiers
            WHERE order_item_id = ANY($1)
            "#,
        )
        .bind(&item_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut snapshots: HashMap<OrderItemId, Vec<ItemModifierSnapshot>> = HashMap::new();
        for row in &modifier_rows {
            let item_id = OrderItemId::from_uuid(row.try_get::<Uuid, _>("order_item_id")?);
            snapshots
                .entry(item_id)
                .or_default()
                .push(ItemModifierSnapshot {
                    modifier_id: ModifierId::from_uuid(row.try_get::<Uuid, _>("modifier_id")?),
                    name: row.try_get("name")?,
                    price: Money::from_minor(row.try_get("price")?),
                });
        }

        for item in &mut items {
            if let Some(modifiers) = snapshots.remove(&item.id) {
                item.modifiers = modifiers;
            }
        }

        let mut by_order: HashMap<OrderId, Vec<OrderItemRecord>> = HashMap::new();
        for item in items {
            by_order.entry(item.order_id).or_default().push(item);
        }
        for order in orders.iter_mut() {
            order.items = by_order.remove(&order.id).unwrap_or_default();
        }
        Ok(())
    }

    async fn write_items(tx: &mut Transaction<'_, Postgres>, order: &OrderRecord) -> Result<()> {
        for item in &order.items {
            sqlx::query(
                r#"
                INSERT INTO order_items (id, order_id, menu_item_id, name, quantity, unit_price,
                                         total_price, notes, status, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                ON CONFLICT (id) DO UPDATE
                SET quantity = EXCLUDED.quantity,
                    unit_price = EXCLUDED.unit_price,
                    total_price = EXCLUDED.total_price,
                    notes = EXCLUDED.notes,
                    status = EXCLUDED.status
                "#,
            )
            .bind(item.id.as_uuid())
            .bind(order.id.as_uuid())
            .bind(item.menu_item_id.as_uuid())
            .bind(&item.name)
            .bind(to_i32(item.quantity)?)
            .bind(item.unit_price.minor())
            .bind(item.total_price.minor())
            .bind(&item.notes)
            .bind(item.status.as_str())
            .bind(item.created_at)
            .execute(&mut **tx)
            .await?;

            for modifier in &item.modifiers {
                sqlx::query(
                    r#"
                    INSERT INTO order_item_modifiers (order_item_id, modifier_id, name, price)
                    VALUES ($1, $2, $3, $4)
                    ON CONFLICT DO NOTHING
                    "#,
                )
                .bind(item.id.as_uuid())
                .bind(modifier.modifier_id.as_uuid())
                .bind(&modifier.name)
                .bind(modifier.price.minor())
                .execute(&mut **tx)
                .await?;
            }
        }
        Ok(())
    }

    async fn apply_coupon_change(
        tx: &mut Transaction<'_, Postgres>,
        change: &CouponUsageChange,
    ) -> Result<()> {
        match change.kind {
            UsageChangeKind::Redeem => {
                let updated = sqlx::query(
                    r#"
                    UPDATE coupons SET used_count = used_count + 1
                    WHERE id = $1 AND (usage_limit IS NULL OR used_count < usage_limit)
                    "#,
                )
                .bind(change.coupon_id.as_uuid())
                .execute(&mut **tx)
                .await?;
                if updated.rows_affected() == 0 {
                    let exists = sqlx::query("SELECT 1 FROM coupons WHERE id = $1")
                        .bind(change.coupon_id.as_uuid())
                        .fetch_optional(&mut **tx)
                        .await?
                        .is_some();
                    return Err(if exists {
                        StoreError::CouponExhausted {
                            coupon_id: change.coupon_id,
                        }
                    } else {
                        StoreError::InvalidData(format!("unknown coupon {}", change.coupon_id))
                    });
                }
                if let Some(user_id) = change.user_id {
                    sqlx::query(
                        "INSERT INTO coupon_usages (coupon_id, user_id, order_id) VALUES ($1, $2, $3)",
                    )
                    .bind(change.coupon_id.as_uuid())
                    .bind(user_id.as_uuid())
                    .bind(change.order_id.as_uuid())
                    .execute(&mut **tx)
                    .await?;
                }
            }
            UsageChangeKind::Release => {
                sqlx::query(
                    "UPDATE coupons SET used_count = GREATEST(used_count - 1, 0) WHERE id = $1",
                )
                .bind(change.coupon_id.as_uuid())
                .execute(&mut **tx)
                .await?;
                sqlx::query("DELETE FROM coupon_usages WHERE coupon_id = $1 AND order_id = $2")
                    .bind(change.coupon_id.as_uuid())
                    .bind(change.order_id.as_uuid())
                    .execute(&mut **tx)
                    .await?;
            }
        }
        Ok(())
    }
}

fn parse_text<T>(value: String) -> Result<T>
where
    T: FromStr<Err = UnknownVariant>,
{
    value
        .parse()
        .map_err(|e: UnknownVariant| StoreError::InvalidData(e.to_string()))
}

fn to_i32(value: u32) -> Result<i32> {
    i32::try_from(value).map_err(|_| StoreError::InvalidData(format!("{value} out of range")))
}

fn from_i32(value: i32) -> Result<u32> {
    u32::try_from(value).map_err(|_| StoreError::InvalidData(format!("negative count {value}")))
}

#[async_trait]
impl OrderStore for PostgresStore {
    #[tracing::instrument(skip(self, ids), fields(count = ids.len()))]
    async fn get_menu_items(&self, ids: &[MenuItemId]) -> Result<Vec<MenuItemRecord>> {
        let ids: Vec<Uuid> = ids.iter().map(|id| id.as_uuid()).collect();
        let rows = sqlx::query(
            "SELECT id, name, price, is_available FROM menu_items WHERE id = ANY($1)",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<MenuItemRecord> {
                Ok(MenuItemRecord {
                    id: MenuItemId::from_uuid(row.try_get::<Uuid, _>("id")?),
                    name: row.try_get("name")?,
                    price: Money::from_minor(row.try_get("price")?),
                    is_available: row.try_get("is_available")?,
                })
            })
            .collect()
    }

    #[tracing::instrument(skip(self, ids), fields(count = ids.len()))]
    async fn get_modifiers(&self, ids: &[ModifierId]) -> Result<Vec<ModifierRecord>> {
        let ids: Vec<Uuid> = ids.iter().map(|id| id.as_uuid()).collect();
        let rows = sqlx::query(
            "SELECT id, menu_item_id, name, price_adjustment FROM modifiers WHERE id = ANY($1)",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<ModifierRecord> {
                Ok(ModifierRecord {
                    id: ModifierId::from_uuid(row.try_get::<Uuid, _>("id")?),
                    menu_item_id: MenuItemId::from_uuid(row.try_get::<Uuid, _>("menu_item_id")?),
                    name: row.try_get("name")?,
                    price_adjustment: Money::from_minor(row.try_get("price_adjustment")?),
                })
            })
            .collect()
    }

    async fn get_vat_rate(&self) -> Result<Option<Decimal>> {
        let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = $1")
            .bind(VAT_RATE_KEY)
            .fetch_optional(&self.pool)
            .await?;

        value
            .map(|v| {
                v.trim()
                    .parse::<Decimal>()
                    .map_err(|e| StoreError::InvalidData(format!("vat_rate {v:?}: {e}")))
            })
            .transpose()
    }

    async fn get_table(&self, table_id: TableId) -> Result<Option<TableRecord>> {
        let row = sqlx::query(
            "SELECT id, number, status, capacity FROM restaurant_tables WHERE id = $1",
        )
        .bind(table_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_table).transpose()
    }

    async fn list_tables(&self) -> Result<Vec<TableRecord>> {
        let rows =
            sqlx::query("SELECT id, number, status, capacity FROM restaurant_tables ORDER BY number")
                .fetch_all(&self.pool)
                .await?;

        rows.iter().map(Self::row_to_table).collect()
    }

    #[tracing::instrument(skip(self))]
    async fn set_table_status(&self, table_id: TableId, status: TableStatus) -> Result<()> {
        let result = sqlx::query("UPDATE restaurant_tables SET status = $2 WHERE id = $1")
            .bind(table_id.as_uuid())
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::TableNotFound(table_id));
        }
        Ok(())
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<OrderRecord>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(order_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut orders = vec![Self::row_to_order(&row)?];
        self.attach_items(&mut orders).await?;
        Ok(orders.pop())
    }

    async fn find_active_order_for_table(
        &self,
        table_id: TableId,
    ) -> Result<Option<OrderRecord>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE table_id = $1 AND status IN ('pending', 'processing') \
             ORDER BY created_at DESC LIMIT 1"
        );
        let row = sqlx::query(&sql)
            .bind(table_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut orders = vec![Self::row_to_order(&row)?];
        self.attach_items(&mut orders).await?;
        Ok(orders.pop())
    }

    #[tracing::instrument(skip(self))]
    async fn query_orders(&self, query: OrderQuery) -> Result<Page<OrderRecord>> {
        let mut filter = String::from(" WHERE 1=1");
        let mut param_count = 0;

        // Build dynamic filter
        if query.status.is_some() {
            param_count += 1;
            filter.push_str(&format!(" AND status = ${param_count}"));
        }
        if query.is_served.is_some() {
            param_count += 1;
            filter.push_str(&format!(" AND is_served = ${param_count}"));
        }
        if query.table_id.is_some() {
            param_count += 1;
            filter.push_str(&format!(" AND table_id = ${param_count}"));
        }

        let count_sql = format!("SELECT COUNT(*) FROM orders{filter}");
        let page_sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders{filter} ORDER BY created_at DESC LIMIT ${} OFFSET ${}",
            param_count + 1,
            param_count + 2
        );

        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        let mut page_query = sqlx::query(&page_sql);
        if let Some(status) = query.status {
            count_query = count_query.bind(status.as_str());
            page_query = page_query.bind(status.as_str());
        }
        if let Some(served) = query.is_served {
            count_query = count_query.bind(served);
            page_query = page_query.bind(served);
        }
        if let Some(table_id) = query.table_id {
            count_query = count_query.bind(table_id.as_uuid());
            page_query = page_query.bind(table_id.as_uuid());
        }

        let total = count_query.fetch_one(&self.pool).await?;
        let rows = page_query
            .bind(query.limit() as i64)
            .bind(query.offset() as i64)
            .fetch_all(&self.pool)
            .await?;

        let mut orders = rows
            .iter()
            .map(Self::row_to_order)
            .collect::<Result<Vec<_>>>()?;
        self.attach_items(&mut orders).await?;

        Ok(Page {
            items: orders,
            total: total.max(0) as u64,
            page: query.page.max(1),
            per_page: query.limit() as u32,
        })
    }

    #[tracing::instrument(skip(self, order, coupon), fields(order_id = %order.id, table_id = %order.table_id))]
    async fn insert_order(
        &self,
        order: &OrderRecord,
        coupon: Option<&CouponUsageChange>,
    ) -> Result<()> {
        validate_order_for_write(order)?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, table_id, customer_id, status, subtotal, tax_amount,
                                discount_amount, coupon_code, total_amount, payment_status,
                                payment_method, is_served, version, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.table_id.as_uuid())
        .bind(order.customer_id.map(|id| id.as_uuid()))
        .bind(order.status.as_str())
        .bind(order.subtotal.minor())
        .bind(order.tax_amount.minor())
        .bind(order.discount_amount.minor())
        .bind(&order.coupon_code)
        .bind(order.total_amount.minor())
        .bind(order.payment_status.as_str())
        .bind(&order.payment_method)
        .bind(order.is_served)
        .bind(Version::first().as_i64())
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            // The partial unique index guards one active order per table
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("unique_active_order_per_table")
            {
                return StoreError::ActiveOrderExists {
                    table_id: order.table_id,
                };
            }
            StoreError::Database(e)
        })?;

        Self::write_items(&mut tx, order).await?;
        if let Some(change) = coupon {
            Self::apply_coupon_change(&mut tx, change).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    #[tracing::instrument(skip(self, order, coupon), fields(order_id = %order.id, version = %order.version))]
    async fn update_order(
        &self,
        order: &OrderRecord,
        coupon: Option<&CouponUsageChange>,
    ) -> Result<Version> {
        validate_order_for_write(order)?;

        let next = order.version.next();
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE orders
            SET status = $3, subtotal = $4, tax_amount = $5, discount_amount = $6,
                coupon_code = $7, total_amount = $8, payment_status = $9,
                payment_method = $10, is_served = $11, updated_at = $12, version = $13
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.version.as_i64())
        .bind(order.status.as_str())
        .bind(order.subtotal.minor())
        .bind(order.tax_amount.minor())
        .bind(order.discount_amount.minor())
        .bind(&order.coupon_code)
        .bind(order.total_amount.minor())
        .bind(order.payment_status.as_str())
        .bind(&order.payment_method)
        .bind(order.is_served)
        .bind(order.updated_at)
        .bind(next.as_i64())
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            let actual: Option<i64> = sqlx::query_scalar("SELECT version FROM orders WHERE id = $1")
                .bind(order.id.as_uuid())
                .fetch_optional(&mut *tx)
                .await?;

            return Err(match actual {
                Some(actual) => StoreError::ConcurrencyConflict {
                    order_id: order.id,
                    expected: order.version,
                    actual: Version::new(actual),
                },
                None => StoreError::OrderNotFound(order.id),
            });
        }

        Self::write_items(&mut tx, order).await?;
        if let Some(change) = coupon {
            Self::apply_coupon_change(&mut tx, change).await?;
        }

        tx.commit().await?;
        Ok(next)
    }

    async fn count_completed_orders(&self, user_id: UserId) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM orders WHERE customer_id = $1 AND status = 'completed'",
        )
        .bind(user_id.as_uuid())
        .fetch_one(&self.pool)
        .await?;
        Ok(count.max(0) as u64)
    }

    async fn get_coupon_by_code(&self, code: &str) -> Result<Option<CouponRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, code, discount_type, discount_value, max_discount_value, min_order_value,
                   usage_limit, used_count, limit_per_user, target_type, start_date, end_date,
                   is_active
            FROM coupons
            WHERE code = $1
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_coupon).transpose()
    }

    async fn count_coupon_usages(&self, coupon_id: CouponId, user_id: UserId) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM coupon_usages WHERE coupon_id = $1 AND user_id = $2",
        )
        .bind(coupon_id.as_uuid())
        .bind(user_id.as_uuid())
        .fetch_one(&self.pool)
        .await?;
        Ok(count.max(0) as u64)
    }
}
