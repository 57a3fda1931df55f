use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use common::{CouponId, MenuItemId, ModifierId, OrderId, TableId, UserId};
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use crate::model::{
    CouponRecord, CouponUsageChange, CouponUsageRecord, MenuItemRecord, ModifierRecord,
    OrderRecord, OrderStatus, TableRecord, TableStatus, UsageChangeKind,
};
use crate::store::{OrderStore, validate_order_for_write};
use crate::{OrderQuery, Page, Result, StoreError, Version};

#[derive(Default)]
struct State {
    menu_items: HashMap<MenuItemId, MenuItemRecord>,
    modifiers: HashMap<ModifierId, ModifierRecord>,
    tables: HashMap<TableId, TableRecord>,
    orders: HashMap<OrderId, OrderRecord>,
    coupons: HashMap<CouponId, CouponRecord>,
    coupon_usages: Vec<CouponUsageRecord>,
    vat_rate: Option<Decimal>,
}

impl State {
    fn apply_coupon_change(&mut self, change: &CouponUsageChange) -> Result<()> {
        let coupon = self.coupons.get_mut(&change.coupon_id).ok_or_else(|| {
            StoreError::InvalidData(format!("unknown coupon {}", change.coupon_id))
        })?;

        match change.kind {
            UsageChangeKind::Redeem => {
                if coupon
                    .usage_limit
                    .is_some_and(|limit| coupon.used_count >= limit)
                {
                    return Err(StoreError::CouponExhausted {
                        coupon_id: change.coupon_id,
                    });
                }
                coupon.used_count += 1;
                if let Some(user_id) = change.user_id {
                    self.coupon_usages.push(CouponUsageRecord {
                        coupon_id: change.coupon_id,
                        user_id,
                        order_id: change.order_id,
                    });
                }
            }
            UsageChangeKind::Release => {
                coupon.used_count = coupon.used_count.saturating_sub(1);
                self.coupon_usages.retain(|usage| {
                    !(usage.coupon_id == change.coupon_id && usage.order_id == change.order_id)
                });
            }
        }
        Ok(())
    }
}

/// In-memory store implementation for tests and local runs.
///
/// Holds every table behind a single lock so that order writes and their
/// coupon bookkeeping are applied atomically, mirroring the transactional
/// PostgreSQL implementation.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
    fail_table_updates: Arc<AtomicBool>,
    pending_conflicts: Arc<AtomicU32>,
    latency: Arc<RwLock<Option<Duration>>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_menu_item(&self, item: MenuItemRecord) {
        self.state.write().await.menu_items.insert(item.id, item);
    }

    pub async fn insert_modifier(&self, modifier: ModifierRecord) {
        self.state
            .write()
            .await
            .modifiers
            .insert(modifier.id, modifier);
    }

    pub async fn insert_table(&self, table: TableRecord) {
        self.state.write().await.tables.insert(table.id, table);
    }

    pub async fn insert_coupon(&self, coupon: CouponRecord) {
        self.state.write().await.coupons.insert(coupon.id, coupon);
    }

    pub async fn set_vat_rate(&self, rate: Option<Decimal>) {
        self.state.write().await.vat_rate = rate;
    }

    /// Returns a coupon by id, for inspecting counters.
    pub async fn coupon(&self, coupon_id: CouponId) -> Option<CouponRecord> {
        self.state.read().await.coupons.get(&coupon_id).cloned()
    }

    /// Returns every recorded coupon usage.
    pub async fn coupon_usages(&self) -> Vec<CouponUsageRecord> {
        self.state.read().await.coupon_usages.clone()
    }

    /// Returns the total number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }

    /// Makes every subsequent `set_table_status` call fail.
    pub fn fail_table_updates(&self, fail: bool) {
        self.fail_table_updates.store(fail, Ordering::SeqCst);
    }

    /// Makes the next `count` calls to `update_order` fail with a
    /// concurrency conflict.
    pub fn inject_conflicts(&self, count: u32) {
        self.pending_conflicts.store(count, Ordering::SeqCst);
    }

    /// Delays every store call by `latency`.
    pub async fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.write().await = latency;
    }

    async fn simulate_latency(&self) {
        let latency = *self.latency.read().await;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn take_injected_conflict(&self) -> bool {
        self.pending_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn get_menu_items(&self, ids: &[MenuItemId]) -> Result<Vec<MenuItemRecord>> {
        self.simulate_latency().await;
        let state = self.state.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.menu_items.get(id).cloned())
            .collect())
    }

    async fn get_modifiers(&self, ids: &[ModifierId]) -> Result<Vec<ModifierRecord>> {
        self.simulate_latency().await;
        let state = self.state.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.modifiers.get(id).cloned())
            .collect())
    }

    async fn get_vat_rate(&self) -> Result<Option<Decimal>> {
        self.simulate_latency().await;
        Ok(self.state.read().await.vat_rate)
    }

    async fn get_table(&self, table_id: TableId) -> Result<Option<TableRecord>> {
        self.simulate_latency().await;
        Ok(self.state.read().await.tables.get(&table_id).cloned())
    }

    async fn list_tables(&self) -> Result<Vec<TableRecord>> {
        self.simulate_latency().await;
        let state = self.state.read().await;
        let mut tables: Vec<_> = state.tables.values().cloned().collect();
        tables.sort_by_key(|t| t.number);
        Ok(tables)
    }

    async fn set_table_status(&self, table_id: TableId, status: TableStatus) -> Result<()> {
        self.simulate_latency().await;
        if self.fail_table_updates.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("table updates disabled".to_string()));
        }

        let mut state = self.state.write().await;
        let table = state
            .tables
            .get_mut(&table_id)
            .ok_or(StoreError::TableNotFound(table_id))?;
        table.status = status;
        Ok(())
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<OrderRecord>> {
        self.simulate_latency().await;
        Ok(self.state.read().await.orders.get(&order_id).cloned())
    }

    async fn find_active_order_for_table(
        &self,
        table_id: TableId,
    ) -> Result<Option<OrderRecord>> {
        self.simulate_latency().await;
        let state = self.state.read().await;
        Ok(state
            .orders
            .values()
            .filter(|o| o.table_id == table_id && o.status.is_active())
            .max_by_key(|o| o.created_at)
            .cloned())
    }

    async fn query_orders(&self, query: OrderQuery) -> Result<Page<OrderRecord>> {
        self.simulate_latency().await;
        let state = self.state.read().await;
        let mut orders: Vec<_> = state
            .orders
            .values()
            .filter(|o| {
                if let Some(status) = query.status
                    && o.status != status
                {
                    return false;
                }
                if let Some(served) = query.is_served
                    && o.is_served != served
                {
                    return false;
                }
                if let Some(table_id) = query.table_id
                    && o.table_id != table_id
                {
                    return false;
                }
                true
            })
            .cloned()
            .collect();

        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = orders.len() as u64;
        let items = orders
            .into_iter()
            .skip(query.offset())
            .take(query.limit())
            .collect();

        Ok(Page {
            items,
            total,
            page: query.page.max(1),
            per_page: query.limit() as u32,
        })
    }

    async fn insert_order(
        &self,
        order: &OrderRecord,
        coupon: Option<&CouponUsageChange>,
    ) -> Result<()> {
        validate_order_for_write(order)?;
        self.simulate_latency().await;

        let mut state = self.state.write().await;

        // Unique index simulation: one active order per table
        let table_busy = state
            .orders
            .values()
            .any(|o| o.table_id == order.table_id && o.status.is_active());
        if order.status.is_active() && table_busy {
            return Err(StoreError::ActiveOrderExists {
                table_id: order.table_id,
            });
        }
        if state.orders.contains_key(&order.id) {
            return Err(StoreError::InvalidData(format!(
                "order {} already exists",
                order.id
            )));
        }

        if let Some(change) = coupon {
            state.apply_coupon_change(change)?;
        }

        let mut stored = order.clone();
        stored.version = Version::first();
        state.orders.insert(stored.id, stored);
        Ok(())
    }

    async fn update_order(
        &self,
        order: &OrderRecord,
        coupon: Option<&CouponUsageChange>,
    ) -> Result<Version> {
        validate_order_for_write(order)?;
        self.simulate_latency().await;

        let mut state = self.state.write().await;
        let current = state
            .orders
            .get(&order.id)
            .map(|o| o.version)
            .ok_or(StoreError::OrderNotFound(order.id))?;

        if current != order.version || self.take_injected_conflict() {
            return Err(StoreError::ConcurrencyConflict {
                order_id: order.id,
                expected: order.version,
                actual: current,
            });
        }

        if let Some(change) = coupon {
            state.apply_coupon_change(change)?;
        }

        let next = current.next();
        let mut stored = order.clone();
        stored.version = next;
        state.orders.insert(stored.id, stored);
        Ok(next)
    }

    async fn count_completed_orders(&self, user_id: UserId) -> Result<u64> {
        self.simulate_latency().await;
        let state = self.state.read().await;
        Ok(state
            .orders
            .values()
            .filter(|o| o.customer_id == Some(user_id) && o.status == OrderStatus::Completed)
            .count() as u64)
    }

    async fn get_coupon_by_code(&self, code: &str) -> Result<Option<CouponRecord>> {
        self.simulate_latency().await;
        let state = self.state.read().await;
        Ok(state.coupons.values().find(|c| c.code == code).cloned())
    }

    async fn count_coupon_usages(&self, coupon_id: CouponId, user_id: UserId) -> Result<u64> {
        self.simulate_latency().await;
        let state = self.state.read().await;
        Ok(state
            .coupon_usages
            .iter()
            .filter(|u| u.coupon_id == coupon_id && u.user_id == user_id)
            .count() as u64)
    }
}
