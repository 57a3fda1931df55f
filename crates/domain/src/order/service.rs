//! Order service: the entry point for every order mutation.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use common::{MenuItemId, ModifierId, Money, OrderId, OrderItemId, UserId};
use store::{
    CouponRecord, CouponUsageChange, ItemModifierSnapshot, ItemStatus, OrderItemRecord, OrderQuery,
    OrderRecord, OrderStatus, OrderStore, OrderStoreExt, Page, PaymentStatus, StoreError,
    TableRecord, Version,
};

use crate::error::DomainError;
use crate::notify::{Broadcaster, Channel, KitchenLine, Notification};
use crate::pricing::{self, PriceLine, VatRate};
use crate::table::TableSynchronizer;
use crate::voucher::{VoucherValidator, VoucherVerdict, discount_for};

use super::{
    AppendItems, Checkout, CreateOrder, ItemLifecycle, LineItem, OrderError, OrderLifecycle,
    RejectItems, SetServed, UpdateItemStatus, UpdateOrderStatus,
};

/// Largest quantity accepted on a single line.
pub const MAX_LINE_QUANTITY: u32 = 999;

/// Runtime knobs for [`OrderService`].
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    /// Upper bound on every store round trip.
    pub store_timeout: Duration,

    /// Retries after an optimistic-concurrency conflict.
    pub max_conflict_retries: u32,

    /// VAT used when the store has no usable rate.
    pub default_vat_rate: VatRate,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            store_timeout: Duration::from_secs(5),
            max_conflict_retries: 3,
            default_vat_rate: VatRate::default(),
        }
    }
}

impl ServiceSettings {
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }
}

/// Result of a create request.
#[derive(Debug, Clone)]
pub enum OrderPlacement {
    /// A new order was opened on the table.
    Created(OrderRecord),
    /// The table already had an active order; the items were appended to it.
    Merged(OrderRecord),
}

impl OrderPlacement {
    pub fn order(&self) -> &OrderRecord {
        match self {
            OrderPlacement::Created(order) | OrderPlacement::Merged(order) => order,
        }
    }

    pub fn into_order(self) -> OrderRecord {
        match self {
            OrderPlacement::Created(order) | OrderPlacement::Merged(order) => order,
        }
    }

    pub fn is_merged(&self) -> bool {
        matches!(self, OrderPlacement::Merged(_))
    }
}

/// Result of rejecting items.
#[derive(Debug, Clone)]
pub struct RejectionOutcome {
    pub order: OrderRecord,
    /// Sum of the rejected lines' totals.
    pub refunded_amount: Money,
}

/// Service for managing orders.
///
/// Every mutation follows the same shape: read, apply the transition,
/// write back in one store unit of work (retrying on version conflicts),
/// then run table synchronization and publish notifications. Neither of
/// the last two steps can fail the request.
pub struct OrderService<S, B> {
    store: Arc<S>,
    broadcaster: Arc<B>,
    tables: TableSynchronizer<S, B>,
    settings: ServiceSettings,
}

impl<S: OrderStore, B: Broadcaster> OrderService<S, B> {
    /// Creates a new order service.
    pub fn new(store: S, broadcaster: B, settings: ServiceSettings) -> Self {
        Self::from_shared(Arc::new(store), Arc::new(broadcaster), settings)
    }

    /// Creates a service over handles shared with other components.
    pub fn from_shared(store: Arc<S>, broadcaster: Arc<B>, settings: ServiceSettings) -> Self {
        let tables =
            TableSynchronizer::new(store.clone(), broadcaster.clone(), settings.store_timeout);
        Self {
            store,
            broadcaster,
            tables,
            settings,
        }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn broadcaster(&self) -> &B {
        &self.broadcaster
    }

    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    /// Places an order, or merges the cart into the table's active order.
    #[tracing::instrument(skip(self, cmd), fields(table_id = %cmd.table_id, lines = cmd.items.len()))]
    pub async fn create_order(&self, cmd: CreateOrder) -> Result<OrderPlacement, DomainError> {
        validate_lines(&cmd.items)?;

        if let Some(active) = self
            .call(self.store.find_active_order_for_table(cmd.table_id))
            .await?
        {
            tracing::info!(order_id = %active.id, "Table has an active order, merging cart");
            return self.merge_into(active.id, &cmd.items).await;
        }

        self.call(self.store.require_table(cmd.table_id)).await?;

        let order_id = OrderId::new();
        let items = self.resolve_lines(order_id, &cmd.items).await?;
        let vat = self.vat_rate().await;
        let breakdown = pricing::compute(items.iter().map(PriceLine::from), vat);

        let coupon_code = cmd
            .coupon_code
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty());

        let (discount, coupon) = match coupon_code {
            Some(code) => {
                let verdict = self
                    .call(VoucherValidator::new(self.store.as_ref()).evaluate(
                        code,
                        breakdown.subtotal,
                        cmd.customer_id,
                    ))
                    .await?;
                let (discount, coupon) = verdict.into_result()?;
                (discount, Some(coupon))
            }
            None => (Money::zero(), None),
        };

        let now = Utc::now();
        let mut order = OrderRecord {
            id: order_id,
            table_id: cmd.table_id,
            customer_id: cmd.customer_id,
            status: OrderStatus::Pending,
            subtotal: Money::zero(),
            tax_amount: Money::zero(),
            discount_amount: Money::zero(),
            coupon_code: coupon.as_ref().map(|c| c.code.clone()),
            total_amount: Money::zero(),
            payment_status: PaymentStatus::Unpaid,
            payment_method: None,
            is_served: false,
            version: Version::first(),
            created_at: now,
            updated_at: now,
            items,
        };
        pricing::totals(pricing::order_lines(&order), vat, discount).apply_to(&mut order);

        let redemption = coupon
            .as_ref()
            .map(|c| CouponUsageChange::redeem(c.id, order_id, cmd.customer_id));

        match self
            .call(self.store.insert_order(&order, redemption.as_ref()))
            .await
        {
            Ok(()) => {}
            Err(DomainError::Store(StoreError::ActiveOrderExists { table_id })) => {
                // Another request opened an order on this table first
                let active = self
                    .call(self.store.find_active_order_for_table(table_id))
                    .await?
                    .ok_or(DomainError::Store(StoreError::ActiveOrderExists { table_id }))?;
                tracing::info!(order_id = %active.id, "Lost race for table, merging cart");
                return self.merge_into(active.id, &cmd.items).await;
            }
            Err(e) => return Err(e),
        }

        metrics::counter!("orders_created_total").increment(1);
        if redemption.is_some() {
            metrics::counter!("coupons_redeemed_total").increment(1);
        }
        tracing::info!(
            %order_id,
            subtotal = %order.subtotal,
            total = %order.total_amount,
            "Order created"
        );

        self.tables.sync(order.table_id, order.status).await;
        self.broadcaster.publish(
            Channel::Waiter,
            &Notification::NewOrder {
                order_id,
                table_id: order.table_id,
                total_amount: order.total_amount,
                item_count: order.items.len(),
                appended: false,
            },
        );

        Ok(OrderPlacement::Created(order))
    }

    /// Adds items to a pending or processing order.
    #[tracing::instrument(skip(self, cmd), fields(order_id = %cmd.order_id, lines = cmd.items.len()))]
    pub async fn append_items(&self, cmd: AppendItems) -> Result<OrderRecord, DomainError> {
        validate_lines(&cmd.items)?;
        self.append_to(cmd.order_id, &cmd.items).await
    }

    /// Rejects pending items and refunds them from the bill.
    #[tracing::instrument(skip(self, cmd), fields(order_id = %cmd.order_id))]
    pub async fn reject_items(&self, cmd: RejectItems) -> Result<RejectionOutcome, DomainError> {
        let mut seen = HashSet::new();
        let item_ids: Vec<OrderItemId> = cmd
            .item_ids
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect();
        if item_ids.is_empty() {
            return Err(DomainError::validation("At least one item id is required"));
        }

        let coupon = self.coupon_for(cmd.order_id).await?;
        let vat = self.vat_rate().await;

        let (order, refunded_amount) = self
            .mutate(cmd.order_id, |order, _| {
                if !order.status.can_modify_items() {
                    return Err(OrderError::NotModifiable {
                        status: order.status,
                    }
                    .into());
                }

                let mut refunded = Money::zero();
                for item_id in &item_ids {
                    let item = order
                        .item_mut(*item_id)
                        .ok_or(OrderError::ItemNotInOrder { item_id: *item_id })?;
                    if !item.status.can_reject() {
                        return Err(OrderError::ItemNotPending {
                            item_id: *item_id,
                            status: item.status,
                        }
                        .into());
                    }
                    item.status = ItemStatus::Rejected;
                    refunded += item.total_price;
                }

                recompute(order, vat, coupon.as_ref());
                Ok(refunded)
            })
            .await?;

        metrics::counter!("order_items_rejected_total").increment(item_ids.len() as u64);
        tracing::info!(
            order_id = %order.id,
            rejected = item_ids.len(),
            refunded = %refunded_amount,
            "Items rejected"
        );

        self.broadcaster.publish(
            Channel::Table(order.table_id),
            &Notification::ItemsRejected {
                order_id: order.id,
                item_ids,
                refunded_amount,
                total_amount: order.total_amount,
            },
        );
        self.broadcaster
            .publish(Channel::Waiter, &Notification::waiter_refresh(&order));

        Ok(RejectionOutcome {
            order,
            refunded_amount,
        })
    }

    /// Sends pending items to the kitchen and moves the order to processing.
    #[tracing::instrument(skip(self))]
    pub async fn approve_order(&self, order_id: OrderId) -> Result<OrderRecord, DomainError> {
        let (order, released) = self
            .mutate(order_id, |order, _| {
                if !order.status.can_approve() {
                    return Err(OrderError::InvalidStatusTransition {
                        from: order.status,
                        to: OrderStatus::Processing,
                    }
                    .into());
                }

                let mut released = Vec::new();
                for item in order
                    .items
                    .iter_mut()
                    .filter(|item| item.status == ItemStatus::Pending)
                {
                    item.status = ItemStatus::Preparing;
                    released.push(KitchenLine::from(&*item));
                }
                if released.is_empty() && order.status == OrderStatus::Processing {
                    return Err(OrderError::NothingToApprove.into());
                }

                order.status = OrderStatus::Processing;
                Ok(released)
            })
            .await?;

        tracing::info!(%order_id, released = released.len(), "Order approved");

        self.tables.sync(order.table_id, order.status).await;
        if !released.is_empty() {
            self.broadcaster.publish(
                Channel::Kitchen,
                &Notification::KitchenItemUpdate {
                    order_id,
                    table_id: order.table_id,
                    items: released,
                },
            );
        }
        self.publish_refresh(&order);

        Ok(order)
    }

    /// Applies a kitchen transition to one item.
    ///
    /// Emits a single `order_ready_notification` when this transition
    /// leaves no billable item pending or preparing.
    #[tracing::instrument(skip(self))]
    pub async fn update_item_status(
        &self,
        cmd: UpdateItemStatus,
    ) -> Result<OrderRecord, DomainError> {
        let (order, order_ready) = self
            .mutate(cmd.order_id, |order, _| {
                if order.status == OrderStatus::Cancelled {
                    return Err(OrderError::NotModifiable {
                        status: order.status,
                    }
                    .into());
                }

                let item = order
                    .item_mut(cmd.item_id)
                    .ok_or(OrderError::ItemNotInOrder {
                        item_id: cmd.item_id,
                    })?;
                if !item.status.can_transition_to(cmd.status) {
                    return Err(OrderError::InvalidItemTransition {
                        item_id: cmd.item_id,
                        from: item.status,
                        to: cmd.status,
                    }
                    .into());
                }
                item.status = cmd.status;

                Ok(cmd.status == ItemStatus::Ready
                    && order
                        .billable_items()
                        .all(|item| !item.status.is_in_kitchen_queue()))
            })
            .await?;

        tracing::info!(item_id = %cmd.item_id, status = %cmd.status, "Item status updated");

        let update = Notification::ItemStatusUpdate {
            order_id: order.id,
            item_id: cmd.item_id,
            status: cmd.status,
        };
        self.broadcaster.publish(Channel::Waiter, &update);
        self.broadcaster
            .publish(Channel::Table(order.table_id), &update);
        if let Some(item) = order.item(cmd.item_id) {
            self.broadcaster.publish(
                Channel::Kitchen,
                &Notification::KitchenItemUpdate {
                    order_id: order.id,
                    table_id: order.table_id,
                    items: vec![KitchenLine::from(item)],
                },
            );
        }
        if order_ready {
            tracing::info!(order_id = %order.id, "All items ready");
            self.broadcaster.publish(
                Channel::Waiter,
                &Notification::OrderReadyNotification {
                    order_id: order.id,
                    table_id: order.table_id,
                },
            );
        }

        Ok(order)
    }

    /// Explicit status change requested by staff.
    ///
    /// `processing` runs the approval flow. Cancelling refunds an applied
    /// coupon in the same unit of work as the status change.
    #[tracing::instrument(skip(self))]
    pub async fn update_status(&self, cmd: UpdateOrderStatus) -> Result<OrderRecord, DomainError> {
        if cmd.status == OrderStatus::Processing {
            return self.approve_order(cmd.order_id).await;
        }

        let coupon = match cmd.status {
            OrderStatus::Cancelled => self.coupon_for(cmd.order_id).await?,
            _ => None,
        };

        let (order, released) = self
            .mutate(cmd.order_id, |order, change| {
                if !order.status.can_transition_to(cmd.status) {
                    return Err(OrderError::InvalidStatusTransition {
                        from: order.status,
                        to: cmd.status,
                    }
                    .into());
                }
                order.status = cmd.status;

                if let Some(coupon) = &coupon {
                    *change = Some(CouponUsageChange::release(
                        coupon.id,
                        order.id,
                        order.customer_id,
                    ));
                    return Ok(true);
                }
                Ok(false)
            })
            .await?;

        if released {
            metrics::counter!("coupons_released_total").increment(1);
        }
        tracing::info!(order_id = %order.id, status = %order.status, "Order status updated");

        self.tables.sync(order.table_id, order.status).await;
        self.publish_refresh(&order);

        Ok(order)
    }

    /// Sets the served flag. Marking served requires every billable item
    /// to be ready or served.
    #[tracing::instrument(skip(self))]
    pub async fn set_served(&self, cmd: SetServed) -> Result<OrderRecord, DomainError> {
        let (order, ()) = self
            .mutate(cmd.order_id, |order, _| {
                if cmd.is_served {
                    let remaining = order
                        .billable_items()
                        .filter(|item| !item.status.is_ready_for_service())
                        .count();
                    if remaining > 0 {
                        return Err(OrderError::NotAllItemsReady { remaining }.into());
                    }
                }
                order.is_served = cmd.is_served;
                Ok(())
            })
            .await?;

        self.broadcaster
            .publish(Channel::Waiter, &Notification::waiter_refresh(&order));

        Ok(order)
    }

    /// Takes payment, completes the order and releases the table.
    ///
    /// Item readiness is not checked here.
    #[tracing::instrument(skip(self))]
    pub async fn checkout(&self, cmd: Checkout) -> Result<OrderRecord, DomainError> {
        let payment_method = cmd
            .payment_method
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty());

        let (order, ()) = self
            .mutate(cmd.order_id, |order, _| {
                if !order.status.can_checkout() {
                    return Err(OrderError::AlreadyClosed {
                        status: order.status,
                    }
                    .into());
                }
                order.status = OrderStatus::Completed;
                order.payment_status = PaymentStatus::Paid;
                order.payment_method = payment_method.clone();
                Ok(())
            })
            .await?;

        metrics::counter!("order_checkout_total").increment(1);
        tracing::info!(order_id = %order.id, total = %order.total_amount, "Order paid");

        self.tables.sync(order.table_id, order.status).await;

        let paid = Notification::OrderPaid {
            order_id: order.id,
            table_id: order.table_id,
            total_amount: order.total_amount,
            payment_method: order.payment_method.clone(),
        };
        self.broadcaster.publish(Channel::Waiter, &paid);
        self.broadcaster.publish(Channel::Kitchen, &paid);
        self.broadcaster.publish(
            Channel::Table(order.table_id),
            &Notification::PaymentSuccess {
                order_id: order.id,
                total_amount: order.total_amount,
            },
        );

        Ok(order)
    }

    /// Loads an order with its items.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, order_id: OrderId) -> Result<OrderRecord, DomainError> {
        self.call(self.store.require_order(order_id)).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_orders(&self, query: OrderQuery) -> Result<Page<OrderRecord>, DomainError> {
        self.call(self.store.query_orders(query)).await
    }

    /// Read-only view of the tables.
    pub async fn list_tables(&self) -> Result<Vec<TableRecord>, DomainError> {
        self.call(self.store.list_tables()).await
    }

    /// Evaluates a coupon without recording anything.
    #[tracing::instrument(skip(self))]
    pub async fn preview_voucher(
        &self,
        code: &str,
        cart_total: Money,
        user_id: Option<UserId>,
    ) -> Result<VoucherVerdict, DomainError> {
        if cart_total.is_negative() {
            return Err(DomainError::validation("Cart total cannot be negative"));
        }
        self.call(VoucherValidator::new(self.store.as_ref()).evaluate(
            code.trim(),
            cart_total,
            user_id,
        ))
        .await
    }

    async fn merge_into(
        &self,
        order_id: OrderId,
        lines: &[LineItem],
    ) -> Result<OrderPlacement, DomainError> {
        let order = self.append_to(order_id, lines).await?;
        metrics::counter!("orders_merged_total").increment(1);
        Ok(OrderPlacement::Merged(order))
    }

    async fn append_to(
        &self,
        order_id: OrderId,
        lines: &[LineItem],
    ) -> Result<OrderRecord, DomainError> {
        let coupon = self.coupon_for(order_id).await?;
        let items = self.resolve_lines(order_id, lines).await?;
        let vat = self.vat_rate().await;

        let (order, ()) = self
            .mutate(order_id, |order, _| {
                if !order.status.can_modify_items() {
                    return Err(OrderError::NotModifiable {
                        status: order.status,
                    }
                    .into());
                }
                order.items.extend(items.iter().cloned());
                recompute(order, vat, coupon.as_ref());
                Ok(())
            })
            .await?;

        tracing::info!(%order_id, appended = items.len(), total = %order.total_amount, "Items appended");

        self.broadcaster.publish(
            Channel::Waiter,
            &Notification::NewOrder {
                order_id,
                table_id: order.table_id,
                total_amount: order.total_amount,
                item_count: items.len(),
                appended: true,
            },
        );
        self.broadcaster
            .publish(Channel::Table(order.table_id), &Notification::table_refresh(&order));

        Ok(order)
    }

    /// Read-modify-write of one order with optimistic concurrency.
    ///
    /// `apply` runs against a fresh read on every attempt and may stage a
    /// coupon change to commit alongside the order.
    async fn mutate<T, F>(
        &self,
        order_id: OrderId,
        mut apply: F,
    ) -> Result<(OrderRecord, T), DomainError>
    where
        T: Send,
        F: FnMut(&mut OrderRecord, &mut Option<CouponUsageChange>) -> Result<T, DomainError>
            + Send,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut order = self.call(self.store.require_order(order_id)).await?;
            let mut coupon_change = None;
            let value = apply(&mut order, &mut coupon_change)?;
            order.updated_at = Utc::now();

            match self
                .call(self.store.update_order(&order, coupon_change.as_ref()))
                .await
            {
                Ok(version) => {
                    order.version = version;
                    return Ok((order, value));
                }
                Err(e) if e.is_conflict() && attempt <= self.settings.max_conflict_retries => {
                    tracing::debug!(%order_id, attempt, "Concurrent update detected, retrying");
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// The coupon currently applied to an order, if any.
    async fn coupon_for(&self, order_id: OrderId) -> Result<Option<CouponRecord>, DomainError> {
        let order = self.call(self.store.require_order(order_id)).await?;
        match order.coupon_code {
            Some(code) => self.call(self.store.get_coupon_by_code(&code)).await,
            None => Ok(None),
        }
    }

    /// Snapshots catalog prices and modifiers into new order items.
    async fn resolve_lines(
        &self,
        order_id: OrderId,
        lines: &[LineItem],
    ) -> Result<Vec<OrderItemRecord>, DomainError> {
        let menu_ids: Vec<MenuItemId> = unique(lines.iter().map(|l| l.menu_item_id));
        let modifier_ids: Vec<ModifierId> =
            unique(lines.iter().flat_map(|l| l.modifiers.iter().copied()));

        let menu: HashMap<_, _> = self
            .call(self.store.get_menu_items(&menu_ids))
            .await?
            .into_iter()
            .map(|item| (item.id, item))
            .collect();
        let modifiers: HashMap<_, _> = if modifier_ids.is_empty() {
            HashMap::new()
        } else {
            self.call(self.store.get_modifiers(&modifier_ids))
                .await?
                .into_iter()
                .map(|modifier| (modifier.id, modifier))
                .collect()
        };

        let now = Utc::now();
        lines
            .iter()
            .map(|line| {
                let item = menu.get(&line.menu_item_id).ok_or_else(|| {
                    DomainError::validation(format!(
                        "Menu item {} does not exist",
                        line.menu_item_id
                    ))
                })?;
                if !item.is_available {
                    return Err(DomainError::validation(format!(
                        "Menu item '{}' is currently unavailable",
                        item.name
                    )));
                }

                let snapshots = line
                    .modifiers
                    .iter()
                    .map(|modifier_id| {
                        modifiers
                            .get(modifier_id)
                            .filter(|m| m.menu_item_id == item.id)
                            .map(|m| ItemModifierSnapshot {
                                modifier_id: m.id,
                                name: m.name.clone(),
                                price: m.price_adjustment,
                            })
                            .ok_or_else(|| {
                                DomainError::validation(format!(
                                    "Modifier {modifier_id} is not available for '{}'",
                                    item.name
                                ))
                            })
                    })
                    .collect::<Result<Vec<_>, _>>()?;

                let unit_price =
                    pricing::effective_unit_price(item.price, snapshots.iter().map(|m| m.price));

                Ok(OrderItemRecord {
                    id: OrderItemId::new(),
                    order_id,
                    menu_item_id: item.id,
                    name: item.name.clone(),
                    quantity: line.quantity,
                    unit_price,
                    total_price: pricing::line_total(unit_price, line.quantity),
                    notes: line.notes.clone(),
                    status: ItemStatus::Pending,
                    modifiers: snapshots,
                    created_at: now,
                })
            })
            .collect()
    }

    async fn vat_rate(&self) -> VatRate {
        match self.call(self.store.get_vat_rate()).await {
            Ok(configured) => VatRate::resolve(configured).unwrap_or_else(|| {
                tracing::warn!(
                    fallback = %self.settings.default_vat_rate,
                    "VAT rate not configured, using fallback"
                );
                self.settings.default_vat_rate
            }),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    fallback = %self.settings.default_vat_rate,
                    "Failed to read VAT rate, using fallback"
                );
                self.settings.default_vat_rate
            }
        }
    }

    /// Bounds a store call by the configured timeout.
    async fn call<T>(
        &self,
        fut: impl Future<Output = store::Result<T>>,
    ) -> Result<T, DomainError> {
        match tokio::time::timeout(self.settings.store_timeout, fut).await {
            Ok(result) => result.map_err(DomainError::from),
            Err(_) => {
                tracing::error!(timeout = ?self.settings.store_timeout, "Store call timed out");
                Err(DomainError::StoreTimeout(self.settings.store_timeout))
            }
        }
    }

    fn publish_refresh(&self, order: &OrderRecord) {
        self.broadcaster
            .publish(Channel::Waiter, &Notification::waiter_refresh(order));
        self.broadcaster
            .publish(Channel::Table(order.table_id), &Notification::table_refresh(order));
    }
}

/// Recomputes totals over the full item set.
///
/// An applied coupon's discount is recalculated against the new subtotal
/// without re-checking eligibility.
fn recompute(order: &mut OrderRecord, vat: VatRate, coupon: Option<&CouponRecord>) {
    let breakdown = pricing::compute(pricing::order_lines(order), vat);
    let discount = match coupon {
        Some(coupon) => discount_for(coupon, breakdown.subtotal),
        None => order.discount_amount,
    };
    let totals = pricing::totals(pricing::order_lines(order), vat, discount);
    totals.apply_to(order);
}

fn validate_lines(lines: &[LineItem]) -> Result<(), DomainError> {
    if lines.is_empty() {
        return Err(DomainError::validation("At least one item is required"));
    }
    for line in lines {
        if line.quantity == 0 || line.quantity > MAX_LINE_QUANTITY {
            return Err(DomainError::validation(format!(
                "Quantity for menu item {} must be between 1 and {MAX_LINE_QUANTITY}",
                line.menu_item_id
            )));
        }
        let mut seen = HashSet::new();
        if !line.modifiers.iter().all(|m| seen.insert(*m)) {
            return Err(DomainError::validation(format!(
                "Duplicate modifier on menu item {}",
                line.menu_item_id
            )));
        }
    }
    Ok(())
}

fn unique<T: Copy + Eq + std::hash::Hash>(ids: impl Iterator<Item = T>) -> Vec<T> {
    let mut seen = HashSet::new();
    ids.filter(|id| seen.insert(*id)).collect()
}
