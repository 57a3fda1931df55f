//! Table occupancy derived from order status.
//!
//! Table status is written only here. The write is best-effort: it happens
//! after the order commit, and a failure is logged and counted but never
//! rolled back or surfaced to the caller, so a table can drift from its
//! order until the next transition.

use std::sync::Arc;
use std::time::Duration;

use common::TableId;
use store::{OrderStatus, OrderStore, TableStatus};

use crate::notify::{Broadcaster, Channel, Notification};

/// Table status implied by the status of the order occupying it.
pub fn derive_status(order_status: OrderStatus) -> TableStatus {
    match order_status {
        OrderStatus::Pending | OrderStatus::Processing => TableStatus::Occupied,
        OrderStatus::Completed | OrderStatus::Cancelled => TableStatus::Available,
    }
}

pub struct TableSynchronizer<S, B> {
    store: Arc<S>,
    broadcaster: Arc<B>,
    timeout: Duration,
}

impl<S: OrderStore, B: Broadcaster> TableSynchronizer<S, B> {
    pub fn new(store: Arc<S>, broadcaster: Arc<B>, timeout: Duration) -> Self {
        Self {
            store,
            broadcaster,
            timeout,
        }
    }

    /// Writes the derived status for `table_id`.
    ///
    /// Returns the applied status, or `None` if the write failed.
    #[tracing::instrument(skip(self))]
    pub async fn sync(&self, table_id: TableId, order_status: OrderStatus) -> Option<TableStatus> {
        let status = derive_status(order_status);

        let result =
            tokio::time::timeout(self.timeout, self.store.set_table_status(table_id, status))
                .await;

        let failure = match result {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(_) => Some(format!("timed out after {:?}", self.timeout)),
        };

        if let Some(error) = failure {
            tracing::warn!(
                %table_id,
                %order_status,
                target_status = %status,
                %error,
                "Table status drift: failed to update table after order commit"
            );
            metrics::counter!("table_sync_failures_total").increment(1);
            return None;
        }

        tracing::debug!(%table_id, %status, "Table status synchronized");
        self.broadcaster.publish(
            Channel::Waiter,
            &Notification::TableStatusUpdate { table_id, status },
        );
        Some(status)
    }
}
