use common::TableId;
use serde::Serialize;

use crate::model::OrderStatus;

/// Default page size for order listings.
pub const DEFAULT_PER_PAGE: u32 = 20;

/// Largest page size a caller may request.
pub const MAX_PER_PAGE: u32 = 100;

/// Filters and pagination for listing orders.
///
/// Results are ordered newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderQuery {
    /// Filter by order status.
    pub status: Option<OrderStatus>,

    /// Filter by the served flag.
    pub is_served: Option<bool>,

    /// Filter by table.
    pub table_id: Option<TableId>,

    /// 1-based page number.
    pub page: u32,

    /// Page size, clamped to `1..=MAX_PER_PAGE`.
    pub per_page: u32,
}

impl Default for OrderQuery {
    fn default() -> Self {
        Self {
            status: None,
            is_served: None,
            table_id: None,
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl OrderQuery {
    /// Creates a query matching every order, first page.
    pub fn new() -> Self {
        Self::default()
    }

    /// Filters by status.
    pub fn status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Filters by the served flag.
    pub fn served(mut self, is_served: bool) -> Self {
        self.is_served = Some(is_served);
        self
    }

    /// Filters by table.
    pub fn table(mut self, table_id: TableId) -> Self {
        self.table_id = Some(table_id);
        self
    }

    /// Selects a page; page numbers below 1 are treated as 1.
    pub fn page(mut self, page: u32, per_page: u32) -> Self {
        self.page = page.max(1);
        self.per_page = per_page.clamp(1, MAX_PER_PAGE);
        self
    }

    /// Number of rows to skip.
    pub fn offset(&self) -> usize {
        (self.page.max(1) as usize - 1) * self.limit()
    }

    /// Number of rows to return.
    pub fn limit(&self) -> usize {
        self.per_page.clamp(1, MAX_PER_PAGE) as usize
    }
}

/// A page of results plus the unpaginated total.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
}

impl<T> Page<T> {
    /// Maps each item, keeping the pagination metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_first_page() {
        let query = OrderQuery::new();
        assert_eq!(query.offset(), 0);
        assert_eq!(query.limit(), DEFAULT_PER_PAGE as usize);
    }

    #[test]
    fn builder_sets_filters() {
        let table_id = TableId::new();
        let query = OrderQuery::new()
            .status(OrderStatus::Pending)
            .served(false)
            .table(table_id);

        assert_eq!(query.status, Some(OrderStatus::Pending));
        assert_eq!(query.is_served, Some(false));
        assert_eq!(query.table_id, Some(table_id));
    }

    #[test]
    fn page_is_clamped() {
        let query = OrderQuery::new().page(0, 500);
        assert_eq!(query.page, 1);
        assert_eq!(query.per_page, MAX_PER_PAGE);

        let query = OrderQuery::new().page(3, 10);
        assert_eq!(query.offset(), 20);
        assert_eq!(query.limit(), 10);
    }

    #[test]
    fn page_map_keeps_metadata() {
        let page = Page {
            items: vec![1, 2, 3],
            total: 9,
            page: 2,
            per_page: 3,
        };
        let mapped = page.map(|n| n * 10);
        assert_eq!(mapped.items, vec![10, 20, 30]);
        assert_eq!(mapped.total, 9);
        assert_eq!(mapped.page, 2);
    }
}
