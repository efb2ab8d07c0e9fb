use async_trait::async_trait;

use crate::domain::order::{NewOrder, Order, OrderId, OrderPatch, OrderStatus, UserId};

#[derive(thiserror::Error, Debug)]
pub enum LedgerError {
    #[error("db error: {0}")]
    DbError(String),

    #[error("status conflict: order is {actual}")]
    StatusConflict { actual: OrderStatus },
}

#[async_trait]
pub trait OrderLedger: Send + Sync + 'static {
    /// Persists the order and all of its items in one atomic write.
    async fn create_order_with_items(&self, order: NewOrder) -> Result<Order, LedgerError>;
    async fn get(&self, id: OrderId) -> Result<Option<Order>, LedgerError>;
    /// Orders for a user, newest first.
    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, LedgerError>;
    /// Applies `patch` atomically. Returns `Ok(None)` for an unknown id and
    /// `StatusConflict` when `patch.expected_status` no longer matches.
    async fn update(&self, id: OrderId, patch: OrderPatch) -> Result<Option<Order>, LedgerError>;
}
