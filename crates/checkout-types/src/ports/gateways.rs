//! Ports for the downstream services the order service calls.

use async_trait::async_trait;

use crate::domain::cart::{CartLine, Product};
use crate::domain::notification::Notification;
use crate::domain::order::{ProductId, UserId};
use crate::domain::payment::{
    PaymentMetadata, PaymentOrder, PaymentProof, PaymentResult, RefundResult,
};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("rejected by downstream: {0}")]
    Validation(String),

    #[error("downstream unavailable: {0}")]
    Unavailable(String),
}

impl GatewayError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, GatewayError::Unavailable(_))
    }
}

#[async_trait]
pub trait CartStore: Send + Sync + 'static {
    async fn get_cart(&self, user_id: UserId) -> Result<Vec<CartLine>, GatewayError>;
    async fn clear_cart(&self, user_id: UserId) -> Result<(), GatewayError>;
}

#[async_trait]
pub trait InventoryGateway: Send + Sync + 'static {
    async fn get_product(&self, id: ProductId) -> Result<Product, GatewayError>;
    /// Applies a relative stock change.
    async fn adjust_inventory(&self, id: ProductId, delta: i64) -> Result<(), GatewayError>;
}

#[async_trait]
pub trait PaymentGateway: Send + Sync + 'static {
    async fn create_payment_order(
        &self,
        amount_cents: i64,
        currency: &str,
        metadata: PaymentMetadata,
    ) -> Result<PaymentOrder, GatewayError>;

    async fn confirm_payment(
        &self,
        payment_ref: &str,
        proof: &PaymentProof,
    ) -> Result<PaymentResult, GatewayError>;

    /// Refunds `amount_cents`, or the full amount when `None`.
    async fn refund(
        &self,
        payment_ref: &str,
        amount_cents: Option<i64>,
    ) -> Result<RefundResult, GatewayError>;
}

#[async_trait]
pub trait NotificationGateway: Send + Sync + 'static {
    async fn notify(&self, notification: &Notification) -> Result<(), GatewayError>;
}
