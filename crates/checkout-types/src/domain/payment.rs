use serde::{Deserialize, Serialize};

use crate::domain::order::{OrderId, UserId};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentMetadata {
    pub order_id: Option<OrderId>,
    pub user_id: UserId,
}

/// Gateway-side payment object created for an order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentOrder {
    pub payment_ref: String,
    pub client_handle: Option<String>,
    pub key_id: Option<String>,
    pub amount_cents: i64,
    pub currency: String,
    pub status: String,
}

/// Evidence from the payment UI that the customer completed the payment.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentProof {
    pub payment_id: Option<String>,
    pub signature: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentResult {
    pub success: bool,
    pub status: String,
    pub payment_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RefundResult {
    pub success: bool,
    pub refund_id: String,
    pub amount_cents: i64,
    pub status: String,
}

/// What a client needs to drive the payment UI for an order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentHandle {
    pub order_id: OrderId,
    pub payment_ref: String,
    pub client_handle: Option<String>,
    pub key_id: Option<String>,
    #[serde(rename = "amount", with = "crate::domain::money::major_units")]
    pub amount_cents: i64,
    pub currency: String,
}

impl PaymentHandle {
    pub fn new(order_id: OrderId, payment: PaymentOrder) -> Self {
        Self {
            order_id,
            payment_ref: payment.payment_ref,
            client_handle: payment.client_handle,
            key_id: payment.key_id,
            amount_cents: payment.amount_cents,
            currency: payment.currency,
        }
    }
}
