use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type OrderId = i64;
pub type UserId = i64;
pub type ProductId = i64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Transition table for the order lifecycle. Staying in the same status is
    /// always allowed so that side fields (tracking number) can be updated.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        if self == next {
            return true;
        }
        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, Cancelled)
                | (Processing, Shipped)
                | (Processing, Cancelled)
                | (Shipped, Delivered)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown order status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// Price and name of a product captured at checkout time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ItemSnapshot {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub price_cents: i64,
}

impl ItemSnapshot {
    pub fn line_total_cents(&self) -> i64 {
        i64::from(self.quantity) * self.price_cents
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderItem {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    #[serde(rename = "price", with = "crate::domain::money::major_units")]
    pub price_cents: i64,
}

/// Amounts are held in cents and serialized as decimal `total_amount` and
/// item `price`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub items: Vec<OrderItem>,
    #[serde(rename = "total_amount", with = "crate::domain::money::major_units")]
    pub total_cents: i64,
    pub status: OrderStatus,
    pub payment_ref: Option<String>,
    pub shipping_address: Option<String>,
    pub tracking_number: Option<String>,
    pub inventory_adjusted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderError {
    #[error("order has no items")]
    NoItems,
    #[error("item quantity must be > 0 (product {0})")]
    ZeroQuantity(ProductId),
}

/// An order that has not been assigned an id by the ledger yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub user_id: UserId,
    pub items: Vec<ItemSnapshot>,
    pub total_cents: i64,
    pub shipping_address: Option<String>,
    pub payment_ref: Option<String>,
    pub inventory_adjusted: bool,
}

impl NewOrder {
    pub fn new(user_id: UserId, items: Vec<ItemSnapshot>) -> Result<Self, OrderError> {
        if items.is_empty() {
            return Err(OrderError::NoItems);
        }
        if let Some(it) = items.iter().find(|it| it.quantity == 0) {
            return Err(OrderError::ZeroQuantity(it.product_id));
        }
        let total_cents = items.iter().map(ItemSnapshot::line_total_cents).sum();
        Ok(Self {
            user_id,
            items,
            total_cents,
            shipping_address: None,
            payment_ref: None,
            inventory_adjusted: false,
        })
    }

    pub fn with_shipping_address(mut self, address: Option<String>) -> Self {
        self.shipping_address = address;
        self
    }

    pub fn with_payment_ref(mut self, payment_ref: Option<String>) -> Self {
        self.payment_ref = payment_ref;
        self
    }

    pub fn with_inventory_adjusted(mut self, adjusted: bool) -> Self {
        self.inventory_adjusted = adjusted;
        self
    }

    /// Materializes the order once the ledger has picked an id. Every order
    /// starts out pending.
    pub fn into_order(self, id: OrderId, now: DateTime<Utc>) -> Order {
        let items = self
            .items
            .into_iter()
            .map(|it| OrderItem {
                order_id: id,
                product_id: it.product_id,
                product_name: it.product_name,
                quantity: it.quantity,
                price_cents: it.price_cents,
            })
            .collect();
        Order {
            id,
            user_id: self.user_id,
            items,
            total_cents: self.total_cents,
            status: OrderStatus::Pending,
            payment_ref: self.payment_ref,
            shipping_address: self.shipping_address,
            tracking_number: None,
            inventory_adjusted: self.inventory_adjusted,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update applied atomically by the ledger. When `expected_status` is
/// set the update only goes through if the stored status still matches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderPatch {
    pub expected_status: Option<OrderStatus>,
    pub status: Option<OrderStatus>,
    pub tracking_number: Option<String>,
    pub payment_ref: Option<String>,
    pub inventory_adjusted: Option<bool>,
}

impl OrderPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expect_status(mut self, status: OrderStatus) -> Self {
        self.expected_status = Some(status);
        self
    }

    pub fn status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn tracking_number(mut self, tracking_number: Option<String>) -> Self {
        self.tracking_number = tracking_number;
        self
    }

    pub fn payment_ref(mut self, payment_ref: impl Into<String>) -> Self {
        self.payment_ref = Some(payment_ref.into());
        self
    }

    pub fn inventory_adjusted(mut self, adjusted: bool) -> Self {
        self.inventory_adjusted = Some(adjusted);
        self
    }
}

impl Order {
    pub fn apply(&mut self, patch: &OrderPatch, now: DateTime<Utc>) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(tracking) = &patch.tracking_number {
            self.tracking_number = Some(tracking.clone());
        }
        if let Some(payment_ref) = &patch.payment_ref {
            self.payment_ref = Some(payment_ref.clone());
        }
        if let Some(adjusted) = patch.inventory_adjusted {
            self.inventory_adjusted = adjusted;
        }
        self.updated_at = now;
    }
}
