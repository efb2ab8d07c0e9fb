use std::sync::Arc;

use crate::errors::CheckoutError;
use checkout_types::domain::money::cents_to_major;
use checkout_types::domain::notification::{Channel, Notification, Template};
use checkout_types::domain::order::{
    ItemSnapshot, NewOrder, Order, OrderError, OrderId, OrderPatch, OrderStatus, UnknownStatus,
    UserId,
};
use checkout_types::domain::payment::{PaymentHandle, PaymentMetadata, PaymentProof};
use checkout_types::ports::gateways::{
    CartStore, GatewayError, InventoryGateway, NotificationGateway, PaymentGateway,
};
use checkout_types::ports::order_ledger::{LedgerError, OrderLedger};
use serde::Serialize;
use serde_json::json;

/// The remote services a checkout talks to.
#[derive(Clone)]
pub struct Gateways {
    pub cart: Arc<dyn CartStore>,
    pub inventory: Arc<dyn InventoryGateway>,
    pub payment: Arc<dyn PaymentGateway>,
    pub notifier: Arc<dyn NotificationGateway>,
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub currency: String,
    /// Total attempts per inventory adjustment; only `Unavailable` is retried.
    pub inventory_attempts: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            currency: "usd".into(),
            inventory_attempts: 2,
        }
    }
}

/// Result of the pay-first checkout: a pending order plus the handle the
/// client needs to complete payment.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentCheckout {
    pub order: Order,
    pub payment: PaymentHandle,
}

/// Drives a checkout from cart to confirmed order.
///
/// The ledger write is the commit point. Everything after it (inventory,
/// cart clearing, notifications) is best-effort and only logged.
pub struct OrderOrchestrator<L: OrderLedger> {
    ledger: L,
    gateways: Gateways,
    config: OrchestratorConfig,
}

impl<L: OrderLedger> OrderOrchestrator<L> {
    pub fn new(ledger: L, gateways: Gateways) -> Self {
        Self {
            ledger,
            gateways,
            config: OrchestratorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    #[tracing::instrument(skip(self, shipping_address, payment_ref))]
    pub async fn checkout(
        &self,
        user_id: UserId,
        shipping_address: Option<String>,
        payment_ref: Option<String>,
    ) -> Result<Order, CheckoutError> {
        let items = self.snapshot_cart(user_id).await?;
        let new_order = NewOrder::new(user_id, items)
            .map_err(order_error)?
            .with_shipping_address(shipping_address)
            .with_payment_ref(payment_ref)
            .with_inventory_adjusted(true);

        let order = self.ledger.create_order_with_items(new_order).await?;
        tracing::info!(
            order_id = order.id,
            total_cents = order.total_cents,
            items = order.items.len(),
            "order created"
        );

        self.adjust_stock(&order, -1).await;
        self.clear_cart(order.id, user_id).await;
        Ok(order)
    }

    #[tracing::instrument(skip(self, shipping_address))]
    pub async fn checkout_with_payment(
        &self,
        user_id: UserId,
        shipping_address: Option<String>,
    ) -> Result<PaymentCheckout, CheckoutError> {
        let items = self.snapshot_cart(user_id).await?;
        let new_order = NewOrder::new(user_id, items).map_err(order_error)?;

        let payment = self
            .gateways
            .payment
            .create_payment_order(
                new_order.total_cents,
                &self.config.currency,
                PaymentMetadata {
                    order_id: None,
                    user_id,
                },
            )
            .await
            .map_err(payment_error)?;

        let new_order = new_order
            .with_shipping_address(shipping_address)
            .with_payment_ref(Some(payment.payment_ref.clone()))
            .with_inventory_adjusted(false);
        let order = self.ledger.create_order_with_items(new_order).await?;
        tracing::info!(
            order_id = order.id,
            payment_ref = %payment.payment_ref,
            "order created awaiting payment"
        );

        let payment = PaymentHandle::new(order.id, payment);
        Ok(PaymentCheckout { order, payment })
    }

    #[tracing::instrument(skip(self))]
    pub async fn initiate_payment(&self, order_id: OrderId) -> Result<PaymentHandle, CheckoutError> {
        let order = self.get_order(order_id).await?;
        if order.status != OrderStatus::Pending {
            return Err(invalid_state(&order, "initiate payment"));
        }

        let payment = self
            .gateways
            .payment
            .create_payment_order(
                order.total_cents,
                &self.config.currency,
                PaymentMetadata {
                    order_id: Some(order.id),
                    user_id: order.user_id,
                },
            )
            .await
            .map_err(payment_error)?;

        let patch = OrderPatch::new()
            .expect_status(OrderStatus::Pending)
            .payment_ref(payment.payment_ref.clone());
        self.apply(order_id, patch, "initiate payment").await?;
        tracing::info!(order_id, payment_ref = %payment.payment_ref, "payment initiated");

        Ok(PaymentHandle::new(order_id, payment))
    }

    #[tracing::instrument(skip(self, proof))]
    pub async fn confirm_payment(
        &self,
        order_id: OrderId,
        payment_ref: Option<String>,
        proof: PaymentProof,
    ) -> Result<Order, CheckoutError> {
        let order = self.get_order(order_id).await?;
        if order.status != OrderStatus::Pending {
            return Err(invalid_state(&order, "confirm payment"));
        }

        let payment_ref = payment_ref
            .or_else(|| order.payment_ref.clone())
            .ok_or_else(|| {
                CheckoutError::PaymentGateway(format!("order {order_id} has no payment reference"))
            })?;

        let result = self
            .gateways
            .payment
            .confirm_payment(&payment_ref, &proof)
            .await
            .map_err(payment_error)?;
        if !result.success {
            tracing::warn!(order_id, status = %result.status, "payment not confirmed");
            return Err(CheckoutError::PaymentNotConfirmed {
                order_id,
                status: result.status,
            });
        }

        let needs_stock = !order.inventory_adjusted;
        let patch = OrderPatch::new()
            .expect_status(OrderStatus::Pending)
            .status(OrderStatus::Processing)
            .payment_ref(payment_ref)
            .inventory_adjusted(true);
        let updated = self.apply(order_id, patch, "confirm payment").await?;
        tracing::info!(order_id, payment_id = ?result.payment_id, "payment confirmed");

        if needs_stock {
            self.adjust_stock(&updated, -1).await;
        }
        self.clear_cart(order_id, updated.user_id).await;
        Ok(updated)
    }

    #[tracing::instrument(skip(self, tracking_number, notify_email, notify_phone))]
    pub async fn update_status(
        &self,
        order_id: OrderId,
        new_status: &str,
        tracking_number: Option<String>,
        notify_email: Option<String>,
        notify_phone: Option<String>,
    ) -> Result<Order, CheckoutError> {
        let status: OrderStatus = new_status
            .parse()
            .map_err(|e: UnknownStatus| CheckoutError::InvalidStatus(e.0))?;

        // A cancel must refund and restock.
        if status == OrderStatus::Cancelled {
            let cancelled = self.cancel_order(order_id).await?;
            self.notify_all(&cancelled, notify_email, notify_phone).await;
            return Ok(cancelled);
        }

        let order = self.get_order(order_id).await?;
        if !order.status.can_transition_to(status) {
            return Err(invalid_state(&order, "change status"));
        }

        let patch = OrderPatch::new()
            .expect_status(order.status)
            .status(status)
            .tracking_number(tracking_number);
        let updated = self.apply(order_id, patch, "change status").await?;
        tracing::info!(order_id, from = %order.status, to = %status, "order status updated");

        self.notify_all(&updated, notify_email, notify_phone).await;
        Ok(updated)
    }

    /// Claims the order with a conditional move to `cancelled`, then refunds
    /// a captured payment. A failed refund puts the previous state back.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(&self, order_id: OrderId) -> Result<Order, CheckoutError> {
        let order = self.get_order(order_id).await?;
        if order.status.is_terminal() || !order.status.can_transition_to(OrderStatus::Cancelled) {
            return Err(invalid_state(&order, "cancel"));
        }

        let claim = OrderPatch::new()
            .expect_status(order.status)
            .status(OrderStatus::Cancelled)
            .inventory_adjusted(false);
        let cancelled = self.apply(order_id, claim, "cancel").await?;

        if order.status == OrderStatus::Processing {
            if let Some(payment_ref) = order.payment_ref.as_deref() {
                if let Err(e) = self.refund(order_id, payment_ref).await {
                    self.restore(&order).await;
                    return Err(e);
                }
            }
        }
        tracing::info!(order_id, "order cancelled");

        if order.inventory_adjusted {
            self.adjust_stock(&cancelled, 1).await;
        }
        Ok(cancelled)
    }

    pub async fn get_order(&self, order_id: OrderId) -> Result<Order, CheckoutError> {
        self.ledger
            .get(order_id)
            .await?
            .ok_or(CheckoutError::OrderNotFound(order_id))
    }

    pub async fn list_orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, CheckoutError> {
        Ok(self.ledger.list_for_user(user_id).await?)
    }

    async fn refund(&self, order_id: OrderId, payment_ref: &str) -> Result<(), CheckoutError> {
        let refund = self
            .gateways
            .payment
            .refund(payment_ref, None)
            .await
            .map_err(payment_error)?;
        if !refund.success {
            return Err(CheckoutError::PaymentGateway(format!(
                "refund for order {order_id} was not processed: {}",
                refund.status
            )));
        }
        tracing::info!(order_id, refund_id = %refund.refund_id, "payment refunded");
        Ok(())
    }

    /// Undoes a cancel claim after the refund failed.
    async fn restore(&self, order: &Order) {
        let patch = OrderPatch::new()
            .expect_status(OrderStatus::Cancelled)
            .status(order.status)
            .inventory_adjusted(order.inventory_adjusted);
        if let Err(e) = self.apply(order.id, patch, "restore").await {
            tracing::error!(
                order_id = order.id,
                status = %order.status,
                error = %e,
                "failed to restore order after refund failure"
            );
        }
    }

    /// Reads the cart and snapshots each line's product name and price.
    async fn snapshot_cart(&self, user_id: UserId) -> Result<Vec<ItemSnapshot>, CheckoutError> {
        let lines = match self.gateways.cart.get_cart(user_id).await {
            Ok(lines) => lines,
            Err(GatewayError::NotFound(_)) => Vec::new(),
            Err(e) => return Err(CheckoutError::Unavailable(e.to_string())),
        };
        if lines.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let mut items = Vec::with_capacity(lines.len());
        for line in lines {
            let product = match self.gateways.inventory.get_product(line.product_id).await {
                Ok(product) => product,
                Err(GatewayError::NotFound(_)) => {
                    return Err(CheckoutError::ProductUnavailable(line.product_id))
                }
                Err(e) => return Err(CheckoutError::Unavailable(e.to_string())),
            };
            items.push(ItemSnapshot {
                product_id: line.product_id,
                product_name: product.name,
                quantity: line.quantity,
                price_cents: product.price_cents,
            });
        }
        Ok(items)
    }

    async fn apply(
        &self,
        order_id: OrderId,
        patch: OrderPatch,
        action: &'static str,
    ) -> Result<Order, CheckoutError> {
        match self.ledger.update(order_id, patch).await {
            Ok(Some(order)) => Ok(order),
            Ok(None) => Err(CheckoutError::OrderNotFound(order_id)),
            Err(LedgerError::StatusConflict { actual }) => Err(CheckoutError::InvalidState {
                order_id,
                status: actual,
                action,
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Applies `sign * quantity` to every item. Failures are logged, never
    /// returned: the order is already committed.
    async fn adjust_stock(&self, order: &Order, sign: i64) {
        let attempts = self.config.inventory_attempts.max(1);
        for item in &order.items {
            let delta = sign * i64::from(item.quantity);
            let mut attempt = 1;
            loop {
                match self
                    .gateways
                    .inventory
                    .adjust_inventory(item.product_id, delta)
                    .await
                {
                    Ok(()) => break,
                    Err(e) if e.is_retryable() && attempt < attempts => {
                        tracing::warn!(
                            order_id = order.id,
                            product_id = item.product_id,
                            attempt,
                            error = %e,
                            "inventory adjustment failed, retrying"
                        );
                        attempt += 1;
                    }
                    Err(e) => {
                        tracing::error!(
                            order_id = order.id,
                            product_id = item.product_id,
                            delta,
                            error = %e,
                            "inventory adjustment failed"
                        );
                        break;
                    }
                }
            }
        }
    }

    async fn clear_cart(&self, order_id: OrderId, user_id: UserId) {
        if let Err(e) = self.gateways.cart.clear_cart(user_id).await {
            tracing::warn!(order_id, user_id, error = %e, "failed to clear cart");
        }
    }

    async fn notify_all(&self, order: &Order, email: Option<String>, phone: Option<String>) {
        if let Some(email) = email {
            self.notify(order, Channel::Email, email).await;
        }
        if let Some(phone) = phone {
            self.notify(order, Channel::Sms, phone).await;
        }
    }

    async fn notify(&self, order: &Order, channel: Channel, target: String) {
        let notification = Notification {
            channel,
            target,
            template: Template::ShippingUpdate,
            data: json!({
                "orderId": order.id,
                "totalAmount": cents_to_major(order.total_cents),
                "status": order.status,
                "trackingNumber": order.tracking_number,
            }),
        };
        if let Err(e) = self.gateways.notifier.notify(&notification).await {
            tracing::warn!(
                order_id = order.id,
                channel = channel.as_str(),
                error = %e,
                "notification failed"
            );
        }
    }
}

fn order_error(e: OrderError) -> CheckoutError {
    match e {
        OrderError::NoItems => CheckoutError::EmptyCart,
        other => CheckoutError::BadRequest(other.to_string()),
    }
}

fn payment_error(e: GatewayError) -> CheckoutError {
    CheckoutError::PaymentGateway(e.to_string())
}

fn invalid_state(order: &Order, action: &'static str) -> CheckoutError {
    CheckoutError::InvalidState {
        order_id: order.id,
        status: order.status,
        action,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use checkout_gateways::memory::{
        InMemoryCartStore, InMemoryInventory, InMemoryNotifier, InMemoryPaymentGateway,
    };
    use checkout_ledger::memory::InMemoryLedger;

    struct Fixture {
        svc: OrderOrchestrator<InMemoryLedger>,
        cart: InMemoryCartStore,
        inventory: InMemoryInventory,
        payment: InMemoryPaymentGateway,
    }

    fn fixture() -> Fixture {
        let cart = InMemoryCartStore::new();
        let inventory = InMemoryInventory::new()
            .with_product(7, "Widget", 2999, 100)
            .with_product(8, "Gadget", 550, 10);
        let payment = InMemoryPaymentGateway::new();
        let gateways = Gateways {
            cart: Arc::new(cart.clone()),
            inventory: Arc::new(inventory.clone()),
            payment: Arc::new(payment.clone()),
            notifier: Arc::new(InMemoryNotifier::new()),
        };
        Fixture {
            svc: OrderOrchestrator::new(InMemoryLedger::new(), gateways),
            cart,
            inventory,
            payment,
        }
    }

    #[tokio::test]
    async fn checkout_snapshots_prices_and_clears_cart() {
        let f = fixture();
        f.cart.add_line(1, 7, 2);
        f.cart.add_line(1, 8, 1);

        let order = f.svc.checkout(1, Some("1 Main St".into()), None).await.unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.total_cents, 2 * 2999 + 550);
        assert_eq!(order.items.len(), 2);
        assert!(order.inventory_adjusted);
        assert_eq!(f.inventory.stock(7), Some(98));
        assert_eq!(f.inventory.stock(8), Some(9));
        assert!(f.cart.lines(1).is_empty());

        f.inventory.set_price(7, 1);
        let stored = f.svc.get_order(order.id).await.unwrap();
        assert_eq!(stored.items[0].price_cents, 2999);
    }

    #[tokio::test]
    async fn empty_cart_creates_nothing() {
        let f = fixture();
        let err = f.svc.checkout(1, None, None).await.unwrap_err();
        assert!(matches!(err, CheckoutError::EmptyCart));
        assert!(f.svc.ledger().is_empty());
    }

    #[tokio::test]
    async fn missing_product_aborts_before_commit() {
        let f = fixture();
        f.cart.add_line(1, 7, 1);
        f.cart.add_line(1, 99, 1);

        let err = f.svc.checkout(1, None, None).await.unwrap_err();
        assert!(matches!(err, CheckoutError::ProductUnavailable(99)));
        assert!(f.svc.ledger().is_empty());
        assert_eq!(f.inventory.adjust_attempts(), 0);
        assert_eq!(f.cart.lines(1).len(), 2);
    }

    #[tokio::test]
    async fn pay_first_flow_adjusts_inventory_once_on_confirm() {
        let f = fixture();
        f.cart.add_line(3, 7, 2);

        let started = f.svc.checkout_with_payment(3, None).await.unwrap();
        assert_eq!(started.payment.order_id, started.order.id);
        assert_eq!(started.payment.amount_cents, 5998);
        assert!(!started.order.inventory_adjusted);
        assert_eq!(f.inventory.stock(7), Some(100));
        assert_eq!(f.cart.lines(3).len(), 1);

        let confirmed = f
            .svc
            .confirm_payment(started.order.id, None, PaymentProof::default())
            .await
            .unwrap();
        assert_eq!(confirmed.status, OrderStatus::Processing);
        assert_eq!(f.inventory.stock(7), Some(98));
        assert!(f.cart.lines(3).is_empty());

        let again = f
            .svc
            .confirm_payment(started.order.id, None, PaymentProof::default())
            .await
            .unwrap_err();
        assert!(matches!(again, CheckoutError::InvalidState { .. }));
        assert_eq!(f.inventory.adjustments(), vec![(7, -2)]);
    }

    #[tokio::test]
    async fn confirm_after_checkout_does_not_adjust_again() {
        let f = fixture();
        f.cart.add_line(4, 8, 3);
        let order = f.svc.checkout(4, None, None).await.unwrap();
        f.svc.initiate_payment(order.id).await.unwrap();

        f.svc
            .confirm_payment(order.id, None, PaymentProof::default())
            .await
            .unwrap();
        assert_eq!(f.inventory.adjustments(), vec![(8, -3)]);
    }

    #[tokio::test]
    async fn confirm_without_payment_reference_fails() {
        let f = fixture();
        f.cart.add_line(5, 7, 1);
        let order = f.svc.checkout(5, None, None).await.unwrap();

        let err = f
            .svc
            .confirm_payment(order.id, None, PaymentProof::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::PaymentGateway(_)));
        assert_eq!(f.payment.confirm_calls(), 0);
    }

    #[tokio::test]
    async fn unknown_status_and_illegal_transition() {
        let f = fixture();
        f.cart.add_line(6, 7, 1);
        let order = f.svc.checkout(6, None, None).await.unwrap();

        let err = f
            .svc
            .update_status(order.id, "teleported", None, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::InvalidStatus(s) if s == "teleported"));

        let err = f
            .svc
            .update_status(order.id, "delivered", None, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn not_found_paths() {
        let f = fixture();
        assert!(matches!(
            f.svc.get_order(42).await,
            Err(CheckoutError::OrderNotFound(42))
        ));
        assert!(matches!(
            f.svc.cancel_order(42).await,
            Err(CheckoutError::OrderNotFound(42))
        ));
        assert!(matches!(
            f.svc.initiate_payment(42).await,
            Err(CheckoutError::OrderNotFound(42))
        ));
        assert!(f.svc.list_orders_for_user(42).await.unwrap().is_empty());
    }
}
