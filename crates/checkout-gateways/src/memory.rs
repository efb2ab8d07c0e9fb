//! In-memory gateways. The payment gateway doubles as the deterministic mock
//! used when no payment service is configured; the rest back tests.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use checkout_types::domain::cart::{CartLine, Product};
use checkout_types::domain::notification::Notification;
use checkout_types::domain::order::{ProductId, UserId};
use checkout_types::domain::payment::{
    PaymentMetadata, PaymentOrder, PaymentProof, PaymentResult, RefundResult,
};
use checkout_types::ports::gateways::{
    CartStore, GatewayError, InventoryGateway, NotificationGateway, PaymentGateway,
};
use dashmap::DashMap;

fn unavailable(service: &str) -> GatewayError {
    GatewayError::Unavailable(format!("{service}: injected outage"))
}

#[derive(Clone, Default)]
pub struct InMemoryCartStore {
    carts: Arc<DashMap<UserId, Vec<CartLine>>>,
    unavailable: Arc<AtomicBool>,
    fail_on_clear: Arc<AtomicBool>,
}

impl InMemoryCartStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds to the user's cart, merging quantities per product.
    pub fn add_line(&self, user_id: UserId, product_id: ProductId, quantity: u32) {
        let mut cart = self.carts.entry(user_id).or_default();
        match cart.iter_mut().find(|l| l.product_id == product_id) {
            Some(line) => line.quantity += quantity,
            None => cart.push(CartLine {
                product_id,
                quantity,
            }),
        }
    }

    pub fn lines(&self, user_id: UserId) -> Vec<CartLine> {
        self.carts
            .get(&user_id)
            .map(|c| c.clone())
            .unwrap_or_default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn set_fail_on_clear(&self, fail: bool) {
        self.fail_on_clear.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl CartStore for InMemoryCartStore {
    async fn get_cart(&self, user_id: UserId) -> Result<Vec<CartLine>, GatewayError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(unavailable("cart"));
        }
        Ok(self.lines(user_id))
    }

    async fn clear_cart(&self, user_id: UserId) -> Result<(), GatewayError> {
        if self.unavailable.load(Ordering::SeqCst) || self.fail_on_clear.load(Ordering::SeqCst) {
            return Err(unavailable("cart"));
        }
        self.carts
            .remove(&user_id)
            .map(|_| ())
            .ok_or_else(|| GatewayError::NotFound(format!("cart for user {user_id}")))
    }
}

#[derive(Clone, Default)]
pub struct InMemoryInventory {
    products: Arc<DashMap<ProductId, Product>>,
    // Remaining forced failures per product for adjust_inventory.
    adjust_failures: Arc<DashMap<ProductId, u32>>,
    adjustments: Arc<Mutex<Vec<(ProductId, i64)>>>,
    adjust_attempts: Arc<AtomicU32>,
}

impl InMemoryInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_product(self, id: ProductId, name: &str, price_cents: i64, inventory: i64) -> Self {
        self.products.insert(
            id,
            Product {
                id,
                name: name.to_string(),
                price_cents,
                inventory,
            },
        );
        self
    }

    pub fn set_price(&self, id: ProductId, price_cents: i64) {
        if let Some(mut p) = self.products.get_mut(&id) {
            p.price_cents = price_cents;
        }
    }

    pub fn stock(&self, id: ProductId) -> Option<i64> {
        self.products.get(&id).map(|p| p.inventory)
    }

    /// Makes the next `times` adjustments of `id` fail as unavailable.
    pub fn fail_adjustments(&self, id: ProductId, times: u32) {
        self.adjust_failures.insert(id, times);
    }

    /// Successful adjustments, in call order.
    pub fn adjustments(&self) -> Vec<(ProductId, i64)> {
        self.adjustments
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn adjust_attempts(&self) -> u32 {
        self.adjust_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InventoryGateway for InMemoryInventory {
    async fn get_product(&self, id: ProductId) -> Result<Product, GatewayError> {
        self.products
            .get(&id)
            .map(|p| p.clone())
            .ok_or_else(|| GatewayError::NotFound(format!("product {id}")))
    }

    async fn adjust_inventory(&self, id: ProductId, delta: i64) -> Result<(), GatewayError> {
        self.adjust_attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(mut remaining) = self.adjust_failures.get_mut(&id) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(unavailable("product"));
            }
        }
        // The entry guard serializes adjustments per product.
        let mut product = self
            .products
            .get_mut(&id)
            .ok_or_else(|| GatewayError::NotFound(format!("product {id}")))?;
        product.inventory = (product.inventory + delta).max(0);
        self.adjustments
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, delta));
        Ok(())
    }
}

#[derive(Debug, Default)]
struct PaymentCounters {
    next_order: AtomicU32,
    next_payment: AtomicU32,
    next_refund: AtomicU32,
    confirm_calls: AtomicU32,
}

/// Deterministic payment gateway: sequential `order_mock_NNNN` refs, every
/// confirmation captured unless a decline is injected.
#[derive(Clone, Default)]
pub struct InMemoryPaymentGateway {
    orders: Arc<DashMap<String, PaymentOrder>>,
    refunds: Arc<Mutex<Vec<RefundResult>>>,
    counters: Arc<PaymentCounters>,
    decline: Arc<AtomicBool>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_decline(&self, decline: bool) {
        self.decline.store(decline, Ordering::SeqCst);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn payment_order(&self, payment_ref: &str) -> Option<PaymentOrder> {
        self.orders.get(payment_ref).map(|o| o.clone())
    }

    pub fn confirm_calls(&self) -> u32 {
        self.counters.confirm_calls.load(Ordering::SeqCst)
    }

    pub fn refunds(&self) -> Vec<RefundResult> {
        self.refunds
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn check_available(&self) -> Result<(), GatewayError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(unavailable("payment"));
        }
        Ok(())
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn create_payment_order(
        &self,
        amount_cents: i64,
        currency: &str,
        _metadata: PaymentMetadata,
    ) -> Result<PaymentOrder, GatewayError> {
        self.check_available()?;
        let n = self.counters.next_order.fetch_add(1, Ordering::SeqCst) + 1;
        let payment_ref = format!("order_mock_{n:04}");
        let order = PaymentOrder {
            client_handle: Some(format!("{payment_ref}_secret")),
            payment_ref: payment_ref.clone(),
            key_id: Some("rzp_test_mock".into()),
            amount_cents,
            currency: currency.to_string(),
            status: "created".into(),
        };
        self.orders.insert(payment_ref, order.clone());
        Ok(order)
    }

    async fn confirm_payment(
        &self,
        payment_ref: &str,
        proof: &PaymentProof,
    ) -> Result<PaymentResult, GatewayError> {
        self.check_available()?;
        self.counters.confirm_calls.fetch_add(1, Ordering::SeqCst);
        if !self.orders.contains_key(payment_ref) {
            return Err(GatewayError::NotFound(format!("payment order {payment_ref}")));
        }
        if self.decline.load(Ordering::SeqCst) {
            return Ok(PaymentResult {
                success: false,
                status: "failed".into(),
                payment_id: None,
            });
        }
        let payment_id = proof.payment_id.clone().unwrap_or_else(|| {
            let n = self.counters.next_payment.fetch_add(1, Ordering::SeqCst) + 1;
            format!("pay_mock_{n:04}")
        });
        Ok(PaymentResult {
            success: true,
            status: "captured".into(),
            payment_id: Some(payment_id),
        })
    }

    async fn refund(
        &self,
        payment_ref: &str,
        amount_cents: Option<i64>,
    ) -> Result<RefundResult, GatewayError> {
        self.check_available()?;
        let n = self.counters.next_refund.fetch_add(1, Ordering::SeqCst) + 1;
        let amount_cents = amount_cents
            .or_else(|| self.orders.get(payment_ref).map(|o| o.amount_cents))
            .unwrap_or(0);
        let refund = RefundResult {
            success: true,
            refund_id: format!("rfnd_mock_{n:04}"),
            amount_cents,
            status: "processed".into(),
        };
        self.refunds
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(refund.clone());
        Ok(refund)
    }
}

#[derive(Clone, Default)]
pub struct InMemoryNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl NotificationGateway for InMemoryNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), GatewayError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(unavailable("notification"));
        }
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cart_merges_lines_and_clears() {
        let carts = InMemoryCartStore::new();
        carts.add_line(1, 7, 1);
        carts.add_line(1, 7, 2);
        carts.add_line(1, 8, 1);
        assert_eq!(
            carts.get_cart(1).await.unwrap(),
            vec![
                CartLine { product_id: 7, quantity: 3 },
                CartLine { product_id: 8, quantity: 1 },
            ]
        );
        carts.clear_cart(1).await.unwrap();
        assert!(carts.get_cart(1).await.unwrap().is_empty());
        assert!(matches!(
            carts.clear_cart(1).await,
            Err(GatewayError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn inventory_clamps_and_injects_failures() {
        let inventory = InMemoryInventory::new().with_product(7, "Widget", 2999, 3);
        inventory.fail_adjustments(7, 1);

        assert!(matches!(
            inventory.adjust_inventory(7, -1).await,
            Err(GatewayError::Unavailable(_))
        ));
        inventory.adjust_inventory(7, -5).await.unwrap();
        assert_eq!(inventory.stock(7), Some(0));
        assert_eq!(inventory.adjustments(), vec![(7, -5)]);
        assert_eq!(inventory.adjust_attempts(), 2);
        assert!(matches!(
            inventory.get_product(8).await,
            Err(GatewayError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn payment_mock_is_sequential_and_deterministic() {
        let payments = InMemoryPaymentGateway::new();
        let meta = PaymentMetadata {
            order_id: Some(1),
            user_id: 1,
        };
        let first = payments.create_payment_order(5998, "usd", meta).await.unwrap();
        let second = payments.create_payment_order(100, "usd", meta).await.unwrap();
        assert_eq!(first.payment_ref, "order_mock_0001");
        assert_eq!(second.payment_ref, "order_mock_0002");

        let confirmed = payments
            .confirm_payment(&first.payment_ref, &PaymentProof::default())
            .await
            .unwrap();
        assert!(confirmed.success);
        assert_eq!(confirmed.payment_id.as_deref(), Some("pay_mock_0001"));

        let refund = payments.refund(&first.payment_ref, None).await.unwrap();
        assert_eq!(refund.amount_cents, 5998);
        assert_eq!(refund.refund_id, "rfnd_mock_0001");

        payments.set_decline(true);
        let declined = payments
            .confirm_payment(&second.payment_ref, &PaymentProof::default())
            .await
            .unwrap();
        assert!(!declined.success);
        assert_eq!(payments.confirm_calls(), 2);
    }

    #[tokio::test]
    async fn payment_mock_rejects_unknown_references() {
        let payments = InMemoryPaymentGateway::new();
        let err = payments
            .confirm_payment("order_never_issued", &PaymentProof::default())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::NotFound(_)));
    }
}
