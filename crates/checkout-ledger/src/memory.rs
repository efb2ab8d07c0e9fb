use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use checkout_types::domain::order::{NewOrder, Order, OrderId, OrderPatch, UserId};
use checkout_types::ports::order_ledger::{LedgerError, OrderLedger};
use dashmap::DashMap;

#[derive(Clone)]
pub struct InMemoryLedger {
    map: Arc<DashMap<OrderId, Order>>,
    next_id: Arc<AtomicI64>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self {
            map: Arc::new(DashMap::new()),
            next_id: Arc::new(AtomicI64::new(0)),
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OrderLedger for InMemoryLedger {
    async fn create_order_with_items(&self, order: NewOrder) -> Result<Order, LedgerError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let order = order.into_order(id, Utc::now());
        self.map.insert(id, order.clone());
        Ok(order)
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>, LedgerError> {
        Ok(self.map.get(&id).map(|r| r.clone()))
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, LedgerError> {
        let mut orders: Vec<Order> = self
            .map
            .iter()
            .filter(|kv| kv.value().user_id == user_id)
            .map(|kv| kv.value().clone())
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(orders)
    }

    async fn update(&self, id: OrderId, patch: OrderPatch) -> Result<Option<Order>, LedgerError> {
        // The entry guard holds the shard lock, so check-and-apply is atomic.
        if let Some(mut v) = self.map.get_mut(&id) {
            if let Some(expected) = patch.expected_status {
                if v.status != expected {
                    return Err(LedgerError::StatusConflict { actual: v.status });
                }
            }
            v.apply(&patch, Utc::now());
            return Ok(Some(v.clone()));
        }
        Ok(None)
    }
}
