//! Order persistence seam.
//!
//! The order database belongs to the storefront platform; this crate only
//! reads orders and writes status updates back through [`OrderStore`].

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use crate::error::PersistenceError;
use crate::orders::model::Order;

/// Storage operations needed by order sync
#[async_trait::async_trait]
pub trait OrderStore: Send + Sync + 'static {
    /// Fetch an order by its storefront id
    async fn get(&self, id: &str) -> Result<Option<Order>, PersistenceError>;

    /// Fetch an order by the payment gateway's order reference
    async fn find_by_gateway_order_id(
        &self,
        gateway_order_id: &str,
    ) -> Result<Option<Order>, PersistenceError>;

    /// Insert or replace an order unconditionally
    async fn insert(&self, order: Order) -> Result<(), PersistenceError>;

    /// Write `order` if the stored copy is still at `order.version`.
    ///
    /// Returns the stored order with its version bumped.
    async fn update(&self, order: Order) -> Result<Order, PersistenceError>;
}

/// Process-local order store backed by a `HashMap`
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    orders: Arc<RwLock<HashMap<String, Order>>>,
}

impl InMemoryOrderStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store preloaded with `orders`
    pub fn with_orders(orders: impl IntoIterator<Item = Order>) -> Self {
        let map = orders
            .into_iter()
            .map(|order| (order.id.clone(), order))
            .collect();
        Self {
            orders: Arc::new(RwLock::new(map)),
        }
    }

    /// Number of stored orders
    pub async fn len(&self) -> usize {
        self.orders.read().await.len()
    }

    /// Check if the store holds no orders
    pub async fn is_empty(&self) -> bool {
        self.orders.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn get(&self, id: &str) -> Result<Option<Order>, PersistenceError> {
        Ok(self.orders.read().await.get(id).cloned())
    }

    async fn find_by_gateway_order_id(
        &self,
        gateway_order_id: &str,
    ) -> Result<Option<Order>, PersistenceError> {
        let lock = self.orders.read().await;
        Ok(lock
            .values()
            .find(|order| order.gateway_order_id == gateway_order_id)
            .cloned())
    }

    async fn insert(&self, order: Order) -> Result<(), PersistenceError> {
        self.orders.write().await.insert(order.id.clone(), order);
        Ok(())
    }

    async fn update(&self, mut order: Order) -> Result<Order, PersistenceError> {
        let mut lock = self.orders.write().await;
        let stored = lock
            .get_mut(&order.id)
            .ok_or_else(|| PersistenceError::Missing(order.id.clone()))?;

        if stored.version != order.version {
            return Err(PersistenceError::Conflict {
                order_id: order.id.clone(),
                expected: order.version,
                found: stored.version,
            });
        }

        order.version += 1;
        *stored = order.clone();
        debug!(order_id = %order.id, version = order.version, "Order updated");
        Ok(order)
    }
}
