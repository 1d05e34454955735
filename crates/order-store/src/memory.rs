use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use common::{Money, OrderId, OrderStatus, ProductId, UserId};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::{
    NewLineItem, NewOrder, NewProduct, Order, OrderDetails, OrderLine, OrderLineItem, Product,
    ProductStock, Result, StoreError,
    store::{OrderStore, OrderTransaction},
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    products: BTreeMap<ProductId, Product>,
    /// Insertion order, oldest first.
    orders: Vec<Order>,
    line_items: Vec<OrderLineItem>,
}

impl MemoryState {
    fn details(&self, order: &Order) -> OrderDetails {
        let items = self
            .line_items
            .iter()
            .filter(|item| item.order_id == order.id)
            .map(|item| OrderLine {
                id: item.id,
                product_id: item.product_id.clone(),
                product_name: self
                    .products
                    .get(&item.product_id)
                    .map(|p| p.name.clone()),
                quantity: item.quantity,
                unit_price: item.unit_price,
            })
            .collect();

        OrderDetails {
            order: order.clone(),
            items,
        }
    }
}

#[derive(Debug, Default)]
struct Faults {
    fail_on_begin: AtomicBool,
    fail_on_line_item_insert: AtomicBool,
    fail_on_commit: AtomicBool,
}

/// In-memory order store for testing and local runs.
///
/// A transaction holds the store lock for its whole lifetime and writes to a
/// private copy of the state, which replaces the shared state on commit.
/// Transactions are therefore fully serialized and an uncommitted
/// transaction is never observable.
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    state: Arc<Mutex<MemoryState>>,
    faults: Arc<Faults>,
}

impl InMemoryOrderStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a product with the given price and stock, returning it.
    pub async fn seed_product(
        &self,
        name: impl Into<String>,
        price: Money,
        stock_quantity: u32,
    ) -> Product {
        let mut state = self.state.lock().await;
        insert_product(
            &mut state,
            NewProduct {
                name: name.into(),
                description: None,
                price,
                stock_quantity,
                category: None,
            },
        )
    }

    /// Returns the committed stock of a product.
    pub async fn stock_of(&self, product_id: &ProductId) -> Option<u32> {
        self.state
            .lock()
            .await
            .products
            .get(product_id)
            .map(|p| p.stock_quantity)
    }

    /// Returns the number of committed orders.
    pub async fn order_count(&self) -> usize {
        self.state.lock().await.orders.len()
    }

    /// Returns the number of committed line items.
    pub async fn line_item_count(&self) -> usize {
        self.state.lock().await.line_items.len()
    }

    /// Configures the store to refuse every new transaction.
    pub fn set_fail_on_begin(&self, fail: bool) {
        self.faults.fail_on_begin.store(fail, Ordering::SeqCst);
    }

    /// Configures the store to fail every line item insert.
    pub fn set_fail_on_line_item_insert(&self, fail: bool) {
        self.faults
            .fail_on_line_item_insert
            .store(fail, Ordering::SeqCst);
    }

    /// Configures the store to fail every commit.
    pub fn set_fail_on_commit(&self, fail: bool) {
        self.faults.fail_on_commit.store(fail, Ordering::SeqCst);
    }
}

fn insert_product(state: &mut MemoryState, product: NewProduct) -> Product {
    let product = Product {
        id: ProductId::generate(),
        name: product.name,
        description: product.description,
        price: product.price,
        stock_quantity: product.stock_quantity,
        category: product.category,
        created_at: Utc::now(),
    };
    state
        .products
        .insert(product.id.clone(), product.clone());
    product
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    type Transaction = InMemoryTransaction;

    async fn begin(&self) -> Result<InMemoryTransaction> {
        if self.faults.fail_on_begin.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("no connection available".to_string()));
        }
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(InMemoryTransaction {
            guard,
            working,
            faults: self.faults.clone(),
        })
    }

    async fn list_products(&self) -> Result<Vec<Product>> {
        let state = self.state.lock().await;
        let mut products: Vec<_> = state.products.values().cloned().collect();
        products.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(products)
    }

    async fn insert_product(&self, product: NewProduct) -> Result<Product> {
        let mut state = self.state.lock().await;
        Ok(insert_product(&mut state, product))
    }

    async fn list_orders(&self, owner: Option<UserId>) -> Result<Vec<OrderDetails>> {
        let state = self.state.lock().await;
        Ok(state
            .orders
            .iter()
            .rev()
            .filter(|order| owner.is_none_or(|owner| order.user_id == owner))
            .map(|order| state.details(order))
            .collect())
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<OrderDetails>> {
        let state = self.state.lock().await;
        Ok(state
            .orders
            .iter()
            .find(|order| order.id == order_id)
            .map(|order| state.details(order)))
    }

    async fn set_order_status(
        &self,
        order_id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<Option<Order>> {
        let mut state = self.state.lock().await;
        let Some(order) = state
            .orders
            .iter_mut()
            .find(|order| order.id == order_id && order.status == from)
        else {
            return Ok(None);
        };
        order.status = to;
        Ok(Some(order.clone()))
    }
}

/// Transaction handle of [`InMemoryOrderStore`].
pub struct InMemoryTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
    faults: Arc<Faults>,
}

#[async_trait]
impl OrderTransaction for InMemoryTransaction {
    async fn fetch_stock(&mut self, product_ids: &[ProductId]) -> Result<Vec<ProductStock>> {
        Ok(product_ids
            .iter()
            .filter_map(|id| self.working.products.get(id))
            .map(|p| ProductStock {
                id: p.id.clone(),
                price: p.price,
                stock_quantity: p.stock_quantity,
            })
            .collect())
    }

    async fn insert_order(&mut self, order: NewOrder) -> Result<Order> {
        let order = Order {
            id: OrderId::new(),
            user_id: order.user_id,
            total_amount: order.total_amount,
            status: OrderStatus::Pending,
            shipping_address: order.shipping_address,
            created_at: Utc::now(),
        };
        self.working.orders.push(order.clone());
        Ok(order)
    }

    async fn insert_line_item(&mut self, item: NewLineItem) -> Result<OrderLineItem> {
        if self.faults.fail_on_line_item_insert.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "line item insert rejected".to_string(),
            ));
        }
        if !self.working.orders.iter().any(|o| o.id == item.order_id) {
            return Err(StoreError::Unavailable(format!(
                "order {} does not exist",
                item.order_id
            )));
        }
        if !self.working.products.contains_key(&item.product_id) {
            return Err(StoreError::Unavailable(format!(
                "product {} does not exist",
                item.product_id
            )));
        }

        let item = OrderLineItem {
            id: Uuid::new_v4(),
            order_id: item.order_id,
            product_id: item.product_id,
            quantity: item.quantity,
            unit_price: item.unit_price,
        };
        self.working.line_items.push(item.clone());
        Ok(item)
    }

    async fn decrement_stock(&mut self, product_id: &ProductId, quantity: u32) -> Result<bool> {
        match self.working.products.get_mut(product_id) {
            Some(product) if product.stock_quantity >= quantity => {
                product.stock_quantity -= quantity;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn commit(self) -> Result<()> {
        if self.faults.fail_on_commit.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("commit rejected".to_string()));
        }
        let InMemoryTransaction {
            mut guard, working, ..
        } = self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_order(user_id: UserId, cents: i64) -> NewOrder {
        NewOrder {
            user_id,
            total_amount: Money::from_cents(cents),
            shipping_address: "1 Main St".to_string(),
        }
    }

    #[tokio::test]
    async fn committed_writes_become_visible() {
        let store = InMemoryOrderStore::new();
        let product = store.seed_product("Widget", Money::from_cents(1000), 5).await;

        let mut tx = store.begin().await.unwrap();
        let order = tx.insert_order(new_order(UserId::new(), 2000)).await.unwrap();
        tx.insert_line_item(NewLineItem {
            order_id: order.id,
            product_id: product.id.clone(),
            quantity: 2,
            unit_price: product.price,
        })
        .await
        .unwrap();
        assert!(tx.decrement_stock(&product.id, 2).await.unwrap());
        tx.commit().await.unwrap();

        assert_eq!(store.stock_of(&product.id).await, Some(3));
        assert_eq!(store.order_count().await, 1);
        assert_eq!(store.line_item_count().await, 1);

        let details = store.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(details.order.status, OrderStatus::Pending);
        assert_eq!(details.items[0].product_name.as_deref(), Some("Widget"));
    }

    #[tokio::test]
    async fn rollback_discards_writes() {
        let store = InMemoryOrderStore::new();
        let product = store.seed_product("Widget", Money::from_cents(1000), 5).await;

        let mut tx = store.begin().await.unwrap();
        tx.insert_order(new_order(UserId::new(), 1000)).await.unwrap();
        assert!(tx.decrement_stock(&product.id, 1).await.unwrap());
        tx.rollback().await.unwrap();

        assert_eq!(store.stock_of(&product.id).await, Some(5));
        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn dropped_transaction_discards_writes() {
        let store = InMemoryOrderStore::new();
        let product = store.seed_product("Widget", Money::from_cents(1000), 5).await;

        {
            let mut tx = store.begin().await.unwrap();
            assert!(tx.decrement_stock(&product.id, 5).await.unwrap());
        }

        assert_eq!(store.stock_of(&product.id).await, Some(5));
    }

    #[tokio::test]
    async fn guarded_decrement_refuses_to_oversell() {
        let store = InMemoryOrderStore::new();
        let product = store.seed_product("Widget", Money::from_cents(1000), 3).await;

        let mut tx = store.begin().await.unwrap();
        assert!(!tx.decrement_stock(&product.id, 4).await.unwrap());
        assert!(tx.decrement_stock(&product.id, 3).await.unwrap());
        assert!(!tx.decrement_stock(&product.id, 1).await.unwrap());
        assert!(
            !tx.decrement_stock(&ProductId::new("missing"), 1)
                .await
                .unwrap()
        );
        tx.commit().await.unwrap();

        assert_eq!(store.stock_of(&product.id).await, Some(0));
    }

    #[tokio::test]
    async fn fetch_stock_skips_unknown_ids() {
        let store = InMemoryOrderStore::new();
        let product = store.seed_product("Widget", Money::from_cents(250), 7).await;

        let mut tx = store.begin().await.unwrap();
        let rows = tx
            .fetch_stock(&[product.id.clone(), ProductId::new("nonexistent")])
            .await
            .unwrap();
        assert_eq!(
            rows,
            vec![ProductStock {
                id: product.id,
                price: Money::from_cents(250),
                stock_quantity: 7,
            }]
        );
    }

    #[tokio::test]
    async fn failing_commit_leaves_state_untouched() {
        let store = InMemoryOrderStore::new();
        let product = store.seed_product("Widget", Money::from_cents(1000), 5).await;
        store.set_fail_on_commit(true);

        let mut tx = store.begin().await.unwrap();
        assert!(tx.decrement_stock(&product.id, 2).await.unwrap());
        assert!(tx.commit().await.is_err());

        assert_eq!(store.stock_of(&product.id).await, Some(5));
    }

    #[tokio::test]
    async fn list_orders_filters_by_owner_newest_first() {
        let store = InMemoryOrderStore::new();
        let alice = UserId::new();
        let bob = UserId::new();

        for (owner, cents) in [(alice, 100), (bob, 200), (alice, 300)] {
            let mut tx = store.begin().await.unwrap();
            tx.insert_order(new_order(owner, cents)).await.unwrap();
            tx.commit().await.unwrap();
        }

        let all = store.list_orders(None).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].order.total_amount.cents(), 300);

        let mine = store.list_orders(Some(alice)).await.unwrap();
        let totals: Vec<_> = mine.iter().map(|o| o.order.total_amount.cents()).collect();
        assert_eq!(totals, vec![300, 100]);
    }

    #[tokio::test]
    async fn set_order_status_is_compare_and_set() {
        let store = InMemoryOrderStore::new();
        let mut tx = store.begin().await.unwrap();
        let order = tx.insert_order(new_order(UserId::new(), 100)).await.unwrap();
        tx.commit().await.unwrap();

        let updated = store
            .set_order_status(order.id, OrderStatus::Pending, OrderStatus::Processing)
            .await
            .unwrap();
        assert_eq!(updated.unwrap().status, OrderStatus::Processing);

        let stale = store
            .set_order_status(order.id, OrderStatus::Pending, OrderStatus::Cancelled)
            .await
            .unwrap();
        assert!(stale.is_none());
    }

    #[tokio::test]
    async fn list_products_sorted_by_name() {
        let store = InMemoryOrderStore::new();
        store.seed_product("Gadget", Money::from_cents(1), 1).await;
        store.seed_product("Anvil", Money::from_cents(1), 1).await;

        let names: Vec<_> = store
            .list_products()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["Anvil", "Gadget"]);
    }
}
