use async_trait::async_trait;
use common::{OrderId, OrderStatus, ProductId, UserId};

use crate::{
    NewLineItem, NewOrder, NewProduct, Order, OrderDetails, OrderLineItem, Product, ProductStock,
    Result,
};

/// Core trait for order store implementations.
///
/// The store is shared across requests; every order placement acquires its
/// own [`OrderTransaction`] through [`OrderStore::begin`]. All
/// implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// The transaction handle this store hands out.
    type Transaction: OrderTransaction;

    /// Starts a transaction.
    ///
    /// Nothing written through the handle is visible to other readers until
    /// [`OrderTransaction::commit`]. Dropping the handle without committing
    /// discards every write.
    async fn begin(&self) -> Result<Self::Transaction>;

    /// Lists all products, ordered by name.
    async fn list_products(&self) -> Result<Vec<Product>>;

    /// Inserts a product and returns it with its generated id.
    async fn insert_product(&self, product: NewProduct) -> Result<Product>;

    /// Lists orders with their line items, newest first.
    ///
    /// With `owner` set, only that user's orders are returned.
    async fn list_orders(&self, owner: Option<UserId>) -> Result<Vec<OrderDetails>>;

    /// Retrieves an order with its line items.
    async fn get_order(&self, order_id: OrderId) -> Result<Option<OrderDetails>>;

    /// Moves an order from `from` to `to`.
    ///
    /// Compare-and-set: returns `None` when the order does not exist or its
    /// status is no longer `from`.
    async fn set_order_status(
        &self,
        order_id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<Option<Order>>;
}

/// A unit of work spanning one order placement.
///
/// Either [`commit`](Self::commit) or [`rollback`](Self::rollback) consumes
/// the handle, so it cannot be used after the transaction has ended.
#[async_trait]
pub trait OrderTransaction: Send {
    /// Reads price and stock for the given products, locking their rows
    /// until the transaction ends. Unknown ids are simply absent.
    async fn fetch_stock(&mut self, product_ids: &[ProductId]) -> Result<Vec<ProductStock>>;

    /// Inserts an order header with status `pending`.
    async fn insert_order(&mut self, order: NewOrder) -> Result<Order>;

    /// Inserts a line item.
    async fn insert_line_item(&mut self, item: NewLineItem) -> Result<OrderLineItem>;

    /// Decrements a product's stock by `quantity` if at least that much is
    /// available.
    ///
    /// Returns `false`, leaving the stock untouched, when it is not.
    async fn decrement_stock(&mut self, product_id: &ProductId, quantity: u32) -> Result<bool>;

    /// Makes every write of this transaction visible atomically.
    async fn commit(self) -> Result<()>;

    /// Discards every write of this transaction.
    async fn rollback(self) -> Result<()>;
}
