//! Transactional datastore for products and orders.
//!
//! The [`OrderStore`] trait is the injected datastore handle: it serves
//! plain reads and hands out [`OrderTransaction`]s scoped to a single order
//! placement. Two implementations ship with the crate: [`PostgresOrderStore`]
//! backed by a sqlx pool, and [`InMemoryOrderStore`] for tests and local runs.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod records;
pub mod store;

pub use common::{Money, OrderId, OrderStatus, ProductId, UserId};
pub use error::{Result, StoreError};
pub use memory::InMemoryOrderStore;
pub use postgres::PostgresOrderStore;
pub use records::{
    NewLineItem, NewOrder, NewProduct, Order, OrderDetails, OrderLine, OrderLineItem, Product,
    ProductStock,
};
pub use store::{OrderStore, OrderTransaction};
