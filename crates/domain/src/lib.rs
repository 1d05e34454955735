//! Domain layer of the order management backend.
//!
//! This crate provides:
//! - the order placement transaction ([`OrderService::place_order`])
//! - order queries and the status lifecycle (list, get, cancel, update status)
//! - the product catalog ([`CatalogService`])
//! - per-operation access checks and the error taxonomy ([`DomainError`])

pub mod access;
pub mod catalog;
pub mod error;
pub mod order;

pub use catalog::{CatalogService, CreateProduct};
pub use common::{Actor, Money, OrderId, OrderStatus, ProductId, Role, UserId};
pub use error::DomainError;
pub use order::{NormalizedItem, OrderService, PlaceOrder, normalize_items};
