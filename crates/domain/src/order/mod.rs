//! Orders: the placement transaction and the status lifecycle.

mod request;
mod service;

pub use request::{NormalizedItem, PlaceOrder, normalize_items};
pub use service::OrderService;
