//! Value objects shared by the store, domain and API layers.

pub mod money;
pub mod role;
pub mod status;
pub mod types;

pub use money::{Money, ParseMoneyError};
pub use role::{Actor, ParseRoleError, Role};
pub use status::{OrderStatus, ParseStatusError};
pub use types::{OrderId, ProductId, UserId};
