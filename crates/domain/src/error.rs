//! Domain error types.

use common::{OrderId, OrderStatus, ProductId};
use order_store::StoreError;
use thiserror::Error;

/// Errors that can occur during domain operations.
///
/// Everything except [`DomainError::TransactionFailure`] and
/// [`DomainError::Store`] is detected before any write and carries a message
/// fit to show the caller.
#[derive(Debug, Error)]
pub enum DomainError {
    /// No verified identity is attached to the request.
    #[error("Unauthorized")]
    Unauthorized,

    /// The actor's role does not permit the operation, or the resource
    /// belongs to someone else.
    #[error("Forbidden")]
    Forbidden,

    /// The request is malformed.
    #[error("{0}")]
    InvalidRequest(String),

    /// At least one referenced product does not exist.
    #[error("One or more products not found: {}", join_ids(.product_ids))]
    ProductNotFound { product_ids: Vec<ProductId> },

    /// A requested quantity exceeds the product's available stock.
    #[error("Insufficient stock for product {product_id}")]
    InsufficientStock { product_id: ProductId },

    /// Order not found.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The order's current status does not allow the requested one.
    #[error("Invalid state transition: cannot move order from {current} to {requested}")]
    InvalidStateTransition {
        current: OrderStatus,
        requested: OrderStatus,
    },

    /// Cancellation requested for an order that is no longer pending.
    #[error("Only pending orders can be cancelled (order is {current})")]
    NotCancellable { current: OrderStatus },

    /// The datastore failed while an order was being placed. Everything the
    /// attempt wrote has been rolled back.
    #[error("Transaction failed: {0}")]
    TransactionFailure(#[source] StoreError),

    /// The datastore failed outside a placement.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl DomainError {
    /// Short machine-readable name, used as a metrics label.
    pub fn kind(&self) -> &'static str {
        match self {
            DomainError::Unauthorized => "unauthorized",
            DomainError::Forbidden => "forbidden",
            DomainError::InvalidRequest(_) => "invalid_request",
            DomainError::ProductNotFound { .. } => "product_not_found",
            DomainError::InsufficientStock { .. } => "insufficient_stock",
            DomainError::OrderNotFound(_) => "order_not_found",
            DomainError::InvalidStateTransition { .. } => "invalid_state_transition",
            DomainError::NotCancellable { .. } => "not_cancellable",
            DomainError::TransactionFailure(_) => "transaction_failure",
            DomainError::Store(_) => "store",
        }
    }

    /// True for infrastructure failures the caller cannot act on.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            DomainError::TransactionFailure(_) | DomainError::Store(_)
        )
    }
}

fn join_ids(ids: &[ProductId]) -> String {
    ids.iter()
        .map(ProductId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
