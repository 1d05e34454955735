//! Shared application state.

use std::sync::Arc;

use axum::extract::FromRef;
use domain::{CatalogService, OrderService};
use order_store::OrderStore;

use crate::auth::TokenVerifier;

/// Shared application state accessible from all handlers.
pub struct AppState<S: OrderStore> {
    pub order_service: OrderService<S>,
    pub catalog_service: CatalogService<S>,
    pub tokens: TokenVerifier,
}

impl<S: OrderStore + Clone> AppState<S> {
    /// Builds the services over one shared store.
    pub fn new(store: S, tokens: TokenVerifier) -> Self {
        Self {
            order_service: OrderService::new(store.clone()),
            catalog_service: CatalogService::new(store),
            tokens,
        }
    }
}

impl<S: OrderStore> FromRef<Arc<AppState<S>>> for TokenVerifier {
    fn from_ref(state: &Arc<AppState<S>>) -> Self {
        state.tokens.clone()
    }
}
