//! Catalog endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use common::Role;
use domain::CreateProduct;
use domain::access::require_role;
use order_store::{OrderStore, Product};
use serde::Serialize;

use crate::auth::CurrentActor;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Serialize)]
pub struct ProductCreatedResponse {
    pub message: &'static str,
    pub product: Product,
}

/// GET /api/products: the catalog, ordered by name. Public.
#[tracing::instrument(skip(state))]
pub async fn list<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<Product>>, ApiError> {
    Ok(Json(state.catalog_service.list_products().await?))
}

/// POST /api/products: add a product. Admin only.
#[tracing::instrument(skip(state, actor, body))]
pub async fn create<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    actor: CurrentActor,
    body: Result<Json<CreateProduct>, JsonRejection>,
) -> Result<(StatusCode, Json<ProductCreatedResponse>), ApiError> {
    let input = match body {
        Ok(Json(input)) => input,
        Err(rejection) => {
            require_role(actor.actor(), &[Role::Admin])?;
            return Err(ApiError::BadRequest(rejection.body_text()));
        }
    };

    let product = state
        .catalog_service
        .create_product(actor.actor(), input)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ProductCreatedResponse {
            message: "Product created successfully",
            product,
        }),
    ))
}
