//! Order placement and lifecycle endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{Actor, OrderId, Role};
use domain::access::{require_actor, require_role};
use domain::{DomainError, PlaceOrder};
use order_store::{Order, OrderDetails, OrderStore};
use serde::{Deserialize, Serialize};

use crate::auth::CurrentActor;
use crate::error::ApiError;
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    #[serde(default)]
    pub status: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderMessageResponse {
    pub message: &'static str,
    pub order: Order,
}

// -- Handlers --

/// POST /api/orders: place an order for the calling customer.
#[tracing::instrument(skip(state, actor, body))]
pub async fn create<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    actor: CurrentActor,
    body: Result<Json<PlaceOrder>, JsonRejection>,
) -> Result<(StatusCode, Json<OrderMessageResponse>), ApiError> {
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            require_role(actor.actor(), &[Role::Customer]).map_err(ApiError::placement)?;
            return Err(ApiError::BadRequest(rejection.body_text()));
        }
    };

    let order = state
        .order_service
        .place_order(actor.actor(), request)
        .await
        .map_err(ApiError::placement)?;

    Ok((
        StatusCode::CREATED,
        Json(OrderMessageResponse {
            message: "Order created successfully",
            order,
        }),
    ))
}

/// GET /api/orders: list the orders visible to the caller.
#[tracing::instrument(skip(state, actor))]
pub async fn list<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    actor: CurrentActor,
) -> Result<Json<Vec<OrderDetails>>, ApiError> {
    Ok(Json(state.order_service.list_orders(actor.actor()).await?))
}

/// GET /api/orders/{id}: a single order with its line items.
#[tracing::instrument(skip(state, actor))]
pub async fn get<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    actor: CurrentActor,
    Path(id): Path<String>,
) -> Result<Json<OrderDetails>, ApiError> {
    let order_id = parse_order_id(&id, require_actor(actor.actor()))?;
    Ok(Json(
        state.order_service.get_order(actor.actor(), order_id).await?,
    ))
}

/// PUT /api/orders/{id}/cancel: cancel one of the caller's pending orders.
#[tracing::instrument(skip(state, actor))]
pub async fn cancel<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    actor: CurrentActor,
    Path(id): Path<String>,
) -> Result<Json<OrderMessageResponse>, ApiError> {
    let order_id = parse_order_id(&id, require_role(actor.actor(), &[Role::Customer]))?;
    let order = state
        .order_service
        .cancel_order(actor.actor(), order_id)
        .await?;

    Ok(Json(OrderMessageResponse {
        message: "Order cancelled",
        order,
    }))
}

/// PUT /api/orders/{id}/status: move an order along its lifecycle.
#[tracing::instrument(skip(state, actor, body))]
pub async fn update_status<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    actor: CurrentActor,
    Path(id): Path<String>,
    body: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Json<OrderMessageResponse>, ApiError> {
    let staff = require_role(actor.actor(), &[Role::Admin, Role::Manager]);
    let order_id = parse_order_id(&id, staff)?;
    let Json(request) = body.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

    let order = state
        .order_service
        .update_order_status(actor.actor(), order_id, &request.status)
        .await?;

    Ok(Json(OrderMessageResponse {
        message: "Order status updated successfully",
        order,
    }))
}

/// Parses an order id from the path once the caller has passed `access`.
fn parse_order_id(raw: &str, access: Result<&Actor, DomainError>) -> Result<OrderId, ApiError> {
    access?;
    let uuid = uuid::Uuid::parse_str(raw)
        .map_err(|_| ApiError::BadRequest(format!("Invalid order id: {raw}")))?;
    Ok(OrderId::from_uuid(uuid))
}
