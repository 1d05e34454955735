//! Order service: placement transaction, queries and status lifecycle.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use common::{Actor, Money, OrderId, OrderStatus, ProductId, Role, UserId};
use order_store::{
    NewLineItem, NewOrder, Order, OrderDetails, OrderStore, OrderTransaction, ProductStock,
};

use crate::access::{require_actor, require_role};
use crate::error::DomainError;

use super::request::{NormalizedItem, PlaceOrder, normalize_items};

/// Service for placing and managing orders.
///
/// Holds the injected datastore handle. Every placement acquires its own
/// transaction and releases it on every exit path.
pub struct OrderService<S: OrderStore> {
    store: S,
}

impl<S: OrderStore> OrderService<S> {
    /// Creates a new order service over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Places an order for the acting customer.
    ///
    /// Access and input checks run before the datastore is touched. Product
    /// lookup, stock check, and all writes then happen in one transaction:
    /// on success exactly one order, its line items and the matching stock
    /// decrements are committed; on any failure nothing is.
    #[tracing::instrument(skip(self, actor, request), fields(actor = ?actor.map(|a| a.id)))]
    pub async fn place_order(
        &self,
        actor: Option<&Actor>,
        request: PlaceOrder,
    ) -> Result<Order, DomainError> {
        let started = Instant::now();
        let result = self.try_place_order(actor, request).await;
        metrics::histogram!("order_placement_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        match &result {
            Ok(order) => {
                metrics::counter!("orders_placed_total").increment(1);
                tracing::info!(
                    order_id = %order.id,
                    total_amount = %order.total_amount,
                    "Order placed"
                );
            }
            Err(err) => {
                metrics::counter!("order_placements_rejected_total", "reason" => err.kind())
                    .increment(1);
                if err.is_internal() {
                    tracing::error!(error = %err, "Order placement failed");
                } else {
                    tracing::info!(reason = err.kind(), error = %err, "Order rejected");
                }
            }
        }
        result
    }

    async fn try_place_order(
        &self,
        actor: Option<&Actor>,
        request: PlaceOrder,
    ) -> Result<Order, DomainError> {
        let actor = require_role(actor, &[Role::Customer])?;
        let items = normalize_items(&request.items)?;
        let shipping_address = request.shipping_address.unwrap_or_default();

        let mut tx = self
            .store
            .begin()
            .await
            .map_err(DomainError::TransactionFailure)?;

        match write_order(&mut tx, actor.id, &items, shipping_address).await {
            Ok(order) => {
                tx.commit().await.map_err(DomainError::TransactionFailure)?;
                Ok(order)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(error = %rollback_err, "Rollback failed");
                }
                Err(err)
            }
        }
    }

    /// Lists orders visible to the actor, newest first.
    ///
    /// Customers see their own orders; admins and managers see all.
    #[tracing::instrument(skip(self, actor), fields(actor = ?actor.map(|a| a.id)))]
    pub async fn list_orders(&self, actor: Option<&Actor>) -> Result<Vec<OrderDetails>, DomainError> {
        let actor = require_actor(actor)?;
        let owner = (!actor.sees_all_orders()).then_some(actor.id);
        Ok(self.store.list_orders(owner).await?)
    }

    /// Retrieves a single order with its line items.
    #[tracing::instrument(skip(self, actor), fields(actor = ?actor.map(|a| a.id)))]
    pub async fn get_order(
        &self,
        actor: Option<&Actor>,
        order_id: OrderId,
    ) -> Result<OrderDetails, DomainError> {
        let actor = require_actor(actor)?;
        let details = self.load(order_id).await?;
        if !actor.sees_all_orders() && details.order.user_id != actor.id {
            return Err(DomainError::Forbidden);
        }
        Ok(details)
    }

    /// Cancels one of the acting customer's pending orders.
    ///
    /// Stock taken by the order is not restored.
    #[tracing::instrument(skip(self, actor), fields(actor = ?actor.map(|a| a.id)))]
    pub async fn cancel_order(
        &self,
        actor: Option<&Actor>,
        order_id: OrderId,
    ) -> Result<Order, DomainError> {
        let actor = require_role(actor, &[Role::Customer])?;
        let current = self.load(order_id).await?.order;
        if current.user_id != actor.id {
            return Err(DomainError::Forbidden);
        }
        if !current.status.can_cancel() {
            return Err(DomainError::NotCancellable {
                current: current.status,
            });
        }

        match self
            .store
            .set_order_status(order_id, current.status, OrderStatus::Cancelled)
            .await?
        {
            Some(order) => {
                record_status_change(&order);
                Ok(order)
            }
            None => Err(DomainError::NotCancellable {
                current: self.load(order_id).await?.order.status,
            }),
        }
    }

    /// Moves an order to `status`, following the status state machine.
    #[tracing::instrument(skip(self, actor), fields(actor = ?actor.map(|a| a.id)))]
    pub async fn update_order_status(
        &self,
        actor: Option<&Actor>,
        order_id: OrderId,
        status: &str,
    ) -> Result<Order, DomainError> {
        require_role(actor, &[Role::Admin, Role::Manager])?;
        let requested: OrderStatus = status
            .parse()
            .map_err(|_| DomainError::InvalidRequest(format!("Invalid status: {status}")))?;

        let current = self.load(order_id).await?.order.status;
        if !current.can_transition_to(requested) {
            return Err(DomainError::InvalidStateTransition { current, requested });
        }

        match self
            .store
            .set_order_status(order_id, current, requested)
            .await?
        {
            Some(order) => {
                record_status_change(&order);
                Ok(order)
            }
            None => Err(DomainError::InvalidStateTransition {
                current: self.load(order_id).await?.order.status,
                requested,
            }),
        }
    }

    async fn load(&self, order_id: OrderId) -> Result<OrderDetails, DomainError> {
        self.store
            .get_order(order_id)
            .await?
            .ok_or(DomainError::OrderNotFound(order_id))
    }
}

fn record_status_change(order: &Order) {
    metrics::counter!("order_status_changes_total", "status" => order.status.as_str())
        .increment(1);
    tracing::info!(order_id = %order.id, status = %order.status, "Order status changed");
}

/// Validates the items against locked stock and writes the order.
///
/// Runs entirely inside `tx`; the caller commits or rolls back.
async fn write_order<T: OrderTransaction>(
    tx: &mut T,
    user_id: UserId,
    items: &[NormalizedItem],
    shipping_address: String,
) -> Result<Order, DomainError> {
    let mut seen = HashSet::new();
    let product_ids: Vec<ProductId> = items
        .iter()
        .filter(|item| seen.insert(&item.product_id))
        .map(|item| item.product_id.clone())
        .collect();

    let stock: HashMap<ProductId, ProductStock> = tx
        .fetch_stock(&product_ids)
        .await
        .map_err(DomainError::TransactionFailure)?
        .into_iter()
        .map(|row| (row.id.clone(), row))
        .collect();

    let missing: Vec<ProductId> = product_ids
        .into_iter()
        .filter(|id| !stock.contains_key(id))
        .collect();
    if !missing.is_empty() {
        return Err(DomainError::ProductNotFound {
            product_ids: missing,
        });
    }

    let mut total = Money::zero();
    for item in items {
        let product = &stock[&item.product_id];
        if item.quantity > product.stock_quantity {
            return Err(DomainError::InsufficientStock {
                product_id: item.product_id.clone(),
            });
        }
        total = product
            .price
            .checked_multiply(item.quantity)
            .and_then(|subtotal| total.checked_add(subtotal))
            .filter(|total| *total <= Money::MAX_STORED)
            .ok_or_else(|| DomainError::InvalidRequest("Order total is too large".to_string()))?;
    }

    let order = tx
        .insert_order(NewOrder {
            user_id,
            total_amount: total,
            shipping_address,
        })
        .await
        .map_err(DomainError::TransactionFailure)?;

    for item in items {
        tx.insert_line_item(NewLineItem {
            order_id: order.id,
            product_id: item.product_id.clone(),
            quantity: item.quantity,
            unit_price: stock[&item.product_id].price,
        })
        .await
        .map_err(DomainError::TransactionFailure)?;

        let decremented = tx
            .decrement_stock(&item.product_id, item.quantity)
            .await
            .map_err(DomainError::TransactionFailure)?;
        if !decremented {
            // Duplicate lines for one product can jointly exceed its stock.
            return Err(DomainError::InsufficientStock {
                product_id: item.product_id.clone(),
            });
        }
    }

    Ok(order)
}
