//! Rows as the store hands them out, and the inputs it accepts.

use chrono::{DateTime, Utc};
use common::{Money, OrderId, OrderStatus, ProductId, UserId};
use serde::Serialize;
use uuid::Uuid;

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    pub price: Money,
    pub stock_quantity: u32,
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub price: Money,
    pub stock_quantity: u32,
    pub category: Option<String>,
}

/// Price and stock of a product as read inside a placement transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductStock {
    pub id: ProductId,
    pub price: Money,
    pub stock_quantity: u32,
}

/// An order header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    /// Sum of `quantity * unit_price` over the line items, fixed at creation.
    pub total_amount: Money,
    pub status: OrderStatus,
    pub shipping_address: String,
    pub created_at: DateTime<Utc>,
}

/// Input for inserting an order header. New orders always start `pending`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub user_id: UserId,
    pub total_amount: Money,
    pub shipping_address: String,
}

/// A persisted line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderLineItem {
    pub id: Uuid,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: u32,
    /// Price snapshot taken when the order was placed.
    pub unit_price: Money,
}

/// Input for inserting a line item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLineItem {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Money,
}

/// A line item joined with its product's current name, for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderLine {
    pub id: Uuid,
    pub product_id: ProductId,
    /// `None` if the product has since been removed from the catalog.
    pub product_name: Option<String>,
    pub quantity: u32,
    pub unit_price: Money,
}

/// An order header together with its line items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderLine>,
}

impl OrderDetails {
    /// Recomputes the total from the line items' price snapshots.
    pub fn line_total(&self) -> Option<Money> {
        self.items.iter().try_fold(Money::zero(), |acc, line| {
            line.unit_price
                .checked_multiply(line.quantity)
                .and_then(|subtotal| acc.checked_add(subtotal))
        })
    }
}
