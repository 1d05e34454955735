//! Placement requests and item normalization.

use common::ProductId;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::DomainError;

/// A customer's request to place an order, as received from the client.
///
/// `items` is kept as raw JSON: it is coerced by [`normalize_items`], which
/// drops malformed entries instead of rejecting the whole body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlaceOrder {
    #[serde(default)]
    pub items: Value,
    #[serde(default)]
    pub shipping_address: Option<String>,
}

impl PlaceOrder {
    /// Builds a request from `(product, quantity)` pairs.
    pub fn with_items<I, P>(items: I) -> Self
    where
        I: IntoIterator<Item = (P, u32)>,
        P: Into<ProductId>,
    {
        let items = items
            .into_iter()
            .map(|(product_id, quantity)| {
                let product_id: ProductId = product_id.into();
                json!({ "product_id": product_id, "quantity": quantity })
            })
            .collect();

        Self {
            items: Value::Array(items),
            shipping_address: None,
        }
    }

    /// Sets the shipping address.
    pub fn shipping_to(mut self, address: impl Into<String>) -> Self {
        self.shipping_address = Some(address.into());
        self
    }
}

/// A requested line after coercion and positivity filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedItem {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Coerces the raw `items` value into normalized lines.
///
/// Entries without a usable product id or with a quantity that is not a
/// positive whole number are dropped. A boolean quantity counts as 1 or 0. Fails when `items` is not a non-empty
/// array, or when nothing survives normalization.
pub fn normalize_items(items: &Value) -> Result<Vec<NormalizedItem>, DomainError> {
    let entries = match items {
        Value::Array(entries) if !entries.is_empty() => entries,
        _ => return Err(DomainError::InvalidRequest("items are required".to_string())),
    };

    let normalized: Vec<NormalizedItem> = entries
        .iter()
        .filter_map(|entry| {
            Some(NormalizedItem {
                product_id: coerce_product_id(entry.get("product_id")?)?,
                quantity: coerce_quantity(entry.get("quantity")?)?,
            })
        })
        .collect();

    if normalized.is_empty() {
        return Err(DomainError::InvalidRequest("Invalid items".to_string()));
    }
    Ok(normalized)
}

fn coerce_product_id(value: &Value) -> Option<ProductId> {
    match value {
        Value::String(s) if !s.is_empty() => Some(ProductId::new(s.as_str())),
        Value::Number(n) if n.as_f64().is_some_and(|f| f != 0.0) => {
            Some(ProductId::new(n.to_string()))
        }
        // Names no product; placement reports it as not found.
        Value::Bool(true) => Some(ProductId::new("true")),
        _ => None,
    }
}

fn coerce_quantity(value: &Value) -> Option<u32> {
    let quantity = match value {
        Value::Number(n) => n.as_f64()?,
        Value::Bool(flag) => f64::from(u8::from(*flag)),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            s.parse::<f64>().ok()?
        }
        _ => return None,
    };

    let whole = quantity.is_finite() && quantity > 0.0 && quantity.fract() == 0.0;
    if whole && quantity <= f64::from(u32::MAX) {
        Some(quantity as u32)
    } else {
        None
    }
}
