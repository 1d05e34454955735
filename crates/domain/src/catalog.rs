//! Product catalog.

use common::{Actor, Money, Role};
use order_store::{NewProduct, OrderStore, Product};
use serde::Deserialize;

use crate::access::require_role;
use crate::error::DomainError;

/// Input for adding a product to the catalog.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateProduct {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Money,
    #[serde(default)]
    pub stock_quantity: i64,
    #[serde(default)]
    pub category: Option<String>,
}

/// Service for reading and extending the catalog.
pub struct CatalogService<S: OrderStore> {
    store: S,
}

impl<S: OrderStore> CatalogService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Lists every product, ordered by name. Requires no identity.
    #[tracing::instrument(skip(self))]
    pub async fn list_products(&self) -> Result<Vec<Product>, DomainError> {
        Ok(self.store.list_products().await?)
    }

    /// Adds a product. Admin only.
    #[tracing::instrument(skip(self, actor, input), fields(name = %input.name))]
    pub async fn create_product(
        &self,
        actor: Option<&Actor>,
        input: CreateProduct,
    ) -> Result<Product, DomainError> {
        require_role(actor, &[Role::Admin])?;

        let name = input.name.trim();
        if name.is_empty() {
            return Err(DomainError::InvalidRequest("name is required".to_string()));
        }
        if input.price.is_negative() {
            return Err(DomainError::InvalidRequest(
                "price must not be negative".to_string(),
            ));
        }
        if input.price > Money::MAX_STORED {
            return Err(DomainError::InvalidRequest("price is too large".to_string()));
        }
        // Stock lives in an INTEGER column.
        let stock_quantity = i32::try_from(input.stock_quantity)
            .ok()
            .and_then(|stock| u32::try_from(stock).ok())
            .ok_or_else(|| {
                DomainError::InvalidRequest(
                    "stock_quantity must be a non-negative integer".to_string(),
                )
            })?;

        let product = self
            .store
            .insert_product(NewProduct {
                name: name.to_string(),
                description: input.description,
                price: input.price,
                stock_quantity,
                category: input.category,
            })
            .await?;

        tracing::info!(product_id = %product.id, "Product created");
        Ok(product)
    }
}
