use std::collections::HashMap;

use async_trait::async_trait;
use common::{Money, OrderId, OrderStatus, ProductId, UserId};
use sqlx::{PgPool, Postgres, Row, postgres::PgPoolOptions, postgres::PgRow};
use uuid::Uuid;

use crate::{
    NewLineItem, NewOrder, NewProduct, Order, OrderDetails, OrderLine, OrderLineItem, Product,
    ProductStock, Result, StoreError,
    store::{OrderStore, OrderTransaction},
};

// Amounts live in NUMERIC(12,2) columns and cross the wire as integer cents.
const PRODUCT_COLUMNS: &str = "id::TEXT AS id, name, description, \
    (price * 100)::BIGINT AS price_cents, stock_quantity, category, created_at";

const ORDER_COLUMNS: &str = "id, user_id, (total_amount * 100)::BIGINT AS total_cents, \
    status, shipping_address, created_at";

/// PostgreSQL-backed order store implementation.
#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    /// Creates a new PostgreSQL order store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects a pool of at most `max_connections` to `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        tracing::debug!(max_connections, "connected to PostgreSQL");
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        tracing::info!("database migrations applied");
        Ok(())
    }
}

fn parse_product_id(product_id: &ProductId) -> Option<Uuid> {
    Uuid::parse_str(product_id.as_str()).ok()
}

fn to_stock(column: &'static str, value: i32) -> Result<u32> {
    u32::try_from(value).map_err(|e| StoreError::decode(column, e))
}

fn row_to_product(row: PgRow) -> Result<Product> {
    Ok(Product {
        id: ProductId::new(row.try_get::<String, _>("id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        price: Money::from_cents(row.try_get("price_cents")?),
        stock_quantity: to_stock("stock_quantity", row.try_get("stock_quantity")?)?,
        category: row.try_get("category")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_stock(row: PgRow) -> Result<ProductStock> {
    Ok(ProductStock {
        id: ProductId::new(row.try_get::<String, _>("id")?),
        price: Money::from_cents(row.try_get("price_cents")?),
        stock_quantity: to_stock("stock_quantity", row.try_get("stock_quantity")?)?,
    })
}

fn row_to_order(row: &PgRow) -> Result<Order> {
    let status: String = row.try_get("status")?;
    Ok(Order {
        id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
        user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
        total_amount: Money::from_cents(row.try_get("total_cents")?),
        status: status
            .parse::<OrderStatus>()
            .map_err(|e| StoreError::decode("status", e))?,
        shipping_address: row.try_get("shipping_address")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_line(row: &PgRow) -> Result<OrderLine> {
    Ok(OrderLine {
        id: row.try_get("id")?,
        product_id: ProductId::new(row.try_get::<String, _>("product_id")?),
        product_name: row.try_get("product_name")?,
        quantity: to_stock("quantity", row.try_get("quantity")?)?,
        unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
    })
}

impl PostgresOrderStore {
    /// Loads the line items of the given orders, grouped by order.
    async fn lines_for(&self, order_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<OrderLine>>> {
        let rows = sqlx::query(
            r#"
            SELECT oi.id, oi.order_id, oi.product_id::TEXT AS product_id, p.name AS product_name,
                   oi.quantity, (oi.unit_price * 100)::BIGINT AS unit_price_cents
            FROM order_items oi
            LEFT JOIN products p ON p.id = oi.product_id
            WHERE oi.order_id = ANY($1)
            ORDER BY oi.created_at ASC
            "#,
        )
        .bind(order_ids.to_vec())
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<Uuid, Vec<OrderLine>> = HashMap::new();
        for row in &rows {
            let order_id: Uuid = row.try_get("order_id")?;
            grouped.entry(order_id).or_default().push(row_to_line(row)?);
        }
        Ok(grouped)
    }
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    type Transaction = PostgresTransaction;

    async fn begin(&self) -> Result<PostgresTransaction> {
        let tx = self.pool.begin().await?;
        Ok(PostgresTransaction { tx })
    }

    async fn list_products(&self) -> Result<Vec<Product>> {
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY name ASC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_product).collect()
    }

    async fn insert_product(&self, product: NewProduct) -> Result<Product> {
        let stock = i32::try_from(product.stock_quantity)
            .map_err(|e| StoreError::decode("stock_quantity", e))?;

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO products (id, name, description, price, stock_quantity, category)
            VALUES ($1, $2, $3, $4::BIGINT / 100.0, $5, $6)
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price.cents())
        .bind(stock)
        .bind(&product.category)
        .fetch_one(&self.pool)
        .await?;

        row_to_product(row)
    }

    async fn list_orders(&self, owner: Option<UserId>) -> Result<Vec<OrderDetails>> {
        let rows = match owner {
            Some(owner) => {
                sqlx::query(&format!(
                    "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC"
                ))
                .bind(owner.as_uuid())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC"
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };

        let orders = rows.iter().map(row_to_order).collect::<Result<Vec<_>>>()?;
        let ids: Vec<Uuid> = orders.iter().map(|o| o.id.as_uuid()).collect();
        let mut lines = self.lines_for(&ids).await?;

        Ok(orders
            .into_iter()
            .map(|order| {
                let items = lines.remove(&order.id.as_uuid()).unwrap_or_default();
                OrderDetails { order, items }
            })
            .collect())
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<OrderDetails>> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(order_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let order = row_to_order(&row)?;
        let items = self
            .lines_for(&[order_id.as_uuid()])
            .await?
            .remove(&order_id.as_uuid())
            .unwrap_or_default();

        Ok(Some(OrderDetails { order, items }))
    }

    async fn set_order_status(
        &self,
        order_id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<Option<Order>> {
        let row = sqlx::query(&format!(
            "UPDATE orders SET status = $1 WHERE id = $2 AND status = $3 RETURNING {ORDER_COLUMNS}"
        ))
        .bind(to.as_str())
        .bind(order_id.as_uuid())
        .bind(from.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_order).transpose()
    }
}

/// Transaction handle of [`PostgresOrderStore`].
///
/// Wraps a pooled connection with an open `BEGIN`; sqlx rolls it back and
/// returns the connection to the pool if the handle is dropped uncommitted.
pub struct PostgresTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl OrderTransaction for PostgresTransaction {
    async fn fetch_stock(&mut self, product_ids: &[ProductId]) -> Result<Vec<ProductStock>> {
        // Ids that are not UUIDs cannot name a product and are reported absent.
        let ids: Vec<Uuid> = product_ids.iter().filter_map(parse_product_id).collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        // Locking in id order keeps concurrent placements from deadlocking.
        let rows = sqlx::query(
            r#"
            SELECT id::TEXT AS id, (price * 100)::BIGINT AS price_cents, stock_quantity
            FROM products
            WHERE id = ANY($1)
            ORDER BY id
            FOR UPDATE
            "#,
        )
        .bind(ids)
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(row_to_stock).collect()
    }

    async fn insert_order(&mut self, order: NewOrder) -> Result<Order> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO orders (id, user_id, total_amount, status, shipping_address)
            VALUES ($1, $2, $3::BIGINT / 100.0, $4, $5)
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(order.user_id.as_uuid())
        .bind(order.total_amount.cents())
        .bind(OrderStatus::Pending.as_str())
        .bind(&order.shipping_address)
        .fetch_one(&mut *self.tx)
        .await?;

        row_to_order(&row)
    }

    async fn insert_line_item(&mut self, item: NewLineItem) -> Result<OrderLineItem> {
        let quantity =
            i32::try_from(item.quantity).map_err(|e| StoreError::decode("quantity", e))?;
        let id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO order_items (id, order_id, product_id, quantity, unit_price)
            VALUES ($1, $2, $3::UUID, $4, $5::BIGINT / 100.0)
            "#,
        )
        .bind(id)
        .bind(item.order_id.as_uuid())
        .bind(item.product_id.as_str())
        .bind(quantity)
        .bind(item.unit_price.cents())
        .execute(&mut *self.tx)
        .await?;

        Ok(OrderLineItem {
            id,
            order_id: item.order_id,
            product_id: item.product_id,
            quantity: item.quantity,
            unit_price: item.unit_price,
        })
    }

    async fn decrement_stock(&mut self, product_id: &ProductId, quantity: u32) -> Result<bool> {
        // Stock is an INTEGER column; anything larger can never be covered.
        let Ok(quantity) = i32::try_from(quantity) else {
            return Ok(false);
        };
        let Some(id) = parse_product_id(product_id) else {
            return Ok(false);
        };

        let result = sqlx::query(
            r#"
            UPDATE products
            SET stock_quantity = stock_quantity - $1
            WHERE id = $2 AND stock_quantity >= $1
            "#,
        )
        .bind(quantity)
        .bind(id)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
