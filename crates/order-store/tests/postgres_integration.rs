//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p order-store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use order_store::{
    Money, NewLineItem, NewOrder, NewProduct, OrderStatus, OrderStore, OrderTransaction,
    PostgresOrderStore, Product, ProductId, UserId,
};
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            // Create a temporary pool just for migrations
            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            PostgresOrderStore::new(temp_pool.clone())
                .run_migrations()
                .await
                .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresOrderStore {
    let info = get_container_info().await;

    let store = PostgresOrderStore::connect(&info.connection_string, 10)
        .await
        .unwrap();

    // Clear tables for test isolation
    sqlx::query("TRUNCATE TABLE order_items, orders, products")
        .execute(store.pool())
        .await
        .unwrap();

    store
}

async fn seed(store: &PostgresOrderStore, name: &str, cents: i64, stock: u32) -> Product {
    store
        .insert_product(NewProduct {
            name: name.to_string(),
            description: Some(format!("{name} description")),
            price: Money::from_cents(cents),
            stock_quantity: stock,
            category: None,
        })
        .await
        .unwrap()
}

async fn stock_of(store: &PostgresOrderStore, product_id: &ProductId) -> u32 {
    store
        .list_products()
        .await
        .unwrap()
        .into_iter()
        .find(|p| &p.id == product_id)
        .unwrap()
        .stock_quantity
}

fn new_order(user_id: UserId, cents: i64) -> NewOrder {
    NewOrder {
        user_id,
        total_amount: Money::from_cents(cents),
        shipping_address: "42 Harbour Rd".to_string(),
    }
}

#[tokio::test]
async fn insert_and_list_products_preserves_exact_prices() {
    let store = get_test_store().await;
    let widget = seed(&store, "Widget", 1999, 5).await;
    seed(&store, "Anvil", 10, 1).await;

    assert_eq!(widget.price, Money::from_cents(1999));

    let products = store.list_products().await.unwrap();
    assert_eq!(products.len(), 2);
    assert_eq!(products[0].name, "Anvil");
    assert_eq!(products[1].price.to_string(), "19.99");
    assert_eq!(products[1], widget);
}

#[tokio::test]
async fn committed_placement_is_visible() {
    let store = get_test_store().await;
    let product = seed(&store, "Widget", 1000, 5).await;
    let user = UserId::new();

    let mut tx = store.begin().await.unwrap();
    let stock = tx.fetch_stock(&[product.id.clone()]).await.unwrap();
    assert_eq!(stock[0].stock_quantity, 5);

    let order = tx.insert_order(new_order(user, 3000)).await.unwrap();
    tx.insert_line_item(NewLineItem {
        order_id: order.id,
        product_id: product.id.clone(),
        quantity: 3,
        unit_price: stock[0].price,
    })
    .await
    .unwrap();
    assert!(tx.decrement_stock(&product.id, 3).await.unwrap());
    tx.commit().await.unwrap();

    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.total_amount, Money::from_cents(3000));

    let details = store.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(details.items.len(), 1);
    assert_eq!(details.items[0].product_name.as_deref(), Some("Widget"));
    assert_eq!(details.line_total(), Some(details.order.total_amount));

    assert_eq!(stock_of(&store, &product.id).await, 2);
}

#[tokio::test]
async fn rolled_back_placement_leaves_no_trace() {
    let store = get_test_store().await;
    let product = seed(&store, "Widget", 1000, 5).await;

    let mut tx = store.begin().await.unwrap();
    let order = tx.insert_order(new_order(UserId::new(), 1000)).await.unwrap();
    tx.insert_line_item(NewLineItem {
        order_id: order.id,
        product_id: product.id.clone(),
        quantity: 1,
        unit_price: product.price,
    })
    .await
    .unwrap();
    assert!(tx.decrement_stock(&product.id, 1).await.unwrap());
    tx.rollback().await.unwrap();

    assert!(store.get_order(order.id).await.unwrap().is_none());
    assert!(store.list_orders(None).await.unwrap().is_empty());
    assert_eq!(stock_of(&store, &product.id).await, 5);
}

#[tokio::test]
async fn guarded_decrement_never_goes_negative() {
    let store = get_test_store().await;
    let product = seed(&store, "Widget", 1000, 2).await;

    let mut tx = store.begin().await.unwrap();
    assert!(!tx.decrement_stock(&product.id, 3).await.unwrap());
    assert!(tx.decrement_stock(&product.id, 2).await.unwrap());
    assert!(!tx.decrement_stock(&product.id, 1).await.unwrap());
    tx.commit().await.unwrap();

    assert_eq!(stock_of(&store, &product.id).await, 0);
}

#[tokio::test]
async fn fetch_stock_ignores_unknown_and_malformed_ids() {
    let store = get_test_store().await;
    let product = seed(&store, "Widget", 1000, 2).await;

    let unknown = ProductId::new(uuid::Uuid::new_v4().to_string());

    let mut tx = store.begin().await.unwrap();
    let rows = tx
        .fetch_stock(&[product.id.clone(), ProductId::new("nonexistent"), unknown])
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, product.id);

    assert!(
        tx.fetch_stock(&[ProductId::new("nonexistent")])
            .await
            .unwrap()
            .is_empty()
    );
    assert!(
        !tx.decrement_stock(&ProductId::new("nonexistent"), 1)
            .await
            .unwrap()
    );
    tx.rollback().await.unwrap();

    assert_eq!(stock_of(&store, &product.id).await, 2);
}

#[tokio::test]
async fn concurrent_decrements_do_not_oversell() {
    let store = get_test_store().await;
    let product = seed(&store, "Widget", 1000, 5).await;

    let attempts = (0..10).map(|_| {
        let store = store.clone();
        let product_id = product.id.clone();
        async move {
            let mut tx = store.begin().await.unwrap();
            let stock = tx.fetch_stock(&[product_id.clone()]).await.unwrap();
            if stock[0].stock_quantity < 1 || !tx.decrement_stock(&product_id, 1).await.unwrap() {
                tx.rollback().await.unwrap();
                return false;
            }
            tx.commit().await.unwrap();
            true
        }
    });
    let succeeded = futures_util::future::join_all(attempts)
        .await
        .into_iter()
        .filter(|ok| *ok)
        .count();

    assert_eq!(succeeded, 5);
    assert_eq!(stock_of(&store, &product.id).await, 0);
}

#[tokio::test]
async fn list_orders_scopes_by_owner() {
    let store = get_test_store().await;
    let alice = UserId::new();
    let bob = UserId::new();

    for owner in [alice, bob, alice] {
        let mut tx = store.begin().await.unwrap();
        tx.insert_order(new_order(owner, 500)).await.unwrap();
        tx.commit().await.unwrap();
    }

    assert_eq!(store.list_orders(None).await.unwrap().len(), 3);
    let mine = store.list_orders(Some(alice)).await.unwrap();
    assert_eq!(mine.len(), 2);
    assert!(mine.iter().all(|o| o.order.user_id == alice));
    assert!(mine[0].order.created_at >= mine[1].order.created_at);
}

#[tokio::test]
async fn set_order_status_only_moves_from_expected_status() {
    let store = get_test_store().await;

    let mut tx = store.begin().await.unwrap();
    let order = tx.insert_order(new_order(UserId::new(), 500)).await.unwrap();
    tx.commit().await.unwrap();

    let moved = store
        .set_order_status(order.id, OrderStatus::Pending, OrderStatus::Processing)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(moved.status, OrderStatus::Processing);

    let stale = store
        .set_order_status(order.id, OrderStatus::Pending, OrderStatus::Cancelled)
        .await
        .unwrap();
    assert!(stale.is_none());

    let details = store.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(details.order.status, OrderStatus::Processing);
}
