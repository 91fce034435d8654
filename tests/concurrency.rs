mod common;

use std::sync::Arc;

use common::{create_customer, create_product, create_user, order_request, shared_state, stock_of};
use erp_crm_api::{
    dto::invoices::CreateInvoiceRequest,
    entity::{Customers, invoices},
    error::AppError,
    policy::Role,
    services::{invoice_service, order_service},
};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use tokio::{sync::Barrier, task::JoinSet};

// Run with TEST_DATABASE_URL pointing at PostgreSQL; the pool hands each task
// its own connection so the transactions really overlap.

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_orders_never_oversell() -> anyhow::Result<()> {
    let Some(state) = shared_state().await? else {
        return Ok(());
    };
    const BUYERS: usize = 8;
    const STOCK: i32 = 3;
    let product = create_product(&state, 700, STOCK).await?;

    let barrier = Arc::new(Barrier::new(BUYERS));
    let mut tasks = JoinSet::new();
    for _ in 0..BUYERS {
        let (user, customer_id) = create_customer(&state).await?;
        let state = state.clone();
        let barrier = barrier.clone();
        tasks.spawn(async move {
            barrier.wait().await;
            order_service::place_order(&state, &user, order_request(customer_id, &[(product, 1)]))
                .await
        });
    }

    let mut placed = 0;
    let mut short = 0;
    while let Some(outcome) = tasks.join_next().await {
        match outcome? {
            Ok(_) => placed += 1,
            Err(AppError::InsufficientStock { .. }) => short += 1,
            Err(other) => return Err(other.into()),
        }
    }

    assert_eq!(placed, STOCK as usize);
    assert_eq!(short, BUYERS - STOCK as usize);
    assert_eq!(stock_of(&state, product).await?, 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_invoicing_bills_an_order_once() -> anyhow::Result<()> {
    let Some(state) = shared_state().await? else {
        return Ok(());
    };
    const CLERKS: usize = 4;
    let finance = create_user(&state, Role::Finance).await?;
    let (customer, customer_id) = create_customer(&state).await?;
    let product = create_product(&state, 900, 5).await?;
    let order = order_service::place_order(&state, &customer, order_request(customer_id, &[(product, 2)]))
        .await?
        .data
        .expect("order data")
        .order;

    let order_id = order.id;
    let barrier = Arc::new(Barrier::new(CLERKS));
    let mut tasks = JoinSet::new();
    for _ in 0..CLERKS {
        let state = state.clone();
        let finance = finance.clone();
        let barrier = barrier.clone();
        tasks.spawn(async move {
            barrier.wait().await;
            invoice_service::create_invoice(
                &state,
                &finance,
                CreateInvoiceRequest {
                    order_id: Some(order_id),
                    ..Default::default()
                },
            )
            .await
        });
    }

    let mut created = 0;
    while let Some(outcome) = tasks.join_next().await {
        match outcome? {
            Ok(_) => created += 1,
            Err(AppError::Validation(_)) => {}
            Err(other) => return Err(other.into()),
        }
    }
    assert_eq!(created, 1);

    let live = invoices::Entity::find()
        .filter(invoices::Column::OrderId.eq(order_id))
        .count(&state.orm)
        .await?;
    assert_eq!(live, 1);
    let balance = Customers::find_by_id(customer_id)
        .one(&state.orm)
        .await?
        .map(|c| c.balance);
    assert_eq!(balance, Some(order.grand_total));
    Ok(())
}
