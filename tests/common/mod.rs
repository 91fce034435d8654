#![allow(dead_code)]

use chrono::Utc;
use erp_crm_api::{
    config::AppConfig,
    db::{create_orm_conn, run_migrations},
    domain::order::StatusPolicy,
    dto::orders::{LineItemRequest, PlaceOrderRequest},
    entity::{
        ActivityLogs, Products, activity_logs, customers, products,
        users::ActiveModel as UserActive,
    },
    middleware::auth::AuthUser,
    policy::Role,
    state::AppState,
};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use uuid::Uuid;

pub async fn setup_state() -> anyhow::Result<AppState> {
    setup_state_with(StatusPolicy::Strict).await
}

pub async fn setup_state_with(policy: StatusPolicy) -> anyhow::Result<AppState> {
    let mut config = AppConfig::for_database("sqlite::memory:");
    config.status_policy = policy;
    let orm = create_orm_conn(&config.database_url).await?;
    run_migrations(&orm).await?;
    AppState::new(orm, config)
}

/// State over a real database with a multi-connection pool, for tests that
/// need transactions to actually overlap. `None` when no database is
/// configured.
pub async fn shared_state() -> anyhow::Result<Option<AppState>> {
    let Ok(database_url) = std::env::var("TEST_DATABASE_URL") else {
        eprintln!("Skipping test: set TEST_DATABASE_URL to a PostgreSQL database to run it.");
        return Ok(None);
    };
    let config = AppConfig::for_database(&database_url);
    let orm = create_orm_conn(&config.database_url).await?;
    run_migrations(&orm).await?;
    Ok(Some(AppState::new(orm, config)?))
}

pub async fn create_user(state: &AppState, role: Role) -> anyhow::Result<AuthUser> {
    let id = Uuid::new_v4();
    UserActive {
        id: Set(id),
        email: Set(format!("{role}-{}@example.com", id.simple())),
        password_hash: Set("dummy".into()),
        role: Set(role.to_string()),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await?;

    Ok(AuthUser { user_id: id, role })
}

/// A customer-role user together with its customer record.
pub async fn create_customer(state: &AppState) -> anyhow::Result<(AuthUser, Uuid)> {
    let user = create_user(state, Role::Customer).await?;
    let customer = customers::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        customer_code: Set(format!("CUST-{}", Uuid::new_v4().simple())),
        customer_type: Set("regular".into()),
        billing_address: Set("1 Billing Road".into()),
        shipping_address: Set("1 Shipping Lane".into()),
        credit_limit: Set(0),
        balance: Set(0),
        tax_number: Set(String::new()),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await?;

    Ok((user, customer.id))
}

pub async fn create_product(state: &AppState, price: i64, stock: i32) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();
    products::ActiveModel {
        id: Set(id),
        sku: Set(format!("SKU-{}", id.simple())),
        name: Set("Test Widget".into()),
        description: Set(Some("A product for testing".into())),
        category_id: Set(None),
        price: Set(price),
        stock_quantity: Set(stock),
        min_stock_level: Set(2),
        is_active: Set(true),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await?;
    Ok(id)
}

pub async fn stock_of(state: &AppState, product_id: Uuid) -> anyhow::Result<i32> {
    let product = Products::find_by_id(product_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| anyhow::anyhow!("product {product_id} vanished"))?;
    Ok(product.stock_quantity)
}

pub async fn activity_for(
    state: &AppState,
    action: &str,
    record_id: Uuid,
) -> anyhow::Result<Vec<activity_logs::Model>> {
    Ok(ActivityLogs::find()
        .filter(activity_logs::Column::Action.eq(action))
        .filter(activity_logs::Column::RecordId.eq(record_id))
        .order_by_asc(activity_logs::Column::CreatedAt)
        .all(&state.orm)
        .await?)
}

pub fn order_request(customer_id: Uuid, lines: &[(Uuid, i32)]) -> PlaceOrderRequest {
    PlaceOrderRequest {
        customer_id,
        lines: lines
            .iter()
            .map(|(product_id, quantity)| LineItemRequest {
                product_id: *product_id,
                quantity: *quantity,
            })
            .collect(),
        shipping_address: "42 Depot Street".into(),
        billing_address: None,
        payment_method: "cash_on_delivery".into(),
        tax_amount: 0,
        discount_amount: 0,
        notes: None,
    }
}
