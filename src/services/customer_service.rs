use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    audit::{self, AuditEntry},
    domain::{
        crm::CustomerType,
        numbering::{self, document_number},
        parse_field,
    },
    dto::customers::{CreateCustomerRequest, CustomerList, UpdateCustomerRequest},
    entity::{
        Users,
        customers::{ActiveModel, Column, Entity as Customers, Model as CustomerModel},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Customer, convert_all},
    policy::{self, Action, Resource},
    response::{ApiResponse, Meta},
    routes::params::{CustomerQuery, Pagination},
    state::AppState,
};

/// Insert the customer record for `user_id`. Shared by staff creation and
/// self-registration.
pub(crate) async fn insert_customer<C>(
    conn: &C,
    user_id: Uuid,
    customer_type: CustomerType,
    billing_address: String,
    shipping_address: String,
    credit_limit: i64,
    tax_number: String,
) -> AppResult<CustomerModel>
where
    C: ConnectionTrait,
{
    let existing = Customers::find()
        .filter(Column::UserId.eq(user_id))
        .one(conn)
        .await?;
    if existing.is_some() {
        return Err(AppError::Validation(format!(
            "user {user_id} already has a customer record"
        )));
    }

    let customer = ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        customer_code: Set(document_number(numbering::CUSTOMER)),
        customer_type: Set(customer_type.to_string()),
        billing_address: Set(billing_address),
        shipping_address: Set(shipping_address),
        credit_limit: Set(credit_limit),
        balance: Set(0),
        tax_number: Set(tax_number),
        created_at: Set(Utc::now().into()),
    }
    .insert(conn)
    .await?;
    Ok(customer)
}

pub async fn create_customer(
    state: &AppState,
    user: &AuthUser,
    payload: CreateCustomerRequest,
) -> AppResult<ApiResponse<Customer>> {
    policy::authorize(Some(user), Action::Create, Resource::Customer { owner: None })?;
    payload.validate()?;
    let customer_type = match payload.customer_type.as_deref() {
        Some(raw) => parse_field("customer_type", raw)?,
        None => CustomerType::Regular,
    };

    let txn = state.orm.begin().await?;
    Users::find_by_id(payload.user_id)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::not_found("User", payload.user_id))?;

    let customer = insert_customer(
        &txn,
        payload.user_id,
        customer_type,
        payload.billing_address,
        payload.shipping_address,
        payload.credit_limit.unwrap_or(0),
        payload.tax_number,
    )
    .await?;

    audit::enqueue(
        &txn,
        AuditEntry::new(Some(user.user_id), "customer_create", "customers")
            .record(customer.id)
            .new_values(serde_json::json!({
                "customer_code": customer.customer_code,
                "customer_type": customer.customer_type,
            })),
    )
    .await?;
    txn.commit().await?;
    audit::deliver_best_effort(&state.orm).await;

    Ok(ApiResponse::single("Customer created", Customer::try_from(customer)?))
}

pub async fn get_customer(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Customer>> {
    let customer = Customers::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Customer", id))?;
    policy::authorize(
        Some(user),
        Action::Read,
        Resource::Customer {
            owner: Some(customer.user_id),
        },
    )?;
    Ok(ApiResponse::single("Customer", Customer::try_from(customer)?))
}

pub async fn list_customers(
    state: &AppState,
    user: &AuthUser,
    query: CustomerQuery,
) -> AppResult<ApiResponse<CustomerList>> {
    policy::authorize(Some(user), Action::Read, Resource::Customer { owner: None })?;
    let (page, limit, offset) = Pagination::new(query.page, query.per_page).normalize();

    let mut condition = Condition::all();
    if let Some(code) = query.q.as_ref().map(|s| s.trim()).filter(|s| !s.is_empty()) {
        condition = condition.add(Column::CustomerCode.starts_with(code.to_uppercase()));
    }
    if let Some(raw) = query.customer_type.as_deref().filter(|s| !s.is_empty()) {
        let customer_type: CustomerType = parse_field("customer_type", raw)?;
        condition = condition.add(Column::CustomerType.eq(customer_type.as_ref()));
    }

    let finder = Customers::find()
        .filter(condition)
        .order_by_desc(Column::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;
    let rows = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Customers",
        CustomerList {
            items: convert_all(rows)?,
        },
        Some(meta),
    ))
}

/// Customers may edit their own addresses and tax number; tier and credit
/// limit are back-office fields.
pub async fn update_customer(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateCustomerRequest,
) -> AppResult<ApiResponse<Customer>> {
    payload.validate()?;

    let txn = state.orm.begin().await?;
    let existing = Customers::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::not_found("Customer", id))?;
    policy::authorize(
        Some(user),
        Action::Update,
        Resource::Customer {
            owner: Some(existing.user_id),
        },
    )?;
    if !policy::is_back_office(user)
        && (payload.customer_type.is_some() || payload.credit_limit.is_some())
    {
        return Err(AppError::Unauthorized(
            "customer_type and credit_limit are managed by staff".into(),
        ));
    }

    let old_values = serde_json::json!({
        "customer_type": existing.customer_type,
        "billing_address": existing.billing_address,
        "shipping_address": existing.shipping_address,
        "credit_limit": existing.credit_limit,
    });

    let mut active: ActiveModel = existing.into();
    if let Some(raw) = payload.customer_type.as_deref() {
        let customer_type: CustomerType = parse_field("customer_type", raw)?;
        active.customer_type = Set(customer_type.to_string());
    }
    if let Some(billing_address) = payload.billing_address {
        active.billing_address = Set(billing_address);
    }
    if let Some(shipping_address) = payload.shipping_address {
        active.shipping_address = Set(shipping_address);
    }
    if let Some(credit_limit) = payload.credit_limit {
        active.credit_limit = Set(credit_limit);
    }
    if let Some(tax_number) = payload.tax_number {
        active.tax_number = Set(tax_number);
    }
    let customer = active.update(&txn).await?;

    audit::enqueue(
        &txn,
        AuditEntry::new(Some(user.user_id), "customer_update", "customers")
            .record(customer.id)
            .old_values(old_values)
            .new_values(serde_json::json!({
                "customer_type": customer.customer_type,
                "billing_address": customer.billing_address,
                "shipping_address": customer.shipping_address,
                "credit_limit": customer.credit_limit,
            })),
    )
    .await?;
    txn.commit().await?;
    audit::deliver_best_effort(&state.orm).await;

    Ok(ApiResponse::single("Customer updated", Customer::try_from(customer)?))
}
