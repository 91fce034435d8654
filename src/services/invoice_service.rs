use chrono::{Days, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, SqlErr, TransactionTrait,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    audit::{self, AuditEntry},
    domain::{
        crm::InvoiceStatus,
        numbering::{self, document_number},
        order::OrderStatus,
        parse_field,
    },
    dto::invoices::{
        CreateInvoiceRequest, InvoiceList, InvoiceWithPayments, UpdateInvoiceStatusRequest,
    },
    entity::{
        Customers,
        invoices::{ActiveModel, Column as InvoiceCol, Entity as Invoices},
        payments::{Column as PaymentCol, Entity as Payments},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Invoice, convert_all},
    policy::{self, Action, Resource},
    response::{ApiResponse, Meta},
    routes::params::{InvoiceQuery, Pagination},
    services::{
        order_service::lock_order,
        payment_service::{lock_invoice, recompute_customer_balance},
    },
    state::AppState,
};

const PAYMENT_TERMS_DAYS: u64 = 30;

/// Invoice an order (amount and customer come from it) or bill a customer
/// for a free amount.
pub async fn create_invoice(
    state: &AppState,
    user: &AuthUser,
    payload: CreateInvoiceRequest,
) -> AppResult<ApiResponse<Invoice>> {
    policy::authorize(Some(user), Action::Create, Resource::Invoice)?;
    payload.validate()?;

    let txn = state.orm.begin().await?;
    let (order_id, customer_id, total_amount) = match payload.order_id {
        Some(order_id) => {
            let order = lock_order(&txn, order_id).await?;
            if order.status == OrderStatus::Cancelled.as_ref() {
                return Err(AppError::Validation(format!(
                    "order {} is cancelled",
                    order.order_number
                )));
            }
            let already = Invoices::find()
                .filter(
                    Condition::all()
                        .add(InvoiceCol::OrderId.eq(order_id))
                        .add(InvoiceCol::Status.ne(InvoiceStatus::Cancelled.as_ref())),
                )
                .one(&txn)
                .await?;
            if let Some(existing) = already {
                return Err(AppError::Validation(format!(
                    "order {} is already invoiced by {}",
                    order.order_number, existing.invoice_number
                )));
            }
            (Some(order.id), order.customer_id, order.grand_total)
        }
        None => {
            let customer_id = payload.customer_id.ok_or_else(|| {
                AppError::Validation("customer_id is required without order_id".into())
            })?;
            let total_amount = payload.total_amount.ok_or_else(|| {
                AppError::Validation("total_amount is required without order_id".into())
            })?;
            Customers::find_by_id(customer_id)
                .one(&txn)
                .await?
                .ok_or_else(|| AppError::not_found("Customer", customer_id))?;
            (None, customer_id, total_amount)
        }
    };

    let invoice_date = payload
        .invoice_date
        .unwrap_or_else(|| Utc::now().date_naive());
    let due_date = match payload.due_date {
        Some(due) => due,
        None => invoice_date
            .checked_add_days(Days::new(PAYMENT_TERMS_DAYS))
            .ok_or_else(|| AppError::Validation("invoice_date out of range".into()))?,
    };
    if due_date < invoice_date {
        return Err(AppError::Validation(
            "due_date must not be before invoice_date".into(),
        ));
    }

    let invoice = ActiveModel {
        id: Set(Uuid::new_v4()),
        invoice_number: Set(document_number(numbering::INVOICE)),
        order_id: Set(order_id),
        customer_id: Set(customer_id),
        invoice_date: Set(invoice_date),
        due_date: Set(due_date),
        total_amount: Set(total_amount),
        paid_amount: Set(0),
        status: Set(InvoiceStatus::Draft.to_string()),
        notes: Set(payload.notes),
        created_by: Set(Some(user.user_id)),
        created_at: Set(Utc::now().into()),
    }
    .insert(&txn)
    .await
    .map_err(|err| match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            AppError::Validation("order is already invoiced".into())
        }
        _ => AppError::from(err),
    })?;
    recompute_customer_balance(&txn, customer_id).await?;

    audit::enqueue(
        &txn,
        AuditEntry::new(Some(user.user_id), "invoice_create", "invoices")
            .record(invoice.id)
            .new_values(serde_json::json!({
                "invoice_number": invoice.invoice_number,
                "order_id": invoice.order_id,
                "total_amount": invoice.total_amount,
            })),
    )
    .await?;
    txn.commit().await?;
    audit::deliver_best_effort(&state.orm).await;

    Ok(ApiResponse::single("Invoice created", Invoice::try_from(invoice)?))
}

pub async fn get_invoice(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<InvoiceWithPayments>> {
    policy::authorize(Some(user), Action::Read, Resource::Invoice)?;
    let invoice = Invoices::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Invoice", id))?;
    let payments = Payments::find()
        .filter(PaymentCol::InvoiceId.eq(invoice.id))
        .order_by_asc(PaymentCol::CreatedAt)
        .all(&state.orm)
        .await?;

    Ok(ApiResponse::single(
        "Invoice",
        InvoiceWithPayments {
            invoice: Invoice::try_from(invoice)?,
            payments: convert_all(payments)?,
        },
    ))
}

pub async fn list_invoices(
    state: &AppState,
    user: &AuthUser,
    query: InvoiceQuery,
) -> AppResult<ApiResponse<InvoiceList>> {
    policy::authorize(Some(user), Action::Read, Resource::Invoice)?;
    let (page, limit, offset) = Pagination::new(query.page, query.per_page).normalize();

    let mut condition = Condition::all();
    if let Some(raw) = query.status.as_deref().filter(|s| !s.is_empty()) {
        let status: InvoiceStatus = parse_field("status", raw)?;
        condition = condition.add(InvoiceCol::Status.eq(status.as_ref()));
    }
    if let Some(customer_id) = query.customer_id {
        condition = condition.add(InvoiceCol::CustomerId.eq(customer_id));
    }

    let finder = Invoices::find()
        .filter(condition)
        .order_by_desc(InvoiceCol::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;
    let rows = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Invoices",
        InvoiceList {
            items: convert_all(rows)?,
        },
        Some(meta),
    ))
}

/// Move an invoice between draft, sent, overdue and cancelled. `paid` only
/// ever follows from payments.
pub async fn update_invoice_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateInvoiceStatusRequest,
) -> AppResult<ApiResponse<Invoice>> {
    policy::authorize(Some(user), Action::Update, Resource::Invoice)?;
    let next: InvoiceStatus = parse_field("status", &payload.status)?;
    if next == InvoiceStatus::Paid {
        return Err(AppError::Validation(
            "an invoice becomes paid by recording payments".into(),
        ));
    }

    let txn = state.orm.begin().await?;
    let existing = lock_invoice(&txn, id).await?;
    let current: InvoiceStatus = parse_field("status", &existing.status)?;
    if matches!(current, InvoiceStatus::Paid | InvoiceStatus::Cancelled) && current != next {
        return Err(AppError::Validation(format!(
            "invoice {} is {current} and can no longer change status",
            existing.invoice_number
        )));
    }
    if next == InvoiceStatus::Cancelled && existing.paid_amount > 0 {
        return Err(AppError::Validation(format!(
            "invoice {} has payments; delete them before cancelling",
            existing.invoice_number
        )));
    }

    let mut active: ActiveModel = existing.into();
    active.status = Set(next.to_string());
    let invoice = active.update(&txn).await?;
    recompute_customer_balance(&txn, invoice.customer_id).await?;

    audit::enqueue(
        &txn,
        AuditEntry::new(Some(user.user_id), "invoice_status_update", "invoices")
            .record(invoice.id)
            .old_values(serde_json::json!({ "status": current }))
            .new_values(serde_json::json!({ "status": next })),
    )
    .await?;
    txn.commit().await?;
    audit::deliver_best_effort(&state.orm).await;

    Ok(ApiResponse::single("Invoice updated", Invoice::try_from(invoice)?))
}
