use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseTransaction, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
    sea_query::LockType,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    audit::{self, AuditEntry},
    domain::{
        crm::{InvoiceStatus, LedgerPaymentMethod},
        numbering::{self, document_number},
        order::{PaymentMethod, PaymentStatus},
        parse_field,
    },
    dto::payments::{PaymentList, RecordPaymentRequest},
    entity::{
        Customers, Orders, customers, orders,
        invoices::{self, Column as InvoiceCol, Entity as Invoices, Model as InvoiceModel},
        payments::{ActiveModel as PaymentActive, Column as PaymentCol, Entity as Payments},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Payment, convert_all},
    policy::{self, Action, Resource},
    response::{ApiResponse, Meta},
    routes::params::{Pagination, PaymentQuery},
    state::AppState,
};

pub(crate) async fn lock_invoice(txn: &DatabaseTransaction, id: Uuid) -> AppResult<InvoiceModel> {
    Invoices::find()
        .filter(InvoiceCol::Id.eq(id))
        .lock(LockType::Update)
        .one(txn)
        .await?
        .ok_or_else(|| AppError::not_found("Invoice", id))
}

/// Status implied by the amount paid. Manual statuses survive while the
/// invoice is not fully paid.
fn settled_status(current: InvoiceStatus, total: i64, paid: i64) -> InvoiceStatus {
    if total > 0 && paid >= total {
        InvoiceStatus::Paid
    } else if current == InvoiceStatus::Paid {
        InvoiceStatus::Sent
    } else {
        current
    }
}

fn order_payment_status(total: i64, paid: i64) -> PaymentStatus {
    if paid <= 0 {
        PaymentStatus::Pending
    } else if paid < total {
        PaymentStatus::Partial
    } else {
        PaymentStatus::Paid
    }
}

/// Card orders are settled by the gateway; only cash-on-delivery orders take
/// their payment status from invoice payments.
fn settled_by_invoice(order: &orders::Model) -> bool {
    order.payment_method == PaymentMethod::CashOnDelivery.as_ref()
}

/// Rewrite `paid_amount` and status of an invoice from its payments, then
/// carry the result to a linked cash-on-delivery order.
pub(crate) async fn recompute_invoice<C>(conn: &C, invoice: InvoiceModel) -> AppResult<InvoiceModel>
where
    C: ConnectionTrait,
{
    let paid = Payments::find()
        .filter(PaymentCol::InvoiceId.eq(invoice.id))
        .all(conn)
        .await?
        .iter()
        .try_fold(0i64, |acc, p| acc.checked_add(p.amount))
        .ok_or_else(|| AppError::Validation("invoice payments overflow".into()))?;

    let current: InvoiceStatus = parse_field("status", &invoice.status)?;
    let status = settled_status(current, invoice.total_amount, paid);

    let mut active: invoices::ActiveModel = invoice.into();
    active.paid_amount = Set(paid);
    active.status = Set(status.to_string());
    let invoice = active.update(conn).await?;

    if let Some(order_id) = invoice.order_id {
        if let Some(order) = Orders::find_by_id(order_id)
            .one(conn)
            .await?
            .filter(settled_by_invoice)
        {
            let next = order_payment_status(invoice.total_amount, paid);
            if order.payment_status != next.as_ref() {
                let mut active: orders::ActiveModel = order.into();
                active.payment_status = Set(next.to_string());
                active.paid_at = Set(match next {
                    PaymentStatus::Paid => Some(Utc::now().into()),
                    _ => None,
                });
                active.updated_at = Set(Utc::now().into());
                active.update(conn).await?;
            }
        }
    }

    Ok(invoice)
}

/// `balance` = what the customer still owes across invoices that are not
/// cancelled.
pub(crate) async fn recompute_customer_balance<C>(conn: &C, customer_id: Uuid) -> AppResult<i64>
where
    C: ConnectionTrait,
{
    let open = Invoices::find()
        .filter(
            Condition::all()
                .add(InvoiceCol::CustomerId.eq(customer_id))
                .add(InvoiceCol::Status.ne(InvoiceStatus::Cancelled.as_ref())),
        )
        .all(conn)
        .await?;
    let balance = open
        .iter()
        .try_fold(0i64, |acc, inv| acc.checked_add(inv.balance_amount()))
        .ok_or_else(|| AppError::Validation("customer balance overflows".into()))?;

    let customer = Customers::find_by_id(customer_id)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::not_found("Customer", customer_id))?;
    let mut active: customers::ActiveModel = customer.into();
    active.balance = Set(balance);
    active.update(conn).await?;
    Ok(balance)
}

pub async fn record_payment(
    state: &AppState,
    user: &AuthUser,
    payload: RecordPaymentRequest,
) -> AppResult<ApiResponse<Payment>> {
    policy::authorize(Some(user), Action::Create, Resource::Payment)?;
    payload.validate()?;
    let method: LedgerPaymentMethod = parse_field("payment_method", &payload.payment_method)?;

    let txn = state.orm.begin().await?;
    let invoice = lock_invoice(&txn, payload.invoice_id).await?;
    if invoice.status == InvoiceStatus::Cancelled.as_ref() {
        return Err(AppError::Validation(format!(
            "invoice {} is cancelled",
            invoice.invoice_number
        )));
    }
    if let Some(order_id) = invoice.order_id {
        let card_paid = Orders::find_by_id(order_id)
            .one(&txn)
            .await?
            .filter(|order| !settled_by_invoice(order))
            .is_some_and(|order| order.payment_status == PaymentStatus::Paid.as_ref());
        if card_paid {
            return Err(AppError::Validation(format!(
                "invoice {} belongs to an order already paid by card",
                invoice.invoice_number
            )));
        }
    }
    if payload.amount > invoice.balance_amount() {
        return Err(AppError::Validation(format!(
            "amount {} exceeds the outstanding balance {} of invoice {}",
            payload.amount,
            invoice.balance_amount(),
            invoice.invoice_number
        )));
    }

    let payment = PaymentActive {
        id: Set(Uuid::new_v4()),
        payment_number: Set(document_number(numbering::PAYMENT)),
        invoice_id: Set(invoice.id),
        customer_id: Set(invoice.customer_id),
        amount: Set(payload.amount),
        payment_method: Set(method.to_string()),
        payment_date: Set(payload
            .payment_date
            .unwrap_or_else(|| Utc::now().date_naive())),
        reference_number: Set(payload.reference_number),
        notes: Set(payload.notes),
        created_by: Set(Some(user.user_id)),
        created_at: Set(Utc::now().into()),
    }
    .insert(&txn)
    .await?;

    let invoice = recompute_invoice(&txn, invoice).await?;
    recompute_customer_balance(&txn, invoice.customer_id).await?;

    audit::enqueue(
        &txn,
        AuditEntry::new(Some(user.user_id), "payment_create", "payments")
            .record(payment.id)
            .new_values(serde_json::json!({
                "invoice_id": invoice.id,
                "amount": payment.amount,
                "invoice_paid_amount": invoice.paid_amount,
                "invoice_status": invoice.status,
            })),
    )
    .await?;
    txn.commit().await?;
    audit::deliver_best_effort(&state.orm).await;

    tracing::info!(payment_id = %payment.id, invoice_id = %invoice.id, amount = payment.amount, "payment recorded");
    Ok(ApiResponse::single("Payment recorded", Payment::try_from(payment)?))
}

pub async fn delete_payment(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    policy::authorize(Some(user), Action::Delete, Resource::Payment)?;

    let txn = state.orm.begin().await?;
    let payment = Payments::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::not_found("Payment", id))?;
    let invoice = lock_invoice(&txn, payment.invoice_id).await?;

    Payments::delete_by_id(payment.id).exec(&txn).await?;
    let invoice = recompute_invoice(&txn, invoice).await?;
    recompute_customer_balance(&txn, invoice.customer_id).await?;

    audit::enqueue(
        &txn,
        AuditEntry::new(Some(user.user_id), "payment_delete", "payments")
            .record(payment.id)
            .old_values(serde_json::json!({
                "invoice_id": payment.invoice_id,
                "amount": payment.amount,
            })),
    )
    .await?;
    txn.commit().await?;
    audit::deliver_best_effort(&state.orm).await;

    Ok(ApiResponse::single("Deleted", serde_json::json!({})))
}

pub async fn get_payment(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Payment>> {
    policy::authorize(Some(user), Action::Read, Resource::Payment)?;
    let payment = Payments::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Payment", id))?;
    Ok(ApiResponse::single("Payment", Payment::try_from(payment)?))
}

pub async fn list_payments(
    state: &AppState,
    user: &AuthUser,
    query: PaymentQuery,
) -> AppResult<ApiResponse<PaymentList>> {
    policy::authorize(Some(user), Action::Read, Resource::Payment)?;
    let (page, limit, offset) = Pagination::new(query.page, query.per_page).normalize();

    let mut condition = Condition::all();
    if let Some(invoice_id) = query.invoice_id {
        condition = condition.add(PaymentCol::InvoiceId.eq(invoice_id));
    }

    let finder = Payments::find()
        .filter(condition)
        .order_by_desc(PaymentCol::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;
    let rows = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Payments",
        PaymentList {
            items: convert_all(rows)?,
        },
        Some(meta),
    ))
}
