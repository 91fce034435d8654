use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{ActiveModelTrait, EntityTrait, Set, TransactionTrait};
use uuid::Uuid;

use crate::{
    audit::{self, AuditEntry},
    domain::{
        order::{OrderStatus, PaymentMethod, PaymentStatus},
        parse_field,
    },
    dto::orders::ConfirmPaymentRequest,
    entity::orders::{ActiveModel as OrderActive, Entity as Orders, Model as OrderModel},
    error::{AppError, AppResult},
    gateway::{IntentStatus, PaymentIntent},
    middleware::auth::AuthUser,
    models::Order,
    policy::{self, Action, Resource},
    response::ApiResponse,
    services::order_service::{lock_order, order_owner},
    state::AppState,
};

/// Key sent with every intent request for an order; a retried call for the
/// same amount gets the intent created by the first one.
pub fn idempotency_key(order_id: Uuid, amount: i64) -> String {
    format!("order-{order_id}-intent-{amount}")
}

fn ensure_payable(order: &OrderModel) -> AppResult<()> {
    let method: PaymentMethod = parse_field("payment_method", &order.payment_method)?;
    if method != PaymentMethod::Card {
        return Err(AppError::Validation(format!(
            "order {} is not a card order",
            order.order_number
        )));
    }
    if order.payment_status == PaymentStatus::Paid.as_ref() {
        return Err(AppError::Validation(format!(
            "order {} is already paid",
            order.order_number
        )));
    }
    if order.status == OrderStatus::Cancelled.as_ref() {
        return Err(AppError::Validation(format!(
            "order {} is cancelled",
            order.order_number
        )));
    }
    if order.grand_total <= 0 {
        return Err(AppError::Validation(format!(
            "order {} has nothing to charge",
            order.order_number
        )));
    }
    Ok(())
}

pub async fn create_payment_intent(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
) -> AppResult<ApiResponse<PaymentIntent>> {
    let order = Orders::find_by_id(order_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Order", order_id))?;
    let owner = order_owner(&state.orm, &order).await?;
    policy::authorize(Some(user), Action::Pay, Resource::Order { owner })?;
    ensure_payable(&order)?;

    let metadata = HashMap::from([
        ("order_id".to_string(), order.id.to_string()),
        ("order_number".to_string(), order.order_number.clone()),
    ]);
    let intent = state
        .gateway
        .create_payment_intent(
            order.grand_total,
            &state.config.payment.currency,
            metadata,
            &idempotency_key(order.id, order.grand_total),
        )
        .await?;

    let txn = state.orm.begin().await?;
    let locked = lock_order(&txn, order_id).await?;
    ensure_payable(&locked)?;
    if locked.grand_total != order.grand_total {
        return Err(AppError::Validation(format!(
            "order {} changed while the payment intent was created",
            locked.order_number
        )));
    }

    let mut active: OrderActive = locked.into();
    active.payment_intent_id = Set(Some(intent.intent_id.clone()));
    active.payment_status = Set(PaymentStatus::Processing.to_string());
    active.updated_at = Set(Utc::now().into());
    let updated = active.update(&txn).await?;

    audit::enqueue(
        &txn,
        AuditEntry::new(Some(user.user_id), "payment_intent_create", "orders")
            .record(updated.id)
            .new_values(serde_json::json!({
                "intent_id": intent.intent_id,
                "amount": updated.grand_total,
            })),
    )
    .await?;
    txn.commit().await?;
    audit::deliver_best_effort(&state.orm).await;

    tracing::info!(order_id = %updated.id, intent_id = %intent.intent_id, "payment intent created");
    Ok(ApiResponse::single("Payment intent created", intent))
}

/// Mark a card order paid once the gateway reports its intent succeeded.
/// Confirming an order that is already paid returns it unchanged.
pub async fn confirm_payment(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
    payload: ConfirmPaymentRequest,
) -> AppResult<ApiResponse<Order>> {
    let order = Orders::find_by_id(order_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Order", order_id))?;
    let owner = order_owner(&state.orm, &order).await?;
    policy::authorize(Some(user), Action::Pay, Resource::Order { owner })?;

    if order.payment_intent_id.as_deref() != Some(payload.intent_id.as_str()) {
        return Err(AppError::Validation(format!(
            "payment intent {} does not belong to order {}",
            payload.intent_id, order.order_number
        )));
    }
    if order.payment_status == PaymentStatus::Paid.as_ref() {
        return Ok(ApiResponse::single("Payment already confirmed", Order::try_from(order)?));
    }

    let status = state.gateway.payment_intent_status(&payload.intent_id).await?;
    if status != IntentStatus::Succeeded {
        return Err(AppError::Validation(format!(
            "payment intent {} is {}",
            payload.intent_id,
            status.as_str()
        )));
    }

    let txn = state.orm.begin().await?;
    let locked = lock_order(&txn, order_id).await?;
    if locked.status == OrderStatus::Cancelled.as_ref() {
        return Err(AppError::Validation(format!(
            "order {} is cancelled",
            locked.order_number
        )));
    }
    let was_pending = locked.status == OrderStatus::Pending.as_ref();

    let mut active: OrderActive = locked.into();
    active.payment_status = Set(PaymentStatus::Paid.to_string());
    active.paid_at = Set(Some(Utc::now().into()));
    if was_pending {
        active.status = Set(OrderStatus::Confirmed.to_string());
    }
    active.updated_at = Set(Utc::now().into());
    let updated = active.update(&txn).await?;

    audit::enqueue(
        &txn,
        AuditEntry::new(Some(user.user_id), "payment_confirm", "orders")
            .record(updated.id)
            .new_values(serde_json::json!({
                "intent_id": payload.intent_id,
                "payment_status": updated.payment_status,
                "status": updated.status,
            })),
    )
    .await?;
    txn.commit().await?;
    audit::deliver_best_effort(&state.orm).await;

    tracing::info!(order_id = %updated.id, "payment confirmed");
    Ok(ApiResponse::single("Payment confirmed", Order::try_from(updated)?))
}
