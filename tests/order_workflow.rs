mod common;

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use common::{
    activity_for, create_customer, create_product, create_user, order_request, setup_state,
    setup_state_with, stock_of,
};
use erp_crm_api::{
    domain::order::{OrderStatus, PaymentStatus, StatusPolicy},
    dto::{
        cart::AddToCartRequest,
        invoices::{CreateInvoiceRequest, UpdateInvoiceStatusRequest},
        orders::{
            CheckoutRequest, ConfirmPaymentRequest, UpdateOrderStatusRequest,
            UpdateOrderTotalsRequest, UpdatePaymentStatusRequest,
        },
    },
    entity::{CartItems, Orders},
    error::{AppError, AppResult},
    gateway::{IntentStatus, PaymentGateway, PaymentIntent, StubGateway},
    middleware::auth::decode_token,
    policy::Role,
    routes::params::Pagination,
    services::{auth_service, cart_service, checkout_service, invoice_service, order_service},
    state::AppState,
};
use sea_orm::{EntityTrait, PaginatorTrait};

fn status(value: &str) -> UpdateOrderStatusRequest {
    UpdateOrderStatusRequest {
        status: value.into(),
    }
}

async fn place(
    state: &AppState,
    user: &erp_crm_api::middleware::auth::AuthUser,
    customer_id: uuid::Uuid,
    lines: &[(uuid::Uuid, i32)],
) -> AppResult<erp_crm_api::dto::orders::OrderWithItems> {
    let resp = order_service::place_order(state, user, order_request(customer_id, lines)).await?;
    Ok(resp.data.expect("order data"))
}

#[tokio::test]
async fn ordering_the_whole_stock_leaves_zero() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let (customer, customer_id) = create_customer(&state).await?;
    let product = create_product(&state, 1_000, 5).await?;

    let placed = place(&state, &customer, customer_id, &[(product, 5)]).await?;

    assert_eq!(stock_of(&state, product).await?, 0);
    assert_eq!(placed.order.status, OrderStatus::Pending);
    assert_eq!(placed.order.payment_status, PaymentStatus::Pending);
    assert!(placed.order.order_number.starts_with("ORD-"));
    assert_eq!(placed.items.len(), 1);
    assert_eq!(placed.items[0].unit_price, 1_000);
    assert_eq!(placed.items[0].total_price, 5_000);
    Ok(())
}

#[tokio::test]
async fn ordering_beyond_stock_persists_nothing() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let (customer, customer_id) = create_customer(&state).await?;
    let plenty = create_product(&state, 200, 50).await?;
    let scarce = create_product(&state, 1_000, 5).await?;

    let err = place(&state, &customer, customer_id, &[(plenty, 3), (scarce, 6)])
        .await
        .expect_err("order must fail");

    match err {
        AppError::InsufficientStock {
            product_id,
            requested,
            available,
        } => {
            assert_eq!(product_id, scarce);
            assert_eq!(requested, 6);
            assert_eq!(available, 5);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(stock_of(&state, scarce).await?, 5);
    assert_eq!(stock_of(&state, plenty).await?, 50);
    assert_eq!(Orders::find().count(&state.orm).await?, 0);
    Ok(())
}

#[tokio::test]
async fn grand_total_is_derived_from_total_tax_and_discount() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let staff = create_user(&state, Role::Staff).await?;
    let (_, customer_id) = create_customer(&state).await?;
    let a = create_product(&state, 30, 10).await?;
    let b = create_product(&state, 40, 10).await?;

    let mut request = order_request(customer_id, &[(a, 2), (b, 1)]);
    request.tax_amount = 10;
    request.discount_amount = 5;
    let placed = order_service::place_order(&state, &staff, request)
        .await?
        .data
        .expect("order data");

    let item_sum: i64 = placed.items.iter().map(|i| i.total_price).sum();
    assert_eq!(placed.order.total_amount, 100);
    assert_eq!(item_sum, placed.order.total_amount);
    assert_eq!(placed.order.grand_total, 105);

    // A supplied grand_total is ignored.
    let updated = order_service::update_order_totals(
        &state,
        &staff,
        placed.order.id,
        UpdateOrderTotalsRequest {
            tax_amount: Some(20),
            grand_total: Some(1),
            ..Default::default()
        },
    )
    .await?
    .data
    .expect("order data");
    assert_eq!(updated.grand_total, 115);
    assert_eq!(activity_for(&state, "order_update", updated.id).await?.len(), 1);

    let err = order_service::update_order_totals(
        &state,
        &staff,
        placed.order.id,
        UpdateOrderTotalsRequest {
            discount_amount: Some(1_000),
            ..Default::default()
        },
    )
    .await
    .expect_err("discount larger than gross");
    assert!(matches!(err, AppError::Validation(_)));
    Ok(())
}

#[tokio::test]
async fn repeated_lines_are_merged_before_stock_is_taken() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let (customer, customer_id) = create_customer(&state).await?;
    let product = create_product(&state, 100, 4).await?;

    let err = place(&state, &customer, customer_id, &[(product, 2), (product, 3)])
        .await
        .expect_err("merged quantity exceeds stock");
    assert!(matches!(err, AppError::InsufficientStock { requested: 5, .. }));

    let placed = place(&state, &customer, customer_id, &[(product, 2), (product, 2)]).await?;
    assert_eq!(placed.items.len(), 1);
    assert_eq!(placed.items[0].quantity, 4);
    assert_eq!(stock_of(&state, product).await?, 0);
    Ok(())
}

#[tokio::test]
async fn order_after_the_last_unit_is_sold_is_refused() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let (first, first_customer) = create_customer(&state).await?;
    let (second, second_customer) = create_customer(&state).await?;
    let product = create_product(&state, 500, 1).await?;

    place(&state, &first, first_customer, &[(product, 1)]).await?;
    let err = place(&state, &second, second_customer, &[(product, 1)])
        .await
        .expect_err("stock is gone");
    assert!(matches!(err, AppError::InsufficientStock { available: 0, .. }));
    assert_eq!(stock_of(&state, product).await?, 0);
    assert_eq!(Orders::find().count(&state.orm).await?, 1);
    Ok(())
}

#[tokio::test]
async fn strict_policy_rejects_moving_back_from_delivered() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let staff = create_user(&state, Role::Staff).await?;
    let (customer, customer_id) = create_customer(&state).await?;
    let product = create_product(&state, 100, 10).await?;
    let order = place(&state, &customer, customer_id, &[(product, 1)]).await?.order;

    let err = order_service::update_order_status(&state, &staff, order.id, status("shipped"))
        .await
        .expect_err("pending cannot jump to shipped");
    assert!(matches!(err, AppError::InvalidTransition { .. }));

    for next in ["confirmed", "processing", "shipped", "delivered"] {
        order_service::update_order_status(&state, &staff, order.id, status(next)).await?;
    }
    let err = order_service::update_order_status(&state, &staff, order.id, status("pending"))
        .await
        .expect_err("delivered is final under the strict policy");
    assert!(matches!(err, AppError::InvalidTransition { .. }));

    let logged = activity_for(&state, "order_status_update", order.id).await?;
    assert_eq!(logged.len(), 4);
    Ok(())
}

#[tokio::test]
async fn legacy_policy_allows_any_transition_and_logs_each() -> anyhow::Result<()> {
    let state = setup_state_with(StatusPolicy::Legacy).await?;
    let staff = create_user(&state, Role::Staff).await?;
    let (customer, customer_id) = create_customer(&state).await?;
    let product = create_product(&state, 100, 10).await?;
    let order = place(&state, &customer, customer_id, &[(product, 1)]).await?.order;

    order_service::update_order_status(&state, &staff, order.id, status("delivered")).await?;
    let back = order_service::update_order_status(&state, &staff, order.id, status("pending"))
        .await?
        .data
        .expect("order data");
    assert_eq!(back.status, OrderStatus::Pending);

    let logged = activity_for(&state, "order_status_update", order.id).await?;
    assert_eq!(logged.len(), 2);
    assert_eq!(logged[0].user_id, Some(staff.user_id));

    // Legacy cancellation keeps stock where it is.
    order_service::update_order_status(&state, &staff, order.id, status("cancelled")).await?;
    assert_eq!(stock_of(&state, product).await?, 9);
    Ok(())
}

#[tokio::test]
async fn repeating_a_status_is_accepted_and_logged_twice() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let staff = create_user(&state, Role::Staff).await?;
    let (customer, customer_id) = create_customer(&state).await?;
    let product = create_product(&state, 100, 10).await?;
    let order = place(&state, &customer, customer_id, &[(product, 1)]).await?.order;

    order_service::update_order_status(&state, &staff, order.id, status("confirmed")).await?;
    order_service::update_order_status(&state, &staff, order.id, status("confirmed")).await?;

    assert_eq!(activity_for(&state, "order_status_update", order.id).await?.len(), 2);
    Ok(())
}

#[tokio::test]
async fn cancelling_restores_stock_once() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let staff = create_user(&state, Role::Staff).await?;
    let (customer, customer_id) = create_customer(&state).await?;
    let product = create_product(&state, 100, 10).await?;
    let order = place(&state, &customer, customer_id, &[(product, 4)]).await?.order;
    assert_eq!(stock_of(&state, product).await?, 6);

    order_service::update_order_status(&state, &staff, order.id, status("cancelled")).await?;
    assert_eq!(stock_of(&state, product).await?, 10);

    order_service::update_order_status(&state, &staff, order.id, status("cancelled")).await?;
    assert_eq!(stock_of(&state, product).await?, 10);

    let err = order_service::update_order_status(&state, &staff, order.id, status("confirmed"))
        .await
        .expect_err("cancelled is terminal");
    assert!(matches!(err, AppError::InvalidTransition { .. }));
    Ok(())
}

#[tokio::test]
async fn customers_only_reach_their_own_orders() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let (owner, owner_customer) = create_customer(&state).await?;
    let (stranger, stranger_customer) = create_customer(&state).await?;
    let product = create_product(&state, 100, 10).await?;

    let order = place(&state, &owner, owner_customer, &[(product, 1)]).await?.order;
    assert_eq!(order.channel.as_ref(), "storefront");

    let err = order_service::get_order(&state, &stranger, order.id)
        .await
        .expect_err("not the owner");
    assert!(matches!(err, AppError::Unauthorized(_)));

    let err = place(&state, &stranger, owner_customer, &[(product, 1)])
        .await
        .expect_err("cannot order on behalf of another customer");
    assert!(matches!(err, AppError::Unauthorized(_)));

    let err = order_service::update_order_status(&state, &owner, order.id, status("confirmed"))
        .await
        .expect_err("customers cannot move statuses");
    assert!(matches!(err, AppError::Unauthorized(_)));

    let mine = order_service::list_orders(&state, &stranger, Default::default())
        .await?
        .data
        .expect("list data");
    assert!(mine.items.is_empty());
    place(&state, &stranger, stranger_customer, &[(product, 1)]).await?;
    let mine = order_service::list_orders(&state, &stranger, Default::default())
        .await?
        .data
        .expect("list data");
    assert_eq!(mine.items.len(), 1);
    Ok(())
}

#[tokio::test]
async fn cash_on_delivery_is_settled_by_hand() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let finance = create_user(&state, Role::Finance).await?;
    let (customer, customer_id) = create_customer(&state).await?;
    let product = create_product(&state, 100, 10).await?;
    let order = place(&state, &customer, customer_id, &[(product, 1)]).await?.order;

    let err = order_service::update_payment_status(
        &state,
        &customer,
        order.id,
        UpdatePaymentStatusRequest {
            payment_status: "paid".into(),
        },
    )
    .await
    .expect_err("customers cannot settle");
    assert!(matches!(err, AppError::Unauthorized(_)));

    let paid = order_service::update_payment_status(
        &state,
        &finance,
        order.id,
        UpdatePaymentStatusRequest {
            payment_status: "paid".into(),
        },
    )
    .await?
    .data
    .expect("order data");
    assert_eq!(paid.payment_status, PaymentStatus::Paid);
    assert!(paid.paid_at.is_some());
    assert_eq!(activity_for(&state, "order_payment_update", order.id).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn card_order_is_paid_through_the_gateway() -> anyhow::Result<()> {
    let stub = StubGateway::default();
    let state = setup_state().await?.with_gateway(Arc::new(stub.clone()));
    let (customer, customer_id) = create_customer(&state).await?;
    let product = create_product(&state, 2_500, 10).await?;

    let mut request = order_request(customer_id, &[(product, 2)]);
    request.payment_method = "card".into();
    let order = order_service::place_order(&state, &customer, request)
        .await?
        .data
        .expect("order data")
        .order;

    let err = order_service::update_payment_status(
        &state,
        &create_user(&state, Role::Admin).await?,
        order.id,
        UpdatePaymentStatusRequest {
            payment_status: "paid".into(),
        },
    )
    .await
    .expect_err("card orders are not settled by hand");
    assert!(matches!(err, AppError::Validation(_)));

    let first = checkout_service::create_payment_intent(&state, &customer, order.id)
        .await?
        .data
        .expect("intent");
    let retried = checkout_service::create_payment_intent(&state, &customer, order.id)
        .await?
        .data
        .expect("intent");
    assert_eq!(first, retried);
    assert_eq!(stub.issued(), 1);

    let processing = Orders::find_by_id(order.id)
        .one(&state.orm)
        .await?
        .expect("order");
    assert_eq!(processing.payment_status, "processing");
    assert_eq!(processing.payment_intent_id.as_deref(), Some(first.intent_id.as_str()));

    let err = checkout_service::confirm_payment(
        &state,
        &customer,
        order.id,
        ConfirmPaymentRequest {
            intent_id: "pi_someone_else".into(),
        },
    )
    .await
    .expect_err("foreign intent");
    assert!(matches!(err, AppError::Validation(_)));

    let confirmed = checkout_service::confirm_payment(
        &state,
        &customer,
        order.id,
        ConfirmPaymentRequest {
            intent_id: first.intent_id.clone(),
        },
    )
    .await?
    .data
    .expect("order data");
    assert_eq!(confirmed.payment_status, PaymentStatus::Paid);
    assert_eq!(confirmed.status, OrderStatus::Confirmed);

    let again = checkout_service::confirm_payment(
        &state,
        &customer,
        order.id,
        ConfirmPaymentRequest {
            intent_id: first.intent_id,
        },
    )
    .await?;
    assert_eq!(again.message, "Payment already confirmed");
    assert_eq!(activity_for(&state, "payment_confirm", order.id).await?.len(), 1);
    Ok(())
}

fn more_tax(tax_amount: i64) -> UpdateOrderTotalsRequest {
    UpdateOrderTotalsRequest {
        tax_amount: Some(tax_amount),
        ..Default::default()
    }
}

#[tokio::test]
async fn totals_are_frozen_once_card_payment_starts() -> anyhow::Result<()> {
    let stub = StubGateway::default();
    let state = setup_state().await?.with_gateway(Arc::new(stub.clone()));
    let staff = create_user(&state, Role::Staff).await?;
    let (customer, customer_id) = create_customer(&state).await?;
    let product = create_product(&state, 1_000, 10).await?;

    let mut request = order_request(customer_id, &[(product, 1)]);
    request.payment_method = "card".into();
    let order = order_service::place_order(&state, &customer, request)
        .await?
        .data
        .expect("order data")
        .order;

    let intent = checkout_service::create_payment_intent(&state, &customer, order.id)
        .await?
        .data
        .expect("intent");
    let err = order_service::update_order_totals(&state, &staff, order.id, more_tax(500))
        .await
        .expect_err("intent already carries the old amount");
    assert!(matches!(err, AppError::Validation(_)));

    checkout_service::create_payment_intent(&state, &customer, order.id).await?;
    assert_eq!(stub.issued(), 1);

    checkout_service::confirm_payment(
        &state,
        &customer,
        order.id,
        ConfirmPaymentRequest {
            intent_id: intent.intent_id,
        },
    )
    .await?;
    let err = order_service::update_order_totals(&state, &staff, order.id, more_tax(5_000))
        .await
        .expect_err("paid orders keep the amount that was paid");
    assert!(matches!(err, AppError::Validation(_)));

    let stored = Orders::find_by_id(order.id)
        .one(&state.orm)
        .await?
        .expect("order");
    assert_eq!(stored.grand_total, 1_000);
    assert_eq!(stored.payment_status, "paid");
    Ok(())
}

#[tokio::test]
async fn totals_are_frozen_while_an_invoice_is_live() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let staff = create_user(&state, Role::Staff).await?;
    let finance = create_user(&state, Role::Finance).await?;
    let (customer, customer_id) = create_customer(&state).await?;
    let product = create_product(&state, 1_000, 10).await?;
    let order = place(&state, &customer, customer_id, &[(product, 1)]).await?.order;

    let invoice = invoice_service::create_invoice(
        &state,
        &finance,
        CreateInvoiceRequest {
            order_id: Some(order.id),
            ..Default::default()
        },
    )
    .await?
    .data
    .expect("invoice data");
    let err = order_service::update_order_totals(&state, &staff, order.id, more_tax(100))
        .await
        .expect_err("invoice total would drift from the order");
    assert!(matches!(err, AppError::Validation(_)));

    invoice_service::update_invoice_status(
        &state,
        &finance,
        invoice.id,
        UpdateInvoiceStatusRequest {
            status: "cancelled".into(),
        },
    )
    .await?;
    let updated = order_service::update_order_totals(&state, &staff, order.id, more_tax(100))
        .await?
        .data
        .expect("order data");
    assert_eq!(updated.grand_total, 1_100);
    Ok(())
}

struct PendingGateway;

#[async_trait]
impl PaymentGateway for PendingGateway {
    async fn create_payment_intent(
        &self,
        _amount: i64,
        _currency: &str,
        _metadata: HashMap<String, String>,
        idempotency_key: &str,
    ) -> AppResult<PaymentIntent> {
        Ok(PaymentIntent {
            intent_id: format!("pi_{idempotency_key}"),
            client_secret: "secret".into(),
        })
    }

    async fn payment_intent_status(&self, _intent_id: &str) -> AppResult<IntentStatus> {
        Ok(IntentStatus::RequiresAction)
    }
}

#[tokio::test]
async fn unfinished_intent_does_not_mark_the_order_paid() -> anyhow::Result<()> {
    let state = setup_state().await?.with_gateway(Arc::new(PendingGateway));
    let (customer, customer_id) = create_customer(&state).await?;
    let product = create_product(&state, 900, 3).await?;

    let mut request = order_request(customer_id, &[(product, 1)]);
    request.payment_method = "card".into();
    let order = order_service::place_order(&state, &customer, request)
        .await?
        .data
        .expect("order data")
        .order;

    let intent = checkout_service::create_payment_intent(&state, &customer, order.id)
        .await?
        .data
        .expect("intent");
    let err = checkout_service::confirm_payment(
        &state,
        &customer,
        order.id,
        ConfirmPaymentRequest {
            intent_id: intent.intent_id,
        },
    )
    .await
    .expect_err("intent requires action");
    assert!(matches!(err, AppError::Validation(_)));

    let stored = Orders::find_by_id(order.id)
        .one(&state.orm)
        .await?
        .expect("order");
    assert_eq!(stored.payment_status, "processing");
    assert!(stored.paid_at.is_none());
    Ok(())
}

#[tokio::test]
async fn checkout_turns_the_cart_into_an_order() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let (customer, _) = create_customer(&state).await?;
    let product = create_product(&state, 300, 10).await?;

    let err = order_service::checkout(
        &state,
        &customer,
        CheckoutRequest {
            shipping_address: None,
            billing_address: None,
            payment_method: "cash_on_delivery".into(),
            notes: None,
        },
    )
    .await
    .expect_err("empty cart");
    assert!(matches!(err, AppError::Validation(_)));

    cart_service::add_to_cart(
        &state,
        &customer,
        AddToCartRequest {
            product_id: product,
            quantity: 3,
        },
    )
    .await?;
    let cart = cart_service::list_cart(&state, &customer, Pagination::default())
        .await?
        .data
        .expect("cart");
    assert_eq!(cart.items.len(), 1);

    let placed = order_service::checkout(
        &state,
        &customer,
        CheckoutRequest {
            shipping_address: None,
            billing_address: None,
            payment_method: "cash_on_delivery".into(),
            notes: Some("leave at the door".into()),
        },
    )
    .await?
    .data
    .expect("order data");

    assert_eq!(placed.order.total_amount, 900);
    assert_eq!(placed.order.shipping_address, "1 Shipping Lane");
    assert_eq!(stock_of(&state, product).await?, 7);
    assert_eq!(CartItems::find().count(&state.orm).await?, 0);
    Ok(())
}

#[tokio::test]
async fn issued_tokens_decode_to_the_same_actor() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let user = create_user(&state, Role::Finance).await?;

    let login = auth_service::issue_token(&state.config, user.user_id, user.role)?;
    let decoded = decode_token(&login.token, &state.config.jwt_secret)?;
    assert_eq!(decoded.user_id, user.user_id);
    assert_eq!(decoded.role, Role::Finance);

    assert!(matches!(
        decode_token(&login.token, "another-secret"),
        Err(AppError::Unauthenticated(_))
    ));
    Ok(())
}
