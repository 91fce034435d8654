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
        crm::InvoiceStatus,
        numbering::{self, document_number},
        order::{self as rules, OrderChannel, OrderStatus, OrderTotals, PaymentMethod, PaymentStatus},
        parse_field,
    },
    dto::orders::{
        CheckoutRequest, LineItemRequest, OrderList, OrderWithItems, PlaceOrderRequest,
        UpdateOrderStatusRequest, UpdateOrderTotalsRequest, UpdatePaymentStatusRequest,
    },
    entity::{
        cart_items::{Column as CartCol, Entity as CartItems},
        invoices::{Column as InvoiceCol, Entity as Invoices},
        customers::{Column as CustomerCol, Entity as Customers, Model as CustomerModel},
        order_items::{
            ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
            Model as OrderItemModel,
        },
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        products::{Entity as Products, Model as ProductModel},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Order, OrderItem, convert_all},
    policy::{self, Action, Resource, Role},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, Pagination, SortOrder},
    services::stock_ledger,
    state::AppState,
};

/// Everything needed to write one order inside a caller's transaction.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub customer_id: Uuid,
    pub channel: OrderChannel,
    pub lines: Vec<LineItemRequest>,
    pub shipping_address: String,
    pub billing_address: String,
    pub payment_method: PaymentMethod,
    pub tax_amount: i64,
    pub discount_amount: i64,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
}

/// Sum the quantities of repeated products, keeping first-seen order.
pub fn merge_lines(lines: &[LineItemRequest]) -> AppResult<Vec<LineItemRequest>> {
    let mut merged: Vec<LineItemRequest> = Vec::with_capacity(lines.len());
    for line in lines {
        if line.quantity < 1 {
            return Err(AppError::Validation(format!(
                "quantity for product {} must be at least 1",
                line.product_id
            )));
        }
        match merged.iter_mut().find(|m| m.product_id == line.product_id) {
            Some(existing) => {
                existing.quantity = existing
                    .quantity
                    .checked_add(line.quantity)
                    .ok_or_else(|| AppError::Validation("quantity overflows".into()))?;
            }
            None => merged.push(line.clone()),
        }
    }
    Ok(merged)
}

/// Validate lines, take stock and persist the order with its items.
///
/// Any error leaves the transaction dirty; the caller drops it and nothing
/// is persisted.
pub async fn place_order_in(
    txn: &DatabaseTransaction,
    new_order: NewOrder,
) -> AppResult<(OrderModel, Vec<OrderItemModel>)> {
    if new_order.lines.is_empty() {
        return Err(AppError::Validation("order must have at least one line".into()));
    }
    let lines = merge_lines(&new_order.lines)?;

    let mut priced: Vec<(ProductModel, i32, i64)> = Vec::with_capacity(lines.len());
    for line in &lines {
        let product = Products::find_by_id(line.product_id)
            .one(txn)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| AppError::not_found("Product", line.product_id))?;
        let line_total = rules::line_total(line.quantity, product.price)?;
        priced.push((product, line.quantity, line_total));
    }

    let subtotal = rules::sum_lines(priced.iter().map(|(_, _, total)| *total))?;
    let totals = OrderTotals::new(subtotal, new_order.tax_amount, new_order.discount_amount)?;

    for (product, quantity, _) in &priced {
        let remaining = stock_ledger::decrement_stock(txn, product.id, *quantity).await?;
        if remaining < product.min_stock_level {
            tracing::warn!(product_id = %product.id, stock = remaining, "product is below its minimum stock level");
        }
    }

    let now = Utc::now();
    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        order_number: Set(document_number(numbering::ORDER)),
        customer_id: Set(new_order.customer_id),
        channel: Set(new_order.channel.to_string()),
        status: Set(OrderStatus::Pending.to_string()),
        payment_status: Set(PaymentStatus::Pending.to_string()),
        payment_method: Set(new_order.payment_method.to_string()),
        total_amount: Set(totals.total_amount),
        tax_amount: Set(totals.tax_amount),
        discount_amount: Set(totals.discount_amount),
        grand_total: Set(totals.grand_total),
        shipping_address: Set(new_order.shipping_address),
        billing_address: Set(new_order.billing_address),
        notes: Set(new_order.notes),
        payment_intent_id: Set(None),
        paid_at: Set(None),
        created_by: Set(new_order.created_by),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(txn)
    .await?;

    let mut items = Vec::with_capacity(priced.len());
    for (product, quantity, line_total) in priced {
        let item = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(product.id),
            quantity: Set(quantity),
            unit_price: Set(product.price),
            total_price: Set(line_total),
        }
        .insert(txn)
        .await?;
        items.push(item);
    }

    Ok((order, items))
}

pub async fn place_order(
    state: &AppState,
    user: &AuthUser,
    payload: PlaceOrderRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    payload.validate()?;
    let payment_method: PaymentMethod = parse_field("payment_method", &payload.payment_method)?;

    let txn = state.orm.begin().await?;
    let customer = Customers::find_by_id(payload.customer_id)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::not_found("Customer", payload.customer_id))?;
    policy::authorize(
        Some(user),
        Action::Create,
        Resource::Order {
            owner: Some(customer.user_id),
        },
    )?;

    let channel = match user.role {
        Role::Customer => OrderChannel::Storefront,
        _ => OrderChannel::Staff,
    };
    let billing_address = payload
        .billing_address
        .unwrap_or_else(|| customer.billing_address.clone());

    let (order, items) = place_order_in(
        &txn,
        NewOrder {
            customer_id: customer.id,
            channel,
            lines: payload.lines,
            shipping_address: payload.shipping_address,
            billing_address,
            payment_method,
            tax_amount: payload.tax_amount,
            discount_amount: payload.discount_amount,
            notes: payload.notes,
            created_by: Some(user.user_id),
        },
    )
    .await?;

    audit::enqueue(&txn, order_created_entry(user, &order, &items)).await?;
    txn.commit().await?;
    audit::deliver_best_effort(&state.orm).await;

    tracing::info!(
        order_id = %order.id,
        order_number = %order.order_number,
        grand_total = order.grand_total,
        "order placed"
    );

    Ok(ApiResponse::single(
        "Order placed",
        order_with_items(order, items)?,
    ))
}

/// Turn the caller's cart into a storefront order and empty the cart.
pub async fn checkout(
    state: &AppState,
    user: &AuthUser,
    payload: CheckoutRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let payment_method: PaymentMethod = parse_field("payment_method", &payload.payment_method)?;

    let txn = state.orm.begin().await?;
    let customer = customer_for_user(&txn, user.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Customer profile for user {}", user.user_id)))?;
    policy::authorize(
        Some(user),
        Action::Create,
        Resource::Order {
            owner: Some(customer.user_id),
        },
    )?;

    let cart = CartItems::find()
        .filter(CartCol::UserId.eq(user.user_id))
        .order_by_asc(CartCol::CreatedAt)
        .all(&txn)
        .await?;
    if cart.is_empty() {
        return Err(AppError::Validation("cart is empty".into()));
    }

    let shipping_address = payload
        .shipping_address
        .filter(|a| !a.trim().is_empty())
        .unwrap_or_else(|| customer.shipping_address.clone());
    if shipping_address.trim().is_empty() {
        return Err(AppError::Validation("shipping_address is required".into()));
    }

    let lines = cart
        .iter()
        .map(|row| LineItemRequest {
            product_id: row.product_id,
            quantity: row.quantity,
        })
        .collect();

    let (order, items) = place_order_in(
        &txn,
        NewOrder {
            customer_id: customer.id,
            channel: OrderChannel::Storefront,
            lines,
            shipping_address,
            billing_address: payload
                .billing_address
                .unwrap_or_else(|| customer.billing_address.clone()),
            payment_method,
            tax_amount: 0,
            discount_amount: 0,
            notes: payload.notes,
            created_by: Some(user.user_id),
        },
    )
    .await?;

    CartItems::delete_many()
        .filter(CartCol::UserId.eq(user.user_id))
        .exec(&txn)
        .await?;

    audit::enqueue(&txn, order_created_entry(user, &order, &items)).await?;
    txn.commit().await?;
    audit::deliver_best_effort(&state.orm).await;

    tracing::info!(order_id = %order.id, order_number = %order.order_number, "checkout completed");

    Ok(ApiResponse::single(
        "Checkout success",
        order_with_items(order, items)?,
    ))
}

pub async fn update_order_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    let next: OrderStatus = parse_field("status", &payload.status)?;

    let txn = state.orm.begin().await?;
    let existing = lock_order(&txn, id).await?;
    let owner = order_owner(&txn, &existing).await?;
    policy::authorize(Some(user), Action::Update, Resource::Order { owner })?;

    let current: OrderStatus = parse_field("status", &existing.status)?;
    let policy = state.config.status_policy;
    policy.check(current, next)?;

    if policy.restocks(current, next) {
        let items = OrderItems::find()
            .filter(OrderItemCol::OrderId.eq(existing.id))
            .all(&txn)
            .await?;
        for item in &items {
            stock_ledger::restock(&txn, item.product_id, item.quantity).await?;
        }
        tracing::info!(order_id = %existing.id, lines = items.len(), "stock restored for cancelled order");
    }

    let mut active: OrderActive = existing.into();
    active.status = Set(next.to_string());
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;

    audit::enqueue(
        &txn,
        AuditEntry::new(Some(user.user_id), "order_status_update", "orders")
            .record(order.id)
            .old_values(serde_json::json!({ "status": current }))
            .new_values(serde_json::json!({ "status": next })),
    )
    .await?;
    txn.commit().await?;
    audit::deliver_best_effort(&state.orm).await;

    tracing::info!(order_id = %order.id, from = %current, to = %next, "order status changed");

    Ok(ApiResponse::single("Order updated", Order::try_from(order)?))
}

/// Edit the money figures of an order. `grand_total` is always derived, and
/// the figures are frozen once payment has started or an invoice exists.
pub async fn update_order_totals(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderTotalsRequest,
) -> AppResult<ApiResponse<Order>> {
    let txn = state.orm.begin().await?;
    let existing = lock_order(&txn, id).await?;
    let owner = order_owner(&txn, &existing).await?;
    policy::authorize(Some(user), Action::Update, Resource::Order { owner })?;

    if existing.payment_status != PaymentStatus::Pending.as_ref() {
        return Err(AppError::Validation(format!(
            "order {} is {} and its totals are frozen",
            existing.order_number, existing.payment_status
        )));
    }
    let invoiced = Invoices::find()
        .filter(
            Condition::all()
                .add(InvoiceCol::OrderId.eq(existing.id))
                .add(InvoiceCol::Status.ne(InvoiceStatus::Cancelled.as_ref())),
        )
        .one(&txn)
        .await?;
    if let Some(invoice) = invoiced {
        return Err(AppError::Validation(format!(
            "order {} is invoiced by {}; cancel the invoice first",
            existing.order_number, invoice.invoice_number
        )));
    }

    let totals = OrderTotals::new(
        payload.total_amount.unwrap_or(existing.total_amount),
        payload.tax_amount.unwrap_or(existing.tax_amount),
        payload.discount_amount.unwrap_or(existing.discount_amount),
    )?;
    if let Some(supplied) = payload.grand_total.filter(|g| *g != totals.grand_total) {
        tracing::debug!(order_id = %id, supplied, computed = totals.grand_total, "ignoring supplied grand_total");
    }

    let old_values = serde_json::json!({
        "total_amount": existing.total_amount,
        "tax_amount": existing.tax_amount,
        "discount_amount": existing.discount_amount,
        "grand_total": existing.grand_total,
    });

    let mut active: OrderActive = existing.into();
    active.total_amount = Set(totals.total_amount);
    active.tax_amount = Set(totals.tax_amount);
    active.discount_amount = Set(totals.discount_amount);
    active.grand_total = Set(totals.grand_total);
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;

    audit::enqueue(
        &txn,
        AuditEntry::new(Some(user.user_id), "order_update", "orders")
            .record(order.id)
            .old_values(old_values)
            .new_values(serde_json::json!({
                "total_amount": order.total_amount,
                "tax_amount": order.tax_amount,
                "discount_amount": order.discount_amount,
                "grand_total": order.grand_total,
            })),
    )
    .await?;
    txn.commit().await?;
    audit::deliver_best_effort(&state.orm).await;

    Ok(ApiResponse::single("Order updated", Order::try_from(order)?))
}

/// Settle a cash-on-delivery order by hand.
pub async fn update_payment_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdatePaymentStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    let next: PaymentStatus = parse_field("payment_status", &payload.payment_status)?;
    if !matches!(next, PaymentStatus::Partial | PaymentStatus::Paid) {
        return Err(AppError::Validation(
            "payment_status can only be set to partial or paid".into(),
        ));
    }

    let txn = state.orm.begin().await?;
    let existing = lock_order(&txn, id).await?;
    let owner = order_owner(&txn, &existing).await?;
    policy::authorize(Some(user), Action::Settle, Resource::Order { owner })?;

    let method: PaymentMethod = parse_field("payment_method", &existing.payment_method)?;
    if method != PaymentMethod::CashOnDelivery {
        return Err(AppError::Validation(
            "card orders are settled through payment confirmation".into(),
        ));
    }
    if existing.status == OrderStatus::Cancelled.as_ref() {
        return Err(AppError::Validation("order is cancelled".into()));
    }

    let previous = existing.payment_status.clone();
    let mut active: OrderActive = existing.into();
    active.payment_status = Set(next.to_string());
    active.paid_at = Set(match next {
        PaymentStatus::Paid => Some(Utc::now().into()),
        _ => None,
    });
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;

    audit::enqueue(
        &txn,
        AuditEntry::new(Some(user.user_id), "order_payment_update", "orders")
            .record(order.id)
            .old_values(serde_json::json!({ "payment_status": previous }))
            .new_values(serde_json::json!({ "payment_status": next })),
    )
    .await?;
    txn.commit().await?;
    audit::deliver_best_effort(&state.orm).await;

    Ok(ApiResponse::single("Payment status updated", Order::try_from(order)?))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Order", id))?;
    let owner = order_owner(&state.orm, &order).await?;
    policy::authorize(Some(user), Action::Read, Resource::Order { owner })?;

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .all(&state.orm)
        .await?;

    Ok(ApiResponse::single("OK", order_with_items(order, items)?))
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = Pagination::new(query.page, query.per_page).normalize();
    let mut condition = Condition::all();

    if policy::is_back_office(user) {
        policy::authorize(Some(user), Action::Read, Resource::Order { owner: None })?;
        if let Some(customer_id) = query.customer_id {
            condition = condition.add(OrderCol::CustomerId.eq(customer_id));
        }
    } else {
        policy::authorize(
            Some(user),
            Action::Read,
            Resource::Order {
                owner: Some(user.user_id),
            },
        )?;
        let Some(customer) = customer_for_user(&state.orm, user.user_id).await? else {
            return Ok(ApiResponse::success(
                "Ok",
                OrderList { items: Vec::new() },
                Some(Meta::new(page, limit, 0)),
            ));
        };
        condition = condition.add(OrderCol::CustomerId.eq(customer.id));
    }

    if let Some(status) = query.status.as_deref().filter(|s| !s.is_empty()) {
        let status: OrderStatus = parse_field("status", status)?;
        condition = condition.add(OrderCol::Status.eq(status.as_ref()));
    }
    if let Some(payment_status) = query.payment_status.as_deref().filter(|s| !s.is_empty()) {
        let payment_status: PaymentStatus = parse_field("payment_status", payment_status)?;
        condition = condition.add(OrderCol::PaymentStatus.eq(payment_status.as_ref()));
    }
    if let Some(channel) = query.channel.as_deref().filter(|s| !s.is_empty()) {
        let channel: OrderChannel = parse_field("channel", channel)?;
        condition = condition.add(OrderCol::Channel.eq(channel.as_ref()));
    }

    let mut finder = Orders::find().filter(condition);
    finder = match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let rows = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Ok",
        OrderList {
            items: convert_all(rows)?,
        },
        Some(meta),
    ))
}

pub(crate) async fn lock_order(txn: &DatabaseTransaction, id: Uuid) -> AppResult<OrderModel> {
    Orders::find()
        .filter(OrderCol::Id.eq(id))
        .lock(LockType::Update)
        .one(txn)
        .await?
        .ok_or_else(|| AppError::not_found("Order", id))
}

/// The user account behind the order's customer.
pub(crate) async fn order_owner<C>(conn: &C, order: &OrderModel) -> AppResult<Option<Uuid>>
where
    C: ConnectionTrait,
{
    let customer = Customers::find_by_id(order.customer_id).one(conn).await?;
    Ok(customer.map(|c| c.user_id))
}

pub(crate) async fn customer_for_user<C>(conn: &C, user_id: Uuid) -> AppResult<Option<CustomerModel>>
where
    C: ConnectionTrait,
{
    Ok(Customers::find()
        .filter(CustomerCol::UserId.eq(user_id))
        .one(conn)
        .await?)
}

pub(crate) fn order_with_items(
    order: OrderModel,
    items: Vec<OrderItemModel>,
) -> AppResult<OrderWithItems> {
    Ok(OrderWithItems {
        order: Order::try_from(order)?,
        items: items.into_iter().map(OrderItem::from).collect(),
    })
}

fn order_created_entry(user: &AuthUser, order: &OrderModel, items: &[OrderItemModel]) -> AuditEntry {
    AuditEntry::new(Some(user.user_id), "order_create", "orders")
        .record(order.id)
        .new_values(serde_json::json!({
            "order_number": order.order_number,
            "channel": order.channel,
            "grand_total": order.grand_total,
            "lines": items
                .iter()
                .map(|i| serde_json::json!({ "product_id": i.product_id, "quantity": i.quantity }))
                .collect::<Vec<_>>(),
        }))
}
