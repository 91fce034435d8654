use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::{Order, OrderItem};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct LineItemRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1))]
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct PlaceOrderRequest {
    pub customer_id: Uuid,
    #[validate(length(min = 1), nested)]
    pub lines: Vec<LineItemRequest>,
    #[validate(length(min = 1))]
    pub shipping_address: String,
    pub billing_address: Option<String>,
    /// `cash_on_delivery` or `card`.
    pub payment_method: String,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub tax_amount: i64,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub discount_amount: i64,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CheckoutRequest {
    /// Falls back to the customer's stored shipping address.
    pub shipping_address: Option<String>,
    pub billing_address: Option<String>,
    pub payment_method: String,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: String,
}

/// `grand_total` is accepted for compatibility and ignored; it is always
/// recomputed from the other three figures.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateOrderTotalsRequest {
    pub total_amount: Option<i64>,
    pub tax_amount: Option<i64>,
    pub discount_amount: Option<i64>,
    pub grand_total: Option<i64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdatePaymentStatusRequest {
    pub payment_status: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ConfirmPaymentRequest {
    pub intent_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<Order>,
}
