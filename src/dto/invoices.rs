use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::{Invoice, Payment};

/// Either `order_id` or both `customer_id` and `total_amount`.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
pub struct CreateInvoiceRequest {
    pub order_id: Option<Uuid>,
    pub customer_id: Option<Uuid>,
    #[validate(range(min = 0))]
    pub total_amount: Option<i64>,
    pub invoice_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateInvoiceStatusRequest {
    pub status: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct InvoiceWithPayments {
    pub invoice: Invoice,
    pub payments: Vec<Payment>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct InvoiceList {
    #[schema(value_type = Vec<Invoice>)]
    pub items: Vec<Invoice>,
}
