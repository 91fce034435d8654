use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::Payment;

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct RecordPaymentRequest {
    pub invoice_id: Uuid,
    #[validate(range(min = 1))]
    pub amount: i64,
    pub payment_method: String,
    pub payment_date: Option<NaiveDate>,
    pub reference_number: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct PaymentList {
    #[schema(value_type = Vec<Payment>)]
    pub items: Vec<Payment>,
}
