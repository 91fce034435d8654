use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::Customer;

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateCustomerRequest {
    pub user_id: Uuid,
    pub customer_type: Option<String>,
    #[serde(default)]
    pub billing_address: String,
    #[serde(default)]
    pub shipping_address: String,
    #[validate(range(min = 0))]
    pub credit_limit: Option<i64>,
    #[serde(default)]
    pub tax_number: String,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct UpdateCustomerRequest {
    pub customer_type: Option<String>,
    pub billing_address: Option<String>,
    pub shipping_address: Option<String>,
    #[validate(range(min = 0))]
    pub credit_limit: Option<i64>,
    pub tax_number: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct CustomerList {
    #[schema(value_type = Vec<Customer>)]
    pub items: Vec<Customer>,
}
