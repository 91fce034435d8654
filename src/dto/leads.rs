use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::Lead;

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateLeadRequest {
    #[validate(length(min = 1, max = 200))]
    pub company_name: String,
    #[validate(length(min = 1, max = 100))]
    pub contact_person: String,
    #[validate(email)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    pub source: Option<String>,
    #[validate(range(min = 0))]
    pub estimated_value: Option<i64>,
    pub notes: Option<String>,
    pub assigned_to: Option<Uuid>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateLeadStatusRequest {
    pub status: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct LeadList {
    #[schema(value_type = Vec<Lead>)]
    pub items: Vec<Lead>,
}
