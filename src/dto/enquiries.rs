use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::{Enquiry, Lead};

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SubmitEnquiryRequest {
    pub enquiry_type: Option<String>,
    #[serde(default)]
    pub company_name: String,
    #[validate(length(min = 1, max = 100))]
    pub contact_person: String,
    #[validate(email)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[validate(length(min = 1, max = 200))]
    pub subject: String,
    #[validate(length(min = 1))]
    pub message: String,
    pub interested_product_id: Option<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ConvertedEnquiry {
    pub enquiry: Enquiry,
    pub lead: Lead,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct EnquiryList {
    #[schema(value_type = Vec<Enquiry>)]
    pub items: Vec<Enquiry>,
}
