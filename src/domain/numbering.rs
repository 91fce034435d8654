use chrono::Utc;
use uuid::Uuid;

pub const ORDER: &str = "ORD";
pub const INVOICE: &str = "INV";
pub const PAYMENT: &str = "PAY";
pub const LEAD: &str = "LEAD";
pub const ENQUIRY: &str = "ENQ";
pub const CUSTOMER: &str = "CUST";

pub fn document_number(prefix: &str) -> String {
    let date = Utc::now().format("%Y%m%d");
    let random = Uuid::new_v4().simple().to_string();
    format!("{prefix}-{date}-{}", random[..12].to_uppercase())
}
