pub mod activity_service;
pub mod auth_service;
pub mod cart_service;
pub mod checkout_service;
pub mod customer_service;
pub mod enquiry_service;
pub mod invoice_service;
pub mod lead_service;
pub mod order_service;
pub mod payment_service;
pub mod product_service;
pub mod stock_ledger;
