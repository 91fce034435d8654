pub mod activity;
pub mod auth;
pub mod cart;
pub mod customers;
pub mod enquiries;
pub mod invoices;
pub mod leads;
pub mod orders;
pub mod payments;
pub mod products;
