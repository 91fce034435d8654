pub mod activity_logs;
pub mod audit_outbox;
pub mod cart_items;
pub mod customers;
pub mod invoices;
pub mod leads;
pub mod order_items;
pub mod orders;
pub mod payments;
pub mod product_categories;
pub mod products;
pub mod users;
pub mod website_enquiries;

pub use activity_logs::Entity as ActivityLogs;
pub use audit_outbox::Entity as AuditOutbox;
pub use cart_items::Entity as CartItems;
pub use customers::Entity as Customers;
pub use invoices::Entity as Invoices;
pub use leads::Entity as Leads;
pub use order_items::Entity as OrderItems;
pub use orders::Entity as Orders;
pub use payments::Entity as Payments;
pub use product_categories::Entity as ProductCategories;
pub use products::Entity as Products;
pub use users::Entity as Users;
pub use website_enquiries::Entity as WebsiteEnquiries;
