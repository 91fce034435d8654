use axum::Router;

use crate::state::AppState;

pub mod activity;
pub mod auth;
pub mod cart;
pub mod customers;
pub mod doc;
pub mod enquiries;
pub mod health;
pub mod invoices;
pub mod leads;
pub mod orders;
pub mod params;
pub mod payments;
pub mod products;

// Build the API router without binding state; it will be provided at the top level.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/products", products::router())
        .nest("/customers", customers::router())
        .nest("/cart", cart::router())
        .nest("/orders", orders::router())
        .nest("/invoices", invoices::router())
        .nest("/payments", payments::router())
        .nest("/leads", leads::router())
        .nest("/enquiries", enquiries::router())
        .nest("/activity", activity::router())
}
