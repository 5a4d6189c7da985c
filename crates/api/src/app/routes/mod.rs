use axum::{routing::get, Router};

pub mod auth;
pub mod brands;
pub mod categories;
pub mod customers;
pub mod inventory;
pub mod locations;
pub mod rentals;
pub mod suppliers;
pub mod system;
pub mod transactions;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/auth", auth::router())
        .nest("/categories", categories::router())
        .nest("/brands", brands::router())
        .nest("/locations", locations::router())
        .nest("/customers", customers::router())
        .nest("/suppliers", suppliers::router())
        .nest("/inventory", inventory::router())
        .nest("/transactions", transactions::router())
        .nest("/rentals", rentals::router())
        .nest("/system", system::router())
}
