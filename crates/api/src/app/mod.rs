//! HTTP application wiring.
//!
//! - `routes/`: handlers, one file per area
//! - `dto.rs`: request bodies, query strings and response helpers
//! - `errors.rs`: error to status/body mapping

use std::sync::Arc;

use anyhow::Context;
use axum::{
    body::Body,
    http::Request,
    routing::{get, post},
    Extension, Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{info, info_span};

use rentdesk_infra::services::{Services, Stores};
use rentdesk_infra::store::PostgresDocumentStore;

use crate::config::AppConfig;
use crate::middleware::{self, AuthState};

pub mod dto;
pub mod errors;
pub mod routes;

/// Wire stores and services from config, seed the admin account, and build
/// the router.
pub async fn build_app(config: &AppConfig) -> anyhow::Result<Router> {
    let stores = match (&config.database_url, config.use_persistent_stores) {
        (Some(url), true) => {
            let store = PostgresDocumentStore::connect(url, config.database_max_connections)
                .await
                .context("connecting to postgres")?;
            store.ensure_schema().await.context("creating document tables")?;
            info!("using postgres document store");
            Stores::postgres(&store)
        }
        _ => {
            info!("using in-memory stores");
            Stores::in_memory()
        }
    };

    let services = Services::new(stores, config.auth_settings());
    services
        .auth
        .bootstrap(config.admin.as_ref())
        .await
        .context("seeding roles and admin account")?;

    Ok(router(Arc::new(services)))
}

pub fn router(services: Arc<Services>) -> Router {
    let auth_state = AuthState {
        jwt: services.auth.validator(),
    };

    let protected = routes::router()
        .layer(Extension(services.clone()))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ));

    let public = Router::new()
        .route("/health", get(routes::system::health))
        .route("/auth/login", post(routes::auth::login))
        .layer(Extension(services));

    Router::new().merge(public).merge(protected).layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
                let request_id = req
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");
                info_span!(
                    "http_request",
                    method = %req.method(),
                    uri = %req.uri(),
                    request_id = %request_id,
                    user_id = tracing::field::Empty,
                )
            }))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(CorsLayer::permissive()),
    )
}
