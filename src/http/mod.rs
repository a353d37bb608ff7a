// HTTP Module
// JSON storefront API served with axum

pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod views;

use anyhow::{Context, Result};
use axum::{
    body::Body,
    http::{header, HeaderValue, Request},
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use tower_http::{services::ServeDir, set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tracing::info;

use crate::observability::request_span;
use crate::state::AppState;

const CONTENT_SECURITY_POLICY: &str =
    "default-src 'self'; img-src 'self' data:; style-src 'self'; script-src 'self'; frame-ancestors 'self'";

/// Build the storefront router
pub fn router(state: AppState) -> Router {
    let span_state = state.clone();
    let trace = TraceLayer::new_for_http().make_span_with(move |request: &Request<Body>| {
        request_span(
            request.method().as_str(),
            request.uri().path(),
            span_state.next_request_id(),
        )
    });

    Router::new()
        .route("/health", get(handlers::health))
        .route("/products", get(handlers::catalog::list))
        .route("/products/:id", get(handlers::catalog::detail))
        .route("/basket", get(handlers::basket::show))
        .route("/basket/items", post(handlers::basket::add))
        .route(
            "/basket/items/:id",
            put(handlers::basket::set_quantity).delete(handlers::basket::remove),
        )
        .route("/basket/recalculate", post(handlers::basket::recalculate))
        .route("/checkout", get(handlers::checkout::show).post(handlers::checkout::submit))
        .route("/checkout/paypal", get(handlers::checkout::paypal_return))
        .route("/orders", get(handlers::orders::list))
        .route("/orders/last", get(handlers::orders::last))
        .route("/register", post(handlers::account::register))
        .route("/login", post(handlers::account::login))
        .route("/logout", post(handlers::account::logout))
        .route("/account", get(handlers::account::show).put(handlers::account::update))
        .route("/messages", get(handlers::messages))
        .nest_service("/images", ServeDir::new(&state.config.shop.images_dir))
        .layer(from_fn_with_state(state.clone(), middleware::session))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("SAMEORIGIN"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_XSS_PROTECTION,
            HeaderValue::from_static("1; mode=block"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CONTENT_SECURITY_POLICY,
            HeaderValue::from_static(CONTENT_SECURITY_POLICY),
        ))
        .layer(trace)
        .with_state(state)
}

/// Bind and serve until `shutdown` completes
pub async fn serve(state: AppState, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<()> {
    let address = format!("{}:{}", state.config.server.bind_addr, state.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;

    info!(address = %address, "Storefront listening");

    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
    .context("HTTP server error")?;

    info!("Storefront stopped accepting connections");
    Ok(())
}
