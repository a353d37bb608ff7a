// Request handlers

pub mod account;
pub mod basket;
pub mod catalog;
pub mod checkout;
pub mod orders;

use axum::{extract::State, Json};
use serde_json::{json, Value};

use super::extract::Visitor;
use crate::error::{ShopError, ShopResult};
use crate::messages::Message;
use crate::state::AppState;

/// Run password hashing and database writes off the async workers
pub(crate) async fn blocking<R, F>(f: F) -> ShopResult<R>
where
    F: FnOnce() -> ShopResult<R> + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ShopError::Internal(format!("blocking task failed: {}", e)))?
}

/// Liveness check
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "sessions": state.sessions.len(),
    }))
}

/// Drain pending flash messages
pub async fn messages(visitor: Visitor) -> Json<Vec<Message>> {
    Json(visitor.messages().take())
}
