use axum::{extract::State, Json};

use crate::error::{ShopError, ShopResult};
use crate::http::extract::Visitor;
use crate::orders::{last_order_id, Order, ORDER_SECTION};
use crate::state::AppState;

const LOGIN_REQUIRED: &str = "You have to be logged in to see your orders.";

/// Order history, newest first
pub async fn list(State(state): State<AppState>, visitor: Visitor) -> ShopResult<Json<Vec<Order>>> {
    let identity = visitor.require_login(&state, "/orders", LOGIN_REQUIRED)?;
    Ok(Json(state.orders.orders_for(identity.id, None)?))
}

/// The order this session has just placed
pub async fn last(State(state): State<AppState>, visitor: Visitor) -> ShopResult<Json<Order>> {
    let identity = visitor.require_login(&state, "/orders/last", LOGIN_REQUIRED)?;
    let not_found = || ShopError::NotFound("Order not found.".to_string());

    let order_id = last_order_id(&visitor.session.section(ORDER_SECTION)).ok_or_else(not_found)?;
    let order = state.orders.order_for(identity.id, order_id)?.ok_or_else(not_found)?;

    Ok(Json(order))
}
