use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use std::collections::BTreeMap;

use crate::error::ShopResult;
use crate::http::extract::Visitor;
use crate::http::views::BasketView;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItem {
    pub product_id: i64,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
}

fn default_quantity() -> i64 {
    1
}

#[derive(Debug, Deserialize)]
pub struct SetQuantity {
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct Recalculate {
    /// Product id to new quantity
    pub quantities: BTreeMap<i64, i64>,
}

pub async fn show(State(state): State<AppState>, visitor: Visitor) -> ShopResult<Json<BasketView>> {
    let contents = visitor.basket(&state).contents()?;
    Ok(Json(BasketView::new(contents, &state.products)))
}

pub async fn add(
    State(state): State<AppState>,
    visitor: Visitor,
    Json(item): Json<AddItem>,
) -> ShopResult<Json<BasketView>> {
    let basket = visitor.basket(&state);
    basket.add(item.product_id, item.quantity)?;
    visitor.messages().success("Product has been added to your basket.");

    Ok(Json(BasketView::new(basket.contents()?, &state.products)))
}

pub async fn set_quantity(
    State(state): State<AppState>,
    visitor: Visitor,
    Path(product_id): Path<i64>,
    Json(body): Json<SetQuantity>,
) -> ShopResult<Json<BasketView>> {
    let basket = visitor.basket(&state);
    basket.set_quantity(product_id, body.quantity)?;

    Ok(Json(BasketView::new(basket.contents()?, &state.products)))
}

pub async fn remove(
    State(state): State<AppState>,
    visitor: Visitor,
    Path(product_id): Path<i64>,
) -> ShopResult<Json<BasketView>> {
    let basket = visitor.basket(&state);
    basket.remove(product_id)?;
    visitor.messages().success("Product has been removed from your basket.");

    Ok(Json(BasketView::new(basket.contents()?, &state.products)))
}

pub async fn recalculate(
    State(state): State<AppState>,
    visitor: Visitor,
    Json(body): Json<Recalculate>,
) -> ShopResult<Json<BasketView>> {
    let basket = visitor.basket(&state);
    basket.recalculate(&body.quantities)?;
    visitor.messages().success("Basket has been recalculated.");

    Ok(Json(BasketView::new(basket.contents()?, &state.products)))
}
