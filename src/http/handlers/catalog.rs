use axum::{
    extract::{Path, State},
    Json,
};

use crate::error::{ShopError, ShopResult};
use crate::http::views::ProductView;
use crate::state::AppState;

pub async fn list(State(state): State<AppState>) -> ShopResult<Json<Vec<ProductView>>> {
    let products = state
        .products
        .all_products()?
        .into_iter()
        .map(|product| ProductView::new(product, &state.products))
        .collect();

    Ok(Json(products))
}

pub async fn detail(State(state): State<AppState>, Path(id): Path<i64>) -> ShopResult<Json<ProductView>> {
    let product = state
        .products
        .product_by_id(id)?
        .ok_or_else(|| ShopError::NotFound("Product not found.".to_string()))?;

    Ok(Json(ProductView::new(product, &state.products)))
}
