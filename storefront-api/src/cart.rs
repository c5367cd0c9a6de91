use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{delete, post},
    Json, Router,
};
use serde::Deserialize;
use storefront_cart::{AddToCartRequest, AuthoritativeLine, CartView};
use storefront_catalog::BundleConfiguration;
use storefront_shared::ProductId;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/cart", delete(clear_cart))
        .route("/cart/bundles", post(add_bundle))
        .route("/cart/view", post(view_cart))
        .route("/cart/lines/{product_id}", delete(remove_line))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddBundleBody {
    pub product_id: ProductId,
    pub configuration: BundleConfiguration,
}

#[derive(Debug, Deserialize)]
pub struct ViewCartBody {
    /// Cart lines as fetched from the commerce backend
    pub lines: Vec<AuthoritativeLine>,
}

async fn add_bundle(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<AddBundleBody>,
) -> Result<(StatusCode, Json<AddToCartRequest>), AppError> {
    let request = state
        .with_cart(&headers, move |cart| cart.add_bundle(body.product_id, body.configuration))
        .await??;
    Ok((StatusCode::CREATED, Json(request)))
}

async fn view_cart(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ViewCartBody>,
) -> Result<Json<CartView>, AppError> {
    let view = state.with_cart(&headers, move |cart| cart.view(&body.lines)).await?;
    Ok(Json(view))
}

async fn remove_line(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(product_id): Path<ProductId>,
) -> Result<StatusCode, AppError> {
    state.with_cart(&headers, move |cart| cart.line_removed(product_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn clear_cart(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    state.with_cart(&headers, |cart| cart.clear()).await?;
    Ok(StatusCode::NO_CONTENT)
}
