use axum::{extract::State, routing::post, Json, Router};
use storefront_catalog::{BundleConfiguration, PriceBreakdown};

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/bundles/price", post(price_bundle))
}

/// Quote a bundle without adding it to the cart
async fn price_bundle(
    State(state): State<AppState>,
    Json(config): Json<BundleConfiguration>,
) -> Result<Json<PriceBreakdown>, AppError> {
    let breakdown = state.pricing.compute_total(&config, &config.items)?;
    Ok(Json(breakdown))
}
