use serde::{Deserialize, Serialize};
use storefront_catalog::{BundleConfiguration, PriceBreakdown, PricingEngine, ValidationError};
use storefront_shared::ProductId;
use storefront_store::{CacheStore, LocalMetadataCache, StoredBundleData};
use tracing::info;

use crate::models::{AuthoritativeLine, BundleLineState, LineEvent, RenderableLine};
use crate::reconciler::CartReconciler;

/// What the add-to-cart caller transmits to the commerce backend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    pub product_id: ProductId,
    pub quantity: i32,
    pub configuration: BundleConfiguration,
    pub breakdown: PriceBreakdown,
    pub state: BundleLineState,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub lines: Vec<RenderableLine>,
    /// Cached bundles with no line in the cart
    pub orphaned: Vec<ProductId>,
}

/// Bundle side of a shopping cart for one browsing session
pub struct BundleCart<S: CacheStore> {
    cache: LocalMetadataCache<S>,
    pricing: PricingEngine,
    reconciler: CartReconciler,
}

impl<S: CacheStore> BundleCart<S> {
    pub fn new(cache: LocalMetadataCache<S>, pricing: PricingEngine) -> Self {
        Self {
            cache,
            pricing,
            reconciler: CartReconciler::new(),
        }
    }

    pub fn cache(&self) -> &LocalMetadataCache<S> {
        &self.cache
    }

    /// Price a configuration without touching the cache
    pub fn quote(&self, config: &BundleConfiguration) -> Result<PriceBreakdown, ValidationError> {
        self.pricing.compute_total(config, &config.items)
    }

    /// Validate, price and cache a bundle, returning the backend request.
    pub fn add_bundle(
        &self,
        product_id: ProductId,
        config: BundleConfiguration,
    ) -> Result<AddToCartRequest, ValidationError> {
        let breakdown = self.quote(&config)?;
        let record = StoredBundleData::from_breakdown(&config, &config.items, &breakdown);
        let quantity = record
            .implied_quantity()
            .ok_or(ValidationError::QuantityOutOfRange)?;
        self.cache.save(product_id, record);

        // Draft -> Added is always valid
        let state = BundleLineState::Draft
            .apply(LineEvent::Added)
            .unwrap_or(BundleLineState::Added);

        info!(product_id, quantity, grand_total = %breakdown.grand_total, "Bundle added to cart");
        Ok(AddToCartRequest {
            product_id,
            quantity,
            configuration: config,
            breakdown,
            state,
        })
    }

    /// Render the cart from a single load of the cache
    pub fn view(&self, lines: &[AuthoritativeLine]) -> CartView {
        let snapshot = self.cache.snapshot();
        CartView {
            lines: self.reconciler.reconcile(lines, &snapshot),
            orphaned: self.reconciler.orphans(lines, &snapshot),
        }
    }

    /// The backend removed a line; drop its cached detail
    pub fn line_removed(&self, product_id: ProductId) {
        self.cache.remove(product_id);
    }

    pub fn clear(&self) {
        self.cache.clear();
    }
}
