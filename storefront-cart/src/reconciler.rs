use std::collections::HashSet;
use storefront_shared::ProductId;
use storefront_store::BundleSnapshot;
use tracing::{debug, warn};

use crate::models::{AuthoritativeLine, BundleLineState, RenderableLine};

/// Merges backend cart lines with locally cached bundle detail.
///
/// Output is recomputed from scratch on every call. The reconciler never
/// writes to the cache; stale entries heal on the next save or age out.
#[derive(Debug, Clone, Default)]
pub struct CartReconciler;

impl CartReconciler {
    pub fn new() -> Self {
        Self
    }

    pub fn reconcile(
        &self,
        lines: &[AuthoritativeLine],
        snapshot: &BundleSnapshot,
    ) -> Vec<RenderableLine> {
        lines.iter().map(|line| self.reconcile_line(line, snapshot)).collect()
    }

    fn reconcile_line(&self, line: &AuthoritativeLine, snapshot: &BundleSnapshot) -> RenderableLine {
        let Some(data) = snapshot.get(line.product_id) else {
            return RenderableLine::minimal(line, BundleLineState::Evicted);
        };

        let cached_quantity = data.implied_quantity();
        if cached_quantity != Some(line.quantity) {
            warn!(
                product_id = line.product_id,
                ?cached_quantity,
                cart_quantity = line.quantity,
                "Stale bundle detail, showing cart line only"
            );
            return RenderableLine::minimal(line, BundleLineState::Stale);
        }

        if data.bundle_total != line.charged_total {
            debug!(
                product_id = line.product_id,
                cached_total = %data.bundle_total,
                charged_total = %line.charged_total,
                "Cached bundle total differs from charged total"
            );
        }

        RenderableLine::enriched(line, data.clone())
    }

    /// Cached product ids with no line in the cart. Not rendered, not deleted.
    pub fn orphans(&self, lines: &[AuthoritativeLine], snapshot: &BundleSnapshot) -> Vec<ProductId> {
        let in_cart: HashSet<ProductId> = lines.iter().map(|l| l.product_id).collect();
        snapshot
            .product_ids()
            .into_iter()
            .filter(|id| !in_cart.contains(id))
            .collect()
    }
}
