use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use storefront_catalog::{
    selected_quantity, BundleConfiguration, BundleItemSpec, PriceBreakdown, PricingMode,
};
use storefront_shared::Amount;
use tracing::debug;

/// Last known composition of a bundle cart line.
///
/// The commerce backend does not keep per-line bundle metadata, so this
/// snapshot is what the cart view renders detail from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredBundleData {
    pub bundle_items: Vec<BundleItemSpec>,
    pub bundle_total: Amount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub box_price: Option<Amount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub products_total: Option<Amount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_items_total: Option<Amount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addon_items_total: Option<Amount>,
    pub pricing_mode: PricingMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_price: Option<Amount>,
    /// Explicit line quantity, when the writer knew it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<i32>,
    /// Epoch milliseconds of the last save
    #[serde(default)]
    pub timestamp: i64,
}

impl StoredBundleData {
    /// Snapshot of a priced selection, ready to be saved.
    pub fn from_breakdown(
        config: &BundleConfiguration,
        items: &[BundleItemSpec],
        breakdown: &PriceBreakdown,
    ) -> Self {
        let fixed_price = match config.pricing_mode {
            PricingMode::Fixed => Some(breakdown.grand_total),
            _ => None,
        };

        Self {
            bundle_items: items.iter().filter(|i| i.is_selected()).cloned().collect(),
            bundle_total: breakdown.grand_total,
            box_price: breakdown.box_price,
            products_total: Some(breakdown.products_total),
            required_items_total: Some(breakdown.required_items_total),
            addon_items_total: Some(breakdown.addon_items_total),
            pricing_mode: breakdown.pricing_mode,
            fixed_price,
            quantity: None,
            timestamp: 0,
        }
    }

    /// Quantity the cart line should carry for this snapshot to be current.
    ///
    /// `None` when the item quantities do not add up within `i32`.
    pub fn implied_quantity(&self) -> Option<i32> {
        match self.quantity {
            Some(quantity) => Some(quantity),
            None => selected_quantity(&self.bundle_items),
        }
    }

    pub fn age_millis(&self, now_millis: i64) -> i64 {
        now_millis.saturating_sub(self.timestamp)
    }

    /// Saved no later than shortly after `now_millis` and no older than `max_age_millis`.
    pub fn is_live(&self, now_millis: i64, max_age_millis: i64) -> bool {
        self.timestamp <= now_millis.saturating_add(CLOCK_SKEW_TOLERANCE_MILLIS)
            && self.age_millis(now_millis) <= max_age_millis
    }
}

/// How far in the future a saved timestamp may lie before the entry is distrusted
pub const CLOCK_SKEW_TOLERANCE_MILLIS: i64 = 5 * 60 * 1000;

/// Outcome of loading the persisted map
#[derive(Debug, Default)]
pub struct LoadedMap {
    pub entries: BTreeMap<String, StoredBundleData>,
    /// Keys dropped because they were expired or did not load
    pub pruned: usize,
}

/// Turn the untyped persisted value into trusted entries.
///
/// Returns `None` when the top-level value is not a keyed object. Entries that
/// are expired, stamped in the future, malformed, or filed under a non-numeric
/// key are dropped.
pub fn load_entries(raw: Value, now_millis: i64, max_age_millis: i64) -> Option<LoadedMap> {
    let Value::Object(object) = raw else {
        return None;
    };

    let mut loaded = LoadedMap::default();
    for (key, value) in object {
        if key.parse::<u64>().is_err() {
            loaded.pruned += 1;
            continue;
        }
        match serde_json::from_value::<StoredBundleData>(value) {
            Ok(entry) if entry.implied_quantity().is_none() => {
                debug!(product_id = %key, "Dropping bundle entry with out of range quantities");
                loaded.pruned += 1;
            }
            Ok(entry) if entry.is_live(now_millis, max_age_millis) => {
                loaded.entries.insert(key, entry);
            }
            Ok(_) => {
                debug!(product_id = %key, "Bundle entry expired or stamped in the future");
                loaded.pruned += 1;
            }
            Err(e) => {
                debug!(product_id = %key, error = %e, "Dropping unreadable bundle entry");
                loaded.pruned += 1;
            }
        }
    }
    Some(loaded)
}
