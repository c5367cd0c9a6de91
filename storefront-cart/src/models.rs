use serde::{Deserialize, Serialize};
use storefront_catalog::{BundleItemSpec, PricingMode};
use storefront_shared::{money, Amount, ProductId};
use storefront_store::StoredBundleData;

/// A cart line as reported by the commerce backend. Read, never written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuthoritativeLine {
    pub product_id: ProductId,
    pub quantity: i32,
    #[serde(with = "money::amount")]
    pub charged_total: Amount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Lifecycle of a bundle cart line
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BundleLineState {
    /// Being configured, nothing persisted
    Draft,
    /// Validated, priced, sent to the backend and cached
    Added,
    /// Cached detail agrees with the backend line
    Reconciled,
    /// Cached detail disagrees with the backend line
    Stale,
    /// No cached detail
    Evicted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEvent {
    Added,
    Matched,
    Diverged,
    Evicted,
}

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("Invalid line transition from {from:?} on {event:?}")]
    InvalidTransition {
        from: BundleLineState,
        event: LineEvent,
    },
}

impl BundleLineState {
    pub fn apply(self, event: LineEvent) -> Result<Self, LifecycleError> {
        use BundleLineState::*;

        let next = match (self, event) {
            (Draft | Evicted, LineEvent::Added) => Added,
            (Added | Reconciled | Stale, LineEvent::Matched) => Reconciled,
            (Added | Reconciled | Stale, LineEvent::Diverged) => Stale,
            (Added | Reconciled | Stale, LineEvent::Evicted) => Evicted,
            (from, event) => return Err(LifecycleError::InvalidTransition { from, event }),
        };
        Ok(next)
    }

    /// Whether cached detail may be shown for a line in this state
    pub fn shows_detail(self) -> bool {
        self == BundleLineState::Reconciled
    }
}

/// Cached bundle breakdown, only attached to reconciled lines
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BundleDetail {
    pub pricing_mode: PricingMode,
    pub items: Vec<BundleItemSpec>,
    pub free_items: Vec<BundleItemSpec>,
    pub required_items_total: Option<Amount>,
    pub addon_items_total: Option<Amount>,
    pub box_price: Option<Amount>,
    pub fixed_price: Option<Amount>,
    pub products_total: Option<Amount>,
    /// Total computed when the bundle was added. Display uses the charged total.
    pub bundle_total: Amount,
}

impl From<StoredBundleData> for BundleDetail {
    fn from(data: StoredBundleData) -> Self {
        let (free_items, items): (Vec<_>, Vec<_>) =
            data.bundle_items.into_iter().partition(|item| item.is_free);

        Self {
            pricing_mode: data.pricing_mode,
            items,
            free_items,
            required_items_total: data.required_items_total,
            addon_items_total: data.addon_items_total,
            box_price: data.box_price,
            fixed_price: data.fixed_price,
            products_total: data.products_total,
            bundle_total: data.bundle_total,
        }
    }
}

/// A cart line ready for display
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RenderableLine {
    pub product_id: ProductId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub quantity: i32,
    /// Always the backend's figure
    #[serde(with = "money::amount")]
    pub charged_total: Amount,
    pub state: BundleLineState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle: Option<BundleDetail>,
}

impl RenderableLine {
    /// Authoritative data only, no bundle breakdown
    pub fn minimal(line: &AuthoritativeLine, state: BundleLineState) -> Self {
        Self {
            product_id: line.product_id,
            name: line.name.clone(),
            quantity: line.quantity,
            charged_total: line.charged_total,
            state,
            bundle: None,
        }
    }

    pub fn enriched(line: &AuthoritativeLine, data: StoredBundleData) -> Self {
        Self {
            bundle: Some(data.into()),
            ..Self::minimal(line, BundleLineState::Reconciled)
        }
    }

    pub fn is_enriched(&self) -> bool {
        self.bundle.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_line_lifecycle() {
        let state = BundleLineState::Draft.apply(LineEvent::Added).unwrap();
        assert_eq!(state, BundleLineState::Added);

        let state = state.apply(LineEvent::Matched).unwrap();
        assert_eq!(state, BundleLineState::Reconciled);

        let state = state.apply(LineEvent::Diverged).unwrap();
        assert_eq!(state, BundleLineState::Stale);

        let state = state.apply(LineEvent::Matched).unwrap();
        assert!(state.shows_detail());

        let state = state.apply(LineEvent::Evicted).unwrap();
        assert_eq!(state, BundleLineState::Evicted);

        // A new add starts the cycle again
        assert_eq!(state.apply(LineEvent::Added).unwrap(), BundleLineState::Added);
    }

    #[test]
    fn test_invalid_transitions() {
        assert!(BundleLineState::Draft.apply(LineEvent::Matched).is_err());
        assert!(BundleLineState::Draft.apply(LineEvent::Evicted).is_err());
        assert!(BundleLineState::Evicted.apply(LineEvent::Diverged).is_err());
        assert!(BundleLineState::Reconciled.apply(LineEvent::Added).is_err());
    }

    #[test]
    fn test_authoritative_line_accepts_string_total() {
        let line: AuthoritativeLine =
            serde_json::from_str(r#"{"productId": 9, "quantity": 2, "chargedTotal": "49.90"}"#).unwrap();
        assert_eq!(line.charged_total, Decimal::new(4990, 2));
        assert_eq!(line.name, None);

        let line: AuthoritativeLine =
            serde_json::from_str(r#"{"productId": 9, "quantity": 2, "chargedTotal": 49.9}"#).unwrap();
        assert_eq!(line.charged_total, Decimal::new(499, 1));
    }
}
