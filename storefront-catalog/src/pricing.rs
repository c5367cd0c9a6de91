use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use storefront_shared::Amount;
use tracing::debug;

use crate::bundle::{
    validate_selection, BundleConfiguration, BundleItemSpec, ExtraItemChargingMethod, ItemRole,
    PricingMode, ValidationError,
};

/// Priced result for one bundle selection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PriceBreakdown {
    pub pricing_mode: PricingMode,
    /// Sum mode: value of paid required items. Fixed mode: their overflow charge.
    pub required_items_total: Amount,
    /// Sum mode: value of paid addon items. Fixed mode: their overflow charge.
    pub addon_items_total: Amount,
    /// Present in fixed mode only
    pub box_price: Option<Amount>,
    /// List value of every paid unit, whatever the mode
    pub products_total: Amount,
    /// Units charged beyond the included count
    pub overflow_items_count: i32,
    pub grand_total: Amount,
}

impl PriceBreakdown {
    /// What the customer saves against buying the paid items one by one.
    pub fn savings(&self) -> Amount {
        non_negative(self.products_total - self.grand_total)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Decimal places totals are rounded to
    pub decimal_places: u32,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self { decimal_places: 2 }
    }
}

/// Bundle pricing across sum and fixed modes
#[derive(Debug, Clone, Default)]
pub struct PricingEngine {
    config: PricingConfig,
}

impl PricingEngine {
    pub fn new(config: PricingConfig) -> Self {
        Self { config }
    }

    /// Price `items` under `config`.
    ///
    /// Both the configuration and the selection are validated first; nothing is
    /// computed when either is rejected, or when a total leaves the decimal range.
    pub fn compute_total(
        &self,
        config: &BundleConfiguration,
        items: &[BundleItemSpec],
    ) -> Result<PriceBreakdown, ValidationError> {
        config.validate()?;
        validate_selection(config, items)?;

        let breakdown = match config.pricing_mode {
            PricingMode::Fixed => self.fixed_total(config, items)?,
            // Unknown was rejected by validate
            _ => self.sum_total(items)?,
        };

        debug!(
            mode = ?breakdown.pricing_mode,
            grand_total = %breakdown.grand_total,
            overflow = breakdown.overflow_items_count,
            "Bundle priced"
        );
        Ok(breakdown)
    }

    fn sum_total(&self, items: &[BundleItemSpec]) -> Result<PriceBreakdown, ValidationError> {
        let required = self.round(partition_value(items, ItemRole::Required)?);
        let addon = self.round(partition_value(items, ItemRole::Addon)?);
        let grand_total = checked_add(required, addon)?;

        Ok(PriceBreakdown {
            pricing_mode: PricingMode::Sum,
            required_items_total: required,
            addon_items_total: addon,
            box_price: None,
            products_total: grand_total,
            overflow_items_count: 0,
            grand_total,
        })
    }

    fn fixed_total(
        &self,
        config: &BundleConfiguration,
        items: &[BundleItemSpec],
    ) -> Result<PriceBreakdown, ValidationError> {
        let box_price = self.round(non_negative(config.box_price.unwrap_or_default()));
        let mut remaining_included = config.included_items_count.max(0);
        // Bounded by the selected quantity, which validate_selection keeps within i32
        let mut overflow_items_count = 0;
        let mut required = Decimal::ZERO;
        let mut addon = Decimal::ZERO;

        // Included slots are consumed in selection order; free units never take one
        for item in items {
            let quantity = item.chargeable_quantity();
            if quantity == 0 {
                continue;
            }

            let covered = remaining_included.min(quantity);
            remaining_included -= covered;
            let extra = quantity - covered;
            if extra == 0 {
                continue;
            }

            overflow_items_count += extra;
            let per_unit = match &config.extra_item_charging_method {
                ExtraItemChargingMethod::Flat { fee } => *fee,
                ExtraItemChargingMethod::UnitPrice => item.unit_price.unwrap_or_default(),
            };
            let charge = non_negative(checked_mul(per_unit, extra)?);

            match item.role {
                ItemRole::Required => required = checked_add(required, charge)?,
                ItemRole::Addon => addon = checked_add(addon, charge)?,
            }
        }

        let required = self.round(non_negative(required));
        let addon = self.round(non_negative(addon));
        let products_total = self.round(non_negative(checked_add(
            partition_value(items, ItemRole::Required)?,
            partition_value(items, ItemRole::Addon)?,
        )?));

        Ok(PriceBreakdown {
            pricing_mode: PricingMode::Fixed,
            required_items_total: required,
            addon_items_total: addon,
            box_price: Some(box_price),
            products_total,
            overflow_items_count,
            grand_total: checked_add(checked_add(box_price, required)?, addon)?,
        })
    }

    fn round(&self, amount: Amount) -> Amount {
        amount.round_dp_with_strategy(self.config.decimal_places, RoundingStrategy::MidpointAwayFromZero)
    }
}

/// Unit price times quantity over the paid items of one role, clamped at zero.
fn partition_value(items: &[BundleItemSpec], role: ItemRole) -> Result<Amount, ValidationError> {
    let total = items
        .iter()
        .filter(|item| item.role == role)
        .try_fold(Decimal::ZERO, |total, item| {
            let line = checked_mul(item.unit_price.unwrap_or_default(), item.chargeable_quantity())?;
            checked_add(total, line)
        })?;
    Ok(non_negative(total))
}

fn checked_mul(price: Amount, quantity: i32) -> Result<Amount, ValidationError> {
    price
        .checked_mul(Decimal::from(quantity))
        .ok_or(ValidationError::AmountOutOfRange)
}

fn checked_add(a: Amount, b: Amount) -> Result<Amount, ValidationError> {
    a.checked_add(b).ok_or(ValidationError::AmountOutOfRange)
}

fn non_negative(amount: Amount) -> Amount {
    amount.max(Decimal::ZERO)
}
