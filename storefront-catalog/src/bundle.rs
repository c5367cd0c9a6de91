use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use storefront_shared::{Amount, ProductId};

/// How a bundle is priced
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PricingMode {
    /// Sum of the selected items' unit prices
    Sum,
    /// A box price covering a number of included items
    Fixed,
    /// Anything the storefront does not recognize
    #[serde(other)]
    Unknown,
}

/// Policy for items beyond `included_items_count` in fixed mode
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum ExtraItemChargingMethod {
    /// Same fee for every extra unit
    Flat { fee: Amount },
    /// Each extra unit is charged at its own unit price
    #[default]
    UnitPrice,
}

/// How shipping is charged for the bundle as a unit. Not priced here.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ShippingFeeOption {
    Free,
    Flat,
    #[default]
    Calculated,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ItemRole {
    Required,
    Addon,
}

/// One selectable item within a bundle offer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BundleItemSpec {
    pub product_id: ProductId,
    pub role: ItemRole,
    #[serde(default)]
    pub is_free: bool,
    pub quantity: i32,
    #[serde(default)]
    pub unit_price: Option<Amount>,
}

impl BundleItemSpec {
    /// Items with a non-positive quantity take no part in pricing.
    pub fn is_selected(&self) -> bool {
        self.quantity > 0
    }

    /// Quantity that counts toward charges and overflow.
    pub fn chargeable_quantity(&self) -> i32 {
        if self.is_free || !self.is_selected() {
            0
        } else {
            self.quantity
        }
    }
}

/// A bundle offer as sent by the configurator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BundleConfiguration {
    pub pricing_mode: PricingMode,
    #[serde(default)]
    pub box_price: Option<Amount>,
    #[serde(default)]
    pub included_items_count: i32,
    #[serde(default)]
    pub extra_item_charging_method: ExtraItemChargingMethod,
    #[serde(default)]
    pub shipping_fee_option: ShippingFeeOption,
    #[serde(default)]
    pub show_product_prices: bool,
    #[serde(default)]
    pub items: Vec<BundleItemSpec>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Unrecognized pricing mode")]
    UnknownPricingMode,

    #[error("Fixed pricing requires a box price")]
    MissingBoxPrice,

    #[error("Box price must not be negative: {0}")]
    NegativeBoxPrice(Amount),

    #[error("Extra item fee must not be negative: {0}")]
    NegativeExtraItemFee(Amount),

    #[error("Included items count must not be negative: {0}")]
    NegativeIncludedItemsCount(i32),

    #[error("Item {product_id} needs a non-negative unit price")]
    InvalidUnitPrice { product_id: ProductId },

    #[error("Bundle has no items")]
    EmptyItems,

    #[error("Selected quantity is out of range")]
    QuantityOutOfRange,

    #[error("Bundle total is out of range")]
    AmountOutOfRange,
}

/// Check a configuration, first failing rule wins.
pub fn validate(config: BundleConfiguration) -> Result<BundleConfiguration, ValidationError> {
    config.validate()?;
    Ok(config)
}

/// Apply the per-item rules to a selection priced separately from its configuration.
pub fn validate_selection(
    config: &BundleConfiguration,
    items: &[BundleItemSpec],
) -> Result<(), ValidationError> {
    if config.requires_unit_prices() {
        check_unit_prices(items)?;
    }
    if items.is_empty() {
        return Err(ValidationError::EmptyItems);
    }
    selected_quantity(items).ok_or(ValidationError::QuantityOutOfRange)?;
    Ok(())
}

/// Total of the positive quantities, `None` when it does not fit an `i32`.
pub fn selected_quantity(items: &[BundleItemSpec]) -> Option<i32> {
    items
        .iter()
        .filter(|i| i.is_selected())
        .try_fold(0i32, |total, i| total.checked_add(i.quantity))
}

fn check_unit_prices(items: &[BundleItemSpec]) -> Result<(), ValidationError> {
    for item in items.iter().filter(|i| !i.is_free) {
        match item.unit_price {
            Some(price) if price >= Decimal::ZERO => {}
            _ => {
                return Err(ValidationError::InvalidUnitPrice {
                    product_id: item.product_id,
                })
            }
        }
    }
    Ok(())
}

impl BundleConfiguration {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.pricing_mode == PricingMode::Unknown {
            return Err(ValidationError::UnknownPricingMode);
        }

        if self.pricing_mode == PricingMode::Fixed {
            match self.box_price {
                None => return Err(ValidationError::MissingBoxPrice),
                Some(price) if price < Decimal::ZERO => {
                    return Err(ValidationError::NegativeBoxPrice(price))
                }
                Some(_) => {}
            }
            if let ExtraItemChargingMethod::Flat { fee } = &self.extra_item_charging_method {
                if *fee < Decimal::ZERO {
                    return Err(ValidationError::NegativeExtraItemFee(*fee));
                }
            }
        }

        if self.included_items_count < 0 {
            return Err(ValidationError::NegativeIncludedItemsCount(self.included_items_count));
        }

        validate_selection(self, &self.items)
    }

    /// Sum mode prices every paid item; fixed mode does when extras are charged at unit price.
    pub fn requires_unit_prices(&self) -> bool {
        match self.pricing_mode {
            PricingMode::Sum => true,
            PricingMode::Fixed => {
                self.extra_item_charging_method == ExtraItemChargingMethod::UnitPrice
            }
            PricingMode::Unknown => false,
        }
    }
}
