pub mod bundle;
pub mod pricing;

pub use bundle::{
    selected_quantity, validate, validate_selection, BundleConfiguration, BundleItemSpec,
    ExtraItemChargingMethod, ItemRole, PricingMode, ShippingFeeOption, ValidationError,
};
pub use pricing::{PriceBreakdown, PricingConfig, PricingEngine};
