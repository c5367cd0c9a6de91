pub mod money;

pub use money::Amount;

/// Commerce backend product identifier, shared as the join key between
/// cart lines and locally cached bundle detail.
pub type ProductId = u64;
