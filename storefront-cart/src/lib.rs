pub mod models;
pub mod reconciler;
pub mod service;

pub use models::{
    AuthoritativeLine, BundleDetail, BundleLineState, LifecycleError, LineEvent, RenderableLine,
};
pub use reconciler::CartReconciler;
pub use service::{AddToCartRequest, BundleCart, CartView};
