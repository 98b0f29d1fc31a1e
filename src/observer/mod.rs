//! Observer registration and storage.
//!
//! One registration is an [`ObserverRecord`]: a weak reference to the
//! observing target, a delivery shape (trait method or block), and a
//! [`DeliveryOption`] filter. Records live in an [`ObserverRegistry`] that
//! never owns its targets, so a registration can never be the reason an
//! observer outlives its natural lifetime.

/// Registration record and delivery types.
pub mod record;
/// Ordered, weakly-referenced record storage.
pub mod registry;

pub use record::{
    AnyTarget, Delivery, DeliveryOption, ObserverHandle, ObserverId, ObserverRecord, StatusBlock,
    StatusListener,
};
pub use registry::ObserverRegistry;
