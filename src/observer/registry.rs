//! Ordered, weakly-referenced observer storage.
//!
//! The registry holds [`ObserverRecord`]s in registration order behind a
//! mutex. Dispatch never iterates the live vector: it prunes, then takes a
//! snapshot, so registration and removal from other threads can never
//! corrupt an active pass. No operation here returns an error; a poisoned
//! lock is recovered because the records it guards are still valid.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use super::record::{AnyTarget, Delivery, DeliveryOption, ObserverId, ObserverRecord};

/// Ordered collection of observer registrations.
///
/// Targets are held weakly: once a target's storage is reclaimed its
/// records stop resolving and are excluded from every future dispatch with
/// no explicit removal call. The registry is never the reason a target
/// stays alive.
#[derive(Debug, Default)]
pub struct ObserverRegistry {
    records: Mutex<Vec<ObserverRecord>>,
}

impl ObserverRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a registration for `target`.
    ///
    /// Duplicate targets are legal and tracked independently (repeated
    /// registrations stack; nothing is deduplicated). A target that is
    /// already dead at registration time creates no record and returns
    /// `None`: liveness of such a registration could never be tracked.
    pub fn add(
        &self,
        target: Weak<AnyTarget>,
        option: DeliveryOption,
        delivery: Delivery,
    ) -> Option<ObserverId> {
        if target.strong_count() == 0 {
            return None;
        }

        let record = ObserverRecord::new(target, option, delivery);
        let id = record.id();
        self.lock().push(record);
        Some(id)
    }

    /// Removes every registration whose target is the given allocation.
    ///
    /// No-op when the target was never registered.
    pub fn remove<T: ?Sized>(&self, target: &Arc<T>) {
        let ptr = Arc::as_ptr(target).cast::<()>();
        self.lock().retain(|r| r.target_ptr() != ptr);
    }

    /// Drops all records whose target no longer resolves.
    pub fn prune_expired(&self) {
        self.lock().retain(ObserverRecord::is_live);
    }

    /// Ordered copy of the records whose targets currently resolve.
    ///
    /// Registration order is preserved so delivery stays deterministic.
    #[must_use]
    pub fn snapshot_live(&self) -> Vec<ObserverRecord> {
        self.lock()
            .iter()
            .filter(|r| r.is_live())
            .cloned()
            .collect()
    }

    /// Number of currently resolvable registrations.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.lock().iter().filter(|r| r.is_live()).count()
    }

    /// Total stored records, including not-yet-pruned dead ones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the registry stores no records at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ObserverRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
