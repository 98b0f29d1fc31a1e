//! Observer registration record and delivery types.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::status::ReachabilityStatus;

/// Unique identifier for one observer registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObserverId(Uuid);

impl ObserverId {
    /// Create a new random observer id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for ObserverId {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-registration delivery policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryOption {
    /// Deliver every status change.
    #[default]
    All,
    /// Deliver only when the new status is reachable.
    OnlyReachable,
    /// Deliver only on a transition from non-reachable to reachable.
    /// Edge-triggered: a cellular-to-wifi change does not fire.
    ReachableAgain,
}

impl DeliveryOption {
    /// Whether a transition from `old` to `new` passes this policy.
    #[must_use]
    pub const fn should_deliver(self, old: ReachabilityStatus, new: ReachabilityStatus) -> bool {
        match self {
            Self::All => true,
            Self::OnlyReachable => new.is_reachable(),
            Self::ReachableAgain => !old.is_reachable() && new.is_reachable(),
        }
    }
}

/// The type-erased target identity stored behind each registration.
pub type AnyTarget = dyn Any + Send + Sync;

/// Method-by-stable-reference delivery.
///
/// Implement on the observing type and register with
/// `ReachabilityCoordinator::add_listener`; the method runs on the
/// notification context.
pub trait StatusListener: Send + Sync {
    /// Called with this registration's handle and the new status.
    fn reachability_changed(&self, observer: &ObserverHandle, status: ReachabilityStatus);
}

/// Block delivery shape.
///
/// The handle argument lets the block read back its own target (see
/// [`ObserverHandle::target_as`]) instead of capturing it strongly.
pub type StatusBlock = dyn Fn(&ObserverHandle, ReachabilityStatus) + Send + Sync;

/// How a passing record is invoked.
#[derive(Clone)]
pub enum Delivery {
    /// Invoke [`StatusListener::reachability_changed`] on the target.
    Listener(Weak<dyn StatusListener>),
    /// Invoke a stored block.
    Block(Arc<StatusBlock>),
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Listener(_) => f.write_str("Delivery::Listener"),
            Self::Block(_) => f.write_str("Delivery::Block"),
        }
    }
}

/// Stable handle representing one registration.
///
/// Every delivery receives the handle of the registration being invoked. A
/// block that needs its owner reads it back through [`ObserverHandle::target`]
/// rather than capturing the owner in the closure, which would otherwise
/// form a cycle (owner holds registration, registration holds owner) and
/// leak both.
#[derive(Clone)]
pub struct ObserverHandle {
    id: ObserverId,
    target: Weak<AnyTarget>,
}

impl ObserverHandle {
    pub(crate) fn new(id: ObserverId, target: Weak<AnyTarget>) -> Self {
        Self { id, target }
    }

    /// The registration this handle represents.
    #[must_use]
    pub const fn id(&self) -> ObserverId {
        self.id
    }

    /// The registration's target, if it is still alive.
    #[must_use]
    pub fn target(&self) -> Option<Arc<AnyTarget>> {
        self.target.upgrade()
    }

    /// The target downcast to its concrete type, if alive and of type `T`.
    #[must_use]
    pub fn target_as<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.target.upgrade().and_then(|t| t.downcast::<T>().ok())
    }
}

impl fmt::Debug for ObserverHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverHandle")
            .field("id", &self.id)
            .field("live", &(self.target.strong_count() > 0))
            .finish()
    }
}

/// One registration: identity, weak target, filter policy, delivery shape.
///
/// The target is never strongly owned here. A record is invalid the moment
/// its weak reference stops resolving; invalid records are pruned before or
/// during dispatch and never delivered to.
#[derive(Debug, Clone)]
pub struct ObserverRecord {
    id: ObserverId,
    target: Weak<AnyTarget>,
    option: DeliveryOption,
    delivery: Delivery,
}

impl ObserverRecord {
    pub(crate) fn new(target: Weak<AnyTarget>, option: DeliveryOption, delivery: Delivery) -> Self {
        Self {
            id: ObserverId::new(),
            target,
            option,
            delivery,
        }
    }

    /// The registration identity.
    #[must_use]
    pub const fn id(&self) -> ObserverId {
        self.id
    }

    /// The registration's filter policy.
    #[must_use]
    pub const fn option(&self) -> DeliveryOption {
        self.option
    }

    /// Whether the target can still be resolved.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.target.strong_count() > 0
    }

    /// Allocation identity of the target, for removal matching.
    pub(crate) fn target_ptr(&self) -> *const () {
        self.target.as_ptr().cast::<()>()
    }

    /// The stable handle for this registration.
    #[must_use]
    pub fn handle(&self) -> ObserverHandle {
        ObserverHandle::new(self.id, self.target.clone())
    }

    /// Invokes the delivery with `status`.
    ///
    /// Liveness is re-checked at call time: a target that died after the
    /// dispatch snapshot was taken is skipped, never delivered to.
    pub(crate) fn deliver(&self, status: ReachabilityStatus) {
        match &self.delivery {
            Delivery::Listener(listener) => {
                if let Some(listener) = listener.upgrade() {
                    listener.reachability_changed(&self.handle(), status);
                }
            }
            Delivery::Block(block) => {
                if self.is_live() {
                    block(&self.handle(), status);
                }
            }
        }
    }
}
