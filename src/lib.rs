//! # netreach - Network reachability with observer fan-out
//!
//! netreach reports device network reachability (unreachable, cellular,
//! Wi-Fi) and notifies interested parties when it changes. The underlying
//! OS-level monitoring facility is a pluggable collaborator behind the
//! [`ReachabilityProbe`] trait; the crate's core is the coordination
//! layer: a process-wide coordinator, an ordered observer registry with
//! weak-reference lifetime tracking, and deterministic, leak-free
//! notification fan-out.
//!
//! ## Core Concepts
//!
//! - **Status**: coarse connectivity classification for a route
//! - **Probe**: the facility that detects and reports raw status changes
//! - **Observer record**: one registration of interest, with its own
//!   delivery policy
//! - **Coordinator**: the singleton that enriches probe events and fans
//!   them out
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use netreach::{DeliveryOption, RawReachability, ReachabilityCoordinator};
//!
//! let coordinator = ReachabilityCoordinator::new_instance();
//! coordinator.start_monitoring();
//!
//! // Observers live only as long as their target: dropping `session`
//! // ends its deliveries with no explicit removal.
//! let session = Arc::new(String::from("sync-session"));
//! let _id = coordinator.add_observer_with(&session, DeliveryOption::ReachableAgain, |observer, status| {
//!     // Read the owner back through the handle; capturing `session`
//!     // here would keep it alive forever.
//!     if let Some(session) = observer.target_as::<String>() {
//!         println!("{session}: back online as {status}");
//!     }
//! });
//!
//! // Platform glue pushes raw observations into the default probe.
//! let handle = coordinator.in_process_handle().unwrap();
//! handle.report(RawReachability::Wifi);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod coordinator;
pub mod error;
pub mod observer;
pub mod probe;
pub mod status;

// Re-export primary types at crate root for convenience
pub use coordinator::{ChangeHandler, CoordinatorConfig, ReachabilityCoordinator};
pub use error::{ProbeError, ReachError, ReachResult};
pub use observer::{
    Delivery, DeliveryOption, ObserverHandle, ObserverId, ObserverRecord, ObserverRegistry,
    StatusListener,
};
pub use probe::{InProcessProbe, ProbeHandle, ProbeSink, RawReachability, ReachabilityProbe};
pub use status::ReachabilityStatus;
