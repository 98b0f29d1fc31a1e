//! The reachability probe boundary.
//!
//! A probe is the OS-level facility that watches a socket address or route
//! and reports raw status changes. This crate does not reimplement that
//! facility; it defines the boundary ([`ReachabilityProbe`]) and provides a
//! thread-safe in-process implementation ([`InProcessProbe`]) intended for
//! embedded usage, tests, and as the default collaborator that platform
//! glue pushes observations into.

use std::any::Any;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crossbeam_channel::{Sender, TrySendError};
use serde::{Deserialize, Serialize};

use crate::error::ProbeError;

/// Raw status vocabulary reported by a probe.
///
/// Probes only ever report one of these three states; "unknown" exists on
/// the coordinator side as the state before the first report arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RawReachability {
    /// The watched route is down.
    NotReachable,
    /// The route is up over a cellular (WWAN) interface.
    Wwan,
    /// The route is up over a Wi-Fi interface.
    Wifi,
}

/// Non-blocking intake for raw probe events.
///
/// A sink is handed to the probe when monitoring starts. Reporting never
/// blocks the probe's delivery context: if the coordinator's queue is full
/// or gone, the observation is dropped and counted.
#[derive(Debug, Clone)]
pub struct ProbeSink {
    tx: Sender<RawReachability>,
    dropped: Arc<AtomicU64>,
}

impl ProbeSink {
    pub(crate) fn new(tx: Sender<RawReachability>, dropped: Arc<AtomicU64>) -> Self {
        Self { tx, dropped }
    }

    /// Reports a raw status change.
    pub fn report(&self, raw: RawReachability) {
        match self.tx.try_send(raw) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

/// An OS-level reachability monitor for one socket address.
///
/// Implementations deliver raw change events on a single dedicated context
/// (never concurrently with themselves). `start`/`stop` may briefly block
/// while installing or removing platform observers but must not block on
/// network activity.
pub trait ReachabilityProbe: Send + Sync {
    /// The socket address this probe watches.
    fn watched_address(&self) -> SocketAddr;

    /// The most recent raw status known to the probe, if any.
    fn raw_status(&self) -> Option<RawReachability>;

    /// Begins delivering raw change events into `sink`.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError::StartFailed`] when the underlying facility
    /// cannot be installed. The operation is retryable.
    fn start(&self, sink: ProbeSink) -> Result<(), ProbeError>;

    /// Stops delivering events. Events already in flight may still land.
    fn stop(&self);

    /// Downcast support for callers that need the concrete probe type.
    fn as_any(&self) -> &dyn Any;
}

#[derive(Debug)]
struct ProbeState {
    addr: SocketAddr,
    sink: Mutex<Option<ProbeSink>>,
    last_raw: Mutex<Option<RawReachability>>,
}

/// In-process reachability probe.
///
/// Observations are pushed in through a [`ProbeHandle`] by whatever watches
/// the platform (or by tests), recorded as the probe's raw status, and
/// forwarded to the coordinator's sink while monitoring is active.
///
/// # Examples
///
/// ```
/// use netreach::{InProcessProbe, RawReachability, ReachabilityProbe};
///
/// let probe = InProcessProbe::default_route();
/// let handle = probe.handle();
///
/// handle.report(RawReachability::Wifi);
/// assert_eq!(probe.raw_status(), Some(RawReachability::Wifi));
/// ```
#[derive(Debug)]
pub struct InProcessProbe {
    inner: Arc<ProbeState>,
}

impl InProcessProbe {
    /// Creates a probe watching the given socket address.
    #[must_use]
    pub fn bound_to(addr: SocketAddr) -> Self {
        Self {
            inner: Arc::new(ProbeState {
                addr,
                sink: Mutex::new(None),
                last_raw: Mutex::new(None),
            }),
        }
    }

    /// Creates a probe watching the default route (`0.0.0.0`), i.e. general
    /// internet reachability rather than a specific host.
    #[must_use]
    pub fn default_route() -> Self {
        Self::bound_to(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0))
    }

    /// Returns a cloneable handle for pushing raw observations.
    #[must_use]
    pub fn handle(&self) -> ProbeHandle {
        ProbeHandle {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Default for InProcessProbe {
    fn default() -> Self {
        Self::default_route()
    }
}

impl ReachabilityProbe for InProcessProbe {
    fn watched_address(&self) -> SocketAddr {
        self.inner.addr
    }

    fn raw_status(&self) -> Option<RawReachability> {
        *self
            .inner
            .last_raw
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn start(&self, sink: ProbeSink) -> Result<(), ProbeError> {
        // Replay the last known raw status so a coordinator that starts
        // late still converges to the probe's view.
        let last = self.raw_status();
        if let Some(raw) = last {
            sink.report(raw);
        }

        *self
            .inner
            .sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(sink);
        Ok(())
    }

    fn stop(&self) {
        *self
            .inner
            .sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Cloneable feeder handle for an [`InProcessProbe`].
///
/// The handle stays valid across `start`/`stop` cycles; observations
/// reported while monitoring is stopped update the probe's raw status but
/// are not forwarded.
#[derive(Debug, Clone)]
pub struct ProbeHandle {
    inner: Arc<ProbeState>,
}

impl ProbeHandle {
    /// Records a raw status observation and forwards it if monitoring is
    /// active. Never blocks.
    pub fn report(&self, raw: RawReachability) {
        *self
            .inner
            .last_raw
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(raw);

        let sink = self
            .inner
            .sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(sink) = sink {
            sink.report(raw);
        }
    }
}
