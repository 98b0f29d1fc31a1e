//! Reachability coordination and notification fan-out.
//!
//! The [`ReachabilityCoordinator`] owns one probe and one observer
//! registry. A dedicated worker thread forms the single notification
//! stream: it maps raw probe events to enriched statuses and fans them
//! out. Reporters enqueue events with a non-blocking `try_send` and never
//! stall; no two dispatch passes ever interleave.

use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::thread;

use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Receiver, Sender};

use crate::observer::{
    AnyTarget, Delivery, DeliveryOption, ObserverHandle, ObserverId, ObserverRegistry,
    StatusListener,
};
use crate::probe::{InProcessProbe, ProbeHandle, ProbeSink, RawReachability, ReachabilityProbe};
use crate::status::ReachabilityStatus;

/// The ambient status-change callback, invoked on every dispatch pass
/// regardless of observer filters.
pub type ChangeHandler = Arc<dyn Fn(ReachabilityStatus) + Send + Sync>;

#[allow(missing_docs)]
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Max queued raw events before reporters start dropping.
    pub event_queue_capacity: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            event_queue_capacity: 1024,
        }
    }
}

/// State shared between the coordinator handle and its worker thread.
struct SharedState {
    status: Mutex<ReachabilityStatus>,
    last_event_at: Mutex<Option<DateTime<Utc>>>,
    registry: ObserverRegistry,
    change_handler: Mutex<Option<ChangeHandler>>,
}

/// Coordinates one reachability probe and a set of observers.
///
/// The coordinator caches the last-known [`ReachabilityStatus`]
/// (`Unknown` until the first probe event), fans status transitions out to
/// registered observers according to each registration's
/// [`DeliveryOption`], and invokes the ambient change handler on every
/// pass. Observers are held weakly: destroying an observer is enough to
/// end its deliveries, no explicit removal required.
///
/// Most callers use the process-wide [`ReachabilityCoordinator::shared`]
/// instance; [`ReachabilityCoordinator::new_instance`] provides isolated
/// monitoring (e.g. a host-specific probe via
/// [`ReachabilityCoordinator::with_probe`]).
pub struct ReachabilityCoordinator {
    probe: Arc<dyn ReachabilityProbe>,
    state: Arc<SharedState>,
    event_tx: Sender<RawReachability>,
    dropped_events: Arc<AtomicU64>,
    monitoring: AtomicBool,
}

impl ReachabilityCoordinator {
    /// Returns the process-wide shared coordinator.
    ///
    /// Constructed lazily on first access with status `Unknown` and an
    /// [`InProcessProbe`] bound to the default socket address (`0.0.0.0`,
    /// general route reachability). Lives for the process lifetime.
    pub fn shared() -> &'static Self {
        static SHARED: OnceLock<ReachabilityCoordinator> = OnceLock::new();
        SHARED.get_or_init(Self::new_instance)
    }

    /// Creates an independent, non-shared coordinator with the default
    /// probe.
    #[must_use]
    pub fn new_instance() -> Self {
        Self::with_probe(
            Arc::new(InProcessProbe::default_route()),
            CoordinatorConfig::default(),
        )
    }

    /// Creates a coordinator around a specific probe.
    ///
    /// The worker thread that serializes all dispatch is spawned here;
    /// monitoring still has to be started explicitly.
    #[must_use]
    pub fn with_probe(probe: Arc<dyn ReachabilityProbe>, cfg: CoordinatorConfig) -> Self {
        let (event_tx, event_rx) = bounded::<RawReachability>(cfg.event_queue_capacity.max(1));

        let state = Arc::new(SharedState {
            status: Mutex::new(ReachabilityStatus::Unknown),
            last_event_at: Mutex::new(None),
            registry: ObserverRegistry::new(),
            change_handler: Mutex::new(None),
        });

        let worker_state = Arc::clone(&state);
        // The handle is intentionally not kept: the worker exits once the
        // last event sender is gone, and joining it could block on probe
        // sinks that outlive this coordinator.
        drop(
            thread::Builder::new()
                .name("netreach-notify".to_string())
                .spawn(move || worker_loop(&worker_state, &event_rx))
                .expect("failed to spawn netreach notify worker"),
        );

        Self {
            probe,
            state,
            event_tx,
            dropped_events: Arc::new(AtomicU64::new(0)),
            monitoring: AtomicBool::new(false),
        }
    }

    /// The probe this coordinator monitors through.
    #[must_use]
    pub fn probe(&self) -> &Arc<dyn ReachabilityProbe> {
        &self.probe
    }

    /// The feeder handle, when the underlying probe is an
    /// [`InProcessProbe`] (as it is for [`ReachabilityCoordinator::shared`]
    /// and [`ReachabilityCoordinator::new_instance`]).
    #[must_use]
    pub fn in_process_handle(&self) -> Option<ProbeHandle> {
        self.probe
            .as_any()
            .downcast_ref::<InProcessProbe>()
            .map(InProcessProbe::handle)
    }

    /// The last-known reachability status.
    ///
    /// A cached value updated only by probe events; never blocks on a
    /// fresh probe read.
    #[must_use]
    pub fn current_status(&self) -> ReachabilityStatus {
        *self
            .state
            .status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether the network is currently reachable (cellular or Wi-Fi).
    #[must_use]
    pub fn is_reachable(&self) -> bool {
        self.current_status().is_reachable()
    }

    /// When the most recent probe event was dispatched, if any.
    #[must_use]
    pub fn last_event_at(&self) -> Option<DateTime<Utc>> {
        *self
            .state
            .last_event_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Begins subscribing to the probe's raw change events.
    ///
    /// Idempotent while already monitoring. Returns whether monitoring is
    /// active after the call. A probe that fails to start is non-fatal:
    /// the status stays at its last cached value and the call may simply
    /// be retried later.
    pub fn start_monitoring(&self) -> bool {
        if self.monitoring.swap(true, Ordering::AcqRel) {
            return true;
        }

        let sink = ProbeSink::new(self.event_tx.clone(), Arc::clone(&self.dropped_events));
        match self.probe.start(sink) {
            Ok(()) => true,
            Err(_) => {
                self.monitoring.store(false, Ordering::Release);
                false
            }
        }
    }

    /// Stops subscribing to probe events.
    ///
    /// Idempotent while already stopped. The last-known status is retained
    /// across stop/start cycles; events already in flight may still be
    /// dispatched.
    pub fn stop_monitoring(&self) {
        if self.monitoring.swap(false, Ordering::AcqRel) {
            self.probe.stop();
        }
    }

    /// Whether the probe subscription is currently installed.
    #[must_use]
    pub fn is_monitoring(&self) -> bool {
        self.monitoring.load(Ordering::Acquire)
    }

    /// Registers a block observer delivering every status change.
    ///
    /// Equivalent to [`ReachabilityCoordinator::add_observer_with`] with
    /// [`DeliveryOption::All`]. Repeated registrations of the same target
    /// stack: each one is tracked and delivered independently, including
    /// byte-identical duplicates.
    pub fn add_observer<T, F>(&self, target: &Arc<T>, block: F) -> Option<ObserverId>
    where
        T: Any + Send + Sync,
        F: Fn(&ObserverHandle, ReachabilityStatus) + Send + Sync + 'static,
    {
        self.add_observer_with(target, DeliveryOption::All, block)
    }

    /// Registers a block observer with an explicit filter policy.
    ///
    /// The block receives the registration's [`ObserverHandle`] and the
    /// new status. A block that needs its owner should read it back via
    /// [`ObserverHandle::target_as`] instead of capturing it, so the
    /// registration cannot keep the owner alive.
    pub fn add_observer_with<T, F>(
        &self,
        target: &Arc<T>,
        option: DeliveryOption,
        block: F,
    ) -> Option<ObserverId>
    where
        T: Any + Send + Sync,
        F: Fn(&ObserverHandle, ReachabilityStatus) + Send + Sync + 'static,
    {
        self.state.registry.add(
            downgrade_any(target),
            option,
            Delivery::Block(Arc::new(block)),
        )
    }

    /// Registers a [`StatusListener`] observer with an explicit filter
    /// policy. The listener method is invoked by stable reference; no
    /// runtime name resolution is involved.
    pub fn add_listener<T>(&self, target: &Arc<T>, option: DeliveryOption) -> Option<ObserverId>
    where
        T: StatusListener + Any,
    {
        let listener: Arc<dyn StatusListener> = Arc::clone(target) as Arc<dyn StatusListener>;
        self.state.registry.add(
            downgrade_any(target),
            option,
            Delivery::Listener(Arc::downgrade(&listener)),
        )
    }

    /// Removes every registration of `target`. No-op when absent.
    pub fn remove_observer<T: ?Sized>(&self, target: &Arc<T>) {
        self.state.registry.remove(target);
    }

    /// Replaces the ambient status-change handler.
    ///
    /// At most one exists; each call overwrites the previous handler and
    /// `None` clears it. The handler runs on every dispatch pass before
    /// any observer, unconditionally; it has no filter option.
    pub fn set_change_handler(&self, handler: Option<ChangeHandler>) {
        *self
            .state
            .change_handler
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = handler;
    }

    /// Number of currently resolvable registrations.
    #[must_use]
    pub fn live_observer_count(&self) -> usize {
        self.state.registry.live_count()
    }

    /// Raw events dropped at intake because the queue was full.
    #[must_use]
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }
}

impl Drop for ReachabilityCoordinator {
    fn drop(&mut self) {
        self.stop_monitoring();

        // Close our intake sender so the worker can terminate. The worker
        // stays alive while probe sinks still hold senders and exits when
        // the last one is dropped; it is never joined (see `with_probe`).
        let (dummy_tx, _) = bounded::<RawReachability>(1);
        drop(std::mem::replace(&mut self.event_tx, dummy_tx));
    }
}

impl std::fmt::Debug for ReachabilityCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReachabilityCoordinator")
            .field("status", &self.current_status())
            .field("monitoring", &self.is_monitoring())
            .field("live_observers", &self.live_observer_count())
            .field("watched_address", &self.probe.watched_address())
            .finish_non_exhaustive()
    }
}

fn downgrade_any<T: Any + Send + Sync>(target: &Arc<T>) -> std::sync::Weak<AnyTarget> {
    let any: Arc<AnyTarget> = Arc::clone(target) as Arc<AnyTarget>;
    Arc::downgrade(&any)
}

fn worker_loop(state: &SharedState, event_rx: &Receiver<RawReachability>) {
    while let Ok(raw) = event_rx.recv() {
        dispatch(state, raw);
    }
}

/// One full dispatch pass for a raw probe event.
///
/// Runs entirely on the notify worker, so passes never interleave and
/// every observer sees transitions in probe order. Identical consecutive
/// raw statuses are not deduplicated; the edge-triggered filter handles
/// them correctly on its own.
fn dispatch(state: &SharedState, raw: RawReachability) {
    let new_status = ReachabilityStatus::from(raw);

    let old_status = {
        let mut guard = state.status.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, new_status)
    };
    *state
        .last_event_at
        .lock()
        .unwrap_or_else(PoisonError::into_inner) = Some(Utc::now());

    // Clone the handler out so a callback can replace it without
    // deadlocking against its own invocation.
    let handler = state
        .change_handler
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone();
    if let Some(handler) = handler {
        handler(new_status);
    }

    state.registry.prune_expired();
    for record in state.registry.snapshot_live() {
        if record.option().should_deliver(old_status, new_status) {
            record.deliver(new_status);
        }
    }
}
