use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver};

use netreach::{
    DeliveryOption, ObserverHandle, ProbeHandle, RawReachability, ReachabilityCoordinator,
    ReachabilityStatus, StatusListener,
};

const WAIT: Duration = Duration::from_secs(1);

fn started_coordinator() -> (ReachabilityCoordinator, ProbeHandle) {
    let coordinator = ReachabilityCoordinator::new_instance();
    let handle = coordinator.in_process_handle().unwrap();
    assert!(coordinator.start_monitoring());
    (coordinator, handle)
}

/// Registers a tail observer used to detect the end of a dispatch pass.
///
/// Dispatch walks records in registration order, so once the tail observer
/// has seen a status, every observer registered before it has already been
/// considered for that pass.
fn add_flush(coordinator: &ReachabilityCoordinator) -> (Arc<()>, Receiver<ReachabilityStatus>) {
    let anchor = Arc::new(());
    let (tx, rx) = unbounded();
    coordinator
        .add_observer(&anchor, move |_, status| {
            let _ = tx.send(status);
        })
        .unwrap();
    (anchor, rx)
}

fn pump(handle: &ProbeHandle, raw: RawReachability, flush_rx: &Receiver<ReachabilityStatus>) {
    handle.report(raw);
    flush_rx.recv_timeout(WAIT).unwrap();
}

#[test]
fn status_transitions_fan_out_with_filters() {
    let (coordinator, handle) = started_coordinator();

    let a = Arc::new(());
    let (a_tx, a_rx) = unbounded();
    coordinator
        .add_observer_with(&a, DeliveryOption::All, move |_, status| {
            let _ = a_tx.send(status);
        })
        .unwrap();

    let b = Arc::new(());
    let (b_tx, b_rx) = unbounded();
    coordinator
        .add_observer_with(&b, DeliveryOption::ReachableAgain, move |_, status| {
            let _ = b_tx.send(status);
        })
        .unwrap();

    let (_anchor, flush_rx) = add_flush(&coordinator);

    // Unknown -> WiFi: both fire (Unknown is not reachable, so this is an
    // edge into reachability).
    pump(&handle, RawReachability::Wifi, &flush_rx);
    assert_eq!(
        a_rx.recv_timeout(WAIT).unwrap(),
        ReachabilityStatus::ReachableViaWiFi
    );
    assert_eq!(
        b_rx.recv_timeout(WAIT).unwrap(),
        ReachabilityStatus::ReachableViaWiFi
    );

    // WiFi -> Cellular: both reachable, so the edge-triggered observer
    // stays silent.
    pump(&handle, RawReachability::Wwan, &flush_rx);
    assert_eq!(
        a_rx.recv_timeout(WAIT).unwrap(),
        ReachabilityStatus::ReachableViaCellular
    );
    assert!(b_rx.try_recv().is_err());

    assert_eq!(
        coordinator.current_status(),
        ReachabilityStatus::ReachableViaCellular
    );
    assert!(coordinator.is_reachable());
}

#[test]
fn only_reachable_filter_suppresses_unreachable_transitions() {
    let (coordinator, handle) = started_coordinator();

    let target = Arc::new(());
    let (tx, rx) = unbounded();
    coordinator
        .add_observer_with(&target, DeliveryOption::OnlyReachable, move |_, status| {
            let _ = tx.send(status);
        })
        .unwrap();

    let (_anchor, flush_rx) = add_flush(&coordinator);

    pump(&handle, RawReachability::Wifi, &flush_rx);
    pump(&handle, RawReachability::NotReachable, &flush_rx);
    pump(&handle, RawReachability::Wwan, &flush_rx);

    assert_eq!(
        rx.recv_timeout(WAIT).unwrap(),
        ReachabilityStatus::ReachableViaWiFi
    );
    assert_eq!(
        rx.recv_timeout(WAIT).unwrap(),
        ReachabilityStatus::ReachableViaCellular
    );
    assert!(rx.try_recv().is_err());
}

#[test]
fn destroyed_observer_gets_no_deliveries_and_is_reclaimed() {
    let (coordinator, handle) = started_coordinator();

    let target = Arc::new(String::from("short-lived"));
    let target_weak = Arc::downgrade(&target);
    let (tx, rx) = unbounded();
    coordinator
        .add_observer(&target, move |_, status| {
            let _ = tx.send(status);
        })
        .unwrap();

    let (_anchor, flush_rx) = add_flush(&coordinator);

    pump(&handle, RawReachability::Wifi, &flush_rx);
    assert_eq!(
        rx.recv_timeout(WAIT).unwrap(),
        ReachabilityStatus::ReachableViaWiFi
    );

    // No explicit removal: dropping the target is enough.
    drop(target);
    assert!(
        target_weak.upgrade().is_none(),
        "registration must not extend the target's lifetime"
    );

    pump(&handle, RawReachability::Wwan, &flush_rx);
    assert!(rx.try_recv().is_err());

    // The dead record was pruned during dispatch; only the flush anchor
    // remains.
    assert_eq!(coordinator.live_observer_count(), 1);
}

#[test]
fn remove_observer_clears_all_registrations() {
    let (coordinator, handle) = started_coordinator();

    let target = Arc::new(());
    let (tx, rx) = unbounded();
    let tx2 = tx.clone();
    coordinator
        .add_observer(&target, move |_, status| {
            let _ = tx.send(status);
        })
        .unwrap();
    coordinator
        .add_observer_with(&target, DeliveryOption::OnlyReachable, move |_, status| {
            let _ = tx2.send(status);
        })
        .unwrap();

    let (_anchor, flush_rx) = add_flush(&coordinator);

    coordinator.remove_observer(&target);
    pump(&handle, RawReachability::Wifi, &flush_rx);

    assert!(rx.try_recv().is_err());
    assert_eq!(coordinator.live_observer_count(), 1);
}

#[test]
fn global_handler_keeps_only_the_latest() {
    let (coordinator, handle) = started_coordinator();
    let (_anchor, flush_rx) = add_flush(&coordinator);

    let (first_tx, first_rx) = unbounded();
    coordinator.set_change_handler(Some(Arc::new(move |status| {
        let _ = first_tx.send(status);
    })));

    let (second_tx, second_rx) = unbounded();
    coordinator.set_change_handler(Some(Arc::new(move |status| {
        let _ = second_tx.send(status);
    })));

    // The global handler has no filter: it fires even for unreachable
    // transitions.
    pump(&handle, RawReachability::NotReachable, &flush_rx);

    assert_eq!(
        second_rx.recv_timeout(WAIT).unwrap(),
        ReachabilityStatus::NotReachable
    );
    assert!(first_rx.try_recv().is_err());

    // Clearing stops it entirely.
    coordinator.set_change_handler(None);
    pump(&handle, RawReachability::Wifi, &flush_rx);
    assert!(second_rx.try_recv().is_err());
}

#[test]
fn stop_monitoring_retains_status_and_restart_converges() {
    let (coordinator, handle) = started_coordinator();
    let (_anchor, flush_rx) = add_flush(&coordinator);

    pump(&handle, RawReachability::Wifi, &flush_rx);
    assert_eq!(
        coordinator.current_status(),
        ReachabilityStatus::ReachableViaWiFi
    );

    coordinator.stop_monitoring();
    assert!(!coordinator.is_monitoring());

    // Observations while stopped reach the probe but not the coordinator;
    // the last-known status is retained, not reset.
    handle.report(RawReachability::Wwan);
    assert_eq!(
        coordinator.current_status(),
        ReachabilityStatus::ReachableViaWiFi
    );

    // Restarting replays the probe's current view.
    assert!(coordinator.start_monitoring());
    assert_eq!(
        flush_rx.recv_timeout(WAIT).unwrap(),
        ReachabilityStatus::ReachableViaCellular
    );
    assert_eq!(
        coordinator.current_status(),
        ReachabilityStatus::ReachableViaCellular
    );
}

#[test]
fn duplicate_registrations_deliver_independently() {
    let (coordinator, handle) = started_coordinator();

    let target = Arc::new(());
    let (tx, rx) = unbounded();
    for _ in 0..2 {
        let tx = tx.clone();
        coordinator
            .add_observer(&target, move |_, status| {
                let _ = tx.send(status);
            })
            .unwrap();
    }

    let (_anchor, flush_rx) = add_flush(&coordinator);
    pump(&handle, RawReachability::Wifi, &flush_rx);

    assert_eq!(
        rx.recv_timeout(WAIT).unwrap(),
        ReachabilityStatus::ReachableViaWiFi
    );
    assert_eq!(
        rx.recv_timeout(WAIT).unwrap(),
        ReachabilityStatus::ReachableViaWiFi
    );
    assert!(rx.try_recv().is_err());
}

struct ChangeLog {
    label: &'static str,
    seen: Mutex<Vec<(netreach::ObserverId, ReachabilityStatus)>>,
    notify: crossbeam_channel::Sender<()>,
}

impl StatusListener for ChangeLog {
    fn reachability_changed(&self, observer: &ObserverHandle, status: ReachabilityStatus) {
        // The handle resolves back to this listener without the
        // registration ever owning it.
        let me = observer.target_as::<ChangeLog>().unwrap();
        assert_eq!(me.label, self.label);

        self.seen
            .lock()
            .unwrap()
            .push((observer.id(), status));
        let _ = self.notify.send(());
    }
}

#[test]
fn listener_delivery_invokes_trait_method() {
    let (coordinator, handle) = started_coordinator();

    let (notify_tx, notify_rx) = unbounded();
    let log = Arc::new(ChangeLog {
        label: "primary",
        seen: Mutex::new(Vec::new()),
        notify: notify_tx,
    });

    let id = coordinator
        .add_listener(&log, DeliveryOption::All)
        .unwrap();

    handle.report(RawReachability::Wwan);
    notify_rx.recv_timeout(WAIT).unwrap();

    let seen = log.seen.lock().unwrap().clone();
    assert_eq!(seen, vec![(id, ReachabilityStatus::ReachableViaCellular)]);
}

#[test]
fn consecutive_identical_statuses_dispatch_every_time() {
    let (coordinator, handle) = started_coordinator();

    let every = Arc::new(());
    let (every_tx, every_rx) = unbounded();
    coordinator
        .add_observer(&every, move |_, status| {
            let _ = every_tx.send(status);
        })
        .unwrap();

    let edge = Arc::new(());
    let (edge_tx, edge_rx) = unbounded();
    coordinator
        .add_observer_with(&edge, DeliveryOption::ReachableAgain, move |_, status| {
            let _ = edge_tx.send(status);
        })
        .unwrap();

    let (_anchor, flush_rx) = add_flush(&coordinator);

    pump(&handle, RawReachability::Wifi, &flush_rx);
    pump(&handle, RawReachability::Wifi, &flush_rx);

    // No dedup at the coordinator: the unconditional observer sees both
    // passes, the edge-triggered one only the first.
    assert_eq!(
        every_rx.recv_timeout(WAIT).unwrap(),
        ReachabilityStatus::ReachableViaWiFi
    );
    assert_eq!(
        every_rx.recv_timeout(WAIT).unwrap(),
        ReachabilityStatus::ReachableViaWiFi
    );
    assert!(every_rx.try_recv().is_err());

    assert_eq!(
        edge_rx.recv_timeout(WAIT).unwrap(),
        ReachabilityStatus::ReachableViaWiFi
    );
    assert!(edge_rx.try_recv().is_err());
}

#[test]
fn delivery_order_is_registration_order() {
    let (coordinator, handle) = started_coordinator();

    let order = Arc::new(Mutex::new(Vec::new()));
    let targets: Vec<Arc<&'static str>> = ["a", "b", "c"].iter().map(|l| Arc::new(*l)).collect();
    for target in &targets {
        let order = Arc::clone(&order);
        coordinator
            .add_observer(target, move |observer, _| {
                let label = observer.target_as::<&'static str>().unwrap();
                order.lock().unwrap().push(*label);
            })
            .unwrap();
    }

    let (_anchor, flush_rx) = add_flush(&coordinator);
    pump(&handle, RawReachability::Wifi, &flush_rx);

    assert_eq!(*order.lock().unwrap(), vec!["a", "b", "c"]);
}

#[test]
fn registration_is_safe_concurrent_with_dispatch() {
    let (coordinator, handle) = started_coordinator();
    let coordinator = Arc::new(coordinator);

    let churner = {
        let coordinator = Arc::clone(&coordinator);
        std::thread::spawn(move || {
            for _ in 0..200 {
                let target = Arc::new(());
                coordinator.add_observer(&target, |_, _| {}).unwrap();
                coordinator.remove_observer(&target);
            }
        })
    };

    for i in 0..200 {
        let raw = if i % 2 == 0 {
            RawReachability::Wifi
        } else {
            RawReachability::NotReachable
        };
        handle.report(raw);
    }

    churner.join().unwrap();

    // Drain to a quiescent state and confirm the coordinator still works.
    let (_anchor, flush_rx) = add_flush(&coordinator);
    pump(&handle, RawReachability::Wwan, &flush_rx);
    assert_eq!(
        coordinator.current_status(),
        ReachabilityStatus::ReachableViaCellular
    );
}
