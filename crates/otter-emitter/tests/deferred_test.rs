//! Integration tests for the deferred (`next*`) registration forms.

use otter_emitter::{Deferred, Emitter, EmitterError, events};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

events! {
    struct ServerEvents {
        Ready = "ready": u16,
        Message = "message": (String, u32),
    }
}

#[tokio::test]
async fn test_next_resolves_with_next_payload() {
    let emitter: Emitter<ServerEvents> = Emitter::new();
    let deferred = emitter.next(Ready);
    assert_eq!(deferred.event(), "ready");

    emitter.emit(Ready, 8080).emit(Ready, 9090);

    assert_eq!(deferred.await, Ok(8080));
    assert!(!emitter.has_listeners(Ready));
}

#[tokio::test]
async fn test_next_matching_skips_rejected_payloads() {
    let emitter: Emitter<ServerEvents> = Emitter::new();
    let deferred = emitter.next_matching(Message, |(topic, _)| topic == "orders");

    emitter
        .emit(Message, ("users".to_string(), 1))
        .emit(Message, ("orders".to_string(), 2))
        .emit(Message, ("orders".to_string(), 3));

    assert_eq!(deferred.await, Ok(("orders".to_string(), 2)));
}

#[tokio::test]
async fn test_deferred_survives_untargeted_removal() {
    let emitter: Emitter<ServerEvents> = Emitter::new();
    let deferred = emitter.next(Ready);
    emitter.on(Ready, |_| {});

    emitter.off_event(Ready).off_all();
    assert_eq!(emitter.listener_count(Ready), 1);

    emitter.emit(Ready, 1);
    assert_eq!(deferred.await, Ok(1));
}

#[tokio::test]
async fn test_exact_off_detaches_deferred() {
    let emitter: Emitter<ServerEvents> = Emitter::new();
    let deferred = emitter.next(Ready);

    let shim = deferred.callback().expect("shim is registered");
    emitter.off(Ready, &shim);
    drop(shim);

    assert!(emitter.is_empty());
    assert_eq!(deferred.await, Err(EmitterError::Detached { event: "ready" }));
}

#[tokio::test]
async fn test_dropping_emitter_detaches_deferred() {
    let emitter: Emitter<ServerEvents> = Emitter::new();
    let deferred = emitter.next(Ready);
    drop(emitter);

    assert_eq!(deferred.await, Err(EmitterError::Detached { event: "ready" }));
}

#[tokio::test]
async fn test_prepend_next_resolves_before_existing_listeners_run() {
    let emitter: Emitter<ServerEvents> = Emitter::new();
    let slot: Arc<Mutex<Option<Deferred<u16>>>> = Arc::new(Mutex::new(None));
    let seen = Arc::new(Mutex::new(Vec::new()));

    {
        let (slot, seen) = (Arc::clone(&slot), Arc::clone(&seen));
        emitter.on(Ready, move |_| {
            let taken = slot.lock().as_mut().and_then(|deferred| deferred.try_take());
            seen.lock().push(taken);
        });
    }
    *slot.lock() = Some(emitter.prepend_next(Ready));

    emitter.emit(Ready, 7);
    assert_eq!(*seen.lock(), vec![Some(Ok(7))]);
    assert_eq!(emitter.listener_count(Ready), 1);
}

#[tokio::test]
async fn test_prepend_next_matching_runs_first_and_waits_for_match() {
    let emitter: Emitter<ServerEvents> = Emitter::new();
    let slot: Arc<Mutex<Option<Deferred<u16>>>> = Arc::new(Mutex::new(None));
    let seen = Arc::new(Mutex::new(Vec::new()));

    {
        let (slot, seen) = (Arc::clone(&slot), Arc::clone(&seen));
        emitter.on(Ready, move |port| {
            let taken = slot.lock().as_mut().and_then(|deferred| deferred.try_take());
            seen.lock().push((*port, taken));
        });
    }
    *slot.lock() = Some(emitter.prepend_next_matching(Ready, |port| *port > 1024));

    emitter.emit(Ready, 80).emit(Ready, 3000);
    assert_eq!(*seen.lock(), vec![(80, None), (3000, Some(Ok(3000)))]);
    assert_eq!(emitter.listener_count(Ready), 1);
}

#[tokio::test]
async fn test_timeout_then_cleanup() {
    let emitter: Emitter<ServerEvents> = Emitter::new();
    let deferred = emitter.next(Ready);
    let shim = deferred.callback().expect("shim is registered");

    let waited = tokio::time::timeout(Duration::from_millis(10), deferred).await;
    assert!(waited.is_err());

    // Giving up leaves the protected shim behind until it is removed by identity.
    assert!(emitter.has_listeners(Ready));
    emitter.off(Ready, &shim);
    assert!(!emitter.has_listeners(Ready));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_emit_from_another_thread() {
    let emitter: Arc<Emitter<ServerEvents>> = Arc::new(Emitter::new());
    let deferred = emitter.next(Ready);

    let emitter_clone = Arc::clone(&emitter);
    let handle = std::thread::spawn(move || {
        emitter_clone.emit(Ready, 4242);
    });

    assert_eq!(deferred.await, Ok(4242));
    handle.join().expect("emitting thread");
}
