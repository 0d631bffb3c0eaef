use super::*;
use std::sync::atomic::AtomicUsize;

#[test]
fn closures_are_listeners() {
    let bp = Backpressure::new();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);

    bp.subscribe(Arc::new(move |_: ChannelBlocked| {
        counter.fetch_add(1, Ordering::SeqCst);
    }));

    bp.notify();
    bp.notify();
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[test]
fn unsubscribe_stops_delivery() {
    let bp = Backpressure::new();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);

    let id = bp.subscribe(Arc::new(move |_: ChannelBlocked| {
        counter.fetch_add(1, Ordering::SeqCst);
    }));
    assert_eq!(bp.listener_count(), 1);

    assert!(bp.unsubscribe(id));
    assert!(!bp.unsubscribe(id), "second unsubscribe is a no-op");
    assert_eq!(bp.listener_count(), 0);

    bp.notify();
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[test]
fn channel_subscribers_coalesce_unconsumed_signals() {
    let bp = Backpressure::new();
    let (_id, rx) = bp.subscribe_channel();

    bp.notify();
    bp.notify();
    bp.notify();

    assert_eq!(rx.try_recv(), Ok(ChannelBlocked));
    assert!(rx.try_recv().is_err(), "pending signals are coalesced");

    bp.notify();
    assert_eq!(rx.try_recv(), Ok(ChannelBlocked));
}

#[test]
fn dropped_receiver_does_not_break_other_listeners() {
    let bp = Backpressure::new();
    let (_id, rx) = bp.subscribe_channel();
    drop(rx);

    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    bp.subscribe(Arc::new(move |_: ChannelBlocked| {
        counter.fetch_add(1, Ordering::SeqCst);
    }));

    bp.notify();
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn listener_may_unsubscribe_itself_during_notify() {
    let bp = Arc::new(Backpressure::new());
    let slot: Arc<std::sync::Mutex<Option<SubscriptionId>>> = Arc::default();

    let bp_inner = Arc::clone(&bp);
    let slot_inner = Arc::clone(&slot);
    let id = bp.subscribe(Arc::new(move |_: ChannelBlocked| {
        if let Some(id) = slot_inner.lock().unwrap().take() {
            bp_inner.unsubscribe(id);
        }
    }));
    *slot.lock().unwrap() = Some(id);

    bp.notify();
    assert_eq!(bp.listener_count(), 0);
}

struct PanickingListener;

impl BackpressureListener for PanickingListener {
    fn on_blocked(&self, _signal: ChannelBlocked) {
        panic!("listener bug");
    }
}

#[test]
fn panicking_listener_does_not_stop_the_others() {
    let bp = Backpressure::new();
    bp.subscribe(Arc::new(PanickingListener));

    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    bp.subscribe(Arc::new(move |_: ChannelBlocked| {
        counter.fetch_add(1, Ordering::SeqCst);
    }));

    bp.notify();
    bp.notify();
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}
