use overlay_kit_core::{
    AsyncOverlayContext, OverlayContext, OverlayController, OverlayId, OverlaySurface, Subscription,
};
use std::collections::HashSet;
use std::sync::{Arc, Barrier, Mutex};
use std::time::{Duration, Instant};

fn text(value: &'static str) -> impl Fn(&OverlayContext<String>) -> String + Send + Sync {
    move |_| value.to_string()
}

fn flags(overlays: &OverlayController<String>) -> Vec<(OverlayId, bool)> {
    overlays
        .store()
        .snapshot()
        .iter()
        .map(|instance| (instance.id(), instance.is_open()))
        .collect()
}

fn count_notifications(overlays: &OverlayController<String>) -> (Arc<Mutex<usize>>, Subscription) {
    let count = Arc::new(Mutex::new(0));
    let counter = count.clone();
    let subscription = overlays.store().subscribe(move |_| *counter.lock().unwrap() += 1);
    (count, subscription)
}

#[test]
fn test_two_opens_close_then_unmount_all() {
    let overlays = OverlayController::new();
    assert_eq!(overlays.open(text("f1")), 1);
    assert_eq!(overlays.open(text("f2")), 2);
    assert_eq!(flags(&overlays), vec![(1, true), (2, true)]);

    overlays.close(1);
    assert_eq!(flags(&overlays), vec![(1, false), (2, true)]);

    overlays.unmount_all();
    assert!(flags(&overlays).is_empty());
}

#[test]
fn test_four_opens_and_unmount_all_notify_five_times() {
    let overlays = OverlayController::new();
    let (count, _subscription) = count_notifications(&overlays);

    let ids: Vec<OverlayId> = ["1", "2", "3", "4"]
        .into_iter()
        .map(|value| overlays.open(text(value)))
        .collect();
    overlays.unmount_all();

    assert_eq!(*count.lock().unwrap(), 5);
    for id in ids {
        assert!(!overlays.store().contains(id));
    }
}

#[test]
fn test_order_survives_close_and_unmount() {
    let overlays = OverlayController::new();
    let a = overlays.open(text("A"));
    let b = overlays.open(text("B"));
    let c = overlays.open(text("C"));
    let d = overlays.open(text("D"));

    overlays.close(b);
    assert_eq!(
        flags(&overlays),
        vec![(a, true), (b, false), (c, true), (d, true)]
    );

    overlays.unmount(b);
    assert_eq!(overlays.store().ids(), vec![a, c, d]);
}

#[test]
fn test_close_all_keeps_membership() {
    let overlays = OverlayController::new();
    let ids: Vec<OverlayId> = (0..4).map(|_| overlays.open(text("x"))).collect();
    overlays.close(ids[2]);

    overlays.close_all();
    assert_eq!(overlays.store().ids(), ids);
    assert!(overlays.store().snapshot().iter().all(|i| !i.is_open()));
}

#[test]
fn test_close_all_is_seen_by_every_render() {
    let overlays = OverlayController::new();
    let seen = Arc::new(Mutex::new([false; 4]));

    for slot in 0..4 {
        let seen = seen.clone();
        overlays.open(move |ctx: &OverlayContext<String>| {
            seen.lock().unwrap()[slot] = ctx.is_open();
            String::new()
        });
    }

    let surface = OverlaySurface::attach(overlays.store(), Duration::from_secs(60));
    assert_eq!(*seen.lock().unwrap(), [true; 4]);

    overlays.close_all();
    assert_eq!(*seen.lock().unwrap(), [false; 4]);
    assert_eq!(surface.frame().len(), 4);
}

#[test]
fn test_unknown_ids_change_nothing() {
    let overlays = OverlayController::new();
    let id = overlays.open(text("only"));
    let (count, _subscription) = count_notifications(&overlays);

    overlays.close(id + 100);
    overlays.unmount(id + 100);
    assert_eq!(flags(&overlays), vec![(id, true)]);
    assert_eq!(*count.lock().unwrap(), 0);
}

#[test]
fn test_unmount_twice_is_unmount_once() {
    let overlays = OverlayController::new();
    let keep = overlays.open(text("keep"));
    let gone = overlays.open(text("gone"));
    let (count, _subscription) = count_notifications(&overlays);

    overlays.unmount(gone);
    let after_once = flags(&overlays);
    overlays.unmount(gone);

    assert_eq!(flags(&overlays), after_once);
    assert_eq!(after_once, vec![(keep, true)]);
    assert_eq!(*count.lock().unwrap(), 1);
}

#[test]
fn test_ids_unique_across_threads() {
    let overlays: OverlayController<String> = OverlayController::new();
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let overlays = overlays.clone();
            std::thread::spawn(move || {
                (0..50)
                    .map(|_| overlays.open(text("t")))
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut ids = HashSet::new();
    for handle in handles {
        for id in handle.join().unwrap() {
            assert!(ids.insert(id));
        }
    }
    assert_eq!(overlays.store().len(), 400);
}

type Recorded = Arc<Mutex<Vec<Vec<(OverlayId, bool)>>>>;

fn record_snapshots(overlays: &OverlayController<String>) -> (Recorded, Subscription) {
    let seen: Recorded = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let subscription = overlays.store().subscribe(move |instances| {
        sink.lock()
            .unwrap()
            .push(instances.iter().map(|i| (i.id(), i.is_open())).collect());
    });
    (seen, subscription)
}

/// Every delivered snapshot must follow from the previous one by removals and
/// closes only, with at least one real change each time.
fn assert_snapshots_follow_each_other(seen: &[Vec<(OverlayId, bool)>], start: &[OverlayId]) {
    let mut previous: Vec<(OverlayId, bool)> = start.iter().map(|id| (*id, true)).collect();
    for snapshot in seen {
        assert_ne!(*snapshot, previous);

        let mut remaining = previous.iter();
        for (id, is_open) in snapshot {
            let (_, was_open) = remaining
                .find(|(previous_id, _)| previous_id == id)
                .expect("snapshot reordered or grew");
            assert!(*was_open || !*is_open, "overlay {id} reopened");
        }
        previous = snapshot.clone();
    }
}

type Job = Box<dyn Fn(&OverlayController<String>) + Send>;

fn job(f: impl Fn(&OverlayController<String>) + Send + 'static) -> Job {
    Box::new(f)
}

/// Run every job on its own thread, all released at once
fn race(overlays: &OverlayController<String>, jobs: Vec<Job>) {
    let barrier = Arc::new(Barrier::new(jobs.len()));
    let handles: Vec<_> = jobs
        .into_iter()
        .map(|work| {
            let overlays = overlays.clone();
            let barrier = barrier.clone();
            std::thread::spawn(move || {
                barrier.wait();
                work(&overlays);
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn test_concurrent_close_and_unmount_keep_registry_consistent() {
    let overlays = OverlayController::new();
    let ids: Vec<OverlayId> = (0..16).map(|_| overlays.open(text("x"))).collect();
    let (seen, _subscription) = record_snapshots(&overlays);

    let even: Vec<OverlayId> = ids.iter().copied().filter(|id| id % 2 == 0).collect();
    let odd: Vec<OverlayId> = ids.iter().copied().filter(|id| id % 2 == 1).collect();

    let close_ids = ids.clone();
    let close_backwards = ids.clone();
    let unmount_even = even.clone();
    let unmount_even_again = even.clone();
    race(
        &overlays,
        vec![
            job(move |o| close_ids.iter().for_each(|id| o.close(*id))),
            job(move |o| close_backwards.iter().rev().for_each(|id| o.close(*id))),
            job(move |o| unmount_even.iter().for_each(|id| o.unmount(*id))),
            job(move |o| unmount_even_again.iter().rev().for_each(|id| o.unmount(*id))),
            job(|o| o.close_all()),
        ],
    );

    assert_eq!(
        flags(&overlays),
        odd.iter().map(|id| (*id, false)).collect::<Vec<_>>()
    );
    {
        let seen = seen.lock().unwrap();
        assert_snapshots_follow_each_other(&seen, &ids);
        assert_eq!(seen.last(), Some(&flags(&overlays)));
    }

    let unmount_odd = odd.clone();
    race(
        &overlays,
        vec![
            job(|o| o.unmount_all()),
            job(|o| o.unmount_all()),
            job(move |o| unmount_odd.iter().for_each(|id| o.unmount(*id))),
            job(|o| o.close_all()),
        ],
    );

    assert!(overlays.store().is_empty());
    let seen = seen.lock().unwrap();
    assert_snapshots_follow_each_other(&seen, &ids);
    assert_eq!(seen.last(), Some(&Vec::new()));
}

#[test]
fn test_exit_transition_through_surface() {
    let overlays = OverlayController::new();
    let surface = OverlaySurface::attach(overlays.store(), Duration::from_millis(100));

    let id = overlays.open(|ctx: &OverlayContext<String>| {
        if ctx.is_open() {
            format!("dialog {}", ctx.overlay_id())
        } else {
            format!("dialog {} (closing)", ctx.overlay_id())
        }
    });

    overlays.close(id);
    let frame = surface.frame();
    assert_eq!(frame.len(), 1);
    assert_eq!(frame[0].view, format!("dialog {id} (closing)"));
    assert!(!frame[0].is_open);

    assert_eq!(surface.tick(Instant::now() + Duration::from_millis(150)), 1);
    assert!(overlays.store().is_empty());
    assert!(surface.frame().is_empty());
}

#[tokio::test]
async fn test_open_async_answered_from_another_task() {
    let overlays: OverlayController<String> = OverlayController::new();
    let pending: Arc<Mutex<Option<AsyncOverlayContext<String, bool>>>> =
        Arc::new(Mutex::new(None));

    let slot = pending.clone();
    let response = overlays.open_async(move |ctx: &AsyncOverlayContext<String, bool>| {
        *slot.lock().unwrap() = Some(ctx.clone());
        format!("confirm {}", ctx.overlay_id())
    });
    let id = response.id();

    // Mounting on a surface renders the overlay and hands out its context
    let _surface = OverlaySurface::attach(overlays.store(), Duration::ZERO);
    let ctx = pending.lock().unwrap().take().unwrap();
    tokio::spawn(async move { ctx.close(true) });

    assert_eq!(response.await, Some(true));
    assert!(!overlays.store().get(id).unwrap().is_open());
}
