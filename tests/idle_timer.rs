//! End-to-end behaviour of the idle timer against an in-process event bus.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use idlewatch::{ActivityEvent, EventBus, IdleConfig, IdleError, IdleTimer};
use tokio::time::{sleep, Instant};

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

fn config(timeout_ms: u64) -> IdleConfig {
    IdleConfig {
        timeout_ms,
        events_throttle_ms: 0,
        ..IdleConfig::default()
    }
}

fn counter() -> (Arc<AtomicUsize>, impl Fn(Option<&ActivityEvent>) + Send + Sync + 'static) {
    let hits = Arc::new(AtomicUsize::new(0));
    let counted = hits.clone();
    (hits, move |_: Option<&ActivityEvent>| {
        counted.fetch_add(1, Ordering::SeqCst);
    })
}

#[tokio::test(start_paused = true)]
async fn idle_callback_sees_idle_state_and_creation_time() {
    let observed = Arc::new(Mutex::new(None));
    let slot = observed.clone();
    let timer = Arc::new(Mutex::new(None::<Arc<IdleTimer>>));
    let handle = timer.clone();

    let built = Arc::new(
        IdleTimer::builder(config(1000))
            .on_idle(move |event| {
                let timer = handle.lock().unwrap().clone();
                if let Some(timer) = timer {
                    *slot.lock().unwrap() =
                        Some((event.is_none(), timer.is_idle(), timer.last_idle_time()));
                }
            })
            .build()
            .unwrap(),
    );
    let created = built.last_active_time();
    *timer.lock().unwrap() = Some(built.clone());

    sleep(ms(1001)).await;
    let (synthetic, idle, last_idle) = observed.lock().unwrap().take().unwrap();
    assert!(synthetic);
    assert!(idle);
    assert_eq!(last_idle, created);

    timer.lock().unwrap().take();
}

#[tokio::test(start_paused = true)]
async fn repeated_gaps_accumulate_idle_time() {
    let bus = Arc::new(EventBus::new());
    let (idles, on_idle) = counter();
    let timer = IdleTimer::builder(config(1000))
        .source(bus.clone())
        .on_idle(on_idle)
        .build()
        .unwrap();

    for round in 1..=3u64 {
        sleep(ms(1500)).await;
        assert!(timer.is_idle());
        assert_eq!(idles.load(Ordering::SeqCst) as u64, round);

        bus.dispatch(&ActivityEvent::key_down());
        assert!(!timer.is_idle());
        assert_eq!(timer.total_idle_time(), ms(1500 * round));
    }
    assert_eq!(timer.elapsed_time(), ms(4500));
    assert_eq!(timer.total_active_time(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn pause_then_resume_preserves_remaining() {
    let timer = IdleTimer::new(config(10_000)).unwrap();
    sleep(ms(3250)).await;

    let before = timer.remaining_time();
    timer.pause();
    timer.resume();
    assert_eq!(timer.remaining_time(), before);
}

#[tokio::test(start_paused = true)]
async fn reset_always_restores_full_countdown() {
    let bus = Arc::new(EventBus::new());
    let timer = IdleTimer::builder(IdleConfig {
        stop_on_idle: true,
        ..config(1000)
    })
    .source(bus.clone())
    .build()
    .unwrap();

    timer.reset();
    assert_eq!(timer.remaining_time(), ms(1000));

    sleep(ms(400)).await;
    timer.pause();
    timer.reset();
    assert!(!timer.is_paused());
    assert_eq!(timer.remaining_time(), ms(1000));

    sleep(ms(1200)).await;
    assert!(timer.is_idle());
    timer.reset();
    assert!(!timer.is_idle());
    assert_eq!(timer.remaining_time(), ms(1000));
}

#[tokio::test(start_paused = true)]
async fn stop_on_idle_stays_idle_until_reset() {
    let bus = Arc::new(EventBus::new());
    let (actives, on_active) = counter();
    let timer = IdleTimer::builder(IdleConfig {
        stop_on_idle: true,
        ..config(1000)
    })
    .source(bus.clone())
    .on_active(on_active)
    .build()
    .unwrap();

    sleep(ms(1001)).await;
    assert!(timer.is_idle());

    bus.dispatch(&ActivityEvent::key_down());
    bus.dispatch(&ActivityEvent::pointer_move(50.0, 60.0));
    sleep(ms(5000)).await;
    assert!(timer.is_idle());
    assert_eq!(actives.load(Ordering::SeqCst), 0);

    timer.reset();
    assert!(!timer.is_idle());
}

#[tokio::test(start_paused = true)]
async fn debounced_action_fires_once_after_burst() {
    let bus = Arc::new(EventBus::new());
    let fired_at = Arc::new(Mutex::new(Vec::new()));
    let log = fired_at.clone();
    let _timer = IdleTimer::builder(IdleConfig {
        debounce_ms: 100,
        ..config(60_000)
    })
    .source(bus.clone())
    .on_action(move |_| log.lock().unwrap().push(Instant::now()))
    .build()
    .unwrap();

    let start = Instant::now();
    for _ in 0..5 {
        bus.dispatch(&ActivityEvent::key_down());
        sleep(ms(10)).await;
    }
    sleep(ms(500)).await;

    let fired = fired_at.lock().unwrap().clone();
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0] - start, ms(140));
}

#[tokio::test(start_paused = true)]
async fn throttled_action_fires_once_at_first_event() {
    let bus = Arc::new(EventBus::new());
    let fired_at = Arc::new(Mutex::new(Vec::new()));
    let log = fired_at.clone();
    let _timer = IdleTimer::builder(IdleConfig {
        throttle_ms: 100,
        ..config(60_000)
    })
    .source(bus.clone())
    .on_action(move |_| log.lock().unwrap().push(Instant::now()))
    .build()
    .unwrap();

    let start = Instant::now();
    for _ in 0..5 {
        bus.dispatch(&ActivityEvent::key_down());
        sleep(ms(10)).await;
    }
    sleep(ms(500)).await;

    let fired = fired_at.lock().unwrap().clone();
    assert_eq!(fired, vec![start]);
}

#[tokio::test(start_paused = true)]
async fn debounce_with_throttle_fails_setup() {
    let result = IdleTimer::new(IdleConfig {
        debounce_ms: 50,
        throttle_ms: 50,
        ..IdleConfig::default()
    });
    assert!(matches!(result, Err(IdleError::Configuration(_))));
}

#[tokio::test(start_paused = true)]
async fn headless_timer_still_counts_down() {
    let (idles, on_idle) = counter();
    let timer = IdleTimer::builder(config(1000))
        .on_idle(on_idle)
        .build()
        .unwrap();
    assert!(!timer.is_bound());

    sleep(ms(1001)).await;
    assert!(timer.is_idle());
    assert_eq!(idles.load(Ordering::SeqCst), 1);

    timer.reset();
    assert!(!timer.is_idle());
}

#[tokio::test(start_paused = true)]
async fn panicking_callback_leaves_state_consistent() {
    let bus = Arc::new(EventBus::new());
    let timer = IdleTimer::builder(config(1000))
        .source(bus.clone())
        .on_active(|_| panic!("callback failure"))
        .build()
        .unwrap();

    sleep(ms(1500)).await;
    assert!(timer.is_idle());

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        bus.dispatch(&ActivityEvent::key_down());
    }));
    assert!(outcome.is_err());

    assert!(!timer.is_idle());
    assert!(timer.is_bound());
    assert_eq!(timer.remaining_time(), ms(1000));

    timer.set_on_active(|_| {});
    sleep(ms(1001)).await;
    assert!(timer.is_idle());
    bus.dispatch(&ActivityEvent::key_down());
    assert!(!timer.is_idle());
}

#[tokio::test(start_paused = true)]
async fn destroy_detaches_from_source() {
    let bus = Arc::new(EventBus::new());
    let (actions, on_action) = counter();
    let timer = IdleTimer::builder(config(1000))
        .source(bus.clone())
        .on_action(on_action)
        .build()
        .unwrap();

    bus.dispatch(&ActivityEvent::key_down());
    timer.destroy();
    bus.dispatch(&ActivityEvent::key_down());

    assert_eq!(actions.load(Ordering::SeqCst), 1);
    assert_eq!(bus.listener_count(), 0);
}
