mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dulai_core::ErrorKind;
use dulai_engine::{BlockingOffloader, BrowserError, EngineError};
use pretty_assertions::assert_eq;

use common::init_logging;

#[tokio::test(flavor = "current_thread")]
async fn pool_of_one_runs_calls_sequentially_without_blocking_the_runtime() {
    init_logging();
    let pool = BlockingOffloader::new(1);
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let job = |running: Arc<AtomicUsize>, peak: Arc<AtomicUsize>| {
        move || {
            let now = running.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(150));
            running.fetch_sub(1, Ordering::SeqCst);
            Ok::<_, EngineError>(())
        }
    };

    let ticks = Arc::new(AtomicUsize::new(0));
    let ticker = {
        let ticks = ticks.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_millis(10)).await;
                ticks.fetch_add(1, Ordering::SeqCst);
            }
        })
    };

    let started = Instant::now();
    let (a, b) = tokio::join!(
        pool.run("first", job(running.clone(), peak.clone())),
        pool.run("second", job(running.clone(), peak.clone())),
    );
    let elapsed = started.elapsed();
    ticker.abort();

    a.unwrap();
    b.unwrap();
    assert_eq!(peak.load(Ordering::SeqCst), 1);
    assert!(elapsed >= Duration::from_millis(300), "ran in {elapsed:?}");
    // The single runtime thread kept running other tasks during both calls.
    assert!(ticks.load(Ordering::SeqCst) >= 10, "ticks {}", ticks.load(Ordering::SeqCst));
    assert_eq!(pool.available(), 1);
}

#[tokio::test]
async fn errors_are_converted_and_release_the_slot() {
    init_logging();
    let pool = BlockingOffloader::new(2);

    let err = pool
        .run("nav", || {
            Err::<(), _>(BrowserError::Navigation {
                url: "https://x.example".into(),
                message: "dns".into(),
            })
        })
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Scrape);
    assert!(std::error::Error::source(&err).is_some());
    assert_eq!(pool.available(), 2);
}

#[tokio::test]
async fn panics_become_scrape_errors_and_release_the_slot() {
    init_logging();
    let pool = BlockingOffloader::new(1);

    let err = pool
        .run("boom", || -> Result<(), EngineError> { panic!("driver crashed") })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Scrape);

    let value = pool.run("after", || Ok::<_, EngineError>(7)).await.unwrap();
    assert_eq!(value, 7);
    assert_eq!(pool.available(), 1);
}

#[tokio::test]
async fn abandoned_caller_still_frees_the_slot_when_work_ends() {
    init_logging();
    let pool = BlockingOffloader::new(1);

    let slow = pool.run("slow", || {
        std::thread::sleep(Duration::from_millis(100));
        Ok::<_, EngineError>(())
    });
    // Drop the caller after the work has started.
    let _ = tokio::time::timeout(Duration::from_millis(20), slow).await;

    let value = tokio::time::timeout(
        Duration::from_secs(2),
        pool.run("next", || Ok::<_, EngineError>("ran")),
    )
    .await
    .expect("slot released")
    .unwrap();
    assert_eq!(value, "ran");
}

#[test]
fn size_is_at_least_one() {
    assert_eq!(BlockingOffloader::new(0).size(), 1);
    assert!(BlockingOffloader::with_default_size().size() >= 1);
}
