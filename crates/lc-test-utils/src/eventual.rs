//! Timing helpers for events delivered asynchronously over the socket.

use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;

/// Upper bound on how long a delivery may take in tests.
pub const DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);

/// How long to watch a channel before concluding nothing was delivered.
pub const QUIET_PERIOD: Duration = Duration::from_millis(200);

/// Receive the next event, failing the test if none arrives in time.
pub async fn recv_within<T>(rx: &mut mpsc::Receiver<T>) -> T {
    match tokio::time::timeout(DELIVERY_TIMEOUT, rx.recv()).await {
        Ok(Some(event)) => event,
        Ok(None) => panic!("event channel closed while waiting for an event"),
        Err(_) => panic!("no event within {DELIVERY_TIMEOUT:?}"),
    }
}

/// Receive events until one satisfies `matches`, skipping the rest.
pub async fn recv_until<T, F>(rx: &mut mpsc::Receiver<T>, mut matches: F) -> T
where
    F: FnMut(&T) -> bool,
{
    let wait = async {
        while let Some(event) = rx.recv().await {
            if matches(&event) {
                return Some(event);
            }
        }
        None
    };

    match tokio::time::timeout(DELIVERY_TIMEOUT, wait).await {
        Ok(Some(event)) => event,
        Ok(None) => panic!("event channel closed before a matching event"),
        Err(_) => panic!("no matching event within {DELIVERY_TIMEOUT:?}"),
    }
}

/// Assert that nothing arrives on `rx` for [`QUIET_PERIOD`].
pub async fn assert_quiet<T: std::fmt::Debug>(rx: &mut mpsc::Receiver<T>) {
    if let Ok(Some(event)) = tokio::time::timeout(QUIET_PERIOD, rx.recv()).await {
        panic!("expected no event, got {event:?}");
    }
}

/// Poll `condition` until it holds, failing the test after `timeout`.
pub async fn assert_eventually<F, Fut>(timeout: Duration, mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let start = tokio::time::Instant::now();
    let mut delay = Duration::from_millis(10);

    loop {
        if condition().await {
            return;
        }
        if start.elapsed() >= timeout {
            panic!("condition not met within {timeout:?}");
        }
        tokio::time::sleep(delay).await;
        delay = (delay * 2).min(Duration::from_millis(250));
    }
}
