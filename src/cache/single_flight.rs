/// Collapses concurrent loads of the same key into one upstream call
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use futures_util::future::{BoxFuture, FutureExt, Shared};
use tracing::debug;

use crate::error::{HistoryError, Result};

type InFlight<T> = Shared<BoxFuture<'static, Result<T>>>;

/// A load in progress and the number of callers currently awaiting it
struct Flight<T: Clone> {
    load: InFlight<T>,
    waiters: usize,
}

type FlightMap<T> = Arc<Mutex<HashMap<String, Flight<T>>>>;

pub struct SingleFlight<T: Clone + Send + Sync + 'static> {
    inflight: FlightMap<T>,
}

impl<T: Clone + Send + Sync + 'static> Default for SingleFlight<T> {
    fn default() -> Self {
        Self {
            inflight: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> SingleFlight<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `load` for `key` unless a load for the same key is already in flight,
    /// in which case wait for that one and share its outcome.
    ///
    /// When every caller awaiting a load is dropped before it completes, the
    /// load is dropped with them and the next caller starts a fresh one.
    pub async fn run<F>(&self, key: &str, load: F) -> Result<T>
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let shared = {
            let mut inflight = self
                .inflight
                .lock()
                .map_err(|e| HistoryError::Cache(format!("single-flight lock poisoned: {}", e)))?;

            match inflight.get_mut(key) {
                Some(flight) => {
                    debug!("Joining in-flight load for {}", key);
                    flight.waiters += 1;
                    flight.load.clone()
                }
                None => {
                    let fut = load.boxed().shared();
                    inflight.insert(
                        key.to_string(),
                        Flight {
                            load: fut.clone(),
                            waiters: 1,
                        },
                    );
                    fut
                }
            }
        };

        let mut guard = WaiterGuard {
            inflight: Arc::clone(&self.inflight),
            key: key.to_string(),
            load: shared.clone(),
            completed: false,
        };

        let outcome = shared.await;
        guard.completed = true;
        outcome
    }

    pub fn in_flight(&self) -> usize {
        self.inflight.lock().map(|m| m.len()).unwrap_or(0)
    }
}

/// Releases one caller's interest in a flight, on completion or cancellation
struct WaiterGuard<T: Clone + Send + Sync + 'static> {
    inflight: FlightMap<T>,
    key: String,
    load: InFlight<T>,
    completed: bool,
}

impl<T: Clone + Send + Sync + 'static> Drop for WaiterGuard<T> {
    fn drop(&mut self) {
        let Ok(mut inflight) = self.inflight.lock() else {
            return;
        };
        let Some(flight) = inflight.get_mut(&self.key) else {
            return;
        };
        // The key may already belong to a newer load
        if !flight.load.ptr_eq(&self.load) {
            return;
        }

        flight.waiters = flight.waiters.saturating_sub(1);
        if self.completed || flight.waiters == 0 {
            if !self.completed {
                debug!("Abandoning cancelled load for {}", self.key);
            }
            inflight.remove(&self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_concurrent_loads_share_one_call() {
        let flights: Arc<SingleFlight<String>> = Arc::new(SingleFlight::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..5 {
            let flights = Arc::clone(&flights);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                flights
                    .run("page-0", async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok("payload".to_string())
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "payload");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(flights.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_errors_are_shared_and_cleared() {
        let flights: SingleFlight<String> = SingleFlight::new();
        let err = flights
            .run("k", async { Err(HistoryError::Http("reset".to_string())) })
            .await;
        assert_eq!(err, Err(HistoryError::Http("reset".to_string())));

        let ok = flights.run("k", async { Ok("retry".to_string()) }).await;
        assert_eq!(ok.unwrap(), "retry");
    }

    #[tokio::test]
    async fn test_cancelled_load_is_restarted() {
        let flights: Arc<SingleFlight<String>> = Arc::new(SingleFlight::new());
        let (started_tx, started_rx) = tokio::sync::oneshot::channel::<()>();
        let (_release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

        let leader = {
            let flights = Arc::clone(&flights);
            tokio::spawn(async move {
                flights
                    .run("page-0", async move {
                        let _ = started_tx.send(());
                        let _ = release_rx.await;
                        Ok("stale".to_string())
                    })
                    .await
            })
        };

        started_rx.await.unwrap();
        assert_eq!(flights.in_flight(), 1);

        leader.abort();
        assert!(leader.await.unwrap_err().is_cancelled());
        assert_eq!(flights.in_flight(), 0);

        let retry = flights.run("page-0", async { Ok("fresh".to_string()) }).await;
        assert_eq!(retry.unwrap(), "fresh");
        assert_eq!(flights.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_follower_survives_leader_cancellation() {
        let flights: Arc<SingleFlight<String>> = Arc::new(SingleFlight::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let (started_tx, started_rx) = tokio::sync::oneshot::channel::<()>();
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

        let leader = {
            let flights = Arc::clone(&flights);
            let calls = Arc::clone(&calls);
            tokio::spawn(async move {
                flights
                    .run("page-0", async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        let _ = started_tx.send(());
                        let _ = release_rx.await;
                        Ok("shared".to_string())
                    })
                    .await
            })
        };
        started_rx.await.unwrap();

        let follower = {
            let flights = Arc::clone(&flights);
            let calls = Arc::clone(&calls);
            tokio::spawn(async move {
                flights
                    .run("page-0", async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok("second".to_string())
                    })
                    .await
            })
        };
        // let the follower join before the leader goes away
        while flights.inflight.lock().unwrap().get("page-0").map(|f| f.waiters) != Some(2) {
            tokio::task::yield_now().await;
        }

        leader.abort();
        let _ = leader.await;
        assert_eq!(flights.in_flight(), 1);

        release_tx.send(()).unwrap();
        assert_eq!(follower.await.unwrap().unwrap(), "shared");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(flights.in_flight(), 0);
    }
}
