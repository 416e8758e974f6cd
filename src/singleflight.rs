//! Collapse concurrent identical upstream fetches into one.
//!
//! The first caller for a key becomes the leader and runs the work; callers
//! arriving while it is in flight wait on a `watch` channel and receive a
//! clone of the leader's result.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

type Inflight<T> = DashMap<String, watch::Receiver<Option<T>>>;

pub struct SingleFlight<T> {
    inflight: Arc<Inflight<T>>,
}

impl<T> Clone for SingleFlight<T> {
    fn clone(&self) -> Self {
        Self {
            inflight: Arc::clone(&self.inflight),
        }
    }
}

impl<T> Default for SingleFlight<T> {
    fn default() -> Self {
        Self {
            inflight: Arc::new(DashMap::new()),
        }
    }
}

/// Removes the leader's entry however the leader finishes, including when
/// its future is dropped mid-flight.
struct FlightGuard<'a, T> {
    inflight: &'a Inflight<T>,
    key: &'a str,
}

impl<T> Drop for FlightGuard<'_, T> {
    fn drop(&mut self) {
        self.inflight.remove(self.key);
    }
}

impl<T: Clone + Send + Sync> SingleFlight<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `work` unless a call for `key` is already in flight, in which case
    /// wait for and share its result. If the leader is cancelled before
    /// publishing, waiters run `work` themselves.
    pub async fn run<F, Fut>(&self, key: &str, work: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let role = match self.inflight.entry(key.to_string()) {
            Entry::Occupied(e) => Err(e.get().clone()),
            Entry::Vacant(e) => {
                let (tx, rx) = watch::channel(None);
                e.insert(rx);
                Ok(tx)
            }
        };

        match role {
            Ok(tx) => {
                let _guard = FlightGuard {
                    inflight: &self.inflight,
                    key,
                };
                let result = work().await;
                tx.send_replace(Some(result.clone()));
                result
            }
            Err(mut rx) => {
                debug!("Joining in-flight upstream call for {}", key);
                let shared = match rx.wait_for(Option::is_some).await {
                    Ok(value) => value.clone(),
                    Err(_) => None,
                };
                match shared {
                    Some(result) => result,
                    None => {
                        debug!("In-flight call for {} abandoned, running it here", key);
                        work().await
                    }
                }
            }
        }
    }

    /// Number of keys currently in flight.
    pub fn in_flight(&self) -> usize {
        self.inflight.len()
    }
}
