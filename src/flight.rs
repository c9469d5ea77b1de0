//! Per-collection in-flight sync coalescing
//!
//! At most one sync may be in flight per (account, collection). A
//! second request arriving while one is running must share the running
//! call's outcome rather than issue a duplicate round-trip, which would
//! race on the sync cursor. Keying the map per collection keeps
//! unrelated collections fully concurrent.

use crate::error::{Error, Result};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

type SharedSync = Shared<BoxFuture<'static, Result<usize>>>;

/// Map of in-flight syncs keyed by collection id.
#[derive(Default)]
pub struct FlightMap {
    inner: Mutex<HashMap<String, SharedSync>>,
}

impl FlightMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `work` for `key`, unless a sync for `key` is already in
    /// flight — then await and return that sync's result instead.
    pub async fn run<F>(&self, key: &str, work: F) -> Result<usize>
    where
        F: Future<Output = Result<usize>> + Send + 'static,
    {
        let (shared, leader) = {
            let mut inner = self
                .inner
                .lock()
                .map_err(|_| Error::Store("flight map lock poisoned".into()))?;
            if let Some(existing) = inner.get(key) {
                debug!(collection = key, "coalescing with in-flight sync");
                (existing.clone(), false)
            } else {
                let shared = work.boxed().shared();
                inner.insert(key.to_string(), shared.clone());
                (shared, true)
            }
        };

        let result = shared.await;

        if leader {
            if let Ok(mut inner) = self.inner.lock() {
                inner.remove(key);
            }
        }
        result
    }
}
