//! Process-wide connection cache.
//!
//! One cached connection per logical key. Lookups reuse a live entry without
//! any connectivity check; staleness is the caller's responsibility via
//! explicit invalidation. Invalidation leaves a tombstone slot behind, so the
//! next lookup for the key knows unambiguously to create a replacement.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::driver::{ConnectOptions, DriverConnection};
use crate::error::{BridgeError, Result};
use crate::loader::DriverLoader;

/// One live link to an external data source, shared by every cursor and
/// statement created against it.
pub struct ConnectionEntry {
    key: i64,
    server_identity: u64,
    mapping_identity: u64,
    query_timeout_secs: u32,
    /// Monotonic true-once; races between invalidation sweeps are safe.
    invalidated: AtomicBool,
    /// `None` once torn down. Invariant: invalidated implies absent.
    conn: Mutex<Option<Box<dyn DriverConnection>>>,
}

impl ConnectionEntry {
    pub fn key(&self) -> i64 {
        self.key
    }

    pub fn server_identity(&self) -> u64 {
        self.server_identity
    }

    pub fn mapping_identity(&self) -> u64 {
        self.mapping_identity
    }

    pub fn query_timeout_secs(&self) -> u32 {
        self.query_timeout_secs
    }

    pub fn is_invalidated(&self) -> bool {
        self.invalidated.load(Ordering::Acquire)
    }

    pub(crate) fn timeout(&self) -> Option<Duration> {
        if self.query_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(u64::from(self.query_timeout_secs)))
        }
    }

    /// Run `f` against the live driver connection.
    pub(crate) fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut dyn DriverConnection) -> Result<T>,
    ) -> Result<T> {
        let mut guard = self.conn.lock();
        match guard.as_mut() {
            Some(conn) => f(conn.as_mut()),
            None => Err(BridgeError::NotFound(format!(
                "connection {} is closed",
                self.key
            ))),
        }
    }

    /// Monotonic teardown: mark invalidated, then close and drop the handle.
    /// Idempotent; concurrent sweeps may race here without harm.
    fn tear_down(&self) -> Result<()> {
        self.invalidated.store(true, Ordering::Release);
        let handle = self.conn.lock().take();
        match handle {
            Some(mut conn) => conn.close(),
            None => Ok(()),
        }
    }
}

/// Slot per logical key: a live entry, or a tombstone left by invalidation.
enum Slot {
    Live(Arc<ConnectionEntry>),
    Invalidated,
}

pub struct ConnectionCache {
    entries: RwLock<HashMap<i64, Slot>>,
}

impl ConnectionCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Return the cached live connection for `key`, or establish a new one.
    ///
    /// Creation is not serialized per key: concurrent first use of a fresh key
    /// may race to duplicate connections, and the last insert wins. Callers
    /// avoid concurrent first use, or accept the duplicate until the next
    /// invalidation cycle.
    pub fn get_or_create(
        &self,
        key: i64,
        server_identity: u64,
        mapping_identity: u64,
        options: &ConnectOptions,
        loader: &DriverLoader,
    ) -> Result<Arc<ConnectionEntry>> {
        if let Some(Slot::Live(entry)) = self.entries.read().get(&key) {
            if !entry.is_invalidated() {
                debug!(key, "reusing cached connection");
                return Ok(entry.clone());
            }
        }

        let driver = loader.resolve(&options.driver, options.artifact_path.as_deref())?;
        let conn = driver.connect(options)?;
        let entry = Arc::new(ConnectionEntry {
            key,
            server_identity,
            mapping_identity,
            query_timeout_secs: options.query_timeout_secs,
            invalidated: AtomicBool::new(false),
            conn: Mutex::new(Some(conn)),
        });
        debug!(key, server_identity, mapping_identity, "created connection");
        self.entries.write().insert(key, Slot::Live(entry.clone()));
        Ok(entry)
    }

    /// Look up the live connection for `key`; `NotFound` if absent or
    /// invalidated.
    pub fn get(&self, key: i64) -> Result<Arc<ConnectionEntry>> {
        match self.entries.read().get(&key) {
            Some(Slot::Live(entry)) if !entry.is_invalidated() => Ok(entry.clone()),
            _ => Err(BridgeError::NotFound(format!(
                "no live connection for key {key}"
            ))),
        }
    }

    /// Mark every entry invalidated and close every live handle.
    pub fn invalidate_all(&self) -> Result<()> {
        debug!("invalidating all cached connections");
        self.invalidate_where(|_| true)
    }

    /// Invalidate entries whose server identity matches. Sweeps every match,
    /// not only the first: multiple keys may share a server identity.
    pub fn invalidate_by_server(&self, server_identity: u64) -> Result<()> {
        debug!(server_identity, "invalidating connections by server identity");
        self.invalidate_where(|e| e.server_identity == server_identity)
    }

    /// Invalidate entries whose credential-mapping identity matches.
    pub fn invalidate_by_mapping(&self, mapping_identity: u64) -> Result<()> {
        debug!(mapping_identity, "invalidating connections by mapping identity");
        self.invalidate_where(|e| e.mapping_identity == mapping_identity)
    }

    /// Tombstone a single key, closing its handle. Used for caller-driven
    /// disconnect after the key's statements have been cleared. The close
    /// runs outside the cache lock; driver closes can block arbitrarily long.
    pub fn close(&self, key: i64) -> Result<()> {
        let entry = {
            let mut entries = self.entries.write();
            match entries.get_mut(&key) {
                Some(slot) => match std::mem::replace(slot, Slot::Invalidated) {
                    Slot::Live(entry) => entry,
                    Slot::Invalidated => return Ok(()),
                },
                None => {
                    return Err(BridgeError::NotFound(format!(
                        "no cached connection for key {key}"
                    )))
                }
            }
        };
        entry.tear_down()
    }

    /// Collect-and-continue sweep: matching slots are swapped to tombstones
    /// under the lock, then each close is attempted independently with the
    /// lock released, so unrelated lookups never wait on a driver close. A
    /// failure never aborts the rest; the first error is reported after the
    /// sweep completes.
    fn invalidate_where(&self, pred: impl Fn(&ConnectionEntry) -> bool) -> Result<()> {
        let matched: Vec<(i64, Arc<ConnectionEntry>)> = {
            let mut entries = self.entries.write();
            let mut matched = Vec::new();
            for (key, slot) in entries.iter_mut() {
                if !matches!(slot, Slot::Live(entry) if pred(entry)) {
                    continue;
                }
                if let Slot::Live(entry) = std::mem::replace(slot, Slot::Invalidated) {
                    matched.push((*key, entry));
                }
            }
            matched
        };

        let mut first_err = None;
        for (key, entry) in matched {
            if let Err(e) = entry.tear_down() {
                warn!(key, error = %e, "failed to close connection during invalidation");
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            None => Ok(()),
            Some(e) => Err(e),
        }
    }
}

impl Default for ConnectionCache {
    fn default() -> Self {
        Self::new()
    }
}
