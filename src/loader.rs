//! Driver loading and caching.
//!
//! Drivers are injected capabilities: the embedding caller either registers a
//! factory in-process or supplies a dynamic-library artifact path. An artifact
//! is loaded once per path and kept alive for the process lifetime; a resolved
//! driver is cached by name, so repeated connects with the same driver never
//! reload anything.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use libloading::Library;
use parking_lot::Mutex;
use tracing::debug;

use crate::driver::Driver;
use crate::error::{BridgeError, Result};

/// Opaque box handed across the artifact boundary. Only the pointer crosses
/// the C ABI; the layout stays on the Rust side of both crates.
pub struct DriverEntry {
    pub driver: Box<dyn Driver>,
}

/// Symbol every driver artifact exports:
/// `extern "C" fn() -> *mut DriverEntry`, ownership transferred to the caller.
pub const DRIVER_ENTRYPOINT: &[u8] = b"sqlbridge_driver_entry\0";

type DriverEntryFn = unsafe extern "C" fn() -> *mut DriverEntry;

pub struct DriverLoader {
    inner: Mutex<LoaderInner>,
}

struct LoaderInner {
    drivers: HashMap<String, Arc<dyn Driver>>,
    /// Loaded artifacts, kept alive so driver code stays mapped.
    libraries: HashMap<PathBuf, Library>,
}

impl DriverLoader {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(LoaderInner {
                drivers: HashMap::new(),
                libraries: HashMap::new(),
            }),
        }
    }

    /// Register an in-process driver factory under its own name.
    pub fn register(&self, driver: Arc<dyn Driver>) {
        let name = driver.name().to_string();
        debug!(driver = %name, "registered driver");
        self.inner.lock().drivers.insert(name, driver);
    }

    /// Resolve a driver by name, loading `artifact` if it is not yet known.
    pub fn resolve(&self, name: &str, artifact: Option<&Path>) -> Result<Arc<dyn Driver>> {
        let mut inner = self.inner.lock();
        if let Some(driver) = inner.drivers.get(name) {
            return Ok(driver.clone());
        }

        let path = artifact.ok_or_else(|| {
            BridgeError::NotFound(format!("no driver registered under \"{name}\""))
        })?;

        if !inner.libraries.contains_key(path) {
            debug!(driver = name, path = %path.display(), "loading driver artifact");
            let library = unsafe { Library::new(path) }.map_err(|e| {
                BridgeError::Connection(format!(
                    "failed to load driver artifact {}: {e}",
                    path.display()
                ))
            })?;
            let driver = Self::instantiate(&library, path)?;
            inner.libraries.insert(path.to_path_buf(), library);
            inner
                .drivers
                .insert(driver.name().to_string(), Arc::from(driver));
        }

        inner.drivers.get(name).cloned().ok_or_else(|| {
            BridgeError::Connection(format!(
                "artifact {} does not provide driver \"{name}\"",
                path.display()
            ))
        })
    }

    fn instantiate(library: &Library, path: &Path) -> Result<Box<dyn Driver>> {
        let entry: libloading::Symbol<DriverEntryFn> = unsafe {
            library.get(DRIVER_ENTRYPOINT).map_err(|e| {
                BridgeError::Connection(format!(
                    "driver artifact {} lacks entry symbol: {e}",
                    path.display()
                ))
            })?
        };
        let raw = unsafe { entry() };
        if raw.is_null() {
            return Err(BridgeError::Connection(format!(
                "driver artifact {} returned no driver",
                path.display()
            )));
        }
        let entry = unsafe { Box::from_raw(raw) };
        Ok(entry.driver)
    }
}

impl Default for DriverLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{ConnectOptions, DriverConnection};

    struct DummyDriver;

    impl Driver for DummyDriver {
        fn name(&self) -> &str {
            "dummy"
        }

        fn connect(&self, _options: &ConnectOptions) -> Result<Box<dyn DriverConnection>> {
            Err(BridgeError::Connection("dummy driver cannot connect".into()))
        }
    }

    #[test]
    fn test_registered_driver_resolves_without_artifact() {
        let loader = DriverLoader::new();
        loader.register(Arc::new(DummyDriver));

        let first = loader.resolve("dummy", None).unwrap();
        let second = loader.resolve("dummy", None).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_unknown_driver_without_artifact_is_not_found() {
        let loader = DriverLoader::new();
        // `unwrap_err` would need the Ok side to be Debug; take the error out.
        let err = loader.resolve("missing", None).err().unwrap();
        assert!(matches!(err, BridgeError::NotFound(_)));
    }
}
