// Runtime detection (spec §4.4).
//
// The original spec describes a dynamic import of a workflow-runtime module,
// cached after the first probe. This crate has no dynamic-loading analogue
// (§9 Design Notes): a `Runtime` handle is either supplied to the agent
// factory or it isn't, so detection degenerates to reporting that fact once
// and caching it behind a `OnceLock`.

use std::sync::{Arc, OnceLock};

use tracing::debug;

/// A durable-workflow runtime handle. Opaque to this crate beyond its
/// presence: it is what the Durable Step Wrapper announces steps to.
pub trait Runtime: Send + Sync {
    /// A human-readable name used in logs (e.g. the concrete runtime's id).
    fn name(&self) -> &str;
}

/// A no-op runtime used only to exercise the "runtime present" path in tests.
pub struct NoopRuntime;

impl Runtime for NoopRuntime {
    fn name(&self) -> &str {
        "noop"
    }
}

/// Caches whether a `Runtime` handle is available for this process.
pub struct RuntimeDetector {
    handle: OnceLock<Option<Arc<dyn Runtime>>>,
}

impl RuntimeDetector {
    pub fn new() -> Self {
        Self {
            handle: OnceLock::new(),
        }
    }

    /// Supplies (or withholds) the runtime handle. Subsequent calls to
    /// `detect` are O(1) regardless of how many times `init` is called; only
    /// the first call's value is retained.
    pub fn init(&self, runtime: Option<Arc<dyn Runtime>>) {
        if self.handle.set(runtime).is_err() {
            debug!("runtime detector already initialized; ignoring subsequent init");
        }
    }

    /// Returns the cached runtime handle, if any. Logs at debug level the
    /// first time it observes an absent runtime.
    pub fn detect(&self) -> Option<Arc<dyn Runtime>> {
        match self.handle.get() {
            Some(handle) => handle.clone(),
            None => {
                debug!("no durable runtime handle supplied; durable step wrapper runs transparently");
                None
            }
        }
    }

    pub fn is_present(&self) -> bool {
        self.detect().is_some()
    }
}

impl Default for RuntimeDetector {
    fn default() -> Self {
        Self::new()
    }
}
