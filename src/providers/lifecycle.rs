//! Shared initialize/cleanup state machine.
//!
//! unloaded → loading → loaded; any state → error on unrecoverable failure;
//! loaded → unloaded on cleanup. Concurrent `initialize()` callers serialize
//! on the cell's lock, so the second caller observes the first caller's
//! outcome instead of re-running initialization.

use super::error::ModelError;
use super::ModelState;
use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use tokio::sync::Mutex;

const STATE_UNLOADED: u8 = 0;
const STATE_LOADING: u8 = 1;
const STATE_LOADED: u8 = 2;
const STATE_ERROR: u8 = 3;

enum Inner {
    Unloaded,
    Loaded,
    Error(String),
}

/// One provider instance's lifecycle state.
pub struct LifecycleCell {
    inner: Mutex<Inner>,
    // Lock-free mirror for status reporting while the lock is held.
    observed: AtomicU8,
}

impl Default for LifecycleCell {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleCell {
    /// A fresh, unloaded cell.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::Unloaded),
            observed: AtomicU8::new(STATE_UNLOADED),
        }
    }

    /// Runs `init` exactly once.
    ///
    /// Re-entry after success is a no-op; re-entry after failure returns the
    /// recorded error without re-running `init`.
    pub async fn initialize<F, Fut>(&self, init: F) -> Result<(), ModelError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), ModelError>>,
    {
        let mut inner = self.inner.lock().await;
        match &*inner {
            Inner::Loaded => Ok(()),
            Inner::Error(message) => Err(ModelError::InitializationFailed {
                message: message.clone(),
            }),
            Inner::Unloaded => {
                self.observed.store(STATE_LOADING, Ordering::Release);
                match init().await {
                    Ok(()) => {
                        *inner = Inner::Loaded;
                        self.observed.store(STATE_LOADED, Ordering::Release);
                        Ok(())
                    }
                    Err(e) => {
                        *inner = Inner::Error(e.to_string());
                        self.observed.store(STATE_ERROR, Ordering::Release);
                        Err(e)
                    }
                }
            }
        }
    }

    /// Fails fast unless the cell is loaded.
    pub async fn ensure_ready(&self, model: &str) -> Result<(), ModelError> {
        let inner = self.inner.lock().await;
        match &*inner {
            Inner::Loaded => Ok(()),
            Inner::Unloaded => Err(ModelError::NotInitialized {
                model: model.to_string(),
            }),
            Inner::Error(message) => Err(ModelError::InitializationFailed {
                message: message.clone(),
            }),
        }
    }

    /// Returns the cell to unloaded; clears a sticky error. Idempotent.
    pub async fn reset(&self) {
        let mut inner = self.inner.lock().await;
        *inner = Inner::Unloaded;
        self.observed.store(STATE_UNLOADED, Ordering::Release);
    }

    /// Marks the cell errored outside of initialization.
    pub async fn poison(&self, message: impl Into<String>) {
        let mut inner = self.inner.lock().await;
        *inner = Inner::Error(message.into());
        self.observed.store(STATE_ERROR, Ordering::Release);
    }

    /// Non-blocking state view.
    pub fn state(&self) -> ModelState {
        match self.observed.load(Ordering::Acquire) {
            STATE_LOADING => ModelState::Loading,
            STATE_LOADED => ModelState::Loaded,
            STATE_ERROR => ModelState::Error,
            _ => ModelState::Unloaded,
        }
    }

    /// Whether the cell is currently loaded.
    pub fn is_loaded(&self) -> bool {
        self.observed.load(Ordering::Acquire) == STATE_LOADED
    }
}
