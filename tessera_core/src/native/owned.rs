//! Move-only owner of a native value
//!
//! An [`OwnedValue`] is the only thing in this crate that releases a native
//! handle. It cannot be cloned; ownership moves with the value and the handle
//! is released exactly once, either by [`OwnedValue::release`] or on drop.

use std::fmt;

use super::{SharedEngine, ValueHandle};

/// Owned native value
pub struct OwnedValue {
    handle: ValueHandle,
    engine: SharedEngine,
    live: bool,
}

impl OwnedValue {
    /// Take ownership of a handle the engine just handed out
    ///
    /// The handle must not be owned by anything else.
    pub fn from_raw(engine: SharedEngine, handle: ValueHandle) -> Self {
        Self {
            handle,
            engine,
            live: true,
        }
    }

    /// Borrowed view of the handle. Never release it.
    #[inline]
    pub fn handle(&self) -> ValueHandle {
        self.handle
    }

    /// Engine the value belongs to
    #[inline]
    pub fn engine(&self) -> &SharedEngine {
        &self.engine
    }

    /// Release the native value now
    pub fn release(mut self) {
        self.release_once();
    }

    /// Give up ownership without releasing; the caller becomes responsible
    pub fn into_raw(mut self) -> ValueHandle {
        self.live = false;
        self.handle
    }

    fn release_once(&mut self) {
        if self.live {
            self.live = false;
            log::trace!("releasing native value {}", self.handle);
            self.engine.release_value(self.handle);
        }
    }
}

impl Drop for OwnedValue {
    fn drop(&mut self) {
        self.release_once();
    }
}

impl fmt::Debug for OwnedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnedValue")
            .field("handle", &self.handle)
            .field("live", &self.live)
            .finish()
    }
}
