//! Ownership ledger
//!
//! Every resource acquired while projecting or un-projecting a value is
//! registered here, in acquisition order. Disposal walks the entries last to
//! first and releases each exactly once, so a native value is always released
//! before the host memory it points into.
//!
//! ```rust,ignore
//! let mut ledger = OwnershipLedger::new();
//! let result = projector.project(&value, &meta, &mut ledger);
//! // success or failure, the ledger is disposed by the caller
//! ledger.dispose();
//! ```

use std::sync::Arc;

use crate::host::TensorOwner;
use crate::native::OwnedValue;
use crate::pin::PinnedBuffer;

/// Something a ledger can release
pub trait Release {
    fn release(self: Box<Self>);
}

impl Release for OwnedValue {
    fn release(self: Box<Self>) {
        OwnedValue::release(*self);
    }
}

impl Release for Arc<TensorOwner> {
    fn release(self: Box<Self>) {
        // The native tensor goes away with the last host array reading it.
        drop(self);
    }
}

impl Release for OwnershipLedger<'_> {
    fn release(mut self: Box<Self>) {
        self.dispose();
    }
}

/// One entry in a ledger
pub enum Resource<'a> {
    /// Host memory a native tensor points into
    Pin(PinnedBuffer<'a>),
    /// Owned native value
    Value(OwnedValue),
    /// Nested owner, e.g. the elements and container of a sequence
    Owner(Box<dyn Release + Send + 'a>),
}

impl Resource<'_> {
    fn release(self) {
        match self {
            Resource::Pin(pin) => {
                log::trace!("unpinning {:?}", pin);
                drop(pin);
            }
            Resource::Value(value) => value.release(),
            Resource::Owner(owner) => owner.release(),
        }
    }
}

/// Ordered list of resources released in reverse order
#[derive(Default)]
pub struct OwnershipLedger<'a> {
    entries: Vec<Option<Resource<'a>>>,
    disposed: bool,
    released: usize,
}

impl<'a> OwnershipLedger<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a resource
    ///
    /// Registering on a disposed ledger releases the resource at once.
    pub fn register(&mut self, resource: Resource<'a>) {
        if self.disposed {
            log::warn!("resource registered on a disposed ledger, releasing it immediately");
            resource.release();
            self.released += 1;
            return;
        }
        self.entries.push(Some(resource));
    }

    /// Release every entry, last to first, and return how many were released
    ///
    /// Calling it again is a no-op returning 0.
    pub fn dispose(&mut self) -> usize {
        let mut count = 0;
        while let Some(slot) = self.entries.pop() {
            if let Some(resource) = slot {
                resource.release();
                count += 1;
            }
        }
        if count > 0 {
            log::trace!("ledger released {} resources", count);
        }
        self.disposed = true;
        self.released += count;
        count
    }

    /// Number of entries still held
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Total resources released by this ledger so far
    pub fn released(&self) -> usize {
        self.released
    }
}

impl Drop for OwnershipLedger<'_> {
    fn drop(&mut self) {
        if !self.entries.is_empty() {
            log::warn!(
                "ownership ledger dropped with {} undisposed resources, disposing",
                self.len()
            );
            self.dispose();
        }
    }
}

impl std::fmt::Debug for OwnershipLedger<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OwnershipLedger")
            .field("len", &self.len())
            .field("disposed", &self.disposed)
            .field("released", &self.released)
            .finish()
    }
}
