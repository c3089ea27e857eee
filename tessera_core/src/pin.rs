//! Pinned host buffers
//!
//! A [`PinnedBuffer`] is the host memory a native tensor value points into.
//! Contiguous arrays are pinned in place by borrowing them; non-contiguous
//! arrays are copied into a row-major buffer the pin owns.

use std::fmt;

use crate::error::{TesseraError, TesseraResult};
use crate::host::{with_storage, Element, HostTensor, TensorStorage};
use crate::native::TensorBuffer;
use tessera_types::ElementType;

/// Row-major copy of a non-contiguous array
trait CopiedRegion: Send {
    fn buffer(&self) -> TensorBuffer<'_>;
}

struct CopiedElements<T>(Vec<T>);

impl<T: Element> CopiedRegion for CopiedElements<T> {
    fn buffer(&self) -> TensorBuffer<'_> {
        T::as_buffer(&self.0)
    }
}

enum Region<'a> {
    Borrowed(TensorBuffer<'a>),
    Copied(Box<dyn CopiedRegion + 'a>),
}

/// Host memory held in place for the native side
pub struct PinnedBuffer<'a> {
    region: Region<'a>,
    element_type: ElementType,
    shape: Vec<i64>,
}

impl<'a> PinnedBuffer<'a> {
    /// Pin the elements of `tensor`
    ///
    /// Fails with `InvalidInput` for a non-contiguous array when `copy_non_contiguous` is off.
    pub fn pin<'v: 'a>(tensor: &'a HostTensor<'v>, copy_non_contiguous: bool) -> TesseraResult<Self> {
        with_storage!(tensor, storage => pin_storage(storage, copy_non_contiguous))
    }

    /// Elements as handed to the engine
    ///
    /// Borrowed regions point at the caller's array; copied regions stay at
    /// the same address however the pin itself is moved.
    pub fn buffer(&self) -> TensorBuffer<'_> {
        match &self.region {
            Region::Borrowed(buffer) => *buffer,
            Region::Copied(copy) => copy.buffer(),
        }
    }

    pub fn element_type(&self) -> ElementType {
        self.element_type
    }

    /// Dimensions as the engine expects them
    pub fn shape(&self) -> &[i64] {
        &self.shape
    }

    /// Whether the elements had to be copied
    pub fn is_copy(&self) -> bool {
        matches!(self.region, Region::Copied(_))
    }
}

fn pin_storage<'a, 'v: 'a, T: Element>(
    storage: &'a TensorStorage<'v, T>,
    copy_non_contiguous: bool,
) -> TesseraResult<PinnedBuffer<'a>> {
    let region = match storage.as_slice() {
        Some(data) => Region::Borrowed(T::as_buffer(data)),
        None if copy_non_contiguous => {
            log::debug!(
                "copying non-contiguous {} tensor of shape {:?}",
                T::TYPE,
                storage.shape()
            );
            Region::Copied(Box::new(CopiedElements(storage.to_vec())))
        }
        None => {
            return Err(TesseraError::invalid_input(format!(
                "{} tensor of shape {:?} is not contiguous and cannot be pinned in place",
                T::TYPE,
                storage.shape()
            )))
        }
    };

    Ok(PinnedBuffer {
        region,
        element_type: T::TYPE,
        shape: storage.shape().iter().map(|&dim| dim as i64).collect(),
    })
}

impl fmt::Debug for PinnedBuffer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PinnedBuffer")
            .field("element_type", &self.element_type)
            .field("shape", &self.shape)
            .field("copy", &self.is_copy())
            .finish()
    }
}
