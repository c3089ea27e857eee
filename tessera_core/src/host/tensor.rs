//! Host tensors
//!
//! A [`HostTensor`] is a dense array of one supported element type. Its
//! elements live in one of three places:
//!
//! - an owned `ndarray` array
//! - an `ndarray` view borrowed from the caller
//! - native memory owned by an engine value ([`NativeArray`])
//!
//! Native storage is what un-projection produces: the host reads the engine's
//! buffer in place, and the engine value stays alive until the last array
//! referring to it is dropped.

use std::fmt;
use std::sync::Arc;

use half::{bf16, f16};
use ndarray::{Array1, ArrayD, ArrayViewD, IxDyn};

use super::element::{Element, FixedElement};
use crate::native::{OwnedValue, ValueHandle};
use tessera_types::ElementType;

/// Apply `$body` to the storage of whichever variant `$tensor` holds
macro_rules! with_storage {
    ($tensor:expr, $storage:ident => $body:expr) => {
        match $tensor {
            HostTensor::Float32($storage) => $body,
            HostTensor::Float64($storage) => $body,
            HostTensor::Float16($storage) => $body,
            HostTensor::BFloat16($storage) => $body,
            HostTensor::Int8($storage) => $body,
            HostTensor::Int16($storage) => $body,
            HostTensor::Int32($storage) => $body,
            HostTensor::Int64($storage) => $body,
            HostTensor::Uint8($storage) => $body,
            HostTensor::Uint16($storage) => $body,
            HostTensor::Uint32($storage) => $body,
            HostTensor::Uint64($storage) => $body,
            HostTensor::Bool($storage) => $body,
            HostTensor::String($storage) => $body,
        }
    };
}
pub(crate) use with_storage;

/// Rebuild the same variant around the storage `$body` produces
macro_rules! map_storage {
    ($tensor:expr, $storage:ident => $body:expr) => {
        match $tensor {
            HostTensor::Float32($storage) => HostTensor::Float32($body),
            HostTensor::Float64($storage) => HostTensor::Float64($body),
            HostTensor::Float16($storage) => HostTensor::Float16($body),
            HostTensor::BFloat16($storage) => HostTensor::BFloat16($body),
            HostTensor::Int8($storage) => HostTensor::Int8($body),
            HostTensor::Int16($storage) => HostTensor::Int16($body),
            HostTensor::Int32($storage) => HostTensor::Int32($body),
            HostTensor::Int64($storage) => HostTensor::Int64($body),
            HostTensor::Uint8($storage) => HostTensor::Uint8($body),
            HostTensor::Uint16($storage) => HostTensor::Uint16($body),
            HostTensor::Uint32($storage) => HostTensor::Uint32($body),
            HostTensor::Uint64($storage) => HostTensor::Uint64($body),
            HostTensor::Bool($storage) => HostTensor::Bool($body),
            HostTensor::String($storage) => HostTensor::String($body),
        }
    };
}

/// Native tensor value kept alive for host arrays reading its memory
pub struct TensorOwner {
    value: OwnedValue,
}

impl TensorOwner {
    pub(crate) fn new(value: OwnedValue) -> Arc<Self> {
        Arc::new(Self { value })
    }

    /// Borrowed handle of the native tensor
    pub fn handle(&self) -> ValueHandle {
        self.value.handle()
    }
}

impl fmt::Debug for TensorOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TensorOwner").field(&self.value.handle()).finish()
    }
}

/// Row-major array over native memory
pub struct NativeArray<T> {
    owner: Arc<TensorOwner>,
    ptr: *const T,
    shape: Vec<usize>,
}

// The memory is immutable and kept alive by `owner`.
unsafe impl<T: Send + Sync> Send for NativeArray<T> {}
unsafe impl<T: Send + Sync> Sync for NativeArray<T> {}

impl<T: FixedElement> NativeArray<T> {
    /// # Safety
    ///
    /// `ptr` must be non-null, aligned for `T`, and point at
    /// `shape.iter().product()` initialized elements that stay valid and
    /// unmodified while `owner` is alive.
    pub(crate) unsafe fn new(owner: Arc<TensorOwner>, ptr: *const T, shape: Vec<usize>) -> Self {
        Self { owner, ptr, shape }
    }
}

impl<T> NativeArray<T> {
    pub fn view(&self) -> ArrayViewD<'_, T> {
        // SAFETY: upheld by the constructor; the view borrows self, which holds the owner.
        unsafe { ArrayViewD::from_shape_ptr(IxDyn(&self.shape), self.ptr) }
    }

    pub fn as_slice(&self) -> &[T] {
        // SAFETY: see `view`; native tensors are always contiguous.
        unsafe { std::slice::from_raw_parts(self.ptr, self.len()) }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Native value backing this array
    pub fn owner(&self) -> &Arc<TensorOwner> {
        &self.owner
    }
}

impl<T> Clone for NativeArray<T> {
    fn clone(&self) -> Self {
        Self {
            owner: Arc::clone(&self.owner),
            ptr: self.ptr,
            shape: self.shape.clone(),
        }
    }
}

impl<T> fmt::Debug for NativeArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeArray")
            .field("value", &self.owner.handle())
            .field("shape", &self.shape)
            .finish()
    }
}

/// Where a tensor's elements live
#[derive(Clone, Debug)]
pub enum TensorStorage<'a, T> {
    Owned(ArrayD<T>),
    View(ArrayViewD<'a, T>),
    Native(NativeArray<T>),
}

impl<'a, T> TensorStorage<'a, T> {
    pub fn view(&self) -> ArrayViewD<'_, T> {
        match self {
            TensorStorage::Owned(array) => array.view(),
            TensorStorage::View(view) => view.view(),
            TensorStorage::Native(native) => native.view(),
        }
    }

    pub fn shape(&self) -> &[usize] {
        match self {
            TensorStorage::Owned(array) => array.shape(),
            TensorStorage::View(view) => view.shape(),
            TensorStorage::Native(native) => native.shape(),
        }
    }

    pub fn len(&self) -> usize {
        self.shape().iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Elements as one row-major slice, `None` if the layout is not contiguous
    pub fn as_slice(&self) -> Option<&[T]> {
        match self {
            TensorStorage::Owned(array) => array.as_slice(),
            TensorStorage::View(view) => view.as_slice(),
            TensorStorage::Native(native) => Some(native.as_slice()),
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, TensorStorage::Native(_))
    }
}

impl<T: Clone> TensorStorage<'_, T> {
    /// Detach from borrowed memory by copying views; native storage stays shared
    pub fn into_owned(self) -> TensorStorage<'static, T> {
        match self {
            TensorStorage::Owned(array) => TensorStorage::Owned(array),
            TensorStorage::View(view) => TensorStorage::Owned(view.to_owned()),
            TensorStorage::Native(native) => TensorStorage::Native(native),
        }
    }

    /// Copy of the elements in row-major order
    pub fn to_vec(&self) -> Vec<T> {
        match self.as_slice() {
            Some(slice) => slice.to_vec(),
            None => self.view().iter().cloned().collect(),
        }
    }
}

impl<T: PartialEq> PartialEq for TensorStorage<'_, T> {
    fn eq(&self, other: &Self) -> bool {
        self.view() == other.view()
    }
}

/// Dense host tensor of one element type
#[derive(Clone, Debug, PartialEq)]
pub enum HostTensor<'a> {
    Float32(TensorStorage<'a, f32>),
    Float64(TensorStorage<'a, f64>),
    Float16(TensorStorage<'a, f16>),
    BFloat16(TensorStorage<'a, bf16>),
    Int8(TensorStorage<'a, i8>),
    Int16(TensorStorage<'a, i16>),
    Int32(TensorStorage<'a, i32>),
    Int64(TensorStorage<'a, i64>),
    Uint8(TensorStorage<'a, u8>),
    Uint16(TensorStorage<'a, u16>),
    Uint32(TensorStorage<'a, u32>),
    Uint64(TensorStorage<'a, u64>),
    Bool(TensorStorage<'a, bool>),
    String(TensorStorage<'a, String>),
}

impl<'a> HostTensor<'a> {
    /// Tensor owning `array`
    pub fn from_array<T: Element>(array: ArrayD<T>) -> HostTensor<'static> {
        T::into_tensor(TensorStorage::Owned(array))
    }

    /// Tensor borrowing `view`
    pub fn from_view<T: Element>(view: ArrayViewD<'a, T>) -> Self {
        T::into_tensor(TensorStorage::View(view))
    }

    /// One-dimensional owned tensor
    pub fn from_vec<T: Element>(data: Vec<T>) -> HostTensor<'static> {
        Self::from_array(Array1::from_vec(data).into_dyn())
    }

    pub fn element_type(&self) -> ElementType {
        match self {
            HostTensor::Float32(_) => ElementType::Float32,
            HostTensor::Float64(_) => ElementType::Float64,
            HostTensor::Float16(_) => ElementType::Float16,
            HostTensor::BFloat16(_) => ElementType::BFloat16,
            HostTensor::Int8(_) => ElementType::Int8,
            HostTensor::Int16(_) => ElementType::Int16,
            HostTensor::Int32(_) => ElementType::Int32,
            HostTensor::Int64(_) => ElementType::Int64,
            HostTensor::Uint8(_) => ElementType::Uint8,
            HostTensor::Uint16(_) => ElementType::Uint16,
            HostTensor::Uint32(_) => ElementType::Uint32,
            HostTensor::Uint64(_) => ElementType::Uint64,
            HostTensor::Bool(_) => ElementType::Bool,
            HostTensor::String(_) => ElementType::String,
        }
    }

    pub fn shape(&self) -> &[usize] {
        with_storage!(self, storage => storage.shape())
    }

    pub fn ndim(&self) -> usize {
        self.shape().len()
    }

    pub fn len(&self) -> usize {
        with_storage!(self, storage => storage.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the elements can be handed over in place
    pub fn is_contiguous(&self) -> bool {
        with_storage!(self, storage => storage.as_slice().is_some())
    }

    /// Whether the elements live in native memory
    pub fn is_native(&self) -> bool {
        with_storage!(self, storage => storage.is_native())
    }

    /// Typed storage, `None` if the element type differs
    pub fn storage<T: Element>(&self) -> Option<&TensorStorage<'a, T>> {
        T::storage(self)
    }

    /// Typed view, `None` if the element type differs
    pub fn view<T: Element>(&self) -> Option<ArrayViewD<'_, T>> {
        T::storage(self).map(TensorStorage::view)
    }

    /// Copy of the elements in row-major order, `None` if the element type differs
    pub fn to_vec<T: Element>(&self) -> Option<Vec<T>> {
        T::storage(self).map(TensorStorage::to_vec)
    }

    /// Detach from borrowed host memory; native storage stays shared
    pub fn into_owned(self) -> HostTensor<'static> {
        map_storage!(self, storage => storage.into_owned())
    }

    /// Copy every element into owned memory, letting go of any native value
    pub fn into_copied(self) -> HostTensor<'static> {
        map_storage!(self, storage => TensorStorage::Owned(storage.view().to_owned()))
    }
}

impl<T: Element> From<ArrayD<T>> for HostTensor<'static> {
    fn from(array: ArrayD<T>) -> Self {
        HostTensor::from_array(array)
    }
}

impl<'a, T: Element> From<ArrayViewD<'a, T>> for HostTensor<'a> {
    fn from(view: ArrayViewD<'a, T>) -> Self {
        HostTensor::from_view(view)
    }
}
