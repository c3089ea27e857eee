//! Un-projection dispatcher
//!
//! Rebuilds host values from native values the engine produced. The kind and
//! element type are read from the native value itself; declared output
//! metadata, when available, is only used to validate what was found.
//!
//! | Native kind | Host form | Left in the ledger |
//! |-------------|-----------|--------------------|
//! | tensor (numeric) | view over native memory | the tensor's owner |
//! | tensor (bool) | owned copy, every byte checked | nothing |
//! | tensor (string) | owned copy | nothing |
//! | sequence | `HostValue::Sequence` | one composite owner |
//! | map | owned `HostMap` | nothing |

use std::mem;
use std::ptr::NonNull;
use std::sync::Arc;

use ndarray::{ArrayD, IxDyn};

use crate::config::ProjectionConfig;
use crate::error::{TesseraError, TesseraResult};
use crate::host::{FixedElement, HostMap, HostTensor, HostValue, NativeArray, TensorOwner, TensorStorage};
use crate::ledger::{OwnershipLedger, Release, Resource};
use crate::native::{OwnedValue, RawTensorData, SharedEngine, ValueHandle};
use crate::tessera_internal;
use half::{bf16, f16};
use tessera_types::{ElementType, MapMetadata, TensorMetadata, ValueKind, ValueMetadata};

/// Elements of an un-projected sequence plus the sequence value itself
struct SequenceOwner {
    elements: OwnershipLedger<'static>,
    container: OwnedValue,
}

impl Release for SequenceOwner {
    fn release(self: Box<Self>) {
        let SequenceOwner {
            mut elements,
            container,
        } = *self;
        elements.dispose();
        container.release();
    }
}

/// Rebuilds host values from native values of one engine
pub struct Unprojector<'e> {
    engine: &'e SharedEngine,
    config: &'e ProjectionConfig,
}

impl<'e> Unprojector<'e> {
    pub fn new(engine: &'e SharedEngine, config: &'e ProjectionConfig) -> Self {
        Self { engine, config }
    }

    /// Turn `value` into a host value, binding whatever must outlive the call to `ledger`
    pub fn unproject(
        &self,
        value: OwnedValue,
        expected: Option<&ValueMetadata>,
        ledger: &mut OwnershipLedger<'static>,
    ) -> TesseraResult<HostValue<'static>> {
        if let Some(ValueMetadata::Optional { element }) = expected {
            let inner = self.unproject(value, Some(element.as_ref()), ledger)?;
            return Ok(HostValue::some(inner));
        }

        let kind = self.engine.value_kind(value.handle())?;
        if let Some(meta) = expected {
            if meta.kind() != kind {
                return Err(TesseraError::KindMismatch {
                    expected: meta.kind(),
                    actual: kind,
                });
            }
        }

        match kind {
            ValueKind::Tensor => {
                let meta = expected.and_then(ValueMetadata::as_tensor);
                let (tensor, owner) = self.read_tensor(value, meta)?;
                if let Some(owner) = owner {
                    ledger.register(Resource::Owner(Box::new(owner)));
                }
                Ok(HostValue::Tensor(tensor))
            }
            ValueKind::Sequence => {
                self.unproject_sequence(value, expected.and_then(ValueMetadata::element), ledger)
            }
            ValueKind::Map => {
                let map = self.unproject_map(value, expected.and_then(ValueMetadata::as_map))?;
                Ok(HostValue::Map(map))
            }
            other => Err(TesseraError::UnsupportedValueKind(other)),
        }
    }

    fn unproject_sequence(
        &self,
        value: OwnedValue,
        element: Option<&ValueMetadata>,
        ledger: &mut OwnershipLedger<'static>,
    ) -> TesseraResult<HostValue<'static>> {
        let count = self.engine.value_count(value.handle())?;
        let mut elements = OwnershipLedger::new();
        let items = match self.unproject_elements(&value, count, element, &mut elements) {
            Ok(items) => items,
            Err(err) => {
                elements.dispose();
                return Err(err);
            }
        };

        log::debug!("unprojected sequence {} of {} values", value.handle(), count);
        ledger.register(Resource::Owner(Box::new(SequenceOwner {
            elements,
            container: value,
        })));
        Ok(HostValue::Sequence(items))
    }

    fn unproject_elements(
        &self,
        sequence: &OwnedValue,
        count: usize,
        element: Option<&ValueMetadata>,
        elements: &mut OwnershipLedger<'static>,
    ) -> TesseraResult<Vec<HostValue<'static>>> {
        (0..count)
            .map(|index| {
                let item = self.fetch(sequence, index)?;
                self.unproject(item, element, elements)
            })
            .collect()
    }

    fn unproject_map(
        &self,
        value: OwnedValue,
        meta: Option<&MapMetadata>,
    ) -> TesseraResult<HostMap<'static>> {
        let keys = self.copy_tensor(self.fetch(&value, 0)?)?;
        let values = self.copy_tensor(self.fetch(&value, 1)?)?;
        log::debug!("unprojected map {} of {} entries", value.handle(), keys.len());
        value.release();

        if let Some(meta) = meta.filter(|_| self.config.validate_map_outputs) {
            if keys.element_type() != meta.key_type {
                return Err(TesseraError::KeyTypeMismatch {
                    expected: meta.key_type,
                    actual: keys.element_type(),
                });
            }
            if let Some(value_type) = meta.value.element_type() {
                if values.element_type() != value_type {
                    return Err(TesseraError::ValueTypeMismatch {
                        expected: value_type,
                        actual: values.element_type(),
                    });
                }
            }
        }
        HostMap::new(keys, values)
    }

    /// Take ownership of element `index` of `value`
    fn fetch(&self, value: &OwnedValue, index: usize) -> TesseraResult<OwnedValue> {
        let handle = self.engine.element_at(value.handle(), index)?;
        Ok(OwnedValue::from_raw(Arc::clone(self.engine), handle))
    }

    /// Read a tensor into owned host memory and release the native value
    fn copy_tensor(&self, value: OwnedValue) -> TesseraResult<HostTensor<'static>> {
        let (tensor, _owner) = self.read_tensor(value, None)?;
        Ok(tensor.into_copied())
    }

    /// Host tensor over a native tensor value, plus the owner the host view depends on
    ///
    /// String tensors are copied and their value released right away, so they come back
    /// without an owner.
    fn read_tensor(
        &self,
        value: OwnedValue,
        meta: Option<&TensorMetadata>,
    ) -> TesseraResult<(HostTensor<'static>, Option<Arc<TensorOwner>>)> {
        let handle = value.handle();
        let element_type = self.engine.element_type(handle)?;
        if let Some(meta) = meta {
            if meta.element_type != element_type {
                return Err(TesseraError::ElementTypeMismatch {
                    expected: meta.element_type,
                    actual: element_type,
                });
            }
        }

        let shape = self
            .engine
            .tensor_shape(handle)?
            .into_iter()
            .map(|dim| {
                usize::try_from(dim)
                    .map_err(|_| tessera_internal!("tensor {} has negative dimension {}", handle, dim))
            })
            .collect::<TesseraResult<Vec<usize>>>()?;
        if let Some(meta) = meta.filter(|_| self.config.check_shapes) {
            if !meta.accepts_shape(&shape) {
                return Err(TesseraError::ShapeMismatch {
                    expected: meta.dims.clone(),
                    actual: shape,
                });
            }
        }
        log::debug!("unprojecting {} tensor {} of shape {:?}", element_type, handle, shape);

        let (tensor, owner) = match element_type {
            ElementType::String => {
                let strings = self.engine.tensor_strings(handle)?;
                value.release();
                let array = ArrayD::from_shape_vec(IxDyn(&shape), strings).map_err(|err| {
                    tessera_internal!("string tensor {} does not match its shape: {}", handle, err)
                })?;
                return Ok((HostTensor::String(TensorStorage::Owned(array)), None));
            }
            ElementType::Float32 => self.native_tensor::<f32>(value, shape)?,
            ElementType::Float64 => self.native_tensor::<f64>(value, shape)?,
            ElementType::Float16 => self.native_tensor::<f16>(value, shape)?,
            ElementType::BFloat16 => self.native_tensor::<bf16>(value, shape)?,
            ElementType::Int8 => self.native_tensor::<i8>(value, shape)?,
            ElementType::Int16 => self.native_tensor::<i16>(value, shape)?,
            ElementType::Int32 => self.native_tensor::<i32>(value, shape)?,
            ElementType::Int64 => self.native_tensor::<i64>(value, shape)?,
            ElementType::Uint8 => self.native_tensor::<u8>(value, shape)?,
            ElementType::Uint16 => self.native_tensor::<u16>(value, shape)?,
            ElementType::Uint32 => self.native_tensor::<u32>(value, shape)?,
            ElementType::Uint64 => self.native_tensor::<u64>(value, shape)?,
            ElementType::Bool => return Ok((self.bool_tensor(value, shape)?, None)),
            ElementType::Complex64 | ElementType::Complex128 => {
                return Err(TesseraError::UnsupportedElementType(element_type))
            }
        };
        Ok((tensor, Some(owner)))
    }

    /// Storage of a fixed-size tensor, checked to hold exactly `shape` elements of `size` bytes
    fn tensor_bytes(
        &self,
        handle: ValueHandle,
        element_type: ElementType,
        shape: &[usize],
        size: usize,
    ) -> TesseraResult<(RawTensorData, usize)> {
        let count = shape
            .iter()
            .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
            .ok_or_else(|| tessera_internal!("tensor {} has shape {:?}, too many elements", handle, shape))?;
        let expected_len = count.checked_mul(size).ok_or_else(|| {
            tessera_internal!("tensor {} of {} {} elements is too large", handle, count, element_type)
        })?;

        let raw = self.engine.tensor_data(handle)?;
        if raw.byte_len != expected_len {
            return Err(tessera_internal!(
                "tensor {} holds {} bytes, {} elements of {} need {}",
                handle,
                raw.byte_len,
                count,
                element_type,
                expected_len
            ));
        }
        Ok((raw, count))
    }

    /// Copy of a bool tensor; fails if any byte is neither 0 nor 1
    fn bool_tensor(&self, value: OwnedValue, shape: Vec<usize>) -> TesseraResult<HostTensor<'static>> {
        let handle = value.handle();
        let (raw, count) = self.tensor_bytes(handle, ElementType::Bool, &shape, 1)?;
        if count > 0 && raw.ptr.is_null() {
            return Err(tessera_internal!("tensor {} has no data", handle));
        }

        let flags = {
            let bytes: &[u8] = if count == 0 {
                &[]
            } else {
                // SAFETY: the engine keeps `byte_len` bytes at `ptr` valid while the
                // value is alive; the slice is dropped before the value is released.
                unsafe { std::slice::from_raw_parts(raw.ptr, raw.byte_len) }
            };
            bytemuck::checked::try_cast_slice::<u8, bool>(bytes)
                .map_err(|err| tessera_internal!("bool tensor {} holds a byte other than 0 or 1: {:?}", handle, err))?
                .to_vec()
        };
        value.release();

        let array = ArrayD::from_shape_vec(IxDyn(&shape), flags)
            .map_err(|err| tessera_internal!("bool tensor {} does not match its shape: {}", handle, err))?;
        Ok(HostTensor::Bool(TensorStorage::Owned(array)))
    }

    fn native_tensor<T: FixedElement>(
        &self,
        value: OwnedValue,
        shape: Vec<usize>,
    ) -> TesseraResult<(HostTensor<'static>, Arc<TensorOwner>)> {
        let handle = value.handle();
        let (raw, count) = self.tensor_bytes(handle, T::TYPE, &shape, mem::size_of::<T>())?;

        let ptr = if count == 0 {
            NonNull::<T>::dangling().as_ptr().cast_const()
        } else {
            raw.ptr.cast::<T>()
        };
        if ptr.is_null() || (ptr as usize) % mem::align_of::<T>() != 0 {
            return Err(tessera_internal!(
                "tensor {} data at {:p} is not aligned for {}",
                handle,
                ptr,
                T::TYPE
            ));
        }

        let owner = TensorOwner::new(value);
        // SAFETY: the engine keeps the data valid and unmodified while the value
        // is alive, and the owner keeps the value alive; size and alignment are checked above.
        let array = unsafe { NativeArray::new(Arc::clone(&owner), ptr, shape) };
        Ok((T::into_tensor(TensorStorage::Native(array)), owner))
    }
}
