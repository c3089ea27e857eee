//! Projection dispatcher
//!
//! Turns a host value into a native value, recursively, checking it against
//! the declared metadata on the way down. Every pin and every native value
//! created, at any depth, is appended to one flat ledger; on failure the
//! caller disposes that ledger and everything acquired so far is released.

use std::sync::Arc;

use crate::config::ProjectionConfig;
use crate::descriptor::describe;
use crate::error::{TesseraError, TesseraResult};
use crate::host::{check_layout, HostMap, HostTensor, HostValue};
use crate::ledger::{OwnershipLedger, Resource};
use crate::native::{OwnedValue, SharedEngine, ValueHandle};
use crate::pin::PinnedBuffer;
use tessera_types::{MapMetadata, TensorMetadata, ValueMetadata};

/// Projects host values into native values of one engine
pub struct Projector<'e> {
    engine: &'e SharedEngine,
    config: &'e ProjectionConfig,
}

impl<'e> Projector<'e> {
    pub fn new(engine: &'e SharedEngine, config: &'e ProjectionConfig) -> Self {
        Self { engine, config }
    }

    /// Project `value` as described by `expected`
    ///
    /// The returned handle is borrowed: the owned native value sits in
    /// `ledger`, which also holds the host memory pinned for it.
    pub fn project<'a, 'v: 'a>(
        &self,
        value: &'a HostValue<'v>,
        expected: &ValueMetadata,
        ledger: &mut OwnershipLedger<'a>,
    ) -> TesseraResult<ValueHandle> {
        match (value, expected) {
            (HostValue::Optional(None), ValueMetadata::Optional { .. }) => Err(
                TesseraError::invalid_input("an absent optional has no native form"),
            ),
            (HostValue::Optional(Some(inner)), ValueMetadata::Optional { element }) => {
                self.project(inner, element, ledger)
            }
            (_, ValueMetadata::Optional { element }) => self.project(value, element, ledger),
            (HostValue::Tensor(tensor), ValueMetadata::Tensor(meta)) => {
                self.project_tensor(tensor, meta, ledger)
            }
            (HostValue::Sequence(items), ValueMetadata::Sequence { element }) => {
                self.project_sequence(items, element, ledger)
            }
            (HostValue::Map(map), ValueMetadata::Map(meta)) => self.project_map(map, meta, ledger),
            _ => Err(TesseraError::KindMismatch {
                expected: expected.kind(),
                actual: value.kind(),
            }),
        }
    }

    fn project_tensor<'a, 'v: 'a>(
        &self,
        tensor: &'a HostTensor<'v>,
        meta: &TensorMetadata,
        ledger: &mut OwnershipLedger<'a>,
    ) -> TesseraResult<ValueHandle> {
        if tensor.element_type() != meta.element_type {
            return Err(TesseraError::ElementTypeMismatch {
                expected: meta.element_type,
                actual: tensor.element_type(),
            });
        }
        if self.config.check_shapes && !meta.accepts_shape(tensor.shape()) {
            return Err(TesseraError::ShapeMismatch {
                expected: meta.dims.clone(),
                actual: tensor.shape().to_vec(),
            });
        }
        self.wrap_tensor(tensor, ledger)
    }

    /// Pin `tensor` and wrap it as a native value; registers the pin, then the value
    fn wrap_tensor<'a, 'v: 'a>(
        &self,
        tensor: &'a HostTensor<'v>,
        ledger: &mut OwnershipLedger<'a>,
    ) -> TesseraResult<ValueHandle> {
        let pin = PinnedBuffer::pin(tensor, self.config.copy_non_contiguous)?;
        // SAFETY: the pin goes into the ledger ahead of the value, so disposal
        // releases the value before the memory it points into. A copied region
        // lives on the heap and does not move with the pin.
        let handle = unsafe {
            self.engine
                .create_tensor_value(pin.buffer(), pin.element_type(), pin.shape())
        }?;
        let value = OwnedValue::from_raw(Arc::clone(self.engine), handle);
        log::debug!(
            "projected {} tensor {:?} as {}{}",
            pin.element_type(),
            pin.shape(),
            handle,
            if pin.is_copy() { " (copied)" } else { "" }
        );
        ledger.register(Resource::Pin(pin));
        ledger.register(Resource::Value(value));
        Ok(handle)
    }

    fn project_sequence<'a, 'v: 'a>(
        &self,
        items: &'a [HostValue<'v>],
        element: &ValueMetadata,
        ledger: &mut OwnershipLedger<'a>,
    ) -> TesseraResult<ValueHandle> {
        for (index, item) in items.iter().enumerate() {
            describe(item, element).map_err(|err| match err {
                TesseraError::KindMismatch { expected, actual } => TesseraError::ElementKindMismatch {
                    index,
                    expected,
                    actual,
                },
                other => other,
            })?;
        }

        let handles = items
            .iter()
            .map(|item| self.project(item, element, ledger))
            .collect::<TesseraResult<Vec<_>>>()?;

        let handle = self.engine.create_sequence_value(&handles)?;
        log::debug!("projected sequence of {} values as {}", handles.len(), handle);
        ledger.register(Resource::Value(OwnedValue::from_raw(Arc::clone(self.engine), handle)));
        Ok(handle)
    }

    fn project_map<'a, 'v: 'a>(
        &self,
        map: &'a HostMap<'v>,
        meta: &MapMetadata,
        ledger: &mut OwnershipLedger<'a>,
    ) -> TesseraResult<ValueHandle> {
        let value_type = meta
            .value
            .element_type()
            .ok_or(TesseraError::UnsupportedValueKind(meta.value.kind()))?;

        let (keys, values) = (map.keys(), map.values());
        if keys.element_type() != meta.key_type {
            return Err(TesseraError::KeyTypeMismatch {
                expected: meta.key_type,
                actual: keys.element_type(),
            });
        }
        if values.element_type() != value_type {
            return Err(TesseraError::ValueTypeMismatch {
                expected: value_type,
                actual: values.element_type(),
            });
        }
        check_layout(keys, values)?;

        let keys_handle = self.wrap_tensor(keys, ledger)?;
        let values_handle = self.wrap_tensor(values, ledger)?;
        let handle = self.engine.create_map_value(keys_handle, values_handle)?;
        log::debug!("projected map of {} entries as {}", map.len(), handle);
        ledger.register(Resource::Value(OwnedValue::from_raw(Arc::clone(self.engine), handle)));
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::HeapEngine;
    use ndarray::array;
    use tessera_types::{ElementType, GraphMetadata, ValueKind};

    fn engine() -> (Arc<HeapEngine>, SharedEngine) {
        let heap = Arc::new(HeapEngine::echo(GraphMetadata::default()));
        let shared: SharedEngine = heap.clone();
        (heap, shared)
    }

    #[test]
    fn test_tensor_registers_pin_then_value() {
        let (heap, shared) = engine();
        let config = ProjectionConfig::default();
        let value = HostValue::from(HostTensor::from_array(array![[1.0f32, 2.0], [3.0, 4.0]].into_dyn()));
        let meta = ValueMetadata::tensor_with_dims(ElementType::Float32, vec![-1, 2]);

        let mut ledger = OwnershipLedger::new();
        let handle = Projector::new(&shared, &config).project(&value, &meta, &mut ledger).unwrap();
        assert_eq!(ledger.len(), 2);
        assert_eq!(heap.live_values(), 1);
        assert_eq!(shared.tensor_shape(handle).unwrap(), vec![2, 2]);

        assert_eq!(ledger.dispose(), 2);
        assert_eq!(heap.live_values(), 0);
    }

    fn project_all<'a, 'v: 'a>(
        projector: &Projector<'_>,
        values: &'a [HostValue<'v>],
        meta: &ValueMetadata,
        ledger: &mut OwnershipLedger<'a>,
    ) -> TesseraResult<Vec<ValueHandle>> {
        values.iter().map(|value| projector.project(value, meta, ledger)).collect()
    }

    #[test]
    fn test_borrowed_views_project_through_short_borrow() {
        let (heap, shared) = engine();
        let config = ProjectionConfig::default();
        let data = array![[1i32, 2], [3, 4]].into_dyn();
        let values = vec![
            HostValue::from(HostTensor::from_view(data.view())),
            HostValue::from(HostTensor::from_view(data.view().reversed_axes())),
        ];
        let meta = ValueMetadata::tensor_with_dims(ElementType::Int32, vec![2, 2]);

        {
            let mut ledger = OwnershipLedger::new();
            let handles = project_all(&Projector::new(&shared, &config), &values, &meta, &mut ledger).unwrap();
            assert_eq!(handles.len(), 2);
            assert_eq!(heap.live_values(), 2);
            assert_eq!(ledger.dispose(), 4);
        }
        assert_eq!(heap.live_values(), 0);
        assert_eq!(values[1].as_tensor().unwrap().to_vec::<i32>(), Some(vec![1, 3, 2, 4]));
    }

    #[test]
    fn test_element_type_checked_before_pinning() {
        let (heap, shared) = engine();
        let config = ProjectionConfig::default();
        let value = HostValue::from(HostTensor::from_vec(vec![1i32, 2]));
        let meta = ValueMetadata::tensor(ElementType::Int64);

        let mut ledger = OwnershipLedger::new();
        let err = Projector::new(&shared, &config).project(&value, &meta, &mut ledger).unwrap_err();
        assert!(matches!(
            err,
            TesseraError::ElementTypeMismatch {
                expected: ElementType::Int64,
                actual: ElementType::Int32
            }
        ));
        assert!(ledger.is_empty());
        assert_eq!(heap.stats().created, 0);
    }

    #[test]
    fn test_shape_check_can_be_disabled() {
        let (_heap, shared) = engine();
        let value = HostValue::from(HostTensor::from_vec(vec![1.0f64, 2.0, 3.0]));
        let meta = ValueMetadata::tensor_with_dims(ElementType::Float64, vec![4]);

        let strict = ProjectionConfig::default();
        let mut ledger = OwnershipLedger::new();
        let err = Projector::new(&shared, &strict).project(&value, &meta, &mut ledger).unwrap_err();
        assert!(matches!(err, TesseraError::ShapeMismatch { .. }));

        let lenient = ProjectionConfig {
            check_shapes: false,
            ..ProjectionConfig::default()
        };
        Projector::new(&shared, &lenient).project(&value, &meta, &mut ledger).unwrap();
        ledger.dispose();
    }

    #[test]
    fn test_sequence_member_kind_reports_index() {
        let (heap, shared) = engine();
        let config = ProjectionConfig::default();
        let value = HostValue::Sequence(vec![
            HostValue::from(HostTensor::from_vec(vec![1.0f32])),
            HostValue::Map(HostMap::from_pairs(vec![(1i64, 1.0f32)])),
        ]);
        let meta = ValueMetadata::sequence(ValueMetadata::tensor(ElementType::Float32));

        let mut ledger = OwnershipLedger::new();
        let err = Projector::new(&shared, &config).project(&value, &meta, &mut ledger).unwrap_err();
        match err {
            TesseraError::ElementKindMismatch { index, expected, actual } => {
                assert_eq!(index, 1);
                assert_eq!(expected, ValueKind::Tensor);
                assert_eq!(actual, ValueKind::Map);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(ledger.is_empty());
        assert_eq!(heap.stats().created, 0);
    }

    #[test]
    fn test_map_key_type_checked_before_pinning() {
        let (heap, shared) = engine();
        let config = ProjectionConfig::default();
        let value = HostValue::Map(HostMap::from_pairs(vec![(1i32, 1.0f32)]));
        let meta = ValueMetadata::map(ElementType::Int64, ValueMetadata::tensor(ElementType::Float32));

        let mut ledger = OwnershipLedger::new();
        let err = Projector::new(&shared, &config).project(&value, &meta, &mut ledger).unwrap_err();
        assert!(matches!(err, TesseraError::KeyTypeMismatch { .. }));
        assert!(ledger.is_empty());
        assert_eq!(heap.stats().created, 0);
    }

    #[test]
    fn test_map_with_non_tensor_values_is_unsupported() {
        let (_heap, shared) = engine();
        let config = ProjectionConfig::default();
        let value = HostValue::Map(HostMap::from_pairs(vec![(1i64, 1.0f32)]));
        let meta = ValueMetadata::map(
            ElementType::Int64,
            ValueMetadata::sequence(ValueMetadata::tensor(ElementType::Float32)),
        );

        let mut ledger = OwnershipLedger::new();
        let err = Projector::new(&shared, &config).project(&value, &meta, &mut ledger).unwrap_err();
        assert!(matches!(err, TesseraError::UnsupportedValueKind(ValueKind::Sequence)));
    }

    #[test]
    fn test_absent_optional_is_rejected() {
        let (_heap, shared) = engine();
        let config = ProjectionConfig::default();
        let meta = ValueMetadata::optional(ValueMetadata::tensor(ElementType::Float32));

        let value = HostValue::none();
        let mut ledger = OwnershipLedger::new();
        let err = Projector::new(&shared, &config).project(&value, &meta, &mut ledger).unwrap_err();
        assert!(matches!(err, TesseraError::InvalidInput(_)));

        let required = ValueMetadata::tensor(ElementType::Float32);
        let err = Projector::new(&shared, &config).project(&value, &required, &mut ledger).unwrap_err();
        assert!(matches!(
            err,
            TesseraError::KindMismatch {
                expected: ValueKind::Tensor,
                actual: ValueKind::Optional
            }
        ));
    }
}
