//! Ownership ledger behaviour across whole projections, including failure paths

mod common;

use common::{assert_no_leaks, echo_engine};
use tessera_core::native::NativeCall;
use tessera_core::{
    HostMap, HostTensor, HostValue, OwnershipLedger, ProjectionConfig, Projector, TesseraError,
};
use tessera_types::{ElementType, GraphMetadata, ValueMetadata};

fn float_seq_meta() -> ValueMetadata {
    ValueMetadata::sequence(ValueMetadata::tensor(ElementType::Float32))
}

#[test]
fn test_sequence_entries_are_flat() {
    let (heap, shared) = echo_engine(GraphMetadata::default());
    let config = ProjectionConfig::default();
    let value = HostValue::Sequence(vec![
        HostValue::from(HostTensor::from_vec(vec![1.0f32])),
        HostValue::from(HostTensor::from_vec(vec![2.0f32])),
        HostValue::from(HostTensor::from_vec(vec![3.0f32])),
    ]);

    let mut ledger = OwnershipLedger::new();
    Projector::new(&shared, &config)
        .project(&value, &float_seq_meta(), &mut ledger)
        .unwrap();

    // pin + value per element, then the sequence itself
    assert_eq!(ledger.len(), 7);
    assert_eq!(heap.live_values(), 4);
    assert_eq!(ledger.dispose(), 7);
    assert_no_leaks(&heap);
}

#[test]
fn test_failure_on_second_element_releases_first() {
    let (heap, shared) = echo_engine(GraphMetadata::default());
    let config = ProjectionConfig::default();
    let value = HostValue::Sequence(vec![
        HostValue::from(HostTensor::from_vec(vec![1.0f32, 2.0])),
        HostValue::from(HostTensor::from_vec(vec![3i32, 4])),
        HostValue::from(HostTensor::from_vec(vec![5.0f32])),
    ]);

    let mut ledger = OwnershipLedger::new();
    let err = Projector::new(&shared, &config)
        .project(&value, &float_seq_meta(), &mut ledger)
        .unwrap_err();
    assert!(matches!(
        err,
        TesseraError::ElementTypeMismatch {
            expected: ElementType::Float32,
            actual: ElementType::Int32
        }
    ));

    // only the first element's pin and value were committed
    assert_eq!(ledger.len(), 2);
    assert_eq!(heap.stats().created, 1);

    assert_eq!(ledger.dispose(), 2);
    assert_no_leaks(&heap);
}

#[test]
fn test_native_failure_midway_is_rolled_back() {
    let (heap, shared) = echo_engine(GraphMetadata::default());
    let config = ProjectionConfig::default();
    let value = HostValue::Sequence(vec![
        HostValue::from(HostTensor::from_vec(vec![1.0f32])),
        HostValue::from(HostTensor::from_vec(vec![2.0f32])),
    ]);

    heap.fail_next(NativeCall::CreateSequence);
    let mut ledger = OwnershipLedger::new();
    let err = Projector::new(&shared, &config)
        .project(&value, &float_seq_meta(), &mut ledger)
        .unwrap_err();
    assert!(err.is_native());
    assert_eq!(ledger.len(), 4);

    ledger.dispose();
    assert_no_leaks(&heap);
}

#[test]
fn test_failed_tensor_creation_registers_nothing() {
    let (heap, shared) = echo_engine(GraphMetadata::default());
    let config = ProjectionConfig::default();
    let value = HostValue::from(HostTensor::from_vec(vec![1u16, 2, 3]));

    heap.fail_next(NativeCall::CreateTensor);
    let mut ledger = OwnershipLedger::new();
    let err = Projector::new(&shared, &config)
        .project(&value, &ValueMetadata::tensor(ElementType::Uint16), &mut ledger)
        .unwrap_err();
    match err {
        TesseraError::NativeCallFailure { call, message, .. } => {
            assert_eq!(call, "CreateTensorValue");
            assert_eq!(message, "injected failure");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(ledger.is_empty());
    assert_no_leaks(&heap);
}

#[test]
fn test_map_failure_after_keys_releases_keys() {
    let (heap, shared) = echo_engine(GraphMetadata::default());
    let config = ProjectionConfig::default();
    let value = HostValue::Map(HostMap::from_pairs(vec![(1i64, 0.5f32), (2, 0.25)]));
    let meta = ValueMetadata::map(ElementType::Int64, ValueMetadata::tensor(ElementType::Float32));

    heap.fail_next(NativeCall::CreateMap);
    let mut ledger = OwnershipLedger::new();
    assert!(Projector::new(&shared, &config)
        .project(&value, &meta, &mut ledger)
        .is_err());
    assert_eq!(ledger.len(), 4);
    assert_eq!(heap.live_values(), 2);

    ledger.dispose();
    assert_no_leaks(&heap);
}

#[test]
fn test_dispose_twice_is_noop() {
    let (heap, shared) = echo_engine(GraphMetadata::default());
    let config = ProjectionConfig::default();
    let value = HostValue::from(HostTensor::from_vec(vec![1.0f64]));

    let mut ledger = OwnershipLedger::new();
    Projector::new(&shared, &config)
        .project(&value, &ValueMetadata::tensor(ElementType::Float64), &mut ledger)
        .unwrap();
    assert_eq!(ledger.dispose(), 2);
    assert_eq!(ledger.dispose(), 0);
    assert_eq!(ledger.released(), 2);

    let stats = heap.stats();
    assert_eq!(stats.released, 1);
    assert_eq!(stats.double_releases, 0);
}

#[test]
fn test_dropped_ledger_still_releases() {
    let (heap, shared) = echo_engine(GraphMetadata::default());
    let config = ProjectionConfig::default();
    let value = HostValue::from(HostTensor::from_vec(vec![1i8, 2, 3]));
    {
        let mut ledger = OwnershipLedger::new();
        Projector::new(&shared, &config)
            .project(&value, &ValueMetadata::tensor(ElementType::Int8), &mut ledger)
            .unwrap();
        assert_eq!(heap.live_values(), 1);
    }
    assert_no_leaks(&heap);
}

#[test]
fn test_independent_projections_on_threads() {
    let (heap, shared) = echo_engine(GraphMetadata::default());
    let config = ProjectionConfig::default();
    let meta = ValueMetadata::tensor(ElementType::Int64);

    std::thread::scope(|scope| {
        for worker in 0..4i64 {
            let (shared, config, meta) = (&shared, &config, &meta);
            scope.spawn(move || {
                for round in 0..25i64 {
                    let value = HostValue::from(HostTensor::from_vec(vec![worker, round]));
                    let mut ledger = OwnershipLedger::new();
                    let handle = Projector::new(shared, config)
                        .project(&value, meta, &mut ledger)
                        .unwrap();
                    assert_eq!(shared.tensor_shape(handle).unwrap(), vec![2]);
                    assert_eq!(ledger.dispose(), 2);
                }
            });
        }
    });

    assert_eq!(heap.stats().created, 100);
    assert_no_leaks(&heap);
}
