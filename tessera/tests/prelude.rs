//! The prelude alone is enough to drive a session end to end

use std::sync::Arc;

use tessera::prelude::*;

fn classifier_graph() -> GraphMetadata {
    GraphMetadata::new(
        vec![NodeMetadata::new("features", ValueMetadata::tensor(ElementType::Float32))],
        vec![NodeMetadata::new("features_out", ValueMetadata::tensor(ElementType::Float32))],
    )
}

#[test]
fn test_prelude_session_roundtrip() {
    let _ = env_logger::builder().is_test(true).try_init();

    let engine = Arc::new(HeapEngine::echo(classifier_graph()));
    let session = Session::new(engine.clone());

    let features = array![[0.5f32, 1.5], [2.5, 3.5]].into_dyn();
    let outputs = session
        .run(&[NamedValue::new("features", HostTensor::from_view(features.view()))])
        .unwrap();

    let echoed = outputs.get("features_out").unwrap().as_tensor().unwrap();
    assert_eq!(echoed.shape(), &[2, 2]);
    assert_eq!(echoed.to_vec::<f32>(), Some(vec![0.5, 1.5, 2.5, 3.5]));

    outputs.dispose();
    assert_eq!(engine.live_values(), 0);
}

#[test]
fn test_prelude_reports_unknown_input() {
    let session = Session::new(Arc::new(HeapEngine::echo(classifier_graph())));
    let err = session
        .run(&[NamedValue::new("labels", HostTensor::from_vec(vec![1i64]))])
        .unwrap_err();
    assert!(matches!(err, TesseraError::NotFound(_)));
}

#[test]
fn test_half_types_are_reexported() {
    let tensor = HostTensor::from_vec(vec![f16::from_f32(1.0), f16::from_f32(-0.5)]);
    assert_eq!(tensor.element_type(), ElementType::Float16);

    let tensor = HostTensor::from_vec(vec![bf16::from_f32(2.0)]);
    assert_eq!(tensor.element_type(), ElementType::BFloat16);
}
