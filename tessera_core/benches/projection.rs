//! Projection Benchmarks
//!
//! Measures the cost of moving host values across the native boundary:
//! - contiguous tensors (pinned in place) vs transposed tensors (copied)
//! - sequences of small tensors (per-element overhead)
//! - a full session run through the echo engine
//!
//! ## Running
//!
//! ```bash
//! cargo bench --bench projection
//! cargo bench --bench projection -- "contiguous"
//! ```

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ndarray::{Array2, ArrayD, IxDyn};
use tessera_core::native::{HeapEngine, SharedEngine};
use tessera_core::{
    HostTensor, HostValue, NamedValue, OwnershipLedger, ProjectionConfig, Projector, Session,
};
use tessera_types::{ElementType, GraphMetadata, NodeMetadata, ValueMetadata};

const SIDES: [usize; 3] = [16, 128, 512];

fn engine() -> SharedEngine {
    let graph = GraphMetadata::new(
        vec![NodeMetadata::new("x", ValueMetadata::tensor(ElementType::Float32))],
        vec![NodeMetadata::new("y", ValueMetadata::tensor(ElementType::Float32))],
    );
    Arc::new(HeapEngine::echo(graph))
}

fn square(side: usize) -> ArrayD<f32> {
    Array2::from_shape_fn((side, side), |(r, c)| (r * side + c) as f32).into_dyn()
}

fn bench_tensor_projection(c: &mut Criterion) {
    let engine = engine();
    let config = ProjectionConfig::default();
    let meta = ValueMetadata::tensor(ElementType::Float32);
    let mut group = c.benchmark_group("tensor_projection");

    for side in SIDES {
        let array = square(side);
        group.throughput(Throughput::Bytes((side * side * 4) as u64));

        let contiguous = HostValue::from(HostTensor::from_view(array.view()));
        group.bench_with_input(BenchmarkId::new("contiguous", side), &contiguous, |b, value| {
            let projector = Projector::new(&engine, &config);
            b.iter(|| {
                let mut ledger = OwnershipLedger::new();
                black_box(projector.project(value, &meta, &mut ledger).unwrap());
                ledger.dispose()
            })
        });

        let transposed = HostValue::from(HostTensor::from_view(array.view().reversed_axes()));
        group.bench_with_input(BenchmarkId::new("transposed", side), &transposed, |b, value| {
            let projector = Projector::new(&engine, &config);
            b.iter(|| {
                let mut ledger = OwnershipLedger::new();
                black_box(projector.project(value, &meta, &mut ledger).unwrap());
                ledger.dispose()
            })
        });
    }
    group.finish();
}

fn bench_sequence_projection(c: &mut Criterion) {
    let engine = engine();
    let config = ProjectionConfig::default();
    let meta = ValueMetadata::sequence(ValueMetadata::tensor(ElementType::Int64));
    let mut group = c.benchmark_group("sequence_projection");

    for len in [1usize, 16, 256] {
        let value = HostValue::Sequence(
            (0..len)
                .map(|i| HostValue::from(HostTensor::from_vec(vec![i as i64; 4])))
                .collect(),
        );
        group.throughput(Throughput::Elements(len as u64));
        group.bench_with_input(BenchmarkId::from_parameter(len), &value, |b, value| {
            let projector = Projector::new(&engine, &config);
            b.iter(|| {
                let mut ledger = OwnershipLedger::new();
                black_box(projector.project(value, &meta, &mut ledger).unwrap());
                ledger.dispose()
            })
        });
    }
    group.finish();
}

fn bench_session_run(c: &mut Criterion) {
    let session = Session::new(engine());
    let mut group = c.benchmark_group("session_run");

    for side in SIDES {
        let array = ArrayD::<f32>::ones(IxDyn(&[side, side]));
        let inputs = [NamedValue::new("x", HostTensor::from_view(array.view()))];
        group.throughput(Throughput::Bytes((side * side * 4) as u64));
        group.bench_function(BenchmarkId::from_parameter(side), |b| {
            b.iter(|| {
                let outputs = session.run(black_box(&inputs)).unwrap();
                outputs.dispose()
            })
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_tensor_projection,
    bench_sequence_projection,
    bench_session_run
);
criterion_main!(benches);
