//! Shared test utilities for tessera_core integration tests

#![allow(dead_code)]

use std::sync::Arc;

use tessera_core::native::{HeapEngine, SharedEngine};
use tessera_types::{GraphMetadata, NodeMetadata, ValueMetadata};

/// Install a test logger once per test process.
pub fn init_logging() {
    static ONCE: std::sync::Once = std::sync::Once::new();
    ONCE.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

/// Graph with one input and one output per entry, named `in_<n>` / `out_<n>`
pub fn echo_graph(values: &[ValueMetadata]) -> GraphMetadata {
    let inputs = values
        .iter()
        .enumerate()
        .map(|(i, meta)| NodeMetadata::new(format!("in_{}", i), meta.clone()))
        .collect();
    let outputs = values
        .iter()
        .enumerate()
        .map(|(i, meta)| NodeMetadata::new(format!("out_{}", i), meta.clone()))
        .collect();
    GraphMetadata::new(inputs, outputs)
}

/// Echo engine over `graph`, both as the concrete type (for stats) and as the shared trait object
pub fn echo_engine(graph: GraphMetadata) -> (Arc<HeapEngine>, SharedEngine) {
    init_logging();
    let heap = Arc::new(HeapEngine::echo(graph));
    let shared: SharedEngine = heap.clone();
    (heap, shared)
}

/// Assert every handle the engine ever handed out was released exactly once
pub fn assert_no_leaks(heap: &HeapEngine) {
    let stats = heap.stats();
    assert_eq!(stats.live, 0, "live native values remain: {:?}", stats);
    assert_eq!(stats.created, stats.released, "created/released differ: {:?}", stats);
    assert_eq!(stats.double_releases, 0, "double releases: {:?}", stats);
}
