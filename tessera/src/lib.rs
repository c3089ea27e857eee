//! # Tessera
//!
//! Moves host values into a native inference engine and back without losing
//! track of a single pinned buffer or native value.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tessera::prelude::*;
//!
//! let graph = GraphMetadata::new(
//!     vec![NodeMetadata::new("x", ValueMetadata::tensor(ElementType::Int64))],
//!     vec![NodeMetadata::new("y", ValueMetadata::tensor(ElementType::Int64))],
//! );
//! let session = Session::new(Arc::new(HeapEngine::echo(graph)));
//!
//! let outputs = session
//!     .run(&[NamedValue::new("x", HostTensor::from_vec(vec![1i64, 2, 3]))])
//!     .unwrap();
//! assert_eq!(outputs.len(), 1);
//! outputs.dispose();
//! ```
//!
//! ## Features
//!
//! - **Zero-copy inputs** for contiguous tensors, copies only when the layout requires it
//! - **Tensors, sequences, maps and optionals** in both directions
//! - **Ordered release** of every pin and native value, on success and on failure
//! - **Host views over native memory** that keep the native value alive

pub use tessera_core::{self, *};

// Leaf types under their own name as well
pub use tessera_types as types;

// Array and half-precision crates the host values are built on
pub use half;
pub use ndarray;

/// Everything needed to build inputs, run a session and read outputs
pub mod prelude {
    // Host values
    pub use tessera_core::host::{Element, FixedElement, HostMap, HostTensor, HostValue, NamedValue};

    // Metadata
    pub use tessera_types::{
        ElementType, GraphMetadata, MapMetadata, NodeMetadata, TensorMetadata, ValueKind,
        ValueMetadata,
    };

    // Running
    pub use tessera_core::{
        HeapEngine, NativeEngine, OwnedValue, OwnershipLedger, ProjectionConfig, RunOutputs,
        Session, SharedEngine,
    };

    // Errors
    pub use tessera_core::{TesseraError, TesseraResult};

    pub use half::{bf16, f16};
    pub use ndarray::{array, ArrayD, ArrayViewD, IxDyn};
}
