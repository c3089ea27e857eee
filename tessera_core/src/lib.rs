//! # Tessera Core
//!
//! Projection of host values into the value representation of a native
//! inference engine, and back, with every resource on both sides tracked and
//! released in a fixed order.
//!
//! - **Host values**: `ndarray`-backed tensors, sequences, maps and optionals
//! - **Projection**: host value + declared metadata -> native value, zero-copy where the layout allows
//! - **Ownership ledger**: ordered record of pins and native values, released last to first
//! - **Un-projection**: native value -> host value, viewing native memory in place
//! - **Session**: named inputs in, named outputs out, ledgers handled on every path
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ndarray::array;
//! use tessera_core::{HeapEngine, HostTensor, NamedValue, Session};
//! use tessera_types::{ElementType, GraphMetadata, NodeMetadata, ValueMetadata};
//!
//! let graph = GraphMetadata::new(
//!     vec![NodeMetadata::new("x", ValueMetadata::tensor(ElementType::Float32))],
//!     vec![NodeMetadata::new("y", ValueMetadata::tensor(ElementType::Float32))],
//! );
//! let session = Session::new(Arc::new(HeapEngine::echo(graph)));
//!
//! let x = array![1.0f32, 2.0, 3.0].into_dyn();
//! let outputs = session
//!     .run(&[NamedValue::new("x", HostTensor::from_view(x.view()))])
//!     .unwrap();
//! println!("{:?}", outputs.get("y"));
//! outputs.dispose();
//! ```

pub mod config;
pub mod descriptor;
pub mod error;
pub mod host;
pub mod ledger;
pub mod native;
pub mod pin;
pub mod project;
pub mod session;
pub mod unproject;

pub use config::ProjectionConfig;
pub use descriptor::describe;
pub use error::{TesseraError, TesseraResult};
pub use host::{Element, HostMap, HostTensor, HostValue, NamedValue, TensorStorage};
pub use ledger::{OwnershipLedger, Release, Resource};
pub use native::{
    HeapEngine, HeapStats, NativeCall, NativeEngine, OwnedValue, SharedEngine, StatusCode,
    ValueHandle,
};
pub use pin::PinnedBuffer;
pub use project::Projector;
pub use session::{RunOutputs, Session};
pub use unproject::Unprojector;

// Re-export the leaf types so downstream code needs a single dependency
pub use tessera_types::{
    ElementType, GraphMetadata, MapMetadata, NodeMetadata, TensorMetadata, ValueKind,
    ValueMetadata,
};
