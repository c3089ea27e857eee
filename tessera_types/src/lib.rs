//! # Tessera Types - leaf definitions shared by every tessera crate
//!
//! This crate provides the canonical definitions of:
//! - [`ElementType`] - Tensor element types with native type codes
//! - [`ValueKind`] - Semantic kind of a value (tensor, sequence, map, optional, ...)
//! - [`ValueMetadata`] / [`GraphMetadata`] - Expected shapes of graph inputs and outputs
//!
//! It has no dependency on the projection machinery, so metadata documents can
//! be produced and inspected without linking an engine.

pub mod dtype;
pub mod kind;
pub mod metadata;

pub use dtype::ElementType;
pub use kind::ValueKind;
pub use metadata::{GraphMetadata, MetadataError, MapMetadata, NodeMetadata, TensorMetadata, ValueMetadata};
