//! Host-side value representation
//!
//! Values the caller hands to the projection layer, and the values
//! un-projection hands back. Tensors wrap `ndarray` arrays; sequences, maps
//! and optionals nest them.

mod element;
mod tensor;
mod value;

pub use element::{Element, FixedElement};
pub use tensor::{HostTensor, NativeArray, TensorOwner, TensorStorage};
pub use value::{HostMap, HostValue, NamedValue};

pub(crate) use tensor::with_storage;
pub(crate) use value::check_layout;
