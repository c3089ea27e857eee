//! Native engine boundary
//!
//! The projection layer reaches the inference engine only through the
//! [`NativeEngine`] trait: create a value, run, inspect a value, release a
//! value. Handles are opaque; a bare [`ValueHandle`] is always *borrowed*, and
//! only an [`OwnedValue`] ever releases one.
//!
//! # Ownership rules
//!
//! - `create_*_value`, `run` and `element_at` return handles the caller owns.
//! - Releasing a sequence or map does not release the values it was built from.
//! - Every owned handle is released exactly once.

mod heap;
mod owned;

use std::fmt;
use std::sync::Arc;

use crate::error::TesseraResult;
use tessera_types::{ElementType, GraphMetadata, ValueKind};

pub use heap::{HeapData, HeapEngine, HeapStats, HeapTensor, HeapValue, Kernel, NativeCall};
pub use owned::OwnedValue;

/// Engine shared between sessions, ledgers and host views
pub type SharedEngine = Arc<dyn NativeEngine>;

/// Opaque handle to a value living on the native side
#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueHandle(u64);

impl ValueHandle {
    /// Wrap a raw handle produced by an engine
    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw handle value
    #[inline]
    pub const fn as_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ValueHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Status codes reported by the native engine
#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StatusCode {
    Ok = 0,
    Fail = 1,
    InvalidArgument = 2,
    NoSuchFile = 3,
    NoModel = 4,
    EngineError = 5,
    RuntimeException = 6,
    InvalidProtobuf = 7,
    ModelLoaded = 8,
    NotImplemented = 9,
    InvalidGraph = 10,
    ExecutionProviderFail = 11,
}

impl StatusCode {
    /// Map a raw status code, unknown codes become `Fail`
    pub const fn from_code(code: i32) -> Self {
        match code {
            0 => StatusCode::Ok,
            2 => StatusCode::InvalidArgument,
            3 => StatusCode::NoSuchFile,
            4 => StatusCode::NoModel,
            5 => StatusCode::EngineError,
            6 => StatusCode::RuntimeException,
            7 => StatusCode::InvalidProtobuf,
            8 => StatusCode::ModelLoaded,
            9 => StatusCode::NotImplemented,
            10 => StatusCode::InvalidGraph,
            11 => StatusCode::ExecutionProviderFail,
            _ => StatusCode::Fail,
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatusCode::Ok => "OK",
            StatusCode::Fail => "FAIL",
            StatusCode::InvalidArgument => "INVALID_ARGUMENT",
            StatusCode::NoSuchFile => "NO_SUCHFILE",
            StatusCode::NoModel => "NO_MODEL",
            StatusCode::EngineError => "ENGINE_ERROR",
            StatusCode::RuntimeException => "RUNTIME_EXCEPTION",
            StatusCode::InvalidProtobuf => "INVALID_PROTOBUF",
            StatusCode::ModelLoaded => "MODEL_LOADED",
            StatusCode::NotImplemented => "NOT_IMPLEMENTED",
            StatusCode::InvalidGraph => "INVALID_GRAPH",
            StatusCode::ExecutionProviderFail => "EP_FAIL",
        };
        write!(f, "{}", name)
    }
}

/// Host memory handed to the engine when a tensor value is created
#[derive(Clone, Copy, Debug)]
pub enum TensorBuffer<'p> {
    /// Fixed-size elements, row-major
    Bytes(&'p [u8]),
    /// String elements, row-major
    Strings(&'p [String]),
}

impl TensorBuffer<'_> {
    /// Length of the buffer in bytes (strings: total UTF-8 length)
    pub fn byte_len(&self) -> usize {
        match self {
            TensorBuffer::Bytes(bytes) => bytes.len(),
            TensorBuffer::Strings(strings) => strings.iter().map(String::len).sum(),
        }
    }
}

/// Location of a native tensor's element storage
///
/// Valid until the owning value is released.
#[derive(Clone, Copy, Debug)]
pub struct RawTensorData {
    pub ptr: *const u8,
    pub byte_len: usize,
}

/// Narrow call surface of the native inference engine
///
/// Implementations must be safe to call from several threads at once; each
/// caller keeps its own handles and ledgers.
pub trait NativeEngine: Send + Sync {
    /// Input/output metadata of the loaded graph
    fn graph(&self) -> &GraphMetadata;

    /// Wrap host memory as a tensor value without copying it.
    ///
    /// # Safety
    ///
    /// The memory behind `buffer` must stay valid and unmodified until the
    /// returned value, and every value built on top of it, is released.
    unsafe fn create_tensor_value(
        &self,
        buffer: TensorBuffer<'_>,
        element_type: ElementType,
        shape: &[i64],
    ) -> TesseraResult<ValueHandle>;

    /// Build a sequence over existing values. The elements stay owned by the caller.
    fn create_sequence_value(&self, elements: &[ValueHandle]) -> TesseraResult<ValueHandle>;

    /// Build a map from a key tensor and a value tensor. Both stay owned by the caller.
    fn create_map_value(&self, keys: ValueHandle, values: ValueHandle) -> TesseraResult<ValueHandle>;

    /// Run the graph. Returned handles are owned by the caller, one per output name.
    fn run(&self, inputs: &[(&str, ValueHandle)], output_names: &[&str])
        -> TesseraResult<Vec<ValueHandle>>;

    /// Runtime kind of a value
    fn value_kind(&self, value: ValueHandle) -> TesseraResult<ValueKind>;

    /// Element type of a tensor value
    fn element_type(&self, value: ValueHandle) -> TesseraResult<ElementType>;

    /// Dimensions of a tensor value
    fn tensor_shape(&self, value: ValueHandle) -> TesseraResult<Vec<i64>>;

    /// Element storage of a fixed-size tensor value
    fn tensor_data(&self, value: ValueHandle) -> TesseraResult<RawTensorData>;

    /// Copy of the elements of a string tensor value
    fn tensor_strings(&self, value: ValueHandle) -> TesseraResult<Vec<String>>;

    /// Number of elements of a sequence (or 2 for a map)
    fn value_count(&self, value: ValueHandle) -> TesseraResult<usize>;

    /// Fetch element `index` of a sequence or map; the caller owns the result
    fn element_at(&self, value: ValueHandle, index: usize) -> TesseraResult<ValueHandle>;

    /// Release an owned value. Never fails observably.
    fn release_value(&self, value: ValueHandle);
}
