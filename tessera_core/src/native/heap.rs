//! In-process native engine
//!
//! [`HeapEngine`] implements the native call surface on top of a handle table
//! so the projection layer can be exercised without linking a real runtime.
//! It keeps the contract a real engine has:
//!
//! - tensors created from host memory reference that memory, they do not copy it
//! - sequences and maps reference their parts; releasing them never cascades
//! - `element_at` hands out a new handle the caller owns
//! - every handle is released once; a second release is counted, not honoured
//!
//! The graph itself is a [`Kernel`]: a closure from materialized inputs to
//! materialized outputs.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{NativeEngine, RawTensorData, StatusCode, TensorBuffer, ValueHandle};
use crate::error::{TesseraError, TesseraResult};
use tessera_types::{ElementType, GraphMetadata, ValueKind};

/// Graph body: named inputs and requested output names in, outputs out
pub type Kernel =
    Box<dyn Fn(&[(String, HeapValue)], &[&str]) -> TesseraResult<Vec<HeapValue>> + Send + Sync>;

/// Calls that can be made to fail on demand
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NativeCall {
    CreateTensor,
    CreateSequence,
    CreateMap,
    Run,
    ElementAt,
}

impl NativeCall {
    /// Name of the native entry point
    pub const fn name(&self) -> &'static str {
        match self {
            NativeCall::CreateTensor => "CreateTensorValue",
            NativeCall::CreateSequence => "CreateSequenceValue",
            NativeCall::CreateMap => "CreateMapValue",
            NativeCall::Run => "Run",
            NativeCall::ElementAt => "GetElementAt",
        }
    }
}

/// Handle accounting
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HeapStats {
    /// Handles currently alive
    pub live: usize,
    /// Handles ever handed out
    pub created: u64,
    /// Handles released
    pub released: u64,
    /// Releases of handles that were not alive
    pub double_releases: u64,
}

/// Element storage of a materialized tensor
#[derive(Clone, Debug, PartialEq)]
pub enum HeapData {
    Bytes(Vec<u8>),
    Strings(Vec<String>),
}

/// Materialized tensor, as seen by a kernel
#[derive(Clone, Debug, PartialEq)]
pub struct HeapTensor {
    pub element_type: ElementType,
    pub shape: Vec<i64>,
    pub data: HeapData,
}

impl HeapTensor {
    /// Tensor over fixed-size elements
    pub fn from_slice<T: bytemuck::NoUninit>(
        element_type: ElementType,
        shape: impl Into<Vec<i64>>,
        data: &[T],
    ) -> Self {
        Self {
            element_type,
            shape: shape.into(),
            data: HeapData::Bytes(bytemuck::cast_slice(data).to_vec()),
        }
    }

    /// Tensor over strings
    pub fn strings(shape: impl Into<Vec<i64>>, data: Vec<String>) -> Self {
        Self {
            element_type: ElementType::String,
            shape: shape.into(),
            data: HeapData::Strings(data),
        }
    }
}

/// Materialized value, as seen by a kernel
#[derive(Clone, Debug, PartialEq)]
pub enum HeapValue {
    Tensor(HeapTensor),
    Sequence(Vec<HeapValue>),
    Map { keys: HeapTensor, values: HeapTensor },
    Opaque,
}

/// Byte buffer with 8-byte alignment, so any fixed-size element type can be viewed in place
struct AlignedBytes {
    words: Vec<u64>,
    len: usize,
}

impl AlignedBytes {
    fn from_slice(bytes: &[u8]) -> Self {
        let mut words = vec![0u64; bytes.len().div_ceil(8)];
        bytemuck::cast_slice_mut::<u64, u8>(&mut words)[..bytes.len()].copy_from_slice(bytes);
        Self {
            words,
            len: bytes.len(),
        }
    }

    fn as_bytes(&self) -> &[u8] {
        &bytemuck::cast_slice::<u64, u8>(&self.words)[..self.len]
    }
}

enum Storage {
    /// Host memory pinned by the caller
    External { ptr: *const u8, len: usize },
    Owned(AlignedBytes),
    Strings(Vec<String>),
}

enum Node {
    Tensor {
        element_type: ElementType,
        shape: Vec<i64>,
        storage: Storage,
    },
    Sequence(Vec<Arc<Node>>),
    Map {
        keys: Arc<Node>,
        values: Arc<Node>,
    },
    Opaque,
}

// External storage points at host memory the caller keeps pinned and
// unmodified for the value's lifetime.
unsafe impl Send for Node {}
unsafe impl Sync for Node {}

impl Node {
    fn kind(&self) -> ValueKind {
        match self {
            Node::Tensor { .. } => ValueKind::Tensor,
            Node::Sequence(_) => ValueKind::Sequence,
            Node::Map { .. } => ValueKind::Map,
            Node::Opaque => ValueKind::Opaque,
        }
    }

    fn element_type(&self) -> Option<ElementType> {
        match self {
            Node::Tensor { element_type, .. } => Some(*element_type),
            _ => None,
        }
    }

    fn shape(&self) -> Option<&[i64]> {
        match self {
            Node::Tensor { shape, .. } => Some(shape),
            _ => None,
        }
    }

    fn materialize(&self) -> HeapValue {
        match self {
            Node::Tensor {
                element_type,
                shape,
                storage,
            } => HeapValue::Tensor(HeapTensor {
                element_type: *element_type,
                shape: shape.clone(),
                data: match storage {
                    // SAFETY: the creator of this value keeps the memory pinned while it is alive.
                    Storage::External { ptr, len } => {
                        HeapData::Bytes(unsafe { std::slice::from_raw_parts(*ptr, *len) }.to_vec())
                    }
                    Storage::Owned(bytes) => HeapData::Bytes(bytes.as_bytes().to_vec()),
                    Storage::Strings(strings) => HeapData::Strings(strings.clone()),
                },
            }),
            Node::Sequence(elements) => {
                HeapValue::Sequence(elements.iter().map(|e| e.materialize()).collect())
            }
            Node::Map { keys, values } => match (keys.materialize(), values.materialize()) {
                (HeapValue::Tensor(keys), HeapValue::Tensor(values)) => {
                    HeapValue::Map { keys, values }
                }
                _ => HeapValue::Opaque,
            },
            Node::Opaque => HeapValue::Opaque,
        }
    }

    fn from_heap(value: HeapValue) -> Node {
        match value {
            HeapValue::Tensor(tensor) => Node::from_tensor(tensor),
            HeapValue::Sequence(elements) => Node::Sequence(
                elements
                    .into_iter()
                    .map(|e| Arc::new(Node::from_heap(e)))
                    .collect(),
            ),
            HeapValue::Map { keys, values } => Node::Map {
                keys: Arc::new(Node::from_tensor(keys)),
                values: Arc::new(Node::from_tensor(values)),
            },
            HeapValue::Opaque => Node::Opaque,
        }
    }

    fn from_tensor(tensor: HeapTensor) -> Node {
        Node::Tensor {
            element_type: tensor.element_type,
            shape: tensor.shape,
            storage: match tensor.data {
                HeapData::Bytes(bytes) => Storage::Owned(AlignedBytes::from_slice(&bytes)),
                HeapData::Strings(strings) => Storage::Strings(strings),
            },
        }
    }
}

#[derive(Default)]
struct HeapState {
    slots: HashMap<u64, Arc<Node>>,
    next_id: u64,
    stats: HeapStats,
    failures: Vec<NativeCall>,
}

impl HeapState {
    fn insert(&mut self, node: Arc<Node>) -> ValueHandle {
        self.next_id += 1;
        let id = self.next_id;
        self.slots.insert(id, node);
        self.stats.created += 1;
        self.stats.live = self.slots.len();
        ValueHandle::from_raw(id)
    }

    fn get(&self, call: &'static str, value: ValueHandle) -> TesseraResult<Arc<Node>> {
        self.slots.get(&value.as_raw()).cloned().ok_or_else(|| {
            TesseraError::native(call, StatusCode::InvalidArgument, format!("invalid value handle {}", value))
        })
    }

    fn check_failure(&mut self, call: NativeCall) -> TesseraResult<()> {
        if let Some(pos) = self.failures.iter().position(|c| *c == call) {
            self.failures.remove(pos);
            return Err(TesseraError::native(call.name(), StatusCode::Fail, "injected failure"));
        }
        Ok(())
    }
}

/// In-process engine backed by a handle table
pub struct HeapEngine {
    graph: GraphMetadata,
    kernel: Kernel,
    state: Mutex<HeapState>,
}

impl HeapEngine {
    /// Engine running `kernel` over a graph declaring `graph`
    pub fn new(graph: GraphMetadata, kernel: Kernel) -> Self {
        Self {
            graph,
            kernel,
            state: Mutex::new(HeapState::default()),
        }
    }

    /// Engine whose k-th declared output echoes the k-th declared input
    pub fn echo(graph: GraphMetadata) -> Self {
        let input_names: Vec<String> = graph.inputs.iter().map(|n| n.name.clone()).collect();
        let output_names: Vec<String> = graph.outputs.iter().map(|n| n.name.clone()).collect();
        let kernel: Kernel = Box::new(
            move |inputs: &[(String, HeapValue)], requested: &[&str]| -> TesseraResult<Vec<HeapValue>> {
                requested
                    .iter()
                    .map(|name| {
                        let source = output_names
                            .iter()
                            .position(|n| n == name)
                            .and_then(|position| input_names.get(position))
                            .ok_or_else(|| {
                                TesseraError::native(
                                    "Run",
                                    StatusCode::InvalidGraph,
                                    format!("output '{}' has no matching input", name),
                                )
                            })?;
                        inputs
                            .iter()
                            .find(|(n, _)| n == source)
                            .map(|(_, value)| value.clone())
                            .ok_or_else(|| {
                                TesseraError::native(
                                    "Run",
                                    StatusCode::InvalidArgument,
                                    format!("input '{}' was not provided", source),
                                )
                            })
                    })
                    .collect()
            },
        );
        Self::new(graph, kernel)
    }

    /// Hand out an owned handle to an arbitrary value, as a run would
    pub fn create_value(&self, value: HeapValue) -> ValueHandle {
        self.state.lock().insert(Arc::new(Node::from_heap(value)))
    }

    /// Copy of a live value's contents
    pub fn inspect(&self, value: ValueHandle) -> Option<HeapValue> {
        let state = self.state.lock();
        state.slots.get(&value.as_raw()).map(|node| node.materialize())
    }

    /// Make the next call of the given kind fail
    pub fn fail_next(&self, call: NativeCall) {
        self.state.lock().failures.push(call);
    }

    /// Current handle accounting
    pub fn stats(&self) -> HeapStats {
        self.state.lock().stats.clone()
    }

    /// Number of handles currently alive
    pub fn live_values(&self) -> usize {
        self.state.lock().slots.len()
    }

    fn tensor_node(&self, call: &'static str, value: ValueHandle) -> TesseraResult<Arc<Node>> {
        let node = self.state.lock().get(call, value)?;
        if node.kind() != ValueKind::Tensor {
            return Err(TesseraError::native(
                call,
                StatusCode::InvalidArgument,
                format!("value {} is a {}, not a tensor", value, node.kind()),
            ));
        }
        Ok(node)
    }
}

fn element_count(call: &'static str, shape: &[i64]) -> TesseraResult<usize> {
    shape.iter().try_fold(1usize, |acc, &dim| {
        if dim < 0 {
            Err(TesseraError::native(call, StatusCode::InvalidArgument, format!("negative dimension {} in shape {:?}", dim, shape)))
        } else {
            usize::try_from(dim).ok().and_then(|dim| acc.checked_mul(dim)).ok_or_else(|| {
                TesseraError::native(call, StatusCode::InvalidArgument, format!("shape {:?} has too many elements", shape))
            })
        }
    })
}

impl NativeEngine for HeapEngine {
    fn graph(&self) -> &GraphMetadata {
        &self.graph
    }

    unsafe fn create_tensor_value(
        &self,
        buffer: TensorBuffer<'_>,
        element_type: ElementType,
        shape: &[i64],
    ) -> TesseraResult<ValueHandle> {
        const CALL: &str = "CreateTensorValue";
        self.state.lock().check_failure(NativeCall::CreateTensor)?;

        let count = element_count(CALL, shape)?;
        let storage = match (buffer, element_type.size_bytes()) {
            (TensorBuffer::Strings(strings), None) if strings.len() == count => {
                Storage::Strings(strings.to_vec())
            }
            (TensorBuffer::Bytes(bytes), Some(size)) if count.checked_mul(size) == Some(bytes.len()) => {
                Storage::External {
                    ptr: bytes.as_ptr(),
                    len: bytes.len(),
                }
            }
            _ => {
                return Err(TesseraError::native(
                    CALL,
                    StatusCode::InvalidArgument,
                    format!(
                        "buffer of {} bytes does not hold {} {} elements",
                        buffer.byte_len(),
                        count,
                        element_type
                    ),
                ))
            }
        };

        let node = Node::Tensor {
            element_type,
            shape: shape.to_vec(),
            storage,
        };
        Ok(self.state.lock().insert(Arc::new(node)))
    }

    fn create_sequence_value(&self, elements: &[ValueHandle]) -> TesseraResult<ValueHandle> {
        const CALL: &str = "CreateSequenceValue";
        let mut state = self.state.lock();
        state.check_failure(NativeCall::CreateSequence)?;

        let nodes = elements
            .iter()
            .map(|&handle| state.get(CALL, handle))
            .collect::<TesseraResult<Vec<_>>>()?;
        if let Some(first) = nodes.first() {
            let uniform = nodes
                .iter()
                .all(|n| n.kind() == first.kind() && n.element_type() == first.element_type());
            if !uniform {
                return Err(TesseraError::native(
                    CALL,
                    StatusCode::InvalidArgument,
                    "sequence elements must share one type",
                ));
            }
        }
        Ok(state.insert(Arc::new(Node::Sequence(nodes))))
    }

    fn create_map_value(&self, keys: ValueHandle, values: ValueHandle) -> TesseraResult<ValueHandle> {
        const CALL: &str = "CreateMapValue";
        let mut state = self.state.lock();
        state.check_failure(NativeCall::CreateMap)?;

        let key_node = state.get(CALL, keys)?;
        let value_node = state.get(CALL, values)?;
        match (key_node.shape(), value_node.shape()) {
            (Some([k]), Some([v])) if k == v => {}
            _ => {
                return Err(TesseraError::native(
                    CALL,
                    StatusCode::InvalidArgument,
                    "map keys and values must be 1-D tensors of equal length",
                ))
            }
        }
        if !key_node.element_type().is_some_and(|t| t.is_map_key()) {
            return Err(TesseraError::native(
                CALL,
                StatusCode::InvalidArgument,
                "map keys must be int64 or string",
            ));
        }
        Ok(state.insert(Arc::new(Node::Map {
            keys: key_node,
            values: value_node,
        })))
    }

    fn run(
        &self,
        inputs: &[(&str, ValueHandle)],
        output_names: &[&str],
    ) -> TesseraResult<Vec<ValueHandle>> {
        const CALL: &str = "Run";
        let materialized = {
            let mut state = self.state.lock();
            state.check_failure(NativeCall::Run)?;
            inputs
                .iter()
                .map(|&(name, handle)| {
                    if self.graph.input(name).is_none() {
                        return Err(TesseraError::native(CALL, StatusCode::InvalidArgument, format!("unknown input '{}'", name)));
                    }
                    Ok((name.to_string(), state.get(CALL, handle)?.materialize()))
                })
                .collect::<TesseraResult<Vec<_>>>()?
        };

        // The kernel runs without the table lock so it may be arbitrarily slow.
        let outputs = (self.kernel)(&materialized, output_names)?;
        if outputs.len() != output_names.len() {
            return Err(TesseraError::native(
                CALL,
                StatusCode::EngineError,
                format!("kernel produced {} outputs for {} names", outputs.len(), output_names.len()),
            ));
        }

        let mut state = self.state.lock();
        Ok(outputs
            .into_iter()
            .map(|value| state.insert(Arc::new(Node::from_heap(value))))
            .collect())
    }

    fn value_kind(&self, value: ValueHandle) -> TesseraResult<ValueKind> {
        Ok(self.state.lock().get("GetValueType", value)?.kind())
    }

    fn element_type(&self, value: ValueHandle) -> TesseraResult<ElementType> {
        let node = self.tensor_node("GetTensorElementType", value)?;
        node.element_type()
            .ok_or_else(|| crate::tessera_internal!("tensor {} without element type", value))
    }

    fn tensor_shape(&self, value: ValueHandle) -> TesseraResult<Vec<i64>> {
        let node = self.tensor_node("GetTensorShape", value)?;
        Ok(node.shape().map(<[i64]>::to_vec).unwrap_or_default())
    }

    fn tensor_data(&self, value: ValueHandle) -> TesseraResult<RawTensorData> {
        const CALL: &str = "GetTensorMutableData";
        let node = self.tensor_node(CALL, value)?;
        match &*node {
            Node::Tensor {
                storage: Storage::External { ptr, len },
                ..
            } => Ok(RawTensorData {
                ptr: *ptr,
                byte_len: *len,
            }),
            Node::Tensor {
                storage: Storage::Owned(bytes),
                ..
            } => Ok(RawTensorData {
                ptr: bytes.words.as_ptr().cast::<u8>(),
                byte_len: bytes.len,
            }),
            _ => Err(TesseraError::native(CALL, StatusCode::InvalidArgument, "string tensors have no raw data")),
        }
    }

    fn tensor_strings(&self, value: ValueHandle) -> TesseraResult<Vec<String>> {
        const CALL: &str = "GetStringTensorContent";
        let node = self.tensor_node(CALL, value)?;
        match &*node {
            Node::Tensor {
                storage: Storage::Strings(strings),
                ..
            } => Ok(strings.clone()),
            _ => Err(TesseraError::native(CALL, StatusCode::InvalidArgument, "not a string tensor")),
        }
    }

    fn value_count(&self, value: ValueHandle) -> TesseraResult<usize> {
        const CALL: &str = "GetValueCount";
        match &*self.state.lock().get(CALL, value)? {
            Node::Sequence(elements) => Ok(elements.len()),
            Node::Map { .. } => Ok(2),
            other => Err(TesseraError::native(
                CALL,
                StatusCode::InvalidArgument,
                format!("value {} is a {}", value, other.kind()),
            )),
        }
    }

    fn element_at(&self, value: ValueHandle, index: usize) -> TesseraResult<ValueHandle> {
        const CALL: &str = "GetElementAt";
        let mut state = self.state.lock();
        state.check_failure(NativeCall::ElementAt)?;
        let node = state.get(CALL, value)?;
        let element = match (&*node, index) {
            (Node::Sequence(elements), i) if i < elements.len() => elements[i].clone(),
            (Node::Map { keys, .. }, 0) => keys.clone(),
            (Node::Map { values, .. }, 1) => values.clone(),
            _ => {
                return Err(TesseraError::native(
                    CALL,
                    StatusCode::InvalidArgument,
                    format!("no element {} in value {}", index, value),
                ))
            }
        };
        Ok(state.insert(element))
    }

    fn release_value(&self, value: ValueHandle) {
        let mut state = self.state.lock();
        if state.slots.remove(&value.as_raw()).is_some() {
            state.stats.released += 1;
            state.stats.live = state.slots.len();
        } else {
            state.stats.double_releases += 1;
            log::error!("release of value {} that is not alive", value);
        }
    }
}

impl fmt::Debug for HeapEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeapEngine")
            .field("graph", &self.graph)
            .field("stats", &self.stats())
            .finish()
    }
}
