//! Graph input/output metadata
//!
//! Metadata is produced once by the engine's introspection of a loaded graph
//! and never mutated afterwards. Projection treats it as ground truth.
//!
//! # Example document
//!
//! ```yaml
//! inputs:
//!   - name: image
//!     value:
//!       kind: tensor
//!       element_type: float32
//!       dims: [-1, 3, 224, 224]
//!   - name: labels
//!     value:
//!       kind: map
//!       key_type: int64
//!       value:
//!         kind: tensor
//!         element_type: float32
//! outputs:
//!   - name: scores
//!     value:
//!       kind: sequence
//!       element:
//!         kind: tensor
//!         element_type: float32
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::dtype::ElementType;
use crate::kind::ValueKind;

/// Expected element type and dimensions of a tensor
///
/// A negative dimension is symbolic and matches any extent. Empty `dims`
/// means the rank is not declared.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorMetadata {
    pub element_type: ElementType,
    #[serde(default)]
    pub dims: Vec<i64>,
}

impl TensorMetadata {
    /// Tensor metadata with undeclared rank
    pub fn new(element_type: ElementType) -> Self {
        Self {
            element_type,
            dims: Vec::new(),
        }
    }

    /// Tensor metadata with declared dimensions
    pub fn with_dims(element_type: ElementType, dims: impl Into<Vec<i64>>) -> Self {
        Self {
            element_type,
            dims: dims.into(),
        }
    }

    /// Declared rank, if any
    pub fn rank(&self) -> Option<usize> {
        if self.dims.is_empty() {
            None
        } else {
            Some(self.dims.len())
        }
    }

    /// Check a concrete shape against the declared dimensions
    pub fn accepts_shape(&self, shape: &[usize]) -> bool {
        if self.dims.is_empty() {
            return true;
        }
        self.dims.len() == shape.len()
            && self
                .dims
                .iter()
                .zip(shape)
                .all(|(&declared, &actual)| declared < 0 || declared as usize == actual)
    }
}

/// Key type and value metadata of a map
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapMetadata {
    pub key_type: ElementType,
    pub value: Box<ValueMetadata>,
}

/// Static description of an expected value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValueMetadata {
    Tensor(TensorMetadata),
    Sequence { element: Box<ValueMetadata> },
    Map(MapMetadata),
    Optional { element: Box<ValueMetadata> },
}

impl ValueMetadata {
    /// Tensor metadata with undeclared rank
    pub fn tensor(element_type: ElementType) -> Self {
        ValueMetadata::Tensor(TensorMetadata::new(element_type))
    }

    /// Tensor metadata with declared dimensions
    pub fn tensor_with_dims(element_type: ElementType, dims: impl Into<Vec<i64>>) -> Self {
        ValueMetadata::Tensor(TensorMetadata::with_dims(element_type, dims))
    }

    /// Sequence whose members all match `element`
    pub fn sequence(element: ValueMetadata) -> Self {
        ValueMetadata::Sequence {
            element: Box::new(element),
        }
    }

    /// Map from `key_type` keys to `value` values
    pub fn map(key_type: ElementType, value: ValueMetadata) -> Self {
        ValueMetadata::Map(MapMetadata {
            key_type,
            value: Box::new(value),
        })
    }

    /// Optional wrapper around `element`
    pub fn optional(element: ValueMetadata) -> Self {
        ValueMetadata::Optional {
            element: Box::new(element),
        }
    }

    /// Kind described by this metadata
    pub fn kind(&self) -> ValueKind {
        match self {
            ValueMetadata::Tensor(_) => ValueKind::Tensor,
            ValueMetadata::Sequence { .. } => ValueKind::Sequence,
            ValueMetadata::Map(_) => ValueKind::Map,
            ValueMetadata::Optional { .. } => ValueKind::Optional,
        }
    }

    /// Tensor metadata, for tensors only
    pub fn as_tensor(&self) -> Option<&TensorMetadata> {
        match self {
            ValueMetadata::Tensor(tensor) => Some(tensor),
            _ => None,
        }
    }

    /// Element type, for tensors only
    pub fn element_type(&self) -> Option<ElementType> {
        self.as_tensor().map(|tensor| tensor.element_type)
    }

    /// Wrapped element metadata, for sequences and optionals
    pub fn element(&self) -> Option<&ValueMetadata> {
        match self {
            ValueMetadata::Sequence { element } | ValueMetadata::Optional { element } => {
                Some(element)
            }
            _ => None,
        }
    }

    /// Key type and value metadata, for maps only
    pub fn as_map(&self) -> Option<&MapMetadata> {
        match self {
            ValueMetadata::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Whether this metadata describes a value that may be absent
    pub fn is_optional(&self) -> bool {
        matches!(self, ValueMetadata::Optional { .. })
    }
}

/// Name and metadata of one graph input or output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeMetadata {
    pub name: String,
    pub value: ValueMetadata,
}

impl NodeMetadata {
    pub fn new(name: impl Into<String>, value: ValueMetadata) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Failure to read a metadata document
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Declared inputs and outputs of a loaded graph
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphMetadata {
    pub inputs: Vec<NodeMetadata>,
    pub outputs: Vec<NodeMetadata>,
}

impl GraphMetadata {
    pub fn new(inputs: Vec<NodeMetadata>, outputs: Vec<NodeMetadata>) -> Self {
        Self { inputs, outputs }
    }

    /// Look up a declared input by name
    pub fn input(&self, name: &str) -> Option<&NodeMetadata> {
        self.inputs.iter().find(|node| node.name == name)
    }

    /// Look up a declared output by name
    pub fn output(&self, name: &str) -> Option<&NodeMetadata> {
        self.outputs.iter().find(|node| node.name == name)
    }

    /// Names of all declared outputs, in declaration order
    pub fn output_names(&self) -> Vec<&str> {
        self.outputs.iter().map(|node| node.name.as_str()).collect()
    }

    /// Parse a YAML metadata document
    pub fn from_yaml(content: &str) -> Result<Self, MetadataError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Parse a JSON metadata document
    pub fn from_json(content: &str) -> Result<Self, MetadataError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Load a metadata document, JSON if the extension says so, YAML otherwise
    pub fn from_file(path: &Path) -> Result<Self, MetadataError> {
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json(&content),
            _ => Self::from_yaml(&content),
        }
    }
}
