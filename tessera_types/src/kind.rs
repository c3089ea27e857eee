//! Value kinds
//!
//! The native engine classifies every value it hands out. Only tensors,
//! sequences, maps and optionals have a host-side counterpart; the remaining
//! kinds exist so a native answer can always be represented and rejected.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Semantic kind of a value, with native type codes as discriminants
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    /// Kind could not be determined
    Unknown = 0,
    /// Dense tensor
    Tensor = 1,
    /// Ordered sequence of values of one kind
    Sequence = 2,
    /// Map from primitive keys to primitive values
    Map = 3,
    /// Engine-private opaque value
    Opaque = 4,
    /// Sparse tensor
    SparseTensor = 5,
    /// Value that may be absent
    Optional = 6,
}

impl ValueKind {
    /// Native type code
    #[inline]
    pub const fn code(&self) -> i32 {
        *self as u8 as i32
    }

    /// Look up a kind by native code
    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(ValueKind::Unknown),
            1 => Some(ValueKind::Tensor),
            2 => Some(ValueKind::Sequence),
            3 => Some(ValueKind::Map),
            4 => Some(ValueKind::Opaque),
            5 => Some(ValueKind::SparseTensor),
            6 => Some(ValueKind::Optional),
            _ => None,
        }
    }

    /// Whether a host value of this kind exists
    #[inline]
    pub const fn has_host_form(&self) -> bool {
        matches!(
            self,
            ValueKind::Tensor | ValueKind::Sequence | ValueKind::Map | ValueKind::Optional
        )
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Unknown => "unknown",
            ValueKind::Tensor => "tensor",
            ValueKind::Sequence => "sequence",
            ValueKind::Map => "map",
            ValueKind::Opaque => "opaque",
            ValueKind::SparseTensor => "sparse_tensor",
            ValueKind::Optional => "optional",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        for code in 0..7 {
            let kind = ValueKind::from_code(code).unwrap();
            assert_eq!(kind.code(), code);
        }
        assert_eq!(ValueKind::from_code(7), None);
    }

    #[test]
    fn test_host_forms() {
        assert!(ValueKind::Tensor.has_host_form());
        assert!(ValueKind::Optional.has_host_form());
        assert!(!ValueKind::Opaque.has_host_form());
        assert!(!ValueKind::SparseTensor.has_host_form());
    }
}
