#![allow(clippy::should_implement_trait)]
//! Tensor element types with native type-code mapping
//!
//! Provides the closed set of element types a tensor may carry and the
//! conversion to/from the numeric codes used by the native engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Element type of a tensor
///
/// Discriminants follow the native engine's element type enumeration so a
/// code read across the boundary maps onto a variant without a lookup table.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    /// 32-bit floating point
    #[default]
    Float32 = 1,
    /// Unsigned 8-bit integer
    Uint8 = 2,
    /// Signed 8-bit integer
    Int8 = 3,
    /// Unsigned 16-bit integer
    Uint16 = 4,
    /// Signed 16-bit integer
    Int16 = 5,
    /// Signed 32-bit integer
    Int32 = 6,
    /// Signed 64-bit integer
    Int64 = 7,
    /// Variable-length UTF-8 string
    String = 8,
    /// Boolean (one byte per element)
    Bool = 9,
    /// 16-bit floating point (half precision)
    Float16 = 10,
    /// 64-bit floating point
    Float64 = 11,
    /// Unsigned 32-bit integer
    Uint32 = 12,
    /// Unsigned 64-bit integer
    Uint64 = 13,
    /// Complex number of two float32 parts
    Complex64 = 14,
    /// Complex number of two float64 parts
    Complex128 = 15,
    /// Brain floating point (bfloat16)
    BFloat16 = 16,
}

impl ElementType {
    /// Every element type, in native code order
    pub const ALL: [ElementType; 16] = [
        ElementType::Float32,
        ElementType::Uint8,
        ElementType::Int8,
        ElementType::Uint16,
        ElementType::Int16,
        ElementType::Int32,
        ElementType::Int64,
        ElementType::String,
        ElementType::Bool,
        ElementType::Float16,
        ElementType::Float64,
        ElementType::Uint32,
        ElementType::Uint64,
        ElementType::Complex64,
        ElementType::Complex128,
        ElementType::BFloat16,
    ];

    /// Size in bytes of a single element, `None` for variable-length strings
    #[inline]
    pub const fn size_bytes(&self) -> Option<usize> {
        match self {
            ElementType::Uint8 | ElementType::Int8 | ElementType::Bool => Some(1),
            ElementType::Uint16
            | ElementType::Int16
            | ElementType::Float16
            | ElementType::BFloat16 => Some(2),
            ElementType::Float32 | ElementType::Int32 | ElementType::Uint32 => Some(4),
            ElementType::Int64
            | ElementType::Uint64
            | ElementType::Float64
            | ElementType::Complex64 => Some(8),
            ElementType::Complex128 => Some(16),
            ElementType::String => None,
        }
    }

    /// Native element type code
    #[inline]
    pub const fn code(&self) -> i32 {
        *self as u8 as i32
    }

    /// Look up an element type by native code
    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(ElementType::Float32),
            2 => Some(ElementType::Uint8),
            3 => Some(ElementType::Int8),
            4 => Some(ElementType::Uint16),
            5 => Some(ElementType::Int16),
            6 => Some(ElementType::Int32),
            7 => Some(ElementType::Int64),
            8 => Some(ElementType::String),
            9 => Some(ElementType::Bool),
            10 => Some(ElementType::Float16),
            11 => Some(ElementType::Float64),
            12 => Some(ElementType::Uint32),
            13 => Some(ElementType::Uint64),
            14 => Some(ElementType::Complex64),
            15 => Some(ElementType::Complex128),
            16 => Some(ElementType::BFloat16),
            _ => None,
        }
    }

    /// Parse from string (e.g., "float32", "f32", "int64", "i64")
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "float32" | "f32" | "float" => Some(ElementType::Float32),
            "float64" | "f64" | "double" => Some(ElementType::Float64),
            "float16" | "f16" | "half" => Some(ElementType::Float16),
            "bfloat16" | "bf16" => Some(ElementType::BFloat16),
            "int8" | "i8" => Some(ElementType::Int8),
            "int16" | "i16" => Some(ElementType::Int16),
            "int32" | "i32" => Some(ElementType::Int32),
            "int64" | "i64" | "long" => Some(ElementType::Int64),
            "uint8" | "u8" | "byte" => Some(ElementType::Uint8),
            "uint16" | "u16" => Some(ElementType::Uint16),
            "uint32" | "u32" => Some(ElementType::Uint32),
            "uint64" | "u64" => Some(ElementType::Uint64),
            "bool" | "boolean" => Some(ElementType::Bool),
            "string" | "str" => Some(ElementType::String),
            "complex64" => Some(ElementType::Complex64),
            "complex128" => Some(ElementType::Complex128),
            _ => None,
        }
    }

    /// Check if this is a floating point type
    #[inline]
    pub const fn is_float(&self) -> bool {
        matches!(
            self,
            ElementType::Float16 | ElementType::Float32 | ElementType::Float64 | ElementType::BFloat16
        )
    }

    /// Check if this is a signed or unsigned integer type
    #[inline]
    pub const fn is_integer(&self) -> bool {
        matches!(
            self,
            ElementType::Int8
                | ElementType::Int16
                | ElementType::Int32
                | ElementType::Int64
                | ElementType::Uint8
                | ElementType::Uint16
                | ElementType::Uint32
                | ElementType::Uint64
        )
    }

    /// Whether the native engine accepts this type as a map key
    #[inline]
    pub const fn is_map_key(&self) -> bool {
        matches!(self, ElementType::Int64 | ElementType::String)
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ElementType::Float32 => "float32",
            ElementType::Float64 => "float64",
            ElementType::Float16 => "float16",
            ElementType::BFloat16 => "bfloat16",
            ElementType::Int8 => "int8",
            ElementType::Int16 => "int16",
            ElementType::Int32 => "int32",
            ElementType::Int64 => "int64",
            ElementType::Uint8 => "uint8",
            ElementType::Uint16 => "uint16",
            ElementType::Uint32 => "uint32",
            ElementType::Uint64 => "uint64",
            ElementType::Bool => "bool",
            ElementType::String => "string",
            ElementType::Complex64 => "complex64",
            ElementType::Complex128 => "complex128",
        };
        write!(f, "{}", name)
    }
}
