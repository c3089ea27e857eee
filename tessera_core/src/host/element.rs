//! Rust element types that can live in a host tensor

use half::{bf16, f16};

use super::tensor::{HostTensor, TensorStorage};
use crate::native::TensorBuffer;
use tessera_types::ElementType;

/// Scalar type with a host tensor variant
pub trait Element: Clone + Send + Sync + 'static {
    /// Element type announced to the engine
    const TYPE: ElementType;

    /// Wrap storage into the matching tensor variant
    fn into_tensor(storage: TensorStorage<'_, Self>) -> HostTensor<'_>;

    /// Storage of `tensor`, if it holds this element type
    fn storage<'t, 'a>(tensor: &'t HostTensor<'a>) -> Option<&'t TensorStorage<'a, Self>>;

    /// Row-major elements as handed to the engine
    fn as_buffer(data: &[Self]) -> TensorBuffer<'_>;
}

/// Element with a fixed size, no padding, and no invalid bit patterns
///
/// Only these are read straight from native memory. `bool` is fixed-size but
/// not every byte is a valid `bool`, so it is checked and copied instead.
pub trait FixedElement: Element + bytemuck::AnyBitPattern + bytemuck::NoUninit {}

macro_rules! scalar_element {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl Element for $ty {
                const TYPE: ElementType = ElementType::$variant;

                #[inline]
                fn into_tensor(storage: TensorStorage<'_, Self>) -> HostTensor<'_> {
                    HostTensor::$variant(storage)
                }

                #[inline]
                fn storage<'t, 'a>(tensor: &'t HostTensor<'a>) -> Option<&'t TensorStorage<'a, Self>> {
                    match tensor {
                        HostTensor::$variant(storage) => Some(storage),
                        _ => None,
                    }
                }

                #[inline]
                fn as_buffer(data: &[Self]) -> TensorBuffer<'_> {
                    TensorBuffer::Bytes(bytemuck::cast_slice(data))
                }
            }
        )*
    };
}

macro_rules! fixed_element {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        scalar_element! { $($ty => $variant),* }
        $(impl FixedElement for $ty {})*
    };
}

fixed_element! {
    f32 => Float32,
    f64 => Float64,
    f16 => Float16,
    bf16 => BFloat16,
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8 => Uint8,
    u16 => Uint16,
    u32 => Uint32,
    u64 => Uint64,
}

scalar_element! {
    bool => Bool,
}

impl Element for String {
    const TYPE: ElementType = ElementType::String;

    #[inline]
    fn into_tensor(storage: TensorStorage<'_, Self>) -> HostTensor<'_> {
        HostTensor::String(storage)
    }

    #[inline]
    fn storage<'t, 'a>(tensor: &'t HostTensor<'a>) -> Option<&'t TensorStorage<'a, Self>> {
        match tensor {
            HostTensor::String(storage) => Some(storage),
            _ => None,
        }
    }

    #[inline]
    fn as_buffer(data: &[Self]) -> TensorBuffer<'_> {
        TensorBuffer::Strings(data)
    }
}
