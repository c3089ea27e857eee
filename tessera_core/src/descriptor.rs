//! Value descriptor
//!
//! Decides which kind a host value is projected as, given the metadata the
//! graph declares for it.

use crate::error::{TesseraError, TesseraResult};
use crate::host::HostValue;
use tessera_types::{ValueKind, ValueMetadata};

/// Kind `value` takes when matched against `expected`
///
/// Optional metadata is unwrapped one level and the wrapped metadata is
/// checked first; the result is then re-tagged as `Optional`. A present value
/// is accepted where an optional is expected, an absent one only there.
pub fn describe(value: &HostValue<'_>, expected: &ValueMetadata) -> TesseraResult<ValueKind> {
    match (value, expected) {
        (HostValue::Optional(None), ValueMetadata::Optional { .. }) => Ok(ValueKind::Optional),
        (HostValue::Optional(Some(inner)), ValueMetadata::Optional { element }) => {
            describe(inner, element)?;
            Ok(ValueKind::Optional)
        }
        (_, ValueMetadata::Optional { element }) => {
            describe(value, element)?;
            Ok(ValueKind::Optional)
        }
        (HostValue::Tensor(_), ValueMetadata::Tensor(_))
        | (HostValue::Sequence(_), ValueMetadata::Sequence { .. })
        | (HostValue::Map(_), ValueMetadata::Map(_)) => Ok(expected.kind()),
        _ => Err(TesseraError::KindMismatch {
            expected: expected.kind(),
            actual: value.kind(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HostMap, HostTensor};
    use tessera_types::ElementType;

    fn tensor() -> HostValue<'static> {
        HostValue::from(HostTensor::from_vec(vec![1.0f32, 2.0]))
    }

    #[test]
    fn test_matching_kinds() {
        let meta = ValueMetadata::tensor(ElementType::Float32);
        assert_eq!(describe(&tensor(), &meta).unwrap(), ValueKind::Tensor);

        let seq = HostValue::Sequence(vec![tensor()]);
        let meta = ValueMetadata::sequence(ValueMetadata::tensor(ElementType::Float32));
        assert_eq!(describe(&seq, &meta).unwrap(), ValueKind::Sequence);

        let map = HostValue::Map(HostMap::from_pairs(vec![(1i64, 2.0f32)]));
        let meta = ValueMetadata::map(ElementType::Int64, ValueMetadata::tensor(ElementType::Float32));
        assert_eq!(describe(&map, &meta).unwrap(), ValueKind::Map);
    }

    #[test]
    fn test_optional_unwraps_one_level() {
        let meta = ValueMetadata::optional(ValueMetadata::tensor(ElementType::Float32));
        assert_eq!(describe(&tensor(), &meta).unwrap(), ValueKind::Optional);
        assert_eq!(describe(&HostValue::some(tensor()), &meta).unwrap(), ValueKind::Optional);
        assert_eq!(describe(&HostValue::none(), &meta).unwrap(), ValueKind::Optional);
    }

    #[test]
    fn test_optional_payload_is_checked() {
        let meta = ValueMetadata::optional(ValueMetadata::sequence(ValueMetadata::tensor(ElementType::Float32)));
        let err = describe(&HostValue::some(tensor()), &meta).unwrap_err();
        assert!(matches!(
            err,
            TesseraError::KindMismatch {
                expected: ValueKind::Sequence,
                actual: ValueKind::Tensor
            }
        ));
    }

    #[test]
    fn test_optional_value_for_required_input() {
        let meta = ValueMetadata::tensor(ElementType::Float32);
        let err = describe(&HostValue::some(tensor()), &meta).unwrap_err();
        assert!(matches!(
            err,
            TesseraError::KindMismatch {
                expected: ValueKind::Tensor,
                actual: ValueKind::Optional
            }
        ));
    }
}
