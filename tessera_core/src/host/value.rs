//! Host values: tensors, sequences, maps and optionals

use std::collections::BTreeMap;

use super::element::Element;
use super::tensor::HostTensor;
use crate::error::{TesseraError, TesseraResult};
use tessera_types::ValueKind;

/// Map held as parallel one-dimensional key and value tensors
#[derive(Clone, Debug, PartialEq)]
pub struct HostMap<'a> {
    keys: HostTensor<'a>,
    values: HostTensor<'a>,
}

impl<'a> HostMap<'a> {
    /// Pair a key tensor with a value tensor of the same length
    pub fn new(keys: HostTensor<'a>, values: HostTensor<'a>) -> TesseraResult<Self> {
        check_layout(&keys, &values)?;
        Ok(Self { keys, values })
    }

    /// Owned map from key/value pairs, in iteration order
    pub fn from_pairs<K, V, I>(pairs: I) -> HostMap<'static>
    where
        K: Element,
        V: Element,
        I: IntoIterator<Item = (K, V)>,
    {
        let (keys, values): (Vec<K>, Vec<V>) = pairs.into_iter().unzip();
        HostMap {
            keys: HostTensor::from_vec(keys),
            values: HostTensor::from_vec(values),
        }
    }

    pub fn keys(&self) -> &HostTensor<'a> {
        &self.keys
    }

    pub fn values(&self) -> &HostTensor<'a> {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Key/value pairs as a sorted map, `None` if the element types differ
    pub fn to_btree_map<K: Element + Ord, V: Element>(&self) -> Option<BTreeMap<K, V>> {
        let keys = self.keys.to_vec::<K>()?;
        let values = self.values.to_vec::<V>()?;
        Some(keys.into_iter().zip(values).collect())
    }

    pub fn into_parts(self) -> (HostTensor<'a>, HostTensor<'a>) {
        (self.keys, self.values)
    }

    pub fn into_owned(self) -> HostMap<'static> {
        HostMap {
            keys: self.keys.into_owned(),
            values: self.values.into_owned(),
        }
    }
}

/// Keys and values must be 1-D and of equal length
pub(crate) fn check_layout(keys: &HostTensor<'_>, values: &HostTensor<'_>) -> TesseraResult<()> {
    if keys.ndim() != 1 {
        return Err(TesseraError::ShapeMismatch {
            expected: vec![-1],
            actual: keys.shape().to_vec(),
        });
    }
    if values.shape() != keys.shape() {
        return Err(TesseraError::ShapeMismatch {
            expected: vec![keys.len() as i64],
            actual: values.shape().to_vec(),
        });
    }
    Ok(())
}

/// Value on the host side of the boundary
#[derive(Clone, Debug, PartialEq)]
pub enum HostValue<'a> {
    Tensor(HostTensor<'a>),
    Sequence(Vec<HostValue<'a>>),
    Map(HostMap<'a>),
    Optional(Option<Box<HostValue<'a>>>),
}

impl<'a> HostValue<'a> {
    /// Runtime kind of the data held
    pub fn kind(&self) -> ValueKind {
        match self {
            HostValue::Tensor(_) => ValueKind::Tensor,
            HostValue::Sequence(_) => ValueKind::Sequence,
            HostValue::Map(_) => ValueKind::Map,
            HostValue::Optional(_) => ValueKind::Optional,
        }
    }

    /// Present optional
    pub fn some(value: HostValue<'a>) -> Self {
        HostValue::Optional(Some(Box::new(value)))
    }

    /// Absent optional
    pub fn none() -> Self {
        HostValue::Optional(None)
    }

    pub fn as_tensor(&self) -> Option<&HostTensor<'a>> {
        match self {
            HostValue::Tensor(tensor) => Some(tensor),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[HostValue<'a>]> {
        match self {
            HostValue::Sequence(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&HostMap<'a>> {
        match self {
            HostValue::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Payload of an optional; `Some(None)` when absent, `None` for other kinds
    pub fn as_optional(&self) -> Option<Option<&HostValue<'a>>> {
        match self {
            HostValue::Optional(inner) => Some(inner.as_deref()),
            _ => None,
        }
    }

    /// Whether this is an absent optional
    pub fn is_absent(&self) -> bool {
        matches!(self, HostValue::Optional(None))
    }

    /// Detach from borrowed host memory
    pub fn into_owned(self) -> HostValue<'static> {
        match self {
            HostValue::Tensor(tensor) => HostValue::Tensor(tensor.into_owned()),
            HostValue::Sequence(values) => {
                HostValue::Sequence(values.into_iter().map(HostValue::into_owned).collect())
            }
            HostValue::Map(map) => HostValue::Map(map.into_owned()),
            HostValue::Optional(inner) => {
                HostValue::Optional(inner.map(|value| Box::new(value.into_owned())))
            }
        }
    }
}

impl<'a> From<HostTensor<'a>> for HostValue<'a> {
    fn from(tensor: HostTensor<'a>) -> Self {
        HostValue::Tensor(tensor)
    }
}

impl<'a> From<HostMap<'a>> for HostValue<'a> {
    fn from(map: HostMap<'a>) -> Self {
        HostValue::Map(map)
    }
}

impl<'a> From<Vec<HostValue<'a>>> for HostValue<'a> {
    fn from(values: Vec<HostValue<'a>>) -> Self {
        HostValue::Sequence(values)
    }
}

/// Named host value with a recorded kind tag
///
/// The tag is what the caller claims the value is. [`NamedValue::validate`]
/// rejects a tag that disagrees with the data actually held.
#[derive(Clone, Debug, PartialEq)]
pub struct NamedValue<'a> {
    pub name: String,
    pub kind: ValueKind,
    pub value: HostValue<'a>,
}

impl<'a> NamedValue<'a> {
    /// Tag `value` with its own runtime kind
    pub fn new(name: impl Into<String>, value: impl Into<HostValue<'a>>) -> Self {
        let value = value.into();
        Self {
            name: name.into(),
            kind: value.kind(),
            value,
        }
    }

    /// Tag `value` with an explicit kind
    pub fn tagged(name: impl Into<String>, kind: ValueKind, value: impl Into<HostValue<'a>>) -> Self {
        Self {
            name: name.into(),
            kind,
            value: value.into(),
        }
    }

    /// Absent optional input
    pub fn absent(name: impl Into<String>) -> Self {
        Self::new(name, HostValue::none())
    }

    /// Recorded kind must match the data held
    pub fn validate(&self) -> TesseraResult<()> {
        let actual = self.value.kind();
        if self.kind != actual {
            return Err(TesseraError::KindMismatch {
                expected: self.kind,
                actual,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_types::ElementType;

    #[test]
    fn test_map_from_pairs() {
        let map = HostMap::from_pairs(vec![(3i64, 0.3f32), (1, 0.1), (2, 0.2)]);
        assert_eq!(map.len(), 3);
        assert_eq!(map.keys().element_type(), ElementType::Int64);
        let sorted = map.to_btree_map::<i64, f32>().unwrap();
        assert_eq!(sorted.into_iter().collect::<Vec<_>>(), vec![(1, 0.1), (2, 0.2), (3, 0.3)]);
        assert!(map.to_btree_map::<String, f32>().is_none());
    }

    #[test]
    fn test_map_rejects_unequal_lengths() {
        let err = HostMap::new(HostTensor::from_vec(vec![1i64, 2]), HostTensor::from_vec(vec![0.5f32])).unwrap_err();
        assert!(matches!(err, TesseraError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_map_rejects_matrix_keys() {
        let keys = HostTensor::from_array(ndarray::Array2::<i64>::zeros((2, 2)).into_dyn());
        let values = HostTensor::from_vec(vec![1.0f32; 4]);
        assert!(HostMap::new(keys, values).is_err());
    }

    #[test]
    fn test_kinds() {
        let tensor = HostValue::from(HostTensor::from_vec(vec![1.0f32]));
        assert_eq!(tensor.kind(), ValueKind::Tensor);
        assert_eq!(HostValue::Sequence(vec![tensor.clone()]).kind(), ValueKind::Sequence);
        assert_eq!(HostValue::some(tensor.clone()).kind(), ValueKind::Optional);
        assert!(HostValue::none().is_absent());
        assert_eq!(HostValue::some(tensor.clone()).as_optional(), Some(Some(&tensor)));
    }

    #[test]
    fn test_validate_detects_wrong_tag() {
        let named = NamedValue::tagged("x", ValueKind::Map, HostTensor::from_vec(vec![1u8]));
        match named.validate().unwrap_err() {
            TesseraError::KindMismatch { expected, actual } => {
                assert_eq!(expected, ValueKind::Map);
                assert_eq!(actual, ValueKind::Tensor);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(NamedValue::new("x", HostTensor::from_vec(vec![1u8])).validate().is_ok());
    }
}
