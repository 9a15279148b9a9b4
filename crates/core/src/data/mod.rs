//! Element types and the N-dimensional [`Array`] value exchanged with variables.
//!
//! The set of element types is closed: every array is one variant of
//! [`ArrayValues`], and every supported Rust element type implements
//! [`Element`] so that typed access is resolved at compile time.

pub mod array;

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use chrono::NaiveDateTime;
use derive_more::{Display, From};

pub use self::array::Array;

/// Tag of a supported element type.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Display, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DataType {
    #[display("int16")]
    Int16,
    #[display("int32")]
    Int32,
    #[display("int64")]
    Int64,
    #[display("uint16")]
    UInt16,
    #[display("uint32")]
    UInt32,
    #[display("uint64")]
    UInt64,
    #[display("byte")]
    Byte,
    #[display("sbyte")]
    SByte,
    #[display("float")]
    Float,
    #[display("double")]
    Double,
    #[display("bool")]
    Bool,
    #[display("datetime")]
    DateTime,
    #[display("string")]
    String,
}

/// Flat row-major element storage, one variant per [`DataType`].
#[derive(Debug, Clone, PartialEq, From)]
pub enum ArrayValues {
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    UInt16(Vec<u16>),
    UInt32(Vec<u32>),
    UInt64(Vec<u64>),
    Byte(Vec<u8>),
    SByte(Vec<i8>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    Bool(Vec<bool>),
    DateTime(Vec<NaiveDateTime>),
    String(Vec<String>),
}

/// Applies `$body` to the vector inside any [`ArrayValues`] variant.
macro_rules! with_values {
    ($values:expr, $v:ident => $body:expr) => {
        match $values {
            ArrayValues::Int16($v) => $body,
            ArrayValues::Int32($v) => $body,
            ArrayValues::Int64($v) => $body,
            ArrayValues::UInt16($v) => $body,
            ArrayValues::UInt32($v) => $body,
            ArrayValues::UInt64($v) => $body,
            ArrayValues::Byte($v) => $body,
            ArrayValues::SByte($v) => $body,
            ArrayValues::Float($v) => $body,
            ArrayValues::Double($v) => $body,
            ArrayValues::Bool($v) => $body,
            ArrayValues::DateTime($v) => $body,
            ArrayValues::String($v) => $body,
        }
    };
}

/// Applies `$body` to two [`ArrayValues`] of the same variant, or evaluates
/// `$mismatch` when the variants differ.
macro_rules! with_value_pair {
    ($pair:expr, ($l:ident, $r:ident) => $body:expr, _ => $mismatch:expr) => {
        match $pair {
            (ArrayValues::Int16($l), ArrayValues::Int16($r)) => $body,
            (ArrayValues::Int32($l), ArrayValues::Int32($r)) => $body,
            (ArrayValues::Int64($l), ArrayValues::Int64($r)) => $body,
            (ArrayValues::UInt16($l), ArrayValues::UInt16($r)) => $body,
            (ArrayValues::UInt32($l), ArrayValues::UInt32($r)) => $body,
            (ArrayValues::UInt64($l), ArrayValues::UInt64($r)) => $body,
            (ArrayValues::Byte($l), ArrayValues::Byte($r)) => $body,
            (ArrayValues::SByte($l), ArrayValues::SByte($r)) => $body,
            (ArrayValues::Float($l), ArrayValues::Float($r)) => $body,
            (ArrayValues::Double($l), ArrayValues::Double($r)) => $body,
            (ArrayValues::Bool($l), ArrayValues::Bool($r)) => $body,
            (ArrayValues::DateTime($l), ArrayValues::DateTime($r)) => $body,
            (ArrayValues::String($l), ArrayValues::String($r)) => $body,
            _ => $mismatch,
        }
    };
}

pub(crate) use with_value_pair;

impl ArrayValues {
    /// Creates `len` default ("missing") values of the given type.
    #[must_use]
    pub fn filled(data_type: DataType, len: usize) -> Self {
        match data_type {
            DataType::Int16 => Self::Int16(vec![0; len]),
            DataType::Int32 => Self::Int32(vec![0; len]),
            DataType::Int64 => Self::Int64(vec![0; len]),
            DataType::UInt16 => Self::UInt16(vec![0; len]),
            DataType::UInt32 => Self::UInt32(vec![0; len]),
            DataType::UInt64 => Self::UInt64(vec![0; len]),
            DataType::Byte => Self::Byte(vec![0; len]),
            DataType::SByte => Self::SByte(vec![0; len]),
            DataType::Float => Self::Float(vec![0.0; len]),
            DataType::Double => Self::Double(vec![0.0; len]),
            DataType::Bool => Self::Bool(vec![false; len]),
            DataType::DateTime => Self::DateTime(vec![NaiveDateTime::default(); len]),
            DataType::String => Self::String(vec![String::new(); len]),
        }
    }

    #[must_use]
    pub const fn data_type(&self) -> DataType {
        match self {
            Self::Int16(_) => DataType::Int16,
            Self::Int32(_) => DataType::Int32,
            Self::Int64(_) => DataType::Int64,
            Self::UInt16(_) => DataType::UInt16,
            Self::UInt32(_) => DataType::UInt32,
            Self::UInt64(_) => DataType::UInt64,
            Self::Byte(_) => DataType::Byte,
            Self::SByte(_) => DataType::SByte,
            Self::Float(_) => DataType::Float,
            Self::Double(_) => DataType::Double,
            Self::Bool(_) => DataType::Bool,
            Self::DateTime(_) => DataType::DateTime,
            Self::String(_) => DataType::String,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        with_values!(self, v => v.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A Rust type that can be stored in an [`Array`].
pub trait Element: Clone + Default + Send + Sync + 'static {
    const DATA_TYPE: DataType;

    fn wrap(values: Vec<Self>) -> ArrayValues;

    fn view(values: &ArrayValues) -> Option<&[Self]>;
}

macro_rules! impl_element {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl Element for $ty {
                const DATA_TYPE: DataType = DataType::$variant;

                fn wrap(values: Vec<Self>) -> ArrayValues {
                    ArrayValues::$variant(values)
                }

                fn view(values: &ArrayValues) -> Option<&[Self]> {
                    match values {
                        ArrayValues::$variant(v) => Some(v.as_slice()),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_element! {
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
    u8 => Byte,
    i8 => SByte,
    f32 => Float,
    f64 => Double,
    bool => Bool,
    NaiveDateTime => DateTime,
    String => String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_tags_match_variants() {
        assert_eq!(<i16 as Element>::DATA_TYPE, DataType::Int16);
        assert_eq!(<u8 as Element>::DATA_TYPE, DataType::Byte);
        assert_eq!(<String as Element>::DATA_TYPE, DataType::String);
        assert_eq!(f64::wrap(vec![1.0]).data_type(), DataType::Double);
        assert!(i32::view(&ArrayValues::from(vec![1.0f32])).is_none());
    }

    #[test]
    fn filled_values_have_requested_type_and_length() {
        let values = ArrayValues::filled(DataType::DateTime, 3);
        assert_eq!(values.data_type(), DataType::DateTime);
        assert_eq!(values.len(), 3);
        assert_eq!(format!("{}", DataType::UInt64), "uint64");
    }
}
