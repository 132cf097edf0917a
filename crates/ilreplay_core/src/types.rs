//! Primitive data types as numbered by the recorder.

use crate::error::LexError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Primitive IL data type
///
/// The discriminants are the numeric tags written after a `PrimitiveType`
/// statement (`B2 S8 T7 3` binds `T7` to `Int32`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DataType {
    /// No type (void)
    NoType = 0,
    /// 8-bit integer
    Int8 = 1,
    /// 16-bit integer
    Int16 = 2,
    /// 32-bit integer
    Int32 = 3,
    /// 64-bit integer
    Int64 = 4,
    /// 32-bit float
    Float = 5,
    /// 64-bit float
    Double = 6,
    /// Machine address
    Address = 7,
    /// Vector of 8-bit integers
    VectorInt8 = 8,
    /// Vector of 16-bit integers
    VectorInt16 = 9,
    /// Vector of 32-bit integers
    VectorInt32 = 10,
    /// Vector of 64-bit integers
    VectorInt64 = 11,
    /// Vector of 32-bit floats
    VectorFloat = 12,
    /// Vector of 64-bit floats
    VectorDouble = 13,
    /// Struct or union
    Aggregate = 14,
}

impl DataType {
    /// Decode a recorder type tag
    ///
    /// # Errors
    ///
    /// Returns error if the tag is not a known primitive type
    pub const fn from_tag(tag: i64) -> Result<Self, LexError> {
        let dt = match tag {
            0 => Self::NoType,
            1 => Self::Int8,
            2 => Self::Int16,
            3 => Self::Int32,
            4 => Self::Int64,
            5 => Self::Float,
            6 => Self::Double,
            7 => Self::Address,
            8 => Self::VectorInt8,
            9 => Self::VectorInt16,
            10 => Self::VectorInt32,
            11 => Self::VectorInt64,
            12 => Self::VectorFloat,
            13 => Self::VectorDouble,
            14 => Self::Aggregate,
            _ => return Err(LexError::UnknownTypeTag { tag }),
        };
        Ok(dt)
    }

    /// Numeric tag on the wire
    #[must_use]
    pub const fn tag(self) -> i64 {
        self as i64
    }

    /// Whether values of this type are integers
    #[must_use]
    pub const fn is_integer(self) -> bool {
        matches!(self, Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64)
    }

    /// Whether values of this type are floating point
    #[must_use]
    pub const fn is_floating_point(self) -> bool {
        matches!(self, Self::Float | Self::Double)
    }

    /// Whether this is one of the vector types
    #[must_use]
    pub const fn is_vector(self) -> bool {
        matches!(
            self,
            Self::VectorInt8
                | Self::VectorInt16
                | Self::VectorInt32
                | Self::VectorInt64
                | Self::VectorFloat
                | Self::VectorDouble
        )
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NoType => "NoType",
            Self::Int8 => "Int8",
            Self::Int16 => "Int16",
            Self::Int32 => "Int32",
            Self::Int64 => "Int64",
            Self::Float => "Float",
            Self::Double => "Double",
            Self::Address => "Address",
            Self::VectorInt8 => "VectorInt8",
            Self::VectorInt16 => "VectorInt16",
            Self::VectorInt32 => "VectorInt32",
            Self::VectorInt64 => "VectorInt64",
            Self::VectorFloat => "VectorFloat",
            Self::VectorDouble => "VectorDouble",
            Self::Aggregate => "Aggregate",
        };
        f.write_str(name)
    }
}
