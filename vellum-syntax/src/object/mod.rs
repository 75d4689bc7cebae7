//! The PDF value model.
//!
//! Values are plain data: an indirect reference is just another variant,
//! and following it requires the owning [`Document`](crate::Document).

pub use crate::object::array::Array;
pub use crate::object::dict::Dict;
pub use crate::object::rect::Rect;
pub use crate::object::string::ByteString;

pub mod array;
pub mod dict;
pub mod rect;
pub mod string;

/// The maximum depth of reference chains followed during resolution.
pub const MAX_RESOLVE_DEPTH: u32 = 10;

/// An identifier for an indirect PDF object.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct ObjRef {
    /// The object number.
    pub num: u32,
    /// The generation number.
    pub r#gen: i32,
}

impl ObjRef {
    /// Create a new object reference.
    pub fn new(num: u32, r#gen: i32) -> Self {
        Self { num, r#gen }
    }

    /// A reference is valid if and only if its object number is positive.
    pub fn is_valid(&self) -> bool {
        self.num > 0
    }
}

/// The byte range of a stream's raw content in the file.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct StreamLocator {
    /// Byte offset of the first content byte.
    pub offset: usize,
    /// Length in bytes of the raw (still filtered) content.
    pub len: usize,
    /// Whether the raw bytes are encrypted.
    pub encrypted: bool,
    /// The indirect object the stream belongs to; decryption is keyed by
    /// it.
    pub owner: ObjRef,
}

/// A stream object: its dictionary plus the raw byte range.
#[derive(Debug, Clone, PartialEq)]
pub struct Stream {
    /// The stream dictionary.
    pub dict: Dict,
    /// Where the raw bytes live in the file.
    pub locator: StreamLocator,
}

/// A primitive PDF value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// The null object.
    #[default]
    Null,
    /// A boolean.
    Bool(bool),
    /// An integer number.
    Int(i64),
    /// A real number.
    Real(f32),
    /// A name, stored without the leading solidus.
    Name(ByteString),
    /// A string. Literal and hex strings are indistinguishable once read;
    /// the content bytes are kept as-is.
    String(ByteString),
    /// An array of values.
    Array(Array),
    /// A dictionary.
    Dict(Dict),
    /// An indirect reference.
    Ref(ObjRef),
    /// A stream. Only ever appears in materialized indirect objects.
    Stream(Stream),
}

impl Value {
    /// The boolean projection, or `false`.
    pub fn as_bool(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            _ => false,
        }
    }

    /// The integer projection, or `0`.
    pub fn as_int(&self) -> i64 {
        match self {
            Self::Int(i) => *i,
            Self::Real(r) => *r as i64,
            _ => 0,
        }
    }

    /// The number projection, or `0.0`.
    pub fn as_f32(&self) -> f32 {
        match self {
            Self::Int(i) => *i as f32,
            Self::Real(r) => *r,
            _ => 0.0,
        }
    }

    /// The name projection.
    pub fn as_name(&self) -> Option<&ByteString> {
        match self {
            Self::Name(n) => Some(n),
            _ => None,
        }
    }

    /// The string-content projection.
    pub fn as_string_bytes(&self) -> Option<&ByteString> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// The array projection.
    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    /// The dictionary projection. A stream projects to its dictionary.
    pub fn as_dict(&self) -> Option<&Dict> {
        match self {
            Self::Dict(d) => Some(d),
            Self::Stream(s) => Some(&s.dict),
            _ => None,
        }
    }

    /// The reference projection.
    pub fn as_ref(&self) -> Option<ObjRef> {
        match self {
            Self::Ref(r) => Some(*r),
            _ => None,
        }
    }

    /// The stream projection.
    pub fn as_stream(&self) -> Option<&Stream> {
        match self {
            Self::Stream(s) => Some(s),
            _ => None,
        }
    }

    /// Whether the value is the null object.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

/// A materialized indirect object.
#[derive(Debug, Clone, PartialEq)]
pub struct IndirectObject {
    /// The identity the object is stored under.
    pub id: ObjRef,
    /// The object's value. Streams keep their raw-range locator here.
    pub value: Value,
}

/// Conversion from a (resolved) value into a typed projection.
pub trait FromValue: Sized {
    /// Try to convert the value.
    fn from_value(value: Value) -> Option<Self>;
}

impl FromValue for Value {
    fn from_value(value: Value) -> Option<Self> {
        Some(value)
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(b),
            _ => None,
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Int(i) => Some(i),
            Value::Real(r) => Some(r as i64),
            _ => None,
        }
    }
}

impl FromValue for f32 {
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Int(i) => Some(i as f32),
            Value::Real(r) => Some(r),
            _ => None,
        }
    }
}

macro_rules! from_value_int {
    ($t:ty) => {
        impl FromValue for $t {
            fn from_value(value: Value) -> Option<Self> {
                i64::from_value(value).and_then(|i| i.try_into().ok())
            }
        }
    };
}

from_value_int!(i32);
from_value_int!(u8);
from_value_int!(u16);
from_value_int!(u32);
from_value_int!(usize);

impl FromValue for ByteString {
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

/// A typed wrapper used to extract name values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Name(pub ByteString);

impl std::ops::Deref for Name {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromValue for Name {
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Name(n) => Some(Self(n)),
            _ => None,
        }
    }
}

impl FromValue for Array {
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }
}

impl FromValue for Dict {
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Dict(d) => Some(d),
            Value::Stream(s) => Some(s.dict),
            _ => None,
        }
    }
}

impl FromValue for Stream {
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Stream(s) => Some(s),
            _ => None,
        }
    }
}

impl FromValue for ObjRef {
    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Ref(r) => Some(r),
            _ => None,
        }
    }
}

impl<const N: usize> FromValue for [f32; N] {
    fn from_value(value: Value) -> Option<Self> {
        let arr = Array::from_value(value)?;

        if arr.len() != N {
            return None;
        }

        let mut out = [0.0; N];

        for (slot, val) in out.iter_mut().zip(arr.iter()) {
            *slot = f32::from_value(val.clone())?;
        }

        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_validity() {
        assert!(ObjRef::new(1, 0).is_valid());
        assert!(!ObjRef::new(0, 0).is_valid());
        assert!(ObjRef::new(1, 0) < ObjRef::new(2, 0));
        assert!(ObjRef::new(2, 0) < ObjRef::new(2, 1));
    }

    #[test]
    fn accessors_are_total() {
        let v = Value::Name(ByteString::from(&b"Pages"[..]));
        assert_eq!(v.as_bool(), false);
        assert_eq!(v.as_int(), 0);
        assert_eq!(v.as_f32(), 0.0);
        assert!(v.as_array().is_none());
        assert!(v.as_dict().is_none());
        assert_eq!(v.as_name().map(|n| n.as_bytes()), Some(&b"Pages"[..]));
    }

    #[test]
    fn numeric_coercion() {
        assert_eq!(Value::Real(2.5).as_int(), 2);
        assert_eq!(Value::Int(3).as_f32(), 3.0);
        assert_eq!(u8::from_value(Value::Int(300)), None);
    }

    #[test]
    fn fixed_size_array() {
        let arr = Array::from(vec![
            Value::Int(0),
            Value::Int(0),
            Value::Real(612.0),
            Value::Real(792.0),
        ]);
        assert_eq!(
            <[f32; 4]>::from_value(Value::Array(arr)),
            Some([0.0, 0.0, 612.0, 792.0])
        );
    }
}
