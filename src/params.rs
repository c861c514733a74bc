//! Scalar values stored in a spectrum's sample data.
use std::fmt::Display;

use indexmap::IndexMap;

/// A single sample data value.
///
/// Sample data is loosely typed in most spectroscopy formats, so the
/// value carries its own type tag.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum SampleValue {
    Boolean(bool),
    Integer(i64),
    Number(f64),
    Text(String),
}

impl SampleValue {
    /// Coerce the value to a float, if it is numeric or parses as one.
    pub fn to_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Number(x) => Some(*x),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Boolean(_) => None,
        }
    }

    pub fn to_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            Self::Number(x) if x.fract() == 0.0 => Some(*x as i64),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl Display for SampleValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Number(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

macro_rules! impl_from_value {
    ($variant:ident, $conv:ty, $($t:ty), +) => {$(
        impl From<$t> for SampleValue {
            fn from(value: $t) -> Self {
                Self::$variant(value as $conv)
            }
        }
    )+};
}

impl_from_value!(Integer, i64, i8, i16, i32, i64, u8, u16, u32);
impl_from_value!(Number, f64, f32, f64);

impl From<bool> for SampleValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<String> for SampleValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for SampleValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// The metadata attached to a spectrum, keyed by case-sensitive name.
pub type SampleData = IndexMap<String, SampleValue>;
