//! Lenient conversions out of [`HostValue`].
//!
//! Used where a caller asks for "the value as `T`": numbers widen and narrow
//! freely, strings are parsed with invariant formatting, and anything that
//! cannot be coerced yields `None`.

use crate::host::HostValue;

/// Coerces a host value into a concrete Rust type.
pub trait FromHost: Sized {
    fn from_host(value: &HostValue) -> Option<Self>;
}

impl HostValue {
    /// The value as `T`, when it can be coerced.
    pub fn get<T: FromHost>(&self) -> Option<T> {
        T::from_host(self)
    }

    fn as_f64(&self) -> Option<f64> {
        Some(match self {
            Self::Bool(b) => f64::from(u8::from(*b)),
            Self::I8(v) => f64::from(*v),
            Self::U8(v) => f64::from(*v),
            Self::I16(v) => f64::from(*v),
            Self::U16(v) => f64::from(*v),
            Self::I32(v) | Self::Error(v) => f64::from(*v),
            Self::U32(v) => f64::from(*v),
            Self::I64(v) => *v as f64,
            Self::U64(v) => *v as f64,
            Self::F32(v) => f64::from(*v),
            Self::F64(v) => *v,
            Self::Decimal(d) => d.to_f64(),
            Self::Currency(cy) => *cy as f64 / 10_000.0,
            Self::String(s) => s.trim().parse().ok()?,
            _ => return None,
        })
    }

    fn as_i128(&self) -> Option<i128> {
        Some(match self {
            Self::Bool(b) => i128::from(*b),
            Self::I8(v) => i128::from(*v),
            Self::U8(v) => i128::from(*v),
            Self::I16(v) => i128::from(*v),
            Self::U16(v) => i128::from(*v),
            Self::I32(v) | Self::Error(v) => i128::from(*v),
            Self::U32(v) => i128::from(*v),
            Self::I64(v) => i128::from(*v),
            Self::U64(v) => i128::from(*v),
            Self::Pointer(p) => p.addr() as i128,
            Self::String(s) => match s.trim().parse::<i128>() {
                Ok(v) => v,
                Err(_) => integral(s.trim().parse().ok()?)?,
            },
            other => integral(other.as_f64()?)?,
        })
    }
}

/// Rounds half to even, the way automation coercions do.
fn integral(value: f64) -> Option<i128> {
    if !value.is_finite() {
        return None;
    }
    let rounded = value.round_ties_even();
    if rounded < i128::MIN as f64 || rounded > i128::MAX as f64 {
        return None;
    }
    Some(rounded as i128)
}

macro_rules! impl_from_host_int {
    ($($ty:ty),* $(,)?) => {
        $(
            impl FromHost for $ty {
                fn from_host(value: &HostValue) -> Option<Self> {
                    <$ty>::try_from(value.as_i128()?).ok()
                }
            }
        )*
    };
}

impl_from_host_int!(i8, u8, i16, u16, i32, u32, i64, u64, isize, usize);

impl FromHost for f64 {
    fn from_host(value: &HostValue) -> Option<Self> {
        value.as_f64()
    }
}

impl FromHost for f32 {
    fn from_host(value: &HostValue) -> Option<Self> {
        value.as_f64().map(|v| v as f32)
    }
}

impl FromHost for bool {
    fn from_host(value: &HostValue) -> Option<Self> {
        match value {
            HostValue::Bool(b) => Some(*b),
            HostValue::String(s) => match s.trim() {
                t if t.eq_ignore_ascii_case("true") => Some(true),
                t if t.eq_ignore_ascii_case("false") => Some(false),
                _ => None,
            },
            other => other.as_f64().map(|v| v != 0.0),
        }
    }
}

impl FromHost for String {
    fn from_host(value: &HostValue) -> Option<Self> {
        match value {
            HostValue::Empty | HostValue::Null => None,
            HostValue::String(s) => Some(s.clone()),
            HostValue::Bool(true) => Some("True".to_owned()),
            HostValue::Bool(false) => Some("False".to_owned()),
            other => Some(other.to_string()),
        }
    }
}

impl FromHost for char {
    fn from_host(value: &HostValue) -> Option<Self> {
        match value {
            HostValue::Char(c) => Some(*c),
            HostValue::String(s) => {
                let mut chars = s.chars();
                let c = chars.next()?;
                chars.next().is_none().then_some(c)
            }
            other => u32::from_host(other).and_then(char::from_u32),
        }
    }
}

impl FromHost for chrono::NaiveDateTime {
    fn from_host(value: &HostValue) -> Option<Self> {
        match value {
            HostValue::Date(d) => Some(*d),
            HostValue::F64(days) => crate::date::from_ole_date(*days).ok(),
            HostValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl<T: FromHost> FromHost for Option<T> {
    fn from_host(value: &HostValue) -> Option<Self> {
        if value.is_null() {
            return Some(None);
        }
        T::from_host(value).map(Some)
    }
}
