//! The host-side value model.
//!
//! [`HostValue`] is a closed set of everything the marshalling layer knows how
//! to turn into a VARIANT, so exhaustiveness is checked by the compiler rather
//! than by a runtime type switch.

use crate::ole;
use crate::raw::{RawDecimal, RawGuid};
use crate::variant::Variant;
use chrono::NaiveDateTime;
use std::ffi::c_void;
use std::fmt;

/// A dynamically typed host value.
#[derive(Debug, PartialEq)]
pub enum HostValue {
    /// `VT_EMPTY`; what the engine hands back for `undefined`
    Empty,
    Null,
    Bool(bool),
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    /// A single character, marshalled as a one-character string
    Char(char),
    /// A character array, marshalled as a string
    Chars(Vec<char>),
    String(String),
    Decimal(Decimal),
    /// Currency: a 64-bit integer scaled by 10 000
    Currency(i64),
    /// An `SCODE` error value
    Error(i32),
    Date(NaiveDateTime),
    Guid(Guid),
    /// A raw interface pointer stored in the object-reference field
    Pointer(RawPointer),
    Object(ObjectRef),
    Array(HostArray),
    Sequence(Sequence),
    NdArray(NdArray),
    /// An already-tagged value, unwrapped one level on construction
    Variant(Box<Variant>),
}

impl HostValue {
    /// Wraps an untyped enumerable; the element kind is inferred from the
    /// first element when the sequence is materialized.
    pub fn sequence(items: impl IntoIterator<Item = HostValue>) -> Self {
        Self::Sequence(Sequence {
            element: None,
            items: items.into_iter().collect(),
        })
    }

    /// Wraps an enumerable whose element kind is known up front.
    pub fn typed_sequence(element: ElementKind, items: impl IntoIterator<Item = HostValue>) -> Self {
        Self::Sequence(Sequence {
            element: Some(element),
            items: items.into_iter().collect(),
        })
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null | Self::Empty)
    }

    /// Name of the value kind, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::I8(_) => "i8",
            Self::U8(_) => "u8",
            Self::I16(_) => "i16",
            Self::U16(_) => "u16",
            Self::I32(_) => "i32",
            Self::U32(_) => "u32",
            Self::I64(_) => "i64",
            Self::U64(_) => "u64",
            Self::F32(_) => "f32",
            Self::F64(_) => "f64",
            Self::Char(_) => "char",
            Self::Chars(_) => "char[]",
            Self::String(_) => "string",
            Self::Decimal(_) => "decimal",
            Self::Currency(_) => "currency",
            Self::Error(_) => "scode",
            Self::Date(_) => "date",
            Self::Guid(_) => "guid",
            Self::Pointer(_) => "pointer",
            Self::Object(_) => "object",
            Self::Array(a) => a.type_name(),
            Self::Sequence(_) => "sequence",
            Self::NdArray(_) => "ndarray",
            Self::Variant(_) => "variant",
        }
    }

    /// The array element kind this value would occupy, if it can be one.
    pub fn element_kind(&self) -> Option<ElementKind> {
        Some(match self {
            Self::Bool(_) => ElementKind::Bool,
            Self::I8(_) => ElementKind::I8,
            Self::U8(_) => ElementKind::U8,
            Self::I16(_) => ElementKind::I16,
            Self::U16(_) => ElementKind::U16,
            Self::I32(_) => ElementKind::I32,
            Self::U32(_) => ElementKind::U32,
            Self::I64(_) => ElementKind::I64,
            Self::U64(_) => ElementKind::U64,
            Self::F32(_) => ElementKind::F32,
            Self::F64(_) => ElementKind::F64,
            Self::Char(_) => ElementKind::Char,
            Self::Chars(_) | Self::String(_) => ElementKind::String,
            Self::Decimal(_) => ElementKind::Decimal,
            Self::Currency(_) => ElementKind::Currency,
            Self::Error(_) => ElementKind::Error,
            Self::Date(_) => ElementKind::Date,
            Self::Guid(_) => ElementKind::Guid,
            Self::Object(_) => ElementKind::Object,
            _ => return None,
        })
    }
}

macro_rules! impl_from_scalar {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for HostValue {
                fn from(value: $ty) -> Self {
                    Self::$variant(value)
                }
            }
        )*
    };
}

impl_from_scalar!(
    bool => Bool,
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    char => Char,
    String => String,
    Decimal => Decimal,
    NaiveDateTime => Date,
    Guid => Guid,
    ObjectRef => Object,
    HostArray => Array,
);

impl From<Vec<char>> for HostValue {
    fn from(value: Vec<char>) -> Self {
        Self::Chars(value)
    }
}

impl From<&str> for HostValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<Variant> for HostValue {
    fn from(value: Variant) -> Self {
        Self::Variant(Box::new(value))
    }
}

impl<T: Into<HostValue>> From<Option<T>> for HostValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

macro_rules! impl_from_vec {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<Vec<$ty>> for HostArray {
                fn from(value: Vec<$ty>) -> Self {
                    Self::$variant(value)
                }
            }

            impl From<Vec<$ty>> for HostValue {
                fn from(value: Vec<$ty>) -> Self {
                    Self::Array(HostArray::$variant(value))
                }
            }
        )*
    };
}

impl_from_vec!(
    bool => Bool,
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    String => String,
    Vec<char> => Chars,
    Decimal => Decimal,
    NaiveDateTime => Date,
    Guid => Guid,
    ObjectRef => Object,
    HostValue => Variant,
);

impl From<Vec<&str>> for HostValue {
    fn from(value: Vec<&str>) -> Self {
        Self::Array(HostArray::String(
            value.into_iter().map(str::to_owned).collect(),
        ))
    }
}

impl fmt::Display for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("undefined"),
            Self::Null => f.write_str("null"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::I8(v) => write!(f, "{v}"),
            Self::U8(v) => write!(f, "{v}"),
            Self::I16(v) => write!(f, "{v}"),
            Self::U16(v) => write!(f, "{v}"),
            Self::I32(v) | Self::Error(v) => write!(f, "{v}"),
            Self::U32(v) => write!(f, "{v}"),
            Self::I64(v) => write!(f, "{v}"),
            Self::U64(v) => write!(f, "{v}"),
            Self::F32(v) => write!(f, "{v}"),
            Self::F64(v) => write!(f, "{v}"),
            Self::Char(v) => write!(f, "{v}"),
            Self::Chars(v) => f.write_str(&v.iter().collect::<String>()),
            Self::String(v) => f.write_str(v),
            Self::Decimal(v) => write!(f, "{v}"),
            Self::Currency(v) => write!(f, "{}", Decimal::from_currency(*v)),
            Self::Date(v) => write!(f, "{v}"),
            Self::Guid(v) => write!(f, "{v}"),
            Self::Pointer(p) => write!(f, "0x{:X}", p.addr()),
            Self::Object(v) => write!(f, "{v:?}"),
            Self::Array(v) => write!(f, "{v}"),
            Self::Sequence(v) => write_joined(f, &v.items),
            Self::NdArray(v) => write!(f, "{}[{:?}]", v.data.type_name(), v.shape),
            Self::Variant(v) => write!(f, "{v}"),
        }
    }
}

fn write_joined<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

/// Element kinds a one-dimensional array can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Bool,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    Char,
    String,
    Decimal,
    Currency,
    Error,
    Date,
    Guid,
    Object,
    /// Heterogeneous elements, each marshalled as its own VARIANT
    Variant,
}

impl ElementKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::I8 => "i8",
            Self::U8 => "u8",
            Self::I16 => "i16",
            Self::U16 => "u16",
            Self::I32 => "i32",
            Self::U32 => "u32",
            Self::I64 => "i64",
            Self::U64 => "u64",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::Char => "char",
            Self::String => "string",
            Self::Decimal => "decimal",
            Self::Currency => "currency",
            Self::Error => "scode",
            Self::Date => "date",
            Self::Guid => "guid",
            Self::Object => "object",
            Self::Variant => "variant",
        }
    }
}

/// A one-dimensional, homogeneous host array.
#[derive(Debug, PartialEq)]
pub enum HostArray {
    Bool(Vec<bool>),
    I8(Vec<i8>),
    U8(Vec<u8>),
    I16(Vec<i16>),
    U16(Vec<u16>),
    I32(Vec<i32>),
    U32(Vec<u32>),
    I64(Vec<i64>),
    U64(Vec<u64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
    /// Strings; a null native slot decodes to an empty string
    String(Vec<String>),
    /// Character arrays, each marshalled as a string
    Chars(Vec<Vec<char>>),
    Decimal(Vec<Decimal>),
    Currency(Vec<i64>),
    Error(Vec<i32>),
    Date(Vec<NaiveDateTime>),
    Guid(Vec<Guid>),
    Object(Vec<ObjectRef>),
    Variant(Vec<HostValue>),
}

impl HostArray {
    pub fn len(&self) -> usize {
        match self {
            Self::Bool(v) => v.len(),
            Self::I8(v) => v.len(),
            Self::U8(v) => v.len(),
            Self::I16(v) => v.len(),
            Self::U16(v) => v.len(),
            Self::I32(v) | Self::Error(v) => v.len(),
            Self::U32(v) => v.len(),
            Self::I64(v) | Self::Currency(v) => v.len(),
            Self::U64(v) => v.len(),
            Self::F32(v) => v.len(),
            Self::F64(v) => v.len(),
            Self::String(v) => v.len(),
            Self::Chars(v) => v.len(),
            Self::Decimal(v) => v.len(),
            Self::Date(v) => v.len(),
            Self::Guid(v) => v.len(),
            Self::Object(v) => v.len(),
            Self::Variant(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn element_kind(&self) -> ElementKind {
        match self {
            Self::Bool(_) => ElementKind::Bool,
            Self::I8(_) => ElementKind::I8,
            Self::U8(_) => ElementKind::U8,
            Self::I16(_) => ElementKind::I16,
            Self::U16(_) => ElementKind::U16,
            Self::I32(_) => ElementKind::I32,
            Self::U32(_) => ElementKind::U32,
            Self::I64(_) => ElementKind::I64,
            Self::U64(_) => ElementKind::U64,
            Self::F32(_) => ElementKind::F32,
            Self::F64(_) => ElementKind::F64,
            Self::String(_) | Self::Chars(_) => ElementKind::String,
            Self::Decimal(_) => ElementKind::Decimal,
            Self::Currency(_) => ElementKind::Currency,
            Self::Error(_) => ElementKind::Error,
            Self::Date(_) => ElementKind::Date,
            Self::Guid(_) => ElementKind::Guid,
            Self::Object(_) => ElementKind::Object,
            Self::Variant(_) => ElementKind::Variant,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool[]",
            Self::I8(_) => "i8[]",
            Self::U8(_) => "u8[]",
            Self::I16(_) => "i16[]",
            Self::U16(_) => "u16[]",
            Self::I32(_) => "i32[]",
            Self::U32(_) => "u32[]",
            Self::I64(_) => "i64[]",
            Self::U64(_) => "u64[]",
            Self::F32(_) => "f32[]",
            Self::F64(_) => "f64[]",
            Self::String(_) => "string[]",
            Self::Chars(_) => "char[][]",
            Self::Decimal(_) => "decimal[]",
            Self::Currency(_) => "currency[]",
            Self::Error(_) => "scode[]",
            Self::Date(_) => "date[]",
            Self::Guid(_) => "guid[]",
            Self::Object(_) => "object[]",
            Self::Variant(_) => "variant[]",
        }
    }
}

impl fmt::Display for HostArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write_joined(f, v),
            Self::I8(v) => write_joined(f, v),
            Self::U8(v) => write!(f, "bytes[{}]", v.len()),
            Self::I16(v) => write_joined(f, v),
            Self::U16(v) => write_joined(f, v),
            Self::I32(v) | Self::Error(v) => write_joined(f, v),
            Self::U32(v) => write_joined(f, v),
            Self::I64(v) | Self::Currency(v) => write_joined(f, v),
            Self::U64(v) => write_joined(f, v),
            Self::F32(v) => write_joined(f, v),
            Self::F64(v) => write_joined(f, v),
            Self::String(v) => write_joined(f, v),
            Self::Chars(v) => {
                let strings: Vec<String> = v.iter().map(|c| c.iter().collect()).collect();
                write_joined(f, &strings)
            }
            Self::Decimal(v) => write_joined(f, v),
            Self::Date(v) => write_joined(f, v),
            Self::Guid(v) => write_joined(f, v),
            Self::Object(v) => {
                let ptrs: Vec<String> = v.iter().map(|o| format!("{o:?}")).collect();
                write_joined(f, &ptrs)
            }
            Self::Variant(v) => write_joined(f, v),
        }
    }
}

/// A non-string enumerable, materialized into a typed array on construction.
#[derive(Debug, PartialEq)]
pub struct Sequence {
    /// Declared element kind, if the producer knows it
    pub element: Option<ElementKind>,
    pub items: Vec<HostValue>,
}

/// A shaped array. Only rank 1 can be marshalled.
#[derive(Debug, PartialEq)]
pub struct NdArray {
    pub shape: Vec<usize>,
    /// Elements in row-major order
    pub data: HostArray,
}

/// A reference to a foreign COM object (`IUnknown`/`IDispatch`).
///
/// Each `ObjectRef` owns one reference on the object: cloning adds one and
/// dropping releases it.
#[derive(PartialEq, Eq, Hash)]
pub struct ObjectRef {
    ptr: usize,
    dispatch: bool,
}

impl ObjectRef {
    /// Takes a new reference on an `IUnknown` pointer.
    ///
    /// # Safety
    /// `ptr` must be null or a live COM interface pointer.
    pub unsafe fn unknown(ptr: *mut c_void) -> Self {
        // SAFETY: forwarded caller contract.
        unsafe { Self::acquire(ptr, false) }
    }

    /// Takes a new reference on an `IDispatch` pointer.
    ///
    /// # Safety
    /// `ptr` must be null or a live `IDispatch` pointer.
    pub unsafe fn dispatch(ptr: *mut c_void) -> Self {
        // SAFETY: forwarded caller contract.
        unsafe { Self::acquire(ptr, true) }
    }

    unsafe fn acquire(ptr: *mut c_void, dispatch: bool) -> Self {
        // SAFETY: `ptr` is null or a live interface pointer.
        unsafe { ole::add_ref(ptr) };
        Self {
            ptr: ptr as usize,
            dispatch,
        }
    }

    pub fn as_ptr(&self) -> *mut c_void {
        self.ptr as *mut c_void
    }

    pub fn is_dispatch(&self) -> bool {
        self.dispatch
    }

    /// Hands the owned reference to the caller, who must release it.
    pub fn into_raw(self) -> *mut c_void {
        let ptr = self.as_ptr();
        std::mem::forget(self);
        ptr
    }
}

impl Clone for ObjectRef {
    fn clone(&self) -> Self {
        // SAFETY: `self` holds a reference, so the object is live.
        unsafe { Self::acquire(self.as_ptr(), self.dispatch) }
    }
}

impl Drop for ObjectRef {
    fn drop(&mut self) {
        // SAFETY: releases the reference taken on construction.
        unsafe { ole::release(self.as_ptr()) };
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.dispatch { "IDispatch" } else { "IUnknown" };
        write!(f, "{kind}@0x{:X}", self.ptr)
    }
}

/// A borrowed interface pointer, marshalled into `VT_UNKNOWN` unchanged.
///
/// The variant built from it takes its own reference, so the pointer only has
/// to be live while it is being marshalled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RawPointer(usize);

impl RawPointer {
    /// # Safety
    /// `ptr` must be null or a COM interface pointer that is live whenever a
    /// value carrying it is marshalled.
    pub unsafe fn new(ptr: *mut c_void) -> Self {
        Self(ptr as usize)
    }

    pub fn as_ptr(self) -> *mut c_void {
        self.0 as *mut c_void
    }

    pub fn addr(self) -> usize {
        self.0
    }
}

/// A 96-bit scaled decimal, laid out like the native `DECIMAL`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Decimal {
    scale: u8,
    negative: bool,
    hi: u32,
    lo: u64,
}

impl Decimal {
    pub const MAX_SCALE: u8 = 28;
    const MAX_MANTISSA: u128 = (1 << 96) - 1;

    /// `mantissa * 10^-scale`. Returns `None` when the mantissa needs more
    /// than 96 bits or the scale exceeds 28.
    pub fn new(mantissa: i128, scale: u8) -> Option<Self> {
        let magnitude = mantissa.unsigned_abs();
        if magnitude > Self::MAX_MANTISSA || scale > Self::MAX_SCALE {
            return None;
        }
        Some(Self {
            scale,
            negative: mantissa < 0,
            hi: (magnitude >> 64) as u32,
            lo: magnitude as u64,
        })
    }

    /// Converts a `CY` value (scaled by 10 000).
    pub fn from_currency(cy: i64) -> Self {
        Self::new(i128::from(cy), 4).unwrap_or_default()
    }

    pub fn mantissa(self) -> i128 {
        let magnitude = (i128::from(self.hi) << 64) | i128::from(self.lo);
        if self.negative { -magnitude } else { magnitude }
    }

    pub fn scale(self) -> u8 {
        self.scale
    }

    pub fn to_f64(self) -> f64 {
        self.mantissa() as f64 / 10f64.powi(i32::from(self.scale))
    }

    pub(crate) fn to_raw(self) -> RawDecimal {
        RawDecimal {
            reserved: 0,
            scale: self.scale,
            sign: if self.negative { 0x80 } else { 0 },
            hi32: self.hi,
            lo64: self.lo,
        }
    }

    pub(crate) fn from_raw(raw: RawDecimal) -> Self {
        Self {
            scale: raw.scale,
            negative: raw.sign & 0x80 != 0,
            hi: raw.hi32,
            lo: raw.lo64,
        }
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.mantissa().unsigned_abs().to_string();
        let scale = usize::from(self.scale);
        let sign = if self.negative { "-" } else { "" };
        if scale == 0 {
            return write!(f, "{sign}{digits}");
        }
        let padded = format!("{digits:0>width$}", width = scale + 1);
        let (int, frac) = padded.split_at(padded.len() - scale);
        write!(f, "{sign}{int}.{frac}")
    }
}

/// A GUID in the Windows field layout.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Guid(RawGuid);

impl Guid {
    pub const fn from_fields(data1: u32, data2: u16, data3: u16, data4: [u8; 8]) -> Self {
        Self(RawGuid {
            data1,
            data2,
            data3,
            data4,
        })
    }

    pub const fn from_u128(value: u128) -> Self {
        let bytes = value.to_be_bytes();
        Self::from_fields(
            (value >> 96) as u32,
            (value >> 80) as u16,
            (value >> 64) as u16,
            [
                bytes[8], bytes[9], bytes[10], bytes[11], bytes[12], bytes[13], bytes[14],
                bytes[15],
            ],
        )
    }

    pub fn fields(&self) -> RawGuid {
        self.0
    }

    /// The canonical braced form, e.g. `{00020400-0000-0000-c000-000000000046}`.
    pub fn braced(&self) -> String {
        format!("{{{self}}}")
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let g = &self.0;
        write!(
            f,
            "{:08x}-{:04x}-{:04x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
            g.data1,
            g.data2,
            g.data3,
            g.data4[0],
            g.data4[1],
            g.data4[2],
            g.data4[3],
            g.data4[4],
            g.data4[5],
            g.data4[6],
            g.data4[7],
        )
    }
}
