use crate::array;
use crate::date;
use crate::error::{Result, VariantError};
use crate::host::{Decimal, HostArray, HostValue, ObjectRef};
use crate::ole;
use crate::raw::{
    RawSafeArray, RawTaggedValue, RawVariant, RawVariantValue, VARIANT_FALSE, VARIANT_TRUE,
    VarType,
};
use log::warn;
use std::ffi::c_void;
use std::fmt;

/// How date/time values are encoded on construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateEncoding {
    /// `VT_DATE`, an OLE automation date
    #[default]
    OleDate,
    /// `VT_FILETIME`, 100 ns ticks since 1601-01-01
    FileTime,
}

/// An owned VARIANT.
///
/// The variant owns its string and array payloads and clears them exactly
/// once, when dropped. Use [`Variant::detach`] to hand ownership to native
/// code and [`Variant::attach`] to take it back.
pub struct Variant {
    inner: RawVariant,
}

impl Variant {
    /// A `VT_EMPTY` variant.
    pub fn empty() -> Self {
        Self {
            inner: RawVariant::zeroed(),
        }
    }

    /// Marshals a host value using the default date encoding.
    ///
    /// # Errors
    ///
    /// Returns a [`VariantError`] when the value has no VARIANT representation,
    /// e.g. a multi-dimensional array or an untyped empty sequence.
    pub fn from_host(value: &HostValue) -> Result<Self> {
        Self::from_host_with(value, DateEncoding::OleDate)
    }

    /// Marshals a host value with an explicit date encoding.
    ///
    /// # Errors
    ///
    /// See [`Variant::from_host`].
    pub fn from_host_with(value: &HostValue, dates: DateEncoding) -> Result<Self> {
        let mut variant = Self::empty();
        variant.construct(value, dates)?;
        Ok(variant)
    }

    /// Stores a raw pointer under an explicit tag, normally `VT_UNKNOWN` or
    /// `VT_DISPATCH`. The variant takes over one reference on the object.
    ///
    /// # Safety
    /// `ptr` must be null or a valid payload for `vt` that the variant may
    /// free: an interface pointer the caller holds a reference on for object
    /// tags, an OLE allocation for string and array tags.
    ///
    /// ```compile_fail
    /// use jsrt_variant::{VarType, Variant};
    ///
    /// let variant = Variant::from_pointer(0x10 as *mut _, VarType::BSTR);
    /// ```
    pub unsafe fn from_pointer(ptr: *mut c_void, vt: VarType) -> Self {
        Self {
            inner: RawVariant {
                tagged: RawTaggedValue {
                    vt,
                    reserved1: 0,
                    reserved2: 0,
                    reserved3: 0,
                    value: RawVariantValue { punk_val: ptr },
                },
            },
        }
    }

    /// Takes ownership of a raw variant, zeroing the source so it cannot be
    /// cleared twice.
    ///
    /// # Safety
    /// `raw` must be an initialised variant whose payload nothing else owns.
    pub unsafe fn attach(raw: &mut RawVariant) -> Self {
        let inner = *raw;
        *raw = RawVariant::zeroed();
        Self { inner }
    }

    /// Wraps a raw variant this value now owns.
    ///
    /// # Safety
    /// As for [`Variant::attach`]: the payload must be valid for its tag and
    /// owned by no one else.
    pub unsafe fn from_raw(inner: RawVariant) -> Self {
        Self { inner }
    }

    /// Gives up ownership of the payload; the caller becomes responsible for
    /// clearing it.
    pub fn detach(mut self) -> RawVariant {
        std::mem::replace(&mut self.inner, RawVariant::zeroed())
    }

    pub fn as_raw(&self) -> &RawVariant {
        &self.inner
    }

    /// Mutable access for native calls that write into the variant.
    ///
    /// # Safety
    /// Whatever is written must leave a payload valid for its tag, since the
    /// variant frees it on drop.
    pub unsafe fn as_raw_mut(&mut self) -> &mut RawVariant {
        &mut self.inner
    }

    pub fn var_type(&self) -> VarType {
        self.inner.vt()
    }

    /// Frees the payload and resets to `VT_EMPTY`.
    ///
    /// # Errors
    ///
    /// Returns an error when `VariantClear` reports a failure.
    pub fn clear(&mut self) -> Result<()> {
        // SAFETY: `inner` is always an initialised variant this value owns.
        unsafe { ole::variant_clear(&raw mut self.inner) }
    }

    /// Deep copy through `VariantCopy`.
    ///
    /// # Errors
    ///
    /// Returns an error when the copy fails.
    pub fn try_clone(&self) -> Result<Self> {
        let mut copy = Self::empty();
        // SAFETY: both variants are initialised; `copy` is empty.
        unsafe { ole::variant_copy(&raw mut copy.inner, &raw const self.inner)? };
        Ok(copy)
    }

    /// Coerces the value through `VariantChangeType`.
    ///
    /// # Errors
    ///
    /// Returns an error when the coercion is not possible.
    pub fn change_type(&self, vt: VarType) -> Result<Self> {
        let mut target = Self::empty();
        // SAFETY: both variants are initialised.
        unsafe { ole::variant_change_type(&raw mut target.inner, &raw const self.inner, vt)? };
        Ok(target)
    }

    fn construct(&mut self, value: &HostValue, dates: DateEncoding) -> Result<()> {
        use RawVariantValue as V;

        let (vt, value) = match value {
            HostValue::Empty => (VarType::EMPTY, V { ll_val: 0 }),
            HostValue::Null => (VarType::NULL, V { ll_val: 0 }),
            HostValue::Variant(inner) => {
                // SAFETY: `inner` is initialised and `self` is still empty.
                unsafe { ole::variant_copy(&raw mut self.inner, inner.as_raw())? };
                return Ok(());
            }
            HostValue::Decimal(d) => {
                self.inner.dec_val = d.to_raw();
                self.inner.set_vt(VarType::DECIMAL);
                return Ok(());
            }
            HostValue::Pointer(ptr) => {
                // SAFETY: `RawPointer` guarantees a live interface pointer or null.
                unsafe { ole::add_ref(ptr.as_ptr()) };
                (VarType::UNKNOWN, V { punk_val: ptr.as_ptr() })
            }
            HostValue::Object(obj) if obj.is_dispatch() => {
                (VarType::DISPATCH, V { pdisp_val: obj.clone().into_raw() })
            }
            HostValue::Object(obj) => (VarType::UNKNOWN, V { punk_val: obj.clone().into_raw() }),
            HostValue::Bool(v) => (
                VarType::BOOL,
                V { bool_val: if *v { VARIANT_TRUE } else { VARIANT_FALSE } },
            ),
            HostValue::I8(v) => (VarType::I1, V { c_val: *v }),
            HostValue::U8(v) => (VarType::UI1, V { b_val: *v }),
            HostValue::I16(v) => (VarType::I2, V { i_val: *v }),
            HostValue::U16(v) => (VarType::UI2, V { ui_val: *v }),
            HostValue::I32(v) => (VarType::I4, V { l_val: *v }),
            HostValue::U32(v) => (VarType::UI4, V { ul_val: *v }),
            HostValue::I64(v) => (VarType::I8, V { ll_val: *v }),
            HostValue::U64(v) => (VarType::UI8, V { ull_val: *v }),
            HostValue::F32(v) => (VarType::R4, V { flt_val: *v }),
            HostValue::F64(v) => (VarType::R8, V { dbl_val: *v }),
            HostValue::Currency(cy) => (VarType::CY, V { cy_val: *cy }),
            HostValue::Error(scode) => (VarType::ERROR, V { scode: *scode }),
            HostValue::Date(dt) => match dates {
                DateEncoding::OleDate => (VarType::DATE, V { date: date::to_ole_date(*dt)? }),
                DateEncoding::FileTime => {
                    (VarType::FILETIME, V { ull_val: date::to_file_time(*dt) })
                }
            },
            HostValue::Char(c) => bstr(c.encode_utf8(&mut [0; 4]))?,
            HostValue::Chars(chars) => bstr(&chars.iter().collect::<String>())?,
            HostValue::String(s) => bstr(s)?,
            HostValue::Guid(g) => bstr(&g.braced())?,
            HostValue::Array(array) => safe_array(array::construct(array, dates)?),
            HostValue::NdArray(nd) => {
                if nd.shape.len() != 1 {
                    return Err(VariantError::UnsupportedRank(nd.shape.len()));
                }
                if nd.shape[0] != nd.data.len() {
                    return Err(VariantError::ShapeMismatch {
                        shape: nd.shape[0],
                        len: nd.data.len(),
                    });
                }
                safe_array(array::construct(&nd.data, dates)?)
            }
            HostValue::Sequence(sequence) => {
                safe_array(array::construct_sequence(sequence, dates)?)
            }
        };
        self.inner.tagged = RawTaggedValue {
            vt,
            reserved1: 0,
            reserved2: 0,
            reserved3: 0,
            value,
        };
        Ok(())
    }

    /// Decodes the variant into a host value.
    ///
    /// # Errors
    ///
    /// Returns [`VariantError::UnsupportedVarType`] for discriminants this
    /// layer does not know, and [`VariantError::UnsupportedRank`] for
    /// multi-dimensional arrays.
    pub fn to_host(&self) -> Result<HostValue> {
        decode(&self.inner)
    }

    /// Copies the raw bytes of a plain-element array variant into `out`,
    /// which must be exactly as large as the native data.
    ///
    /// # Errors
    ///
    /// Returns [`VariantError::SizeMismatch`] when the sizes differ, and
    /// [`VariantError::UnsupportedVarType`] when the variant is not an array of
    /// plain values.
    pub fn copy_array_bytes(&self, out: &mut [u8]) -> Result<()> {
        let vt = self.var_type();
        let plain = vt.is_array()
            && !matches!(
                vt.base(),
                VarType::BSTR | VarType::VARIANT | VarType::UNKNOWN | VarType::DISPATCH
            );
        // SAFETY: array tags always carry the `parray` field.
        let psa = unsafe { self.inner.tagged.value.parray };
        if !plain || psa.is_null() {
            return Err(VariantError::UnsupportedVarType(vt));
        }
        // SAFETY: `psa` is owned by this variant and holds plain elements.
        unsafe { array::copy_bytes(psa, out) }
    }
}

fn bstr(text: &str) -> Result<(VarType, RawVariantValue)> {
    Ok((
        VarType::BSTR,
        RawVariantValue {
            bstr_val: ole::alloc_bstr(text)?,
        },
    ))
}

fn safe_array((vt, psa): (VarType, *mut RawSafeArray)) -> (VarType, RawVariantValue) {
    (vt.with_array(), RawVariantValue { parray: psa })
}

fn string_or_null(text: Option<String>) -> HostValue {
    text.map_or(HostValue::Null, HostValue::String)
}

/// Decodes a borrowed raw variant without taking ownership of its payload.
/// Object references come back with a reference of their own.
///
/// Pointer-carrying tags must reference live memory, as they do for every
/// variant produced by this crate or by the engine.
pub(crate) fn decode(raw: &RawVariant) -> Result<HostValue> {
    let vt = raw.vt();
    // SAFETY: every arm reads only the union field selected by `vt`.
    let value = unsafe {
        let v = &raw.tagged.value;
        match vt {
            VarType::EMPTY => HostValue::Empty,
            VarType::NULL => HostValue::Null,
            VarType::I1 => HostValue::I8(v.c_val),
            VarType::UI1 => HostValue::U8(v.b_val),
            VarType::I2 => HostValue::I16(v.i_val),
            VarType::UI2 => HostValue::U16(v.ui_val),
            VarType::I4 | VarType::INT => HostValue::I32(v.l_val),
            VarType::UI4 | VarType::UINT => HostValue::U32(v.ul_val),
            VarType::I8 => HostValue::I64(v.ll_val),
            VarType::UI8 => HostValue::U64(v.ull_val),
            VarType::R4 => HostValue::F32(v.flt_val),
            VarType::R8 => HostValue::F64(v.dbl_val),
            VarType::BOOL => HostValue::Bool(v.bool_val != VARIANT_FALSE),
            VarType::ERROR => HostValue::Error(v.scode),
            VarType::CY => HostValue::Currency(v.cy_val),
            VarType::DATE => HostValue::Date(date::from_ole_date(v.date)?),
            VarType::FILETIME => HostValue::Date(date::from_file_time(v.ull_val)?),
            VarType::BSTR => string_or_null(ole::read_bstr(v.bstr_val)),
            VarType::LPWSTR => string_or_null(ole::read_lpwstr(v.bstr_val)),
            VarType::LPSTR => string_or_null(ole::read_lpstr(v.bstr_val.cast::<u8>())),
            VarType::UNKNOWN => HostValue::Object(ObjectRef::unknown(v.punk_val)),
            VarType::DISPATCH => HostValue::Object(ObjectRef::dispatch(v.pdisp_val)),
            VarType::DECIMAL => HostValue::Decimal(Decimal::from_raw(raw.dec_val)),
            vt if vt.is_array() && vt.raw() & VarType::BYREF.raw() == 0 => {
                HostValue::Array(array::extract(v.parray, vt.base())?)
            }
            vt => return Err(VariantError::UnsupportedVarType(vt)),
        }
    };
    Ok(value)
}

impl Drop for Variant {
    fn drop(&mut self) {
        if let Err(e) = self.clear() {
            warn!("Failed to clear {} variant: {e}", self.inner.vt());
        }
    }
}

impl Default for Variant {
    fn default() -> Self {
        Self::empty()
    }
}

impl PartialEq for Variant {
    fn eq(&self, other: &Self) -> bool {
        match (self.to_host(), other.to_host()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Variant")
            .field("vt", &self.var_type())
            .field("value", &self.to_host())
            .finish()
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let vt = self.var_type();
        match self.to_host() {
            Ok(HostValue::Empty | HostValue::Null) => f.write_str("<null>"),
            Ok(HostValue::String(s)) => write!(f, "[{vt}] `{s}`"),
            Ok(HostValue::Array(HostArray::U8(bytes))) => {
                write!(f, "[{vt}] bytes[{}]", bytes.len())
            }
            Ok(value) => write!(f, "[{vt}] {value}"),
            Err(e) => write!(f, "[{vt}] <{e}>"),
        }
    }
}

impl TryFrom<&HostValue> for Variant {
    type Error = VariantError;

    fn try_from(value: &HostValue) -> Result<Self> {
        Self::from_host(value)
    }
}

impl TryFrom<&Variant> for HostValue {
    type Error = VariantError;

    fn try_from(value: &Variant) -> Result<Self> {
        value.to_host()
    }
}
