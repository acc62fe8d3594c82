//! One-dimensional SAFEARRAY construction and extraction.
//!
//! Construction allocates, locks, fills and unlocks; a failure while filling
//! destroys the half-built array so nothing leaks. Extraction only reads the
//! native buffer and always releases its lock.

use crate::date;
use crate::error::{Result, VariantError};
use crate::host::{Decimal, ElementKind, HostArray, HostValue, ObjectRef, Sequence};
use crate::ole;
use crate::raw::{RawDecimal, RawSafeArray, RawVariant, VARIANT_FALSE, VARIANT_TRUE, VarType};
use crate::variant::{self, DateEncoding, Variant};
use log::warn;
use std::ffi::c_void;
use std::ptr;

/// Keeps a SAFEARRAY's data locked for as long as it lives.
struct DataLock {
    psa: *mut RawSafeArray,
    data: *mut c_void,
}

impl DataLock {
    /// # Safety
    /// `psa` must be a live SAFEARRAY.
    unsafe fn acquire(psa: *mut RawSafeArray) -> Result<Self> {
        // SAFETY: forwarded caller contract.
        let data = unsafe { ole::safe_array_access_data(psa)? };
        Ok(Self { psa, data })
    }
}

impl Drop for DataLock {
    fn drop(&mut self) {
        // SAFETY: the lock was taken in `acquire` on a live array.
        if let Err(e) = unsafe { ole::safe_array_unaccess_data(self.psa) } {
            warn!("Failed to unlock SAFEARRAY data: {e}");
        }
    }
}

/// Allocates an array of `vt` and fills slot `i` with `convert(&items[i])`.
fn build<T, U>(
    vt: VarType,
    items: &[T],
    mut convert: impl FnMut(&T) -> Result<U>,
) -> Result<*mut RawSafeArray> {
    debug_assert_eq!(crate::raw::element_size(vt), Some(size_of::<U>()));
    let len = u32::try_from(items.len()).map_err(|_| VariantError::OutOfMemory("SAFEARRAY"))?;
    let psa = ole::safe_array_create(vt, len)?;

    let filled: Result<()> = (|| {
        // SAFETY: `psa` was just created and is owned here.
        let lock = unsafe { DataLock::acquire(psa)? };
        let slots = lock.data.cast::<U>();
        for (i, item) in items.iter().enumerate() {
            let value = convert(item)?;
            // SAFETY: the array holds `len` slots of `size_of::<U>()` bytes.
            unsafe { slots.add(i).write(value) };
        }
        Ok(())
    })();

    if let Err(e) = filled {
        // SAFETY: the lock is released; nothing else references `psa`.
        if let Err(destroy) = unsafe { ole::safe_array_destroy(psa) } {
            warn!("Failed to destroy partially built SAFEARRAY: {destroy}");
        }
        return Err(e);
    }
    Ok(psa)
}

fn copied<T: Copy>(vt: VarType, items: &[T]) -> Result<*mut RawSafeArray> {
    build(vt, items, |v| Ok(*v))
}

fn bool_slot(value: bool) -> i16 {
    if value { VARIANT_TRUE } else { VARIANT_FALSE }
}

fn object_vt(objects: &[ObjectRef]) -> VarType {
    if !objects.is_empty() && objects.iter().all(|o| o.is_dispatch()) {
        VarType::DISPATCH
    } else {
        VarType::UNKNOWN
    }
}

/// Builds a SAFEARRAY from a typed host array. Returns the element type and
/// the new array, which the caller owns.
pub(crate) fn construct(
    array: &HostArray,
    dates: DateEncoding,
) -> Result<(VarType, *mut RawSafeArray)> {
    let vt = match array {
        HostArray::Bool(_) => VarType::BOOL,
        HostArray::I8(_) => VarType::I1,
        HostArray::U8(_) => VarType::UI1,
        HostArray::I16(_) => VarType::I2,
        HostArray::U16(_) => VarType::UI2,
        HostArray::I32(_) => VarType::I4,
        HostArray::U32(_) => VarType::UI4,
        HostArray::I64(_) => VarType::I8,
        HostArray::U64(_) => VarType::UI8,
        HostArray::F32(_) => VarType::R4,
        HostArray::F64(_) => VarType::R8,
        HostArray::String(_) | HostArray::Chars(_) | HostArray::Guid(_) => VarType::BSTR,
        HostArray::Decimal(_) => VarType::DECIMAL,
        HostArray::Currency(_) => VarType::CY,
        HostArray::Error(_) => VarType::ERROR,
        HostArray::Date(_) => VarType::DATE,
        HostArray::Object(v) => object_vt(v),
        HostArray::Variant(_) => VarType::VARIANT,
    };
    let psa = match array {
        HostArray::Bool(v) => build(vt, v, |b| Ok(bool_slot(*b)))?,
        HostArray::I8(v) => copied(vt, v)?,
        HostArray::U8(v) => copied(vt, v)?,
        HostArray::I16(v) => copied(vt, v)?,
        HostArray::U16(v) => copied(vt, v)?,
        HostArray::I32(v) | HostArray::Error(v) => copied(vt, v)?,
        HostArray::U32(v) => copied(vt, v)?,
        HostArray::I64(v) | HostArray::Currency(v) => copied(vt, v)?,
        HostArray::U64(v) => copied(vt, v)?,
        HostArray::F32(v) => copied(vt, v)?,
        HostArray::F64(v) => copied(vt, v)?,
        HostArray::String(v) => build(vt, v, |s| ole::alloc_bstr(s))?,
        HostArray::Chars(v) => build(vt, v, |c| ole::alloc_bstr(&c.iter().collect::<String>()))?,
        HostArray::Guid(v) => build(vt, v, |g| ole::alloc_bstr(&g.braced()))?,
        HostArray::Decimal(v) => build(vt, v, |d| Ok(d.to_raw()))?,
        HostArray::Date(v) => build(vt, v, |d| date::to_ole_date(*d))?,
        HostArray::Object(v) => build(vt, v, |o| Ok(o.clone().into_raw()))?,
        HostArray::Variant(v) => build(vt, v, |item| {
            Variant::from_host_with(item, dates).map(Variant::detach)
        })?,
    };
    Ok((vt, psa))
}

fn mismatch(expected: ElementKind, found: &HostValue) -> VariantError {
    VariantError::ElementTypeMismatch {
        expected: expected.name(),
        found: found.type_name(),
    }
}

/// Element kind of an enumerable: the declared one, else the first element's.
pub(crate) fn sequence_kind(sequence: &Sequence) -> Result<ElementKind> {
    if let Some(kind) = sequence.element {
        return Ok(kind);
    }
    let first = sequence.items.first().ok_or(VariantError::EmptySequence)?;
    first
        .element_kind()
        .ok_or_else(|| VariantError::UnsupportedType(first.type_name().to_owned()))
}

macro_rules! typed_items {
    ($vt:expr, $kind:expr, $items:expr, $($pat:pat => $out:expr),+ $(,)?) => {
        build($vt, $items, |item| match item {
            $($pat => $out,)+
            other => Err(mismatch($kind, other)),
        })?
    };
}

/// Materializes an enumerable into a SAFEARRAY, checking every element
/// against the sequence's element kind.
pub(crate) fn construct_sequence(
    sequence: &Sequence,
    dates: DateEncoding,
) -> Result<(VarType, *mut RawSafeArray)> {
    let kind = sequence_kind(sequence)?;
    let items = sequence.items.as_slice();
    let vt = match kind {
        ElementKind::Bool => VarType::BOOL,
        ElementKind::I8 => VarType::I1,
        ElementKind::U8 => VarType::UI1,
        ElementKind::I16 => VarType::I2,
        ElementKind::U16 => VarType::UI2,
        ElementKind::I32 => VarType::I4,
        ElementKind::U32 => VarType::UI4,
        ElementKind::I64 => VarType::I8,
        ElementKind::U64 => VarType::UI8,
        ElementKind::F32 => VarType::R4,
        ElementKind::F64 => VarType::R8,
        ElementKind::Char | ElementKind::String | ElementKind::Guid => VarType::BSTR,
        ElementKind::Decimal => VarType::DECIMAL,
        ElementKind::Currency => VarType::CY,
        ElementKind::Error => VarType::ERROR,
        ElementKind::Date => VarType::DATE,
        ElementKind::Object => VarType::UNKNOWN,
        ElementKind::Variant => VarType::VARIANT,
    };
    let psa = match kind {
        ElementKind::Bool => typed_items!(vt, kind, items, HostValue::Bool(b) => Ok(bool_slot(*b))),
        ElementKind::I8 => typed_items!(vt, kind, items, HostValue::I8(v) => Ok(*v)),
        ElementKind::U8 => typed_items!(vt, kind, items, HostValue::U8(v) => Ok(*v)),
        ElementKind::I16 => typed_items!(vt, kind, items, HostValue::I16(v) => Ok(*v)),
        ElementKind::U16 => typed_items!(vt, kind, items, HostValue::U16(v) => Ok(*v)),
        ElementKind::I32 => typed_items!(vt, kind, items, HostValue::I32(v) => Ok(*v)),
        ElementKind::U32 => typed_items!(vt, kind, items, HostValue::U32(v) => Ok(*v)),
        ElementKind::I64 => typed_items!(vt, kind, items, HostValue::I64(v) => Ok(*v)),
        ElementKind::U64 => typed_items!(vt, kind, items, HostValue::U64(v) => Ok(*v)),
        ElementKind::F32 => typed_items!(vt, kind, items, HostValue::F32(v) => Ok(*v)),
        ElementKind::F64 => typed_items!(vt, kind, items, HostValue::F64(v) => Ok(*v)),
        ElementKind::Char => typed_items!(vt, kind, items,
            HostValue::Char(c) => ole::alloc_bstr(c.encode_utf8(&mut [0; 4])),
        ),
        ElementKind::String => typed_items!(vt, kind, items,
            HostValue::String(s) => ole::alloc_bstr(s),
            HostValue::Chars(c) => ole::alloc_bstr(&c.iter().collect::<String>()),
            HostValue::Null => Ok(ptr::null_mut()),
        ),
        ElementKind::Guid => typed_items!(vt, kind, items,
            HostValue::Guid(g) => ole::alloc_bstr(&g.braced()),
        ),
        ElementKind::Decimal => typed_items!(vt, kind, items, HostValue::Decimal(d) => Ok(d.to_raw())),
        ElementKind::Currency => typed_items!(vt, kind, items, HostValue::Currency(v) => Ok(*v)),
        ElementKind::Error => typed_items!(vt, kind, items, HostValue::Error(v) => Ok(*v)),
        ElementKind::Date => typed_items!(vt, kind, items,
            HostValue::Date(d) => date::to_ole_date(*d),
        ),
        ElementKind::Object => typed_items!(vt, kind, items,
            HostValue::Object(o) => Ok(o.clone().into_raw()),
            HostValue::Null => Ok(ptr::null_mut::<c_void>()),
        ),
        ElementKind::Variant => build(vt, items, |item| {
            Variant::from_host_with(item, dates).map(Variant::detach)
        })?,
    };
    Ok((vt, psa))
}

/// Reads `count` slots of `T` from locked array data.
///
/// # Safety
/// `data` must hold at least `count` initialised values of `T`.
unsafe fn slots<'a, T>(data: *mut c_void, count: usize) -> &'a [T] {
    if count == 0 || data.is_null() {
        return &[];
    }
    // SAFETY: forwarded caller contract.
    unsafe { std::slice::from_raw_parts(data.cast::<T>(), count) }
}

/// Decodes a one-dimensional SAFEARRAY of `vt` elements into a fresh host
/// array. The native buffer is left untouched.
///
/// # Safety
/// `psa` must be null or a live SAFEARRAY whose element type is `vt`.
pub(crate) unsafe fn extract(psa: *mut RawSafeArray, vt: VarType) -> Result<HostArray> {
    if psa.is_null() {
        return Err(VariantError::UnsupportedVarType(vt.with_array()));
    }
    // SAFETY: `psa` is live per the caller contract.
    let rank = usize::from(unsafe { (*psa).c_dims });
    if rank != 1 {
        return Err(VariantError::UnsupportedRank(rank));
    }
    // SAFETY: one dimension was checked above.
    let (lower, upper) = unsafe { ole::safe_array_bounds(psa, 1)? };
    let count = usize::try_from(i64::from(upper) - i64::from(lower) + 1).unwrap_or(0);

    // SAFETY: `psa` is live; the lock is released when `lock` drops.
    let lock = unsafe { DataLock::acquire(psa)? };
    let data = lock.data;
    // SAFETY: each arm reads `count` slots of the element type named by `vt`.
    let array = unsafe {
        match vt {
            VarType::I1 => HostArray::I8(slots::<i8>(data, count).to_vec()),
            VarType::UI1 => HostArray::U8(slots::<u8>(data, count).to_vec()),
            VarType::I2 => HostArray::I16(slots::<i16>(data, count).to_vec()),
            VarType::UI2 => HostArray::U16(slots::<u16>(data, count).to_vec()),
            VarType::I4 | VarType::INT => HostArray::I32(slots::<i32>(data, count).to_vec()),
            VarType::UI4 | VarType::UINT => HostArray::U32(slots::<u32>(data, count).to_vec()),
            VarType::I8 => HostArray::I64(slots::<i64>(data, count).to_vec()),
            VarType::UI8 => HostArray::U64(slots::<u64>(data, count).to_vec()),
            VarType::R4 => HostArray::F32(slots::<f32>(data, count).to_vec()),
            VarType::R8 => HostArray::F64(slots::<f64>(data, count).to_vec()),
            VarType::CY => HostArray::Currency(slots::<i64>(data, count).to_vec()),
            VarType::ERROR => HostArray::Error(slots::<i32>(data, count).to_vec()),
            VarType::BOOL => HostArray::Bool(
                slots::<i16>(data, count)
                    .iter()
                    .map(|b| *b != VARIANT_FALSE)
                    .collect(),
            ),
            VarType::DATE => HostArray::Date(
                slots::<f64>(data, count)
                    .iter()
                    .map(|d| date::from_ole_date(*d))
                    .collect::<Result<_>>()?,
            ),
            VarType::BSTR => HostArray::String(
                slots::<*mut u16>(data, count)
                    .iter()
                    .map(|b| ole::read_bstr(*b).unwrap_or_default())
                    .collect(),
            ),
            VarType::DECIMAL => HostArray::Decimal(
                slots::<RawDecimal>(data, count)
                    .iter()
                    .map(|d| Decimal::from_raw(*d))
                    .collect(),
            ),
            VarType::UNKNOWN => HostArray::Object(
                slots::<*mut c_void>(data, count)
                    .iter()
                    .map(|p| ObjectRef::unknown(*p))
                    .collect(),
            ),
            VarType::DISPATCH => HostArray::Object(
                slots::<*mut c_void>(data, count)
                    .iter()
                    .map(|p| ObjectRef::dispatch(*p))
                    .collect(),
            ),
            VarType::VARIANT => HostArray::Variant(
                slots::<RawVariant>(data, count)
                    .iter()
                    .map(variant::decode)
                    .collect::<Result<_>>()?,
            ),
            other => return Err(VariantError::UnsupportedVarType(other.with_array())),
        }
    };
    drop(lock);
    Ok(array)
}

/// Copies a native array's bytes into a host buffer of exactly the same
/// size.
///
/// # Safety
/// `psa` must be a live one-dimensional SAFEARRAY of plain (non-pointer)
/// elements.
pub(crate) unsafe fn copy_bytes(psa: *mut RawSafeArray, out: &mut [u8]) -> Result<()> {
    // SAFETY: forwarded caller contract.
    let (native, lock) = unsafe {
        let (lower, upper) = ole::safe_array_bounds(psa, 1)?;
        let count = usize::try_from(i64::from(upper) - i64::from(lower) + 1).unwrap_or(0);
        (count * (*psa).cb_elements as usize, DataLock::acquire(psa)?)
    };
    if native != out.len() {
        return Err(VariantError::SizeMismatch {
            host: out.len(),
            native,
        });
    }
    // SAFETY: both buffers are `native` bytes long.
    out.copy_from_slice(unsafe { slots::<u8>(lock.data, native) });
    Ok(())
}
