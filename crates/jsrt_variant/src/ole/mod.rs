//! OLE automation memory management.
//!
//! BSTRs, SAFEARRAYs and VARIANT payloads must be allocated and freed by the
//! same allocator the engine uses. On Windows that is `oleaut32`; elsewhere a
//! portable implementation with the identical binary layout stands in so the
//! marshalling code behaves the same on every platform.

use crate::error::{Result, VariantError, check_hresult};
use crate::raw::{RawSafeArray, RawVariant, SafeArrayBound, VarType};
use std::ffi::c_void;

#[cfg(not(windows))]
mod portable;
#[cfg(not(windows))]
use portable as sys;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
use windows as sys;

/// Allocates a BSTR holding `text`.
pub(crate) fn alloc_bstr(text: &str) -> Result<*mut u16> {
    let wide: Vec<u16> = text.encode_utf16().collect();
    // SAFETY: `wide` is a valid buffer of exactly `wide.len()` code units.
    let bstr = unsafe { sys::sys_alloc_string_len(wide.as_ptr(), wide.len() as u32) };
    if bstr.is_null() {
        return Err(VariantError::OutOfMemory("BSTR"));
    }
    Ok(bstr)
}

/// Decodes a BSTR using its length prefix. Null decodes to `None`.
///
/// # Safety
/// `bstr` must be null or point just past a valid 4-byte length prefix.
pub(crate) unsafe fn read_bstr(bstr: *const u16) -> Option<String> {
    if bstr.is_null() {
        return None;
    }
    // SAFETY: a BSTR is preceded by its byte length as a u32.
    let units = unsafe {
        let byte_len = bstr.cast::<u32>().sub(1).read_unaligned();
        std::slice::from_raw_parts(bstr, byte_len as usize / 2)
    };
    Some(String::from_utf16_lossy(units))
}

/// Decodes a NUL-terminated UTF-16 string.
///
/// # Safety
/// `ptr` must be null or point at a NUL-terminated UTF-16 buffer.
pub(crate) unsafe fn read_lpwstr(ptr: *const u16) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    let mut len = 0;
    // SAFETY: the buffer is NUL-terminated, so every read up to it is in bounds.
    unsafe {
        while *ptr.add(len) != 0 {
            len += 1;
        }
        Some(String::from_utf16_lossy(std::slice::from_raw_parts(ptr, len)))
    }
}

/// Decodes a NUL-terminated narrow string.
///
/// # Safety
/// `ptr` must be null or point at a NUL-terminated byte buffer.
pub(crate) unsafe fn read_lpstr(ptr: *const u8) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    // SAFETY: forwarded caller contract.
    let text = unsafe { std::ffi::CStr::from_ptr(ptr.cast()) };
    Some(text.to_string_lossy().into_owned())
}

/// The first three slots every COM vtable starts with.
#[repr(C)]
struct IUnknownVtbl {
    _query_interface:
        unsafe extern "system" fn(*mut c_void, *const c_void, *mut *mut c_void) -> i32,
    add_ref: unsafe extern "system" fn(*mut c_void) -> u32,
    release: unsafe extern "system" fn(*mut c_void) -> u32,
}

/// `IUnknown::AddRef`. Null is ignored.
///
/// # Safety
/// `object` must be null or a live COM interface pointer.
pub(crate) unsafe fn add_ref(object: *mut c_void) -> u32 {
    if object.is_null() {
        return 0;
    }
    // SAFETY: a COM interface pointer points at its vtable pointer.
    unsafe {
        let vtbl = *object.cast::<*const IUnknownVtbl>();
        ((*vtbl).add_ref)(object)
    }
}

/// `IUnknown::Release`. Null is ignored.
///
/// # Safety
/// `object` must be null or a live COM interface pointer the caller holds a
/// reference on.
pub(crate) unsafe fn release(object: *mut c_void) -> u32 {
    if object.is_null() {
        return 0;
    }
    // SAFETY: a COM interface pointer points at its vtable pointer.
    unsafe {
        let vtbl = *object.cast::<*const IUnknownVtbl>();
        ((*vtbl).release)(object)
    }
}

/// Creates a zero-filled one-dimensional SAFEARRAY with lower bound 0.
pub(crate) fn safe_array_create(vt: VarType, len: u32) -> Result<*mut RawSafeArray> {
    let bound = SafeArrayBound {
        c_elements: len,
        l_lbound: 0,
    };
    // SAFETY: `bound` outlives the call and describes exactly one dimension.
    let psa = unsafe { sys::safe_array_create(vt.raw(), 1, &raw const bound) };
    if psa.is_null() {
        return Err(VariantError::OutOfMemory("SAFEARRAY"));
    }
    Ok(psa)
}

/// # Safety
/// `psa` must be a live, unlocked SAFEARRAY that nothing else owns.
pub(crate) unsafe fn safe_array_destroy(psa: *mut RawSafeArray) -> Result<()> {
    // SAFETY: forwarded caller contract.
    check_hresult("SafeArrayDestroy", unsafe { sys::safe_array_destroy(psa) })
}

/// # Safety
/// `psa` must be a live SAFEARRAY.
pub(crate) unsafe fn safe_array_access_data(psa: *mut RawSafeArray) -> Result<*mut c_void> {
    let mut data = std::ptr::null_mut();
    // SAFETY: forwarded caller contract, `data` is a valid out slot.
    let hr = unsafe { sys::safe_array_access_data(psa, &raw mut data) };
    check_hresult("SafeArrayAccessData", hr)?;
    Ok(data)
}

/// # Safety
/// `psa` must be a live SAFEARRAY locked by [`safe_array_access_data`].
pub(crate) unsafe fn safe_array_unaccess_data(psa: *mut RawSafeArray) -> Result<()> {
    // SAFETY: forwarded caller contract.
    check_hresult("SafeArrayUnaccessData", unsafe {
        sys::safe_array_unaccess_data(psa)
    })
}

/// Inclusive lower and upper bound of dimension `dim` (1-based).
///
/// # Safety
/// `psa` must be a live SAFEARRAY with at least `dim` dimensions.
pub(crate) unsafe fn safe_array_bounds(psa: *mut RawSafeArray, dim: u32) -> Result<(i32, i32)> {
    let mut lower = 0;
    let mut upper = 0;
    // SAFETY: forwarded caller contract, out slots are valid.
    unsafe {
        check_hresult(
            "SafeArrayGetLBound",
            sys::safe_array_get_lbound(psa, dim, &raw mut lower),
        )?;
        check_hresult(
            "SafeArrayGetUBound",
            sys::safe_array_get_ubound(psa, dim, &raw mut upper),
        )?;
    }
    Ok((lower, upper))
}

/// Frees whatever the variant owns and resets it to `VT_EMPTY`.
///
/// # Safety
/// `variant` must point at an initialised VARIANT whose payload is owned.
pub(crate) unsafe fn variant_clear(variant: *mut RawVariant) -> Result<()> {
    // SAFETY: forwarded caller contract.
    check_hresult("VariantClear", unsafe { sys::variant_clear(variant) })
}

/// Deep-copies `src` into `dest`, which must be empty.
///
/// # Safety
/// Both pointers must reference initialised VARIANTs.
pub(crate) unsafe fn variant_copy(dest: *mut RawVariant, src: *const RawVariant) -> Result<()> {
    // SAFETY: forwarded caller contract.
    check_hresult("VariantCopy", unsafe { sys::variant_copy(dest, src) })
}

/// Coerces `src` into `vt`, writing the result to `dest`.
///
/// # Safety
/// Both pointers must reference initialised VARIANTs.
pub(crate) unsafe fn variant_change_type(
    dest: *mut RawVariant,
    src: *const RawVariant,
    vt: VarType,
) -> Result<()> {
    // SAFETY: forwarded caller contract.
    check_hresult("VariantChangeType", unsafe {
        sys::variant_change_type(dest, src, 0, vt.raw())
    })
}
