//! `oleaut32` through `windows-sys`. The `raw` mirrors share the native
//! layouts, so pointers are only re-typed on the way through.

use crate::raw::{RawSafeArray, RawVariant, SafeArrayBound};
use std::ffi::c_void;
use windows_sys::Win32::Foundation::SysAllocStringLen;
use windows_sys::Win32::System::Ole::{
    SafeArrayAccessData, SafeArrayCreate, SafeArrayDestroy, SafeArrayGetLBound,
    SafeArrayGetUBound, SafeArrayUnaccessData,
};
use windows_sys::Win32::System::Variant::{VariantChangeType, VariantClear, VariantCopy};

// SAFETY (all functions below): callers uphold the `oleaut32` contract for
// each call, see the wrappers in `ole`.

pub(super) unsafe fn sys_alloc_string_len(text: *const u16, len: u32) -> *mut u16 {
    unsafe { SysAllocStringLen(text, len) }.cast_mut()
}

pub(super) unsafe fn safe_array_create(
    vt: u16,
    dims: u32,
    bounds: *const SafeArrayBound,
) -> *mut RawSafeArray {
    unsafe { SafeArrayCreate(vt, dims, bounds.cast()) }.cast()
}

pub(super) unsafe fn safe_array_destroy(psa: *mut RawSafeArray) -> i32 {
    unsafe { SafeArrayDestroy(psa.cast()) }
}

pub(super) unsafe fn safe_array_access_data(psa: *mut RawSafeArray, data: *mut *mut c_void) -> i32 {
    unsafe { SafeArrayAccessData(psa.cast(), data) }
}

pub(super) unsafe fn safe_array_unaccess_data(psa: *mut RawSafeArray) -> i32 {
    unsafe { SafeArrayUnaccessData(psa.cast()) }
}

pub(super) unsafe fn safe_array_get_lbound(psa: *mut RawSafeArray, dim: u32, lower: *mut i32) -> i32 {
    unsafe { SafeArrayGetLBound(psa.cast(), dim, lower) }
}

pub(super) unsafe fn safe_array_get_ubound(psa: *mut RawSafeArray, dim: u32, upper: *mut i32) -> i32 {
    unsafe { SafeArrayGetUBound(psa.cast(), dim, upper) }
}

pub(super) unsafe fn variant_clear(variant: *mut RawVariant) -> i32 {
    unsafe { VariantClear(variant.cast()) }
}

pub(super) unsafe fn variant_copy(dest: *mut RawVariant, src: *const RawVariant) -> i32 {
    unsafe { VariantCopy(dest.cast(), src.cast()) }
}

pub(super) unsafe fn variant_change_type(
    dest: *mut RawVariant,
    src: *const RawVariant,
    flags: u16,
    vt: u16,
) -> i32 {
    unsafe { VariantChangeType(dest.cast(), src.cast(), flags, vt) }
}
