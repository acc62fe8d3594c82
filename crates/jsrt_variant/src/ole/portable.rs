//! Heap-backed stand-ins for the `oleaut32` allocation routines.
//!
//! Layouts follow the native ones: a BSTR is preceded by its byte length and
//! followed by a NUL unit, a SAFEARRAY is a descriptor pointing at a separate
//! zero-filled data block, and the `FADF_*` feature bits decide which element
//! payloads are freed on destroy. Interface pointers are released and
//! add-ref'd through their vtables, as `oleaut32` does.

use super::{add_ref, release};
use crate::raw::{
    FADF_BSTR, FADF_DISPATCH, FADF_HAVEVARTYPE, FADF_UNKNOWN, FADF_VARIANT, RawSafeArray,
    RawVariant, SafeArrayBound, VarType, element_size,
};
use std::alloc::{Layout, alloc_zeroed, dealloc};
use std::ffi::c_void;
use std::ptr;

const S_OK: i32 = 0;
const E_INVALIDARG: i32 = 0x8007_0057_u32 as i32;
const E_NOTIMPL: i32 = 0x8000_4001_u32 as i32;
const DISP_E_ARRAYISLOCKED: i32 = 0x8002_000D_u32 as i32;
const DISP_E_BADINDEX: i32 = 0x8002_000B_u32 as i32;
const E_UNEXPECTED: i32 = 0x8000_FFFF_u32 as i32;

const PREFIX: usize = size_of::<u32>();
const DATA_ALIGN: usize = 16;

fn bstr_layout(units: usize) -> Option<Layout> {
    Layout::from_size_align(PREFIX + (units + 1) * 2, align_of::<u32>()).ok()
}

pub(super) unsafe fn sys_alloc_string_len(text: *const u16, len: u32) -> *mut u16 {
    let Some(layout) = bstr_layout(len as usize) else {
        return ptr::null_mut();
    };
    // SAFETY: the layout has non-zero size.
    let base = unsafe { alloc_zeroed(layout) };
    if base.is_null() {
        return ptr::null_mut();
    }
    // SAFETY: `base` has room for the prefix, `len` units and the terminator.
    unsafe {
        base.cast::<u32>().write(len * 2);
        let units = base.add(PREFIX).cast::<u16>();
        if !text.is_null() {
            ptr::copy_nonoverlapping(text, units, len as usize);
        }
        units
    }
}

pub(super) unsafe fn sys_free_string(bstr: *mut u16) {
    if bstr.is_null() {
        return;
    }
    // SAFETY: `bstr` came from `sys_alloc_string_len`, so the prefix precedes it.
    unsafe {
        let base = bstr.cast::<u8>().sub(PREFIX);
        let units = base.cast::<u32>().read() as usize / 2;
        if let Some(layout) = bstr_layout(units) {
            dealloc(base, layout);
        }
    }
}

fn features_for(vt: VarType) -> u16 {
    match vt {
        VarType::BSTR => FADF_BSTR | FADF_HAVEVARTYPE,
        VarType::VARIANT => FADF_VARIANT | FADF_HAVEVARTYPE,
        VarType::UNKNOWN => FADF_UNKNOWN | FADF_HAVEVARTYPE,
        VarType::DISPATCH => FADF_DISPATCH | FADF_HAVEVARTYPE,
        _ => FADF_HAVEVARTYPE,
    }
}

fn data_layout(psa: &RawSafeArray) -> Option<Layout> {
    let size = psa.cb_elements as usize * psa.rgsabound[0].c_elements as usize;
    if size == 0 {
        return None;
    }
    Layout::from_size_align(size, DATA_ALIGN).ok()
}

pub(super) unsafe fn safe_array_create(
    vt: u16,
    dims: u32,
    bounds: *const SafeArrayBound,
) -> *mut RawSafeArray {
    let vt = VarType(vt);
    let Some(cb_elements) = element_size(vt) else {
        return ptr::null_mut();
    };
    if dims != 1 || bounds.is_null() || matches!(vt, VarType::LPSTR | VarType::LPWSTR) {
        return ptr::null_mut();
    }
    // SAFETY: caller passes one bound.
    let bound = unsafe { *bounds };
    let mut descriptor = Box::new(RawSafeArray {
        c_dims: 1,
        f_features: features_for(vt),
        cb_elements: cb_elements as u32,
        c_locks: 0,
        pv_data: ptr::null_mut(),
        rgsabound: [bound],
    });
    if let Some(layout) = data_layout(&descriptor) {
        // SAFETY: the layout has non-zero size.
        let data = unsafe { alloc_zeroed(layout) };
        if data.is_null() {
            return ptr::null_mut();
        }
        descriptor.pv_data = data.cast();
    }
    Box::into_raw(descriptor)
}

pub(super) unsafe fn safe_array_destroy(psa: *mut RawSafeArray) -> i32 {
    if psa.is_null() {
        return E_INVALIDARG;
    }
    // SAFETY: `psa` came from `safe_array_create`.
    let descriptor = unsafe { &mut *psa };
    if descriptor.c_locks > 0 {
        return DISP_E_ARRAYISLOCKED;
    }
    let count = descriptor.rgsabound[0].c_elements as usize;
    if !descriptor.pv_data.is_null() {
        // SAFETY: the data block holds `count` initialised slots.
        unsafe {
            if descriptor.f_features & FADF_BSTR != 0 {
                let slots = descriptor.pv_data.cast::<*mut u16>();
                for i in 0..count {
                    sys_free_string(*slots.add(i));
                }
            } else if descriptor.f_features & FADF_VARIANT != 0 {
                let slots = descriptor.pv_data.cast::<RawVariant>();
                for i in 0..count {
                    variant_clear(slots.add(i));
                }
            } else if descriptor.f_features & (FADF_UNKNOWN | FADF_DISPATCH) != 0 {
                let slots = descriptor.pv_data.cast::<*mut c_void>();
                for i in 0..count {
                    release(*slots.add(i));
                }
            }
        }
        if let Some(layout) = data_layout(descriptor) {
            // SAFETY: allocated in `safe_array_create` with this layout.
            unsafe { dealloc(descriptor.pv_data.cast(), layout) };
        }
    }
    // SAFETY: reclaims the Box leaked by `safe_array_create`.
    drop(unsafe { Box::from_raw(psa) });
    S_OK
}

pub(super) unsafe fn safe_array_access_data(psa: *mut RawSafeArray, data: *mut *mut c_void) -> i32 {
    if psa.is_null() || data.is_null() {
        return E_INVALIDARG;
    }
    // SAFETY: checked non-null above.
    unsafe {
        (*psa).c_locks += 1;
        *data = (*psa).pv_data;
    }
    S_OK
}

pub(super) unsafe fn safe_array_unaccess_data(psa: *mut RawSafeArray) -> i32 {
    if psa.is_null() {
        return E_INVALIDARG;
    }
    // SAFETY: checked non-null above.
    let descriptor = unsafe { &mut *psa };
    if descriptor.c_locks == 0 {
        return E_UNEXPECTED;
    }
    descriptor.c_locks -= 1;
    S_OK
}

pub(super) unsafe fn safe_array_get_lbound(psa: *mut RawSafeArray, dim: u32, lower: *mut i32) -> i32 {
    if psa.is_null() || lower.is_null() {
        return E_INVALIDARG;
    }
    // SAFETY: checked non-null above.
    unsafe {
        if dim != 1 || (*psa).c_dims != 1 {
            return DISP_E_BADINDEX;
        }
        *lower = (*psa).rgsabound[0].l_lbound;
    }
    S_OK
}

pub(super) unsafe fn safe_array_get_ubound(psa: *mut RawSafeArray, dim: u32, upper: *mut i32) -> i32 {
    if psa.is_null() || upper.is_null() {
        return E_INVALIDARG;
    }
    // SAFETY: checked non-null above.
    unsafe {
        if dim != 1 || (*psa).c_dims != 1 {
            return DISP_E_BADINDEX;
        }
        let bound = (*psa).rgsabound[0];
        *upper = bound.l_lbound + bound.c_elements as i32 - 1;
    }
    S_OK
}

pub(super) unsafe fn variant_clear(variant: *mut RawVariant) -> i32 {
    if variant.is_null() {
        return E_INVALIDARG;
    }
    // SAFETY: caller guarantees an initialised variant.
    let v = unsafe { &mut *variant };
    let vt = v.vt();
    if vt.raw() & VarType::BYREF.raw() == 0 {
        // SAFETY: the discriminant selects the field read below.
        unsafe {
            if vt.is_array() {
                let psa = v.tagged.value.parray;
                if !psa.is_null() {
                    let hr = safe_array_destroy(psa);
                    if hr < 0 {
                        return hr;
                    }
                }
            } else if vt == VarType::BSTR {
                sys_free_string(v.tagged.value.bstr_val);
            } else if matches!(vt, VarType::UNKNOWN | VarType::DISPATCH) {
                release(v.tagged.value.punk_val);
            }
        }
    }
    *v = RawVariant::zeroed();
    S_OK
}

pub(super) unsafe fn variant_copy(dest: *mut RawVariant, src: *const RawVariant) -> i32 {
    if dest.is_null() || src.is_null() {
        return E_INVALIDARG;
    }
    // SAFETY: both pointers reference initialised variants.
    unsafe {
        let hr = variant_clear(dest);
        if hr < 0 {
            return hr;
        }
        let source = *src;
        let vt = source.vt();
        let mut copy = source;
        if vt.is_array() {
            let psa = source.tagged.value.parray;
            if !psa.is_null() {
                let cloned = copy_array(psa, vt.base());
                if cloned.is_null() {
                    return E_INVALIDARG;
                }
                copy.tagged.value.parray = cloned;
            }
        } else if vt == VarType::BSTR {
            let bstr = source.tagged.value.bstr_val;
            if !bstr.is_null() {
                let units = bstr.cast::<u32>().sub(1).read() / 2;
                copy.tagged.value.bstr_val = sys_alloc_string_len(bstr, units);
            }
        } else if matches!(vt, VarType::UNKNOWN | VarType::DISPATCH) {
            add_ref(source.tagged.value.punk_val);
        }
        *dest = copy;
    }
    S_OK
}

unsafe fn copy_array(psa: *mut RawSafeArray, vt: VarType) -> *mut RawSafeArray {
    // SAFETY: `psa` is a live array created by `safe_array_create`.
    unsafe {
        let source = &*psa;
        let bound = source.rgsabound[0];
        let copy = safe_array_create(vt.raw(), 1, &raw const bound);
        if copy.is_null() || source.pv_data.is_null() {
            return copy;
        }
        let count = bound.c_elements as usize;
        let target = (*copy).pv_data;
        if vt == VarType::BSTR {
            let from = source.pv_data.cast::<*mut u16>();
            let to = target.cast::<*mut u16>();
            for i in 0..count {
                let bstr = *from.add(i);
                if !bstr.is_null() {
                    let units = bstr.cast::<u32>().sub(1).read() / 2;
                    *to.add(i) = sys_alloc_string_len(bstr, units);
                }
            }
        } else if vt == VarType::VARIANT {
            let from = source.pv_data.cast::<RawVariant>();
            let to = target.cast::<RawVariant>();
            for i in 0..count {
                variant_copy(to.add(i), from.add(i));
            }
        } else if matches!(vt, VarType::UNKNOWN | VarType::DISPATCH) {
            let from = source.pv_data.cast::<*mut c_void>();
            let to = target.cast::<*mut c_void>();
            for i in 0..count {
                let object = *from.add(i);
                add_ref(object);
                *to.add(i) = object;
            }
        } else {
            ptr::copy_nonoverlapping(
                source.pv_data.cast::<u8>(),
                target.cast::<u8>(),
                count * source.cb_elements as usize,
            );
        }
        copy
    }
}

pub(super) unsafe fn variant_change_type(
    _dest: *mut RawVariant,
    _src: *const RawVariant,
    _flags: u16,
    _vt: u16,
) -> i32 {
    E_NOTIMPL
}
