//! Binary-compatible mirrors of the OLE automation structures.
//!
//! Values of these types are handed to the native engine by address, so the
//! layouts must match `oaidl.h` exactly. Nothing here validates anything: the
//! discriminant in [`RawVariant`] decides which union field is meaningful and
//! reading any other field is undefined.

use std::ffi::c_void;
use std::fmt;

/// `VARTYPE`, the 16-bit discriminant of a `VARIANT`.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct VarType(pub u16);

impl VarType {
    pub const EMPTY: Self = Self(0);
    pub const NULL: Self = Self(1);
    pub const I2: Self = Self(2);
    pub const I4: Self = Self(3);
    pub const R4: Self = Self(4);
    pub const R8: Self = Self(5);
    pub const CY: Self = Self(6);
    pub const DATE: Self = Self(7);
    pub const BSTR: Self = Self(8);
    pub const DISPATCH: Self = Self(9);
    pub const ERROR: Self = Self(10);
    pub const BOOL: Self = Self(11);
    pub const VARIANT: Self = Self(12);
    pub const UNKNOWN: Self = Self(13);
    pub const DECIMAL: Self = Self(14);
    pub const I1: Self = Self(16);
    pub const UI1: Self = Self(17);
    pub const UI2: Self = Self(18);
    pub const UI4: Self = Self(19);
    pub const I8: Self = Self(20);
    pub const UI8: Self = Self(21);
    pub const INT: Self = Self(22);
    pub const UINT: Self = Self(23);
    pub const LPSTR: Self = Self(30);
    pub const LPWSTR: Self = Self(31);
    pub const FILETIME: Self = Self(64);
    pub const CLSID: Self = Self(72);
    pub const VECTOR: Self = Self(0x1000);
    pub const ARRAY: Self = Self(0x2000);
    pub const BYREF: Self = Self(0x4000);
    pub const TYPEMASK: Self = Self(0x0fff);

    pub const fn raw(self) -> u16 {
        self.0
    }

    pub const fn is_array(self) -> bool {
        self.0 & Self::ARRAY.0 != 0
    }

    /// The element type with the `ARRAY`/`VECTOR`/`BYREF` modifiers removed.
    pub const fn base(self) -> Self {
        Self(self.0 & Self::TYPEMASK.0)
    }

    #[must_use]
    pub const fn with_array(self) -> Self {
        Self(self.0 | Self::ARRAY.0)
    }

    fn name(self) -> Option<&'static str> {
        Some(match self {
            Self::EMPTY => "VT_EMPTY",
            Self::NULL => "VT_NULL",
            Self::I2 => "VT_I2",
            Self::I4 => "VT_I4",
            Self::R4 => "VT_R4",
            Self::R8 => "VT_R8",
            Self::CY => "VT_CY",
            Self::DATE => "VT_DATE",
            Self::BSTR => "VT_BSTR",
            Self::DISPATCH => "VT_DISPATCH",
            Self::ERROR => "VT_ERROR",
            Self::BOOL => "VT_BOOL",
            Self::VARIANT => "VT_VARIANT",
            Self::UNKNOWN => "VT_UNKNOWN",
            Self::DECIMAL => "VT_DECIMAL",
            Self::I1 => "VT_I1",
            Self::UI1 => "VT_UI1",
            Self::UI2 => "VT_UI2",
            Self::UI4 => "VT_UI4",
            Self::I8 => "VT_I8",
            Self::UI8 => "VT_UI8",
            Self::INT => "VT_INT",
            Self::UINT => "VT_UINT",
            Self::LPSTR => "VT_LPSTR",
            Self::LPWSTR => "VT_LPWSTR",
            Self::FILETIME => "VT_FILETIME",
            Self::CLSID => "VT_CLSID",
            _ => return None,
        })
    }
}

impl fmt::Display for VarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let base = self.base();
        match base.name() {
            Some(name) => f.write_str(name)?,
            None => write!(f, "0x{:04X}", base.0)?,
        }
        if self.0 & Self::VECTOR.0 != 0 {
            f.write_str(" | VT_VECTOR")?;
        }
        if self.is_array() {
            f.write_str(" | VT_ARRAY")?;
        }
        if self.0 & Self::BYREF.0 != 0 {
            f.write_str(" | VT_BYREF")?;
        }
        Ok(())
    }
}

impl fmt::Debug for VarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// `VARIANT_BOOL`: all bits set for true, zero for false.
pub const VARIANT_TRUE: i16 = -1;
pub const VARIANT_FALSE: i16 = 0;

/// `DECIMAL`. Occupies the whole variant; `reserved` aliases the discriminant.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct RawDecimal {
    pub reserved: u16,
    pub scale: u8,
    pub sign: u8,
    pub hi32: u32,
    pub lo64: u64,
}

/// `GUID` with the Windows field split.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct RawGuid {
    pub data1: u32,
    pub data2: u16,
    pub data3: u16,
    pub data4: [u8; 8],
}

#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct RawRecord {
    pub pv_record: *mut c_void,
    pub p_rec_info: *mut c_void,
}

/// The overlapping value fields that follow the discriminant.
#[repr(C)]
#[derive(Clone, Copy)]
pub union RawVariantValue {
    pub ll_val: i64,
    pub l_val: i32,
    pub b_val: u8,
    pub i_val: i16,
    pub flt_val: f32,
    pub dbl_val: f64,
    pub bool_val: i16,
    pub scode: i32,
    pub cy_val: i64,
    pub date: f64,
    pub bstr_val: *mut u16,
    pub punk_val: *mut c_void,
    pub pdisp_val: *mut c_void,
    pub parray: *mut RawSafeArray,
    pub byref: *mut c_void,
    pub c_val: i8,
    pub ui_val: u16,
    pub ul_val: u32,
    pub ull_val: u64,
    pub int_val: i32,
    pub uint_val: u32,
    pub record: RawRecord,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct RawTaggedValue {
    pub vt: VarType,
    pub reserved1: u16,
    pub reserved2: u16,
    pub reserved3: u16,
    pub value: RawVariantValue,
}

/// `VARIANT`.
#[repr(C)]
#[derive(Clone, Copy)]
pub union RawVariant {
    pub tagged: RawTaggedValue,
    pub dec_val: RawDecimal,
}

impl RawVariant {
    /// An all-zero variant, which is `VT_EMPTY`.
    pub const fn zeroed() -> Self {
        Self {
            tagged: RawTaggedValue {
                vt: VarType::EMPTY,
                reserved1: 0,
                reserved2: 0,
                reserved3: 0,
                value: RawVariantValue {
                    record: RawRecord {
                        pv_record: std::ptr::null_mut(),
                        p_rec_info: std::ptr::null_mut(),
                    },
                },
            },
        }
    }

    pub fn vt(&self) -> VarType {
        // SAFETY: the discriminant is the first u16 of both union arms.
        unsafe { self.tagged.vt }
    }

    /// Writes the discriminant without touching the value bytes.
    pub fn set_vt(&mut self, vt: VarType) {
        // SAFETY: as above; writing a Copy field of a repr(C) union is sound.
        unsafe {
            self.tagged.vt = vt;
        }
    }
}

impl Default for RawVariant {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl fmt::Debug for RawVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawVariant").field("vt", &self.vt()).finish_non_exhaustive()
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SafeArrayBound {
    pub c_elements: u32,
    pub l_lbound: i32,
}

/// `SAFEARRAY` descriptor. `rgsabound` is a variable-length trailer with one
/// entry per dimension.
#[repr(C)]
#[derive(Debug)]
pub struct RawSafeArray {
    pub c_dims: u16,
    pub f_features: u16,
    pub cb_elements: u32,
    pub c_locks: u32,
    pub pv_data: *mut c_void,
    pub rgsabound: [SafeArrayBound; 1],
}

pub const FADF_HAVEVARTYPE: u16 = 0x0080;
pub const FADF_BSTR: u16 = 0x0100;
pub const FADF_UNKNOWN: u16 = 0x0200;
pub const FADF_DISPATCH: u16 = 0x0400;
pub const FADF_VARIANT: u16 = 0x0800;

/// Size in bytes of one array slot for the given element type, or `None` when
/// arrays of that type are not supported.
pub fn element_size(vt: VarType) -> Option<usize> {
    Some(match vt {
        VarType::I1 | VarType::UI1 => 1,
        VarType::I2 | VarType::UI2 | VarType::BOOL => 2,
        VarType::I4
        | VarType::UI4
        | VarType::INT
        | VarType::UINT
        | VarType::R4
        | VarType::ERROR => 4,
        VarType::I8 | VarType::UI8 | VarType::R8 | VarType::CY | VarType::DATE => 8,
        VarType::BSTR
        | VarType::LPSTR
        | VarType::LPWSTR
        | VarType::UNKNOWN
        | VarType::DISPATCH => size_of::<*mut c_void>(),
        VarType::DECIMAL => size_of::<RawDecimal>(),
        VarType::VARIANT => size_of::<RawVariant>(),
        _ => return None,
    })
}
