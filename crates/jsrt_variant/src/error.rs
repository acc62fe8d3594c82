//! Error types for VARIANT marshalling

use crate::raw::VarType;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, VariantError>;

/// Error type for conversions between host values and VARIANTs
#[derive(Debug, Clone, PartialEq, Error)]
pub enum VariantError {
    /// The host value kind has no VARIANT representation in this position
    #[error("Value of type '{0}' is not supported.")]
    UnsupportedType(String),

    /// A VARIANT carried a discriminant this layer does not decode
    #[error("Value of property type {0} is not supported.")]
    UnsupportedVarType(VarType),

    /// Only one-dimensional arrays can be marshalled
    #[error("Arrays of rank {0} are not supported, only one-dimensional arrays are.")]
    UnsupportedRank(usize),

    /// A rank-one array whose declared length differs from its element count
    #[error("Array shape [{shape}] does not match its {len} elements.")]
    ShapeMismatch { shape: usize, len: usize },

    /// An enumerable had neither a declared element kind nor a first element
    #[error("Enumerable element type cannot be determined from an empty sequence.")]
    EmptySequence,

    /// An element did not match the element kind of its sequence
    #[error("Sequence element of kind '{found}' does not match element kind '{expected}'.")]
    ElementTypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// Bulk copies require host and native element sizes to agree exactly
    #[error("Array byte size mismatch: host has {host} bytes, native array has {native} bytes.")]
    SizeMismatch { host: usize, native: usize },

    /// The value is outside the OLE automation date range
    #[error("OLE automation date {0} is out of range.")]
    DateOutOfRange(f64),

    /// A date/time cannot be represented as an OLE automation date
    #[error("Date '{0}' cannot be represented as an OLE automation date.")]
    UnrepresentableDate(String),

    /// Native allocation of a string or array failed
    #[error("Out of memory while allocating a native {0}.")]
    OutOfMemory(&'static str),

    /// An OLE automation call reported a failure HRESULT
    #[error("OLE automation call {call} failed with HRESULT 0x{hresult:08X}.")]
    Ole { call: &'static str, hresult: u32 },
}

/// Maps an HRESULT to `Ok(())` when it signals success.
pub(crate) fn check_hresult(call: &'static str, hr: i32) -> Result<()> {
    if hr < 0 {
        return Err(VariantError::Ole {
            call,
            hresult: hr as u32,
        });
    }
    Ok(())
}
