//! # jsrt_variant
//!
//! Conversion between Rust host values and the OLE automation `VARIANT`
//! representation the JsRT engine uses at its boundary.
//!
//! [`HostValue`] is the safe side: a closed enum of everything that can be
//! marshalled. [`Variant`] owns one native `VARIANT` and frees its string and
//! array payloads when dropped. The `#[repr(C)]` mirrors in [`raw`] exist only
//! so variants can be passed to native code by address.
//!
//! ```
//! use jsrt_variant::{HostValue, Variant, VarType};
//!
//! let variant = Variant::from_host(&HostValue::from(vec!["a", "b"])).unwrap();
//! assert_eq!(variant.var_type(), VarType::BSTR.with_array());
//! assert_eq!(
//!     variant.to_host().unwrap(),
//!     HostValue::from(vec!["a".to_string(), "b".to_string()])
//! );
//! ```

mod array;
mod convert;
pub mod date;
mod error;
mod host;
mod ole;
pub mod raw;
mod variant;

pub use convert::FromHost;
pub use error::{Result, VariantError};
pub use host::{
    Decimal, ElementKind, Guid, HostArray, HostValue, NdArray, ObjectRef, RawPointer, Sequence,
};
pub use raw::{RawVariant, VarType};
pub use variant::{DateEncoding, Variant};

#[cfg(test)]
mod tests;
