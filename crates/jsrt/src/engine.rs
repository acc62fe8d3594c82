//! The native JsRT entry points, as a trait.
//!
//! Every method maps to one `Js*` function of the hosting API and returns the
//! raw status code on failure. Turning a code into a [`JsError`] (and draining
//! the engine's pending exception) is done by [`check`], never here.
//!
//! [`JsError`]: crate::JsError
//! [`check`]: crate::error::check

use crate::error::JsErrorCode;
use bitflags::bitflags;
use jsrt_variant::Variant;
use std::fmt;

/// An engine-issued handle: runtime, context, value or property id. Zero is
/// the null handle.
pub type RawHandle = usize;

/// Result of a single native call.
pub type Native<T> = std::result::Result<T, JsErrorCode>;

bitflags! {
    /// `JsRuntimeAttributes`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct JsRuntimeAttributes: u32 {
        const DISABLE_BACKGROUND_WORK = 0x0000_0001;
        const ALLOW_SCRIPT_INTERRUPT = 0x0000_0002;
        const ENABLE_IDLE_PROCESSING = 0x0000_0004;
        const DISABLE_NATIVE_CODE_GENERATION = 0x0000_0008;
        const DISABLE_EVAL = 0x0000_0010;
        const ENABLE_EXPERIMENTAL_FEATURES = 0x0000_0020;
        const DISPATCH_SET_EXCEPTIONS_TO_DEBUGGER = 0x0000_0040;
        const DISABLE_FATAL_ON_OOM = 0x0000_0080;
        const DISABLE_EXECUTABLE_PAGE_ALLOCATION = 0x0000_0100;
    }
}

/// `JsRuntimeVersion`
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum JsRuntimeVersion {
    V10 = 0,
    V11 = 1,
    #[default]
    Edge = -1,
}

/// `JsValueType`
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum JsValueType {
    #[default]
    Undefined = 0,
    Null = 1,
    Number = 2,
    String = 3,
    Boolean = 4,
    Object = 5,
    Function = 6,
    Error = 7,
    Array = 8,
    Symbol = 9,
    ArrayBuffer = 10,
    TypedArray = 11,
    DataView = 12,
}

impl JsValueType {
    /// Maps the native discriminant; unknown values read as `Undefined`.
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            1 => Self::Null,
            2 => Self::Number,
            3 => Self::String,
            4 => Self::Boolean,
            5 => Self::Object,
            6 => Self::Function,
            7 => Self::Error,
            8 => Self::Array,
            9 => Self::Symbol,
            10 => Self::ArrayBuffer,
            11 => Self::TypedArray,
            12 => Self::DataView,
            _ => Self::Undefined,
        }
    }
}

impl fmt::Display for JsValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// The JsRT hosting API.
///
/// The engine keeps one process-wide "current context"; everything below
/// `create_context` operates on it implicitly. Implementations must be
/// callable from any thread, but the engine itself rejects calls made on a
/// thread other than the runtime's with [`JsErrorCode::WRONG_THREAD`].
pub trait NativeEngine: Send + Sync {
    fn create_runtime(
        &self,
        attributes: JsRuntimeAttributes,
        version: JsRuntimeVersion,
    ) -> Native<RawHandle>;
    fn dispose_runtime(&self, runtime: RawHandle) -> Native<()>;
    fn collect_garbage(&self, runtime: RawHandle) -> Native<()>;
    fn runtime_memory_usage(&self, runtime: RawHandle) -> Native<usize>;
    /// `-1` means no limit.
    fn runtime_memory_limit(&self, runtime: RawHandle) -> Native<isize>;
    fn set_runtime_memory_limit(&self, runtime: RawHandle, limit: isize) -> Native<()>;
    fn disable_runtime_execution(&self, runtime: RawHandle) -> Native<()>;
    fn enable_runtime_execution(&self, runtime: RawHandle) -> Native<()>;
    fn is_runtime_execution_disabled(&self, runtime: RawHandle) -> Native<bool>;
    /// Returns the tick count of the next scheduled idle call.
    fn idle(&self) -> Native<u32>;

    fn create_context(&self, runtime: RawHandle) -> Native<RawHandle>;
    fn context_runtime(&self, context: RawHandle) -> Native<RawHandle>;
    /// Zero when no context is current.
    fn current_context(&self) -> Native<RawHandle>;
    /// Zero clears the current context.
    fn set_current_context(&self, context: RawHandle) -> Native<()>;

    fn parse_script(&self, script: &str, source_context: usize, source_url: &str)
    -> Native<RawHandle>;
    fn run_script(&self, script: &str, source_context: usize, source_url: &str)
    -> Native<RawHandle>;

    fn property_id(&self, name: &str) -> Native<RawHandle>;
    fn get_property(&self, object: RawHandle, property_id: RawHandle) -> Native<RawHandle>;
    fn set_property(
        &self,
        object: RawHandle,
        property_id: RawHandle,
        value: RawHandle,
        use_strict_rules: bool,
    ) -> Native<()>;
    fn get_indexed_property(&self, object: RawHandle, index: RawHandle) -> Native<RawHandle>;
    fn set_indexed_property(
        &self,
        object: RawHandle,
        index: RawHandle,
        value: RawHandle,
    ) -> Native<()>;
    /// An array value holding the names of the object's own properties.
    fn own_property_names(&self, object: RawHandle) -> Native<RawHandle>;
    fn own_property_descriptor(
        &self,
        object: RawHandle,
        property_id: RawHandle,
    ) -> Native<RawHandle>;
    fn prototype(&self, object: RawHandle) -> Native<RawHandle>;
    /// `arguments[0]` is the `this` value.
    fn call_function(&self, function: RawHandle, arguments: &[RawHandle]) -> Native<RawHandle>;

    fn value_type(&self, value: RawHandle) -> Native<JsValueType>;
    fn value_to_variant(&self, value: RawHandle) -> Native<Variant>;
    fn variant_to_value(&self, variant: &Variant) -> Native<RawHandle>;
    fn convert_value_to_string(&self, value: RawHandle) -> Native<RawHandle>;

    fn global_object(&self) -> Native<RawHandle>;
    fn undefined_value(&self) -> Native<RawHandle>;
    fn null_value(&self) -> Native<RawHandle>;
    fn true_value(&self) -> Native<RawHandle>;
    fn false_value(&self) -> Native<RawHandle>;

    /// Zero when no exception is pending.
    fn get_and_clear_exception(&self) -> Native<RawHandle>;

    /// Returns the new reference count.
    fn add_ref(&self, handle: RawHandle) -> Native<u32>;
    /// Returns the new reference count.
    fn release(&self, handle: RawHandle) -> Native<u32>;
}
