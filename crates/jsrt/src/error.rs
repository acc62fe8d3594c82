//! Error types for the JsRT bindings

use crate::engine::{Native, NativeEngine, RawHandle};
use jsrt_variant::{FromHost, HostValue, VariantError};
use log::{debug, warn};
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, JsError>;

/// `JsErrorCode`, the status returned by every hosting API call.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct JsErrorCode(pub u32);

macro_rules! error_codes {
    ($($name:ident = $value:literal, $native:literal, $text:literal;)*) => {
        impl JsErrorCode {
            $(pub const $name: Self = Self($value);)*

            /// Native constant name, e.g. `JsErrorScriptCompile`.
            pub fn name(self) -> Option<&'static str> {
                match self {
                    $(Self::$name => Some($native),)*
                    _ => None,
                }
            }

            /// Fixed human-readable description of the code.
            pub fn description(self) -> &'static str {
                match self {
                    $(Self::$name => $text,)*
                    _ => "An unknown error in the engine has occurred.",
                }
            }
        }
    };
}

error_codes! {
    NO_ERROR = 0, "JsNoError", "Success error code.";
    CATEGORY_USAGE = 0x10000, "JsErrorCategoryUsage",
        "Category of errors that relates to incorrect usage of the API itself.";
    INVALID_ARGUMENT = 0x10001, "JsErrorInvalidArgument",
        "An argument to a hosting API was invalid.";
    NULL_ARGUMENT = 0x10002, "JsErrorNullArgument",
        "An argument to a hosting API was null in a context where null is not allowed.";
    NO_CURRENT_CONTEXT = 0x10003, "JsErrorNoCurrentContext",
        "The hosting API requires that a context be current, but there is no current context.";
    IN_EXCEPTION_STATE = 0x10004, "JsErrorInExceptionState",
        "The engine is in an exception state and no APIs can be called until the exception is cleared.";
    NOT_IMPLEMENTED = 0x10005, "JsErrorNotImplemented",
        "A hosting API is not yet implemented.";
    WRONG_THREAD = 0x10006, "JsErrorWrongThread",
        "A hosting API was called on the wrong thread.";
    RUNTIME_IN_USE = 0x10007, "JsErrorRuntimeInUse",
        "A runtime that is still in use cannot be disposed.";
    BAD_SERIALIZED_SCRIPT = 0x10008, "JsErrorBadSerializedScript",
        "A bad serialized script was used, or the serialized script was serialized by a different version of the Chakra engine.";
    IN_DISABLED_STATE = 0x10009, "JsErrorInDisabledState",
        "The runtime is in a disabled state.";
    CANNOT_DISABLE_EXECUTION = 0x1000A, "JsErrorCannotDisableExecution",
        "Runtime does not support reliable script interruption.";
    HEAP_ENUM_IN_PROGRESS = 0x1000B, "JsErrorHeapEnumInProgress",
        "A heap enumeration is currently underway in the script context.";
    ARGUMENT_NOT_OBJECT = 0x1000C, "JsErrorArgumentNotObject",
        "A hosting API that operates on object values was called with a non-object value.";
    IN_PROFILE_CALLBACK = 0x1000D, "JsErrorInProfileCallback",
        "A script context is in the middle of a profile callback.";
    IN_THREAD_SERVICE_CALLBACK = 0x1000E, "JsErrorInThreadServiceCallback",
        "A thread service callback is currently underway.";
    CANNOT_SERIALIZE_DEBUG_SCRIPT = 0x1000F, "JsErrorCannotSerializeDebugScript",
        "Scripts cannot be serialized in debug contexts.";
    ALREADY_DEBUGGING_CONTEXT = 0x10010, "JsErrorAlreadyDebuggingContext",
        "The context cannot be put into a debug state because it is already in a debug state.";
    ALREADY_PROFILING_CONTEXT = 0x10011, "JsErrorAlreadyProfilingContext",
        "The context cannot start profiling because it is already profiling.";
    IDLE_NOT_ENABLED = 0x10012, "JsErrorIdleNotEnabled",
        "Idle notification given when the host did not enable idle processing.";
    CANNOT_SET_PROJECTION_ENQUEUE_CALLBACK = 0x10013, "JsCannotSetProjectionEnqueueCallback",
        "The context did not accept the enqueue callback.";
    CANNOT_START_PROJECTION = 0x10014, "JsErrorCannotStartProjection",
        "Failed to start projection.";
    IN_OBJECT_BEFORE_COLLECT_CALLBACK = 0x10015, "JsErrorInObjectBeforeCollectCallback",
        "The operation is not supported in an object before collect callback.";
    OBJECT_NOT_INSPECTABLE = 0x10016, "JsErrorObjectNotInspectable",
        "Object cannot be unwrapped to IInspectable pointer.";
    PROPERTY_NOT_SYMBOL = 0x10017, "JsErrorPropertyNotSymbol",
        "A hosting API that operates on symbol property ids but was called with a non-symbol property id.";
    PROPERTY_NOT_STRING = 0x10018, "JsErrorPropertyNotString",
        "A hosting API that operates on string property ids but was called with a non-string property id.";
    CATEGORY_ENGINE = 0x20000, "JsErrorCategoryEngine",
        "Category of errors that relates to errors occurring within the engine itself.";
    OUT_OF_MEMORY = 0x20001, "JsErrorOutOfMemory",
        "The Chakra engine has run out of memory.";
    CATEGORY_SCRIPT = 0x30000, "JsErrorCategoryScript",
        "Category of errors that relates to errors in a script.";
    SCRIPT_EXCEPTION = 0x30001, "JsErrorScriptException",
        "A JavaScript exception occurred while running a script.";
    SCRIPT_COMPILE = 0x30002, "JsErrorScriptCompile",
        "JavaScript failed to compile.";
    SCRIPT_TERMINATED = 0x30003, "JsErrorScriptTerminated",
        "A script was terminated due to a request to suspend a runtime.";
    SCRIPT_EVAL_DISABLED = 0x30004, "JsErrorScriptEvalDisabled",
        "A script was terminated because it tried to use 'eval' or 'function' and eval was disabled.";
    CATEGORY_FATAL = 0x40000, "JsErrorCategoryFatal",
        "Category of errors that are fatal and signify failure of the engine";
    FATAL = 0x40001, "JsErrorFatal",
        "A fatal error in the engine has occurred.";
    WRONG_RUNTIME = 0x40002, "JsErrorWrongRuntime",
        "A hosting API was called with object created on different javascript runtime.";
}

impl JsErrorCode {
    pub fn is_error(self) -> bool {
        self != Self::NO_ERROR
    }

    /// The category encoded in the high bits, `None` for success.
    pub fn category(self) -> Option<ErrorCategory> {
        match self.0 & 0xFFFF_0000 {
            0x10000 => Some(ErrorCategory::Usage),
            0x20000 => Some(ErrorCategory::Engine),
            0x30000 => Some(ErrorCategory::Script),
            0x40000 => Some(ErrorCategory::Fatal),
            _ if self.is_error() => Some(ErrorCategory::Unknown),
            _ => None,
        }
    }
}

impl fmt::Display for JsErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{name} (0x{:05X})", self.0),
            None => write!(f, "0x{:05X}", self.0),
        }
    }
}

impl fmt::Debug for JsErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Broad classes of engine failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// The hosting API was misused
    Usage,
    /// The engine itself failed, e.g. ran out of memory
    Engine,
    /// Compile errors, uncaught exceptions, termination
    Script,
    /// Unrecoverable engine state
    Fatal,
    Unknown,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Usage => "usage",
            Self::Engine => "engine",
            Self::Script => "script",
            Self::Fatal => "fatal",
            Self::Unknown => "unknown",
        })
    }
}

/// A failed native call, with whatever the engine's pending exception said
/// about it.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{}", self.message())]
pub struct EngineError {
    pub code: JsErrorCode,
    /// The exception's `message` property
    pub script_message: Option<String>,
    /// `-1` when unknown
    pub line: i32,
    /// `-1` when unknown
    pub column: i32,
    /// Excerpt of the offending script text, empty when unknown
    pub source_code: String,
}

impl EngineError {
    /// An error carrying only a status code.
    pub fn new(code: JsErrorCode) -> Self {
        Self {
            code,
            script_message: None,
            line: -1,
            column: -1,
            source_code: String::new(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        self.code.category().unwrap_or(ErrorCategory::Unknown)
    }

    /// Description, script message, line, column and source excerpt, in that
    /// order, each only when known.
    pub fn message(&self) -> String {
        let mut text = self.code.description().to_owned();
        if let Some(message) = self.script_message.as_deref().filter(|m| !m.is_empty()) {
            text.push(' ');
            text.push_str(message);
        }
        if self.line >= 0 {
            text.push_str(&format!(" at line {}", self.line));
        }
        if self.column >= 0 {
            text.push_str(&format!(", column {}", self.column));
        }
        if !self.source_code.is_empty() {
            text.push_str(&format!(", in text \"{}\"", self.source_code));
        }
        text
    }
}

/// Error type for the JsRT bindings
#[derive(Debug, Error)]
pub enum JsError {
    /// A native call returned a failure code
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// A value could not be marshalled across the boundary
    #[error(transparent)]
    Conversion(#[from] VariantError),

    /// The handle wrapper has already released its handle
    #[error("Cannot access a disposed object.")]
    Disposed,

    /// An operation needs a current context and none is set
    #[error("No active JavaScript context.")]
    NoCurrentContext,

    /// A caller-supplied argument was rejected before reaching the engine
    #[error("Invalid argument: {0}")]
    InvalidArgument(&'static str),
}

impl JsError {
    /// The native status code, for engine failures.
    pub fn code(&self) -> Option<JsErrorCode> {
        match self {
            Self::Engine(e) => Some(e.code),
            _ => None,
        }
    }

    pub fn category(&self) -> Option<ErrorCategory> {
        match self {
            Self::Engine(e) => Some(e.category()),
            _ => None,
        }
    }

    /// The engine error, when this is one.
    pub fn as_engine(&self) -> Option<&EngineError> {
        match self {
            Self::Engine(e) => Some(e),
            _ => None,
        }
    }
}

/// Turns a native status into a [`JsError`], draining the engine's pending
/// exception into the error's details.
///
/// Every native call in this crate goes through here.
pub(crate) fn check<T>(engine: &dyn NativeEngine, result: Native<T>) -> Result<T> {
    result.map_err(|code| JsError::Engine(drain_exception(engine, code)))
}

fn drain_exception(engine: &dyn NativeEngine, code: JsErrorCode) -> EngineError {
    let mut error = EngineError::new(code);
    let exception = match engine.get_and_clear_exception() {
        Ok(0) | Err(_) => return error,
        Ok(exception) => exception,
    };
    // Pinned only while its properties are read.
    let pinned = match engine.add_ref(exception) {
        Ok(count) => count,
        Err(code) => {
            warn!("Failed to pin pending exception: {code}");
            return error;
        }
    };
    debug!("Draining exception for {code} (refs: {pinned})");

    error.script_message = read_property(engine, exception, "message");
    error.line = read_property(engine, exception, "line").unwrap_or(-1);
    error.column = read_property(engine, exception, "column").unwrap_or(-1);
    error.source_code = read_property(engine, exception, "source").unwrap_or_default();

    if let Err(code) = engine.release(exception) {
        warn!("Failed to release pending exception: {code}");
    }
    error
}

/// Reads and coerces a property, treating any failure as absent.
fn read_property<T: FromHost>(
    engine: &dyn NativeEngine,
    object: RawHandle,
    name: &str,
) -> Option<T> {
    let id = engine.property_id(name).ok()?;
    let value = engine.get_property(object, id).ok()?;
    let host: HostValue = engine.value_to_variant(value).ok()?.to_host().ok()?;
    T::from_host(&host)
}
