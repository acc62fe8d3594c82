//! # jsrt
//!
//! Hosting bindings for the JsRT JavaScript engine.
//!
//! The native API is reached through the [`NativeEngine`] trait; on Windows
//! [`ChakraEngine`] binds it to `jscript9.dll`. On top of it sit owning
//! wrappers for runtimes, contexts and values, each releasing its engine
//! handle exactly once.
//!
//! ```no_run
//! # #[cfg(windows)]
//! # fn main() -> jsrt::Result<()> {
//! use jsrt::{ChakraEngine, JsRuntime};
//!
//! let runtime = JsRuntime::with_defaults(ChakraEngine::shared())?;
//! let context = runtime.create_context()?;
//! let answer = context.execute_with_result(|| runtime.run_script("6 * 7", None))??;
//! println!("{answer}");
//! # Ok(())
//! # }
//! # #[cfg(not(windows))]
//! # fn main() {}
//! ```

#[cfg(windows)]
mod chakra;
mod context;
mod engine;
mod error;
mod handle;
mod runtime;
mod value;

#[cfg(windows)]
pub use chakra::ChakraEngine;
pub use context::{ContextScope, EngineVersion, JsContext};
pub use engine::{
    JsRuntimeAttributes, JsRuntimeVersion, JsValueType, Native, NativeEngine, RawHandle,
};
pub use error::{EngineError, ErrorCategory, JsError, JsErrorCode, Result};
pub use handle::NativeHandle;
pub use runtime::JsRuntime;
pub use value::JsValue;

pub use jsrt_variant::{self as variant, FromHost, HostValue, Variant};

#[cfg(test)]
mod tests;
