//! Execution contexts and the engine's current-context slot.
//!
//! The engine applies almost every call to one process-wide current context.
//! [`JsContext::current`] always asks the engine; nothing is cached on the
//! host side. Scoped execution saves the previous context, installs this
//! one and restores the previous one from a drop guard, so the restore also
//! happens on early return, unwinding and future cancellation.

use crate::engine::{NativeEngine, RawHandle};
use crate::error::{JsError, Result, check};
use crate::handle::NativeHandle;
use crate::runtime::JsRuntime;
use crate::value::JsValue;
use jsrt_variant::HostValue;
use log::{debug, warn};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// `ScriptEngineMajorVersion().ScriptEngineMinorVersion().<OS build>.ScriptEngineBuildVersion()`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct EngineVersion {
    pub major: u32,
    pub minor: u32,
    /// Build number of the host operating system
    pub build: u32,
    /// `ScriptEngineBuildVersion()`
    pub revision: u32,
}

impl fmt::Display for EngineVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.build, self.revision
        )
    }
}

/// A script global environment inside a runtime.
pub struct JsContext {
    handle: NativeHandle,
}

impl JsContext {
    /// Wraps a context handle, adding a reference when `add_ref` is set.
    ///
    /// # Errors
    ///
    /// Fails for the null handle or when the add-ref fails.
    pub fn new(engine: Arc<dyn NativeEngine>, handle: RawHandle, add_ref: bool) -> Result<Self> {
        let handle = if add_ref {
            NativeHandle::acquire(engine, handle)?
        } else {
            NativeHandle::adopt(engine, handle)?
        };
        Ok(Self { handle })
    }

    /// The engine's current context, if any. The engine already holds that
    /// reference, so the wrapper never releases it.
    ///
    /// # Errors
    ///
    /// Fails when the engine query fails.
    pub fn current(engine: &Arc<dyn NativeEngine>) -> Result<Option<Self>> {
        match check(engine.as_ref(), engine.current_context())? {
            0 => Ok(None),
            handle => Self::new(Arc::clone(engine), handle, false).map(Some),
        }
    }

    /// Installs `context` as current, or clears the slot with `None`.
    ///
    /// # Errors
    ///
    /// Fails when `context` is disposed or the engine rejects the switch.
    pub fn set_current(engine: &dyn NativeEngine, context: Option<&JsContext>) -> Result<()> {
        let handle = context.map(JsContext::handle).transpose()?.unwrap_or(0);
        debug!("Switching current context to 0x{handle:X}");
        check(engine, engine.set_current_context(handle))
    }

    pub fn handle(&self) -> Result<RawHandle> {
        self.handle.handle()
    }

    pub fn is_disposed(&self) -> bool {
        self.handle.is_disposed()
    }

    /// Releases the context's reference. Later calls do nothing.
    pub fn dispose(&self) {
        self.handle.dispose();
    }

    fn engine(&self) -> &Arc<dyn NativeEngine> {
        self.handle.engine()
    }

    fn value(&self, handle: crate::engine::Native<RawHandle>) -> Result<JsValue> {
        let handle = check(self.engine().as_ref(), handle)?;
        JsValue::new(Arc::clone(self.engine()), handle)
    }

    /// The runtime owning this context. The returned wrapper does not
    /// dispose the runtime.
    ///
    /// # Errors
    ///
    /// Fails when this context is disposed.
    pub fn runtime(&self) -> Result<Option<JsRuntime>> {
        let engine = self.engine();
        match check(engine.as_ref(), engine.context_runtime(self.handle()?))? {
            0 => Ok(None),
            handle => Ok(Some(JsRuntime::borrowed(Arc::clone(engine), handle)?)),
        }
    }

    /// The current context's global object.
    ///
    /// # Errors
    ///
    /// Fails when no context is current.
    pub fn global_object(&self) -> Result<JsValue> {
        self.value(self.engine().global_object())
    }

    /// # Errors
    ///
    /// Fails when no context is current.
    pub fn undefined(&self) -> Result<JsValue> {
        self.value(self.engine().undefined_value())
    }

    /// # Errors
    ///
    /// Fails when no context is current.
    pub fn null(&self) -> Result<JsValue> {
        self.value(self.engine().null_value())
    }

    /// # Errors
    ///
    /// Fails when no context is current.
    pub fn true_value(&self) -> Result<JsValue> {
        self.value(self.engine().true_value())
    }

    /// # Errors
    ///
    /// Fails when no context is current.
    pub fn false_value(&self) -> Result<JsValue> {
        self.value(self.engine().false_value())
    }

    /// Version of the script engine, read through the well-known global
    /// version functions.
    ///
    /// # Errors
    ///
    /// Fails when no context is current.
    pub fn engine_version(&self) -> Result<EngineVersion> {
        let global = self.global_object()?;
        let part = |name: &str| global.try_call_function::<u32>(name, &[]).unwrap_or(0);
        Ok(EngineVersion {
            major: part("ScriptEngineMajorVersion"),
            minor: part("ScriptEngineMinorVersion"),
            build: os_build_number(),
            revision: part("ScriptEngineBuildVersion"),
        })
    }

    /// Defines `name` on the global object.
    ///
    /// # Errors
    ///
    /// Fails when the value cannot be marshalled or no context is current.
    pub fn add_global_object(&self, name: &str, value: &HostValue) -> Result<()> {
        if name.is_empty() {
            return Err(JsError::InvalidArgument("name"));
        }
        self.global_object()?.try_set_property(name, value, false)
    }

    /// Marshals a host value into the current context.
    ///
    /// # Errors
    ///
    /// Fails when the value cannot be marshalled or no context is current.
    pub fn object_to_value(&self, value: &HostValue) -> Result<JsValue> {
        JsValue::from_host(Arc::clone(self.engine()), value)
    }

    /// Makes this context current until the returned guard drops.
    ///
    /// # Errors
    ///
    /// Fails when the previous context cannot be read or the switch fails.
    pub fn enter(&self) -> Result<ContextScope> {
        let engine = Arc::clone(self.engine());
        let previous = check(engine.as_ref(), engine.current_context())?;
        let handle = self.handle()?;
        check(engine.as_ref(), engine.set_current_context(handle))?;
        debug!("Entered context 0x{handle:X} (previous 0x{previous:X})");
        Ok(ContextScope { engine, previous })
    }

    /// Runs `action` with this context current.
    ///
    /// # Errors
    ///
    /// Fails only when the context switch itself fails.
    pub fn execute(&self, action: impl FnOnce()) -> Result<()> {
        self.execute_with_result(action)
    }

    /// Runs `action` with this context current and returns its result.
    ///
    /// # Errors
    ///
    /// Fails only when the context switch itself fails; errors produced by
    /// `action` are part of `R`.
    pub fn execute_with_result<R>(&self, action: impl FnOnce() -> R) -> Result<R> {
        let _scope = self.enter()?;
        Ok(action())
    }

    /// Awaits the future produced by `action` with this context current.
    ///
    /// The context stays installed across suspension points, so other work
    /// on the same engine must not run while this future is pending.
    ///
    /// # Errors
    ///
    /// Fails only when the context switch itself fails.
    pub async fn execute_async<F, Fut, R>(&self, action: F) -> Result<R>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = R>,
    {
        let _scope = self.enter()?;
        Ok(action().await)
    }
}

impl PartialEq for JsContext {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}

impl fmt::Debug for JsContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsContext")
            .field("handle", &self.handle)
            .finish()
    }
}

impl fmt::Display for JsContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.handle)
    }
}

/// Restores the previously current context when dropped.
#[must_use = "the previous context is restored as soon as the scope drops"]
pub struct ContextScope {
    engine: Arc<dyn NativeEngine>,
    previous: RawHandle,
}

impl Drop for ContextScope {
    fn drop(&mut self) {
        match self.engine.set_current_context(self.previous) {
            Ok(()) => debug!("Restored context 0x{:X}", self.previous),
            Err(code) => warn!("Failed to restore context 0x{:X}: {code}", self.previous),
        }
    }
}

#[cfg(windows)]
fn os_build_number() -> u32 {
    use windows_sys::Win32::System::SystemInformation::{GetVersionExW, OSVERSIONINFOW};

    // SAFETY: OSVERSIONINFOW is plain data; all-zero is a valid value.
    let mut info: OSVERSIONINFOW = unsafe { std::mem::zeroed() };
    info.dwOSVersionInfoSize = size_of::<OSVERSIONINFOW>() as u32;
    // SAFETY: `info` is a valid, sized out structure.
    if unsafe { GetVersionExW(&raw mut info) } == 0 {
        return 0;
    }
    info.dwBuildNumber
}

#[cfg(not(windows))]
fn os_build_number() -> u32 {
    0
}
