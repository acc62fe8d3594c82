//! Runtime lifecycle, script execution and the parsed-script cache.

use crate::context::{EngineVersion, JsContext};
use crate::engine::{JsRuntimeAttributes, JsRuntimeVersion, NativeEngine, RawHandle};
use crate::error::{JsError, Result, check};
use crate::handle::NativeHandle;
use crate::value::JsValue;
use jsrt_config::{RuntimeAttribute, RuntimeConfig, RuntimeVersion};
use jsrt_variant::HostValue;
use log::{debug, info, trace};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type ScriptKey = (RawHandle, String);

/// An isolated engine instance.
///
/// Disposing a runtime while contexts or values created from it are still
/// alive is undefined at the engine level; the wrapper only guarantees that
/// its own handle is disposed exactly once.
pub struct JsRuntime {
    // Declared first so cached scripts are released before the runtime goes.
    parsed_scripts: Mutex<HashMap<ScriptKey, JsValue>>,
    cache_parsed_scripts: AtomicBool,
    handle: NativeHandle,
}

impl JsRuntime {
    /// Creates a runtime.
    ///
    /// # Errors
    ///
    /// Fails when the engine cannot create the runtime.
    pub fn new(
        engine: Arc<dyn NativeEngine>,
        attributes: JsRuntimeAttributes,
        version: JsRuntimeVersion,
    ) -> Result<Self> {
        let handle = check(engine.as_ref(), engine.create_runtime(attributes, version))?;
        info!("Created runtime 0x{handle:X} ({version:?}, {attributes:?})");
        Ok(Self::wrap(NativeHandle::runtime(engine, handle)))
    }

    /// A runtime with no attributes on the newest engine version.
    ///
    /// # Errors
    ///
    /// Fails when the engine cannot create the runtime.
    pub fn with_defaults(engine: Arc<dyn NativeEngine>) -> Result<Self> {
        Self::new(engine, JsRuntimeAttributes::empty(), JsRuntimeVersion::Edge)
    }

    /// Creates a runtime from configuration, applying its memory limit and
    /// script cache setting.
    ///
    /// # Errors
    ///
    /// Fails when the engine cannot create the runtime or rejects the limit.
    pub fn from_config(engine: Arc<dyn NativeEngine>, config: &RuntimeConfig) -> Result<Self> {
        let attributes = config
            .attributes
            .iter()
            .fold(JsRuntimeAttributes::empty(), |acc, a| acc | attribute(*a));
        let runtime = Self::new(engine, attributes, version(config.version))?;
        if let Some(limit) = config.memory_limit {
            runtime.set_memory_limit(Some(limit))?;
        }
        runtime.set_cache_parsed_scripts(config.cache_parsed_scripts);
        Ok(runtime)
    }

    /// Wraps a runtime owned elsewhere; dropping the wrapper leaves it alive.
    pub(crate) fn borrowed(engine: Arc<dyn NativeEngine>, handle: RawHandle) -> Result<Self> {
        Ok(Self::wrap(NativeHandle::adopt(engine, handle)?))
    }

    fn wrap(handle: NativeHandle) -> Self {
        Self {
            parsed_scripts: Mutex::new(HashMap::new()),
            cache_parsed_scripts: AtomicBool::new(false),
            handle,
        }
    }

    /// One-shot evaluation in a fresh runtime and context.
    ///
    /// # Errors
    ///
    /// Fails when the script does not compile or throws.
    pub fn eval(engine: Arc<dyn NativeEngine>, script: &str) -> Result<HostValue> {
        let runtime = Self::with_defaults(engine)?;
        let context = runtime.create_context()?;
        context.execute_with_result(|| runtime.run_script(script, None))?
    }

    pub fn handle(&self) -> Result<RawHandle> {
        self.handle.handle()
    }

    pub fn is_disposed(&self) -> bool {
        self.handle.is_disposed()
    }

    /// Releases cached scripts and disposes the runtime. Later calls do
    /// nothing.
    pub fn dispose(&self) {
        self.clear_parsed_script_cache();
        self.handle.dispose();
    }

    fn engine(&self) -> &Arc<dyn NativeEngine> {
        self.handle.engine()
    }

    /// # Errors
    ///
    /// Fails when the runtime is disposed.
    pub fn memory_usage(&self) -> Result<usize> {
        let engine = self.engine().as_ref();
        check(engine, engine.runtime_memory_usage(self.handle()?))
    }

    /// The memory limit in bytes, `None` when unlimited.
    ///
    /// # Errors
    ///
    /// Fails when the runtime is disposed.
    pub fn memory_limit(&self) -> Result<Option<u64>> {
        let engine = self.engine().as_ref();
        let limit = check(engine, engine.runtime_memory_limit(self.handle()?))?;
        Ok(u64::try_from(limit).ok())
    }

    /// # Errors
    ///
    /// Fails when the runtime is disposed or the limit does not fit the
    /// platform's address space.
    pub fn set_memory_limit(&self, limit: Option<u64>) -> Result<()> {
        let limit = match limit {
            Some(bytes) => {
                isize::try_from(bytes).map_err(|_| JsError::InvalidArgument("memory_limit"))?
            }
            None => -1,
        };
        let engine = self.engine().as_ref();
        check(engine, engine.set_runtime_memory_limit(self.handle()?, limit))
    }

    /// # Errors
    ///
    /// Fails when the runtime is disposed.
    pub fn execution_enabled(&self) -> Result<bool> {
        let engine = self.engine().as_ref();
        Ok(!check(engine, engine.is_runtime_execution_disabled(self.handle()?))?)
    }

    /// Enables or disables script execution. May be called from another
    /// thread to interrupt a running script when the runtime was created with
    /// [`JsRuntimeAttributes::ALLOW_SCRIPT_INTERRUPT`].
    ///
    /// # Errors
    ///
    /// Fails when the runtime is disposed or does not support interruption.
    pub fn set_execution_enabled(&self, enabled: bool) -> Result<()> {
        if enabled == self.execution_enabled()? {
            return Ok(());
        }
        let engine = self.engine().as_ref();
        let handle = self.handle()?;
        if enabled {
            check(engine, engine.enable_runtime_execution(handle))
        } else {
            check(engine, engine.disable_runtime_execution(handle))
        }
    }

    /// # Errors
    ///
    /// Fails when the runtime is disposed.
    pub fn collect_garbage(&self) -> Result<()> {
        let engine = self.engine().as_ref();
        check(engine, engine.collect_garbage(self.handle()?))
    }

    /// Gives the engine idle time; returns the tick count of the next
    /// requested idle call.
    ///
    /// # Errors
    ///
    /// Fails unless the runtime was created with
    /// [`JsRuntimeAttributes::ENABLE_IDLE_PROCESSING`].
    pub fn idle(&self) -> Result<u32> {
        let engine = self.engine().as_ref();
        check(engine, engine.idle())
    }

    /// # Errors
    ///
    /// Fails when the runtime is disposed.
    pub fn create_context(&self) -> Result<JsContext> {
        let engine = self.engine();
        let handle = check(engine.as_ref(), engine.create_context(self.handle()?))?;
        debug!("Created context 0x{handle:X}");
        JsContext::new(Arc::clone(engine), handle, true)
    }

    fn current_context(&self) -> Result<JsContext> {
        JsContext::current(self.engine())?.ok_or(JsError::NoCurrentContext)
    }

    /// The current context's global object.
    ///
    /// # Errors
    ///
    /// Fails when no context is current.
    pub fn global_object(&self) -> Result<JsValue> {
        self.current_context()?.global_object()
    }

    /// # Errors
    ///
    /// Fails when no context is current.
    pub fn engine_version(&self) -> Result<EngineVersion> {
        self.current_context()?.engine_version()
    }

    /// Defines `name` on the current context's global object.
    ///
    /// # Errors
    ///
    /// Fails when no context is current or the value cannot be marshalled.
    pub fn add_global_object(&self, name: &str, value: &HostValue) -> Result<()> {
        self.current_context()?.add_global_object(name, value)
    }

    pub fn cache_parsed_scripts(&self) -> bool {
        self.cache_parsed_scripts.load(Ordering::Relaxed)
    }

    /// Turns the parsed-script cache on or off. Already cached scripts stay
    /// until [`clear_parsed_script_cache`](Self::clear_parsed_script_cache).
    pub fn set_cache_parsed_scripts(&self, enabled: bool) {
        self.cache_parsed_scripts.store(enabled, Ordering::Relaxed);
    }

    fn parsed_scripts(&self) -> MutexGuard<'_, HashMap<ScriptKey, JsValue>> {
        self.parsed_scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn parsed_script_count(&self) -> usize {
        self.parsed_scripts().len()
    }

    /// Releases every cached parsed script.
    pub fn clear_parsed_script_cache(&self) {
        let drained: Vec<JsValue> = self.parsed_scripts().drain().map(|(_, v)| v).collect();
        if !drained.is_empty() {
            debug!("Released {} cached scripts", drained.len());
        }
    }

    /// Runs a script in the current context and returns its completion value.
    ///
    /// # Errors
    ///
    /// Fails when the script does not compile, throws, or its result has no
    /// host representation.
    pub fn run_script(&self, script: &str, source_url: Option<&str>) -> Result<HostValue> {
        self.try_run_script(script, source_url)?.detach_value()
    }

    /// Runs a script in the current context and returns the completion value
    /// as a script value.
    ///
    /// With the parsed-script cache enabled, the script is parsed once per
    /// (context, text) pair and the parsed function is called on later runs.
    /// Scripts that fail to parse are not cached.
    ///
    /// # Errors
    ///
    /// Fails when the script does not compile or throws.
    pub fn try_run_script(&self, script: &str, source_url: Option<&str>) -> Result<JsValue> {
        let source_url = source_url.unwrap_or_default();
        if self.cache_parsed_scripts()
            && let Some(context) = JsContext::current(self.engine())?
        {
            let parsed = self.cached_script(&context, script, source_url)?;
            let this = context.undefined()?;
            return parsed.call_values(&[&this]);
        }

        let engine = self.engine();
        let handle = check(engine.as_ref(), engine.run_script(script, 0, source_url))?;
        JsValue::new(Arc::clone(engine), handle)
    }

    fn cached_script(&self, context: &JsContext, script: &str, source_url: &str) -> Result<JsValue> {
        let key = (context.handle()?, script.to_owned());
        let mut cache = self.parsed_scripts();
        if let Some(parsed) = cache.get(&key) {
            trace!("Parsed script cache hit for context 0x{:X}", key.0);
            return parsed.try_clone();
        }
        let parsed = self.parse_script(script, Some(source_url))?;
        debug!(
            "Cached parsed script for context 0x{:X} ({} entries)",
            key.0,
            cache.len() + 1
        );
        let result = parsed.try_clone()?;
        cache.insert(key, parsed);
        Ok(result)
    }

    /// Parses a script in the current context without running it. The
    /// result is a function that runs the script when called.
    ///
    /// # Errors
    ///
    /// Fails when the script does not compile.
    pub fn parse_script(&self, script: &str, source_url: Option<&str>) -> Result<JsValue> {
        let engine = self.engine();
        let handle = check(
            engine.as_ref(),
            engine.parse_script(script, 0, source_url.unwrap_or_default()),
        )?;
        JsValue::new(Arc::clone(engine), handle)
    }
}

impl Drop for JsRuntime {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for JsRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsRuntime")
            .field("handle", &self.handle)
            .field("cache_parsed_scripts", &self.cache_parsed_scripts())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for JsRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.handle)
    }
}

fn attribute(attribute: RuntimeAttribute) -> JsRuntimeAttributes {
    match attribute {
        RuntimeAttribute::DisableBackgroundWork => JsRuntimeAttributes::DISABLE_BACKGROUND_WORK,
        RuntimeAttribute::AllowScriptInterrupt => JsRuntimeAttributes::ALLOW_SCRIPT_INTERRUPT,
        RuntimeAttribute::EnableIdleProcessing => JsRuntimeAttributes::ENABLE_IDLE_PROCESSING,
        RuntimeAttribute::DisableNativeCodeGeneration => {
            JsRuntimeAttributes::DISABLE_NATIVE_CODE_GENERATION
        }
        RuntimeAttribute::DisableEval => JsRuntimeAttributes::DISABLE_EVAL,
        RuntimeAttribute::EnableExperimentalFeatures => {
            JsRuntimeAttributes::ENABLE_EXPERIMENTAL_FEATURES
        }
        RuntimeAttribute::DispatchSetExceptionsToDebugger => {
            JsRuntimeAttributes::DISPATCH_SET_EXCEPTIONS_TO_DEBUGGER
        }
        RuntimeAttribute::DisableFatalOnOom => JsRuntimeAttributes::DISABLE_FATAL_ON_OOM,
        RuntimeAttribute::DisableExecutablePageAllocation => {
            JsRuntimeAttributes::DISABLE_EXECUTABLE_PAGE_ALLOCATION
        }
    }
}

fn version(version: RuntimeVersion) -> JsRuntimeVersion {
    match version {
        RuntimeVersion::V10 => JsRuntimeVersion::V10,
        RuntimeVersion::V11 => JsRuntimeVersion::V11,
        RuntimeVersion::Edge => JsRuntimeVersion::Edge,
    }
}
