//! [`NativeEngine`] over the JsRT exports of `jscript9.dll`.

use crate::engine::{
    JsRuntimeAttributes, JsRuntimeVersion, JsValueType, Native, NativeEngine, RawHandle,
};
use crate::error::JsErrorCode;
use jsrt_variant::{RawVariant, Variant};
use std::ffi::c_void;
use std::iter;
use std::ptr;
use std::sync::Arc;

#[link(name = "jscript9", kind = "raw-dylib")]
unsafe extern "system" {
    fn JsCreateRuntime(
        attributes: u32,
        version: i32,
        thread_service: *const c_void,
        runtime: *mut RawHandle,
    ) -> u32;
    fn JsDisposeRuntime(runtime: RawHandle) -> u32;
    fn JsCollectGarbage(runtime: RawHandle) -> u32;
    fn JsGetRuntimeMemoryUsage(runtime: RawHandle, usage: *mut usize) -> u32;
    fn JsGetRuntimeMemoryLimit(runtime: RawHandle, limit: *mut isize) -> u32;
    fn JsSetRuntimeMemoryLimit(runtime: RawHandle, limit: isize) -> u32;
    fn JsDisableRuntimeExecution(runtime: RawHandle) -> u32;
    fn JsEnableRuntimeExecution(runtime: RawHandle) -> u32;
    fn JsIsRuntimeExecutionDisabled(runtime: RawHandle, disabled: *mut bool) -> u32;
    fn JsIdle(next_idle_tick: *mut u32) -> u32;

    fn JsCreateContext(
        runtime: RawHandle,
        debug_application: *const c_void,
        context: *mut RawHandle,
    ) -> u32;
    fn JsGetRuntime(context: RawHandle, runtime: *mut RawHandle) -> u32;
    fn JsGetCurrentContext(context: *mut RawHandle) -> u32;
    fn JsSetCurrentContext(context: RawHandle) -> u32;

    fn JsParseScript(
        script: *const u16,
        source_context: usize,
        source_url: *const u16,
        result: *mut RawHandle,
    ) -> u32;
    fn JsRunScript(
        script: *const u16,
        source_context: usize,
        source_url: *const u16,
        result: *mut RawHandle,
    ) -> u32;

    fn JsGetPropertyIdFromName(name: *const u16, property_id: *mut RawHandle) -> u32;
    fn JsGetProperty(object: RawHandle, property_id: RawHandle, value: *mut RawHandle) -> u32;
    fn JsSetProperty(
        object: RawHandle,
        property_id: RawHandle,
        value: RawHandle,
        use_strict_rules: bool,
    ) -> u32;
    fn JsGetIndexedProperty(object: RawHandle, index: RawHandle, result: *mut RawHandle) -> u32;
    fn JsSetIndexedProperty(object: RawHandle, index: RawHandle, value: RawHandle) -> u32;
    fn JsGetOwnPropertyNames(object: RawHandle, names: *mut RawHandle) -> u32;
    fn JsGetOwnPropertyDescriptor(
        object: RawHandle,
        property_id: RawHandle,
        descriptor: *mut RawHandle,
    ) -> u32;
    fn JsGetPrototype(object: RawHandle, prototype: *mut RawHandle) -> u32;
    fn JsCallFunction(
        function: RawHandle,
        arguments: *const RawHandle,
        argument_count: u16,
        result: *mut RawHandle,
    ) -> u32;

    fn JsGetValueType(value: RawHandle, value_type: *mut u32) -> u32;
    fn JsValueToVariant(value: RawHandle, variant: *mut RawVariant) -> u32;
    fn JsVariantToValue(variant: *mut RawVariant, value: *mut RawHandle) -> u32;
    fn JsConvertValueToString(value: RawHandle, result: *mut RawHandle) -> u32;

    fn JsGetGlobalObject(global: *mut RawHandle) -> u32;
    fn JsGetUndefinedValue(value: *mut RawHandle) -> u32;
    fn JsGetNullValue(value: *mut RawHandle) -> u32;
    fn JsGetTrueValue(value: *mut RawHandle) -> u32;
    fn JsGetFalseValue(value: *mut RawHandle) -> u32;

    fn JsGetAndClearException(exception: *mut RawHandle) -> u32;

    fn JsAddRef(handle: RawHandle, count: *mut u32) -> u32;
    fn JsRelease(handle: RawHandle, count: *mut u32) -> u32;
}

fn status(code: u32) -> Native<()> {
    match JsErrorCode(code) {
        JsErrorCode::NO_ERROR => Ok(()),
        error => Err(error),
    }
}

/// Runs a native call that reports through one out-parameter.
fn out<T: Default>(call: impl FnOnce(*mut T) -> u32) -> Native<T> {
    let mut value = T::default();
    status(call(&raw mut value))?;
    Ok(value)
}

/// NUL-terminated UTF-16.
fn wide(text: &str) -> Vec<u16> {
    text.encode_utf16().chain(iter::once(0)).collect()
}

/// The system JsRT engine.
///
/// The engine is a process-wide singleton; this type carries no state.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChakraEngine;

impl ChakraEngine {
    /// A shareable handle to the system engine.
    pub fn shared() -> Arc<dyn NativeEngine> {
        Arc::new(Self)
    }
}

// SAFETY (all blocks below): every pointer handed to the engine is either a
// live local out-parameter or a NUL-terminated buffer that outlives the call;
// handles are opaque to Rust and validated by the engine.
impl NativeEngine for ChakraEngine {
    fn create_runtime(
        &self,
        attributes: JsRuntimeAttributes,
        version: JsRuntimeVersion,
    ) -> Native<RawHandle> {
        out(|runtime| unsafe {
            JsCreateRuntime(attributes.bits(), version as i32, ptr::null(), runtime)
        })
    }

    fn dispose_runtime(&self, runtime: RawHandle) -> Native<()> {
        status(unsafe { JsDisposeRuntime(runtime) })
    }

    fn collect_garbage(&self, runtime: RawHandle) -> Native<()> {
        status(unsafe { JsCollectGarbage(runtime) })
    }

    fn runtime_memory_usage(&self, runtime: RawHandle) -> Native<usize> {
        out(|usage| unsafe { JsGetRuntimeMemoryUsage(runtime, usage) })
    }

    fn runtime_memory_limit(&self, runtime: RawHandle) -> Native<isize> {
        out(|limit| unsafe { JsGetRuntimeMemoryLimit(runtime, limit) })
    }

    fn set_runtime_memory_limit(&self, runtime: RawHandle, limit: isize) -> Native<()> {
        status(unsafe { JsSetRuntimeMemoryLimit(runtime, limit) })
    }

    fn disable_runtime_execution(&self, runtime: RawHandle) -> Native<()> {
        status(unsafe { JsDisableRuntimeExecution(runtime) })
    }

    fn enable_runtime_execution(&self, runtime: RawHandle) -> Native<()> {
        status(unsafe { JsEnableRuntimeExecution(runtime) })
    }

    fn is_runtime_execution_disabled(&self, runtime: RawHandle) -> Native<bool> {
        out(|disabled| unsafe { JsIsRuntimeExecutionDisabled(runtime, disabled) })
    }

    fn idle(&self) -> Native<u32> {
        out(|tick| unsafe { JsIdle(tick) })
    }

    fn create_context(&self, runtime: RawHandle) -> Native<RawHandle> {
        out(|context| unsafe { JsCreateContext(runtime, ptr::null(), context) })
    }

    fn context_runtime(&self, context: RawHandle) -> Native<RawHandle> {
        out(|runtime| unsafe { JsGetRuntime(context, runtime) })
    }

    fn current_context(&self) -> Native<RawHandle> {
        out(|context| unsafe { JsGetCurrentContext(context) })
    }

    fn set_current_context(&self, context: RawHandle) -> Native<()> {
        status(unsafe { JsSetCurrentContext(context) })
    }

    fn parse_script(
        &self,
        script: &str,
        source_context: usize,
        source_url: &str,
    ) -> Native<RawHandle> {
        let (script, source_url) = (wide(script), wide(source_url));
        out(|result| unsafe {
            JsParseScript(script.as_ptr(), source_context, source_url.as_ptr(), result)
        })
    }

    fn run_script(&self, script: &str, source_context: usize, source_url: &str) -> Native<RawHandle> {
        let (script, source_url) = (wide(script), wide(source_url));
        out(|result| unsafe {
            JsRunScript(script.as_ptr(), source_context, source_url.as_ptr(), result)
        })
    }

    fn property_id(&self, name: &str) -> Native<RawHandle> {
        let name = wide(name);
        out(|id| unsafe { JsGetPropertyIdFromName(name.as_ptr(), id) })
    }

    fn get_property(&self, object: RawHandle, property_id: RawHandle) -> Native<RawHandle> {
        out(|value| unsafe { JsGetProperty(object, property_id, value) })
    }

    fn set_property(
        &self,
        object: RawHandle,
        property_id: RawHandle,
        value: RawHandle,
        use_strict_rules: bool,
    ) -> Native<()> {
        status(unsafe { JsSetProperty(object, property_id, value, use_strict_rules) })
    }

    fn get_indexed_property(&self, object: RawHandle, index: RawHandle) -> Native<RawHandle> {
        out(|result| unsafe { JsGetIndexedProperty(object, index, result) })
    }

    fn set_indexed_property(
        &self,
        object: RawHandle,
        index: RawHandle,
        value: RawHandle,
    ) -> Native<()> {
        status(unsafe { JsSetIndexedProperty(object, index, value) })
    }

    fn own_property_names(&self, object: RawHandle) -> Native<RawHandle> {
        out(|names| unsafe { JsGetOwnPropertyNames(object, names) })
    }

    fn own_property_descriptor(
        &self,
        object: RawHandle,
        property_id: RawHandle,
    ) -> Native<RawHandle> {
        out(|descriptor| unsafe { JsGetOwnPropertyDescriptor(object, property_id, descriptor) })
    }

    fn prototype(&self, object: RawHandle) -> Native<RawHandle> {
        out(|prototype| unsafe { JsGetPrototype(object, prototype) })
    }

    fn call_function(&self, function: RawHandle, arguments: &[RawHandle]) -> Native<RawHandle> {
        let count = u16::try_from(arguments.len()).map_err(|_| JsErrorCode::INVALID_ARGUMENT)?;
        let arguments = if arguments.is_empty() {
            ptr::null()
        } else {
            arguments.as_ptr()
        };
        out(|result| unsafe { JsCallFunction(function, arguments, count, result) })
    }

    fn value_type(&self, value: RawHandle) -> Native<JsValueType> {
        out(|value_type| unsafe { JsGetValueType(value, value_type) }).map(JsValueType::from_raw)
    }

    fn value_to_variant(&self, value: RawHandle) -> Native<Variant> {
        let mut raw = RawVariant::zeroed();
        status(unsafe { JsValueToVariant(value, &raw mut raw) })?;
        // SAFETY: the engine filled `raw` with a payload the caller now owns.
        Ok(unsafe { Variant::from_raw(raw) })
    }

    fn variant_to_value(&self, variant: &Variant) -> Native<RawHandle> {
        // The engine reads the variant and never writes through the pointer.
        let raw = ptr::from_ref(variant.as_raw()).cast_mut();
        out(|value| unsafe { JsVariantToValue(raw, value) })
    }

    fn convert_value_to_string(&self, value: RawHandle) -> Native<RawHandle> {
        out(|result| unsafe { JsConvertValueToString(value, result) })
    }

    fn global_object(&self) -> Native<RawHandle> {
        out(|global| unsafe { JsGetGlobalObject(global) })
    }

    fn undefined_value(&self) -> Native<RawHandle> {
        out(|value| unsafe { JsGetUndefinedValue(value) })
    }

    fn null_value(&self) -> Native<RawHandle> {
        out(|value| unsafe { JsGetNullValue(value) })
    }

    fn true_value(&self) -> Native<RawHandle> {
        out(|value| unsafe { JsGetTrueValue(value) })
    }

    fn false_value(&self) -> Native<RawHandle> {
        out(|value| unsafe { JsGetFalseValue(value) })
    }

    fn get_and_clear_exception(&self) -> Native<RawHandle> {
        let mut exception = 0;
        match JsErrorCode(unsafe { JsGetAndClearException(&raw mut exception) }) {
            // Reported when nothing is pending.
            JsErrorCode::NO_ERROR | JsErrorCode::INVALID_ARGUMENT => Ok(exception),
            error => Err(error),
        }
    }

    fn add_ref(&self, handle: RawHandle) -> Native<u32> {
        out(|count| unsafe { JsAddRef(handle, count) })
    }

    fn release(&self, handle: RawHandle) -> Native<u32> {
        out(|count| unsafe { JsRelease(handle, count) })
    }
}
