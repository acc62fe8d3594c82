//! Script values.

use crate::engine::{JsValueType, NativeEngine, RawHandle};
use crate::error::{JsError, Result, check};
use crate::handle::NativeHandle;
use jsrt_variant::{FromHost, HostValue, Variant};
use log::debug;
use std::fmt;
use std::sync::Arc;

/// A counted reference to a script value.
///
/// The value type is read once on construction; everything else is fetched
/// from the engine on demand. Operations that marshal host values into the
/// engine need a current context.
pub struct JsValue {
    handle: NativeHandle,
    value_type: JsValueType,
}

impl JsValue {
    /// Wraps a value handle returned by the engine, querying its type and
    /// adding one reference.
    ///
    /// # Errors
    ///
    /// Fails for the null handle or when the type query or add-ref fails.
    pub fn new(engine: Arc<dyn NativeEngine>, handle: RawHandle) -> Result<Self> {
        if handle == 0 {
            return Err(JsError::InvalidArgument("handle"));
        }
        let value_type = check(engine.as_ref(), engine.value_type(handle))?;
        Ok(Self {
            handle: NativeHandle::acquire(engine, handle)?,
            value_type,
        })
    }

    /// Marshals a host value into a new script value in the current context.
    ///
    /// # Errors
    ///
    /// Fails when the value cannot be marshalled or no context is current.
    pub fn from_host(engine: Arc<dyn NativeEngine>, value: &HostValue) -> Result<Self> {
        let variant = Variant::from_host(value)?;
        let handle = check(engine.as_ref(), engine.variant_to_value(&variant))?;
        Self::new(engine, handle)
    }

    pub fn handle(&self) -> Result<RawHandle> {
        self.handle.handle()
    }

    pub fn value_type(&self) -> JsValueType {
        self.value_type
    }

    pub fn is_undefined(&self) -> bool {
        self.value_type == JsValueType::Undefined
    }

    pub fn is_disposed(&self) -> bool {
        self.handle.is_disposed()
    }

    /// Releases the value's reference. Later calls do nothing.
    pub fn dispose(&self) {
        self.handle.dispose();
    }

    /// Another counted reference to the same value.
    ///
    /// # Errors
    ///
    /// Fails when this value is disposed.
    pub fn try_clone(&self) -> Result<Self> {
        Ok(Self {
            handle: self.handle.try_clone()?,
            value_type: self.value_type,
        })
    }

    /// Engine reference count of the underlying handle.
    ///
    /// # Errors
    ///
    /// Fails when this value is disposed.
    pub fn ref_count(&self) -> Result<u32> {
        self.handle.ref_count()
    }

    fn engine(&self) -> &Arc<dyn NativeEngine> {
        self.handle.engine()
    }

    fn wrap(&self, handle: RawHandle) -> Result<Self> {
        Self::new(Arc::clone(self.engine()), handle)
    }

    fn wrap_optional(&self, handle: RawHandle) -> Result<Option<Self>> {
        match handle {
            0 => Ok(None),
            handle => self.wrap(handle).map(Some),
        }
    }

    /// The value converted to a host value.
    ///
    /// # Errors
    ///
    /// Fails when the engine cannot produce a VARIANT for it (plain objects,
    /// for instance) or the VARIANT has no host representation.
    pub fn value(&self) -> Result<HostValue> {
        let engine = self.engine().as_ref();
        let variant = check(engine, engine.value_to_variant(self.handle()?))?;
        Ok(variant.to_host()?)
    }

    /// The host value, releasing this reference afterwards.
    ///
    /// # Errors
    ///
    /// See [`JsValue::value`]; the reference is released either way.
    pub fn detach_value(self) -> Result<HostValue> {
        self.value()
    }

    /// The script `String(value)`, or `None` when the engine returns nothing.
    ///
    /// # Errors
    ///
    /// Fails when the conversion throws.
    pub fn convert_to_string(&self) -> Result<Option<String>> {
        let engine = self.engine().as_ref();
        let handle = check(engine, engine.convert_value_to_string(self.handle()?))?;
        let Some(text) = self.wrap_optional(handle)? else {
            return Ok(None);
        };
        Ok(String::from_host(&text.value()?))
    }

    /// # Errors
    ///
    /// Fails when the value is not an object.
    pub fn prototype(&self) -> Result<Option<Self>> {
        let engine = self.engine().as_ref();
        let handle = check(engine, engine.prototype(self.handle()?))?;
        self.wrap_optional(handle)
    }

    /// Resolves a property name to a pinned property id.
    fn property_id(&self, name: &str) -> Result<NativeHandle> {
        let engine = self.engine();
        let id = check(engine.as_ref(), engine.property_id(name))?;
        if id == 0 {
            return Err(JsError::InvalidArgument("property name"));
        }
        NativeHandle::acquire(Arc::clone(engine), id)
    }

    /// # Errors
    ///
    /// Fails when the lookup throws, e.g. on a getter.
    pub fn get_property(&self, name: &str) -> Result<Self> {
        let id = self.property_id(name)?;
        let engine = self.engine().as_ref();
        let handle = check(engine, engine.get_property(self.handle()?, id.handle()?))?;
        self.wrap(handle)
    }

    /// [`get_property`](Self::get_property), with failures turned into `None`.
    pub fn try_get_property(&self, name: &str) -> Option<Self> {
        self.get_property(name)
            .inspect_err(|e| debug!("Property '{name}' unavailable: {e}"))
            .ok()
    }

    /// The property coerced to `T`, or `default` when it is missing or cannot
    /// be coerced.
    pub fn get_property_as<T: FromHost>(&self, name: &str, default: T) -> T {
        self.try_get_property(name)
            .and_then(|value| value.value().ok())
            .and_then(|host| T::from_host(&host))
            .unwrap_or(default)
    }

    /// # Errors
    ///
    /// Fails when the lookup throws or the index cannot be marshalled.
    pub fn get_index(&self, index: i32) -> Result<Self> {
        let index = Self::from_host(Arc::clone(self.engine()), &HostValue::I32(index))?;
        let engine = self.engine().as_ref();
        let handle = check(
            engine,
            engine.get_indexed_property(self.handle()?, index.handle()?),
        )?;
        self.wrap(handle)
    }

    /// The element coerced to `T`, or `None`.
    pub fn get_index_as<T: FromHost>(&self, index: i32) -> Option<T> {
        let value = self.get_index(index).ok()?.value().ok()?;
        T::from_host(&value)
    }

    /// Sets a property.
    ///
    /// # Errors
    ///
    /// Fails when the value cannot be marshalled or the assignment throws;
    /// with `use_strict_rules` that includes writes to read-only properties.
    pub fn try_set_property(
        &self,
        name: &str,
        value: &HostValue,
        use_strict_rules: bool,
    ) -> Result<()> {
        let id = self.property_id(name)?;
        let value = Self::from_host(Arc::clone(self.engine()), value)?;
        self.set_property_value(&id, &value, use_strict_rules)
    }

    /// Sets a property to an existing script value.
    ///
    /// # Errors
    ///
    /// Fails when the assignment throws.
    pub fn set_property_to(&self, name: &str, value: &JsValue) -> Result<()> {
        let id = self.property_id(name)?;
        self.set_property_value(&id, value, false)
    }

    fn set_property_value(
        &self,
        id: &NativeHandle,
        value: &JsValue,
        use_strict_rules: bool,
    ) -> Result<()> {
        let engine = self.engine().as_ref();
        check(
            engine,
            engine.set_property(
                self.handle()?,
                id.handle()?,
                value.handle()?,
                use_strict_rules,
            ),
        )
    }

    /// Non-strict [`try_set_property`](Self::try_set_property); reports only
    /// whether the assignment happened.
    pub fn set_property(&self, name: &str, value: &HostValue) -> bool {
        self.try_set_property(name, value, false)
            .inspect_err(|e| debug!("Setting property '{name}' failed: {e}"))
            .is_ok()
    }

    /// # Errors
    ///
    /// Fails when the value cannot be marshalled or the assignment throws.
    pub fn set_index(&self, index: i32, value: &HostValue) -> Result<()> {
        let engine = self.engine();
        let value = Self::from_host(Arc::clone(engine), value)?;
        let index = Self::from_host(Arc::clone(engine), &HostValue::I32(index))?;
        check(
            engine.as_ref(),
            engine.set_indexed_property(self.handle()?, index.handle()?, value.handle()?),
        )
    }

    /// Names of the object's own properties, in engine order.
    ///
    /// # Errors
    ///
    /// Fails when the value is not an object.
    pub fn property_names(&self) -> Result<Vec<String>> {
        let engine = self.engine().as_ref();
        let handle = check(engine, engine.own_property_names(self.handle()?))?;
        let Some(names) = self.wrap_optional(handle)? else {
            return Ok(Vec::new());
        };
        let mut result = Vec::new();
        let mut index = 0;
        while let Some(name) = names.get_index_as::<String>(index) {
            result.push(name);
            index += 1;
        }
        Ok(result)
    }

    /// Own properties and their values, in engine order. Properties whose
    /// getter throws are skipped.
    ///
    /// # Errors
    ///
    /// Fails when the names cannot be enumerated.
    pub fn property_values(&self) -> Result<Vec<(String, JsValue)>> {
        Ok(self
            .property_names()?
            .into_iter()
            .filter_map(|name| self.try_get_property(&name).map(|value| (name, value)))
            .collect())
    }

    /// Descriptor objects of the own properties.
    ///
    /// # Errors
    ///
    /// Fails when the names cannot be enumerated.
    pub fn property_descriptors(&self) -> Result<Vec<JsValue>> {
        let engine = self.engine().as_ref();
        let mut descriptors = Vec::new();
        for name in self.property_names()? {
            let Ok(id) = self.property_id(&name) else {
                continue;
            };
            let descriptor = engine
                .own_property_descriptor(self.handle()?, id.handle()?)
                .unwrap_or(0);
            if let Some(descriptor) = self.wrap_optional(descriptor)? {
                descriptors.push(descriptor);
            }
        }
        Ok(descriptors)
    }

    /// Calls this function with script values. `arguments[0]` is `this`.
    ///
    /// # Errors
    ///
    /// Fails when the value is not callable or the call throws.
    pub fn call_values(&self, arguments: &[&JsValue]) -> Result<JsValue> {
        let handles = arguments
            .iter()
            .map(|arg| arg.handle())
            .collect::<Result<Vec<_>>>()?;
        let engine = self.engine().as_ref();
        let result = check(engine, engine.call_function(self.handle()?, &handles))?;
        self.wrap(result)
    }

    /// Calls this function with host values and returns the host result.
    /// `arguments[0]` is `this`.
    ///
    /// # Errors
    ///
    /// Fails when an argument cannot be marshalled or the call throws.
    pub fn call(&self, arguments: &[HostValue]) -> Result<HostValue> {
        let values = arguments
            .iter()
            .map(|arg| Self::from_host(Arc::clone(self.engine()), arg))
            .collect::<Result<Vec<_>>>()?;
        let refs: Vec<&JsValue> = values.iter().collect();
        self.call_values(&refs)?.detach_value()
    }

    /// Calls the method `name` with this object as `this`.
    ///
    /// # Errors
    ///
    /// Fails when the property is missing or not callable, an argument cannot
    /// be marshalled, or the call throws.
    pub fn call_function(&self, name: &str, arguments: &[HostValue]) -> Result<HostValue> {
        let function = self.get_property(name)?;
        let engine = self.engine();
        let mut values = vec![self.try_clone()?];
        for arg in arguments {
            values.push(Self::from_host(Arc::clone(engine), arg)?);
        }
        let refs: Vec<&JsValue> = values.iter().collect();
        function.call_values(&refs)?.detach_value()
    }

    /// [`call_function`](Self::call_function) coerced to `T`; any failure is
    /// `None`.
    pub fn try_call_function<T: FromHost>(&self, name: &str, arguments: &[HostValue]) -> Option<T> {
        let result = self
            .call_function(name, arguments)
            .inspect_err(|e| debug!("Calling '{name}' failed: {e}"))
            .ok()?;
        T::from_host(&result)
    }
}

impl PartialEq for JsValue {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}

impl fmt::Debug for JsValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsValue")
            .field("handle", &self.handle)
            .field("value_type", &self.value_type)
            .finish()
    }
}

impl fmt::Display for JsValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value_type {
            JsValueType::Undefined | JsValueType::Null => write!(f, "{}", self.value_type),
            value_type => match self.value() {
                Ok(value) => write!(f, "{value_type}: {value}"),
                Err(_) => write!(f, "{value_type}"),
            },
        }
    }
}
