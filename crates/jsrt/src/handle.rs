//! Ownership of one engine-issued handle.

use crate::engine::{NativeEngine, RawHandle};
use crate::error::{JsError, Result, check};
use log::{trace, warn};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// What disposal does with the handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ownership {
    /// One reference added on construction, released on disposal
    Counted,
    /// The engine holds the reference; disposal only forgets the handle
    Adopted,
    /// A runtime, torn down with `JsDisposeRuntime`
    Runtime,
}

/// Owns one native handle and gives it back to the engine exactly once.
///
/// The slot is swapped to zero before the release call, so concurrent or
/// repeated [`dispose`](Self::dispose) calls and the final drop release at
/// most once between them.
pub struct NativeHandle {
    engine: Arc<dyn NativeEngine>,
    slot: AtomicUsize,
    ownership: Ownership,
}

impl NativeHandle {
    /// Wraps `handle` and adds one engine reference to it.
    ///
    /// # Errors
    ///
    /// Fails for the null handle, or when the engine rejects the add-ref.
    pub fn acquire(engine: Arc<dyn NativeEngine>, handle: RawHandle) -> Result<Self> {
        if handle == 0 {
            return Err(JsError::InvalidArgument("handle"));
        }
        let count = check(engine.as_ref(), engine.add_ref(handle))?;
        trace!("Acquired handle 0x{handle:X} (refs: {count})");
        Ok(Self {
            engine,
            slot: AtomicUsize::new(handle),
            ownership: Ownership::Counted,
        })
    }

    /// Wraps `handle` without touching its reference count. Disposal never
    /// releases it.
    ///
    /// # Errors
    ///
    /// Fails for the null handle.
    pub fn adopt(engine: Arc<dyn NativeEngine>, handle: RawHandle) -> Result<Self> {
        if handle == 0 {
            return Err(JsError::InvalidArgument("handle"));
        }
        Ok(Self {
            engine,
            slot: AtomicUsize::new(handle),
            ownership: Ownership::Adopted,
        })
    }

    /// Wraps a runtime handle, disposed with the runtime on release.
    pub(crate) fn runtime(engine: Arc<dyn NativeEngine>, handle: RawHandle) -> Self {
        Self {
            engine,
            slot: AtomicUsize::new(handle),
            ownership: Ownership::Runtime,
        }
    }

    /// The raw handle.
    ///
    /// # Errors
    ///
    /// Returns [`JsError::Disposed`] once the handle has been released.
    pub fn handle(&self) -> Result<RawHandle> {
        match self.slot.load(Ordering::Acquire) {
            0 => Err(JsError::Disposed),
            handle => Ok(handle),
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.slot.load(Ordering::Acquire) == 0
    }

    /// Whether disposal adds nothing back to the engine.
    pub fn is_adopted(&self) -> bool {
        self.ownership == Ownership::Adopted
    }

    pub fn engine(&self) -> &Arc<dyn NativeEngine> {
        &self.engine
    }

    /// Releases the handle. Later calls do nothing.
    pub fn dispose(&self) {
        let handle = self.slot.swap(0, Ordering::AcqRel);
        if handle == 0 {
            return;
        }
        match self.ownership {
            Ownership::Adopted => {}
            Ownership::Counted => match self.engine.release(handle) {
                Ok(count) => trace!("Released handle 0x{handle:X} (refs: {count})"),
                Err(code) => warn!("Failed to release handle 0x{handle:X}: {code}"),
            },
            Ownership::Runtime => match self.engine.dispose_runtime(handle) {
                Ok(()) => trace!("Disposed runtime 0x{handle:X}"),
                Err(code) => warn!("Failed to dispose runtime 0x{handle:X}: {code}"),
            },
        }
    }

    /// A second, independently counted owner of the same handle.
    ///
    /// # Errors
    ///
    /// Fails when this wrapper is disposed or the add-ref is rejected.
    pub fn try_clone(&self) -> Result<Self> {
        Self::acquire(Arc::clone(&self.engine), self.handle()?)
    }

    /// Current engine reference count, read by adding and dropping a
    /// reference.
    ///
    /// # Errors
    ///
    /// Fails when this wrapper is disposed or the engine rejects either call.
    pub fn ref_count(&self) -> Result<u32> {
        let handle = self.handle()?;
        let engine = self.engine.as_ref();
        check(engine, engine.add_ref(handle))?;
        check(engine, engine.release(handle))
    }
}

impl Drop for NativeHandle {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl PartialEq for NativeHandle {
    fn eq(&self, other: &Self) -> bool {
        let handle = self.slot.load(Ordering::Acquire);
        handle != 0 && handle == other.slot.load(Ordering::Acquire)
    }
}

impl fmt::Debug for NativeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeHandle")
            .field("handle", &format_args!("0x{:X}", self.slot.load(Ordering::Acquire)))
            .field("ownership", &self.ownership)
            .finish()
    }
}

impl fmt::Display for NativeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.slot.load(Ordering::Acquire))
    }
}
