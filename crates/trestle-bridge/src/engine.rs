use core::ffi::c_void;

/// Raw address of a pinned argument, stable for the duration of one call.
pub type ArgPtr = *mut c_void;

/// The native engine boundary.
///
/// The bridge consumes the embedded component runtime exclusively through
/// this seam: instantiation, synchronous invocation on the returned
/// instance, and the bounded error-buffer drain protocol. Instance release
/// is deterministic: dropping the [`EngineInstance`] releases the native
/// object.
pub trait Engine: Send + Sync {
    /// Instantiate a component from its binary (or text) encoding.
    ///
    /// `None` signals failure; detail is retrievable through the error
    /// buffer.
    fn instantiate(&self, wasm: &[u8]) -> Option<Box<dyn EngineInstance>>;

    /// Length in bytes of the pending error message, 0 if none.
    fn error_len(&self) -> usize;

    /// Drain up to `buf.len()` bytes of the pending error message into
    /// `buf`, returning the number of bytes written. 0 means nothing was
    /// pending.
    fn error_take(&self, buf: &mut [u8]) -> usize;
}

/// One live component instance inside the native engine.
pub trait EngineInstance: Send + Sync {
    /// Synchronously invoke `function` exported under `module`.
    ///
    /// `args` holds the pinned parameter addresses followed by the pinned
    /// result addresses; the native side may only dereference them while
    /// the call is in flight. `false` signals failure; detail is
    /// retrievable through the owning engine's error buffer.
    ///
    /// # Safety
    ///
    /// Every address in `args` must point to live, properly aligned storage
    /// matching the export's signature, valid for reads (parameters) and
    /// writes (results) until the call returns.
    unsafe fn invoke(&self, module: &str, function: &str, args: &[ArgPtr]) -> bool;
}
