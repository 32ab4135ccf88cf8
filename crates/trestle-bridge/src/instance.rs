use std::sync::Arc;

use crate::engine::{ArgPtr, Engine};
use crate::error::Error;

/// An instantiated component in the native engine.
///
/// Exclusively owns one native instance object; the native object is
/// released deterministically when the `Instance` is dropped. At most one
/// instance is tracked as *active* by a [`Bridge`](crate::Bridge) at a
/// time, but callers may hold any number directly.
pub struct Instance {
    engine: Arc<dyn Engine>,
    inner: Box<dyn crate::engine::EngineInstance>,
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance").finish_non_exhaustive()
    }
}

impl Instance {
    /// Instantiate `wasm` in `engine`.
    pub fn new(engine: Arc<dyn Engine>, wasm: &[u8]) -> Result<Self, Error> {
        match engine.instantiate(wasm) {
            Some(inner) => Ok(Self { engine, inner }),
            None => Err(Error::Instantiation(drain_error(engine.as_ref()))),
        }
    }

    /// Call `function` exported under `module` with pinned argument
    /// addresses, blocking until the native call returns.
    ///
    /// On native failure the pending error message is drained through the
    /// bounded two-step protocol and wrapped into the returned error.
    ///
    /// # Safety
    ///
    /// Every address in `args` must point to live, properly aligned storage
    /// matching the export's signature, valid for reads (parameters) and
    /// writes (results) until the call returns. [`PinSet`](crate::PinSet)
    /// produces such addresses as long as the pinned values outlive the
    /// call.
    pub unsafe fn call(&self, module: &str, function: &str, args: &[ArgPtr]) -> Result<(), Error> {
        tracing::trace!(module, function, args = args.len(), "dispatching boundary call");
        if unsafe { self.inner.invoke(module, function, args) } {
            Ok(())
        } else {
            Err(Error::Invocation {
                module: module.to_string(),
                function: function.to_string(),
                detail: drain_error(self.engine.as_ref()),
            })
        }
    }

    /// The engine this instance lives in.
    pub fn engine(&self) -> &Arc<dyn Engine> {
        &self.engine
    }
}

/// Bounded two-step drain of the native error buffer: query the pending
/// message length, then take up to that many bytes into a caller-allocated
/// buffer. `None` when nothing was pending.
fn drain_error(engine: &dyn Engine) -> Option<String> {
    let len = engine.error_len();
    if len == 0 {
        return None;
    }
    let mut buf = vec![0u8; len];
    let n = engine.error_take(&mut buf);
    if n == 0 {
        return None;
    }
    buf.truncate(n);
    Some(String::from_utf8_lossy(&buf).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockEngine;

    #[test]
    fn instantiation_failure_drains_pending_message() {
        let engine = Arc::new(MockEngine::failing_instantiation("bad component"));
        let err = Instance::new(engine, b"\0garbage").unwrap_err();
        assert_eq!(err.detail(), Some("bad component"));
        assert!(err.to_string().contains("failed to instantiate component"));
    }

    #[test]
    fn call_failure_preserves_drained_text_exactly() {
        let engine = Arc::new(MockEngine::failing_invoke("export `nope` not found"));
        let instance = Instance::new(engine, b"wasm").unwrap();
        let err = unsafe { instance.call("mymodule", "myfn", &[]) }.unwrap_err();
        assert_eq!(err.detail(), Some("export `nope` not found"));
        assert!(err.to_string().contains("mymodule#myfn"));
    }

    #[test]
    fn call_failure_without_pending_message_is_generic_but_non_empty() {
        let engine = Arc::new(MockEngine::failing_invoke_silently());
        let instance = Instance::new(engine, b"wasm").unwrap();
        let err = unsafe { instance.call("mymodule", "myfn", &[]) }.unwrap_err();
        assert_eq!(err.detail(), None);
        assert!(!err.to_string().is_empty());
        assert!(err.to_string().contains("no error reported"));
    }

    #[test]
    fn successful_call_leaves_no_error() {
        let engine = Arc::new(MockEngine::identity());
        let instance = Instance::new(engine, b"wasm").unwrap();
        let mut x = 42u32;
        let mut ret = 0u32;
        let mut pins = crate::PinSet::new();
        let args = [pins.pin(&mut x), pins.pin(&mut ret)];
        unsafe { instance.call("mymodule", "myfn", &args) }.unwrap();
        drop(pins);
        assert_eq!(ret, 42);
    }
}
