//! Test doubles for the native engine seam.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::engine::{ArgPtr, Engine, EngineInstance};

pub(crate) enum InvokeBehavior {
    /// Copy the `u32` at the first address into the second address.
    Identity,
    /// Fail, seeding the error buffer with the message, if any.
    Fail(Option<String>),
}

pub(crate) struct MockEngine {
    pending: Arc<Mutex<Option<Vec<u8>>>>,
    behavior: Arc<InvokeBehavior>,
    fail_instantiation: Option<String>,
    pub(crate) instantiations: AtomicUsize,
}

impl MockEngine {
    pub(crate) fn identity() -> Self {
        Self::with(InvokeBehavior::Identity, None)
    }

    pub(crate) fn failing_instantiation(msg: &str) -> Self {
        Self::with(InvokeBehavior::Identity, Some(msg.to_string()))
    }

    pub(crate) fn failing_invoke(msg: &str) -> Self {
        Self::with(InvokeBehavior::Fail(Some(msg.to_string())), None)
    }

    pub(crate) fn failing_invoke_silently() -> Self {
        Self::with(InvokeBehavior::Fail(None), None)
    }

    fn with(behavior: InvokeBehavior, fail_instantiation: Option<String>) -> Self {
        Self {
            pending: Arc::new(Mutex::new(None)),
            behavior: Arc::new(behavior),
            fail_instantiation,
            instantiations: AtomicUsize::new(0),
        }
    }
}

impl Engine for MockEngine {
    fn instantiate(&self, _wasm: &[u8]) -> Option<Box<dyn EngineInstance>> {
        self.instantiations.fetch_add(1, Ordering::SeqCst);
        if let Some(msg) = &self.fail_instantiation {
            *self.pending.lock().unwrap() = Some(msg.clone().into_bytes());
            return None;
        }
        Some(Box::new(MockInstance {
            pending: Arc::clone(&self.pending),
            behavior: Arc::clone(&self.behavior),
        }))
    }

    fn error_len(&self) -> usize {
        self.pending.lock().unwrap().as_ref().map_or(0, Vec::len)
    }

    fn error_take(&self, buf: &mut [u8]) -> usize {
        match self.pending.lock().unwrap().take() {
            Some(msg) => {
                let n = msg.len().min(buf.len());
                buf[..n].copy_from_slice(&msg[..n]);
                n
            }
            None => 0,
        }
    }
}

struct MockInstance {
    pending: Arc<Mutex<Option<Vec<u8>>>>,
    behavior: Arc<InvokeBehavior>,
}

impl EngineInstance for MockInstance {
    unsafe fn invoke(&self, _module: &str, _function: &str, args: &[ArgPtr]) -> bool {
        match &*self.behavior {
            InvokeBehavior::Identity => {
                if let &[param, result] = args {
                    unsafe { *result.cast::<u32>() = *param.cast::<u32>() };
                }
                true
            }
            InvokeBehavior::Fail(msg) => {
                if let Some(msg) = msg {
                    *self.pending.lock().unwrap() = Some(msg.clone().into_bytes());
                }
                false
            }
        }
    }
}
