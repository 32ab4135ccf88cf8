//! Wasmtime-backed implementation of the trestle native engine seam.
//!
//! [`WasmtimeEngine`] compiles and instantiates components (binary Wasm or
//! WAT) with the component model enabled and WASI p2 pre-linked, and
//! services the bridge's four primitives: instantiate, invoke, and the
//! bounded error-buffer drain pair. Instance release is `Drop`.
//!
//! Only scalar values cross the boundary by address; anything richer in a
//! signature fails the invoke with a recorded message.

mod abi;
mod wasi;

pub use wasi::WasiState;

use std::iter::zip;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::Context as _;
use trestle_bridge::{ArgPtr, Engine, EngineInstance};
use wasmtime::Store;
use wasmtime::component::{Component, Instance as ComponentInstance, Linker, Val};

/// Shared wasmtime engine and pre-wired WASI linker.
///
/// Calls are blocking and synchronous by design: each instance keeps one
/// `Store`, reused across calls behind a mutex. There is no timeout — a
/// hung guest call hangs the caller.
pub struct WasmtimeEngine {
    engine: wasmtime::Engine,
    linker: Linker<WasiState>,
    pending: Arc<Mutex<Option<String>>>,
}

impl WasmtimeEngine {
    pub fn new() -> anyhow::Result<Self> {
        let mut config = wasmtime::Config::new();
        config.wasm_component_model(true);
        let engine = wasmtime::Engine::new(&config)?;

        let mut linker: Linker<WasiState> = Linker::new(&engine);
        wasmtime_wasi::p2::add_to_linker_sync(&mut linker).context("failed to link WASI")?;

        tracing::debug!("wasmtime engine initialized (component model, WASI p2, sync)");
        Ok(Self {
            engine,
            linker,
            pending: Arc::new(Mutex::new(None)),
        })
    }

    fn try_instantiate(&self, wasm: &[u8]) -> anyhow::Result<LiveInstance> {
        let component =
            Component::new(&self.engine, wasm).context("failed to compile component")?;
        let mut store = Store::new(&self.engine, WasiState::new());
        let instance = self
            .linker
            .instantiate(&mut store, &component)
            .context("failed to instantiate component")?;
        Ok(LiveInstance {
            state: Mutex::new(CallState { store, instance }),
            pending: Arc::clone(&self.pending),
        })
    }
}

impl Default for WasmtimeEngine {
    fn default() -> Self {
        Self::new().expect("WasmtimeEngine::new should not fail with default config")
    }
}

impl Engine for WasmtimeEngine {
    fn instantiate(&self, wasm: &[u8]) -> Option<Box<dyn EngineInstance>> {
        match self.try_instantiate(wasm) {
            Ok(live) => Some(Box::new(live)),
            Err(err) => {
                tracing::debug!("instantiation failed: {err:#}");
                *lock(&self.pending) = Some(format!("{err:#}"));
                None
            }
        }
    }

    fn error_len(&self) -> usize {
        lock(&self.pending).as_ref().map_or(0, String::len)
    }

    fn error_take(&self, buf: &mut [u8]) -> usize {
        match lock(&self.pending).take() {
            Some(msg) => {
                let n = msg.len().min(buf.len());
                buf[..n].copy_from_slice(&msg.as_bytes()[..n]);
                n
            }
            None => 0,
        }
    }
}

struct CallState {
    store: Store<WasiState>,
    instance: ComponentInstance,
}

struct LiveInstance {
    state: Mutex<CallState>,
    pending: Arc<Mutex<Option<String>>>,
}

impl LiveInstance {
    fn try_invoke(&self, module: &str, function: &str, args: &[ArgPtr]) -> anyhow::Result<()> {
        let mut state = lock(&self.state);
        let CallState { store, instance } = &mut *state;

        // Two-level export lookup: exported instance, then function.
        // An empty module name addresses a top-level function export.
        let func = if module.is_empty() {
            instance.get_func(&mut *store, function)
        } else {
            instance
                .get_export_index(&mut *store, None, module)
                .and_then(|ns| instance.get_export_index(&mut *store, Some(&ns), function))
                .and_then(|idx| instance.get_func(&mut *store, &idx))
        };
        let func =
            func.with_context(|| format!("function export `{module}#{function}` not found"))?;

        let param_tys = func.params(&mut *store);
        let result_tys = func.results(&mut *store);
        anyhow::ensure!(
            args.len() == param_tys.len() + result_tys.len(),
            "expected {} argument addresses for `{module}#{function}`, got {}",
            param_tys.len() + result_tys.len(),
            args.len(),
        );

        let (param_addrs, result_addrs) = args.split_at(param_tys.len());
        let params = zip(param_tys.iter(), param_addrs)
            .map(|((name, ty), addr)| {
                unsafe { abi::lift(ty, *addr) }
                    .with_context(|| format!("failed to read parameter `{name}`"))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        let mut results = vec![Val::Bool(false); result_tys.len()];
        func.call(&mut *store, &params, &mut results)
            .context("failed to call function")?;
        func.post_return(&mut *store)
            .context("failed to invoke `post-return`")?;

        for (val, addr) in zip(&results, result_addrs) {
            unsafe { abi::lower(val, *addr) }.context("failed to write result")?;
        }
        Ok(())
    }
}

impl EngineInstance for LiveInstance {
    unsafe fn invoke(&self, module: &str, function: &str, args: &[ArgPtr]) -> bool {
        match self.try_invoke(module, function, args) {
            Ok(()) => true,
            Err(err) => {
                tracing::debug!(module, function, "invoke failed: {err:#}");
                *lock(&self.pending) = Some(format!("{err:#}"));
                false
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_bytes_fail_instantiation_and_record_a_message() {
        let engine = WasmtimeEngine::new().unwrap();
        assert!(engine.instantiate(b"\0not wasm").is_none());

        let len = engine.error_len();
        assert!(len > 0);
        let mut buf = vec![0u8; len];
        let n = engine.error_take(&mut buf);
        assert_eq!(n, len);
        // Drained: nothing pending afterwards.
        assert_eq!(engine.error_len(), 0);
    }

    #[test]
    fn error_take_is_bounded_by_the_caller_buffer() {
        let engine = WasmtimeEngine::new().unwrap();
        assert!(engine.instantiate(b"\0not wasm").is_none());

        let mut buf = [0u8; 4];
        assert_eq!(engine.error_take(&mut buf), 4);
    }

    #[test]
    fn empty_component_instantiates() {
        let engine = WasmtimeEngine::new().unwrap();
        assert!(engine.instantiate(b"(component)").is_some());
        assert_eq!(engine.error_len(), 0);
    }

    #[test]
    fn invoke_of_missing_export_fails_with_message() {
        let engine = WasmtimeEngine::new().unwrap();
        let instance = engine.instantiate(b"(component)").unwrap();
        assert!(!unsafe { instance.invoke("mymodule", "myfn", &[]) });

        let len = engine.error_len();
        assert!(len > 0);
        let mut buf = vec![0u8; len];
        engine.error_take(&mut buf);
        let msg = String::from_utf8_lossy(&buf);
        assert!(msg.contains("not found"), "unexpected message: {msg}");
    }
}
