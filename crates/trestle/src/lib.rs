//! Host-side harness for calling into an embedded component runtime.
//!
//! This crate is the surface generated trampolines are written against: a
//! process-wide default [`Bridge`] over the wasmtime-backed engine, the
//! bundled default component, and free functions delegating to that bridge.
//! Tests and embedders substitute the active instance or error policy with
//! the scoped [`with_instance`] / [`with_error_handler`] overrides, or
//! construct their own [`Bridge`] and bypass the default entirely.
//!
//! A generated trampoline body looks like:
//!
//! ```ignore
//! pub fn myfn(x: u32) -> u32 {
//!     let mut x = x;
//!     let mut ret: u32 = ::core::default::Default::default();
//!     let mut __pins = ::trestle::PinSet::new();
//!     let __res = ::trestle::with_current_instance(|__instance| unsafe {
//!         __instance.call("mymodule", "myfn", &[__pins.pin(&mut x), __pins.pin(&mut ret)])
//!     });
//!     drop(__pins);
//!     if let Err(__err) = __res {
//!         ::trestle::current_error_handler()(__err);
//!     }
//!     ret
//! }
//! ```

use std::sync::{Arc, LazyLock};

pub use trestle_bridge::{
    ArgPtr, Bridge, Engine, EngineInstance, Error, ErrorHandler, Instance, PinSet,
};
pub use trestle_engine::WasmtimeEngine;

/// The bundled default component (WAT text), instantiated lazily on first
/// use when no instance has been configured.
///
/// It instantiates cleanly but exports nothing, so any call dispatched
/// through the default instance fails export lookup and is routed to the
/// active error handler. Supply a real component via [`set_instance`] or
/// [`with_instance`] before calling trampolines.
pub static PASSTHROUGH: &[u8] = include_bytes!("passthrough.wat");

static BRIDGE: LazyLock<Bridge> =
    LazyLock::new(|| Bridge::new(Arc::new(WasmtimeEngine::default()), PASSTHROUGH));

/// The process-wide default bridge.
pub fn bridge() -> &'static Bridge {
    &BRIDGE
}

/// Instantiate `wasm` (binary Wasm or WAT) in the default engine.
pub fn new_instance(wasm: &[u8]) -> Result<Instance, Error> {
    Instance::new(bridge().engine(), wasm)
}

/// Atomically set the active instance of the default bridge, returning the
/// previous one. Safe for concurrent use.
pub fn set_instance(instance: Option<Arc<Instance>>) -> Option<Arc<Instance>> {
    bridge().set_instance(instance)
}

/// Run `f` with `instance` as the active instance of the default bridge,
/// restoring the previous one on every exit path. Safe for concurrent use,
/// but calling it again from within `f` deadlocks. Concurrent callers are
/// not blocked and observe the override while `f` runs.
pub fn with_instance<T>(instance: Option<Arc<Instance>>, f: impl FnOnce() -> T) -> T {
    bridge().with_instance(instance, f)
}

/// Run `f` with the active instance of the default bridge, lazily
/// instantiating the bundled default component if none has been configured.
pub fn with_current_instance<T>(f: impl FnOnce(&Instance) -> T) -> T {
    bridge().with_current_instance(f)
}

/// Atomically set the active error handler of the default bridge, returning
/// the previous one. Safe for concurrent use.
pub fn set_error_handler(handler: ErrorHandler) -> ErrorHandler {
    bridge().set_error_handler(handler)
}

/// Run `f` with `handler` as the active error handler of the default
/// bridge, restoring the previous one on every exit path. Safe for
/// concurrent use, but calling it again from within `f` deadlocks.
pub fn with_error_handler<T>(handler: ErrorHandler, f: impl FnOnce() -> T) -> T {
    bridge().with_error_handler(handler, f)
}

/// The currently active error handler of the default bridge.
pub fn current_error_handler() -> ErrorHandler {
    bridge().current_error_handler()
}

/// Run `f` with the active instance materialized and an error handler that
/// panics, so test frameworks report bridge failures as test failures.
///
/// Safe for concurrent use, but calling it from within `f` deadlocks.
pub fn run_test(f: impl FnOnce()) {
    with_error_handler(
        Arc::new(|err| panic!("failed to call instance: {err}")),
        || {
            with_current_instance(|_| ());
            f();
        },
    );
}
