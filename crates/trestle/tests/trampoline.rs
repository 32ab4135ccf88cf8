//! Exercises the surface generated trampolines are written against, with a
//! recording engine standing in for wasmtime.

use std::sync::{Arc, Mutex};

use trestle::{ArgPtr, Engine, EngineInstance, Instance};

#[derive(Debug, Clone)]
struct Recorded {
    module: String,
    function: String,
    args: usize,
    first_arg: Option<u32>,
}

enum Behavior {
    /// Copy the `u32` at the first address into the second address.
    Identity,
    /// Fail, seeding the error buffer with the message.
    Fail(String),
}

struct RecordingEngine {
    calls: Arc<Mutex<Vec<Recorded>>>,
    pending: Arc<Mutex<Option<Vec<u8>>>>,
    behavior: Arc<Behavior>,
}

impl RecordingEngine {
    fn new(behavior: Behavior) -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            pending: Arc::new(Mutex::new(None)),
            behavior: Arc::new(behavior),
        }
    }
}

impl Engine for RecordingEngine {
    fn instantiate(&self, _wasm: &[u8]) -> Option<Box<dyn EngineInstance>> {
        Some(Box::new(RecordingInstance {
            calls: Arc::clone(&self.calls),
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

struct RecordingInstance {
    calls: Arc<Mutex<Vec<Recorded>>>,
    pending: Arc<Mutex<Option<Vec<u8>>>>,
    behavior: Arc<Behavior>,
}

impl EngineInstance for RecordingInstance {
    unsafe fn invoke(&self, module: &str, function: &str, args: &[ArgPtr]) -> bool {
        let first_arg = args.first().map(|addr| unsafe { *addr.cast::<u32>() });
        self.calls.lock().unwrap().push(Recorded {
            module: module.to_string(),
            function: function.to_string(),
            args: args.len(),
            first_arg,
        });
        match &*self.behavior {
            Behavior::Identity => {
                if let &[param, result] = args {
                    unsafe { *result.cast::<u32>() = *param.cast::<u32>() };
                }
                true
            }
            Behavior::Fail(msg) => {
                *self.pending.lock().unwrap() = Some(msg.clone().into_bytes());
                false
            }
        }
    }
}

// Shaped exactly like the output of trestle-bindgen for:
//   module = "mymodule", function = "myfn", params = [x: u32], results = [ret: u32]
fn myfn(x: u32) -> u32 {
    let mut x = x;
    let mut ret: u32 = ::core::default::Default::default();
    let mut __pins = trestle::PinSet::new();
    let __res = trestle::with_current_instance(|__instance| unsafe {
        __instance.call("mymodule", "myfn", &[__pins.pin(&mut x), __pins.pin(&mut ret)])
    });
    drop(__pins);
    if let Err(__err) = __res {
        trestle::current_error_handler()(__err);
    }
    ret
}

#[test]
fn scalar_round_trip_dispatches_exactly_one_call() {
    let engine = RecordingEngine::new(Behavior::Identity);
    let calls = Arc::clone(&engine.calls);
    let instance = Arc::new(Instance::new(Arc::new(engine), b"wasm").unwrap());

    let ret = trestle::with_instance(Some(instance), || myfn(7));

    assert_eq!(ret, 7);
    let calls = calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].module, "mymodule");
    assert_eq!(calls[0].function, "myfn");
    assert_eq!(calls[0].args, 2);
    assert_eq!(calls[0].first_arg, Some(7));
}

#[test]
fn trampoline_routes_failure_to_the_active_handler() {
    let engine = RecordingEngine::new(Behavior::Fail("guest trap".into()));
    let instance = Arc::new(Instance::new(Arc::new(engine), b"wasm").unwrap());

    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen2 = Arc::clone(&seen);
    let handler: trestle::ErrorHandler = Arc::new(move |err| {
        seen2.lock().unwrap().push(err.to_string());
    });

    let ret = trestle::with_instance(Some(instance), || {
        trestle::with_error_handler(handler, || myfn(7))
    });

    // The handler decided the failure was recoverable, so the trampoline
    // fell through to the default-initialized result.
    assert_eq!(ret, 0);
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].contains("guest trap"), "unexpected error: {}", seen[0]);
    assert!(seen[0].contains("mymodule#myfn"));
}

#[test]
fn default_component_instantiates_but_exports_nothing() {
    let instance = trestle::new_instance(trestle::PASSTHROUGH).unwrap();
    let err = unsafe { instance.call("mymodule", "myfn", &[]) }.unwrap_err();
    assert!(err.to_string().contains("not found"), "unexpected error: {err}");
}

#[test]
fn run_test_materializes_the_default_instance() {
    trestle::run_test(|| {
        // The bundled default component exports nothing; just observing a
        // fully-formed instance is the point.
        trestle::with_current_instance(|_| ());
    });
}
