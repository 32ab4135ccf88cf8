use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
};

use crate::engine::Engine;
use crate::error::Error;
use crate::instance::Instance;

/// Policy invoked with every error a generated trampoline receives from
/// [`Instance::call`]. The handler decides whether the failure is fatal;
/// the trampoline never does.
pub type ErrorHandler = Arc<dyn Fn(Error) + Send + Sync>;

/// The single program-wide channel through which generated trampolines
/// reach the native engine.
///
/// `Bridge` owns the active instance and the active error handler. Both
/// support atomic get-and-replace ([`set_instance`](Self::set_instance),
/// [`set_error_handler`](Self::set_error_handler)) and scoped
/// override-for-a-callback semantics ([`with_instance`](Self::with_instance),
/// [`with_error_handler`](Self::with_error_handler)).
///
/// # Concurrency
///
/// Each field is guarded by a reader-writer lock; reads clone an `Arc` under
/// a briefly-held read lock, so any number of callers may issue calls
/// concurrently and never block across a native call. Scoped overrides are
/// serialized by a per-field override mutex held for the duration of the
/// callback. Calling `with_instance` or `with_error_handler` recursively
/// from within the callback on the same `Bridge` deadlocks on that mutex —
/// a documented precondition, not a checked error.
pub struct Bridge {
    engine: Arc<dyn Engine>,
    default_wasm: Vec<u8>,
    instance: RwLock<Option<Arc<Instance>>>,
    instance_override: Mutex<()>,
    handler: RwLock<ErrorHandler>,
    handler_override: Mutex<()>,
}

impl Bridge {
    /// Create a bridge over `engine`. `default_wasm` is the bundled
    /// component instantiated lazily on first use if no instance has been
    /// configured.
    ///
    /// The initial error handler logs the failure and aborts the process;
    /// embedders and test harnesses are expected to swap it.
    pub fn new(engine: Arc<dyn Engine>, default_wasm: impl Into<Vec<u8>>) -> Self {
        let abort: ErrorHandler = Arc::new(|err| {
            tracing::error!("failed to call instance: {err}");
            std::process::exit(1);
        });
        Self {
            engine,
            default_wasm: default_wasm.into(),
            instance: RwLock::new(None),
            instance_override: Mutex::new(()),
            handler: RwLock::new(abort),
            handler_override: Mutex::new(()),
        }
    }

    /// The engine this bridge dispatches into.
    pub fn engine(&self) -> Arc<dyn Engine> {
        Arc::clone(&self.engine)
    }

    /// Atomically set the active instance, returning the previous one.
    /// Safe for concurrent use.
    pub fn set_instance(&self, instance: Option<Arc<Instance>>) -> Option<Arc<Instance>> {
        std::mem::replace(&mut *write(&self.instance), instance)
    }

    /// Run `f` with `instance` as the active instance, restoring the
    /// previous one on every exit path, including a panicking `f`.
    ///
    /// Only other scoped overrides are serialized against this one; plain
    /// readers are not blocked, so concurrent callers observe the override
    /// while `f` runs.
    pub fn with_instance<T>(&self, instance: Option<Arc<Instance>>, f: impl FnOnce() -> T) -> T {
        let _serial = lock(&self.instance_override);
        let prev = self.set_instance(instance);
        let _restore = Restore(Some(|| {
            self.set_instance(prev);
        }));
        f()
    }

    /// Atomically set the active error handler, returning the previous one.
    /// Safe for concurrent use.
    pub fn set_error_handler(&self, handler: ErrorHandler) -> ErrorHandler {
        std::mem::replace(&mut *write(&self.handler), handler)
    }

    /// The currently active error handler.
    pub fn current_error_handler(&self) -> ErrorHandler {
        Arc::clone(&*read(&self.handler))
    }

    /// Run `f` with `handler` as the active error handler, restoring the
    /// previous one on every exit path, including a panicking `f`.
    pub fn with_error_handler<T>(&self, handler: ErrorHandler, f: impl FnOnce() -> T) -> T {
        let _serial = lock(&self.handler_override);
        let prev = self.set_error_handler(handler);
        let _restore = Restore(Some(|| {
            self.set_error_handler(prev);
        }));
        f()
    }

    /// The active instance, lazily instantiating the bundled default
    /// component if none has been configured.
    ///
    /// Lazy initialization is double-checked: a speculative read, then a
    /// re-check under the write lock before constructing, so racing callers
    /// observe exactly one instantiation and never a partially-formed
    /// instance.
    pub fn try_current_instance(&self) -> Result<Arc<Instance>, Error> {
        if let Some(instance) = read(&self.instance).as_ref() {
            return Ok(Arc::clone(instance));
        }
        let mut slot = write(&self.instance);
        if let Some(instance) = slot.as_ref() {
            return Ok(Arc::clone(instance));
        }
        tracing::debug!("no active instance configured, instantiating default component");
        let instance = Arc::new(Instance::new(Arc::clone(&self.engine), &self.default_wasm)?);
        *slot = Some(Arc::clone(&instance));
        Ok(instance)
    }

    /// Run `f` with the active instance.
    ///
    /// If no instance was configured and instantiating the default
    /// component fails, the failure is routed through the active error
    /// handler; should that handler return instead of diverging, this
    /// panics, since there is no instance to run `f` against.
    pub fn with_current_instance<T>(&self, f: impl FnOnce(&Instance) -> T) -> T {
        match self.try_current_instance() {
            Ok(instance) => f(&instance),
            Err(err) => {
                self.current_error_handler()(err);
                panic!("no active instance after instantiation failure");
            }
        }
    }
}

/// Runs its closure on drop; used to restore swapped state on every exit
/// path of a scoped override.
struct Restore<F: FnOnce()>(Option<F>);

impl<F: FnOnce()> Drop for Restore<F> {
    fn drop(&mut self) {
        if let Some(restore) = self.0.take() {
            restore();
        }
    }
}

// A panic inside an override callback poisons nothing observable: the locks
// recover the inner value so the restore guards still see the real state.
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
