//! Runtime bridge between host code and the embedded component runtime.
//!
//! Generated trampolines reach the native engine exclusively through this
//! crate: [`Bridge`] owns the single active [`Instance`] and the active
//! [`ErrorHandler`], both swappable atomically or for the scope of a
//! callback. The native engine itself is consumed through the [`Engine`]
//! trait — instantiation, synchronous invocation, and the bounded
//! error-buffer drain protocol — so embedders and tests can substitute it.
//!
//! Argument addresses handed to [`Instance::call`] must stay valid while the
//! call is in flight; [`PinSet`] is the call-scoped guard that enforces
//! this.

pub mod bridge;
pub mod engine;
pub mod error;
pub mod instance;
pub mod pin;

pub use bridge::{Bridge, ErrorHandler};
pub use engine::{ArgPtr, Engine, EngineInstance};
pub use error::Error;
pub use instance::Instance;
pub use pin::PinSet;

#[cfg(test)]
pub(crate) mod testing;
