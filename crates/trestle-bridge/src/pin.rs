use crate::engine::ArgPtr;

/// Call-scoped set of pinned argument addresses.
///
/// The native side may only dereference argument addresses while a call is
/// in flight, so every address handed to
/// [`Instance::call`](crate::Instance::call) must stay valid for exactly
/// that window. `PinSet` is the stack-scoped guard enforcing it: addresses
/// are registered before the crossing and released when the guard is
/// dropped, on every exit path. Holding the guard longer than the call
/// wastes nothing but is pointless; releasing it earlier would hand the
/// native side dangling addresses.
///
/// Registering an address does not extend the pinned value's lifetime:
/// dispatch ([`Instance::call`](crate::Instance::call)) is `unsafe`, and the
/// caller vouches that every pinned value outlives the call.
#[derive(Debug, Default)]
pub struct PinSet {
    addrs: Vec<ArgPtr>,
}

impl PinSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin `value` and return its address.
    pub fn pin<T>(&mut self, value: &mut T) -> ArgPtr {
        self.pin_raw((value as *mut T).cast())
    }

    /// Register an already pointer-shaped value; the address crosses the
    /// boundary unchanged.
    pub fn pin_raw(&mut self, addr: ArgPtr) -> ArgPtr {
        self.addrs.push(addr);
        addr
    }

    pub fn len(&self) -> usize {
        self.addrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addrs.is_empty()
    }
}

impl Drop for PinSet {
    fn drop(&mut self) {
        tracing::trace!(pins = self.addrs.len(), "released pinned arguments");
        self.addrs.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pin_returns_stable_address() {
        let mut value = 7u32;
        let mut pins = PinSet::new();
        let addr = pins.pin(&mut value);
        assert_eq!(addr, &raw mut value as ArgPtr);
        assert_eq!(pins.len(), 1);
    }

    #[test]
    fn pin_raw_passes_address_unchanged() {
        let mut value = 7u32;
        let ptr = (&raw mut value).cast::<core::ffi::c_void>();
        let mut pins = PinSet::new();
        assert_eq!(pins.pin_raw(ptr), ptr);
    }
}
