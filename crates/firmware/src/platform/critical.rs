//! Scoped interrupt-free section for Flash mutation
//!
//! Program and erase operations are not interruptible on this class of
//! hardware: an interrupt handler that executes from (or reads) Flash while
//! a program is in flight faults or observes garbage. Every mutating store
//! operation therefore runs while holding a [`FlashGuard`].
//!
//! The guard is built on the `critical-section` crate, so the platform's
//! implementation decides what "interrupt-free" means (PRIMASK on Cortex-M,
//! a global mutex on host builds).

use core::marker::PhantomData;

/// Interrupt-free section held for the lifetime of the value
///
/// The section is released when the guard is dropped, which covers early
/// returns and error propagation with `?`.
///
/// # Example
///
/// ```
/// use delta_control_firmware::platform::FlashGuard;
///
/// {
///     let _guard = FlashGuard::acquire();
///     // program / erase here
/// } // released
/// ```
#[must_use = "the critical section is released as soon as the guard is dropped"]
pub struct FlashGuard {
    restore: critical_section::RestoreState,
    // Release must happen on the acquiring core/thread
    _not_send: PhantomData<*mut ()>,
}

impl FlashGuard {
    /// Enter the critical section
    pub fn acquire() -> Self {
        // SAFETY: The matching release runs in Drop. Guards are only created
        // as scoped locals, so nested guards drop in reverse acquisition order.
        let restore = unsafe { critical_section::acquire() };

        Self {
            restore,
            _not_send: PhantomData,
        }
    }
}

impl Drop for FlashGuard {
    fn drop(&mut self) {
        // SAFETY: `restore` came from the acquire in `FlashGuard::acquire`
        // and is released exactly once.
        unsafe { critical_section::release(self.restore) }
    }
}
