//! Background interrupt dispatch for GPIO lines.
//!
//! The native library accepts exactly ONE callback registration per line
//! (`ldx_gpio_start_wait_interrupt`), invoked from a wait thread it owns.
//! This module bridges that single registration into a set of listeners:
//! the extern "C" trampoline snapshots the listener set and fans the event
//! out to every entry.
//!
//! State machine per handle: STOPPED <-> RUNNING. The first registered
//! listener starts the native wait; removing the last one stops it, as do
//! mode changes away from IRQ and handle release. The listener set, the
//! running flag and every transition share one lock, and the trampoline
//! releases that lock before invoking listeners, so listeners may register
//! or remove listeners themselves.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};

use libc::{c_int, c_void, EXIT_SUCCESS};
use log::{debug, warn};

use crate::backend::GpioLine;
use crate::error::GpioError;

/// A registered interrupt listener. Listener identity is the `Arc`
/// allocation: registering a clone of an already-registered `Arc` is the
/// duplicate case, and removal matches by the same identity.
pub type InterruptCallback = Arc<dyn Fn() + Send + Sync + 'static>;

/// The value every trampoline invocation hands back to the wait thread.
const IRQ_HANDLED: c_int = 0;

pub(crate) struct InterruptDispatcher {
    shared: Arc<DispatchShared>,
}

struct DispatchShared {
    inner: Mutex<DispatchInner>,
}

#[derive(Default)]
struct DispatchInner {
    callbacks: Vec<InterruptCallback>,
    running: bool,
}

impl DispatchShared {
    /// Callback panics never unwind through the lock (the trampoline
    /// catches them), so a poisoned guard still holds consistent state.
    fn lock_inner(&self) -> MutexGuard<'_, DispatchInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl InterruptDispatcher {
    pub(crate) fn new() -> Self {
        Self {
            shared: Arc::new(DispatchShared {
                inner: Mutex::new(DispatchInner::default()),
            }),
        }
    }

    /// Adds a listener, starting the native wait if this is the first one.
    ///
    /// On a native start failure the listener STAYS registered; the caller
    /// may fix the line mode and restart explicitly.
    pub(crate) fn register(
        &self,
        line: &dyn GpioLine,
        callback: InterruptCallback,
    ) -> Result<(), GpioError> {
        let mut inner = self.shared.lock_inner();
        if inner.callbacks.iter().any(|cb| Arc::ptr_eq(cb, &callback)) {
            return Err(GpioError::CallbackAlreadyRegistered);
        }
        inner.callbacks.push(callback);
        if !inner.running {
            self.start_locked(&mut inner, line)?;
        }
        Ok(())
    }

    /// Removes a listener, stopping the native wait when the set becomes
    /// empty.
    pub(crate) fn remove(
        &self,
        line: &dyn GpioLine,
        callback: &InterruptCallback,
    ) -> Result<(), GpioError> {
        let mut inner = self.shared.lock_inner();
        let position = inner
            .callbacks
            .iter()
            .position(|cb| Arc::ptr_eq(cb, callback))
            .ok_or(GpioError::CallbackNotRegistered)?;
        inner.callbacks.remove(position);
        if inner.callbacks.is_empty() {
            Self::stop_locked(&mut inner, line);
        }
        Ok(())
    }

    /// Stops the native wait, keeping the listener set. Idempotent.
    pub(crate) fn stop(&self, line: &dyn GpioLine) {
        let mut inner = self.shared.lock_inner();
        Self::stop_locked(&mut inner, line);
    }

    /// Starts the native wait again after a stop, provided listeners are
    /// still registered. A no-op while running.
    pub(crate) fn restart(&self, line: &dyn GpioLine) -> Result<(), GpioError> {
        let mut inner = self.shared.lock_inner();
        if inner.running {
            return Ok(());
        }
        if inner.callbacks.is_empty() {
            return Err(GpioError::CallbackNotRegistered);
        }
        self.start_locked(&mut inner, line)
    }

    pub(crate) fn is_running(&self) -> bool {
        self.shared.lock_inner().running
    }

    pub(crate) fn callback_count(&self) -> usize {
        self.shared.lock_inner().callbacks.len()
    }

    fn start_locked(
        &self,
        inner: &mut DispatchInner,
        line: &dyn GpioLine,
    ) -> Result<(), GpioError> {
        // The context stays valid until the native stop returns: the shared
        // state outlives the owning handle, and the handle stops dispatch
        // before it drops.
        let ctx = Arc::as_ptr(&self.shared) as *mut c_void;
        let rc = line.start_wait_interrupt(irq_trampoline, ctx);
        if rc != EXIT_SUCCESS {
            return Err(GpioError::InterruptStart { code: rc });
        }
        inner.running = true;
        debug!(
            "interrupt dispatch started for GPIO {}",
            line.kernel_number()
        );
        Ok(())
    }

    fn stop_locked(inner: &mut DispatchInner, line: &dyn GpioLine) {
        if !inner.running {
            return;
        }
        let rc = line.stop_wait_interrupt();
        if rc != EXIT_SUCCESS {
            // the stop result is not load-bearing; dispatch is stopped
            // regardless
            warn!(
                "native interrupt stop for GPIO {} reported {}",
                line.kernel_number(),
                rc
            );
        }
        inner.running = false;
        debug!(
            "interrupt dispatch stopped for GPIO {}",
            line.kernel_number()
        );
    }
}

/// The single callback registered with the native layer.
///
/// Runs on the native wait thread. Copies the listener set under the lock,
/// releases it, then invokes every listener; a late invocation racing a
/// stop still sees a consistent snapshot.
extern "C" fn irq_trampoline(arg: *mut c_void) -> c_int {
    if arg.is_null() {
        return IRQ_HANDLED;
    }
    // SAFETY: arg is the DispatchShared passed to start_wait_interrupt.
    // The owning handle keeps it alive and stops the wait thread before
    // dropping, so no invocation outlives the allocation.
    let shared = unsafe { &*(arg as *const DispatchShared) };
    let snapshot = shared.lock_inner().callbacks.clone();
    for callback in &snapshot {
        // a listener panic must not unwind into the native caller
        if panic::catch_unwind(AssertUnwindSafe(|| (callback.as_ref())()))
            .is_err()
        {
            warn!("interrupt callback panicked; continuing with the rest");
        }
    }
    IRQ_HANDLED
}
