//! GPIO line handles.
//!
//! A [`Gpio`] wraps one requested line and exposes mode, value, polarity
//! and debounce control plus two interrupt styles: blocking
//! [`Gpio::wait_for_interrupt`] and background listener dispatch via
//! [`Gpio::register_interrupt_callback`]. The two styles share the single
//! native waiter per line and must not be mixed on the same handle.
//!
//! Releasing a handle (drop or [`Gpio::release`]) always stops background
//! dispatch before the native line is freed.

use std::ffi::CString;
use std::fmt;
use std::time::Duration;

use libc::EXIT_SUCCESS;
use log::debug;

use crate::backend::{ApixBackend, GpioLine};
use crate::error::GpioError;
use crate::ffi;

mod dispatcher;

pub use dispatcher::InterruptCallback;
use dispatcher::InterruptDispatcher;

/// Line direction and trigger configuration (`gpio_mode_t`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpioMode {
    /// Input, sampled with [`Gpio::value`].
    Input,
    /// Output, driven low on request.
    OutputLow,
    /// Output, driven high on request.
    OutputHigh,
    /// Interrupt input triggering on rising edges.
    IrqEdgeRising,
    /// Interrupt input triggering on falling edges.
    IrqEdgeFalling,
    /// Interrupt input triggering on both edges.
    IrqEdgeBoth,
}

impl GpioMode {
    /// `true` for the three interrupt trigger modes.
    pub fn is_irq(self) -> bool {
        matches!(
            self,
            GpioMode::IrqEdgeRising
                | GpioMode::IrqEdgeFalling
                | GpioMode::IrqEdgeBoth
        )
    }

    /// Native `gpio_mode_t` value.
    pub fn code(self) -> i32 {
        match self {
            GpioMode::Input => 0,
            GpioMode::OutputLow => 1,
            GpioMode::OutputHigh => 2,
            GpioMode::IrqEdgeRising => 3,
            GpioMode::IrqEdgeFalling => 4,
            GpioMode::IrqEdgeBoth => 5,
        }
    }

    pub(crate) fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(GpioMode::Input),
            1 => Some(GpioMode::OutputLow),
            2 => Some(GpioMode::OutputHigh),
            3 => Some(GpioMode::IrqEdgeRising),
            4 => Some(GpioMode::IrqEdgeFalling),
            5 => Some(GpioMode::IrqEdgeBoth),
            _ => None,
        }
    }
}

/// Logical line level (`gpio_value_t`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpioValue {
    Low,
    High,
}

impl GpioValue {
    /// Native `gpio_value_t` value.
    pub fn code(self) -> i32 {
        match self {
            GpioValue::Low => 0,
            GpioValue::High => 1,
        }
    }

    pub(crate) fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(GpioValue::Low),
            1 => Some(GpioValue::High),
            _ => None,
        }
    }
}

/// Polarity mapping between logical value and electrical level
/// (`gpio_active_mode_t`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpioActiveMode {
    /// Logical high is electrical high.
    High,
    /// Logical high is electrical low.
    Low,
}

impl GpioActiveMode {
    /// Native `gpio_active_mode_t` value.
    pub fn code(self) -> i32 {
        match self {
            GpioActiveMode::High => 0,
            GpioActiveMode::Low => 1,
        }
    }

    pub(crate) fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(GpioActiveMode::High),
            1 => Some(GpioActiveMode::Low),
            _ => None,
        }
    }
}

/// Sharing behavior when requesting a line (`request_mode_t`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    /// Use the line even if it is already exported. On free the line is
    /// only unexported if this request exported it.
    Shared,
    /// Export unconditionally; always unexport on free.
    Greedy,
    /// Fail if the line is already exported; unexport on free.
    Weak,
}

impl RequestMode {
    /// Native `request_mode_t` value.
    pub fn code(self) -> i32 {
        match self {
            RequestMode::Shared => 0,
            RequestMode::Greedy => 1,
            RequestMode::Weak => 2,
        }
    }
}

/// Outcome of a blocking [`Gpio::wait_for_interrupt`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitResult {
    /// An edge matching the configured trigger arrived.
    Interrupt,
    /// The timeout elapsed first. A normal outcome, not an error.
    Timeout,
}

/// A requested GPIO line.
pub struct Gpio {
    native: Box<dyn GpioLine>,
    request_mode: RequestMode,
    dispatcher: InterruptDispatcher,
}

impl Gpio {
    /// Requests a line by sysfs kernel number.
    pub fn request(
        backend: &dyn ApixBackend,
        kernel_number: u32,
        mode: GpioMode,
        request_mode: RequestMode,
    ) -> Result<Self, GpioError> {
        let native = backend
            .gpio_request(kernel_number, mode.code(), request_mode.code())
            .ok_or_else(|| GpioError::Request {
                identity: kernel_number.to_string(),
            })?;
        debug!("requested GPIO {kernel_number} in mode {mode:?}");
        Ok(Self::wrap(native, request_mode))
    }

    /// Requests a line by controller chip name and line offset.
    ///
    /// The native layer always grants these requests shared.
    pub fn request_by_controller(
        backend: &dyn ApixBackend,
        controller: &str,
        line: u8,
        mode: GpioMode,
    ) -> Result<Self, GpioError> {
        let controller_c = to_cstring("controller", controller)?;
        let native = backend
            .gpio_request_by_controller(&controller_c, line, mode.code())
            .ok_or_else(|| GpioError::Request {
                identity: format!("{controller}:{line}"),
            })?;
        debug!("requested GPIO {controller}:{line} in mode {mode:?}");
        Ok(Self::wrap(native, RequestMode::Shared))
    }

    /// Requests a line by device-tree alias.
    pub fn request_by_alias(
        backend: &dyn ApixBackend,
        alias: &str,
        mode: GpioMode,
        request_mode: RequestMode,
    ) -> Result<Self, GpioError> {
        let alias_c = to_cstring("alias", alias)?;
        let native = backend
            .gpio_request_by_alias(&alias_c, mode.code(), request_mode.code())
            .ok_or_else(|| GpioError::Request {
                identity: format!("alias '{alias}'"),
            })?;
        debug!("requested GPIO alias '{alias}' in mode {mode:?}");
        Ok(Self::wrap(native, request_mode))
    }

    fn wrap(native: Box<dyn GpioLine>, request_mode: RequestMode) -> Self {
        Self {
            native,
            request_mode,
            dispatcher: InterruptDispatcher::new(),
        }
    }

    /// Sysfs kernel number of the line.
    pub fn kernel_number(&self) -> u32 {
        self.native.kernel_number()
    }

    /// Device-tree alias the line was requested by, if any.
    pub fn alias(&self) -> Option<String> {
        self.native.alias()
    }

    /// Controller chip the line belongs to, when the native layer knows
    /// it.
    pub fn controller(&self) -> Option<String> {
        self.native.controller()
    }

    /// Line offset within the controller.
    pub fn line(&self) -> u32 {
        self.native.line()
    }

    /// Sharing mode the line was requested with.
    pub fn request_mode(&self) -> RequestMode {
        self.request_mode
    }

    /// Reconfigures the line.
    ///
    /// Moving away from an interrupt mode stops background dispatch
    /// first. Listeners stay registered; once the line is back in an
    /// interrupt mode, [`Gpio::restart_interrupt_dispatch`] picks them up
    /// again.
    pub fn set_mode(&self, mode: GpioMode) -> Result<(), GpioError> {
        if !mode.is_irq() {
            self.dispatcher.stop(self.native.as_ref());
        }
        check(self.native.set_mode(mode.code()), "set the mode")
    }

    /// Reads the current mode back from the native layer.
    pub fn mode(&self) -> Result<GpioMode, GpioError> {
        GpioMode::from_code(self.native.mode()).ok_or(
            GpioError::Configuration {
                operation: "read the mode",
            },
        )
    }

    /// Drives an output line to the given logical value.
    pub fn set_value(&self, value: GpioValue) -> Result<(), GpioError> {
        check(self.native.set_value(value.code()), "set the value")
    }

    /// Samples the line.
    pub fn value(&self) -> Result<GpioValue, GpioError> {
        GpioValue::from_code(self.native.value()).ok_or(
            GpioError::Configuration {
                operation: "read the value",
            },
        )
    }

    /// Sets the polarity.
    pub fn set_active_mode(
        &self,
        mode: GpioActiveMode,
    ) -> Result<(), GpioError> {
        check(
            self.native.set_active_mode(mode.code()),
            "set the active mode",
        )
    }

    /// Reads the polarity.
    pub fn active_mode(&self) -> Result<GpioActiveMode, GpioError> {
        GpioActiveMode::from_code(self.native.active_mode()).ok_or(
            GpioError::Configuration {
                operation: "read the active mode",
            },
        )
    }

    /// Configures the debounce filter.
    ///
    /// Native granularity is microseconds; finer fractions are truncated.
    pub fn set_debounce(&self, period: Duration) -> Result<(), GpioError> {
        let usec = u32::try_from(period.as_micros()).map_err(|_| {
            GpioError::Validation(format!(
                "debounce period {period:?} exceeds the 32-bit microsecond range"
            ))
        })?;
        check(self.native.set_debounce(usec), "set the debounce period")
    }

    /// Blocks until an interrupt arrives or the timeout elapses. `None`
    /// waits forever.
    ///
    /// An elapsed timeout is reported as [`WaitResult::Timeout`], not as
    /// an error. The native layer supports one waiter per line, so mixing
    /// this call with background dispatch on the same handle is a caller
    /// error.
    pub fn wait_for_interrupt(
        &self,
        timeout: Option<Duration>,
    ) -> Result<WaitResult, GpioError> {
        let timeout_ms = match timeout {
            None => -1,
            Some(period) => i32::try_from(period.as_millis()).map_err(|_| {
                GpioError::Validation(format!(
                    "timeout {period:?} exceeds the 32-bit millisecond range"
                ))
            })?,
        };
        match self.native.wait_interrupt(timeout_ms) {
            ffi::GPIO_IRQ_ERROR_NONE => Ok(WaitResult::Interrupt),
            ffi::GPIO_IRQ_ERROR_TIMEOUT => Ok(WaitResult::Timeout),
            code => Err(GpioError::Wait { code }),
        }
    }

    /// Registers a listener for background interrupt dispatch.
    ///
    /// The first listener starts the native wait thread. Listener
    /// identity is the `Arc` allocation: registering a clone of an `Arc`
    /// that is already registered fails with
    /// [`GpioError::CallbackAlreadyRegistered`]. When the native start
    /// fails the listener stays registered and the error carries the
    /// native code.
    pub fn register_interrupt_callback(
        &self,
        callback: InterruptCallback,
    ) -> Result<(), GpioError> {
        self.dispatcher.register(self.native.as_ref(), callback)
    }

    /// Removes a previously registered listener. Removing the last one
    /// stops the native wait thread.
    pub fn remove_interrupt_callback(
        &self,
        callback: &InterruptCallback,
    ) -> Result<(), GpioError> {
        self.dispatcher.remove(self.native.as_ref(), callback)
    }

    /// Starts background dispatch again after a stop, typically after the
    /// line was switched back into an interrupt mode.
    ///
    /// Fails with [`GpioError::CallbackNotRegistered`] when no listeners
    /// are registered. A no-op while dispatch is already running.
    pub fn restart_interrupt_dispatch(&self) -> Result<(), GpioError> {
        self.dispatcher.restart(self.native.as_ref())
    }

    /// Whether the background wait thread is currently armed.
    pub fn interrupt_dispatch_running(&self) -> bool {
        self.dispatcher.is_running()
    }

    /// Number of registered interrupt listeners.
    pub fn interrupt_callback_count(&self) -> usize {
        self.dispatcher.callback_count()
    }

    /// Releases the line immediately instead of waiting for drop.
    ///
    /// Background dispatch stops first, then the native line is freed
    /// honoring the sharing mode it was requested with.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for Gpio {
    fn drop(&mut self) {
        // dispatch must be gone before the native free tears down the
        // line the wait thread polls
        self.dispatcher.stop(self.native.as_ref());
    }
}

impl fmt::Debug for Gpio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gpio")
            .field("kernel_number", &self.native.kernel_number())
            .field("request_mode", &self.request_mode)
            .field("dispatch_running", &self.dispatcher.is_running())
            .finish()
    }
}

fn check(rc: i32, operation: &'static str) -> Result<(), GpioError> {
    if rc == EXIT_SUCCESS {
        Ok(())
    } else {
        Err(GpioError::Configuration { operation })
    }
}

fn to_cstring(field: &str, value: &str) -> Result<CString, GpioError> {
    if value.is_empty() {
        return Err(GpioError::Validation(format!(
            "`{field}` must be a non-empty string"
        )));
    }
    CString::new(value).map_err(|_| {
        GpioError::Validation(format!("`{field}` must not contain NUL bytes"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_codes_match_the_native_enum() {
        assert_eq!(GpioMode::Input.code(), 0);
        assert_eq!(GpioMode::OutputLow.code(), 1);
        assert_eq!(GpioMode::OutputHigh.code(), 2);
        assert_eq!(GpioMode::IrqEdgeRising.code(), 3);
        assert_eq!(GpioMode::IrqEdgeFalling.code(), 4);
        assert_eq!(GpioMode::IrqEdgeBoth.code(), 5);

        for code in 0..=5 {
            assert_eq!(GpioMode::from_code(code).map(GpioMode::code), Some(code));
        }
        assert_eq!(GpioMode::from_code(6), None);
        assert_eq!(GpioMode::from_code(-1), None);
    }

    #[test]
    fn only_edge_modes_are_irq() {
        assert!(!GpioMode::Input.is_irq());
        assert!(!GpioMode::OutputLow.is_irq());
        assert!(!GpioMode::OutputHigh.is_irq());
        assert!(GpioMode::IrqEdgeRising.is_irq());
        assert!(GpioMode::IrqEdgeFalling.is_irq());
        assert!(GpioMode::IrqEdgeBoth.is_irq());
    }

    #[test]
    fn value_and_active_mode_codes_are_distinct_tables() {
        assert_eq!(GpioValue::from_code(1), Some(GpioValue::High));
        assert_eq!(GpioValue::from_code(2), None);
        assert_eq!(GpioActiveMode::from_code(1), Some(GpioActiveMode::Low));
        assert_eq!(GpioActiveMode::from_code(-1), None);
    }

    #[test]
    fn request_mode_codes_match_the_native_enum() {
        assert_eq!(RequestMode::Shared.code(), 0);
        assert_eq!(RequestMode::Greedy.code(), 1);
        assert_eq!(RequestMode::Weak.code(), 2);
    }

    #[test]
    fn string_arguments_are_validated() {
        assert!(matches!(
            to_cstring("alias", ""),
            Err(GpioError::Validation(_))
        ));
        assert!(matches!(
            to_cstring("alias", "led\0red"),
            Err(GpioError::Validation(_))
        ));
        assert!(to_cstring("alias", "user-led").is_ok());
    }
}
