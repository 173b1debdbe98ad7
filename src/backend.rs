//! Backend traits decoupling the safe wrappers from the loaded library.
//!
//! [`ApixBackend`] is the library-binding object created by the explicit
//! load step and handed to every component that talks to the native layer.
//! [`crate::library::ApixLibrary`] implements it over the real symbol
//! table; [`crate::mock::MockApix`] implements it in memory so the whole
//! surface can be exercised without hardware or the shared object.
//!
//! Methods mirror the native calls one to one: integer codes go in and out
//! untranslated, out-struct fills become owned mirror values, and a null
//! handle becomes `None`. Code mapping and validation stay in the domain
//! modules.

use std::ffi::CStr;

use libc::c_void;

use crate::ffi::{
    BtConfig, BtState, BtStats, GpioIrqCallback, NetConfig, NetState,
    NetStats, WifiConfig, WifiState,
};

/// One requested GPIO line, owned by the backend that produced it.
///
/// Dropping the line releases the native allocation. Callers must stop any
/// interrupt wait they started before the line is dropped; `Gpio` enforces
/// this ordering in its own `Drop`.
pub trait GpioLine: Send + Sync {
    /// Alias the line was resolved from, if any.
    fn alias(&self) -> Option<String>;
    /// Kernel number of the line.
    fn kernel_number(&self) -> u32;
    /// Controller the line belongs to, if known.
    fn controller(&self) -> Option<String>;
    /// Line offset within the controller.
    fn line(&self) -> u32;

    fn set_mode(&self, mode: i32) -> i32;
    fn mode(&self) -> i32;
    fn set_value(&self, value: i32) -> i32;
    fn value(&self) -> i32;
    fn set_active_mode(&self, mode: i32) -> i32;
    fn active_mode(&self) -> i32;
    fn set_debounce(&self, usec: u32) -> i32;

    /// Blocks until an edge, the timeout, or a native failure.
    /// `timeout_ms` of -1 blocks indefinitely.
    fn wait_interrupt(&self, timeout_ms: i32) -> i32;

    /// Registers the single native callback and spawns the wait thread.
    /// `arg` is passed verbatim to every `callback` invocation and must
    /// stay valid until [`GpioLine::stop_wait_interrupt`] returns.
    fn start_wait_interrupt(&self, callback: GpioIrqCallback, arg: *mut c_void) -> i32;

    /// Tears down the wait thread. No callback invocations begin after
    /// this returns.
    fn stop_wait_interrupt(&self) -> i32;
}

/// The library-binding object: every native entry point the bindings
/// consume, one method per symbol.
pub trait ApixBackend: Send + Sync {
    /// `ldx_gpio_request`: by kernel number, with a sharing mode.
    fn gpio_request(
        &self,
        kernel_number: u32,
        mode: i32,
        request_mode: i32,
    ) -> Option<Box<dyn GpioLine>>;

    /// `ldx_gpio_request_by_controller`: controller + line offset, shared
    /// access implied.
    fn gpio_request_by_controller(
        &self,
        controller: &CStr,
        line: u8,
        mode: i32,
    ) -> Option<Box<dyn GpioLine>>;

    /// `ldx_gpio_request_by_alias`: device-tree alias, with a sharing mode.
    fn gpio_request_by_alias(
        &self,
        alias: &CStr,
        mode: i32,
        request_mode: i32,
    ) -> Option<Box<dyn GpioLine>>;

    /// `ldx_net_list_available_ifaces`. Empty when the native count is < 1.
    fn net_list_ifaces(&self) -> Vec<String>;

    /// `ldx_net_get_iface_state`; `Err` carries the native code.
    fn net_iface_state(&self, name: &CStr) -> Result<NetState, i32>;

    /// `ldx_net_get_iface_stats`; `Err` carries the native code.
    fn net_iface_stats(&self, name: &CStr) -> Result<NetStats, i32>;

    /// `ldx_net_set_config`, by value. Returns the native code.
    fn net_set_config(&self, config: NetConfig) -> i32;

    /// `ldx_wifi_list_available_ifaces`.
    fn wifi_list_ifaces(&self) -> Vec<String>;

    /// `ldx_wifi_get_iface_state`; `Err` carries the native code.
    fn wifi_iface_state(&self, name: &CStr) -> Result<WifiState, i32>;

    /// `ldx_wifi_set_config`, by value. The `psk` pointer inside `config`
    /// is only read during the call.
    fn wifi_set_config(&self, config: WifiConfig) -> i32;

    /// `ldx_bt_list_available_devices`. Empty when the native count is < 1.
    fn bt_list_devices(&self) -> Vec<u16>;

    /// `ldx_bt_get_state`; `Err` carries the native code.
    fn bt_device_state(&self, dev_id: u16) -> Result<BtState, i32>;

    /// `ldx_bt_get_stats`; `Err` carries the native code.
    fn bt_device_stats(&self, dev_id: u16) -> Result<BtStats, i32>;

    /// `ldx_bt_set_config`, by value. Returns the native code.
    fn bt_set_config(&self, config: BtConfig) -> i32;
}
