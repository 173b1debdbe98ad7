//! ABI mirrors of the libdigiapix C interface.
//!
//! Every struct in this module matches the native layout field for field;
//! the symbol table resolves the `ldx_*` entry points once at load time.
//! Nothing here interprets the data; the safe wrappers in the domain
//! modules own validation and code mapping.
//!
//! ## Safety
//!
//! The function pointers stored in [`ApixSymbols`] are only valid while the
//! `libloading::Library` they were resolved from stays loaded. The library
//! handle is kept alive alongside the table (see `ApixLibrary`).

use libc::{c_char, c_int, c_uchar, c_uint, c_void};
use libloading::Library;

use crate::error::LibraryError;

/// Interface name width, including the terminating NUL (IFNAMSIZ).
pub const IFACE_NAME_SIZE: usize = 16;
/// Maximum number of interfaces a list call can return.
pub const MAX_NET_IFACES: usize = 32;
/// Octets in an IPv4 address.
pub const IPV4_GROUPS: usize = 4;
/// Octets in a MAC address.
pub const MAC_ADDRESS_GROUPS: usize = 6;
/// Maximum SSID width (IW_ESSID_MAX_SIZE), not NUL terminated when full.
pub const SSID_NAME_SIZE: usize = 32;
/// Maximum Bluetooth local-name length; the ABI arrays carry one extra NUL.
pub const BT_NAME_MAX_LEN: usize = 248;

/// Wait/interrupt result codes (gpio_irq_error_t).
pub const GPIO_IRQ_ERROR_NONE: c_int = 0;
pub const GPIO_IRQ_ERROR: c_int = 1;
pub const GPIO_IRQ_ERROR_TIMEOUT: c_int = 2;

/// Native interrupt callback: invoked from the wait thread with the
/// context pointer handed to `ldx_gpio_start_wait_interrupt`. Must
/// return 0.
pub type GpioIrqCallback = extern "C" fn(arg: *mut c_void) -> c_int;

/// Mirror of `gpio_t`. Allocated and owned by the native library; the
/// binding only ever holds a pointer to it.
#[repr(C)]
#[derive(Debug)]
pub struct RawGpio {
    pub alias: *const c_char,
    pub kernel_number: c_uint,
    pub gpio_controller: *const c_char,
    pub gpio_line: c_uint,
    pub data: *mut c_void,
}

/// Mirror of `net_names_list_t`.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct NetNamesList {
    pub n_ifaces: c_int,
    pub names: [[c_char; IFACE_NAME_SIZE]; MAX_NET_IFACES],
}

impl Default for NetNamesList {
    fn default() -> Self {
        Self {
            n_ifaces: 0,
            names: [[0; IFACE_NAME_SIZE]; MAX_NET_IFACES],
        }
    }
}

/// Mirror of `net_state_t`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct NetState {
    pub name: [c_char; IFACE_NAME_SIZE],
    pub mac: [u8; MAC_ADDRESS_GROUPS],
    pub status: c_int,
    pub is_dhcp: c_int,
    pub ipv4: [u8; IPV4_GROUPS],
    pub gateway: [u8; IPV4_GROUPS],
    pub netmask: [u8; IPV4_GROUPS],
    pub broadcast: [u8; IPV4_GROUPS],
    pub mtu: c_int,
    pub dns1: [u8; IPV4_GROUPS],
    pub dns2: [u8; IPV4_GROUPS],
}

impl Default for NetState {
    fn default() -> Self {
        Self {
            name: [0; IFACE_NAME_SIZE],
            mac: [0; MAC_ADDRESS_GROUPS],
            status: 0,
            is_dhcp: 0,
            ipv4: [0; IPV4_GROUPS],
            gateway: [0; IPV4_GROUPS],
            netmask: [0; IPV4_GROUPS],
            broadcast: [0; IPV4_GROUPS],
            mtu: 0,
            dns1: [0; IPV4_GROUPS],
            dns2: [0; IPV4_GROUPS],
        }
    }
}

/// Mirror of `net_stats_t`: 24 monotonic counters, straight from the
/// kernel's interface statistics.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NetStats {
    pub rx_packets: u32,
    pub tx_packets: u32,
    pub rx_bytes: u32,
    pub tx_bytes: u32,
    pub rx_errors: u32,
    pub tx_errors: u32,
    pub rx_dropped: u32,
    pub tx_dropped: u32,
    pub multicast: u32,
    pub collisions: u32,
    pub rx_length_errors: u32,
    pub rx_over_errors: u32,
    pub rx_crc_errors: u32,
    pub rx_frame_errors: u32,
    pub rx_fifo_errors: u32,
    pub rx_missed_errors: u32,
    pub tx_aborted_errors: u32,
    pub tx_carrier_errors: u32,
    pub tx_fifo_errors: u32,
    pub tx_heartbeat_errors: u32,
    pub tx_window_errors: u32,
    pub rx_compressed: u32,
    pub tx_compressed: u32,
    pub rx_nohandler: u32,
}

/// Mirror of `net_config_t`. Passed to the native layer BY VALUE.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct NetConfig {
    pub name: [c_char; IFACE_NAME_SIZE],
    pub status: c_int,
    pub is_dhcp: c_int,
    pub set_ip: bool,
    pub ipv4: [u8; IPV4_GROUPS],
    pub set_gateway: bool,
    pub gateway: [u8; IPV4_GROUPS],
    pub set_netmask: bool,
    pub netmask: [u8; IPV4_GROUPS],
    pub n_dns: u8,
    pub dns1: [u8; IPV4_GROUPS],
    pub dns2: [u8; IPV4_GROUPS],
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            name: [0; IFACE_NAME_SIZE],
            status: 0,
            is_dhcp: 0,
            set_ip: false,
            ipv4: [0; IPV4_GROUPS],
            set_gateway: false,
            gateway: [0; IPV4_GROUPS],
            set_netmask: false,
            netmask: [0; IPV4_GROUPS],
            n_dns: 0,
            dns1: [0; IPV4_GROUPS],
            dns2: [0; IPV4_GROUPS],
        }
    }
}

/// Mirror of `wifi_state_t`. Embeds the wired-interface state.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct WifiState {
    pub net_state: NetState,
    pub ssid: [c_char; SSID_NAME_SIZE],
    pub freq: f64,
    pub channel: c_int,
    pub sec_mode: c_int,
}

impl Default for WifiState {
    fn default() -> Self {
        Self {
            net_state: NetState::default(),
            ssid: [0; SSID_NAME_SIZE],
            freq: 0.0,
            channel: 0,
            sec_mode: -1,
        }
    }
}

/// Mirror of `wifi_config_t`. The `psk` pointer must stay valid for the
/// duration of the `ldx_wifi_set_config` call; it is never retained.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct WifiConfig {
    pub name: [c_char; IFACE_NAME_SIZE],
    pub set_ssid: bool,
    pub ssid: [c_char; SSID_NAME_SIZE],
    pub sec_mode: c_int,
    pub psk: *mut c_char,
    pub net_config: NetConfig,
}

impl Default for WifiConfig {
    fn default() -> Self {
        Self {
            name: [0; IFACE_NAME_SIZE],
            set_ssid: false,
            ssid: [0; SSID_NAME_SIZE],
            sec_mode: -1,
            psk: std::ptr::null_mut(),
            net_config: NetConfig::default(),
        }
    }
}

/// Mirror of `bt_stats_t`.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BtStats {
    pub rx_bytes: u32,
    pub rx_errors: u32,
    pub rx_acl: u32,
    pub rx_sco: u32,
    pub rx_events: u32,
    pub tx_bytes: u32,
    pub tx_errors: u32,
    pub tx_acl: u32,
    pub tx_sco: u32,
    pub tx_cmds: u32,
}

/// Mirror of `bt_state_t`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct BtState {
    pub dev_id: u16,
    pub dev_name: [c_char; IFACE_NAME_SIZE],
    pub name: [c_char; BT_NAME_MAX_LEN + 1],
    pub mac: [u8; MAC_ADDRESS_GROUPS],
    pub enable: c_int,
    pub running: bool,
}

impl Default for BtState {
    fn default() -> Self {
        Self {
            dev_id: 0,
            dev_name: [0; IFACE_NAME_SIZE],
            name: [0; BT_NAME_MAX_LEN + 1],
            mac: [0; MAC_ADDRESS_GROUPS],
            enable: -1,
            running: false,
        }
    }
}

/// Mirror of `bt_config_t`. Passed BY VALUE.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct BtConfig {
    pub dev_id: u16,
    pub enable: c_int,
    pub set_name: bool,
    pub name: [c_char; BT_NAME_MAX_LEN + 1],
}

impl Default for BtConfig {
    fn default() -> Self {
        Self {
            dev_id: 0,
            enable: -1,
            set_name: false,
            name: [0; BT_NAME_MAX_LEN + 1],
        }
    }
}

/// Resolved `ldx_*` entry points.
///
/// Field names drop the `ldx_` prefix; the literal symbol names live in
/// [`ApixSymbols::resolve`].
pub(crate) struct ApixSymbols {
    pub gpio_request:
        unsafe extern "C" fn(c_uint, c_int, c_int) -> *mut RawGpio,
    pub gpio_request_by_controller:
        unsafe extern "C" fn(*const c_char, c_uchar, c_int) -> *mut RawGpio,
    pub gpio_request_by_alias:
        unsafe extern "C" fn(*const c_char, c_int, c_int) -> *mut RawGpio,
    pub gpio_free: unsafe extern "C" fn(*mut RawGpio) -> c_int,
    pub gpio_set_mode: unsafe extern "C" fn(*mut RawGpio, c_int) -> c_int,
    pub gpio_get_mode: unsafe extern "C" fn(*mut RawGpio) -> c_int,
    pub gpio_set_value: unsafe extern "C" fn(*mut RawGpio, c_int) -> c_int,
    pub gpio_get_value: unsafe extern "C" fn(*mut RawGpio) -> c_int,
    pub gpio_set_active_mode:
        unsafe extern "C" fn(*mut RawGpio, c_int) -> c_int,
    pub gpio_get_active_mode: unsafe extern "C" fn(*mut RawGpio) -> c_int,
    pub gpio_set_debounce:
        unsafe extern "C" fn(*mut RawGpio, c_uint) -> c_int,
    pub gpio_wait_interrupt:
        unsafe extern "C" fn(*mut RawGpio, c_int) -> c_int,
    pub gpio_start_wait_interrupt:
        unsafe extern "C" fn(*mut RawGpio, GpioIrqCallback, *mut c_void) -> c_int,
    pub gpio_stop_wait_interrupt: unsafe extern "C" fn(*mut RawGpio) -> c_int,
    pub net_list_available_ifaces:
        unsafe extern "C" fn(*mut NetNamesList) -> c_int,
    pub net_get_iface_state:
        unsafe extern "C" fn(*const c_char, *mut NetState) -> c_int,
    pub net_get_iface_stats:
        unsafe extern "C" fn(*const c_char, *mut NetStats) -> c_int,
    pub net_set_config: unsafe extern "C" fn(NetConfig) -> c_int,
    pub wifi_list_available_ifaces:
        unsafe extern "C" fn(*mut NetNamesList) -> c_int,
    pub wifi_get_iface_state:
        unsafe extern "C" fn(*const c_char, *mut WifiState) -> c_int,
    pub wifi_set_config: unsafe extern "C" fn(WifiConfig) -> c_int,
    pub bt_list_available_devices:
        unsafe extern "C" fn(*mut *mut u16) -> c_int,
    pub bt_get_state: unsafe extern "C" fn(u16, *mut BtState) -> c_int,
    pub bt_get_stats: unsafe extern "C" fn(u16, *mut BtStats) -> c_int,
    pub bt_set_config: unsafe extern "C" fn(BtConfig) -> c_int,
}

impl ApixSymbols {
    /// Resolves every entry point the bindings consume.
    ///
    /// # Safety
    ///
    /// The returned function pointers are only valid while `library` stays
    /// loaded.
    pub unsafe fn resolve(library: &Library) -> Result<Self, LibraryError> {
        Ok(Self {
            gpio_request: symbol(library, "ldx_gpio_request")?,
            gpio_request_by_controller: symbol(
                library,
                "ldx_gpio_request_by_controller",
            )?,
            gpio_request_by_alias: symbol(library, "ldx_gpio_request_by_alias")?,
            gpio_free: symbol(library, "ldx_gpio_free")?,
            gpio_set_mode: symbol(library, "ldx_gpio_set_mode")?,
            gpio_get_mode: symbol(library, "ldx_gpio_get_mode")?,
            gpio_set_value: symbol(library, "ldx_gpio_set_value")?,
            gpio_get_value: symbol(library, "ldx_gpio_get_value")?,
            gpio_set_active_mode: symbol(library, "ldx_gpio_set_active_mode")?,
            gpio_get_active_mode: symbol(library, "ldx_gpio_get_active_mode")?,
            gpio_set_debounce: symbol(library, "ldx_gpio_set_debounce")?,
            gpio_wait_interrupt: symbol(library, "ldx_gpio_wait_interrupt")?,
            gpio_start_wait_interrupt: symbol(
                library,
                "ldx_gpio_start_wait_interrupt",
            )?,
            gpio_stop_wait_interrupt: symbol(
                library,
                "ldx_gpio_stop_wait_interrupt",
            )?,
            net_list_available_ifaces: symbol(
                library,
                "ldx_net_list_available_ifaces",
            )?,
            net_get_iface_state: symbol(library, "ldx_net_get_iface_state")?,
            net_get_iface_stats: symbol(library, "ldx_net_get_iface_stats")?,
            net_set_config: symbol(library, "ldx_net_set_config")?,
            wifi_list_available_ifaces: symbol(
                library,
                "ldx_wifi_list_available_ifaces",
            )?,
            wifi_get_iface_state: symbol(library, "ldx_wifi_get_iface_state")?,
            wifi_set_config: symbol(library, "ldx_wifi_set_config")?,
            bt_list_available_devices: symbol(
                library,
                "ldx_bt_list_available_devices",
            )?,
            bt_get_state: symbol(library, "ldx_bt_get_state")?,
            bt_get_stats: symbol(library, "ldx_bt_get_stats")?,
            bt_set_config: symbol(library, "ldx_bt_set_config")?,
        })
    }
}

/// Resolves one symbol and copies the function pointer out of the
/// `Symbol` guard.
unsafe fn symbol<T: Copy>(
    library: &Library,
    name: &'static str,
) -> Result<T, LibraryError> {
    library
        .get::<T>(name.as_bytes())
        .map(|sym| *sym)
        .map_err(|source| LibraryError::MissingSymbol { symbol: name, source })
}

/// Decodes a fixed-width C char array up to the first NUL.
pub fn c_chars_to_string(chars: &[c_char]) -> String {
    let bytes: Vec<u8> = chars
        .iter()
        .take_while(|&&c| c != 0)
        .map(|&c| c as u8)
        .collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Copies `value` into a fixed-width C char array. The caller validates the
/// length beforehand; overlong input is truncated to the array width.
pub fn copy_str_to_c_chars(dst: &mut [c_char], value: &str) {
    for slot in dst.iter_mut() {
        *slot = 0;
    }
    for (slot, byte) in dst.iter_mut().zip(value.as_bytes()) {
        *slot = *byte as c_char;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem;

    #[test]
    fn net_state_layout_matches_native_width() {
        // name(16) + mac(6) + pad(2) + status/is_dhcp(8) + 4 addresses(16)
        // + mtu(4) + dns1/dns2(8)
        assert_eq!(mem::size_of::<NetState>(), 60);
    }

    #[test]
    fn net_config_layout_matches_native_width() {
        // the bool/u8 fields pack the address arrays without padding
        assert_eq!(mem::size_of::<NetConfig>(), 48);
    }

    #[test]
    fn bt_state_layout_matches_native_width() {
        // dev_id(2) + dev_name(16) + name(249) + mac(6) + pad(3) + enable(4)
        // + running(1) + trailing pad(3)
        assert_eq!(mem::size_of::<BtState>(), 284);
    }

    #[test]
    fn c_chars_round_trip() {
        let mut raw = [0 as c_char; IFACE_NAME_SIZE];
        copy_str_to_c_chars(&mut raw, "eth0");
        assert_eq!(c_chars_to_string(&raw), "eth0");
    }

    #[test]
    fn c_chars_decoding_stops_at_nul() {
        let mut raw = [0 as c_char; 8];
        copy_str_to_c_chars(&mut raw, "ab");
        raw[4] = b'x' as c_char;
        assert_eq!(c_chars_to_string(&raw), "ab");
    }

    #[test]
    fn overlong_copy_truncates_to_width() {
        let mut raw = [0 as c_char; 4];
        copy_str_to_c_chars(&mut raw, "abcdef");
        assert_eq!(raw.map(|c| c as u8), *b"abcd");
    }
}
