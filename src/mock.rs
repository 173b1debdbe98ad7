//! In-memory digiapix double.
//!
//! [`MockApix`] implements [`ApixBackend`] over plain maps so every handle
//! in this crate can be exercised without the shared object or hardware.
//! Tests script the fixture side (interfaces, devices, lines, failure
//! injection) and observe the call journal plus the captured configs.
//!
//! [`MockApix::fire_interrupt`] invokes the armed native callback from a
//! separate thread, the way the real wait thread would.

use std::collections::{HashMap, HashSet, VecDeque};
use std::ffi::CStr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;

use libc::c_void;

use crate::backend::{ApixBackend, GpioLine};
use crate::ffi::{self, GpioIrqCallback};

/// One native call observed by the mock, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    GpioRequest {
        kernel_number: u32,
        mode: i32,
        request_mode: i32,
    },
    GpioFree {
        kernel_number: u32,
    },
    GpioSetMode {
        kernel_number: u32,
        mode: i32,
    },
    GpioStartWait {
        kernel_number: u32,
    },
    GpioStopWait {
        kernel_number: u32,
    },
    NetSetConfig {
        name: String,
    },
    WifiSetConfig {
        name: String,
    },
    BtSetConfig {
        dev_id: u16,
    },
}

/// GPIO entry points that [`MockApix::fail_next_gpio`] can make fail once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockGpioOp {
    Request,
    SetMode,
    SetValue,
    SetActiveMode,
    SetDebounce,
    StartWait,
    StopWait,
}

/// A WiFi config captured at call time, with the PSK pointer decoded while
/// it was still valid.
#[derive(Debug, Clone)]
pub struct WifiConfigRecord {
    pub name: String,
    pub set_ssid: bool,
    pub ssid: String,
    pub sec_mode: i32,
    pub psk: Option<String>,
    pub net: ffi::NetConfig,
}

#[derive(Default)]
struct LineState {
    alias: Option<String>,
    controller: Option<(String, u8)>,
    mode: i32,
    value: i32,
    active_mode: i32,
    debounce_usec: u32,
    exported: bool,
    irq: Option<(GpioIrqCallback, usize)>,
    wait_results: VecDeque<i32>,
    wait_timeouts: Vec<i32>,
}

struct NetEntry {
    name: String,
    state: ffi::NetState,
    stats: ffi::NetStats,
}

struct WifiEntry {
    name: String,
    state: ffi::WifiState,
}

struct BtEntry {
    dev_id: u16,
    state: ffi::BtState,
    stats: ffi::BtStats,
    readable: bool,
}

#[derive(Default)]
struct MockInner {
    lines: HashMap<u32, LineState>,
    aliases: HashMap<String, u32>,
    controllers: HashMap<(String, u8), u32>,
    fail_ops: HashSet<MockGpioOp>,
    calls: Vec<MockCall>,
    net: Vec<NetEntry>,
    net_config_rc: i32,
    net_configs: Vec<ffi::NetConfig>,
    wifi: Vec<WifiEntry>,
    wifi_config_rc: i32,
    wifi_configs: Vec<WifiConfigRecord>,
    bt: Vec<BtEntry>,
    bt_config_rc: i32,
    bt_configs: Vec<ffi::BtConfig>,
}

#[derive(Default)]
struct MockState {
    inner: Mutex<MockInner>,
}

impl MockState {
    fn lock_inner(&self) -> MutexGuard<'_, MockInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// The scriptable backend. Cheap to clone; clones share the fixture state.
#[derive(Clone, Default)]
pub struct MockApix {
    state: Arc<MockState>,
}

impl MockApix {
    pub fn new() -> Self {
        Self::default()
    }

    /// The backend view, parallel to `ApixLibrary::backend`.
    pub fn backend(&self) -> Arc<dyn ApixBackend> {
        Arc::new(self.clone())
    }

    /// Defines a device-tree alias. Alias requests for undefined names
    /// fail, as they do natively.
    pub fn add_gpio_alias(&self, alias: &str, kernel_number: u32) {
        let mut inner = self.state.lock_inner();
        inner.aliases.insert(alias.to_string(), kernel_number);
        inner.lines.entry(kernel_number).or_default().alias =
            Some(alias.to_string());
    }

    /// Defines a controller line. Controller requests for undefined
    /// chip/offset pairs fail.
    pub fn add_gpio_line(&self, controller: &str, line: u8, kernel_number: u32) {
        let mut inner = self.state.lock_inner();
        inner
            .controllers
            .insert((controller.to_string(), line), kernel_number);
        inner.lines.entry(kernel_number).or_default().controller =
            Some((controller.to_string(), line));
    }

    /// Marks a line as already exported, as if another process held it.
    pub fn mark_exported(&self, kernel_number: u32) {
        self.state
            .lock_inner()
            .lines
            .entry(kernel_number)
            .or_default()
            .exported = true;
    }

    /// Makes the next call to the given GPIO entry point fail.
    pub fn fail_next_gpio(&self, op: MockGpioOp) {
        self.state.lock_inner().fail_ops.insert(op);
    }

    /// Queues an outcome for the next blocking wait on the line. An empty
    /// queue reports a timeout.
    pub fn push_wait_result(&self, kernel_number: u32, code: i32) {
        self.state
            .lock_inner()
            .lines
            .entry(kernel_number)
            .or_default()
            .wait_results
            .push_back(code);
    }

    /// Invokes the armed native callback from a separate thread. Returns
    /// `false` when no callback is armed on the line.
    pub fn fire_interrupt(&self, kernel_number: u32) -> bool {
        let armed = self
            .state
            .lock_inner()
            .lines
            .get(&kernel_number)
            .and_then(|line| line.irq);
        match armed {
            Some((callback, ctx)) => {
                let handle =
                    thread::spawn(move || callback(ctx as *mut c_void));
                matches!(handle.join(), Ok(0))
            }
            None => false,
        }
    }

    /// Every native call observed so far, in order.
    pub fn calls(&self) -> Vec<MockCall> {
        self.state.lock_inner().calls.clone()
    }

    pub fn line_mode(&self, kernel_number: u32) -> Option<i32> {
        self.with_line(kernel_number, |line| line.mode)
    }

    pub fn line_value(&self, kernel_number: u32) -> Option<i32> {
        self.with_line(kernel_number, |line| line.value)
    }

    pub fn line_active_mode(&self, kernel_number: u32) -> Option<i32> {
        self.with_line(kernel_number, |line| line.active_mode)
    }

    pub fn line_debounce(&self, kernel_number: u32) -> Option<u32> {
        self.with_line(kernel_number, |line| line.debounce_usec)
    }

    /// Timeouts passed to blocking waits on the line, in call order.
    pub fn wait_timeouts(&self, kernel_number: u32) -> Vec<i32> {
        self.with_line(kernel_number, |line| line.wait_timeouts.clone())
            .unwrap_or_default()
    }

    /// Whether a native callback is currently armed on the line.
    pub fn irq_armed(&self, kernel_number: u32) -> bool {
        self.with_line(kernel_number, |line| line.irq.is_some())
            .unwrap_or(false)
    }

    /// Whether the line is currently exported.
    pub fn is_exported(&self, kernel_number: u32) -> bool {
        self.with_line(kernel_number, |line| line.exported)
            .unwrap_or(false)
    }

    /// Registers a wired interface. The `name` field inside `state` is
    /// filled from `name`.
    pub fn add_net_iface(&self, name: &str, mut state: ffi::NetState) {
        ffi::copy_str_to_c_chars(&mut state.name, name);
        self.state.lock_inner().net.push(NetEntry {
            name: name.to_string(),
            state,
            stats: ffi::NetStats::default(),
        });
    }

    /// Sets the statistics reported for an interface, creating the entry
    /// when it does not exist yet.
    pub fn set_net_stats(&self, name: &str, stats: ffi::NetStats) {
        let mut inner = self.state.lock_inner();
        match inner.net.iter_mut().find(|entry| entry.name == name) {
            Some(entry) => entry.stats = stats,
            None => {
                let mut state = ffi::NetState::default();
                ffi::copy_str_to_c_chars(&mut state.name, name);
                inner.net.push(NetEntry {
                    name: name.to_string(),
                    state,
                    stats,
                });
            }
        }
    }

    pub fn set_net_config_result(&self, code: i32) {
        self.state.lock_inner().net_config_rc = code;
    }

    /// Configs received by `net_set_config`, in call order.
    pub fn net_configs(&self) -> Vec<ffi::NetConfig> {
        self.state.lock_inner().net_configs.clone()
    }

    /// Registers a WiFi interface. The name is filled into the embedded
    /// wired state.
    pub fn add_wifi_iface(&self, name: &str, mut state: ffi::WifiState) {
        ffi::copy_str_to_c_chars(&mut state.net_state.name, name);
        self.state.lock_inner().wifi.push(WifiEntry {
            name: name.to_string(),
            state,
        });
    }

    pub fn set_wifi_config_result(&self, code: i32) {
        self.state.lock_inner().wifi_config_rc = code;
    }

    /// Configs received by `wifi_set_config`, decoded at call time.
    pub fn wifi_configs(&self) -> Vec<WifiConfigRecord> {
        self.state.lock_inner().wifi_configs.clone()
    }

    /// Registers a Bluetooth device. The id is filled into `state`.
    pub fn add_bt_device(&self, dev_id: u16, mut state: ffi::BtState) {
        state.dev_id = dev_id;
        self.state.lock_inner().bt.push(BtEntry {
            dev_id,
            state,
            stats: ffi::BtStats::default(),
            readable: true,
        });
    }

    /// Makes state reads for a listed device fail, the way a downed HCI
    /// socket does natively.
    pub fn mark_bt_unreadable(&self, dev_id: u16) {
        let mut inner = self.state.lock_inner();
        if let Some(entry) =
            inner.bt.iter_mut().find(|entry| entry.dev_id == dev_id)
        {
            entry.readable = false;
        }
    }

    /// Sets the statistics reported for a device already registered with
    /// [`MockApix::add_bt_device`].
    pub fn set_bt_stats(&self, dev_id: u16, stats: ffi::BtStats) {
        let mut inner = self.state.lock_inner();
        if let Some(entry) =
            inner.bt.iter_mut().find(|entry| entry.dev_id == dev_id)
        {
            entry.stats = stats;
        }
    }

    pub fn set_bt_config_result(&self, code: i32) {
        self.state.lock_inner().bt_config_rc = code;
    }

    /// Configs received by `bt_set_config`, in call order.
    pub fn bt_configs(&self) -> Vec<ffi::BtConfig> {
        self.state.lock_inner().bt_configs.clone()
    }

    fn with_line<R>(
        &self,
        kernel_number: u32,
        f: impl FnOnce(&LineState) -> R,
    ) -> Option<R> {
        self.state.lock_inner().lines.get(&kernel_number).map(f)
    }

    fn request_line(
        &self,
        kernel_number: u32,
        mode: i32,
        request_mode: i32,
    ) -> Option<Box<dyn GpioLine>> {
        let mut inner = self.state.lock_inner();
        inner.calls.push(MockCall::GpioRequest {
            kernel_number,
            mode,
            request_mode,
        });
        if inner.fail_ops.remove(&MockGpioOp::Request) {
            return None;
        }
        let line = inner.lines.entry(kernel_number).or_default();
        // weak requests refuse lines somebody already exported
        if request_mode == 2 && line.exported {
            return None;
        }
        let was_exported = line.exported;
        line.exported = true;
        line.mode = mode;
        Some(Box::new(MockGpioLine {
            kernel_number,
            request_mode,
            was_exported,
            state: Arc::clone(&self.state),
        }))
    }
}

impl ApixBackend for MockApix {
    fn gpio_request(
        &self,
        kernel_number: u32,
        mode: i32,
        request_mode: i32,
    ) -> Option<Box<dyn GpioLine>> {
        self.request_line(kernel_number, mode, request_mode)
    }

    fn gpio_request_by_controller(
        &self,
        controller: &CStr,
        line: u8,
        mode: i32,
    ) -> Option<Box<dyn GpioLine>> {
        let controller = controller.to_string_lossy().into_owned();
        let kernel_number = self
            .state
            .lock_inner()
            .controllers
            .get(&(controller, line))
            .copied()?;
        // the native layer grants controller requests shared
        self.request_line(kernel_number, mode, 0)
    }

    fn gpio_request_by_alias(
        &self,
        alias: &CStr,
        mode: i32,
        request_mode: i32,
    ) -> Option<Box<dyn GpioLine>> {
        let alias = alias.to_string_lossy().into_owned();
        let kernel_number =
            self.state.lock_inner().aliases.get(&alias).copied()?;
        self.request_line(kernel_number, mode, request_mode)
    }

    fn net_list_ifaces(&self) -> Vec<String> {
        self.state
            .lock_inner()
            .net
            .iter()
            .map(|entry| entry.name.clone())
            .collect()
    }

    fn net_iface_state(&self, name: &CStr) -> Result<ffi::NetState, i32> {
        let name = name.to_string_lossy().into_owned();
        self.state
            .lock_inner()
            .net
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.state)
            .ok_or(1) // native no-such-interface code
    }

    fn net_iface_stats(&self, name: &CStr) -> Result<ffi::NetStats, i32> {
        let name = name.to_string_lossy().into_owned();
        self.state
            .lock_inner()
            .net
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.stats)
            .ok_or(1)
    }

    fn net_set_config(&self, config: ffi::NetConfig) -> i32 {
        let mut inner = self.state.lock_inner();
        inner.calls.push(MockCall::NetSetConfig {
            name: ffi::c_chars_to_string(&config.name),
        });
        inner.net_configs.push(config);
        inner.net_config_rc
    }

    fn wifi_list_ifaces(&self) -> Vec<String> {
        self.state
            .lock_inner()
            .wifi
            .iter()
            .map(|entry| entry.name.clone())
            .collect()
    }

    fn wifi_iface_state(&self, name: &CStr) -> Result<ffi::WifiState, i32> {
        let name = name.to_string_lossy().into_owned();
        self.state
            .lock_inner()
            .wifi
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.state)
            .ok_or(1)
    }

    fn wifi_set_config(&self, config: ffi::WifiConfig) -> i32 {
        let psk = if config.psk.is_null() {
            None
        } else {
            // SAFETY: the pointer is valid for the duration of this call,
            // per the backend contract.
            let decoded = unsafe { CStr::from_ptr(config.psk) }
                .to_string_lossy()
                .into_owned();
            // an empty passphrase is the native "leave unchanged" marker
            (!decoded.is_empty()).then_some(decoded)
        };
        let name = ffi::c_chars_to_string(&config.name);
        let record = WifiConfigRecord {
            name: name.clone(),
            set_ssid: config.set_ssid,
            ssid: ffi::c_chars_to_string(&config.ssid),
            sec_mode: config.sec_mode,
            psk,
            net: config.net_config,
        };
        let mut inner = self.state.lock_inner();
        inner.calls.push(MockCall::WifiSetConfig { name });
        inner.wifi_configs.push(record);
        inner.wifi_config_rc
    }

    fn bt_list_devices(&self) -> Vec<u16> {
        self.state
            .lock_inner()
            .bt
            .iter()
            .map(|entry| entry.dev_id)
            .collect()
    }

    fn bt_device_state(&self, dev_id: u16) -> Result<ffi::BtState, i32> {
        match self
            .state
            .lock_inner()
            .bt
            .iter()
            .find(|entry| entry.dev_id == dev_id)
        {
            Some(entry) if entry.readable => Ok(entry.state),
            Some(_) => Err(3), // native HCI-info code
            None => Err(1), // native no-such-device code
        }
    }

    fn bt_device_stats(&self, dev_id: u16) -> Result<ffi::BtStats, i32> {
        self.state
            .lock_inner()
            .bt
            .iter()
            .find(|entry| entry.dev_id == dev_id)
            .map(|entry| entry.stats)
            .ok_or(1)
    }

    fn bt_set_config(&self, config: ffi::BtConfig) -> i32 {
        let mut inner = self.state.lock_inner();
        inner.calls.push(MockCall::BtSetConfig {
            dev_id: config.dev_id,
        });
        inner.bt_configs.push(config);
        inner.bt_config_rc
    }
}

struct MockGpioLine {
    kernel_number: u32,
    request_mode: i32,
    was_exported: bool,
    state: Arc<MockState>,
}

impl GpioLine for MockGpioLine {
    fn alias(&self) -> Option<String> {
        self.state
            .lock_inner()
            .lines
            .get(&self.kernel_number)
            .and_then(|line| line.alias.clone())
    }

    fn kernel_number(&self) -> u32 {
        self.kernel_number
    }

    fn controller(&self) -> Option<String> {
        self.state
            .lock_inner()
            .lines
            .get(&self.kernel_number)
            .and_then(|line| line.controller.as_ref().map(|(name, _)| name.clone()))
    }

    fn line(&self) -> u32 {
        self.state
            .lock_inner()
            .lines
            .get(&self.kernel_number)
            .and_then(|line| line.controller.as_ref().map(|&(_, offset)| u32::from(offset)))
            .unwrap_or(0)
    }

    fn set_mode(&self, mode: i32) -> i32 {
        let mut inner = self.state.lock_inner();
        inner.calls.push(MockCall::GpioSetMode {
            kernel_number: self.kernel_number,
            mode,
        });
        if inner.fail_ops.remove(&MockGpioOp::SetMode) {
            return 1;
        }
        match inner.lines.get_mut(&self.kernel_number) {
            Some(line) => {
                line.mode = mode;
                0
            }
            None => 1,
        }
    }

    fn mode(&self) -> i32 {
        self.state
            .lock_inner()
            .lines
            .get(&self.kernel_number)
            .map(|line| line.mode)
            .unwrap_or(-1)
    }

    fn set_value(&self, value: i32) -> i32 {
        let mut inner = self.state.lock_inner();
        if inner.fail_ops.remove(&MockGpioOp::SetValue) {
            return 1;
        }
        match inner.lines.get_mut(&self.kernel_number) {
            Some(line) => {
                line.value = value;
                0
            }
            None => 1,
        }
    }

    fn value(&self) -> i32 {
        self.state
            .lock_inner()
            .lines
            .get(&self.kernel_number)
            .map(|line| line.value)
            .unwrap_or(-1)
    }

    fn set_active_mode(&self, mode: i32) -> i32 {
        let mut inner = self.state.lock_inner();
        if inner.fail_ops.remove(&MockGpioOp::SetActiveMode) {
            return 1;
        }
        match inner.lines.get_mut(&self.kernel_number) {
            Some(line) => {
                line.active_mode = mode;
                0
            }
            None => 1,
        }
    }

    fn active_mode(&self) -> i32 {
        self.state
            .lock_inner()
            .lines
            .get(&self.kernel_number)
            .map(|line| line.active_mode)
            .unwrap_or(-1)
    }

    fn set_debounce(&self, usec: u32) -> i32 {
        let mut inner = self.state.lock_inner();
        if inner.fail_ops.remove(&MockGpioOp::SetDebounce) {
            return 1;
        }
        match inner.lines.get_mut(&self.kernel_number) {
            Some(line) => {
                line.debounce_usec = usec;
                0
            }
            None => 1,
        }
    }

    fn wait_interrupt(&self, timeout_ms: i32) -> i32 {
        let mut inner = self.state.lock_inner();
        match inner.lines.get_mut(&self.kernel_number) {
            Some(line) => {
                line.wait_timeouts.push(timeout_ms);
                line.wait_results
                    .pop_front()
                    .unwrap_or(ffi::GPIO_IRQ_ERROR_TIMEOUT)
            }
            None => ffi::GPIO_IRQ_ERROR,
        }
    }

    fn start_wait_interrupt(
        &self,
        callback: GpioIrqCallback,
        arg: *mut c_void,
    ) -> i32 {
        let mut inner = self.state.lock_inner();
        inner.calls.push(MockCall::GpioStartWait {
            kernel_number: self.kernel_number,
        });
        if inner.fail_ops.remove(&MockGpioOp::StartWait) {
            return 1;
        }
        match inner.lines.get_mut(&self.kernel_number) {
            // the native wait thread only arms on interrupt modes
            Some(line) if (3..=5).contains(&line.mode) => {
                line.irq = Some((callback, arg as usize));
                0
            }
            _ => 1,
        }
    }

    fn stop_wait_interrupt(&self) -> i32 {
        let mut inner = self.state.lock_inner();
        inner.calls.push(MockCall::GpioStopWait {
            kernel_number: self.kernel_number,
        });
        if inner.fail_ops.remove(&MockGpioOp::StopWait) {
            return 1;
        }
        if let Some(line) = inner.lines.get_mut(&self.kernel_number) {
            line.irq = None;
        }
        0
    }
}

impl Drop for MockGpioLine {
    fn drop(&mut self) {
        let mut inner = self.state.lock_inner();
        inner.calls.push(MockCall::GpioFree {
            kernel_number: self.kernel_number,
        });
        if let Some(line) = inner.lines.get_mut(&self.kernel_number) {
            line.irq = None;
            // shared requests leave a pre-existing export in place;
            // greedy and weak always unexport
            line.exported = self.request_mode == 0 && self.was_exported;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weak_requests_refuse_exported_lines() {
        let mock = MockApix::new();
        mock.mark_exported(18);

        assert!(mock.gpio_request(18, 0, 2).is_none());
        assert!(mock.gpio_request(18, 0, 0).is_some());
    }

    #[test]
    fn shared_free_keeps_a_pre_existing_export() {
        let mock = MockApix::new();
        mock.mark_exported(18);

        let line = mock.gpio_request(18, 0, 0).unwrap();
        drop(line);
        assert!(mock.is_exported(18));

        let line = mock.gpio_request(21, 0, 0).unwrap();
        drop(line);
        assert!(!mock.is_exported(21));
    }

    #[test]
    fn greedy_free_always_unexports() {
        let mock = MockApix::new();
        mock.mark_exported(18);

        let line = mock.gpio_request(18, 0, 1).unwrap();
        drop(line);
        assert!(!mock.is_exported(18));
    }

    #[test]
    fn firing_an_unarmed_line_reports_false() {
        let mock = MockApix::new();
        assert!(!mock.fire_interrupt(18));
    }
}
