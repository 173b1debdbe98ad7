//! Bluetooth devices.
//!
//! Devices are keyed by their adapter name (`hci0`). [`BluetoothDevice::get`]
//! walks the native device list and keeps the state of the matching
//! adapter; devices whose state cannot be read are skipped, exactly like a
//! hot-unplugged adapter. Configuration covers the enabled state and the
//! advertising name.

use std::fmt;
use std::sync::Arc;

use libc::EXIT_SUCCESS;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::backend::ApixBackend;
use crate::common::MacAddress;
use crate::error::BluetoothError;
use crate::ffi;

/// HCI traffic counters of one adapter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BluetoothStats {
    pub rx_bytes: u32,
    pub rx_errors: u32,
    pub rx_acl: u32,
    pub rx_sco: u32,
    pub rx_events: u32,
    pub tx_bytes: u32,
    pub tx_errors: u32,
    pub tx_acl: u32,
    pub tx_sco: u32,
    pub tx_commands: u32,
}

impl From<ffi::BtStats> for BluetoothStats {
    fn from(raw: ffi::BtStats) -> Self {
        Self {
            rx_bytes: raw.rx_bytes,
            rx_errors: raw.rx_errors,
            rx_acl: raw.rx_acl,
            rx_sco: raw.rx_sco,
            rx_events: raw.rx_events,
            tx_bytes: raw.tx_bytes,
            tx_errors: raw.tx_errors,
            tx_acl: raw.tx_acl,
            tx_sco: raw.tx_sco,
            tx_commands: raw.tx_cmds,
        }
    }
}

/// A Bluetooth adapter, holding the state snapshot read at
/// [`BluetoothDevice::get`] time.
pub struct BluetoothDevice {
    backend: Arc<dyn ApixBackend>,
    state: ffi::BtState,
    device_name: String,
    advertised_name: String,
}

impl BluetoothDevice {
    /// Adapter names of the devices whose state is readable.
    pub fn list(backend: &dyn ApixBackend) -> Vec<String> {
        readable_states(backend)
            .iter()
            .map(|state| ffi::c_chars_to_string(&state.dev_name))
            .collect()
    }

    /// Returns the device with the given adapter name.
    pub fn get(
        backend: Arc<dyn ApixBackend>,
        device_name: &str,
    ) -> Result<Self, BluetoothError> {
        if device_name.is_empty() {
            return Err(BluetoothError::Validation(
                "device name must be a non-empty string".into(),
            ));
        }
        let states = readable_states(backend.as_ref());
        if states.is_empty() {
            return Err(BluetoothError::NoDevicesAvailable);
        }
        for state in states {
            let name = ffi::c_chars_to_string(&state.dev_name);
            if name == device_name {
                let advertised_name = ffi::c_chars_to_string(&state.name);
                debug!("read state of Bluetooth device {device_name}");
                return Ok(Self {
                    backend,
                    state,
                    device_name: name,
                    advertised_name,
                });
            }
        }
        Err(BluetoothError::NotFound(device_name.to_string()))
    }

    /// Numeric HCI id of the adapter.
    pub fn device_id(&self) -> u16 {
        self.state.dev_id
    }

    /// Adapter name, `hci0` style.
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Name the adapter advertises to peers.
    pub fn advertised_name(&self) -> &str {
        &self.advertised_name
    }

    pub fn mac(&self) -> MacAddress {
        MacAddress::from(self.state.mac)
    }

    pub fn is_enabled(&self) -> bool {
        self.state.enable == 1
    }

    pub fn is_running(&self) -> bool {
        self.state.running
    }

    /// Reads the adapter counters. Live, unlike the state snapshot.
    pub fn statistics(&self) -> Result<BluetoothStats, BluetoothError> {
        self.backend
            .bt_device_stats(self.state.dev_id)
            .map(BluetoothStats::from)
            .map_err(BluetoothError::from_code)
    }

    /// Applies the profile to this adapter.
    pub fn configure(
        &self,
        profile: &BluetoothProfile,
    ) -> Result<(), BluetoothError> {
        let config = profile.to_config(self.state.dev_id)?;
        let rc = self.backend.bt_set_config(config);
        if rc == EXIT_SUCCESS {
            debug!("configured Bluetooth device {}", self.device_name);
            Ok(())
        } else {
            Err(BluetoothError::from_code(rc))
        }
    }
}

impl fmt::Debug for BluetoothDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BluetoothDevice")
            .field("device_name", &self.device_name)
            .field("device_id", &self.state.dev_id)
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

/// The fields of a Bluetooth configuration change. Unset fields keep
/// their current value on the adapter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BluetoothProfile {
    /// `Some(true)` enables the adapter, `Some(false)` disables it.
    pub enable: Option<bool>,
    pub advertised_name: Option<String>,
}

impl BluetoothProfile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_enable(mut self, enable: bool) -> Self {
        self.enable = Some(enable);
        self
    }

    pub fn with_advertised_name(mut self, name: impl Into<String>) -> Self {
        self.advertised_name = Some(name.into());
        self
    }

    fn to_config(&self, dev_id: u16) -> Result<ffi::BtConfig, BluetoothError> {
        let mut config = ffi::BtConfig {
            dev_id,
            ..Default::default()
        };
        config.enable = match self.enable {
            Some(true) => 1,
            Some(false) => 0,
            None => -1, // leave unchanged
        };
        if let Some(name) = &self.advertised_name {
            if name.is_empty() || name.len() > ffi::BT_NAME_MAX_LEN {
                return Err(BluetoothError::Validation(format!(
                    "advertised name must be 1 to {} bytes",
                    ffi::BT_NAME_MAX_LEN
                )));
            }
            config.set_name = true;
            ffi::copy_str_to_c_chars(&mut config.name, name);
        }
        Ok(config)
    }
}

fn readable_states(backend: &dyn ApixBackend) -> Vec<ffi::BtState> {
    backend
        .bt_list_devices()
        .into_iter()
        .filter_map(|dev_id| match backend.bt_device_state(dev_id) {
            Ok(state) => Some(state),
            Err(code) => {
                debug!(
                    "skipping Bluetooth device {dev_id}: state read failed \
                     with {code}"
                );
                None
            }
        })
        .collect()
}
