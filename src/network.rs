//! Wired network interfaces.
//!
//! [`NetworkInterface::get`] reads one snapshot of an interface's state;
//! accessors decode it without further native calls. Statistics are read
//! live on every [`NetworkInterface::statistics`] call, and configuration
//! goes through a [`NetworkProfile`] so callers only name the fields they
//! want changed.

use std::ffi::CString;
use std::fmt;
use std::net::Ipv4Addr;
use std::sync::Arc;

use libc::{c_char, EXIT_SUCCESS};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::backend::ApixBackend;
use crate::common::MacAddress;
use crate::error::NetworkError;
use crate::ffi;

/// Connection status of an interface (`net_status_t`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetStatus {
    Connected,
    Disconnected,
    Unmanaged,
    Unavailable,
    Unknown,
}

impl NetStatus {
    pub(crate) fn from_code(code: i32) -> Self {
        match code {
            0 => NetStatus::Connected,
            1 => NetStatus::Disconnected,
            2 => NetStatus::Unmanaged,
            3 => NetStatus::Unavailable,
            _ => NetStatus::Unknown,
        }
    }
}

/// How the interface obtains its address. `Unknown` is what the native
/// layer reports for interfaces it has not probed, disconnected ones
/// included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IpMode {
    Unknown,
    Static,
    Dhcp,
}

impl IpMode {
    pub(crate) fn code(self) -> i32 {
        match self {
            IpMode::Unknown => -1,
            IpMode::Static => 0,
            IpMode::Dhcp => 1,
        }
    }

    pub(crate) fn from_code(code: i32) -> Self {
        match code {
            0 => IpMode::Static,
            1 => IpMode::Dhcp,
            _ => IpMode::Unknown,
        }
    }
}

/// Interface counters, read straight from the kernel statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NetworkStats {
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

impl From<ffi::NetStats> for NetworkStats {
    fn from(raw: ffi::NetStats) -> Self {
        Self {
            rx_packets: raw.rx_packets,
            tx_packets: raw.tx_packets,
            rx_bytes: raw.rx_bytes,
            tx_bytes: raw.tx_bytes,
            rx_errors: raw.rx_errors,
            tx_errors: raw.tx_errors,
            rx_dropped: raw.rx_dropped,
            tx_dropped: raw.tx_dropped,
            multicast: raw.multicast,
            collisions: raw.collisions,
            rx_length_errors: raw.rx_length_errors,
            rx_over_errors: raw.rx_over_errors,
            rx_crc_errors: raw.rx_crc_errors,
            rx_frame_errors: raw.rx_frame_errors,
            rx_fifo_errors: raw.rx_fifo_errors,
            rx_missed_errors: raw.rx_missed_errors,
            tx_aborted_errors: raw.tx_aborted_errors,
            tx_carrier_errors: raw.tx_carrier_errors,
            tx_fifo_errors: raw.tx_fifo_errors,
            tx_heartbeat_errors: raw.tx_heartbeat_errors,
            tx_window_errors: raw.tx_window_errors,
            rx_compressed: raw.rx_compressed,
            tx_compressed: raw.tx_compressed,
            rx_nohandler: raw.rx_nohandler,
        }
    }
}

/// A wired interface, holding the state snapshot read at [`NetworkInterface::get`]
/// time. Fetch a new instance to observe later changes.
pub struct NetworkInterface {
    backend: Arc<dyn ApixBackend>,
    name: String,
    state: ffi::NetState,
}

impl NetworkInterface {
    /// Names of the interfaces the native layer can see.
    pub fn list(backend: &dyn ApixBackend) -> Vec<String> {
        backend.net_list_ifaces()
    }

    /// Reads the current state of the named interface.
    pub fn get(
        backend: Arc<dyn ApixBackend>,
        name: &str,
    ) -> Result<Self, NetworkError> {
        let name_c = iface_name_cstring(name)?;
        let state = backend
            .net_iface_state(&name_c)
            .map_err(NetworkError::from_code)?;
        debug!("read state of network interface {name}");
        Ok(Self {
            backend,
            name: name.to_string(),
            state,
        })
    }

    pub(crate) fn from_state(
        backend: Arc<dyn ApixBackend>,
        name: String,
        state: ffi::NetState,
    ) -> Self {
        Self {
            backend,
            name,
            state,
        }
    }

    pub(crate) fn backend(&self) -> &Arc<dyn ApixBackend> {
        &self.backend
    }

    pub(crate) fn raw_name(&self) -> &[c_char; ffi::IFACE_NAME_SIZE] {
        &self.state.name
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mac(&self) -> MacAddress {
        MacAddress::from(self.state.mac)
    }

    pub fn status(&self) -> NetStatus {
        NetStatus::from_code(self.state.status)
    }

    pub fn ip_mode(&self) -> IpMode {
        IpMode::from_code(self.state.is_dhcp)
    }

    /// Interface address; `0.0.0.0` when unset.
    pub fn ipv4(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.state.ipv4)
    }

    pub fn gateway(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.state.gateway)
    }

    pub fn netmask(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.state.netmask)
    }

    pub fn broadcast(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.state.broadcast)
    }

    pub fn mtu(&self) -> i32 {
        self.state.mtu
    }

    pub fn dns1(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.state.dns1)
    }

    pub fn dns2(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.state.dns2)
    }

    /// Reads the interface counters. Live, unlike the state snapshot.
    pub fn statistics(&self) -> Result<NetworkStats, NetworkError> {
        let name_c = iface_name_cstring(&self.name)?;
        self.backend
            .net_iface_stats(&name_c)
            .map(NetworkStats::from)
            .map_err(NetworkError::from_code)
    }

    /// Applies the profile to this interface.
    pub fn configure(&self, profile: &NetworkProfile) -> Result<(), NetworkError> {
        let config = profile.to_config(&self.state.name)?;
        let rc = self.backend.net_set_config(config);
        if rc == EXIT_SUCCESS {
            debug!("configured network interface {}", self.name);
            Ok(())
        } else {
            Err(NetworkError::from_code(rc))
        }
    }
}

impl fmt::Debug for NetworkInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkInterface")
            .field("name", &self.name)
            .field("status", &self.status())
            .field("ipv4", &self.ipv4())
            .finish()
    }
}

/// The fields of a network configuration change. Unset fields keep their
/// current value on the interface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkProfile {
    /// `Some(true)` connects the interface, `Some(false)` disconnects it.
    pub status: Option<bool>,
    pub ip_mode: Option<IpMode>,
    pub ipv4: Option<Ipv4Addr>,
    pub gateway: Option<Ipv4Addr>,
    pub netmask: Option<Ipv4Addr>,
    pub dns1: Option<Ipv4Addr>,
    pub dns2: Option<Ipv4Addr>,
}

impl NetworkProfile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, connected: bool) -> Self {
        self.status = Some(connected);
        self
    }

    pub fn with_ip_mode(mut self, mode: IpMode) -> Self {
        self.ip_mode = Some(mode);
        self
    }

    pub fn with_ipv4(mut self, address: Ipv4Addr) -> Self {
        self.ipv4 = Some(address);
        self
    }

    pub fn with_gateway(mut self, address: Ipv4Addr) -> Self {
        self.gateway = Some(address);
        self
    }

    pub fn with_netmask(mut self, netmask: Ipv4Addr) -> Self {
        self.netmask = Some(netmask);
        self
    }

    pub fn with_dns1(mut self, address: Ipv4Addr) -> Self {
        self.dns1 = Some(address);
        self
    }

    pub fn with_dns2(mut self, address: Ipv4Addr) -> Self {
        self.dns2 = Some(address);
        self
    }

    /// Marshals the profile into the native config struct. `name` is the
    /// raw interface name, copied verbatim.
    pub(crate) fn to_config(
        &self,
        name: &[c_char; ffi::IFACE_NAME_SIZE],
    ) -> Result<ffi::NetConfig, NetworkError> {
        let mut config = ffi::NetConfig {
            name: *name,
            ..Default::default()
        };
        config.status = match self.status {
            Some(true) => 0,  // connected
            Some(false) => 1, // disconnected
            None => 4,        // leave unchanged
        };
        config.is_dhcp = self.ip_mode.map_or(-1, IpMode::code);
        if let Some(ipv4) = self.ipv4 {
            config.set_ip = true;
            config.ipv4 = ipv4.octets();
        }
        if let Some(gateway) = self.gateway {
            config.set_gateway = true;
            config.gateway = gateway.octets();
        }
        if let Some(netmask) = self.netmask {
            if !netmask_is_contiguous(netmask) {
                return Err(NetworkError::Validation(format!(
                    "netmask {netmask} is not contiguous"
                )));
            }
            config.set_netmask = true;
            config.netmask = netmask.octets();
        }
        if let Some(dns1) = self.dns1 {
            config.dns1 = dns1.octets();
            config.n_dns += 1;
        }
        if let Some(dns2) = self.dns2 {
            config.dns2 = dns2.octets();
            config.n_dns += 1;
        }
        Ok(config)
    }
}

pub(crate) fn iface_name_cstring(name: &str) -> Result<CString, NetworkError> {
    if name.is_empty() {
        return Err(NetworkError::Validation(
            "interface name must be a non-empty string".into(),
        ));
    }
    if name.len() >= ffi::IFACE_NAME_SIZE {
        return Err(NetworkError::Validation(format!(
            "interface name '{name}' exceeds {} bytes",
            ffi::IFACE_NAME_SIZE - 1
        )));
    }
    CString::new(name).map_err(|_| {
        NetworkError::Validation(
            "interface name must not contain NUL bytes".into(),
        )
    })
}

fn netmask_is_contiguous(netmask: Ipv4Addr) -> bool {
    let bits = u32::from_be_bytes(netmask.octets());
    bits.leading_ones() + bits.trailing_zeros() == 32
}
