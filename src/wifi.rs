//! WiFi interfaces.
//!
//! A [`WifiInterface`] layers the wireless attributes (SSID, frequency,
//! channel, security mode) over the wired state of the same interface;
//! the embedded [`NetworkInterface`] is reachable through
//! [`WifiInterface::network`]. Configuration extends [`NetworkProfile`]
//! with the wireless fields, and the passphrase is wiped from memory once
//! the native call returns.

use std::ffi::CString;
use std::fmt;
use std::sync::Arc;

use libc::{c_char, EXIT_SUCCESS};
use log::debug;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::backend::ApixBackend;
use crate::error::WifiError;
use crate::ffi;
use crate::network::{
    iface_name_cstring, NetworkInterface, NetworkProfile, NetworkStats,
};

/// Connection security mode (`wifi_sec_mode_t`).
///
/// The native "unknown" value has no variant; state reads surface it as
/// `None` and profiles leave the mode unchanged by not setting one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecurityMode {
    Open,
    Wpa,
    Wpa2,
    Wpa3,
}

impl SecurityMode {
    /// Native `wifi_sec_mode_t` value.
    pub fn code(self) -> i32 {
        match self {
            SecurityMode::Open => 0,
            SecurityMode::Wpa => 1,
            SecurityMode::Wpa2 => 2,
            SecurityMode::Wpa3 => 3,
        }
    }

    pub(crate) fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(SecurityMode::Open),
            1 => Some(SecurityMode::Wpa),
            2 => Some(SecurityMode::Wpa2),
            3 => Some(SecurityMode::Wpa3),
            _ => None,
        }
    }
}

/// A WiFi interface, holding the snapshot read at [`WifiInterface::get`]
/// time.
pub struct WifiInterface {
    network: NetworkInterface,
    ssid: String,
    freq: f64,
    channel: i32,
    sec_mode: i32,
}

impl WifiInterface {
    /// Names of the wireless interfaces the native layer can see.
    pub fn list(backend: &dyn ApixBackend) -> Vec<String> {
        backend.wifi_list_ifaces()
    }

    /// Reads the current state of the named wireless interface.
    pub fn get(
        backend: Arc<dyn ApixBackend>,
        name: &str,
    ) -> Result<Self, WifiError> {
        let name_c = iface_name_cstring(name)?;
        let state = backend
            .wifi_iface_state(&name_c)
            .map_err(WifiError::from_code)?;
        let network = NetworkInterface::from_state(
            Arc::clone(&backend),
            name.to_string(),
            state.net_state,
        );
        debug!("read state of WiFi interface {name}");
        Ok(Self {
            network,
            ssid: ffi::c_chars_to_string(&state.ssid),
            freq: state.freq,
            channel: state.channel,
            sec_mode: state.sec_mode,
        })
    }

    /// The wired-side view of the same interface.
    pub fn network(&self) -> &NetworkInterface {
        &self.network
    }

    pub fn name(&self) -> &str {
        self.network.name()
    }

    /// SSID of the current connection; empty when not associated.
    pub fn ssid(&self) -> &str {
        &self.ssid
    }

    /// Connection frequency in hertz.
    pub fn frequency(&self) -> f64 {
        self.freq
    }

    pub fn channel(&self) -> i32 {
        self.channel
    }

    /// Security mode of the connection; `None` when the native layer
    /// reported it unknown.
    pub fn security(&self) -> Option<SecurityMode> {
        SecurityMode::from_code(self.sec_mode)
    }

    /// Reads the interface counters, shared with the wired side.
    pub fn statistics(&self) -> Result<NetworkStats, WifiError> {
        Ok(self.network.statistics()?)
    }

    /// Applies the profile to this interface.
    pub fn configure(&self, profile: &WifiProfile) -> Result<(), WifiError> {
        let mut config = ffi::WifiConfig {
            name: *self.network.raw_name(),
            ..Default::default()
        };
        config.net_config = profile.network.to_config(self.network.raw_name())?;
        if let Some(ssid) = &profile.ssid {
            validate_ssid(ssid)?;
            config.set_ssid = true;
            ffi::copy_str_to_c_chars(&mut config.ssid, ssid);
        }
        config.sec_mode = profile.security.map_or(-1, SecurityMode::code);
        let psk_c = match &profile.psk {
            Some(psk) => CString::new(psk.as_str()).map_err(|_| {
                WifiError::Validation("PSK must not contain NUL bytes".into())
            })?,
            // the native layer takes an empty passphrase, not a null
            // pointer, as "leave unchanged"
            None => CString::default(),
        };
        config.psk = psk_c.as_ptr() as *mut c_char;
        let rc = self.network.backend().wifi_set_config(config);
        // wipe the transient NUL-terminated passphrase copy
        let mut psk_bytes = psk_c.into_bytes();
        psk_bytes.zeroize();
        if rc == EXIT_SUCCESS {
            debug!("configured WiFi interface {}", self.network.name());
            Ok(())
        } else {
            Err(WifiError::from_code(rc))
        }
    }
}

impl fmt::Debug for WifiInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WifiInterface")
            .field("name", &self.network.name())
            .field("ssid", &self.ssid)
            .field("channel", &self.channel)
            .finish()
    }
}

/// The fields of a WiFi configuration change. Extends [`NetworkProfile`]
/// with the wireless fields; unset fields keep their current value.
///
/// The passphrase is zeroed when the profile drops.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct WifiProfile {
    #[zeroize(skip)]
    pub network: NetworkProfile,
    #[zeroize(skip)]
    pub ssid: Option<String>,
    #[zeroize(skip)]
    pub security: Option<SecurityMode>,
    pub psk: Option<String>,
}

impl WifiProfile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_network(mut self, network: NetworkProfile) -> Self {
        self.network = network;
        self
    }

    pub fn with_ssid(mut self, ssid: impl Into<String>) -> Self {
        self.ssid = Some(ssid.into());
        self
    }

    pub fn with_security(mut self, security: SecurityMode) -> Self {
        self.security = Some(security);
        self
    }

    pub fn with_psk(mut self, psk: impl Into<String>) -> Self {
        self.psk = Some(psk.into());
        self
    }
}

fn validate_ssid(ssid: &str) -> Result<(), WifiError> {
    if ssid.is_empty() || ssid.len() > ffi::SSID_NAME_SIZE {
        return Err(WifiError::Validation(format!(
            "SSID must be 1 to {} bytes",
            ffi::SSID_NAME_SIZE
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn security_codes_match_the_native_enum() {
        assert_eq!(SecurityMode::Open.code(), 0);
        assert_eq!(SecurityMode::Wpa3.code(), 3);
        assert_eq!(SecurityMode::from_code(2), Some(SecurityMode::Wpa2));
        assert_eq!(SecurityMode::from_code(-1), None);
        assert_eq!(SecurityMode::from_code(7), None);
    }

    #[test]
    fn ssid_length_is_validated() {
        assert!(validate_ssid("attic").is_ok());
        assert!(validate_ssid(&"s".repeat(ffi::SSID_NAME_SIZE)).is_ok());
        assert!(validate_ssid("").is_err());
        assert!(validate_ssid(&"s".repeat(ffi::SSID_NAME_SIZE + 1)).is_err());
    }

    #[test]
    fn zeroizing_a_profile_clears_the_psk_only() {
        let mut profile = WifiProfile::new()
            .with_ssid("attic")
            .with_psk("hunter2hunter2");
        profile.zeroize();

        assert!(profile.psk.is_none());
        assert_eq!(profile.ssid.as_deref(), Some("attic"));
    }
}
