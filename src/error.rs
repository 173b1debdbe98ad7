//! Error types for the APIX bindings.
//!
//! Domain operations fail with their own enum; library load failures are
//! confined to the explicit load step, so none of the domain enums carries
//! a loading variant. Native status codes map onto variants one to one,
//! with a catch-all for codes this crate does not know about.

use thiserror::Error;

/// Failures while locating or binding libdigiapix.
#[derive(Debug, Error)]
pub enum LibraryError {
    /// No candidate soname could be resolved on the library search path.
    #[error("Could not find '{0}' library in the system")]
    NotFound(String),

    /// A concrete path was given but loading it failed.
    #[error("Unable to load '{path}': {source}")]
    LoadFailed {
        path: String,
        #[source]
        source: libloading::Error,
    },

    /// The library loaded but lacks one of the required entry points.
    #[error("Symbol '{symbol}' is missing from the native library")]
    MissingSymbol {
        symbol: &'static str,
        #[source]
        source: libloading::Error,
    },
}

/// Failures of GPIO requests, configuration and interrupt handling.
#[derive(Debug, Error)]
pub enum GpioError {
    /// Malformed caller input, rejected before any native call.
    #[error("Invalid GPIO parameter: {0}")]
    Validation(String),

    /// The native request returned a null handle.
    #[error("Error requesting GPIO {identity}")]
    Request { identity: String },

    /// A native set/get call reported failure.
    #[error("Error trying to {operation}")]
    Configuration { operation: &'static str },

    /// Blocking wait failed with a hard native code (timeouts are the
    /// non-error [`crate::gpio::WaitResult::Timeout`] outcome instead).
    #[error("Error waiting for interrupt (native code {code})")]
    Wait { code: i32 },

    /// The native interrupt wait thread could not be started.
    #[error("Error starting the interrupt wait thread (native code {code})")]
    InterruptStart { code: i32 },

    /// The callback is already present in the listener set.
    #[error("Callback already registered")]
    CallbackAlreadyRegistered,

    /// The callback is not present in the listener set.
    #[error("Callback not registered")]
    CallbackNotRegistered,
}

/// Failures of wired-network operations, mapped from the native codes.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NetworkError {
    #[error("The requested interface does not exist")]
    NoSuchInterface,
    #[error("Not enough memory to read the network state")]
    NoMemory,
    #[error("There is not any available interface")]
    NoInterfaces,
    #[error("Unable to get network interface state")]
    State,
    #[error("Error getting the interface MAC address")]
    Mac,
    #[error("Error getting/setting the interface IP address")]
    Ip,
    #[error("Error getting/setting the interface network mask")]
    Netmask,
    #[error("Error getting/setting the default gateway address")]
    Gateway,
    #[error("Error getting/setting the DNS address")]
    Dns,
    #[error("Error reading the MTU value")]
    Mtu,
    #[error("Error reading the interface statistics")]
    Stats,
    #[error("The interface is not configurable")]
    NotConfigurable,
    #[error("Unable to configure network interface")]
    Config,
    /// Malformed caller input, rejected before any native call.
    #[error("Invalid network parameter: {0}")]
    Validation(String),
    /// A code this crate does not recognize.
    #[error("Unrecognized network error code {0}")]
    Unknown(i32),
}

impl NetworkError {
    /// Maps a non-zero native code to its variant.
    pub(crate) fn from_code(code: i32) -> Self {
        match code {
            1 => Self::NoSuchInterface,
            2 => Self::NoMemory,
            3 => Self::NoInterfaces,
            4 => Self::State,
            5 => Self::Mac,
            6 => Self::Ip,
            7 => Self::Netmask,
            8 => Self::Gateway,
            9 => Self::Dns,
            10 => Self::Mtu,
            11 => Self::Stats,
            12 => Self::NotConfigurable,
            13 => Self::Config,
            other => Self::Unknown(other),
        }
    }
}

/// Failures of WiFi operations: the wired-network codes plus the
/// WiFi-specific range 14..18.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WifiError {
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error("Error getting range information")]
    RangeInfo,
    #[error("Error getting SSID")]
    Ssid,
    #[error("Error getting frequency")]
    Frequency,
    #[error("Error getting channel")]
    Channel,
    #[error("Error getting security mode")]
    SecurityMode,
    /// Malformed caller input, rejected before any native call.
    #[error("Invalid WiFi parameter: {0}")]
    Validation(String),
    /// A code this crate does not recognize.
    #[error("Unrecognized WiFi error code {0}")]
    Unknown(i32),
}

impl WifiError {
    /// Maps a non-zero native code to its variant.
    pub(crate) fn from_code(code: i32) -> Self {
        match code {
            1..=13 => Self::Network(NetworkError::from_code(code)),
            14 => Self::RangeInfo,
            15 => Self::Ssid,
            16 => Self::Frequency,
            17 => Self::Channel,
            18 => Self::SecurityMode,
            other => Self::Unknown(other),
        }
    }
}

/// Failures of Bluetooth operations, mapped from the native codes plus the
/// lookup outcomes of resolving a device by name.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BluetoothError {
    #[error("The requested device does not exist")]
    NoSuchDevice,
    #[error("Not enough memory to read the Bluetooth state")]
    NoMemory,
    #[error("Error reading the HCI information")]
    HciInfo,
    #[error("Error reading the enabled state")]
    Enable,
    #[error("Error reading the local name")]
    LocalName,
    #[error("Error configuring the Bluetooth device")]
    Config,
    /// The native list call reported no devices at all.
    #[error("No Bluetooth devices available")]
    NoDevicesAvailable,
    /// No listed device carries the requested name.
    #[error("Bluetooth device '{0}' not found")]
    NotFound(String),
    /// Malformed caller input, rejected before any native call.
    #[error("Invalid Bluetooth parameter: {0}")]
    Validation(String),
    /// A code this crate does not recognize.
    #[error("Unrecognized Bluetooth error code {0}")]
    Unknown(i32),
}

impl BluetoothError {
    /// Maps a non-zero native code to its variant.
    pub(crate) fn from_code(code: i32) -> Self {
        match code {
            1 => Self::NoSuchDevice,
            2 => Self::NoMemory,
            3 => Self::HciInfo,
            4 => Self::Enable,
            5 => Self::LocalName,
            6 => Self::Config,
            other => Self::Unknown(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_codes_round_trip_to_variants() {
        assert_eq!(NetworkError::from_code(1), NetworkError::NoSuchInterface);
        assert_eq!(NetworkError::from_code(13), NetworkError::Config);
        assert_eq!(NetworkError::from_code(99), NetworkError::Unknown(99));
    }

    #[test]
    fn wifi_codes_cover_the_network_range() {
        assert_eq!(
            WifiError::from_code(7),
            WifiError::Network(NetworkError::Netmask)
        );
        assert_eq!(WifiError::from_code(15), WifiError::Ssid);
        assert_eq!(WifiError::from_code(42), WifiError::Unknown(42));
    }

    #[test]
    fn bluetooth_codes_round_trip_to_variants() {
        assert_eq!(BluetoothError::from_code(1), BluetoothError::NoSuchDevice);
        assert_eq!(BluetoothError::from_code(6), BluetoothError::Config);
        assert_eq!(BluetoothError::from_code(-3), BluetoothError::Unknown(-3));
    }
}
