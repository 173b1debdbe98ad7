//! Display texts of the public error types.

use digiapix_rs::{BluetoothError, GpioError, NetworkError, WifiError};

#[test]
fn test_gpio_errors_read_like_sentences() {
    assert_eq!(
        GpioError::Request {
            identity: "18".into()
        }
        .to_string(),
        "Error requesting GPIO 18"
    );
    assert_eq!(
        GpioError::Configuration {
            operation: "set the value"
        }
        .to_string(),
        "Error trying to set the value"
    );
    assert_eq!(
        GpioError::Wait { code: 1 }.to_string(),
        "Error waiting for interrupt (native code 1)"
    );
    assert_eq!(
        GpioError::InterruptStart { code: 1 }.to_string(),
        "Error starting the interrupt wait thread (native code 1)"
    );
    assert_eq!(
        GpioError::CallbackAlreadyRegistered.to_string(),
        "Callback already registered"
    );
    assert_eq!(
        GpioError::CallbackNotRegistered.to_string(),
        "Callback not registered"
    );
    assert_eq!(
        GpioError::Validation("controller must be a non-empty string".into())
            .to_string(),
        "Invalid GPIO parameter: controller must be a non-empty string"
    );
}

#[test]
fn test_network_errors_cover_the_native_table() {
    assert_eq!(
        NetworkError::NoSuchInterface.to_string(),
        "The requested interface does not exist"
    );
    assert_eq!(
        NetworkError::NoInterfaces.to_string(),
        "There is not any available interface"
    );
    assert_eq!(
        NetworkError::Netmask.to_string(),
        "Error getting/setting the interface network mask"
    );
    assert_eq!(
        NetworkError::NotConfigurable.to_string(),
        "The interface is not configurable"
    );
    assert_eq!(
        NetworkError::Config.to_string(),
        "Unable to configure network interface"
    );
    assert_eq!(
        NetworkError::Unknown(99).to_string(),
        "Unrecognized network error code 99"
    );
}

#[test]
fn test_wifi_errors_delegate_the_shared_range() {
    // transparent delegation keeps the network wording
    assert_eq!(
        WifiError::Network(NetworkError::Mtu).to_string(),
        "Error reading the MTU value"
    );
    assert_eq!(WifiError::Ssid.to_string(), "Error getting SSID");
    assert_eq!(
        WifiError::SecurityMode.to_string(),
        "Error getting security mode"
    );
    assert_eq!(
        WifiError::Unknown(42).to_string(),
        "Unrecognized WiFi error code 42"
    );
}

#[test]
fn test_bluetooth_errors_name_the_device() {
    assert_eq!(
        BluetoothError::NotFound("hci3".into()).to_string(),
        "Bluetooth device 'hci3' not found"
    );
    assert_eq!(
        BluetoothError::NoDevicesAvailable.to_string(),
        "No Bluetooth devices available"
    );
    assert_eq!(
        BluetoothError::HciInfo.to_string(),
        "Error reading the HCI information"
    );
    assert_eq!(
        BluetoothError::Config.to_string(),
        "Error configuring the Bluetooth device"
    );
}
