//! WiFi state layering, configuration and passphrase handling.

use std::net::Ipv4Addr;

use digiapix_rs::ffi;
use digiapix_rs::{
    MockApix, NetStatus, NetworkError, NetworkProfile, SecurityMode, WifiError,
    WifiInterface, WifiProfile,
};

fn sample_wifi_state() -> ffi::WifiState {
    let mut state = ffi::WifiState {
        freq: 5_240_000_000.0,
        channel: 48,
        sec_mode: 2,
        ..Default::default()
    };
    ffi::copy_str_to_c_chars(&mut state.ssid, "attic");
    state.net_state.status = 0;
    state.net_state.ipv4 = [10, 0, 0, 7];
    state
}

#[test]
fn test_list_returns_the_wireless_interfaces() {
    let mock = MockApix::new();
    mock.add_wifi_iface("wlan0", ffi::WifiState::default());
    mock.add_wifi_iface("wlan1", ffi::WifiState::default());

    assert_eq!(WifiInterface::list(&mock), vec!["wlan0", "wlan1"]);
}

#[test]
fn test_wifi_state_layers_over_the_wired_state() {
    let mock = MockApix::new();
    mock.add_wifi_iface("wlan0", sample_wifi_state());

    let wifi = WifiInterface::get(mock.backend(), "wlan0").unwrap();
    assert_eq!(wifi.name(), "wlan0");
    assert_eq!(wifi.ssid(), "attic");
    assert_eq!(wifi.frequency(), 5_240_000_000.0);
    assert_eq!(wifi.channel(), 48);
    assert_eq!(wifi.security(), Some(SecurityMode::Wpa2));
    // the embedded wired snapshot is reachable without another native call
    assert_eq!(wifi.network().name(), "wlan0");
    assert_eq!(wifi.network().status(), NetStatus::Connected);
    assert_eq!(wifi.network().ipv4(), Ipv4Addr::new(10, 0, 0, 7));
}

#[test]
fn test_unknown_security_modes_read_as_none() {
    let mock = MockApix::new();
    let mut state = sample_wifi_state();
    state.sec_mode = -1;
    mock.add_wifi_iface("wlan0", state);

    let wifi = WifiInterface::get(mock.backend(), "wlan0").unwrap();
    assert_eq!(wifi.security(), None);
}

#[test]
fn test_missing_interfaces_map_through_the_network_variant() {
    let mock = MockApix::new();
    let err = WifiInterface::get(mock.backend(), "wlan9").unwrap_err();
    assert_eq!(err, WifiError::Network(NetworkError::NoSuchInterface));
}

#[test]
fn test_statistics_share_the_wired_counters() {
    let mock = MockApix::new();
    mock.add_wifi_iface("wlan0", sample_wifi_state());
    mock.set_net_stats(
        "wlan0",
        ffi::NetStats {
            rx_packets: 7,
            ..Default::default()
        },
    );

    let wifi = WifiInterface::get(mock.backend(), "wlan0").unwrap();
    assert_eq!(wifi.statistics().unwrap().rx_packets, 7);
}

#[test]
fn test_configure_embeds_the_network_profile_and_captures_the_psk() {
    let mock = MockApix::new();
    mock.add_wifi_iface("wlan0", sample_wifi_state());
    let wifi = WifiInterface::get(mock.backend(), "wlan0").unwrap();

    let profile = WifiProfile::new()
        .with_network(
            NetworkProfile::new().with_ipv4(Ipv4Addr::new(10, 0, 0, 9)),
        )
        .with_ssid("gazebo")
        .with_security(SecurityMode::Wpa3)
        .with_psk("correct horse battery");
    wifi.configure(&profile).unwrap();

    let records = mock.wifi_configs();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.name, "wlan0");
    assert!(record.set_ssid);
    assert_eq!(record.ssid, "gazebo");
    assert_eq!(record.sec_mode, SecurityMode::Wpa3.code());
    assert_eq!(record.psk.as_deref(), Some("correct horse battery"));
    // the wired fields ride along in the same call
    assert!(record.net.set_ip);
    assert_eq!(record.net.ipv4, [10, 0, 0, 9]);
    assert_eq!(ffi::c_chars_to_string(&record.net.name), "wlan0");
}

#[test]
fn test_an_omitted_psk_is_passed_as_leave_unchanged() {
    let mock = MockApix::new();
    mock.add_wifi_iface("wlan0", sample_wifi_state());
    let wifi = WifiInterface::get(mock.backend(), "wlan0").unwrap();

    wifi.configure(&WifiProfile::new().with_ssid("gazebo")).unwrap();

    let record = &mock.wifi_configs()[0];
    assert_eq!(record.psk, None);
    assert_eq!(record.sec_mode, -1);
}

#[test]
fn test_oversized_ssids_are_rejected_before_the_native_call() {
    let mock = MockApix::new();
    mock.add_wifi_iface("wlan0", sample_wifi_state());
    let wifi = WifiInterface::get(mock.backend(), "wlan0").unwrap();

    let profile = WifiProfile::new().with_ssid("s".repeat(33));
    let err = wifi.configure(&profile).unwrap_err();
    assert!(matches!(err, WifiError::Validation(_)));
    assert!(mock.wifi_configs().is_empty());
}

#[test]
fn test_wifi_specific_codes_map_to_their_variants() {
    let mock = MockApix::new();
    mock.add_wifi_iface("wlan0", sample_wifi_state());
    let wifi = WifiInterface::get(mock.backend(), "wlan0").unwrap();

    mock.set_wifi_config_result(15);
    let err = wifi.configure(&WifiProfile::new()).unwrap_err();
    assert_eq!(err, WifiError::Ssid);

    // codes in the shared range delegate to the network table
    mock.set_wifi_config_result(7);
    let err = wifi.configure(&WifiProfile::new()).unwrap_err();
    assert_eq!(err, WifiError::Network(NetworkError::Netmask));
}
