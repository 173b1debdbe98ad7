//! Value types shared by the network-facing domains.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ffi::MAC_ADDRESS_GROUPS;

/// A 48-bit hardware address, displayed as colon-separated uppercase hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MacAddress([u8; MAC_ADDRESS_GROUPS]);

impl MacAddress {
    /// The raw octets, transmission order.
    pub fn octets(&self) -> [u8; MAC_ADDRESS_GROUPS] {
        self.0
    }
}

impl From<[u8; MAC_ADDRESS_GROUPS]> for MacAddress {
    fn from(octets: [u8; MAC_ADDRESS_GROUPS]) -> Self {
        Self(octets)
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_colon_separated_hex() {
        let mac = MacAddress::from([0x00, 0x40, 0x9D, 0xAB, 0xCD, 0x0F]);
        assert_eq!(mac.to_string(), "00:40:9D:AB:CD:0F");
    }

    #[test]
    fn octets_round_trip() {
        let octets = [1, 2, 3, 4, 5, 6];
        assert_eq!(MacAddress::from(octets).octets(), octets);
    }
}
