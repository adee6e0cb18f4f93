// ── Core identity types ──
//
// EntityId and MacAddress form the foundation of every domain type.
// Identifiers are the data store's integer primary keys; their numeric
// order is the persisted order every tie-break falls back to.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ── EntityId ────────────────────────────────────────────────────────

/// Canonical identifier for any inventory entity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EntityId(u64);

impl EntityId {
    /// Placeholder for errors raised below the layer that knows the entity.
    pub const UNKNOWN: Self = Self(0);

    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EntityId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

impl From<u64> for EntityId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

// ── MacAddress ──────────────────────────────────────────────────────

/// 48-bit MAC address, displayed lowercase colon-separated (aa:bb:cc:dd:ee:ff).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddress([u8; 6]);

/// Error returned when a string is not a MAC address.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid MAC address: {0:?}")]
pub struct InvalidMac(String);

impl MacAddress {
    pub const fn from_octets(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl FromStr for MacAddress {
    type Err = InvalidMac;

    /// Accepts colon-separated, dash-separated, or bare hex.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex: String = s
            .trim()
            .chars()
            .filter(|c| *c != ':' && *c != '-')
            .collect();
        if hex.len() != 12 || !hex.is_ascii() {
            return Err(InvalidMac(s.to_owned()));
        }

        let mut octets = [0u8; 6];
        for (slot, chunk) in octets.iter_mut().zip(hex.as_bytes().chunks(2)) {
            let pair = std::str::from_utf8(chunk).map_err(|_| InvalidMac(s.to_owned()))?;
            *slot = u8::from_str_radix(pair, 16).map_err(|_| InvalidMac(s.to_owned()))?;
        }
        Ok(Self(octets))
    }
}

impl TryFrom<String> for MacAddress {
    type Error = InvalidMac;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MacAddress> for String {
    fn from(mac: MacAddress) -> Self {
        mac.to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn entity_id_orders_numerically() {
        let mut ids: Vec<EntityId> = ["10", "2", "33"].iter().map(|s| s.parse().unwrap()).collect();
        ids.sort();
        assert_eq!(ids, vec![EntityId::new(2), EntityId::new(10), EntityId::new(33)]);
    }

    #[test]
    fn entity_id_serializes_as_bare_number() {
        assert_eq!(serde_json::to_string(&EntityId::new(7)).unwrap(), "7");
        let id: EntityId = serde_json::from_str("42").unwrap();
        assert_eq!(id.get(), 42);
    }

    #[test]
    fn mac_address_normalizes_dashes_and_case() {
        let mac: MacAddress = "AA-BB-CC-DD-EE-0F".parse().unwrap();
        assert_eq!(mac.to_string(), "aa:bb:cc:dd:ee:0f");
    }

    #[test]
    fn mac_address_accepts_bare_hex() {
        let mac: MacAddress = "001122334455".parse().unwrap();
        assert_eq!(mac.octets(), [0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
    }

    #[test]
    fn mac_address_rejects_garbage() {
        assert!("aa:bb:cc".parse::<MacAddress>().is_err());
        assert!("zz:bb:cc:dd:ee:ff".parse::<MacAddress>().is_err());
    }

    #[test]
    fn mac_address_serde_uses_string_form() {
        let mac: MacAddress = serde_json::from_str("\"AA:BB:CC:DD:EE:FF\"").unwrap();
        assert_eq!(serde_json::to_string(&mac).unwrap(), "\"aa:bb:cc:dd:ee:ff\"");
    }
}
