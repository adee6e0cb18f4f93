// ── Labeled address interval ──

use std::collections::BTreeSet;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use rackdhcp_api::IpVersion;
use serde::{Serialize, Serializer};

use super::PURPOSE_UNKNOWN;
use crate::error::CoreError;

/// Integer value of an address; IPv4 occupies the low 32 bits.
pub(crate) fn to_value(addr: IpAddr) -> u128 {
    match addr {
        IpAddr::V4(v4) => u128::from(u32::from(v4)),
        IpAddr::V6(v6) => u128::from(v6),
    }
}

/// Inverse of [`to_value`]. IPv4 values above 32 bits saturate.
pub(crate) fn from_value(value: u128, version: IpVersion) -> IpAddr {
    match version {
        IpVersion::V4 => IpAddr::V4(Ipv4Addr::from(u32::try_from(value).unwrap_or(u32::MAX))),
        IpVersion::V6 => IpAddr::V6(Ipv6Addr::from(value)),
    }
}

/// Serialize a count as a number when it fits in 64 bits, else as a string.
pub(crate) fn serialize_count<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
    match u64::try_from(*value) {
        Ok(n) => serializer.serialize_u64(n),
        Err(_) => serializer.serialize_str(&value.to_string()),
    }
}

/// An inclusive interval of addresses of one family, tagged with a set of
/// free-form purposes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AddressRange {
    // Field order defines the sort: by start, then end.
    pub(crate) version: IpVersion,
    pub(crate) first: u128,
    pub(crate) last: u128,
    pub(crate) purpose: BTreeSet<String>,
}

impl AddressRange {
    /// Range from `start` to `end` inclusive, with no purpose.
    pub fn new(start: IpAddr, end: IpAddr) -> Result<Self, CoreError> {
        let version = IpVersion::of(&start);
        if IpVersion::of(&end) != version {
            return Err(CoreError::AddressFamilyMismatch {
                left: start.to_string(),
                right: end.to_string(),
            });
        }
        let (first, last) = (to_value(start), to_value(end));
        if first > last {
            return Err(CoreError::InvalidRange {
                message: format!("start {start} is above end {end}"),
            });
        }
        Ok(Self {
            version,
            first,
            last,
            purpose: BTreeSet::new(),
        })
    }

    /// One-address range with no purpose.
    pub fn single(addr: IpAddr) -> Self {
        let value = to_value(addr);
        Self {
            version: IpVersion::of(&addr),
            first: value,
            last: value,
            purpose: BTreeSet::new(),
        }
    }

    pub(crate) fn from_values(
        version: IpVersion,
        first: u128,
        last: u128,
        purpose: BTreeSet<String>,
    ) -> Self {
        Self {
            version,
            first,
            last,
            purpose,
        }
    }

    pub(crate) fn tagged(version: IpVersion, first: u128, last: u128, purpose: &str) -> Self {
        Self::from_values(version, first, last, BTreeSet::from([purpose.to_owned()]))
    }

    /// Add a purpose label.
    pub fn with_purpose(mut self, purpose: impl Into<String>) -> Self {
        self.purpose.insert(purpose.into());
        self
    }

    pub fn version(&self) -> IpVersion {
        self.version
    }

    pub fn first_address(&self) -> IpAddr {
        from_value(self.first, self.version)
    }

    pub fn last_address(&self) -> IpAddr {
        from_value(self.last, self.version)
    }

    /// Number of addresses covered; never zero.
    pub fn num_addresses(&self) -> u128 {
        self.last - self.first + 1
    }

    pub fn purposes(&self) -> impl Iterator<Item = &str> {
        self.purpose.iter().map(String::as_str)
    }

    pub fn has_purpose(&self, purpose: &str) -> bool {
        self.purpose.contains(purpose)
    }

    pub fn contains(&self, addr: IpAddr) -> bool {
        IpVersion::of(&addr) == self.version && self.contains_value(to_value(addr))
    }

    pub(crate) fn contains_value(&self, value: u128) -> bool {
        self.first <= value && value <= self.last
    }
}

impl fmt::Display for AddressRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.first_address())?;
        if self.first != self.last {
            write!(f, "-{}", self.last_address())?;
        }
        Ok(())
    }
}

impl FromStr for AddressRange {
    type Err = CoreError;

    /// `ADDR`, `START-END` or either followed by `@purpose`. A bare address
    /// carries no purpose; a bare range is labeled `unknown`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (body, purpose) = match s.split_once('@') {
            Some((body, purpose)) => (body.trim(), Some(purpose.trim())),
            None => (s.trim(), None),
        };

        let parse = |text: &str| {
            text.trim()
                .parse::<IpAddr>()
                .map_err(|e| CoreError::InvalidRange {
                    message: format!("{text:?}: {e}"),
                })
        };

        let range = match body.split_once('-') {
            Some((start, end)) => {
                Self::new(parse(start)?, parse(end)?)?.with_purpose(purpose.unwrap_or(PURPOSE_UNKNOWN))
            }
            None => {
                let range = Self::single(parse(body)?);
                match purpose {
                    Some(p) => range.with_purpose(p),
                    None => range,
                }
            }
        };
        Ok(range)
    }
}

/// JSON shape of one range.
#[derive(Debug, Clone, Serialize)]
pub struct RangeReport {
    pub start: IpAddr,
    pub end: IpAddr,
    #[serde(serialize_with = "serialize_count")]
    pub num_addresses: u128,
    pub purpose: Vec<String>,
}

impl From<&AddressRange> for RangeReport {
    fn from(range: &AddressRange) -> Self {
        Self {
            start: range.first_address(),
            end: range.last_address(),
            num_addresses: range.num_addresses(),
            purpose: range.purpose.iter().cloned().collect(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn new_rejects_reversed_bounds() {
        let err = AddressRange::new(ip("10.0.0.9"), ip("10.0.0.1")).unwrap_err();
        assert!(matches!(err, CoreError::InvalidRange { .. }));
    }

    #[test]
    fn new_rejects_mixed_families() {
        let err = AddressRange::new(ip("10.0.0.1"), ip("2001:db8::1")).unwrap_err();
        assert!(matches!(err, CoreError::AddressFamilyMismatch { .. }));
    }

    #[test]
    fn parse_applies_default_purposes() {
        let single: AddressRange = "10.0.0.5".parse().unwrap();
        assert_eq!(single.purposes().count(), 0);
        assert_eq!(single.num_addresses(), 1);

        let range: AddressRange = "10.0.0.5-10.0.0.9".parse().unwrap();
        assert!(range.has_purpose(PURPOSE_UNKNOWN));
        assert_eq!(range.num_addresses(), 5);

        let tagged: AddressRange = "2001:db8::10-2001:db8::1f@dynamic".parse().unwrap();
        assert!(tagged.has_purpose("dynamic"));
        assert_eq!(tagged.version(), IpVersion::V6);
        assert_eq!(tagged.num_addresses(), 16);
    }

    #[test]
    fn display_collapses_single_address() {
        let single: AddressRange = "10.0.0.5".parse().unwrap();
        assert_eq!(single.to_string(), "10.0.0.5");
        let range: AddressRange = "10.0.0.5-10.0.0.9".parse().unwrap();
        assert_eq!(range.to_string(), "10.0.0.5-10.0.0.9");
    }

    #[test]
    fn contains_checks_family() {
        let range: AddressRange = "0.0.0.1-0.0.0.9".parse().unwrap();
        assert!(range.contains(ip("0.0.0.5")));
        assert!(!range.contains(ip("::5")));
    }
}
