// ── Disjoint labeled interval set ──
//
// Ranges are kept sorted by start address with no two entries overlapping.
// Overlapping inputs merge into one range carrying the union of purposes;
// touching inputs merge only when their purposes are identical.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use ipnet::IpNet;
use rackdhcp_api::IpVersion;

use super::range::{AddressRange, to_value};
use super::stats::RangeStatistics;
use super::PURPOSE_UNUSED;
use crate::error::CoreError;

// ── Bound ────────────────────────────────────────────────────────────

/// The address space statistics and complements are computed against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetBound {
    /// A network. The network address is excluded except on IPv4 /31 and
    /// /32 and IPv6 /127 and /128; the IPv4 broadcast address is excluded
    /// except on /31 and /32.
    Network(IpNet),
    /// An explicit range, used end to end.
    Range(AddressRange),
}

impl SetBound {
    pub fn version(&self) -> IpVersion {
        match self {
            Self::Network(net) => IpVersion::of(&net.addr()),
            Self::Range(range) => range.version(),
        }
    }

    /// First and last address that may be reported as unused.
    fn usable_span(&self) -> (u128, u128) {
        match self {
            Self::Network(net) => {
                let first = to_value(net.network());
                let last = to_value(net.broadcast());
                let prefix = net.prefix_len();
                let (skip_network, skip_broadcast) = match net {
                    IpNet::V4(_) => (prefix < 31, prefix < 31),
                    IpNet::V6(_) => (prefix < 127, false),
                };
                let start = if skip_network { first + 1 } else { first };
                let end = if skip_broadcast { last - 1 } else { last };
                (start, end)
            }
            Self::Range(range) => (range.first, range.last),
        }
    }
}

impl From<IpNet> for SetBound {
    fn from(net: IpNet) -> Self {
        Self::Network(net.trunc())
    }
}

impl FromStr for SetBound {
    type Err = CoreError;

    /// `CIDR`, `START-END` or a single address.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.contains('/') {
            let net: IpNet = s.trim().parse().map_err(|e| CoreError::InvalidRange {
                message: format!("{s:?}: {e}"),
            })?;
            return Ok(Self::from(net));
        }
        let range: AddressRange = s.parse()?;
        Ok(Self::Range(AddressRange::from_values(
            range.version,
            range.first,
            range.last,
            Default::default(),
        )))
    }
}

impl fmt::Display for SetBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(net) => write!(f, "{net}"),
            Self::Range(range) => write!(f, "{range}"),
        }
    }
}

// ── Set ──────────────────────────────────────────────────────────────

/// A normalized collection of disjoint, labeled address ranges of one family.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressSet {
    ranges: Vec<AddressRange>,
}

impl AddressSet {
    /// Build a set from arbitrary, possibly overlapping ranges.
    pub fn new(ranges: impl IntoIterator<Item = AddressRange>) -> Result<Self, CoreError> {
        let ranges: Vec<AddressRange> = ranges.into_iter().collect();
        check_family(&ranges)?;
        Ok(Self {
            ranges: condense(ranges),
        })
    }

    /// Build a set of single addresses.
    pub fn from_addresses(addrs: impl IntoIterator<Item = IpAddr>) -> Result<Self, CoreError> {
        Self::new(addrs.into_iter().map(AddressRange::single))
    }

    pub fn ranges(&self) -> &[AddressRange] {
        &self.ranges
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AddressRange> {
        self.ranges.iter()
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn version(&self) -> Option<IpVersion> {
        self.ranges.first().map(AddressRange::version)
    }

    /// Union `other` into this set.
    pub fn merge(&mut self, other: &AddressSet) -> Result<(), CoreError> {
        if let (Some(mine), Some(theirs)) = (self.version(), other.version()) {
            if mine != theirs {
                return Err(mismatch(mine, theirs));
            }
        }
        let mut ranges = std::mem::take(&mut self.ranges);
        ranges.extend(other.ranges.iter().cloned());
        self.ranges = condense(ranges);
        Ok(())
    }

    // ── Lookups ──────────────────────────────────────────────────────

    /// The range holding `addr`.
    pub fn find(&self, addr: IpAddr) -> Option<&AddressRange> {
        if self.version() != Some(IpVersion::of(&addr)) {
            return None;
        }
        let value = to_value(addr);
        self.find_value(value)
    }

    /// The single range holding every address of `range`.
    pub fn find_range(&self, range: &AddressRange) -> Option<&AddressRange> {
        if self.version() != Some(range.version()) {
            return None;
        }
        self.ranges
            .iter()
            .find(|item| item.contains_value(range.first) && item.contains_value(range.last))
    }

    pub fn contains(&self, addr: IpAddr) -> bool {
        self.find(addr).is_some()
    }

    pub fn first(&self) -> Option<IpAddr> {
        self.ranges.first().map(AddressRange::first_address)
    }

    pub fn last(&self) -> Option<IpAddr> {
        self.ranges.last().map(AddressRange::last_address)
    }

    pub fn includes_purpose(&self, purpose: &str) -> bool {
        self.ranges.iter().any(|r| r.has_purpose(purpose))
    }

    /// Whether `addr` carries `purpose`. Errors if `addr` is not in the set.
    pub fn ip_has_purpose(&self, addr: IpAddr, purpose: &str) -> Result<bool, CoreError> {
        self.find(addr)
            .map(|r| r.has_purpose(purpose))
            .ok_or_else(|| CoreError::InvalidRange {
                message: format!("{addr} is not within {self}"),
            })
    }

    pub fn is_unused(&self, addr: IpAddr) -> Result<bool, CoreError> {
        self.ip_has_purpose(addr, PURPOSE_UNUSED)
    }

    pub fn first_unused(&self) -> Option<IpAddr> {
        self.ranges
            .iter()
            .find(|r| r.has_purpose(PURPOSE_UNUSED))
            .map(AddressRange::first_address)
    }

    /// Largest range tagged unused. Ties go to the later range.
    pub fn largest_unused_block(&self) -> Option<&AddressRange> {
        let mut largest: Option<&AddressRange> = None;
        for item in self.ranges.iter().filter(|r| r.has_purpose(PURPOSE_UNUSED)) {
            if largest.is_none_or(|l| item.num_addresses() >= l.num_addresses()) {
                largest = Some(item);
            }
        }
        largest
    }

    pub(crate) fn find_value(&self, value: u128) -> Option<&AddressRange> {
        self.ranges.iter().find(|r| r.contains_value(value))
    }

    pub(crate) fn first_value(&self) -> Option<u128> {
        self.ranges.first().map(|r| r.first)
    }

    pub(crate) fn last_value(&self) -> Option<u128> {
        self.ranges.last().map(|r| r.last)
    }

    // ── Complement ───────────────────────────────────────────────────

    /// Gaps between the stored ranges inside `bound`, tagged unused.
    /// Stored ranges outside the bound are ignored.
    pub fn get_unused_ranges(&self, bound: &SetBound) -> Result<AddressSet, CoreError> {
        let version = bound.version();
        if let Some(mine) = self.version() {
            if mine != version {
                return Err(mismatch(mine, version));
            }
        }

        let (start, end) = bound.usable_span();
        let mut unused = Vec::new();
        // `None` once the walk has passed the top of the address space.
        let mut candidate = Some(start);

        for used in &self.ranges {
            let Some(next) = candidate else { break };
            if used.last < next {
                continue;
            }
            if used.first > end {
                break;
            }
            if used.first > next {
                unused.push(AddressRange::tagged(version, next, used.first - 1, PURPOSE_UNUSED));
            }
            candidate = used.last.checked_add(1);
        }

        if let Some(next) = candidate {
            if next <= end {
                unused.push(AddressRange::tagged(version, next, end, PURPOSE_UNUSED));
            }
        }

        Ok(Self {
            ranges: condense(unused),
        })
    }

    /// This set plus its unused complement over `bound`.
    pub fn get_full_range(&self, bound: &SetBound) -> Result<AddressSet, CoreError> {
        let mut full = self.get_unused_ranges(bound)?;
        full.merge(self)?;
        if full.is_empty() {
            return Err(CoreError::InvalidRange {
                message: format!("{bound} holds no addresses"),
            });
        }
        Ok(full)
    }

    /// Usage statistics over `bound`.
    pub fn statistics(&self, bound: &SetBound) -> Result<RangeStatistics, CoreError> {
        RangeStatistics::new(self.get_full_range(bound)?)
    }
}

impl<'a> IntoIterator for &'a AddressSet {
    type Item = &'a AddressRange;
    type IntoIter = std::slice::Iter<'a, AddressRange>;

    fn into_iter(self) -> Self::IntoIter {
        self.ranges.iter()
    }
}

impl fmt::Display for AddressSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, range) in self.ranges.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{range}")?;
        }
        write!(f, "]")
    }
}

// ── Normalization ────────────────────────────────────────────────────

fn mismatch(left: IpVersion, right: IpVersion) -> CoreError {
    CoreError::AddressFamilyMismatch {
        left: left.to_string(),
        right: right.to_string(),
    }
}

fn check_family(ranges: &[AddressRange]) -> Result<(), CoreError> {
    let Some(first) = ranges.first() else {
        return Ok(());
    };
    match ranges.iter().find(|r| r.version != first.version) {
        Some(other) => Err(CoreError::AddressFamilyMismatch {
            left: first.to_string(),
            right: other.to_string(),
        }),
        None => Ok(()),
    }
}

/// Sort, fold overlapping ranges together, then join touching ranges with
/// identical purposes.
fn condense(mut ranges: Vec<AddressRange>) -> Vec<AddressRange> {
    ranges.sort();
    coalesce_adjacent(combine_overlapping(ranges))
}

fn combine_overlapping(ranges: Vec<AddressRange>) -> Vec<AddressRange> {
    let mut out: Vec<AddressRange> = Vec::with_capacity(ranges.len());
    for item in ranges {
        match out.last_mut() {
            Some(prev) if item.first <= prev.last => {
                prev.last = prev.last.max(item.last);
                prev.purpose.extend(item.purpose);
            }
            _ => out.push(item),
        }
    }
    out
}

fn coalesce_adjacent(ranges: Vec<AddressRange>) -> Vec<AddressRange> {
    let mut out: Vec<AddressRange> = Vec::with_capacity(ranges.len());
    for item in ranges {
        match out.last_mut() {
            Some(prev) if prev.last.checked_add(1) == Some(item.first) && prev.purpose == item.purpose => {
                prev.last = item.last;
            }
            _ => out.push(item),
        }
    }
    out
}
