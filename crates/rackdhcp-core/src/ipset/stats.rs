// ── Usage statistics and suggestions ──

use std::net::IpAddr;

use rackdhcp_api::IpVersion;
use serde::Serialize;

use super::range::{AddressRange, RangeReport, from_value, serialize_count};
use super::set::AddressSet;
use super::{PURPOSE_DYNAMIC, PURPOSE_GATEWAY_IP, PURPOSE_PROPOSED_DYNAMIC, PURPOSE_UNUSED};
use crate::error::CoreError;

/// Statistics over a full range (see [`AddressSet::get_full_range`]), where
/// every address of the bound is covered by exactly one range.
#[derive(Debug, Clone)]
pub struct RangeStatistics {
    ranges: AddressSet,
    first: u128,
    last: u128,
    pub ip_version: IpVersion,
    pub num_available: u128,
    pub largest_available: u128,
    pub num_unavailable: u128,
    pub total_addresses: u128,
    pub suggested_gateway: Option<IpAddr>,
    pub suggested_dynamic_range: Option<AddressRange>,
}

impl RangeStatistics {
    pub fn new(full: AddressSet) -> Result<Self, CoreError> {
        let (Some(first), Some(last), Some(ip_version)) =
            (full.first_value(), full.last_value(), full.version())
        else {
            return Err(CoreError::InvalidRange {
                message: "statistics need at least one address".into(),
            });
        };

        let mut num_available = 0u128;
        let mut num_unavailable = 0u128;
        let mut largest_available = 0u128;
        for range in &full {
            if range.has_purpose(PURPOSE_UNUSED) {
                num_available += range.num_addresses();
                largest_available = largest_available.max(range.num_addresses());
            } else {
                num_unavailable += range.num_addresses();
            }
        }

        let mut stats = Self {
            ranges: full,
            first,
            last,
            ip_version,
            num_available,
            largest_available,
            num_unavailable,
            total_addresses: num_available + num_unavailable,
            suggested_gateway: None,
            suggested_dynamic_range: None,
        };
        if !stats.ranges.includes_purpose(PURPOSE_GATEWAY_IP) {
            stats.suggested_gateway = stats.recommended_gateway();
        }
        if !stats.ranges.includes_purpose(PURPOSE_DYNAMIC) {
            stats.suggested_dynamic_range = stats.recommended_dynamic_range();
        }
        Ok(stats)
    }

    pub fn ranges(&self) -> &AddressSet {
        &self.ranges
    }

    pub fn first_address(&self) -> IpAddr {
        from_value(self.first, self.ip_version)
    }

    pub fn last_address(&self) -> IpAddr {
        from_value(self.last, self.ip_version)
    }

    #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
    pub fn available_ratio(&self) -> f64 {
        self.num_available as f64 / self.total_addresses as f64
    }

    #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
    pub fn usage_ratio(&self) -> f64 {
        self.num_unavailable as f64 / self.total_addresses as f64
    }

    pub fn available_percentage_string(&self) -> String {
        percent(self.available_ratio())
    }

    pub fn usage_percentage_string(&self) -> String {
        percent(self.usage_ratio())
    }

    /// First address if unused, else last if unused, else the first unused
    /// address. IPv6 always gets the subnet-router anycast address.
    fn recommended_gateway(&self) -> Option<IpAddr> {
        match self.ip_version {
            IpVersion::V6 if self.total_addresses <= 2 => None,
            IpVersion::V6 => self
                .first
                .checked_sub(1)
                .map(|v| from_value(v, IpVersion::V6)),
            IpVersion::V4 => {
                let unused = |value: u128| {
                    self.ranges
                        .find_value(value)
                        .is_some_and(|r| r.has_purpose(PURPOSE_UNUSED))
                };
                if unused(self.first) {
                    Some(self.first_address())
                } else if unused(self.last) {
                    Some(self.last_address())
                } else {
                    self.ranges.first_unused()
                }
            }
        }
    }

    /// Upper part of the largest unused block, sized to at most a quarter
    /// of the bound or half of what is still available.
    fn recommended_dynamic_range(&self) -> Option<AddressRange> {
        let largest = self.ranges.largest_unused_block()?;
        let (mut first, mut last) = (largest.first, largest.last);

        if let Some(gateway) = self.suggested_gateway {
            if largest.num_addresses() == 1 {
                return None;
            }
            let gateway = super::range::to_value(gateway);
            if gateway == first {
                first += 1;
            } else if gateway == last {
                last -= 1;
            }
        }

        let size = last - first + 1;
        let one_fourth = self.total_addresses >> 2;
        let half = self.num_available >> 1;
        if size > one_fourth {
            first = last - one_fourth;
        } else if size >= half {
            first = last.checked_sub(half)?.checked_add(1)?;
        }
        if first >= last {
            return None;
        }
        Some(AddressRange::tagged(
            self.ip_version,
            first,
            last,
            PURPOSE_PROPOSED_DYNAMIC,
        ))
    }

    /// Serializable view, optionally with the ranges and suggestions.
    pub fn report(&self, include_ranges: bool, include_suggestions: bool) -> StatisticsReport {
        StatisticsReport {
            num_available: self.num_available,
            largest_available: self.largest_available,
            num_unavailable: self.num_unavailable,
            total_addresses: self.total_addresses,
            usage: self.usage_ratio(),
            usage_string: self.usage_percentage_string(),
            available_string: self.available_percentage_string(),
            first_address: self.first_address(),
            last_address: self.last_address(),
            ip_version: self.ip_version,
            ranges: include_ranges.then(|| self.ranges.iter().map(RangeReport::from).collect()),
            suggestions: include_suggestions.then(|| Suggestions {
                suggested_gateway: self.suggested_gateway,
                suggested_dynamic_range: self.suggested_dynamic_range.as_ref().map(RangeReport::from),
            }),
        }
    }
}

fn percent(ratio: f64) -> String {
    format!("{:.0}%", ratio * 100.0)
}

#[derive(Debug, Clone, Serialize)]
pub struct StatisticsReport {
    #[serde(serialize_with = "serialize_count")]
    pub num_available: u128,
    #[serde(serialize_with = "serialize_count")]
    pub largest_available: u128,
    #[serde(serialize_with = "serialize_count")]
    pub num_unavailable: u128,
    #[serde(serialize_with = "serialize_count")]
    pub total_addresses: u128,
    pub usage: f64,
    pub usage_string: String,
    pub available_string: String,
    pub first_address: IpAddr,
    pub last_address: IpAddr,
    pub ip_version: IpVersion,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ranges: Option<Vec<RangeReport>>,
    #[serde(flatten)]
    pub suggestions: Option<Suggestions>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Suggestions {
    pub suggested_gateway: Option<IpAddr>,
    pub suggested_dynamic_range: Option<RangeReport>,
}
