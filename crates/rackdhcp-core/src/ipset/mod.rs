// ── Range Set Algebra ──
//
// Value types for accounting address usage inside a subnet: labeled
// intervals, their normalized union, the unused complement over a bound,
// and usage statistics with gateway and dynamic-range suggestions.
// All arithmetic runs on the integer value of the address, so IPv4 and
// IPv6 share one code path.

mod range;
mod set;
mod stats;

pub use range::{AddressRange, RangeReport};
pub use set::{AddressSet, SetBound};
pub use stats::{RangeStatistics, StatisticsReport, Suggestions};

pub(crate) use range::to_value;

pub const PURPOSE_UNUSED: &str = "unused";
pub const PURPOSE_GATEWAY_IP: &str = "gateway-ip";
pub const PURPOSE_DYNAMIC: &str = "dynamic";
pub const PURPOSE_PROPOSED_DYNAMIC: &str = "proposed-dynamic";
pub const PURPOSE_UNMANAGED: &str = "unmanaged";
pub const PURPOSE_UNKNOWN: &str = "unknown";
