//! Reachability status classification.
//!
//! A [`ReachabilityStatus`] is the coarse connectivity classification for a
//! socket address or route: none, cellular, or Wi-Fi. Values carry no
//! numeric meaning and compare by equality only.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::probe::RawReachability;

/// Device network reachability status.
///
/// `Unknown` is the state before the first probe event arrives; it is
/// distinct from `NotReachable`, which is a positive report that the route
/// is down.
///
/// # Examples
///
/// ```
/// use netreach::ReachabilityStatus;
///
/// assert!(ReachabilityStatus::ReachableViaWiFi.is_reachable());
/// assert!(ReachabilityStatus::ReachableViaCellular.is_reachable());
/// assert!(!ReachabilityStatus::Unknown.is_reachable());
/// assert!(!ReachabilityStatus::NotReachable.is_reachable());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReachabilityStatus {
    /// No probe event has been observed yet.
    Unknown,
    /// The route is positively known to be down.
    NotReachable,
    /// Reachable over a cellular (WWAN) interface.
    ReachableViaCellular,
    /// Reachable over a Wi-Fi interface.
    ReachableViaWiFi,
}

impl ReachabilityStatus {
    /// Returns true if the status represents a usable network path.
    #[must_use]
    pub const fn is_reachable(self) -> bool {
        matches!(self, Self::ReachableViaCellular | Self::ReachableViaWiFi)
    }
}

impl From<RawReachability> for ReachabilityStatus {
    fn from(raw: RawReachability) -> Self {
        match raw {
            RawReachability::NotReachable => Self::NotReachable,
            RawReachability::Wwan => Self::ReachableViaCellular,
            RawReachability::Wifi => Self::ReachableViaWiFi,
        }
    }
}

impl fmt::Display for ReachabilityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unknown => "unknown",
            Self::NotReachable => "not reachable",
            Self::ReachableViaCellular => "reachable via cellular",
            Self::ReachableViaWiFi => "reachable via wifi",
        };
        f.write_str(s)
    }
}
