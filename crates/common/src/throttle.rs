//! Throttle profiles for timed scenarios
//!
//! A profile pairs a CPU slowdown multiplier with optional network emulation. The
//! parameters use Chrome DevTools Protocol field names so they can be handed to
//! `Emulation.setCPUThrottlingRate` and `Network.emulateNetworkConditions` unchanged.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Tag of the unthrottled baseline profile
pub const BASELINE: &str = "normal";

/// Emulated connection type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionType {
    Cellular3g,
    Ethernet,
}

/// Network emulation parameters
///
/// Throughput values are bytes/sec, `-1` disables the limit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConditions {
    pub offline: bool,
    pub latency: f64,
    pub download_throughput: f64,
    pub upload_throughput: f64,
    pub connection_type: ConnectionType,
}

/// A named CPU/network emulation configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThrottleProfile {
    pub tag: &'static str,
    pub cpu_rate: f64,
    pub network_conditions: Option<NetworkConditions>,
}

impl ThrottleProfile {
    /// True when applying this profile changes nothing
    pub fn is_baseline(&self) -> bool {
        self.cpu_rate <= 1.0 && self.network_conditions.is_none()
    }
}

static PROFILES: [ThrottleProfile; 5] = [
    ThrottleProfile {
        tag: BASELINE,
        cpu_rate: 1.0,
        network_conditions: None,
    },
    ThrottleProfile {
        tag: "6x",
        cpu_rate: 6.0,
        network_conditions: None,
    },
    ThrottleProfile {
        tag: "3g-4x",
        cpu_rate: 4.0,
        network_conditions: Some(NetworkConditions {
            offline: false,
            latency: 0.0,
            download_throughput: -1.0,
            upload_throughput: -1.0,
            connection_type: ConnectionType::Cellular3g,
        }),
    },
    ThrottleProfile {
        tag: "eth-2x",
        cpu_rate: 2.0,
        network_conditions: Some(NetworkConditions {
            offline: false,
            latency: 0.0,
            download_throughput: -1.0,
            upload_throughput: -1.0,
            connection_type: ConnectionType::Ethernet,
        }),
    },
    ThrottleProfile {
        tag: "4x-slow-cpu",
        cpu_rate: 4.0,
        network_conditions: None,
    },
];

/// Every known profile, baseline first
pub fn all() -> &'static [ThrottleProfile] {
    &PROFILES
}

/// Look up a profile by tag
pub fn lookup(tag: &str) -> Result<&'static ThrottleProfile> {
    PROFILES
        .iter()
        .find(|p| p.tag == tag)
        .ok_or_else(|| Error::UnknownProfile(tag.to_string()))
}

/// Fail on the first unknown tag
pub fn validate_tags<S: AsRef<str>>(tags: &[S]) -> Result<()> {
    for tag in tags {
        lookup(tag.as_ref())?;
    }
    Ok(())
}

/// Position of a tag in the profile table, used to order report columns
pub fn rank(tag: &str) -> Option<usize> {
    PROFILES.iter().position(|p| p.tag == tag)
}
