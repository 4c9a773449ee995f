use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How much CPU the face locator may spend, as a minimum period between
/// accepted submissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CpuUsage {
    Lowest,
    Low,
    #[default]
    Normal,
    High,
    Highest,
}

const THROTTLE_PERIOD_MS: [u64; 5] = [1500, 800, 400, 100, 0];

impl CpuUsage {
    pub const ALL: [CpuUsage; 5] = [
        CpuUsage::Lowest,
        CpuUsage::Low,
        CpuUsage::Normal,
        CpuUsage::High,
        CpuUsage::Highest,
    ];

    pub fn ordinal(self) -> u8 {
        self as u8
    }

    /// Minimum time between two accepted submissions. Zero for `Highest`.
    pub fn throttle_period(self) -> Duration {
        Duration::from_millis(THROTTLE_PERIOD_MS[self as usize])
    }
}

impl TryFrom<u8> for CpuUsage {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .get(value as usize)
            .copied()
            .ok_or_else(|| format!("CPU usage ordinal must be 0-4, got {value}"))
    }
}

impl fmt::Display for CpuUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CpuUsage::Lowest => "lowest",
            CpuUsage::Low => "low",
            CpuUsage::Normal => "normal",
            CpuUsage::High => "high",
            CpuUsage::Highest => "highest",
        };
        f.write_str(name)
    }
}
