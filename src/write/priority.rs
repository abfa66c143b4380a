//! I/O priority profiles: throughput versus interactivity settings.

use crate::error::{Error, Result};
use std::time::Duration;

/// Lowest table priority (maximum throughput).
pub const MIN_PRIORITY: u32 = 1;

/// Highest table priority (maximum interactivity).
pub const MAX_PRIORITY: u32 = 10;

/// Priority used when the caller does not pick one.
pub const DEFAULT_PRIORITY: u32 = 4;

const KIB: usize = 1024;
const MIB: usize = 1024 * KIB;

/// Settings that trade write throughput for caller interactivity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IoPriorityProfile {
    /// How often a chained task checks whether its predecessor finished.
    pub chain_poll_interval: Duration,
    /// Chunk size used when a single block is handed to a write task.
    pub default_chunk_size: usize,
    /// Share of full speed to aim for, in (0, 100]. 100 disables throttling.
    pub bandwidth_percent: f64,
    /// Number of chunks between write-rate measurements.
    pub rate_smoothing_window: u32,
}

impl IoPriorityProfile {
    /// Build a profile, validating every field.
    pub fn new(
        chain_poll_interval: Duration,
        default_chunk_size: usize,
        bandwidth_percent: f64,
        rate_smoothing_window: u32,
    ) -> Result<Self> {
        let profile = Self {
            chain_poll_interval,
            default_chunk_size,
            bandwidth_percent,
            rate_smoothing_window,
        };
        profile.validate()?;
        Ok(profile)
    }

    /// Look up a priority in [`PRIORITY_TABLE`].
    pub fn for_priority(priority: u32) -> Result<Self> {
        if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&priority) {
            return Err(Error::InvalidPriority(priority));
        }
        Ok(PRIORITY_TABLE[(priority - MIN_PRIORITY) as usize])
    }

    /// Check the profile's invariants.
    pub fn validate(&self) -> Result<()> {
        // Also rejects NaN.
        if !(self.bandwidth_percent > 0.0 && self.bandwidth_percent <= 100.0) {
            return Err(Error::InvalidConfig(format!(
                "bandwidth percent must be in (0, 100], got {}",
                self.bandwidth_percent
            )));
        }
        if self.default_chunk_size == 0 {
            return Err(Error::InvalidConfig("default chunk size must be positive".into()));
        }
        if self.rate_smoothing_window == 0 {
            return Err(Error::InvalidConfig(
                "rate smoothing window must be at least one chunk".into(),
            ));
        }
        if self.chain_poll_interval.is_zero() {
            return Err(Error::InvalidConfig("chain poll interval must be positive".into()));
        }
        Ok(())
    }

    /// Whether writes under this profile never sleep.
    pub fn is_unthrottled(&self) -> bool {
        self.bandwidth_percent >= 100.0
    }
}

impl Default for IoPriorityProfile {
    fn default() -> Self {
        PRIORITY_TABLE[(DEFAULT_PRIORITY - MIN_PRIORITY) as usize]
    }
}

const fn entry(poll_ms: u64, chunk: usize, percent: f64, window: u32) -> IoPriorityProfile {
    IoPriorityProfile {
        chain_poll_interval: Duration::from_millis(poll_ms),
        default_chunk_size: chunk,
        bandwidth_percent: percent,
        rate_smoothing_window: window,
    }
}

/// Priorities 1 through 10, highest throughput first.
///
/// Values are empirical; tune them for the target hardware.
pub const PRIORITY_TABLE: [IoPriorityProfile; 10] = [
    entry(20, 4 * MIB, 100.0, 5),
    entry(25, 2 * MIB, 90.0, 5),
    entry(30, 3 * MIB / 2, 78.0, 6),
    entry(35, MIB, 72.0, 6),
    entry(40, 3 * MIB / 4, 65.0, 7),
    entry(45, 512 * KIB, 55.0, 7),
    entry(50, 384 * KIB, 45.0, 8),
    entry(60, 256 * KIB, 35.0, 8),
    entry(70, 192 * KIB, 30.0, 9),
    entry(80, 128 * KIB, 20.0, 10),
];

/// A table priority or a caller-supplied profile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Priority {
    /// Index into [`PRIORITY_TABLE`], 1 through 10.
    Level(u32),
    /// A custom profile that bypasses the table.
    Custom(IoPriorityProfile),
}

impl Priority {
    /// Resolve to a validated profile.
    pub fn resolve(&self) -> Result<IoPriorityProfile> {
        let profile = match *self {
            Self::Level(level) => IoPriorityProfile::for_priority(level)?,
            Self::Custom(profile) => profile,
        };
        profile.validate()?;
        Ok(profile)
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::Level(DEFAULT_PRIORITY)
    }
}

impl From<u32> for Priority {
    fn from(level: u32) -> Self {
        Self::Level(level)
    }
}

impl From<IoPriorityProfile> for Priority {
    fn from(profile: IoPriorityProfile) -> Self {
        Self::Custom(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_is_valid_and_ordered() {
        for profile in &PRIORITY_TABLE {
            profile.validate().unwrap();
        }
        assert!(PRIORITY_TABLE[0].is_unthrottled());
        for pair in PRIORITY_TABLE.windows(2) {
            assert!(pair[1].bandwidth_percent <= pair[0].bandwidth_percent);
            assert!(pair[1].default_chunk_size <= pair[0].default_chunk_size);
        }
        assert!(!PRIORITY_TABLE[9].is_unthrottled());
    }

    #[test]
    fn test_lookup_bounds() {
        assert_eq!(IoPriorityProfile::for_priority(1).unwrap().bandwidth_percent, 100.0);
        assert_eq!(IoPriorityProfile::for_priority(10).unwrap().bandwidth_percent, 20.0);
        assert!(matches!(
            IoPriorityProfile::for_priority(0),
            Err(Error::InvalidPriority(0))
        ));
        assert!(matches!(
            IoPriorityProfile::for_priority(11),
            Err(Error::InvalidPriority(11))
        ));
    }

    #[test]
    fn test_default_is_priority_four() {
        assert_eq!(
            IoPriorityProfile::default(),
            IoPriorityProfile::for_priority(DEFAULT_PRIORITY).unwrap()
        );
        assert_eq!(Priority::default(), Priority::Level(4));
    }

    #[test]
    fn test_validation_rejects_bad_bandwidth() {
        let poll = Duration::from_millis(10);
        assert!(IoPriorityProfile::new(poll, 1024, 0.0, 4).unwrap_err().is_config());
        assert!(IoPriorityProfile::new(poll, 1024, 100.5, 4).is_err());
        assert!(IoPriorityProfile::new(poll, 1024, f64::NAN, 4).is_err());
        assert!(IoPriorityProfile::new(poll, 1024, 50.0, 4).is_ok());
    }

    #[test]
    fn test_validation_rejects_zero_sizes() {
        let poll = Duration::from_millis(10);
        assert!(IoPriorityProfile::new(poll, 0, 50.0, 4).is_err());
        assert!(IoPriorityProfile::new(poll, 16, 50.0, 0).is_err());
        assert!(IoPriorityProfile::new(Duration::ZERO, 16, 50.0, 1).is_err());
    }

    #[test]
    fn test_custom_priority_validated_on_resolve() {
        let bad = IoPriorityProfile {
            bandwidth_percent: 0.0,
            ..IoPriorityProfile::default()
        };
        assert!(Priority::from(bad).resolve().is_err());
        assert!(Priority::Level(11).resolve().is_err());
        assert_eq!(
            Priority::from(2u32).resolve().unwrap().bandwidth_percent,
            90.0
        );
    }
}
