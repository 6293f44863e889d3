use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::config::TimestampResolution;

const NANOS_PER_SEC: i64 = 1_000_000_000;

/// A point in time as signed nanoseconds since the Unix epoch.
///
/// On the wire only the configured resolution survives; finer precision is
/// truncated toward zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    nanos: i64,
}

impl Timestamp {
    pub const UNIX_EPOCH: Timestamp = Timestamp { nanos: 0 };

    pub fn from_unix_nanos(nanos: i64) -> Self {
        Self { nanos }
    }

    /// Returns `None` if the result does not fit in `i64` nanoseconds.
    pub fn from_unix_micros(micros: i64) -> Option<Self> {
        micros.checked_mul(1_000).map(Self::from_unix_nanos)
    }

    /// Seconds plus a sub-second nanosecond part.
    pub fn from_parts(secs: i64, subsec_nanos: u32) -> Option<Self> {
        secs.checked_mul(NANOS_PER_SEC)
            .and_then(|n| n.checked_add(i64::from(subsec_nanos)))
            .map(Self::from_unix_nanos)
    }

    pub fn now() -> Self {
        Self::from(SystemTime::now())
    }

    pub fn unix_nanos(self) -> i64 {
        self.nanos
    }

    pub fn unix_micros(self) -> i64 {
        self.nanos / 1_000
    }

    /// Tick count at `resolution`, truncated toward zero.
    pub fn to_ticks(self, resolution: TimestampResolution) -> i64 {
        self.nanos / resolution.nanos_per_tick()
    }

    /// Inverse of [`Timestamp::to_ticks`]. `None` on overflow.
    pub fn from_ticks(ticks: i64, resolution: TimestampResolution) -> Option<Self> {
        ticks
            .checked_mul(resolution.nanos_per_tick())
            .map(Self::from_unix_nanos)
    }

    /// Drop precision finer than `resolution`.
    pub fn truncate(self, resolution: TimestampResolution) -> Self {
        let per_tick = resolution.nanos_per_tick();
        Self::from_unix_nanos(self.nanos / per_tick * per_tick)
    }
}

impl From<SystemTime> for Timestamp {
    fn from(time: SystemTime) -> Self {
        let nanos = match time.duration_since(UNIX_EPOCH) {
            Ok(after) => i64::try_from(after.as_nanos()).unwrap_or(i64::MAX),
            Err(before) => i64::try_from(before.duration().as_nanos())
                .map(|n| -n)
                .unwrap_or(i64::MIN),
        };
        Self { nanos }
    }
}

impl From<Timestamp> for SystemTime {
    fn from(ts: Timestamp) -> Self {
        let magnitude = Duration::from_nanos(ts.nanos.unsigned_abs());
        if ts.nanos >= 0 {
            UNIX_EPOCH + magnitude
        } else {
            UNIX_EPOCH - magnitude
        }
    }
}
