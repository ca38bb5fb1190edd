//! Generic timestamp wrapper.

use serde::{Deserialize, Serialize};

/// A value paired with the sensor timestamp it was captured at.
///
/// Timestamps are microseconds on the sensor's monotonic clock.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Timestamped<T> {
    /// The wrapped value.
    pub data: T,
    /// Capture time in microseconds.
    pub timestamp_us: i64,
}

impl<T> Timestamped<T> {
    /// Wrap a value with its capture time.
    #[inline]
    pub fn new(data: T, timestamp_us: i64) -> Self {
        Self { data, timestamp_us }
    }

    /// Map the value, keeping the timestamp.
    #[inline]
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Timestamped<U> {
        Timestamped {
            data: f(self.data),
            timestamp_us: self.timestamp_us,
        }
    }

    /// Elapsed seconds since an earlier timestamp.
    ///
    /// Clamped at zero; sensors occasionally re-deliver a frame.
    #[inline]
    pub fn seconds_since(&self, earlier_us: i64) -> f32 {
        ((self.timestamp_us - earlier_us).max(0)) as f32 * 1e-6
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_keeps_timestamp() {
        let ts = Timestamped::new(3u32, 5_000_000);
        let doubled = ts.map(|v| v * 2);
        assert_eq!(doubled.data, 6);
        assert_eq!(doubled.timestamp_us, 5_000_000);
    }

    #[test]
    fn test_seconds_since_clamps() {
        let ts = Timestamped::new((), 2_500_000);
        assert!((ts.seconds_since(2_000_000) - 0.5).abs() < 1e-6);
        assert_eq!(ts.seconds_since(3_000_000), 0.0);
    }
}
