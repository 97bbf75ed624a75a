use std::time::{SystemTime, UNIX_EPOCH};

/// Source of record timestamps for `BagWriter::write_now`.
pub trait Clock: Send + Sync + 'static {
    /// Nanoseconds since the UNIX epoch.
    fn now(&self) -> u64;
}

fn wall_clock_ns() -> u64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(since_epoch) => u64::try_from(since_epoch.as_nanos()).unwrap_or(u64::MAX),
        // Clock set before 1970.
        Err(_) => 0,
    }
}

/// Wall-clock time via `std::time::SystemTime`. Subject to NTP adjustments.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        wall_clock_ns()
    }
}

/// TSC-backed clock via `quanta`.
///
/// Reads the wall clock once, at construction; later stamps add the
/// monotonic time elapsed since, so they never run backwards mid-recording.
#[derive(Debug, Clone)]
pub struct QuantaClock {
    tsc: quanta::Clock,
    epoch_ns: u64,
    epoch: quanta::Instant,
}

impl Default for QuantaClock {
    fn default() -> Self {
        let tsc = quanta::Clock::new();
        let epoch = tsc.now();
        Self {
            tsc,
            epoch_ns: wall_clock_ns(),
            epoch,
        }
    }
}

impl QuantaClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for QuantaClock {
    fn now(&self) -> u64 {
        let elapsed = self.tsc.now().duration_since(self.epoch).as_nanos();
        self.epoch_ns.saturating_add(u64::try_from(elapsed).unwrap_or(u64::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quanta_clock_starts_near_wall_clock() {
        let wall = SystemClock.now();
        let tsc = QuantaClock::new().now();
        assert!(tsc.abs_diff(wall) < 5_000_000_000);
    }

    #[test]
    fn quanta_clock_does_not_run_backwards() {
        let clock = QuantaClock::new();
        let first = clock.now();
        let second = clock.now();
        assert!(second >= first);
        assert!(first > 0);
    }
}
