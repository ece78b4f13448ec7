use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

/// Server-side time source. Ledger timestamps never come from callers.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    pub fn at_millis(millis: i64) -> Self {
        Self {
            millis: AtomicI64::new(millis),
        }
    }

    pub fn set_millis(&self, millis: i64) {
        self.millis.store(millis, Ordering::SeqCst);
    }

    pub fn advance_millis(&self, delta: i64) {
        self.millis.fetch_add(delta, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.millis.load(Ordering::SeqCst)).unwrap_or_default()
    }
}

/// Drop sub-millisecond precision so ISO-8601 round-trips to the hashed value.
pub fn truncate_to_millis(at: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(at.timestamp_millis()).unwrap_or(at)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_moves_only_on_request() {
        let clock = ManualClock::at_millis(1_000);
        assert_eq!(clock.now().timestamp_millis(), 1_000);
        clock.advance_millis(250);
        assert_eq!(clock.now().timestamp_millis(), 1_250);
        clock.set_millis(10);
        assert_eq!(clock.now().timestamp_millis(), 10);
    }

    #[test]
    fn test_truncate_drops_sub_millis() {
        let at = DateTime::from_timestamp(1_760_000_000, 123_456_789).unwrap();
        let t = truncate_to_millis(at);
        assert_eq!(t.timestamp_subsec_nanos(), 123_000_000);
        assert_eq!(t.timestamp_millis(), at.timestamp_millis());
    }
}
