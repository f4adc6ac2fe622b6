use chrono::{DateTime, TimeZone, Timelike, Utc};

/// Wall-clock source for schedule decisions, swappable in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Hour of day (0-23) in UTC.
    fn utc_hour(&self) -> u32 {
        self.now().hour()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone)]
pub struct FixedClock {
    now: DateTime<Utc>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now }
    }

    /// A clock pinned to `hour`:00 UTC on an arbitrary fixed day.
    pub fn at_utc_hour(hour: u32) -> Self {
        let now = Utc
            .with_ymd_and_hms(2024, 1, 15, hour.min(23), 0, 0)
            .single()
            .unwrap_or_else(Utc::now);
        Self { now }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_reports_pinned_hour() {
        assert_eq!(FixedClock::at_utc_hour(11).utc_hour(), 11);
        assert_eq!(FixedClock::at_utc_hour(0).utc_hour(), 0);
    }

    #[test]
    fn utc_hour_ignores_minutes() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 11, 59, 59).unwrap();
        assert_eq!(FixedClock::new(now).utc_hour(), 11);
    }
}
