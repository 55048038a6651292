//! Wall-clock source for the scheduler.

use std::time::Duration;

use {
    chrono::{Local, NaiveDateTime, Timelike, Utc},
    chrono_tz::Tz,
};

/// Source of the wall-clock time shown in profile names.
pub trait Clock: Send + Sync {
    /// Current local date and time in the display zone.
    fn now(&self) -> NaiveDateTime;
}

/// Reads the system clock, optionally converted to a fixed zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock {
    tz: Option<Tz>,
}

impl SystemClock {
    /// Host local time.
    pub fn local() -> Self {
        Self { tz: None }
    }

    pub fn in_zone(tz: Tz) -> Self {
        Self { tz: Some(tz) }
    }

    pub fn zone(&self) -> Option<Tz> {
        self.tz
    }
}

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        match self.tz {
            Some(tz) => Utc::now().with_timezone(&tz).naive_local(),
            None => Local::now().naive_local(),
        }
    }
}

/// Time left until the next `:00` second.
///
/// At `H:M:S.f` this is `60 - S - 0.f` seconds, so a wake-up lands on the
/// boundary instead of just before it.
pub fn delay_to_next_minute(now: NaiveDateTime) -> Duration {
    // Leap seconds show up as second 59 with nanos past 1e9.
    let secs = u64::from(now.second().min(59));
    let nanos = u64::from(now.nanosecond().min(999_999_999));
    Duration::from_secs(60 - secs) - Duration::from_nanos(nanos)
}

/// Clock pinned to a start time that advances with tokio's (pausable) clock.
#[cfg(any(test, feature = "testing"))]
pub struct ManualClock {
    base: NaiveDateTime,
    origin: tokio::time::Instant,
}

#[cfg(any(test, feature = "testing"))]
impl ManualClock {
    pub fn starting_at(base: NaiveDateTime) -> Self {
        Self {
            base,
            origin: tokio::time::Instant::now(),
        }
    }
}

#[cfg(any(test, feature = "testing"))]
impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        let elapsed = chrono::Duration::from_std(self.origin.elapsed())
            .unwrap_or_else(|_| chrono::Duration::zero());
        self.base + elapsed
    }
}

#[cfg(test)]
mod tests {
    use {super::*, chrono::NaiveDate};

    fn at(h: u32, m: u32, s: u32, ms: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 1)
            .unwrap()
            .and_hms_milli_opt(h, m, s, ms)
            .unwrap()
    }

    #[test]
    fn delay_from_whole_second() {
        assert_eq!(delay_to_next_minute(at(10, 15, 42, 0)), Duration::from_secs(18));
    }

    #[test]
    fn delay_on_boundary_is_full_minute() {
        assert_eq!(delay_to_next_minute(at(10, 15, 0, 0)), Duration::from_secs(60));
    }

    #[test]
    fn delay_subtracts_fraction() {
        assert_eq!(
            delay_to_next_minute(at(10, 15, 59, 250)),
            Duration::from_millis(750)
        );
    }

    #[test]
    fn delay_during_leap_second_is_bounded() {
        let leap = at(23, 59, 59, 1_500);
        let d = delay_to_next_minute(leap);
        assert!(d > Duration::ZERO && d <= Duration::from_secs(1));
    }

    #[test]
    fn zoned_clock_reports_zone() {
        let clock = SystemClock::in_zone(chrono_tz::Asia::Shanghai);
        assert_eq!(clock.zone(), Some(chrono_tz::Asia::Shanghai));
        assert!(SystemClock::local().zone().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn manual_clock_follows_tokio_time() {
        let clock = ManualClock::starting_at(at(8, 0, 30, 0));
        tokio::time::sleep(Duration::from_secs(45)).await;
        assert_eq!(clock.now(), at(8, 1, 15, 0));
    }
}
