//! Due-date policy: business hours, "today vs tomorrow" anchors and past-date
//! rejection.
//!
//! Every value here is a naive local date-time in the configured civil
//! timezone; the caller converts the wall clock once per run. Day-limit
//! comparisons use calendar dates, scheduling uses minute precision.

use crate::config::BusinessHours;
use crate::error::{FollowupError, Result};
use crate::types::DUE_FORMAT;
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

#[derive(Debug, Clone)]
pub struct TimeRules {
    open: NaiveTime,
    close_hour: u32,
    escalation: NaiveTime,
    placeholder: NaiveTime,
}

impl TimeRules {
    pub fn new(hours: &BusinessHours) -> Result<Self> {
        let time = |h: u32, m: u32, what: &str| {
            NaiveTime::from_hms_opt(h, m, 0)
                .ok_or_else(|| FollowupError::Config(format!("{what} {h:02}:{m:02} is not a time of day")))
        };
        Ok(Self {
            open: time(hours.open_hour, 0, "hours.open_hour")?,
            close_hour: hours.close_hour,
            escalation: time(hours.escalation_hour, 0, "hours.escalation_hour")?,
            placeholder: time(hours.placeholder_hour, hours.placeholder_minute, "placeholder")?,
        })
    }

    /// Parse an extractor date-time (`YYYY-MM-DD HH:MM`).
    pub fn parse_due(raw: &str) -> Result<NaiveDateTime> {
        NaiveDateTime::parse_from_str(raw.trim(), DUE_FORMAT)
            .map_err(|_| FollowupError::InvalidDateTime(raw.to_string()))
    }

    /// Turn an extracted due date-time into a policy-compliant one.
    ///
    /// 1. A date before today is rejected with [`FollowupError::PastDate`].
    /// 2. The placeholder time (no time in the source text) becomes
    ///    `now + 1h`, truncated to the minute.
    /// 3. A time at or after close of business moves to tomorrow's opening.
    pub fn correct_due(&self, raw: NaiveDateTime, now: NaiveDateTime) -> Result<NaiveDateTime> {
        if raw.date() < now.date() {
            return Err(FollowupError::PastDate {
                due: raw,
                today: now.date(),
            });
        }

        let mut due = raw;
        if due.time() == self.placeholder {
            due = truncate_to_minute(now + Duration::hours(1));
        }

        if due.hour() >= self.close_hour {
            due = self.next_opening(now);
        }

        Ok(due)
    }

    /// [`parse_due`](Self::parse_due) followed by [`correct_due`](Self::correct_due).
    pub fn correct_due_str(&self, raw: &str, now: NaiveDateTime) -> Result<NaiveDateTime> {
        self.correct_due(Self::parse_due(raw)?, now)
    }

    /// Anchor for escalation tasks: today at the escalation hour if that slot
    /// is still ahead, otherwise tomorrow's opening.
    pub fn escalation_anchor(&self, now: NaiveDateTime) -> NaiveDateTime {
        let today_slot = now.date().and_time(self.escalation);
        if now.time() < self.escalation && today_slot > now {
            today_slot
        } else {
            self.next_opening(now)
        }
    }

    /// Tomorrow at the start of business.
    pub fn next_opening(&self, now: NaiveDateTime) -> NaiveDateTime {
        next_day(now.date()).and_time(self.open)
    }

    pub fn placeholder(&self) -> NaiveTime {
        self.placeholder
    }
}

fn next_day(date: NaiveDate) -> NaiveDate {
    date.succ_opt().unwrap_or(date)
}

fn truncate_to_minute(t: NaiveDateTime) -> NaiveDateTime {
    t - Duration::seconds(t.second() as i64) - Duration::nanoseconds(t.nanosecond() as i64)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> TimeRules {
        TimeRules::new(&BusinessHours::default()).unwrap()
    }

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn past_date_is_rejected() {
        let now = dt("2025-09-05 12:30:00");
        for raw in ["2025-09-04 15:00:00", "2025-01-01 10:00:00", "2024-12-31 23:59:00"] {
            let err = rules().correct_due(dt(raw), now).unwrap_err();
            assert!(matches!(err, FollowupError::PastDate { .. }), "{raw}");
        }
    }

    #[test]
    fn earlier_today_is_not_past() {
        let now = dt("2025-09-05 12:30:00");
        let due = rules().correct_due(dt("2025-09-05 09:00:00"), now).unwrap();
        assert_eq!(due, dt("2025-09-05 09:00:00"));
    }

    #[test]
    fn placeholder_becomes_now_plus_one_hour() {
        let now = dt("2025-09-05 12:34:56");
        let due = rules().correct_due(dt("2025-09-06 10:00:00"), now).unwrap();
        assert_eq!(due, dt("2025-09-05 13:34:00"));
    }

    #[test]
    fn placeholder_output_tracks_now_for_every_daytime_hour() {
        for hour in 0..19 {
            let now = dt(&format!("2025-09-05 {hour:02}:17:42"));
            let due = rules().correct_due(dt("2025-09-05 10:00:00"), now).unwrap();
            assert_eq!(due, dt(&format!("2025-09-05 {:02}:17:00", hour + 1)));
        }
    }

    #[test]
    fn placeholder_late_in_the_day_rolls_to_tomorrow() {
        let now = dt("2025-09-05 19:10:00");
        let due = rules().correct_due(dt("2025-09-05 10:00:00"), now).unwrap();
        assert_eq!(due, dt("2025-09-06 10:00:00"));
    }

    #[test]
    fn after_hours_roll_to_tomorrow_opening() {
        let now = dt("2025-09-05 12:00:00");
        for hour in 20..24 {
            let raw = dt(&format!("2025-09-05 {hour:02}:30:00"));
            let due = rules().correct_due(raw, now).unwrap();
            assert_eq!(due, dt("2025-09-06 10:00:00"), "hour {hour}");
        }
    }

    #[test]
    fn corrected_business_hours_value_is_stable() {
        let now = dt("2025-09-05 12:00:00");
        let raw = dt("2025-09-08 14:30:00");
        let once = rules().correct_due(raw, now).unwrap();
        let twice = rules().correct_due(once, now).unwrap();
        assert_eq!(once, raw);
        assert_eq!(twice, once);
    }

    #[test]
    fn parse_due_rejects_garbage() {
        assert!(TimeRules::parse_due("6 сентября").is_err());
        assert!(TimeRules::parse_due("2025-09-06").is_err());
        assert_eq!(
            TimeRules::parse_due(" 2025-09-06 11:15 ").unwrap(),
            dt("2025-09-06 11:15:00")
        );
    }

    #[test]
    fn escalation_anchor_same_day_before_cutoff() {
        let now = dt("2025-09-05 12:05:00");
        assert_eq!(rules().escalation_anchor(now), dt("2025-09-05 17:00:00"));
    }

    #[test]
    fn escalation_anchor_next_morning_after_cutoff() {
        for now in ["2025-09-05 17:00:00", "2025-09-05 17:30:00", "2025-09-05 21:00:00"] {
            assert_eq!(
                rules().escalation_anchor(dt(now)),
                dt("2025-09-06 10:00:00"),
                "{now}"
            );
        }
    }

    #[test]
    fn next_opening_crosses_month_boundary() {
        let now = dt("2025-08-31 21:00:00");
        assert_eq!(rules().next_opening(now), dt("2025-09-01 10:00:00"));
    }

    #[test]
    fn invalid_hours_are_rejected() {
        let hours = BusinessHours {
            open_hour: 25,
            ..BusinessHours::default()
        };
        assert!(TimeRules::new(&hours).is_err());
    }
}
