use chrono::{DateTime, Duration, FixedOffset, NaiveTime, TimeZone, Utc};

/// Fires once a day at the given wall-clock time of a fixed UTC offset.
#[derive(Copy, Clone, Debug, PartialEq, Eq, derive_more::Constructor, derive_more::Display)]
#[display("daily at {at} (UTC{offset})")]
pub struct DailyTrigger {
    at: NaiveTime,
    offset: FixedOffset,
}

impl DailyTrigger {
    /// The first occurrence strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> DateTime<Utc> {
        let local = after.with_timezone(&self.offset).naive_local();
        let today = local.date().and_time(self.at);
        let next_local = if today > local {
            today
        } else {
            today + Duration::days(1)
        };
        let next_utc = next_local - Duration::seconds(self.offset.local_minus_utc().into());
        Utc.from_utc_datetime(&next_utc)
    }

    /// Human-readable time of the day, like `09:00 UTC+03:00`.
    pub fn time_of_day(&self) -> String {
        format!("{} UTC{}", self.at.format("%H:%M"), self.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s)
            .expect("invalid datetime string")
            .with_timezone(&Utc)
    }

    fn at_nine(offset_hours: i32) -> DailyTrigger {
        let nine = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        DailyTrigger::new(nine, FixedOffset::east_opt(offset_hours * 3600).unwrap())
    }

    #[test]
    fn next_after_same_day() {
        let trigger = at_nine(0);
        assert_eq!(trigger.next_after(utc("2026-10-16T08:00:00Z")), utc("2026-10-16T09:00:00Z"));
    }

    #[test]
    fn next_after_is_strict() {
        let trigger = at_nine(0);
        assert_eq!(trigger.next_after(utc("2026-10-16T09:00:00Z")), utc("2026-10-17T09:00:00Z"));
        assert_eq!(trigger.next_after(utc("2026-10-16T23:59:59Z")), utc("2026-10-17T09:00:00Z"));
    }

    #[test]
    fn next_after_with_offsets() {
        // 10:00 in Moscow is past 09:00 already
        let trigger = at_nine(3);
        assert_eq!(trigger.next_after(utc("2026-10-16T07:00:00Z")), utc("2026-10-17T06:00:00Z"));
        assert_eq!(trigger.next_after(utc("2026-10-16T05:00:00Z")), utc("2026-10-16T06:00:00Z"));

        // late evening in UTC is already the next morning in UTC+10
        let trigger = at_nine(10);
        assert_eq!(trigger.next_after(utc("2026-10-16T22:30:00Z")), utc("2026-10-16T23:00:00Z"));

        let trigger = at_nine(-5);
        assert_eq!(trigger.next_after(utc("2026-10-16T02:00:00Z")), utc("2026-10-16T14:00:00Z"));
    }

    #[test]
    fn time_of_day() {
        assert_eq!(at_nine(3).time_of_day(), "09:00 UTC+03:00");
        assert_eq!(at_nine(-5).time_of_day(), "09:00 UTC-05:00");
    }
}
