//! Moderation time-selection policy
//!
//! When an operator approves a post they pick one of three fixed publish
//! slots; the choice is resolved to an absolute timestamp here and persisted
//! on the post. All other lifecycle rules (which transitions are legal, who
//! may perform them) are enforced by the repository and the service facade.

use chrono::{DateTime, Days, Duration, Local, LocalResult, NaiveTime, TimeZone, Utc};

/// Hour of the morning slot used by [`ScheduleChoice::NextMorning`] and by
/// the scheduler's daily fallback publish.
pub const MORNING_HOUR: u32 = 6;

const SHORT_DELAY_SECS: i64 = 10;
const MEDIUM_DELAY_MINS: i64 = 10;

/// The operator's publish-time choice when approving a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleChoice {
    /// Publish almost immediately (now + 10 seconds)
    ImmediateShort,
    /// Publish shortly (now + 10 minutes)
    ImmediateMedium,
    /// Publish tomorrow at 06:00:00 local, minutes and seconds zeroed
    NextMorning,
}

impl ScheduleChoice {
    /// Resolve the choice to the absolute timestamp that gets persisted.
    pub fn resolve(&self, now: DateTime<Local>) -> DateTime<Utc> {
        match self {
            Self::ImmediateShort => (now + Duration::seconds(SHORT_DELAY_SECS)).with_timezone(&Utc),
            Self::ImmediateMedium => {
                (now + Duration::minutes(MEDIUM_DELAY_MINS)).with_timezone(&Utc)
            }
            Self::NextMorning => next_morning(now),
        }
    }
}

/// Tomorrow's date at 06:00:00 local, regardless of the current time of day.
fn next_morning(now: DateTime<Local>) -> DateTime<Utc> {
    let tomorrow = now.date_naive() + Days::new(1);
    let morning = NaiveTime::from_hms_opt(MORNING_HOUR, 0, 0).unwrap_or(NaiveTime::MIN);
    match Local.from_local_datetime(&tomorrow.and_time(morning)) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
        // 06:00 fell into a DST gap; a day from now keeps forward progress
        LocalResult::None => (now + Duration::days(1)).with_timezone(&Utc),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn local(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_immediate_short_adds_ten_seconds() {
        let now = local(2026, 3, 5, 14, 30, 0);
        let resolved = ScheduleChoice::ImmediateShort.resolve(now);
        assert_eq!(resolved, (now + Duration::seconds(10)).with_timezone(&Utc));
    }

    #[test]
    fn test_immediate_medium_adds_ten_minutes() {
        let now = local(2026, 3, 5, 14, 30, 0);
        let resolved = ScheduleChoice::ImmediateMedium.resolve(now);
        assert_eq!(resolved, (now + Duration::minutes(10)).with_timezone(&Utc));
    }

    #[test]
    fn test_next_morning_is_tomorrow_at_six() {
        let now = local(2026, 3, 5, 14, 30, 45);
        let resolved = ScheduleChoice::NextMorning.resolve(now).with_timezone(&Local);

        assert_eq!(resolved.date_naive(), now.date_naive() + Days::new(1));
        assert_eq!(resolved.hour(), 6);
        assert_eq!(resolved.minute(), 0);
        assert_eq!(resolved.second(), 0);
    }

    #[test]
    fn test_next_morning_late_night_still_next_day() {
        // Approving at 23:59 must not schedule for the same night
        let now = local(2026, 3, 5, 23, 59, 59);
        let resolved = ScheduleChoice::NextMorning.resolve(now).with_timezone(&Local);

        assert_eq!(resolved.date_naive(), now.date_naive() + Days::new(1));
        assert_eq!(resolved.hour(), 6);
    }

    #[test]
    fn test_next_morning_early_morning_skips_today() {
        // 05:00 today: the slot is still tomorrow, matching the original policy
        let now = local(2026, 3, 5, 5, 0, 0);
        let resolved = ScheduleChoice::NextMorning.resolve(now).with_timezone(&Local);
        assert_eq!(resolved.date_naive(), now.date_naive() + Days::new(1));
    }
}
