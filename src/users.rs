//! Registered-user aggregates used by the community metrics.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Users who recycled within this many days count as active.
pub const ACTIVE_WINDOW_DAYS: i64 = 30;

/// Recycle counts above this mark a repeat user.
const REPEAT_THRESHOLD: u64 = 2;

/// The two fields of a user document the dashboard reads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserRecord {
    pub recycle_count: u64,
    pub last_recycle: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UserStats {
    pub total_users: u64,
    pub active_users: u64,
    pub repeat_users: u64,
    pub one_time_users: u64,
}

impl UserStats {
    pub fn from_records<'a>(
        records: impl IntoIterator<Item = &'a UserRecord>,
        now: DateTime<Utc>,
    ) -> Self {
        let cutoff = now - Duration::days(ACTIVE_WINDOW_DAYS);
        let mut stats = UserStats::default();

        for record in records {
            stats.total_users += 1;

            match record.recycle_count {
                0 => {}
                n if n > REPEAT_THRESHOLD => stats.repeat_users += 1,
                _ => stats.one_time_users += 1,
            }

            if record.last_recycle.is_some_and(|t| t > cutoff) {
                stats.active_users += 1;
            }
        }

        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 30, 12, 0, 0).unwrap()
    }

    fn user(count: u64, days_ago: Option<i64>) -> UserRecord {
        UserRecord {
            recycle_count: count,
            last_recycle: days_ago.map(|d| now() - Duration::days(d)),
        }
    }

    #[test]
    fn test_from_records_empty() {
        let stats = UserStats::from_records(&Vec::<UserRecord>::new(), now());
        assert_eq!(stats, UserStats::default());
    }

    #[test]
    fn test_repeat_and_one_time_split() {
        let records = vec![user(0, None), user(1, None), user(2, None), user(3, None), user(10, None)];
        let stats = UserStats::from_records(&records, now());

        assert_eq!(stats.total_users, 5);
        assert_eq!(stats.one_time_users, 2);
        assert_eq!(stats.repeat_users, 2);
    }

    #[test]
    fn test_active_window() {
        let records = vec![user(1, Some(1)), user(1, Some(29)), user(1, Some(30)), user(1, Some(90)), user(1, None)];
        let stats = UserStats::from_records(&records, now());

        assert_eq!(stats.active_users, 2);
    }
}
