//! Daily study streak tracking

use chrono::NaiveDate;

/// Streak after studying on `today`.
///
/// Studying twice on the same day keeps the streak, studying the day after
/// the last study day extends it, and any gap restarts it at one.
pub fn advance_streak(streak: u32, last_studied_on: Option<NaiveDate>, today: NaiveDate) -> u32 {
    match last_studied_on {
        Some(last) if last == today => streak.max(1),
        Some(last) if last.succ_opt() == Some(today) => streak + 1,
        _ => 1,
    }
}

/// Streak as displayed on `today`: zero once a full day has been missed.
pub fn effective_streak(streak: u32, last_studied_on: Option<NaiveDate>, today: NaiveDate) -> u32 {
    match last_studied_on {
        Some(last) if last == today || last.succ_opt() == Some(today) => streak,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    #[test]
    fn test_first_study_day_starts_streak() {
        assert_eq!(advance_streak(0, None, day(1)), 1);
    }

    #[test]
    fn test_same_day_keeps_streak() {
        assert_eq!(advance_streak(4, Some(day(5)), day(5)), 4);
    }

    #[test]
    fn test_consecutive_day_extends_streak() {
        assert_eq!(advance_streak(4, Some(day(5)), day(6)), 5);
    }

    #[test]
    fn test_gap_resets_streak() {
        assert_eq!(advance_streak(9, Some(day(1)), day(5)), 1);
    }

    #[test]
    fn test_streak_across_month_boundary() {
        let last = NaiveDate::from_ymd_opt(2026, 2, 28).unwrap();
        assert_eq!(advance_streak(2, Some(last), day(1)), 3);
    }

    #[test]
    fn test_effective_streak_lapses_after_missed_day() {
        assert_eq!(effective_streak(3, Some(day(5)), day(5)), 3);
        assert_eq!(effective_streak(3, Some(day(5)), day(6)), 3);
        assert_eq!(effective_streak(3, Some(day(5)), day(7)), 0);
        assert_eq!(effective_streak(3, None, day(7)), 0);
    }
}
