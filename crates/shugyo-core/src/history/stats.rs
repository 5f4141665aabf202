//! History statistics for the calendar view.
//!
//! Records are stored in UTC but grouped into calendar days in a fixed
//! display offset (UTC+9 unless configured otherwise).

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Offset, Utc};
use serde::{Deserialize, Serialize};

use super::HistoryRecord;

pub const DEFAULT_UTC_OFFSET_HOURS: i32 = 9;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodStats {
    pub sessions: u64,
    pub sets: u64,
    pub total_time_secs: u64,
}

impl PeriodStats {
    fn add(&mut self, record: &HistoryRecord) {
        self.sessions += 1;
        self.sets += u64::from(record.sets);
        self.total_time_secs += record.total_time_secs;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayStats {
    pub day: NaiveDate,
    #[serde(flatten)]
    pub totals: PeriodStats,
    pub record_ids: Vec<i64>,
}

/// Fixed offset for `hours` east of UTC. Out-of-range values fall back to UTC.
pub fn display_offset(hours: i32) -> FixedOffset {
    hours
        .checked_mul(3600)
        .and_then(FixedOffset::east_opt)
        .unwrap_or_else(|| Utc.fix())
}

/// Calendar day of `date` as seen in `offset`.
pub fn local_day(date: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    date.with_timezone(&offset).date_naive()
}

/// Per-day totals keyed by local calendar day.
pub fn daily_stats(records: &[HistoryRecord], offset: FixedOffset) -> BTreeMap<NaiveDate, DayStats> {
    let mut days: BTreeMap<NaiveDate, DayStats> = BTreeMap::new();
    for record in records {
        let day = local_day(record.date, offset);
        let entry = days.entry(day).or_insert_with(|| DayStats {
            day,
            totals: PeriodStats::default(),
            record_ids: Vec::new(),
        });
        entry.totals.add(record);
        entry.record_ids.push(record.id);
    }
    days
}

pub fn day_stats(records: &[HistoryRecord], day: NaiveDate, offset: FixedOffset) -> PeriodStats {
    let mut stats = PeriodStats::default();
    for record in records.iter().filter(|r| local_day(r.date, offset) == day) {
        stats.add(record);
    }
    stats
}

pub fn month_stats(
    records: &[HistoryRecord],
    year: i32,
    month: u32,
    offset: FixedOffset,
) -> PeriodStats {
    let mut stats = PeriodStats::default();
    for record in records {
        let day = local_day(record.date, offset);
        if day.year() == year && day.month() == month {
            stats.add(record);
        }
    }
    stats
}

pub fn overall_stats(records: &[HistoryRecord]) -> PeriodStats {
    let mut stats = PeriodStats::default();
    for record in records {
        stats.add(record);
    }
    stats
}

/// `HH:MM:SS`
pub fn format_hms(secs: u64) -> String {
    let h = secs / 3600;
    let m = (secs % 3600) / 60;
    let s = secs % 60;
    format!("{h:02}:{m:02}:{s:02}")
}

/// `MM:SS`; minutes keep growing past 59.
pub fn format_mmss(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::BodyPart;
    use chrono::TimeZone;

    fn record(id: i64, date: DateTime<Utc>, sets: u32, total: u64) -> HistoryRecord {
        HistoryRecord {
            id,
            date,
            body_part: BodyPart::Chest,
            sets,
            total_time_secs: total,
            created_at: date,
        }
    }

    #[test]
    fn evening_utc_lands_on_next_day_in_utc_plus_nine() {
        let jst = display_offset(DEFAULT_UTC_OFFSET_HOURS);
        let date = Utc.with_ymd_and_hms(2024, 3, 31, 20, 0, 0).unwrap();
        assert_eq!(local_day(date, jst), NaiveDate::from_ymd_opt(2024, 4, 1).unwrap());
    }

    #[test]
    fn daily_stats_groups_by_local_day() {
        let jst = display_offset(9);
        let records = vec![
            record(1, Utc.with_ymd_and_hms(2024, 5, 1, 1, 0, 0).unwrap(), 2, 100),
            record(2, Utc.with_ymd_and_hms(2024, 5, 1, 14, 59, 0).unwrap(), 1, 50),
            record(3, Utc.with_ymd_and_hms(2024, 5, 1, 15, 0, 0).unwrap(), 4, 300),
        ];
        let days = daily_stats(&records, jst);
        let may1 = &days[&NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()];
        assert_eq!(may1.totals.sessions, 2);
        assert_eq!(may1.totals.sets, 3);
        assert_eq!(may1.totals.total_time_secs, 150);
        assert_eq!(may1.record_ids, vec![1, 2]);
        let may2 = &days[&NaiveDate::from_ymd_opt(2024, 5, 2).unwrap()];
        assert_eq!(may2.record_ids, vec![3]);
    }

    #[test]
    fn month_stats_uses_local_month() {
        let jst = display_offset(9);
        let records = vec![
            record(1, Utc.with_ymd_and_hms(2024, 1, 31, 16, 0, 0).unwrap(), 1, 60),
            record(2, Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap(), 2, 120),
        ];
        assert_eq!(month_stats(&records, 2024, 2, jst).sessions, 1);
        assert_eq!(month_stats(&records, 2024, 1, jst).total_time_secs, 120);
        assert_eq!(overall_stats(&records).sets, 3);
    }

    #[test]
    fn out_of_range_offset_falls_back_to_utc() {
        assert_eq!(display_offset(48).local_minus_utc(), 0);
        assert_eq!(display_offset(-5).local_minus_utc(), -5 * 3600);
    }

    #[test]
    fn formats_times() {
        assert_eq!(format_hms(3725), "01:02:05");
        assert_eq!(format_mmss(95), "01:35");
        assert_eq!(format_mmss(6000), "100:00");
    }
}
