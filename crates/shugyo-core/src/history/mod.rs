//! Session history: the records produced by finished sessions and the
//! store they are handed to.

mod stats;

pub use stats::{
    daily_stats, day_stats, display_offset, format_hms, format_mmss, local_day, month_stats,
    overall_stats, DayStats, PeriodStats, DEFAULT_UTC_OFFSET_HOURS,
};

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Categorical tag attached to every record. The timer does not interpret it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyPart {
    #[default]
    Chest,
    Arm,
    Leg,
    Shoulder,
    Abs,
    Back,
}

impl BodyPart {
    pub fn as_str(&self) -> &'static str {
        match self {
            BodyPart::Chest => "chest",
            BodyPart::Arm => "arm",
            BodyPart::Leg => "leg",
            BodyPart::Shoulder => "shoulder",
            BodyPart::Abs => "abs",
            BodyPart::Back => "back",
        }
    }
}

impl fmt::Display for BodyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BodyPart {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chest" => Ok(BodyPart::Chest),
            "arm" => Ok(BodyPart::Arm),
            "leg" => Ok(BodyPart::Leg),
            "shoulder" => Ok(BodyPart::Shoulder),
            "abs" => Ok(BodyPart::Abs),
            "back" => Ok(BodyPart::Back),
            other => Err(format!("unknown body part: {other}")),
        }
    }
}

/// A finished session, before the store assigns it an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewHistoryRecord {
    pub date: DateTime<Utc>,
    pub body_part: BodyPart,
    pub sets: u32,
    #[serde(rename = "totalTime")]
    pub total_time_secs: u64,
}

/// A stored session summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub id: i64,
    pub date: DateTime<Utc>,
    pub body_part: BodyPart,
    pub sets: u32,
    #[serde(rename = "totalTime")]
    pub total_time_secs: u64,
    pub created_at: DateTime<Utc>,
}

/// Persistence collaborator for session history.
///
/// `list` returns records newest first (by `date`).
pub trait HistoryStore: Send {
    fn create(&mut self, record: &NewHistoryRecord) -> Result<HistoryRecord, StoreError>;

    fn list(&self) -> Result<Vec<HistoryRecord>, StoreError>;

    fn get(&self, id: i64) -> Result<HistoryRecord, StoreError>;

    fn delete(&mut self, id: i64) -> Result<(), StoreError>;

    /// Returns the number of records removed.
    fn delete_all(&mut self) -> Result<usize, StoreError>;

    fn update(&mut self, id: i64, sets: u32, total_time_secs: u64) -> Result<(), StoreError>;
}

/// Process-local store. Used by tests and `session run --memory`.
#[derive(Debug, Default, Clone)]
pub struct MemoryHistory {
    records: Vec<HistoryRecord>,
    next_id: i64,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl HistoryStore for MemoryHistory {
    fn create(&mut self, record: &NewHistoryRecord) -> Result<HistoryRecord, StoreError> {
        self.next_id += 1;
        let stored = HistoryRecord {
            id: self.next_id,
            date: record.date,
            body_part: record.body_part,
            sets: record.sets,
            total_time_secs: record.total_time_secs,
            created_at: Utc::now(),
        };
        self.records.push(stored.clone());
        Ok(stored)
    }

    fn list(&self) -> Result<Vec<HistoryRecord>, StoreError> {
        let mut out = self.records.clone();
        out.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));
        Ok(out)
    }

    fn get(&self, id: i64) -> Result<HistoryRecord, StoreError> {
        self.records
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    fn delete(&mut self, id: i64) -> Result<(), StoreError> {
        let before = self.records.len();
        self.records.retain(|r| r.id != id);
        if self.records.len() == before {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    fn delete_all(&mut self) -> Result<usize, StoreError> {
        let removed = self.records.len();
        self.records.clear();
        Ok(removed)
    }

    fn update(&mut self, id: i64, sets: u32, total_time_secs: u64) -> Result<(), StoreError> {
        let record = self
            .records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(StoreError::NotFound(id))?;
        record.sets = sets;
        record.total_time_secs = total_time_secs;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_record(sets: u32, total: u64, date: DateTime<Utc>) -> NewHistoryRecord {
        NewHistoryRecord {
            date,
            body_part: BodyPart::Chest,
            sets,
            total_time_secs: total,
        }
    }

    #[test]
    fn memory_store_lists_newest_first() {
        let mut store = MemoryHistory::new();
        let now = Utc::now();
        store.create(&new_record(1, 60, now - Duration::days(1))).unwrap();
        store.create(&new_record(2, 120, now)).unwrap();
        let listed = store.list().unwrap();
        assert_eq!(listed[0].sets, 2);
        assert_eq!(listed[1].sets, 1);
    }

    #[test]
    fn memory_store_update_and_delete() {
        let mut store = MemoryHistory::new();
        let rec = store.create(&new_record(1, 60, Utc::now())).unwrap();
        store.update(rec.id, 4, 240).unwrap();
        assert_eq!(store.get(rec.id).unwrap().total_time_secs, 240);
        store.delete(rec.id).unwrap();
        assert!(matches!(store.delete(rec.id), Err(StoreError::NotFound(_))));
        assert!(matches!(store.update(rec.id, 1, 1), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn record_serializes_like_the_history_api() {
        let rec = HistoryRecord {
            id: 7,
            date: Utc::now(),
            body_part: BodyPart::Leg,
            sets: 3,
            total_time_secs: 95,
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["bodyPart"], "leg");
        assert_eq!(json["totalTime"], 95);
        assert!(json.get("createdAt").is_some());
    }

    #[test]
    fn body_part_parses_case_insensitively() {
        assert_eq!("Shoulder".parse::<BodyPart>().unwrap(), BodyPart::Shoulder);
        assert!("tail".parse::<BodyPart>().is_err());
    }
}
