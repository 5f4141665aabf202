use chrono::{DateTime, Utc};
use clap::Subcommand;
use shugyo_core::history::{format_hms, HistoryStore, NewHistoryRecord};
use shugyo_core::input::parse_duration;
use shugyo_core::storage::Database;
use shugyo_core::{BodyPart, Config};

#[derive(Subcommand)]
pub enum HistoryAction {
    /// List records, newest first
    List {
        /// Show at most this many records
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show one record
    Show { id: i64 },
    /// Record a session by hand
    Add {
        #[arg(long)]
        sets: u32,
        /// Seconds, or mm:ss
        #[arg(long)]
        total_time: String,
        /// Defaults to history.body_part from the config
        #[arg(long)]
        body_part: Option<BodyPart>,
        /// RFC 3339 timestamp; defaults to now
        #[arg(long)]
        date: Option<DateTime<Utc>>,
    },
    /// Edit the sets and total time of a record
    Update {
        id: i64,
        #[arg(long)]
        sets: u32,
        /// Seconds, or mm:ss
        #[arg(long)]
        total_time: String,
    },
    /// Delete one record
    Delete { id: i64 },
    /// Delete every record
    Clear {
        /// Confirm deleting all history
        #[arg(long)]
        yes: bool,
    },
}

pub fn run(action: HistoryAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut db = Database::open()?;

    match action {
        HistoryAction::List { limit } => {
            let mut records = db.list()?;
            if let Some(limit) = limit {
                records.truncate(limit);
            }
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        HistoryAction::Show { id } => {
            let record = db.get(id)?;
            let mut json = serde_json::to_value(&record)?;
            json["totalTimeFormatted"] = format_hms(record.total_time_secs).into();
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        HistoryAction::Add {
            sets,
            total_time,
            body_part,
            date,
        } => {
            let body_part = match body_part {
                Some(part) => part,
                None => Config::load_or_default().history.body_part,
            };
            let record = db.create(&NewHistoryRecord {
                date: date.unwrap_or_else(Utc::now),
                body_part,
                sets,
                total_time_secs: parse_duration(&total_time)?,
            })?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        HistoryAction::Update {
            id,
            sets,
            total_time,
        } => {
            db.update(id, sets, parse_duration(&total_time)?)?;
            println!("{}", serde_json::to_string_pretty(&db.get(id)?)?);
        }
        HistoryAction::Delete { id } => {
            db.delete(id)?;
            println!("deleted {id}");
        }
        HistoryAction::Clear { yes } => {
            if !yes {
                return Err("refusing to clear history without --yes".into());
            }
            let removed = db.delete_all()?;
            println!("deleted {removed} records");
        }
    }
    Ok(())
}
