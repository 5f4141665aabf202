use chrono::{Datelike, Utc};
use clap::Subcommand;
use serde_json::json;
use shugyo_core::history::{
    daily_stats, day_stats, format_hms, local_day, month_stats, overall_stats, HistoryStore,
    PeriodStats,
};
use shugyo_core::storage::Database;
use shugyo_core::Config;

#[derive(Subcommand)]
pub enum StatsAction {
    /// All-time stats
    All,
    /// Today's stats (in the configured offset)
    Today,
    /// Stats for one calendar month; defaults to the current month
    Month {
        year: Option<i32>,
        month: Option<u32>,
    },
    /// Per-day totals for the calendar view
    Days {
        /// Limit to one month, e.g. 2024-05
        #[arg(long)]
        month: Option<String>,
    },
}

fn period_json(stats: &PeriodStats) -> serde_json::Value {
    json!({
        "sessions": stats.sessions,
        "sets": stats.sets,
        "totalTime": stats.total_time_secs,
        "totalTimeFormatted": format_hms(stats.total_time_secs),
    })
}

fn parse_year_month(raw: &str) -> Result<(i32, u32), Box<dyn std::error::Error>> {
    let (y, m) = raw
        .split_once('-')
        .ok_or_else(|| format!("expected YYYY-MM, got '{raw}'"))?;
    let month: u32 = m.parse()?;
    if !(1..=12).contains(&month) {
        return Err(format!("month out of range: {month}").into());
    }
    Ok((y.parse()?, month))
}

pub fn run(action: StatsAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;
    let offset = Config::load_or_default().display_offset();
    let records = db.list()?;
    let today = local_day(Utc::now(), offset);

    match action {
        StatsAction::All => {
            println!("{}", serde_json::to_string_pretty(&period_json(&overall_stats(&records)))?);
        }
        StatsAction::Today => {
            let mut out = period_json(&day_stats(&records, today, offset));
            out["day"] = today.to_string().into();
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        StatsAction::Month { year, month } => {
            let year = year.unwrap_or_else(|| today.year());
            let month = month.unwrap_or_else(|| today.month());
            if !(1..=12).contains(&month) {
                return Err(format!("month out of range: {month}").into());
            }
            let mut out = period_json(&month_stats(&records, year, month, offset));
            out["year"] = year.into();
            out["month"] = month.into();
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        StatsAction::Days { month } => {
            let filter = month.as_deref().map(parse_year_month).transpose()?;
            let days: Vec<_> = daily_stats(&records, offset)
                .into_values()
                .filter(|d| match filter {
                    Some((y, m)) => d.day.year() == y && d.day.month() == m,
                    None => true,
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&days)?);
        }
    }
    Ok(())
}
