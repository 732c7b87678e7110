use anyhow::{Context, Result};
use chrono::{Datelike, Days, NaiveDate};
use log::{info, warn};
use std::collections::HashSet;
use std::path::Path;

use crate::db::Database;
use crate::models::Entry;

/// The calendar month immediately preceding `today`'s month, as "YYYY-MM".
/// Day-of-month is irrelevant: first-of-this-month minus one day, truncated.
pub(crate) fn last_completed_month(today: NaiveDate) -> String {
    let first = today.with_day(1).unwrap_or(today);
    let prev = first.checked_sub_days(Days::new(1)).unwrap_or(first);
    prev.format("%Y-%m").to_string()
}

/// Full row sets for one group and month, timestamp ascending. Pure read;
/// the caller renders them into whatever document it delivers.
pub(crate) fn export_rows(
    db: &Database,
    group_id: i64,
    month: &str,
) -> Result<(Vec<Entry>, Vec<Entry>)> {
    let expenses = db.get_expenses(group_id, Some(month))?;
    let income = db.get_income(group_id, Some(month))?;
    Ok((expenses, income))
}

/// Writes one row set to a CSV file. Income rows leave the category column
/// empty. Returns the number of data rows written.
pub(crate) fn write_export_csv(path: &Path, rows: &[Entry]) -> Result<usize> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create export file: {}", path.display()))?;
    writer.write_record(["timestamp", "user", "amount", "category", "note"])?;
    for entry in rows {
        writer.write_record([
            entry.timestamp.as_str(),
            entry.user.as_str(),
            &entry.amount.to_string(),
            entry.category.as_deref().unwrap_or(""),
            entry.note.as_str(),
        ])?;
    }
    writer.flush()?;
    Ok(rows.len())
}

/// Per-group reset confirmation state: Idle until `request`, back to Idle on
/// `confirm`. There is no expiry; a pending request lives until it is
/// confirmed or the process exits.
#[derive(Debug, Default)]
pub(crate) struct PendingResets {
    pending: HashSet<i64>,
}

impl PendingResets {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Arms (or re-arms) the pending state for a group.
    pub(crate) fn request(&mut self, group_id: i64) {
        self.pending.insert(group_id);
    }

    /// Clears the pending state, reporting whether one existed.
    pub(crate) fn confirm(&mut self, group_id: i64) -> bool {
        self.pending.remove(&group_id)
    }

    pub(crate) fn is_pending(&self, group_id: i64) -> bool {
        self.pending.contains(&group_id)
    }
}

/// One group's prior-month export, produced by the daily tick.
#[derive(Debug)]
pub(crate) struct MonthlyReport {
    pub(crate) group_id: i64,
    pub(crate) group_name: String,
    pub(crate) month: String,
    pub(crate) expenses: Vec<Entry>,
    pub(crate) income: Vec<Entry>,
}

/// Daily trigger, invoked once per day by an external scheduler. Only the
/// first of the month produces reports; groups with no rows for the prior
/// month are skipped.
pub(crate) fn run_daily_tick(db: &Database, today: NaiveDate) -> Result<Vec<MonthlyReport>> {
    if today.day() != 1 {
        return Ok(Vec::new());
    }

    let month = last_completed_month(today);
    info!("monthly rollover: exporting {month} for all groups");

    let mut reports = Vec::new();
    for (group_id, group_name) in db.list_groups()? {
        let (expenses, income) = export_rows(db, group_id, &month)?;
        if expenses.is_empty() && income.is_empty() {
            continue;
        }
        reports.push(MonthlyReport {
            group_id,
            group_name,
            month: month.clone(),
            expenses,
            income,
        });
    }
    if reports.is_empty() {
        warn!("monthly rollover: no data for {month} in any group");
    }
    Ok(reports)
}
