mod schema;

use anyhow::{Context, Result};
use log::info;
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;

use crate::models::*;

pub(crate) struct Database {
    conn: Connection,
}

impl Database {
    pub(crate) fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .context("Failed to set database pragmas")?;
        let mut db = Self { conn };
        db.migrate().context("Database migration failed")?;
        Ok(db)
    }

    #[cfg(test)]
    pub(crate) fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        let mut db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&mut self) -> Result<()> {
        let has_version_table: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            [],
            |row| row.get(0),
        )?;

        if !has_version_table {
            self.conn.execute_batch(schema::SCHEMA_V1)?;
            self.conn.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                params![schema::CURRENT_VERSION],
            )?;
            return Ok(());
        }

        let current: i32 = self
            .conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
                row.get(0)
            })
            .unwrap_or(0);

        for &(from_version, sql) in schema::MIGRATIONS {
            if current <= from_version {
                self.conn.execute_batch(sql)?;
            }
        }

        if current < schema::CURRENT_VERSION {
            self.conn.execute(
                "UPDATE schema_version SET version = ?1",
                params![schema::CURRENT_VERSION],
            )?;
        }

        Ok(())
    }

    // ── Groups ────────────────────────────────────────────────

    /// Idempotent by unique name: returns the existing id when the name is
    /// already taken, otherwise inserts and returns the new id.
    pub(crate) fn create_or_get_group(&self, name: &str, timezone: &str) -> Result<i64> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO groups (name, timezone) VALUES (?1, ?2)",
            params![name, timezone],
        )?;
        let id: i64 = self.conn.query_row(
            "SELECT id FROM groups WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;
        if inserted > 0 {
            info!("created group '{name}' (id {id})");
        }
        Ok(id)
    }

    pub(crate) fn get_group(&self, id: i64) -> Result<Option<Group>> {
        let result = self
            .conn
            .query_row(
                "SELECT id, name, invite_code, timezone FROM groups WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Group {
                        id: Some(row.get(0)?),
                        name: row.get(1)?,
                        invite_code: row.get(2)?,
                        timezone: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(result)
    }

    pub(crate) fn get_group_by_name(&self, name: &str) -> Result<Option<Group>> {
        let result = self
            .conn
            .query_row(
                "SELECT id, name, invite_code, timezone FROM groups WHERE name = ?1",
                params![name],
                |row| {
                    Ok(Group {
                        id: Some(row.get(0)?),
                        name: row.get(1)?,
                        invite_code: row.get(2)?,
                        timezone: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(result)
    }

    pub(crate) fn list_groups(&self) -> Result<Vec<(i64, String)>> {
        let mut stmt = self.conn.prepare("SELECT id, name FROM groups")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub(crate) fn set_group_timezone(&self, group_id: i64, timezone: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE groups SET timezone = ?1 WHERE id = ?2",
            params![timezone, group_id],
        )?;
        Ok(())
    }

    // ── Memberships ───────────────────────────────────────────

    pub(crate) fn resolve_group(&self, user_id: i64) -> Result<Option<i64>> {
        let result: Option<Option<i64>> = self
            .conn
            .query_row(
                "SELECT group_id FROM users WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(result.flatten())
    }

    /// Upsert: any prior membership is replaced in one step.
    pub(crate) fn assign_user_to_group(&self, member: &Member) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO users (user_id, username, group_id) VALUES (?1, ?2, ?3)",
            params![member.user_id, member.username, member.group_id],
        )?;
        Ok(())
    }

    pub(crate) fn list_users(&self, group_id: i64) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT username FROM users WHERE group_id = ?1")?;
        let rows = stmt.query_map(params![group_id], |row| row.get(0))?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// Deletes at most one membership row matching both username and group.
    /// Returns whether a row was removed.
    pub(crate) fn remove_user(&self, username: &str, group_id: i64) -> Result<bool> {
        let changed = self.conn.execute(
            "DELETE FROM users WHERE rowid IN (
                 SELECT rowid FROM users WHERE username = ?1 AND group_id = ?2 LIMIT 1
             )",
            params![username, group_id],
        )?;
        Ok(changed > 0)
    }

    // ── Entries ───────────────────────────────────────────────

    pub(crate) fn insert_entry(&self, entry: &Entry) -> Result<i64> {
        match entry.kind {
            EntryKind::Expense => self.conn.execute(
                "INSERT INTO expenses (timestamp, user, amount, category, note, group_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    entry.timestamp,
                    entry.user,
                    entry.amount.to_string(),
                    entry.category.as_deref().unwrap_or(""),
                    entry.note,
                    entry.group_id,
                ],
            )?,
            EntryKind::Income => self.conn.execute(
                "INSERT INTO income (timestamp, user, amount, note, group_id)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    entry.timestamp,
                    entry.user,
                    entry.amount.to_string(),
                    entry.note,
                    entry.group_id,
                ],
            )?,
        };
        Ok(self.conn.last_insert_rowid())
    }

    /// Expenses for a group, ascending by stored timestamp. `month` filters
    /// by "YYYY-MM" prefix when given.
    pub(crate) fn get_expenses(&self, group_id: i64, month: Option<&str>) -> Result<Vec<Entry>> {
        let mut sql = String::from(
            "SELECT id, timestamp, user, amount, category, note, group_id
             FROM expenses WHERE group_id = ?1",
        );
        if month.is_some() {
            sql.push_str(" AND timestamp LIKE ?2");
        }
        sql.push_str(" ORDER BY timestamp ASC, id ASC");

        fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Entry> {
            let amount_str: String = row.get(3)?;
            Ok(Entry {
                id: Some(row.get(0)?),
                timestamp: row.get(1)?,
                user: row.get(2)?,
                amount: Decimal::from_str(&amount_str).unwrap_or_default(),
                category: Some(row.get(4)?),
                note: row.get(5)?,
                group_id: row.get(6)?,
                kind: EntryKind::Expense,
            })
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = match month {
            Some(m) => stmt.query_map(params![group_id, format!("{m}%")], map_row)?,
            None => stmt.query_map(params![group_id], map_row)?,
        };
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// Income rows for a group, ascending by stored timestamp.
    pub(crate) fn get_income(&self, group_id: i64, month: Option<&str>) -> Result<Vec<Entry>> {
        let mut sql = String::from(
            "SELECT id, timestamp, user, amount, note, group_id
             FROM income WHERE group_id = ?1",
        );
        if month.is_some() {
            sql.push_str(" AND timestamp LIKE ?2");
        }
        sql.push_str(" ORDER BY timestamp ASC, id ASC");

        fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Entry> {
            let amount_str: String = row.get(3)?;
            Ok(Entry {
                id: Some(row.get(0)?),
                timestamp: row.get(1)?,
                user: row.get(2)?,
                amount: Decimal::from_str(&amount_str).unwrap_or_default(),
                category: None,
                note: row.get(4)?,
                group_id: row.get(5)?,
                kind: EntryKind::Income,
            })
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = match month {
            Some(m) => stmt.query_map(params![group_id, format!("{m}%")], map_row)?,
            None => stmt.query_map(params![group_id], map_row)?,
        };
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    // ── Totals ────────────────────────────────────────────────

    /// (total_income, total_expenses) for the month. Both sums are positive.
    pub(crate) fn monthly_totals(&self, group_id: i64, month: &str) -> Result<(Decimal, Decimal)> {
        let pattern = format!("{month}%");
        let income: String = self.conn.query_row(
            "SELECT CAST(COALESCE(SUM(amount), 0) AS TEXT) FROM income
             WHERE group_id = ?1 AND timestamp LIKE ?2",
            params![group_id, pattern],
            |row| row.get(0),
        )?;
        let expenses: String = self.conn.query_row(
            "SELECT CAST(COALESCE(SUM(amount), 0) AS TEXT) FROM expenses
             WHERE group_id = ?1 AND timestamp LIKE ?2",
            params![group_id, pattern],
            |row| row.get(0),
        )?;
        Ok((
            Decimal::from_str(&income).unwrap_or_default(),
            Decimal::from_str(&expenses).unwrap_or_default(),
        ))
    }

    pub(crate) fn expense_totals_by_category(
        &self,
        group_id: i64,
        month: &str,
    ) -> Result<Vec<(String, Decimal)>> {
        let mut stmt = self.conn.prepare(
            "SELECT category, CAST(SUM(amount) AS TEXT) FROM expenses
             WHERE group_id = ?1 AND timestamp LIKE ?2
             GROUP BY category ORDER BY category",
        )?;
        let rows = stmt.query_map(params![group_id, format!("{month}%")], |row| {
            let name: String = row.get(0)?;
            let amt_str: String = row.get(1)?;
            Ok((name, Decimal::from_str(&amt_str).unwrap_or_default()))
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub(crate) fn category_spend(
        &self,
        group_id: i64,
        category: &str,
        month: &str,
    ) -> Result<Decimal> {
        let total: String = self.conn.query_row(
            "SELECT CAST(COALESCE(SUM(amount), 0) AS TEXT) FROM expenses
             WHERE group_id = ?1 AND category = ?2 AND timestamp LIKE ?3",
            params![group_id, category, format!("{month}%")],
            |row| row.get(0),
        )?;
        Ok(Decimal::from_str(&total).unwrap_or_default())
    }

    pub(crate) fn income_by_user(
        &self,
        group_id: i64,
        month: &str,
    ) -> Result<Vec<(String, Decimal)>> {
        self.sum_by_user("income", group_id, month)
    }

    pub(crate) fn expenses_by_user(
        &self,
        group_id: i64,
        month: &str,
    ) -> Result<Vec<(String, Decimal)>> {
        self.sum_by_user("expenses", group_id, month)
    }

    fn sum_by_user(
        &self,
        table: &str,
        group_id: i64,
        month: &str,
    ) -> Result<Vec<(String, Decimal)>> {
        let sql = format!(
            "SELECT user, CAST(SUM(amount) AS TEXT) FROM {table}
             WHERE group_id = ?1 AND timestamp LIKE ?2
             GROUP BY user ORDER BY user"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![group_id, format!("{month}%")], |row| {
            let user: String = row.get(0)?;
            let amt_str: String = row.get(1)?;
            Ok((user, Decimal::from_str(&amt_str).unwrap_or_default()))
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    // ── Budgets ───────────────────────────────────────────────

    /// Upsert: a second set for the same (category, group) replaces the
    /// limit, never duplicates the row.
    pub(crate) fn upsert_budget(&self, budget: &Budget) -> Result<()> {
        self.conn.execute(
            "INSERT INTO budgets (category, limit_amount, group_id)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(category, group_id) DO UPDATE SET limit_amount = ?2",
            params![
                budget.category,
                budget.limit_amount.to_string(),
                budget.group_id,
            ],
        )?;
        Ok(())
    }

    pub(crate) fn get_budgets(&self, group_id: i64) -> Result<Vec<Budget>> {
        let mut stmt = self.conn.prepare(
            "SELECT category, limit_amount, group_id FROM budgets
             WHERE group_id = ?1 ORDER BY category",
        )?;
        let rows = stmt.query_map(params![group_id], |row| {
            let amt_str: String = row.get(1)?;
            Ok(Budget {
                category: row.get(0)?,
                limit_amount: Decimal::from_str(&amt_str).unwrap_or_default(),
                group_id: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub(crate) fn get_budget_limit(
        &self,
        group_id: i64,
        category: &str,
    ) -> Result<Option<Decimal>> {
        let result: Option<String> = self
            .conn
            .query_row(
                "SELECT limit_amount FROM budgets WHERE group_id = ?1 AND category = ?2",
                params![group_id, category],
                |row| row.get(0),
            )
            .optional()?;
        Ok(result.map(|s| Decimal::from_str(&s).unwrap_or_default()))
    }

    // ── Alerts ────────────────────────────────────────────────

    /// Records `now` as the last alert time for (group, category) and returns
    /// true, unless an alert newer than 24 hours exists, in which case nothing
    /// is written and false is returned. The check-then-set is a single upsert
    /// with a conditional conflict clause, so two near-simultaneous callers
    /// cannot both fire.
    pub(crate) fn try_mark_alert(&self, group_id: i64, category: &str, now: &str) -> Result<bool> {
        let changed = self.conn.execute(
            "INSERT INTO alerts (group_id, category, last_alert)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(group_id, category) DO UPDATE SET last_alert = excluded.last_alert
             WHERE julianday(excluded.last_alert) - julianday(alerts.last_alert) >= 1.0",
            params![group_id, category, now],
        )?;
        Ok(changed > 0)
    }

    // ── Resets ────────────────────────────────────────────────

    /// Deletes all expense, income, and budget rows for the group in one
    /// transaction. The group row and its memberships survive.
    pub(crate) fn reset_group(&mut self, group_id: i64) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM expenses WHERE group_id = ?1", params![group_id])?;
        tx.execute("DELETE FROM income WHERE group_id = ?1", params![group_id])?;
        tx.execute("DELETE FROM budgets WHERE group_id = ?1", params![group_id])?;
        tx.commit()?;
        info!("reset all data for group {group_id}");
        Ok(())
    }

    /// Deletes only the given month's entries, budgets intact. `group_id` of
    /// None spans all groups. Returns the number of rows removed.
    pub(crate) fn reset_month(&mut self, group_id: Option<i64>, month: &str) -> Result<usize> {
        let pattern = format!("{month}%");
        let tx = self.conn.transaction()?;
        let mut removed = 0;
        match group_id {
            Some(gid) => {
                removed += tx.execute(
                    "DELETE FROM expenses WHERE group_id = ?1 AND timestamp LIKE ?2",
                    params![gid, pattern],
                )?;
                removed += tx.execute(
                    "DELETE FROM income WHERE group_id = ?1 AND timestamp LIKE ?2",
                    params![gid, pattern],
                )?;
            }
            None => {
                removed += tx.execute(
                    "DELETE FROM expenses WHERE timestamp LIKE ?1",
                    params![pattern],
                )?;
                removed += tx.execute(
                    "DELETE FROM income WHERE timestamp LIKE ?1",
                    params![pattern],
                )?;
            }
        }
        tx.commit()?;
        info!("removed {removed} entries for month {month}");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests;
