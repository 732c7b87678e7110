use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::db::Database;
use crate::error::{CommandError, CommandResult};
use crate::models::Entry;

/// Parses a user-supplied amount. Rejects anything that is not a finite
/// number greater than zero; storage never sees unvalidated input.
pub(crate) fn parse_amount(raw: &str) -> CommandResult<Decimal> {
    let amount = Decimal::from_str(raw.trim())
        .map_err(|_| CommandError::validation(format!("Invalid amount: {raw}")))?;
    if amount <= Decimal::ZERO {
        return Err(CommandError::validation("Amount must be greater than zero."));
    }
    Ok(amount)
}

/// Validates a "YYYY-MM" month argument.
pub(crate) fn parse_month(raw: &str) -> CommandResult<String> {
    let candidate = format!("{}-01", raw.trim());
    NaiveDate::parse_from_str(&candidate, "%Y-%m-%d")
        .map_err(|_| CommandError::validation(format!("Invalid month (expected YYYY-MM): {raw}")))?;
    Ok(raw.trim().to_string())
}

/// Wall-clock timestamp in the group's zone, the format every stored entry
/// uses. Month filtering and ordering both rely on this exact shape.
pub(crate) fn local_timestamp(tz: Tz, now: DateTime<Utc>) -> String {
    now.with_timezone(&tz).format("%Y-%m-%d %H:%M:%S").to_string()
}

/// "YYYY-MM" key of the current month in the group's zone.
pub(crate) fn current_month(tz: Tz, now: DateTime<Utc>) -> String {
    now.with_timezone(&tz).format("%Y-%m").to_string()
}

pub(crate) fn add_expense(
    db: &Database,
    group_id: i64,
    author: &str,
    amount: &str,
    category: &str,
    note: &str,
    timestamp: String,
) -> CommandResult<(i64, Decimal)> {
    let amount = parse_amount(amount)?;
    let entry = Entry::expense(
        timestamp,
        author.to_string(),
        amount,
        category.to_string(),
        note.to_string(),
        group_id,
    );
    let id = db.insert_entry(&entry)?;
    Ok((id, amount))
}

pub(crate) fn add_income(
    db: &Database,
    group_id: i64,
    author: &str,
    amount: &str,
    note: &str,
    timestamp: String,
) -> CommandResult<(i64, Decimal)> {
    let amount = parse_amount(amount)?;
    let entry = Entry::income(
        timestamp,
        author.to_string(),
        amount,
        note.to_string(),
        group_id,
    );
    let id = db.insert_entry(&entry)?;
    Ok((id, amount))
}

#[derive(Debug, Clone)]
pub(crate) struct MonthlySummary {
    pub(crate) total_income: Decimal,
    pub(crate) total_expenses: Decimal,
    pub(crate) balance: Decimal,
    /// Expense totals per category. Categories without spend appear only
    /// when a budget exists for them, with a zero total.
    pub(crate) by_category: BTreeMap<String, Decimal>,
}

pub(crate) fn monthly_totals(
    db: &Database,
    group_id: i64,
    month: &str,
) -> CommandResult<MonthlySummary> {
    let (total_income, total_expenses) = db.monthly_totals(group_id, month)?;

    let mut by_category: BTreeMap<String, Decimal> = db
        .expense_totals_by_category(group_id, month)?
        .into_iter()
        .collect();
    for budget in db.get_budgets(group_id)? {
        by_category.entry(budget.category).or_insert(Decimal::ZERO);
    }

    Ok(MonthlySummary {
        total_income,
        total_expenses,
        balance: total_income - total_expenses,
        by_category,
    })
}

/// Expenses and income merged, ascending by the stored timestamp string.
/// The format is fixed per group zone, so lexicographic order is
/// chronological order within a group.
pub(crate) fn list_entries(
    db: &Database,
    group_id: i64,
    month: &str,
) -> CommandResult<Vec<Entry>> {
    let mut entries = db.get_expenses(group_id, Some(month))?;
    entries.extend(db.get_income(group_id, Some(month))?);
    entries.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
    Ok(entries)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct UserTotals {
    pub(crate) income: Decimal,
    pub(crate) expenses: Decimal,
}

impl UserTotals {
    pub(crate) fn balance(&self) -> Decimal {
        self.income - self.expenses
    }
}

pub(crate) fn per_user_breakdown(
    db: &Database,
    group_id: i64,
    month: &str,
) -> CommandResult<BTreeMap<String, UserTotals>> {
    let mut breakdown: BTreeMap<String, UserTotals> = BTreeMap::new();
    for (user, income) in db.income_by_user(group_id, month)? {
        breakdown.entry(user).or_default().income = income;
    }
    for (user, expenses) in db.expenses_by_user(group_id, month)? {
        breakdown.entry(user).or_default().expenses = expenses;
    }
    Ok(breakdown)
}
