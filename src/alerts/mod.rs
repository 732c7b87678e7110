use log::info;
use rust_decimal::Decimal;

use crate::db::Database;
use crate::error::{CommandError, CommandResult};

/// Classification of spend against a category budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BudgetStatus {
    Ok,
    /// At or past 80% of the limit, below 100%.
    Near,
    /// At or past the limit.
    Over,
}

impl BudgetStatus {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            BudgetStatus::Ok => "OK",
            BudgetStatus::Near => "NEAR",
            BudgetStatus::Over => "OVER",
        }
    }
}

/// Thresholds are inclusive: total >= limit is OVER, total >= 80% is NEAR.
/// A non-positive limit is rejected, not classified.
pub(crate) fn budget_status(total_spent: Decimal, limit: Decimal) -> CommandResult<BudgetStatus> {
    if limit <= Decimal::ZERO {
        return Err(CommandError::validation(
            "Budget limit must be greater than zero.",
        ));
    }
    if total_spent >= limit {
        Ok(BudgetStatus::Over)
    } else if total_spent >= limit * Decimal::new(8, 1) {
        Ok(BudgetStatus::Near)
    } else {
        Ok(BudgetStatus::Ok)
    }
}

/// Evaluates the category budget after an expense was recorded and returns
/// the alert line to append to the reply, if one should be sent. At most one
/// message per call; the 24h cooldown is enforced atomically in storage, so
/// concurrent over-budget expenses cannot both fire.
pub(crate) fn check_expense(
    db: &Database,
    group_id: i64,
    category: &str,
    month: &str,
    now: &str,
) -> CommandResult<Option<String>> {
    let Some(limit) = db.get_budget_limit(group_id, category)? else {
        return Ok(None);
    };
    let spent = db.category_spend(group_id, category, month)?;
    let status = budget_status(spent, limit)?;
    if status == BudgetStatus::Ok {
        return Ok(None);
    }
    if !db.try_mark_alert(group_id, category, now)? {
        return Ok(None);
    }
    info!("budget alert for group {group_id} category '{category}': {spent} of {limit}");
    let message = match status {
        BudgetStatus::Over => {
            format!("Budget alert: '{category}' is over its limit ({spent} of {limit}).")
        }
        _ => format!("Budget warning: '{category}' has reached {spent} of {limit}."),
    };
    Ok(Some(message))
}
