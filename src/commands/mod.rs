use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use log::warn;
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::alerts;
use crate::config::Config;
use crate::db::Database;
use crate::error::{CommandError, CommandResult};
use crate::ledger;
use crate::models::{normalize_username, Budget, Member};
use crate::rollover::{self, PendingResets};

/// Identity of the person issuing a command, supplied by the transport.
#[derive(Debug, Clone)]
pub(crate) struct Caller {
    pub(crate) user_id: i64,
    pub(crate) username: Option<String>,
}

impl Caller {
    pub(crate) fn display_name(&self) -> String {
        normalize_username(self.username.as_deref())
    }
}

/// Resolves callers to groups and routes chat commands into the core.
/// Holds the injected configuration and the per-group reset confirmations.
pub(crate) struct Dispatcher {
    config: Config,
    resets: PendingResets,
}

impl Dispatcher {
    pub(crate) fn new(config: Config) -> Self {
        Self {
            config,
            resets: PendingResets::new(),
        }
    }

    /// Handles one command line and always produces a reply. Rejected
    /// operations map to their taxonomy message; storage failures are logged
    /// and surfaced as a generic apology.
    pub(crate) fn handle(&mut self, db: &mut Database, caller: &Caller, input: &str) -> String {
        self.handle_at(db, caller, input, Utc::now())
    }

    pub(crate) fn handle_at(
        &mut self,
        db: &mut Database,
        caller: &Caller,
        input: &str,
        now: DateTime<Utc>,
    ) -> String {
        match self.dispatch(db, caller, input, now) {
            Ok(reply) => reply,
            Err(CommandError::Storage(err)) => {
                warn!("command '{input}' failed: {err:#}");
                CommandError::Storage(err).to_string()
            }
            Err(err) => err.to_string(),
        }
    }

    fn dispatch(
        &mut self,
        db: &mut Database,
        caller: &Caller,
        input: &str,
        now: DateTime<Utc>,
    ) -> CommandResult<String> {
        let trimmed = input.trim().trim_start_matches('/');
        let mut parts = trimmed.splitn(2, ' ');
        let name = parts.next().unwrap_or("");
        let args = parts.next().unwrap_or("").trim();

        match name {
            "startgroup" => self.cmd_start_group(db, caller, args),
            "mygroup" => self.cmd_my_group(db, caller),
            "listgroups" => self.cmd_list_groups(db),
            "switchgroup" => self.cmd_switch_group(db, caller, args),
            "listusers" => self.cmd_list_users(db, caller),
            "removeuser" => self.cmd_remove_user(db, caller, args),
            "add" => self.cmd_add_expense(db, caller, args, now),
            "income" => self.cmd_add_income(db, caller, args, now),
            "list" => self.cmd_list_entries(db, caller, now),
            "categories" => self.cmd_categories(db, caller, now),
            "setbudget" => self.cmd_set_budget(db, caller, args),
            "summary" => self.cmd_summary(db, caller, args, now),
            "reset" => self.cmd_reset(db, caller),
            "confirmreset" => self.cmd_confirm_reset(db, caller),
            "export" => self.cmd_export(db, caller, args, now),
            "settimezone" => self.cmd_set_timezone(db, caller, args),
            "help" => Ok(help_text()),
            other => Err(CommandError::validation(format!(
                "Unknown command: {other}. Send help to see available commands."
            ))),
        }
    }

    // ── Guards ────────────────────────────────────────────────

    /// Group-scoped operations require a membership before any other
    /// read or write happens.
    fn require_group(&self, db: &Database, caller: &Caller) -> CommandResult<i64> {
        db.resolve_group(caller.user_id)?.ok_or_else(|| {
            CommandError::unauthorized(
                "You must first create or join a group: startgroup <group_name>",
            )
        })
    }

    fn require_admin(&self, caller: &Caller) -> CommandResult<()> {
        if self.config.is_admin(caller.user_id) {
            Ok(())
        } else {
            Err(CommandError::unauthorized(
                "You are not authorized to use this command.",
            ))
        }
    }

    fn group_timezone(&self, db: &Database, group_id: i64) -> CommandResult<Tz> {
        let zone = db
            .get_group(group_id)?
            .map(|g| g.timezone)
            .unwrap_or_default();
        Ok(Tz::from_str(&zone).unwrap_or(self.config.default_timezone))
    }

    // ── Groups ────────────────────────────────────────────────

    fn cmd_start_group(
        &mut self,
        db: &mut Database,
        caller: &Caller,
        args: &str,
    ) -> CommandResult<String> {
        let name = first_token(args, "Usage: startgroup <group_name>")?;
        if db.resolve_group(caller.user_id)?.is_some() && !self.config.is_admin(caller.user_id) {
            return Err(CommandError::AlreadyMember);
        }

        let group_id = db.create_or_get_group(name, self.config.default_timezone.name())?;
        db.assign_user_to_group(&Member::new(
            caller.user_id,
            caller.username.as_deref(),
            Some(group_id),
        ))?;
        Ok(format!("You have joined group: {name}"))
    }

    fn cmd_my_group(&mut self, db: &mut Database, caller: &Caller) -> CommandResult<String> {
        let group_id = self.require_group(db, caller)?;
        let group = db
            .get_group(group_id)?
            .ok_or_else(|| CommandError::not_found("Group not found."))?;
        Ok(format!("Your current group: {}", group.name))
    }

    fn cmd_list_groups(&mut self, db: &mut Database) -> CommandResult<String> {
        let groups = db.list_groups()?;
        if groups.is_empty() {
            return Ok("No groups available.".to_string());
        }
        let mut reply = String::from("Available groups:");
        for (_, name) in groups {
            reply.push_str(&format!("\n- {name}"));
        }
        Ok(reply)
    }

    fn cmd_switch_group(
        &mut self,
        db: &mut Database,
        caller: &Caller,
        args: &str,
    ) -> CommandResult<String> {
        self.require_admin(caller)?;
        let name = first_token(args, "Usage: switchgroup <group_name>")?;
        let group = db
            .get_group_by_name(name)?
            .ok_or_else(|| CommandError::not_found("Group not found."))?;
        db.assign_user_to_group(&Member::new(
            caller.user_id,
            caller.username.as_deref(),
            group.id,
        ))?;
        Ok(format!("Switched to group: {name}"))
    }

    // ── Members ───────────────────────────────────────────────

    fn cmd_list_users(&mut self, db: &mut Database, caller: &Caller) -> CommandResult<String> {
        let group_id = self.require_group(db, caller)?;
        let users = db.list_users(group_id)?;
        if users.is_empty() {
            return Ok("No users in this group.".to_string());
        }
        let mut reply = String::from("Users in this group:");
        for user in users {
            reply.push_str(&format!("\n- {user}"));
        }
        Ok(reply)
    }

    fn cmd_remove_user(
        &mut self,
        db: &mut Database,
        caller: &Caller,
        args: &str,
    ) -> CommandResult<String> {
        self.require_admin(caller)?;
        let group_id = self.require_group(db, caller)?;
        let username = first_token(args, "Usage: removeuser <username>")?;
        if db.remove_user(username, group_id)? {
            Ok(format!("Removed user: {username}"))
        } else {
            Err(CommandError::not_found(format!(
                "No user '{username}' in this group."
            )))
        }
    }

    // ── Entries ───────────────────────────────────────────────

    fn cmd_add_expense(
        &mut self,
        db: &mut Database,
        caller: &Caller,
        args: &str,
        now: DateTime<Utc>,
    ) -> CommandResult<String> {
        let tokens: Vec<&str> = args.split_whitespace().collect();
        if tokens.len() < 2 {
            return Err(CommandError::validation(
                "Usage: add <amount> <category> [note]",
            ));
        }
        let group_id = self.require_group(db, caller)?;
        let (amount_raw, category) = (tokens[0], tokens[1]);
        let note = tokens[2..].join(" ");

        let tz = self.group_timezone(db, group_id)?;
        let timestamp = ledger::local_timestamp(tz, now);
        let month = ledger::current_month(tz, now);

        let (_, amount) = ledger::add_expense(
            db,
            group_id,
            &caller.display_name(),
            amount_raw,
            category,
            &note,
            timestamp.clone(),
        )?;

        let mut reply = format!("Expense added: {amount} in {category}");
        if let Some(alert) = alerts::check_expense(db, group_id, category, &month, &timestamp)? {
            reply.push('\n');
            reply.push_str(&alert);
        }
        Ok(reply)
    }

    fn cmd_add_income(
        &mut self,
        db: &mut Database,
        caller: &Caller,
        args: &str,
        now: DateTime<Utc>,
    ) -> CommandResult<String> {
        let tokens: Vec<&str> = args.split_whitespace().collect();
        if tokens.is_empty() {
            return Err(CommandError::validation("Usage: income <amount> [note]"));
        }
        let group_id = self.require_group(db, caller)?;
        let note = tokens[1..].join(" ");

        let tz = self.group_timezone(db, group_id)?;
        let timestamp = ledger::local_timestamp(tz, now);

        let (_, amount) = ledger::add_income(
            db,
            group_id,
            &caller.display_name(),
            tokens[0],
            &note,
            timestamp,
        )?;
        Ok(format!("Income added: {amount}"))
    }

    fn cmd_list_entries(
        &mut self,
        db: &mut Database,
        caller: &Caller,
        now: DateTime<Utc>,
    ) -> CommandResult<String> {
        let group_id = self.require_group(db, caller)?;
        let tz = self.group_timezone(db, group_id)?;
        let month = ledger::current_month(tz, now);

        let entries = ledger::list_entries(db, group_id, &month)?;
        if entries.is_empty() {
            return Ok("No entries recorded this month.".to_string());
        }
        let mut reply = format!("Entries for {month}:");
        for entry in entries {
            reply.push_str(&format!(
                "\n- {} | {} | {} | {} | {}",
                entry.timestamp,
                entry.user,
                entry.amount,
                entry.category.as_deref().unwrap_or(entry.kind.as_str()),
                entry.note,
            ));
        }
        Ok(reply)
    }

    // ── Budgets ───────────────────────────────────────────────

    fn cmd_categories(
        &mut self,
        db: &mut Database,
        caller: &Caller,
        now: DateTime<Utc>,
    ) -> CommandResult<String> {
        let group_id = self.require_group(db, caller)?;
        let tz = self.group_timezone(db, group_id)?;
        let month = ledger::current_month(tz, now);

        let summary = ledger::monthly_totals(db, group_id, &month)?;
        if summary.by_category.is_empty() {
            return Ok("No budgets or expenses yet.".to_string());
        }

        let limits: BTreeMap<String, rust_decimal::Decimal> = db
            .get_budgets(group_id)?
            .into_iter()
            .map(|b| (b.category, b.limit_amount))
            .collect();

        let mut reply = format!("Category spending for {month}:");
        for (category, spent) in &summary.by_category {
            match limits.get(category) {
                Some(limit) => {
                    let status = alerts::budget_status(*spent, *limit)?;
                    reply.push_str(&format!(
                        "\n- {category}: {spent} of {limit} ({})",
                        status.as_str()
                    ));
                }
                None => reply.push_str(&format!("\n- {category}: {spent}")),
            }
        }
        Ok(reply)
    }

    fn cmd_set_budget(
        &mut self,
        db: &mut Database,
        caller: &Caller,
        args: &str,
    ) -> CommandResult<String> {
        let tokens: Vec<&str> = args.split_whitespace().collect();
        if tokens.len() != 2 {
            return Err(CommandError::validation(
                "Usage: setbudget <category> <limit>",
            ));
        }
        let group_id = self.require_group(db, caller)?;
        let limit = ledger::parse_amount(tokens[1])?;
        db.upsert_budget(&Budget::new(tokens[0].to_string(), limit, group_id))?;
        Ok(format!("Budget set for '{}': {limit}", tokens[0]))
    }

    fn cmd_summary(
        &mut self,
        db: &mut Database,
        caller: &Caller,
        args: &str,
        now: DateTime<Utc>,
    ) -> CommandResult<String> {
        let group_id = self.require_group(db, caller)?;
        let month = if args.is_empty() {
            let tz = self.group_timezone(db, group_id)?;
            ledger::current_month(tz, now)
        } else {
            ledger::parse_month(args)?
        };

        let summary = ledger::monthly_totals(db, group_id, &month)?;
        let breakdown = ledger::per_user_breakdown(db, group_id, &month)?;

        let mut reply = format!(
            "Summary for {month}\nIncome: {}\nExpenses: {}\nBalance: {}",
            summary.total_income, summary.total_expenses, summary.balance
        );
        if !breakdown.is_empty() {
            reply.push_str("\n\nPer member:");
            for (user, totals) in &breakdown {
                reply.push_str(&format!(
                    "\n- {user}: balance {} (income {}, expenses {})",
                    totals.balance(),
                    totals.income,
                    totals.expenses,
                ));
            }
        }
        Ok(reply)
    }

    // ── Maintenance ───────────────────────────────────────────

    fn cmd_reset(&mut self, db: &mut Database, caller: &Caller) -> CommandResult<String> {
        let group_id = self.require_group(db, caller)?;
        self.resets.request(group_id);
        Ok(
            "This will delete all of the group's expenses, income and budgets. \
             Send confirmreset to proceed."
                .to_string(),
        )
    }

    fn cmd_confirm_reset(&mut self, db: &mut Database, caller: &Caller) -> CommandResult<String> {
        let group_id = self.require_group(db, caller)?;
        if !self.resets.confirm(group_id) {
            return Err(CommandError::not_found(
                "Nothing pending to confirm. Send reset first.",
            ));
        }
        db.reset_group(group_id)?;
        Ok("All group data has been reset.".to_string())
    }

    fn cmd_export(
        &mut self,
        db: &mut Database,
        caller: &Caller,
        args: &str,
        now: DateTime<Utc>,
    ) -> CommandResult<String> {
        let group_id = self.require_group(db, caller)?;
        let month = if args.is_empty() {
            let tz = self.group_timezone(db, group_id)?;
            ledger::current_month(tz, now)
        } else {
            ledger::parse_month(args)?
        };

        let (expenses, income) = rollover::export_rows(db, group_id, &month)?;
        if expenses.is_empty() && income.is_empty() {
            return Ok(format!("No data for {month}."));
        }

        let mut reply = format!("Export for {month}\n\nExpenses:");
        for e in &expenses {
            reply.push_str(&format!(
                "\n- {} | {} | {} | {} | {}",
                e.timestamp,
                e.user,
                e.amount,
                e.category.as_deref().unwrap_or(""),
                e.note
            ));
        }
        reply.push_str("\n\nIncome:");
        for e in &income {
            reply.push_str(&format!(
                "\n- {} | {} | {} | {}",
                e.timestamp, e.user, e.amount, e.note
            ));
        }
        Ok(reply)
    }

    fn cmd_set_timezone(
        &mut self,
        db: &mut Database,
        caller: &Caller,
        args: &str,
    ) -> CommandResult<String> {
        let group_id = self.require_group(db, caller)?;
        let zone = first_token(args, "Usage: settimezone <IANA zone, e.g. Europe/Berlin>")?;
        let tz = Tz::from_str(zone)
            .map_err(|_| CommandError::validation(format!("Unknown timezone: {zone}")))?;
        db.set_group_timezone(group_id, tz.name())?;
        Ok(format!(
            "Timezone set to {}. New entries will use this zone.",
            tz.name()
        ))
    }
}

fn first_token<'a>(args: &'a str, usage: &str) -> CommandResult<&'a str> {
    args.split_whitespace()
        .next()
        .ok_or_else(|| CommandError::validation(usage))
}

fn help_text() -> String {
    [
        "Available commands:",
        "",
        "startgroup <name> - Create or join a group",
        "mygroup - Show your current group",
        "listgroups - List all groups",
        "switchgroup <name> - Switch to another group (admin)",
        "listusers - List users in your group",
        "removeuser <username> - Remove a user from your group (admin)",
        "",
        "add <amount> <category> [note] - Add an expense",
        "income <amount> [note] - Add an income",
        "list - Show this month's entries",
        "categories - Show per-category spending and budgets",
        "setbudget <category> <limit> - Set a category budget",
        "summary [YYYY-MM] - Monthly totals and per-member breakdown",
        "",
        "reset - Reset group data (asks for confirmation)",
        "confirmreset - Confirm a pending reset",
        "export [YYYY-MM] - Export a month's rows",
        "settimezone <zone> - Set the group timezone",
        "help - Show this message",
    ]
    .join("\n")
}
