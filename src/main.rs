mod alerts;
mod commands;
mod config;
mod db;
mod error;
mod ledger;
mod models;
mod rollover;

use anyhow::{Context, Result};
use chrono::Utc;
use std::path::PathBuf;

fn main() -> Result<()> {
    env_logger::init();
    let args: Vec<String> = std::env::args().skip(1).collect();
    let db_path = config::db_path()?;
    let mut db = db::Database::open(&db_path)?;

    match args.first().map(String::as_str) {
        None | Some("help") | Some("--help") => {
            print_usage();
            Ok(())
        }
        Some("tick") => run_tick(&db, args.get(1)),
        Some("prune") => run_prune(&mut db, args.get(1)),
        Some(_) => run_command(&mut db, &args),
    }
}

/// `ledgerbot <user-id> [--name <display>] <command...>`
///
/// The transport in front of this binary supplies the caller identity; here
/// it comes from the command line so any chat bridge can shell out to us.
fn run_command(db: &mut db::Database, args: &[String]) -> Result<()> {
    let config = config::Config::from_env()?;
    let user_id: i64 = args[0]
        .parse()
        .context("First argument must be a numeric user id")?;

    let mut rest = &args[1..];
    let mut username = None;
    if rest.first().map(String::as_str) == Some("--name") {
        username = rest.get(1).cloned();
        rest = rest.get(2..).unwrap_or(&[]);
    }

    let input = rest.join(" ");
    if input.is_empty() {
        print_usage();
        return Ok(());
    }

    let caller = commands::Caller { user_id, username };
    let mut dispatcher = commands::Dispatcher::new(config);
    println!("{}", dispatcher.handle(db, &caller, &input));
    Ok(())
}

/// Daily scheduler entry point. On the first of the month this writes the
/// prior month's rows out as CSV files, one pair per group with data.
fn run_tick(db: &db::Database, out_dir: Option<&String>) -> Result<()> {
    let dir = out_dir.map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
    let reports = rollover::run_daily_tick(db, Utc::now().date_naive())?;
    if reports.is_empty() {
        println!("Nothing to export today.");
        return Ok(());
    }

    for report in reports {
        let expenses_path = dir.join(format!(
            "group{}-{}-expenses.csv",
            report.group_id, report.month
        ));
        let income_path = dir.join(format!(
            "group{}-{}-income.csv",
            report.group_id, report.month
        ));
        let rows = rollover::write_export_csv(&expenses_path, &report.expenses)?
            + rollover::write_export_csv(&income_path, &report.income)?;
        println!(
            "Exported {rows} rows for group '{}' ({}) to {}",
            report.group_name,
            report.month,
            dir.display()
        );
    }
    Ok(())
}

/// Operator maintenance: drops one month's entries across all groups, meant
/// for after that month has been exported and archived. Budgets stay.
fn run_prune(db: &mut db::Database, month: Option<&String>) -> Result<()> {
    let month = month.ok_or_else(|| anyhow::anyhow!("Usage: ledgerbot prune <YYYY-MM>"))?;
    let month = ledger::parse_month(month).map_err(|err| anyhow::anyhow!("{err}"))?;
    let removed = db.reset_month(None, &month)?;
    println!("Removed {removed} entries for {month}.");
    Ok(())
}

fn print_usage() {
    println!(
        "Usage:\n  \
         ledgerbot <user-id> [--name <display>] <command...>\n  \
         ledgerbot tick [out-dir]\n  \
         ledgerbot prune <YYYY-MM>\n\n\
         Run `ledgerbot <user-id> help` for the command list."
    );
}
