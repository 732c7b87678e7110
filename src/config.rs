use anyhow::{Context, Result};
use chrono_tz::Tz;
use std::path::PathBuf;
use std::str::FromStr;

/// Runtime configuration, built once in `main` and passed into the
/// dispatcher. Nothing here is read from globals after startup.
#[derive(Debug, Clone)]
pub(crate) struct Config {
    /// Caller id allowed to run admin commands. None disables them.
    pub(crate) admin_id: Option<i64>,
    /// Zone used for groups that never called settimezone.
    pub(crate) default_timezone: Tz,
}

impl Config {
    pub(crate) fn from_env() -> Result<Self> {
        let admin_id = match std::env::var("LEDGERBOT_ADMIN_ID") {
            Ok(raw) => Some(
                raw.parse::<i64>()
                    .context("LEDGERBOT_ADMIN_ID must be an integer user id")?,
            ),
            Err(_) => None,
        };
        let default_timezone = match std::env::var("LEDGERBOT_TZ") {
            Ok(raw) => Tz::from_str(&raw)
                .map_err(|_| anyhow::anyhow!("LEDGERBOT_TZ is not a known IANA zone: {raw}"))?,
            Err(_) => chrono_tz::Asia::Kolkata,
        };
        Ok(Self {
            admin_id,
            default_timezone,
        })
    }

    pub(crate) fn is_admin(&self, user_id: i64) -> bool {
        self.admin_id == Some(user_id)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            admin_id: None,
            default_timezone: chrono_tz::Asia::Kolkata,
        }
    }
}

pub(crate) fn db_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("LEDGERBOT_DB") {
        return Ok(PathBuf::from(path));
    }
    let proj_dirs = directories::ProjectDirs::from("com", "ledgerbot", "ledgerbot")
        .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
    let data_dir = proj_dirs.data_dir();
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;
    Ok(data_dir.join("ledgerbot.db"))
}
