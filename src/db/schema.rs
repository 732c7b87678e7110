pub(crate) const SCHEMA_V1: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS groups (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL UNIQUE,
    invite_code TEXT UNIQUE,
    timezone    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS users (
    user_id  INTEGER PRIMARY KEY,
    username TEXT NOT NULL DEFAULT 'Unknown',
    group_id INTEGER REFERENCES groups(id)
);

CREATE TABLE IF NOT EXISTS expenses (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    user      TEXT NOT NULL,
    amount    TEXT NOT NULL,
    category  TEXT NOT NULL,
    note      TEXT NOT NULL DEFAULT '',
    group_id  INTEGER NOT NULL REFERENCES groups(id)
);

CREATE TABLE IF NOT EXISTS income (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    user      TEXT NOT NULL,
    amount    TEXT NOT NULL,
    note      TEXT NOT NULL DEFAULT '',
    group_id  INTEGER NOT NULL REFERENCES groups(id)
);

CREATE INDEX IF NOT EXISTS idx_expenses_group_ts ON expenses(group_id, timestamp);
CREATE INDEX IF NOT EXISTS idx_income_group_ts ON income(group_id, timestamp);

CREATE TABLE IF NOT EXISTS budgets (
    category     TEXT NOT NULL,
    limit_amount TEXT NOT NULL,
    group_id     INTEGER NOT NULL REFERENCES groups(id),
    UNIQUE(category, group_id)
);

CREATE TABLE IF NOT EXISTS alerts (
    group_id   INTEGER NOT NULL REFERENCES groups(id),
    category   TEXT NOT NULL,
    last_alert TEXT NOT NULL,
    UNIQUE(group_id, category)
);

"#;

pub(crate) const CURRENT_VERSION: i32 = 1;

/// Migrations from version N to N+1.
/// Each entry is (from_version, sql).
pub(crate) const MIGRATIONS: &[(i32, &str)] = &[];
