use rust_decimal::Decimal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Expense,
    Income,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Expense => "expense",
            EntryKind::Income => "income",
        }
    }
}

/// A single ledger record, immutable once created. Expenses carry a category;
/// income does not. Deleted only through the reset operations.
#[derive(Debug, Clone)]
pub struct Entry {
    pub id: Option<i64>,
    /// Format: "YYYY-MM-DD HH:MM:SS", already adjusted to the group's zone.
    pub timestamp: String,
    pub user: String,
    pub amount: Decimal,
    pub category: Option<String>,
    pub note: String,
    pub group_id: i64,
    pub kind: EntryKind,
}

impl Entry {
    pub fn expense(
        timestamp: String,
        user: String,
        amount: Decimal,
        category: String,
        note: String,
        group_id: i64,
    ) -> Self {
        Self {
            id: None,
            timestamp,
            user,
            amount,
            category: Some(category),
            note,
            group_id,
            kind: EntryKind::Expense,
        }
    }

    pub fn income(
        timestamp: String,
        user: String,
        amount: Decimal,
        note: String,
        group_id: i64,
    ) -> Self {
        Self {
            id: None,
            timestamp,
            user,
            amount,
            category: None,
            note,
            group_id,
            kind: EntryKind::Income,
        }
    }

    pub fn is_expense(&self) -> bool {
        self.kind == EntryKind::Expense
    }

    pub fn is_income(&self) -> bool {
        self.kind == EntryKind::Income
    }

    /// "YYYY-MM" prefix of the stored timestamp.
    pub fn month(&self) -> &str {
        self.timestamp.get(..7).unwrap_or(&self.timestamp)
    }
}
