use rust_decimal::Decimal;

/// Per-category spending limit, unique per (category, group). Setting the
/// same pair again replaces the limit.
#[derive(Debug, Clone)]
pub struct Budget {
    pub category: String,
    pub limit_amount: Decimal,
    pub group_id: i64,
}

impl Budget {
    pub fn new(category: String, limit_amount: Decimal, group_id: i64) -> Self {
        Self {
            category,
            limit_amount,
            group_id,
        }
    }
}
