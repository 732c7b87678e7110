#[derive(Debug, Clone)]
pub struct Group {
    pub id: Option<i64>,
    pub name: String,
    pub invite_code: Option<String>,
    /// IANA zone name, e.g. "Asia/Kolkata". Used to stamp new entries.
    pub timezone: String,
}

impl Group {
    pub fn new(name: String, timezone: String) -> Self {
        Self {
            id: None,
            name,
            invite_code: None,
            timezone,
        }
    }
}
