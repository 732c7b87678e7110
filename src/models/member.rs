/// A user's membership row. A user belongs to at most one group at a time;
/// switching groups overwrites `group_id` rather than keeping history.
#[derive(Debug, Clone)]
pub struct Member {
    pub user_id: i64,
    pub username: String,
    pub group_id: Option<i64>,
}

impl Member {
    pub fn new(user_id: i64, username: Option<&str>, group_id: Option<i64>) -> Self {
        Self {
            user_id,
            username: normalize_username(username),
            group_id,
        }
    }
}

/// Missing or empty display names are stored as a placeholder so listings
/// never render blank rows.
pub fn normalize_username(raw: Option<&str>) -> String {
    match raw {
        Some(name) if !name.trim().is_empty() => name.to_string(),
        _ => "Unknown".to_string(),
    }
}
