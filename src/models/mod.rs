mod budget;
mod entry;
mod group;
mod member;

pub use budget::Budget;
pub use entry::{Entry, EntryKind};
pub use group::Group;
pub use member::{normalize_username, Member};
