//! Markdown report assembly.
//!
//! Formatting is byte-exact and performs no escaping: titles containing
//! markdown control characters pass through unchanged.
use crate::event::ReleaseEvent;

pub const WORK_ITEMS_HEADING: &str = "# Work Items Resolved:";
pub const CHANGES_HEADING: &str = "# Changes Merged:";

/// Render one list entry, newline-prefixed.
pub fn render_entry(id: i64, title: &str) -> String {
    format!("\n 1. #{id}-{title}")
}

/// Render entries in the order given. No entries renders as `""`.
pub fn render_entries<'a, I>(entries: I) -> String
where
    I: IntoIterator<Item = (i64, &'a str)>,
{
    entries
        .into_iter()
        .map(|(id, title)| render_entry(id, title))
        .collect()
}

/// Release header plus both rendered sections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseReport {
    pub name: String,
    pub description: String,
    pub work_items: String,
    pub changes: String,
}

impl ReleaseReport {
    pub fn new(
        event: &ReleaseEvent,
        work_items: String,
        changes: String,
    ) -> Self {
        Self {
            name: event.name.clone(),
            description: event.description.clone(),
            work_items,
            changes,
        }
    }

    pub fn header(&self) -> String {
        format!("# {} \n {} \n\n", self.name, self.description)
    }

    pub fn render(&self) -> String {
        format!(
            "{}{WORK_ITEMS_HEADING}{}\n\n{CHANGES_HEADING}{}",
            self.header(),
            self.work_items,
            self.changes
        )
    }
}
