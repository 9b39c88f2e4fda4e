//! Text rendering of the dashboard: the status line and one line per container.

use crate::config::DisplayConfig;
use crate::model::{ContainerRecord, RecordState};
use crate::sync::Snapshot;

/// Version and build date of one image
#[derive(Debug, Clone, PartialEq)]
pub struct ImageInfo {
    pub version: String,
    pub created: String,
}

impl ImageInfo {
    pub fn new(version: &str, created: &str, date_width: usize) -> Self {
        Self {
            version: version.to_string(),
            created: created.chars().take(date_width).collect(),
        }
    }
}

/// What one list entry shows, mapped field by field from a record
#[derive(Debug, Clone, PartialEq)]
pub struct EntryView {
    pub selected: bool,
    pub name: String,
    pub image: String,
    pub current: ImageInfo,
    pub available: Option<ImageInfo>,
    pub state: RecordState,
}

impl EntryView {
    pub fn from_record(record: &ContainerRecord, display: &DisplayConfig) -> Self {
        let available = if record.has_update {
            Some(ImageInfo::new(
                &record.new_version,
                &record.new_version_created_at,
                display.date_width(),
            ))
        } else {
            None
        };
        Self {
            selected: record.selected,
            name: record.name.clone(),
            image: record.image_name.clone(),
            current: ImageInfo::new(
                &record.image_version,
                &record.image_created_at,
                display.date_width(),
            ),
            available,
            state: record.state(),
        }
    }

    pub fn format(&self) -> String {
        let marker = if self.selected { "[x]" } else { "[ ]" };
        let mut line = format!(
            "{} {}  {} ({})",
            marker, self.name, self.image, self.current.created
        );
        if let Some(new) = &self.available {
            line.push_str(&format!("  -> {} ({})", short_version(&new.version), new.created));
        }
        if matches!(self.state, RecordState::Checking | RecordState::UpdateAvailable) {
            line.push_str("  ");
            line.push_str(self.state.as_str());
        }
        line
    }
}

/// Image ids come back as `sha256:<hex>`; show a docker-style short id
fn short_version(version: &str) -> &str {
    let hex = version.strip_prefix("sha256:").unwrap_or(version);
    match hex.char_indices().nth(12) {
        Some((idx, _)) => &hex[..idx],
        None => hex,
    }
}

fn plural(count: usize, one: &str, many: &str) -> String {
    if count == 1 {
        format!("{} container {}", count, one)
    } else {
        format!("{} containers {}", count, many)
    }
}

/// The one-line status shown above the list
pub fn summary(snapshot: &Snapshot) -> String {
    let updates = snapshot.with_updates().len();
    let total = snapshot.records.len();
    if updates > 0 {
        format!("{} updates.", plural(updates, "has", "have"))
    } else if snapshot.checking {
        "Checking for updates...".to_string()
    } else if snapshot.has_checked && total > 0 {
        "All containers are up to date.".to_string()
    } else if total == 1 {
        "1 running container found.".to_string()
    } else {
        format!("{} running containers found.", total)
    }
}

fn selection_hint(snapshot: &Snapshot) -> String {
    if snapshot.any_selected() {
        format!(
            "{} selected. 'update' updates the selection, 'update all' every container with updates.",
            snapshot.selected().len()
        )
    } else {
        "Nothing selected. 'select <name>' to pick containers, or 'update all'.".to_string()
    }
}

/// Status line, then containers with updates, then the rest
pub fn dashboard(snapshot: &Snapshot, display: &DisplayConfig) -> String {
    let mut out = vec![summary(snapshot)];
    let with = snapshot.with_updates();
    let without = snapshot.without_updates();

    for record in &with {
        out.push(format!("  {}", EntryView::from_record(record, display).format()));
    }
    if !with.is_empty() {
        out.push(selection_hint(snapshot));
    }

    // Nothing is known to be up to date until a check has completed
    if display.show_up_to_date() || !snapshot.has_checked {
        if !with.is_empty() && !without.is_empty() {
            out.push(String::new());
            out.push(format!("{} up to date.", plural(without.len(), "is", "are")));
        }
        for record in &without {
            out.push(format!("  {}", EntryView::from_record(record, display).format()));
        }
    }

    out.join("\n")
}
