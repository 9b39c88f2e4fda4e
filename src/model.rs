use crate::api::{CheckResponse, ContainerListEntry};
use serde::Serialize;

/// Where a record is in the check cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordState {
    Fresh,
    Checking,
    UpToDate,
    UpdateAvailable,
}

impl RecordState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fresh => "fresh",
            Self::Checking => "checking",
            Self::UpToDate => "up to date",
            Self::UpdateAvailable => "update available",
        }
    }
}

/// A running container and what the last check said about its image
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContainerRecord {
    pub id: String,
    pub name: String,
    pub image_name: String,
    pub image_name_short: String,
    pub image_version: String,
    pub image_created_at: String,
    pub has_update: bool,
    pub new_version: String,
    pub new_version_created_at: String,
    pub is_checking: bool,
    pub selected: bool,
    /// Set once a check result has been applied since the last list fetch
    pub checked: bool,
}

impl From<&ContainerListEntry> for ContainerRecord {
    fn from(entry: &ContainerListEntry) -> Self {
        Self {
            id: entry.container_id.clone(),
            name: entry.container_name.clone(),
            image_name: entry.image_name.clone(),
            image_name_short: entry.image_name_short.clone(),
            image_version: entry.image_version.clone(),
            image_created_at: entry.image_created_date.clone(),
            has_update: false,
            new_version: String::new(),
            new_version_created_at: String::new(),
            is_checking: false,
            selected: false,
            checked: false,
        }
    }
}

impl ContainerRecord {
    pub fn apply_check(&mut self, result: &CheckResponse) {
        self.has_update = result.has_update;
        self.new_version = result.new_version.clone();
        self.new_version_created_at = result.new_version_created.clone();
        self.is_checking = false;
        self.checked = true;
    }

    pub fn state(&self) -> RecordState {
        if self.is_checking {
            RecordState::Checking
        } else if !self.checked {
            RecordState::Fresh
        } else if self.has_update {
            RecordState::UpdateAvailable
        } else {
            RecordState::UpToDate
        }
    }
}
