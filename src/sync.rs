//! Container state synchronizer.
//!
//! Holds the current snapshot of container records and drives the
//! list -> check -> update cycle. The snapshot is replaced wholesale on
//! every list fetch; check results and selection toggles patch single
//! records by id against whatever snapshot is current when they land.

use crate::api::{ApiError, WatchtowerApi};
use crate::model::ContainerRecord;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;

#[derive(Debug, Default)]
struct DashboardState {
    records: Vec<ContainerRecord>,
    checking: bool,
    has_checked: bool,
}

/// A consistent copy of the dashboard state for rendering
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub records: Vec<ContainerRecord>,
    pub checking: bool,
    pub has_checked: bool,
}

impl Snapshot {
    pub fn with_updates(&self) -> Vec<&ContainerRecord> {
        self.records.iter().filter(|r| r.has_update).collect()
    }

    pub fn without_updates(&self) -> Vec<&ContainerRecord> {
        self.records.iter().filter(|r| !r.has_update).collect()
    }

    pub fn selected(&self) -> Vec<&ContainerRecord> {
        self.records.iter().filter(|r| r.selected).collect()
    }

    pub fn any_selected(&self) -> bool {
        self.records.iter().any(|r| r.selected)
    }
}

#[derive(Debug, Clone)]
pub struct CheckFailure {
    pub id: String,
    pub error: ApiError,
}

/// Outcome of a check batch
#[derive(Debug, Clone, Default)]
pub struct CheckSummary {
    pub checked: usize,
    pub with_updates: usize,
    pub failures: Vec<CheckFailure>,
}

#[derive(Debug, Clone)]
pub struct UpdateFailure {
    pub name: String,
    pub error: ApiError,
}

#[derive(Debug, Clone)]
pub enum UpdateOutcome {
    NothingToUpdate,
    Updated {
        requested: Vec<String>,
        failures: Vec<UpdateFailure>,
        /// The refresh + recheck that follows the update requests
        check: Result<CheckSummary, ApiError>,
    },
}

/// Which records an update request targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateScope {
    Selected,
    /// Every record whose last check reported an update
    All,
}

pub struct Synchronizer {
    api: Arc<dyn WatchtowerApi>,
    state: Mutex<DashboardState>,
}

impl Synchronizer {
    pub fn new(api: Arc<dyn WatchtowerApi>) -> Self {
        Self {
            api,
            state: Mutex::new(DashboardState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, DashboardState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn snapshot(&self) -> Snapshot {
        let state = self.lock();
        Snapshot {
            records: state.records.clone(),
            checking: state.checking,
            has_checked: state.has_checked,
        }
    }

    pub fn records(&self) -> Vec<ContainerRecord> {
        self.lock().records.clone()
    }

    pub fn with_updates(&self) -> Vec<ContainerRecord> {
        self.lock()
            .records
            .iter()
            .filter(|r| r.has_update)
            .cloned()
            .collect()
    }

    pub fn selected(&self) -> Vec<ContainerRecord> {
        self.lock()
            .records
            .iter()
            .filter(|r| r.selected)
            .cloned()
            .collect()
    }

    /// Fetch the container list and replace the held snapshot.
    /// Selection and check results from the previous snapshot are dropped.
    pub fn refresh(&self) -> Result<Vec<ContainerRecord>, ApiError> {
        let response = self.api.list()?;
        let records: Vec<ContainerRecord> = response
            .containers
            .iter()
            .map(ContainerRecord::from)
            .collect();

        let mut state = self.lock();
        state.records = records.clone();
        state.has_checked = false;
        Ok(records)
    }

    /// Check every given record concurrently, patching each one as its
    /// result arrives. Records that left the snapshot meanwhile are skipped.
    pub fn check_all(&self, targets: &[ContainerRecord]) -> CheckSummary {
        let ids: Vec<String> = targets.iter().map(|r| r.id.clone()).collect();

        {
            let mut state = self.lock();
            state.checking = true;
            for record in state.records.iter_mut() {
                if ids.contains(&record.id) {
                    record.is_checking = true;
                }
            }
        }

        // Ok(None): the record left the snapshot before its result arrived
        let results: Vec<(String, Result<Option<bool>, ApiError>)> = thread::scope(|s| {
            let handles: Vec<_> = ids
                .iter()
                .map(|id| {
                    let handle = s.spawn(move || match self.api.check(id) {
                        Ok(result) => {
                            let patched = self.patch(id, |record| record.apply_check(&result));
                            Ok(patched.then_some(result.has_update))
                        }
                        Err(e) => {
                            self.patch(id, |record| record.is_checking = false);
                            Err(e)
                        }
                    });
                    (id.clone(), handle)
                })
                .collect();

            handles
                .into_iter()
                .map(|(id, handle)| {
                    let result = handle.join().unwrap_or_else(|_| {
                        Err(ApiError::Transport("check worker panicked".to_string()))
                    });
                    (id, result)
                })
                .collect()
        });

        let mut summary = CheckSummary::default();
        for (id, result) in results {
            match result {
                Ok(Some(has_update)) => {
                    summary.checked += 1;
                    if has_update {
                        summary.with_updates += 1;
                    }
                }
                Ok(None) => {}
                Err(error) => {
                    self.patch(&id, |record| record.is_checking = false);
                    summary.failures.push(CheckFailure { id, error });
                }
            }
        }

        let mut state = self.lock();
        state.checking = false;
        state.has_checked = true;
        summary
    }

    /// Apply `f` to the record with `id` in the current snapshot.
    /// Returns false when no such record exists.
    fn patch<F: FnOnce(&mut ContainerRecord)>(&self, id: &str, f: F) -> bool {
        let mut state = self.lock();
        match state.records.iter_mut().find(|r| r.id == id) {
            Some(record) => {
                f(record);
                true
            }
            None => false,
        }
    }

    /// Flip `selected` on the record with `id`; no-op if it is absent
    pub fn toggle_selection(&self, id: &str) -> bool {
        self.patch(id, |record| record.selected = !record.selected)
    }

    /// Toggle every record whose name or id matches the glob `pattern`.
    /// Returns the names that were toggled.
    pub fn toggle_matching(&self, pattern: &str) -> Result<Vec<String>, glob::PatternError> {
        let matcher = glob::Pattern::new(pattern)?;
        let ids: Vec<(String, String)> = self
            .lock()
            .records
            .iter()
            .filter(|r| matcher.matches(&r.name) || r.id == pattern)
            .map(|r| (r.id.clone(), r.name.clone()))
            .collect();

        let mut toggled = Vec::new();
        for (id, name) in ids {
            if self.toggle_selection(&id) {
                toggled.push(name);
            }
        }
        Ok(toggled)
    }

    pub fn update_selected(&self, progress: &mut dyn FnMut(&str)) -> UpdateOutcome {
        self.update(UpdateScope::Selected, progress)
    }

    pub fn update_all(&self, progress: &mut dyn FnMut(&str)) -> UpdateOutcome {
        self.update(UpdateScope::All, progress)
    }

    /// Update the containers in `scope` one at a time, then refresh the
    /// list and re-check it so the new images show up without a manual check.
    fn update(&self, scope: UpdateScope, progress: &mut dyn FnMut(&str)) -> UpdateOutcome {
        let names: Vec<String> = match scope {
            UpdateScope::Selected => self.selected(),
            UpdateScope::All => self.with_updates(),
        }
        .into_iter()
        .map(|r| r.name)
        .collect();

        if names.is_empty() {
            return UpdateOutcome::NothingToUpdate;
        }

        let mut failures = Vec::new();
        for name in &names {
            progress(name);
            if let Err(error) = self.api.update(std::slice::from_ref(name)) {
                failures.push(UpdateFailure {
                    name: name.clone(),
                    error,
                });
            }
        }

        let check = self
            .refresh()
            .map(|refreshed| self.check_all(&refreshed));

        UpdateOutcome::Updated {
            requested: names,
            failures,
            check,
        }
    }
}
