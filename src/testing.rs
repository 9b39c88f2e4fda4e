//! In-process stand-in for the watchtower API used by unit tests.

use crate::api::{ApiError, CheckResponse, ContainerListEntry, ListResponse, WatchtowerApi};
use crate::session::{Session, TokenStore};
use anyhow::Result;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct FakeState {
    containers: Vec<ContainerListEntry>,
    // container id -> (new version, created)
    pending: HashMap<String, (String, String)>,
    failing_checks: HashSet<String>,
    // gone from the list, still answered by check
    delisted: HashSet<String>,
    update_calls: Vec<Vec<String>>,
}

pub struct FakeApi {
    session: Arc<Session>,
    accepted_token: String,
    unreachable: bool,
    garbled_list: bool,
    list_down: AtomicBool,
    list_calls: AtomicUsize,
    check_calls: AtomicUsize,
    state: Mutex<FakeState>,
}

pub fn entry(id: &str, name: &str, image: &str) -> ContainerListEntry {
    ContainerListEntry {
        container_id: id.to_string(),
        container_name: name.to_string(),
        image_name: format!("{}:latest", image),
        image_name_short: image.to_string(),
        image_version: format!("sha256:{}-old", id),
        image_created_date: "2024-01-15T10:00:00Z".to_string(),
    }
}

impl FakeApi {
    pub fn new(session: Arc<Session>, accepted_token: &str) -> Self {
        Self {
            session,
            accepted_token: accepted_token.to_string(),
            unreachable: false,
            garbled_list: false,
            list_down: AtomicBool::new(false),
            list_calls: AtomicUsize::new(0),
            check_calls: AtomicUsize::new(0),
            state: Mutex::new(FakeState::default()),
        }
    }

    /// Every call fails at the transport level
    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    /// `list` answers 200 with a body that does not decode
    pub fn with_garbled_list(mut self) -> Self {
        self.garbled_list = true;
        self
    }

    /// From now on `list` fails while check and update keep working
    pub fn take_list_down(&self) {
        self.list_down.store(true, Ordering::SeqCst);
    }

    /// Drop `id` from the list but keep answering checks for it
    pub fn delist_container(&self, id: &str) {
        self.state.lock().unwrap().delisted.insert(id.to_string());
    }

    pub fn with_container(self, entry: ContainerListEntry) -> Self {
        self.state.lock().unwrap().containers.push(entry);
        self
    }

    /// Make `id` report an available update
    pub fn with_update(self, id: &str, version: &str, created: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .pending
            .insert(id.to_string(), (version.to_string(), created.to_string()));
        self
    }

    pub fn with_failing_check(self, id: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_checks
            .insert(id.to_string());
        self
    }

    pub fn remove_container(&self, id: &str) {
        self.state
            .lock()
            .unwrap()
            .containers
            .retain(|c| c.container_id != id);
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn check_calls(&self) -> usize {
        self.check_calls.load(Ordering::SeqCst)
    }

    pub fn update_calls(&self) -> Vec<Vec<String>> {
        self.state.lock().unwrap().update_calls.clone()
    }

    fn authorize(&self) -> Result<(), ApiError> {
        if self.unreachable {
            return Err(ApiError::Transport("connection refused".to_string()));
        }
        if self.session.token() != self.accepted_token {
            return Err(ApiError::Status {
                status: 401,
                code: Some("INVALID_TOKEN".to_string()),
                message: "The supplied token does not match the configured auth token"
                    .to_string(),
            });
        }
        Ok(())
    }
}

impl WatchtowerApi for FakeApi {
    fn list(&self) -> Result<ListResponse, ApiError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.authorize()?;
        if self.list_down.load(Ordering::SeqCst) {
            return Err(ApiError::Transport("connection refused".to_string()));
        }
        if self.garbled_list {
            return Err(ApiError::Decode("expected value at line 1 column 1".to_string()));
        }
        let state = self.state.lock().unwrap();
        Ok(ListResponse {
            containers: state
                .containers
                .iter()
                .filter(|c| !state.delisted.contains(&c.container_id))
                .cloned()
                .collect(),
        })
    }

    fn check(&self, container_id: &str) -> Result<CheckResponse, ApiError> {
        self.check_calls.fetch_add(1, Ordering::SeqCst);
        self.authorize()?;
        let state = self.state.lock().unwrap();
        if state.failing_checks.contains(container_id) {
            return Err(ApiError::Transport("connection reset".to_string()));
        }
        let container = state
            .containers
            .iter()
            .find(|c| c.container_id == container_id)
            .ok_or_else(|| ApiError::Status {
                status: 500,
                code: None,
                message: format!("no such container: {}", container_id),
            })?;
        Ok(match state.pending.get(container_id) {
            Some((version, created)) => CheckResponse {
                container_id: container_id.to_string(),
                has_update: true,
                new_version: version.clone(),
                new_version_created: created.clone(),
            },
            None => CheckResponse {
                container_id: container_id.to_string(),
                has_update: false,
                new_version: container.image_version.clone(),
                new_version_created: container.image_created_date.clone(),
            },
        })
    }

    fn update(&self, containers: &[String]) -> Result<(), ApiError> {
        self.authorize()?;
        let mut state = self.state.lock().unwrap();
        state.update_calls.push(containers.to_vec());

        let FakeState {
            containers: running,
            pending,
            ..
        } = &mut *state;
        for c in running.iter_mut() {
            if !containers.is_empty() && !containers.contains(&c.container_name) {
                continue;
            }
            // The pulled image is now the latest one
            if let Some((version, created)) = pending.remove(&c.container_id) {
                c.image_version = version;
                c.image_created_date = created;
            }
        }
        Ok(())
    }
}

/// Process-local storage, used when nothing should touch the disk
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.get(key).filter(|v| !v.is_empty()).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.values.clear();
        Ok(())
    }
}
