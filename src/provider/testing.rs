//! In-memory [`SshKeyApi`] for provider tests.

use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use crate::indigo::{
    CreateSshKeyRequest, CreateSshKeyResponse, IndigoError, RetrieveSshKeyResponse, SshKey,
    SshKeyApi, StatusResponse, UpdateSshKeyRequest,
};

const CREATED_AT: &str = "2024-01-01 00:00:00";
const UPDATED_AT: &str = "2024-01-02 00:00:00";

#[derive(Default)]
struct State {
    keys: BTreeMap<i64, SshKey>,
    duplicated: HashSet<i64>,
    next_id: i64,
    last_update_status: Option<String>,
}

/// Keeps SSH keys in a map and answers like the real API, including 404s.
#[derive(Default)]
pub(crate) struct FakeSshKeyApi {
    state: Mutex<State>,
}

impl FakeSshKeyApi {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(id: i64, name: &str, sshkey: &str) -> SshKey {
        SshKey {
            id,
            service_id: "sshkey".to_string(),
            user_id: 77,
            name: name.to_string(),
            sshkey: sshkey.to_string(),
            status: "ACTIVE".to_string(),
            created_at: CREATED_AT.to_string(),
            updated_at: CREATED_AT.to_string(),
        }
    }

    pub(crate) fn insert(&self, key: SshKey) {
        self.state.lock().unwrap().keys.insert(key.id, key);
    }

    /// Make retrieve return the record twice.
    pub(crate) fn duplicate_on_retrieve(&self, id: i64) {
        self.state.lock().unwrap().duplicated.insert(id);
    }

    pub(crate) fn last_update_status(&self) -> Option<String> {
        self.state.lock().unwrap().last_update_status.clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.state.lock().unwrap().keys.len()
    }
}

fn not_found(id: i64) -> IndigoError {
    IndigoError::Status {
        status: 404,
        body: format!("{{\"success\":false,\"message\":\"SSH key {} not found\"}}", id),
    }
}

#[async_trait::async_trait]
impl SshKeyApi for FakeSshKeyApi {
    async fn create_ssh_key(
        &self,
        request: &CreateSshKeyRequest,
    ) -> Result<CreateSshKeyResponse, IndigoError> {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let key = Self::record(state.next_id, &request.ssh_name, &request.ssh_key);
        state.keys.insert(key.id, key.clone());
        Ok(CreateSshKeyResponse {
            success: true,
            message: "SSH key has been added successfully".to_string(),
            ssh_key: key,
        })
    }

    async fn retrieve_ssh_key(&self, id: i64) -> Result<RetrieveSshKeyResponse, IndigoError> {
        let state = self.state.lock().unwrap();
        let key = state.keys.get(&id).cloned().ok_or_else(|| not_found(id))?;
        let mut keys = vec![key];
        if state.duplicated.contains(&id) {
            keys.push(keys[0].clone());
        }
        Ok(RetrieveSshKeyResponse {
            success: true,
            total: keys.len() as i64,
            ssh_key: keys,
        })
    }

    async fn update_ssh_key(
        &self,
        id: i64,
        request: &UpdateSshKeyRequest,
    ) -> Result<StatusResponse, IndigoError> {
        let mut state = self.state.lock().unwrap();
        let key = state.keys.get_mut(&id).ok_or_else(|| not_found(id))?;
        key.name = request.ssh_name.clone();
        key.sshkey = request.ssh_key.clone();
        key.status = request.ssh_key_status.clone();
        key.updated_at = UPDATED_AT.to_string();
        state.last_update_status = Some(request.ssh_key_status.clone());
        Ok(StatusResponse {
            success: true,
            message: "SSH key has been updated successfully".to_string(),
        })
    }

    async fn destroy_ssh_key(&self, id: i64) -> Result<StatusResponse, IndigoError> {
        let mut state = self.state.lock().unwrap();
        state.keys.remove(&id).ok_or_else(|| not_found(id))?;
        Ok(StatusResponse {
            success: true,
            message: "SSH key has been removed successfully".to_string(),
        })
    }
}
