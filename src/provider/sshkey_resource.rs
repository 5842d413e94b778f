//! The `webarena_indigo_v1_vm_sshkey` resource.
//!
//! The API identifies keys by integer, while resource ids (and import ids)
//! are strings, so `id` is kept as the decimal rendering of the API id.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::trace;

use super::{attributes, exactly_one};
use crate::error::ProviderError;
use crate::indigo::{CreateSshKeyRequest, SshKey, SshKeyApi, UpdateSshKeyRequest};
use crate::schema::{Attribute, Schema};
use crate::types::{AttributeChange, PlanResult};

/// State of one SSH key resource. `None` marks a value not known yet.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SshKeyResourceModel {
    /// Decimal rendering of the API id.
    pub id: Option<String>,
    /// Service the key belongs to.
    pub service_id: Option<String>,
    /// Owning user.
    pub user_id: Option<i64>,
    /// Key name.
    pub name: String,
    /// Public key text.
    pub sshkey: String,
    /// `ACTIVE` or `DEACTIVE`.
    pub status: Option<String>,
    /// Creation time.
    pub created_at: Option<String>,
    /// Last update time.
    pub updated_at: Option<String>,
}

impl From<SshKey> for SshKeyResourceModel {
    fn from(key: SshKey) -> Self {
        Self {
            id: Some(key.id.to_string()),
            service_id: Some(key.service_id),
            user_id: Some(key.user_id),
            name: key.name,
            sshkey: key.sshkey,
            status: Some(key.status),
            created_at: Some(key.created_at),
            updated_at: Some(key.updated_at),
        }
    }
}

impl SshKeyResourceModel {
    fn from_state(state: Value) -> Result<Self, ProviderError> {
        Ok(serde_json::from_value(state)?)
    }

    fn into_state(self) -> Result<Value, ProviderError> {
        Ok(serde_json::to_value(self)?)
    }

    /// The API id this resource refers to.
    pub fn api_id(&self) -> Result<i64, ProviderError> {
        parse_id(self.id.as_deref().unwrap_or_default())
    }
}

fn parse_id(id: &str) -> Result<i64, ProviderError> {
    id.parse().map_err(|err| {
        ProviderError::InvalidRequest(format!("Unable to parse ID={}, got error: {}", id, err))
    })
}

/// Schema of the resource.
pub fn schema() -> Schema {
    Schema::v0()
        .with_description("WebARENA Indigo V1 VM SSH Key resource")
        .with_attribute(
            "id",
            Attribute::computed_string().with_description(attributes::ID),
        )
        .with_attribute(
            "service_id",
            Attribute::computed_string().with_description(attributes::SERVICE_ID),
        )
        .with_attribute(
            "user_id",
            Attribute::computed_int64().with_description(attributes::USER_ID),
        )
        .with_attribute(
            "name",
            Attribute::required_string().with_description(attributes::NAME),
        )
        .with_attribute(
            "sshkey",
            Attribute::required_string().with_description(attributes::SSHKEY),
        )
        .with_attribute(
            "status",
            Attribute::computed_string().with_description(attributes::STATUS),
        )
        .with_attribute(
            "created_at",
            Attribute::computed_string().with_description(attributes::CREATED_AT),
        )
        .with_attribute(
            "updated_at",
            Attribute::computed_string().with_description(attributes::UPDATED_AT),
        )
}

/// Compute the planned state and the attribute changes.
///
/// `name` and `sshkey` are updated in place, so the plan never asks for
/// replacement.
pub fn plan(prior_state: Option<Value>, proposed_state: Value) -> Result<PlanResult, ProviderError> {
    let prior = prior_state
        .filter(|v| !v.is_null())
        .map(SshKeyResourceModel::from_state)
        .transpose()?;

    if proposed_state.is_null() {
        let Some(prior) = prior else {
            return Ok(PlanResult::no_change(Value::Null));
        };
        let changes = attribute_values(&prior.into_state()?)
            .into_iter()
            .map(|(name, value)| AttributeChange::removed(name, value))
            .collect();
        return Ok(PlanResult::in_place(Value::Null, changes));
    }

    let proposed = SshKeyResourceModel::from_state(proposed_state)?;

    let Some(prior) = prior else {
        let planned = SshKeyResourceModel {
            name: proposed.name,
            sshkey: proposed.sshkey,
            ..Default::default()
        };
        let changes = vec![
            AttributeChange::added("name", Value::String(planned.name.clone())),
            AttributeChange::added("sshkey", Value::String(planned.sshkey.clone())),
        ];
        return Ok(PlanResult::in_place(planned.into_state()?, changes));
    };

    let mut changes = Vec::new();
    if prior.name != proposed.name {
        changes.push(AttributeChange::modified(
            "name",
            Value::String(prior.name.clone()),
            Value::String(proposed.name.clone()),
        ));
    }
    if prior.sshkey != proposed.sshkey {
        changes.push(AttributeChange::modified(
            "sshkey",
            Value::String(prior.sshkey.clone()),
            Value::String(proposed.sshkey.clone()),
        ));
    }

    if changes.is_empty() {
        return Ok(PlanResult::no_change(prior.into_state()?));
    }

    let planned = SshKeyResourceModel {
        name: proposed.name,
        sshkey: proposed.sshkey,
        // The API stamps a new update time.
        updated_at: None,
        ..prior
    };
    Ok(PlanResult::in_place(planned.into_state()?, changes))
}

fn attribute_values(state: &Value) -> Vec<(String, Value)> {
    state
        .as_object()
        .map(|obj| {
            obj.iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        })
        .unwrap_or_default()
}

/// Create the key and return the state reported by the API.
pub async fn create(api: &dyn SshKeyApi, planned_state: Value) -> Result<Value, ProviderError> {
    let plan = SshKeyResourceModel::from_state(planned_state)?;

    let resp = api
        .create_ssh_key(&CreateSshKeyRequest {
            ssh_name: plan.name,
            ssh_key: plan.sshkey,
        })
        .await
        .map_err(|e| e.with_context("Unable to create sshkey"))?;

    let state = SshKeyResourceModel::from(resp.ssh_key);
    trace!(id = state.id.as_deref().unwrap_or_default(), "created a resource");
    state.into_state()
}

async fn fetch(api: &dyn SshKeyApi, id: i64) -> Result<SshKeyResourceModel, ProviderError> {
    let resp = api
        .retrieve_ssh_key(id)
        .await
        .map_err(|e| e.with_context("Unable to read sshkey"))?;
    Ok(exactly_one(resp)?.into())
}

/// Refresh the state from the API.
pub async fn read(api: &dyn SshKeyApi, current_state: Value) -> Result<Value, ProviderError> {
    let current = SshKeyResourceModel::from_state(current_state)?;
    let state = fetch(api, current.api_id()?).await?;
    trace!(id = state.id.as_deref().unwrap_or_default(), "read a resource");
    state.into_state()
}

/// Push the planned name and key, then re-read the record.
///
/// `status` is computed, so the value already in state is sent back unchanged.
pub async fn update(
    api: &dyn SshKeyApi,
    prior_state: Value,
    planned_state: Value,
) -> Result<Value, ProviderError> {
    let prior = SshKeyResourceModel::from_state(prior_state)?;
    let plan = SshKeyResourceModel::from_state(planned_state)?;
    let id = prior.api_id()?;

    let status = prior.status.or(plan.status).unwrap_or_default();
    api.update_ssh_key(
        id,
        &UpdateSshKeyRequest {
            ssh_name: plan.name,
            ssh_key: plan.sshkey,
            ssh_key_status: status,
        },
    )
    .await
    .map_err(|e| e.with_context("Unable to update sshkey"))?;

    let state = fetch(api, id).await?;
    trace!(id = state.id.as_deref().unwrap_or_default(), "updated a resource");
    state.into_state()
}

/// Destroy the key.
pub async fn delete(api: &dyn SshKeyApi, current_state: Value) -> Result<(), ProviderError> {
    let current = SshKeyResourceModel::from_state(current_state)?;
    let id = current.api_id()?;

    let resp = api
        .destroy_ssh_key(id)
        .await
        .map_err(|e| e.with_context("Unable to delete sshkey"))?;

    trace!(id, success = resp.success, msg = %resp.message, "deleted a resource");
    Ok(())
}

/// Import an existing key by its id.
///
/// The id is stored as-is and the rest of the state is read from the API.
pub async fn import(api: &dyn SshKeyApi, id: &str) -> Result<Value, ProviderError> {
    let state = fetch(api, parse_id(id)?).await?;
    trace!(id, "imported a resource");
    state.into_state()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::testing::FakeSshKeyApi;
    use serde_json::json;

    #[test]
    fn test_model_from_api_record() {
        let model = SshKeyResourceModel::from(FakeSshKeyApi::record(5012, "deploy", "ssh-ed25519 A"));
        assert_eq!(model.id.as_deref(), Some("5012"));
        assert_eq!(model.api_id().unwrap(), 5012);
        assert_eq!(model.status.as_deref(), Some("ACTIVE"));
    }

    #[test]
    fn test_api_id_rejects_garbage() {
        let model = SshKeyResourceModel {
            id: Some("example-id".into()),
            ..Default::default()
        };
        let err = model.api_id().unwrap_err();
        assert!(matches!(err, ProviderError::InvalidRequest(_)));
        assert!(err.message().starts_with("Unable to parse ID=example-id"));

        assert!(SshKeyResourceModel::default().api_id().is_err());
    }

    #[test]
    fn test_plan_create() {
        let plan = plan(None, json!({"name": "deploy", "sshkey": "ssh-ed25519 A"})).unwrap();
        assert_eq!(plan.changes.len(), 2);
        assert!(!plan.requires_replace);
        assert_eq!(plan.planned_state["name"], "deploy");
        assert!(plan.planned_state["id"].is_null());
        assert!(plan.planned_state["status"].is_null());
    }

    #[test]
    fn test_plan_update_carries_computed() {
        let prior = serde_json::to_value(SshKeyResourceModel::from(FakeSshKeyApi::record(
            1,
            "deploy",
            "ssh-ed25519 A",
        )))
        .unwrap();
        let mut proposed = prior.clone();
        proposed["name"] = json!("renamed");

        let plan = plan(Some(prior), proposed).unwrap();
        assert_eq!(plan.changes.len(), 1);
        assert_eq!(plan.changes[0].path, "name");
        assert_eq!(plan.planned_state["id"], "1");
        assert_eq!(plan.planned_state["status"], "ACTIVE");
        assert!(plan.planned_state["updated_at"].is_null());
    }

    #[test]
    fn test_plan_no_change() {
        let prior = serde_json::to_value(SshKeyResourceModel::from(FakeSshKeyApi::record(
            1,
            "deploy",
            "ssh-ed25519 A",
        )))
        .unwrap();
        let plan = plan(Some(prior.clone()), prior.clone()).unwrap();
        assert!(!plan.has_changes());
        assert_eq!(plan.planned_state, prior);
    }

    #[test]
    fn test_plan_destroy() {
        let prior = serde_json::to_value(SshKeyResourceModel::from(FakeSshKeyApi::record(
            1,
            "deploy",
            "ssh-ed25519 A",
        )))
        .unwrap();
        let plan = plan(Some(prior), Value::Null).unwrap();
        assert!(plan.planned_state.is_null());
        assert_eq!(plan.changes.len(), 8);
        assert!(plan.changes.iter().all(|c| c.after.is_none()));
    }

    #[tokio::test]
    async fn test_create_read_update_delete() {
        let api = FakeSshKeyApi::new();

        let created = create(&api, json!({"name": "deploy", "sshkey": "ssh-ed25519 A"}))
            .await
            .unwrap();
        assert_eq!(created["name"], "deploy");
        assert_eq!(created["status"], "ACTIVE");
        let id = created["id"].as_str().unwrap().to_string();

        let read_back = read(&api, created.clone()).await.unwrap();
        assert_eq!(read_back, created);

        let mut planned = created.clone();
        planned["sshkey"] = json!("ssh-ed25519 B");
        let updated = update(&api, created.clone(), planned).await.unwrap();
        assert_eq!(updated["sshkey"], "ssh-ed25519 B");
        assert_eq!(updated["id"], id.as_str());
        assert_eq!(api.last_update_status().as_deref(), Some("ACTIVE"));

        delete(&api, updated).await.unwrap();
        let err = read(&api, created).await.unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_read_requires_exactly_one_record() {
        let api = FakeSshKeyApi::new();
        api.insert(FakeSshKeyApi::record(3, "a", "k"));
        api.duplicate_on_retrieve(3);

        let err = read(&api, json!({"id": "3", "name": "a", "sshkey": "k"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Sdk(_)));
        assert!(err.message().contains("sshKey length is not 1"));
    }

    #[tokio::test]
    async fn test_read_bad_id() {
        let api = FakeSshKeyApi::new();
        let err = read(&api, json!({"id": "abc", "name": "a", "sshkey": "k"}))
            .await
            .unwrap_err();
        assert_eq!(err.summary(), "ID Error");
    }

    #[tokio::test]
    async fn test_import() {
        let api = FakeSshKeyApi::new();
        api.insert(FakeSshKeyApi::record(42, "imported", "ssh-rsa AAAA"));

        let state = import(&api, "42").await.unwrap();
        assert_eq!(state["id"], "42");
        assert_eq!(state["name"], "imported");
        assert_eq!(state["user_id"], 77);

        assert!(matches!(
            import(&api, "forty-two").await.unwrap_err(),
            ProviderError::InvalidRequest(_)
        ));
        assert!(matches!(
            import(&api, "43").await.unwrap_err(),
            ProviderError::NotFound(_)
        ));
    }
}
