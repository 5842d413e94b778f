//! The `webarena_indigo_v1_vm_sshkey` data source.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::trace;

use super::{attributes, exactly_one};
use crate::error::ProviderError;
use crate::indigo::{SshKey, SshKeyApi};
use crate::schema::{Attribute, Schema};
use crate::validation::as_int64;

/// State of the data source. Unlike the resource, `id` stays an integer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct SshKeyDataSourceModel {
    pub id: i64,
    pub service_id: String,
    pub user_id: i64,
    pub name: String,
    pub sshkey: String,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<SshKey> for SshKeyDataSourceModel {
    fn from(key: SshKey) -> Self {
        Self {
            id: key.id,
            service_id: key.service_id,
            user_id: key.user_id,
            name: key.name,
            sshkey: key.sshkey,
            status: key.status,
            created_at: key.created_at,
            updated_at: key.updated_at,
        }
    }
}

#[derive(Deserialize)]
struct Lookup {
    #[serde(deserialize_with = "int64")]
    id: i64,
}

// Same rule the config validator applies, so `900.0` reads as 900.
fn int64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    as_int64(&value)
        .ok_or_else(|| de::Error::custom(format!("invalid type: {}, expected i64", value)))
}

/// Schema of the data source.
pub fn schema() -> Schema {
    Schema::v0()
        .with_description("WebARENA Indigo V1 VM SSH Key data source")
        .with_attribute(
            "id",
            Attribute::required_int64().with_description(attributes::ID),
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
            Attribute::computed_string().with_description(attributes::NAME),
        )
        .with_attribute(
            "sshkey",
            Attribute::computed_string().with_description(attributes::SSHKEY),
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

/// Look up a key by the configured `id`.
pub async fn read(api: &dyn SshKeyApi, config: Value) -> Result<Value, ProviderError> {
    let Lookup { id } = serde_json::from_value(config)?;

    let resp = api
        .retrieve_ssh_key(id)
        .await
        .map_err(|e| e.with_context("Unable to read sshkey"))?;
    let state = SshKeyDataSourceModel::from(exactly_one(resp)?);

    trace!(id, "read a data source");
    Ok(serde_json::to_value(state)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::testing::FakeSshKeyApi;
    use serde_json::json;

    #[tokio::test]
    async fn test_read() {
        let api = FakeSshKeyApi::new();
        api.insert(FakeSshKeyApi::record(12, "ops", "ssh-ed25519 C"));

        let state = read(&api, json!({"id": 12})).await.unwrap();
        assert_eq!(state["id"], 12);
        assert_eq!(state["name"], "ops");
        assert_eq!(state["sshkey"], "ssh-ed25519 C");
        assert_eq!(state["service_id"], "sshkey");
        assert_eq!(state["status"], "ACTIVE");
    }

    #[tokio::test]
    async fn test_read_missing_key() {
        let api = FakeSshKeyApi::new();
        let err = read(&api, json!({"id": 404})).await.unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(_)));
        assert!(err.message().starts_with("Unable to read sshkey, got error:"));
    }

    #[tokio::test]
    async fn test_read_rejects_ambiguous_response() {
        let api = FakeSshKeyApi::new();
        api.insert(FakeSshKeyApi::record(8, "a", "k"));
        api.duplicate_on_retrieve(8);

        let err = read(&api, json!({"id": 8})).await.unwrap_err();
        assert!(err.message().starts_with("sshKey length is not 1"));
    }

    #[tokio::test]
    async fn test_integral_float_id_validates_and_reads() {
        let api = FakeSshKeyApi::new();
        api.insert(FakeSshKeyApi::record(900, "ops", "ssh-ed25519 C"));
        let config = json!({"id": 900.0});

        assert!(crate::validation::validate(&schema(), &config).is_empty());
        let state = read(&api, config).await.unwrap();
        assert_eq!(state["id"], 900);
        assert_eq!(state["name"], "ops");
    }

    #[tokio::test]
    async fn test_fractional_id_is_rejected() {
        let api = FakeSshKeyApi::new();
        let config = json!({"id": 9.5});

        assert_eq!(crate::validation::validate(&schema(), &config).len(), 1);
        let err = read(&api, config).await.unwrap_err();
        assert!(matches!(err, ProviderError::Serialization(_)));
    }

    #[tokio::test]
    async fn test_read_requires_integer_id() {
        let api = FakeSshKeyApi::new();
        let err = read(&api, json!({"id": "12"})).await.unwrap_err();
        assert!(matches!(err, ProviderError::Serialization(_)));
    }
}
