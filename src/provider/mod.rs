//! The WebARENA provider: schema, configuration and dispatch to the
//! SSH key resource and data source.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::config::{self, ProviderConfig};
use crate::error::ProviderError;
use crate::indigo::{IndigoClient, RetrieveSshKeyResponse, SshKey, SshKeyApi};
use crate::schema::{has_errors, Diagnostic, ProviderSchema};
use crate::server::ProviderService;
use crate::types::{ImportedResource, PlanResult, ProviderMetadata, ServerCapabilities};
use crate::validation;

pub mod sshkey_data_source;
pub mod sshkey_resource;

#[cfg(test)]
pub(crate) mod testing;

/// Provider type name used in configuration.
pub const PROVIDER_TYPE_NAME: &str = "webarena";

/// Type name shared by the SSH key resource and data source.
pub const SSHKEY_TYPE: &str = "webarena_indigo_v1_vm_sshkey";

mod attributes {
    pub const ID: &str = "The ID of the SSH key. This is a unique number assigned by the provider.";
    pub const SERVICE_ID: &str = "The ID of the service to which the SSH key belongs.";
    pub const USER_ID: &str = "The ID of the user who owns the SSH key.";
    pub const NAME: &str = "The name of the SSH key.";
    pub const SSHKEY: &str =
        "The SSH public key. Example: ssh-rsa AAAAB3NzaC1yc2EAAAADAQABAAABgQDQ...";
    pub const STATUS: &str = "The status of the SSH key. Possible values: `ACTIVE`, `DEACTIVE`. \
         (`DEACTIVE` is not typo, it's a valid status defined by the provider.) Default: `ACTIVE`";
    pub const CREATED_AT: &str = "The date and time when the SSH key was created. \
         The date and time are in the UTC timezone and in the `YYYY-mm-dd HH:MM:SS` format.";
    pub const UPDATED_AT: &str = "The date and time when the SSH key was last updated. \
         The date and time are in the UTC timezone and in the `YYYY-mm-dd HH:MM:SS` format.";
}

/// The single record of a retrieve response.
fn exactly_one(resp: RetrieveSshKeyResponse) -> Result<SshKey, ProviderError> {
    let [key]: [SshKey; 1] = resp.ssh_key.try_into().map_err(|keys: Vec<SshKey>| {
        ProviderError::Sdk(format!("sshKey length is not 1: sshkey={:?}", keys))
    })?;
    Ok(key)
}

/// Provider for WebARENA Indigo.
///
/// The API client is created by `configure` and shared by every operation
/// until `stop` drops it.
pub struct WebArenaProvider {
    version: String,
    client: RwLock<Option<Arc<dyn SshKeyApi>>>,
}

impl fmt::Debug for WebArenaProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebArenaProvider")
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

impl WebArenaProvider {
    /// Create an unconfigured provider.
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            client: RwLock::new(None),
        }
    }

    /// Create a provider that is already configured with `client`.
    pub fn with_client(version: impl Into<String>, client: Arc<dyn SshKeyApi>) -> Self {
        Self {
            version: version.into(),
            client: RwLock::new(Some(client)),
        }
    }

    /// The provider version.
    pub fn version(&self) -> &str {
        &self.version
    }

    async fn client(&self) -> Result<Arc<dyn SshKeyApi>, ProviderError> {
        self.client.read().await.clone().ok_or_else(|| {
            ProviderError::FailedPrecondition("provider is not configured".to_string())
        })
    }
}

fn ensure_resource(resource_type: &str) -> Result<(), ProviderError> {
    if resource_type == SSHKEY_TYPE {
        Ok(())
    } else {
        Err(ProviderError::UnknownResource(resource_type.to_string()))
    }
}

fn ensure_data_source(data_source_type: &str) -> Result<(), ProviderError> {
    if data_source_type == SSHKEY_TYPE {
        Ok(())
    } else {
        Err(ProviderError::UnknownResource(data_source_type.to_string()))
    }
}

#[async_trait::async_trait]
impl ProviderService for WebArenaProvider {
    fn schema(&self) -> ProviderSchema {
        ProviderSchema::new()
            .with_provider_config(config::schema())
            .with_resource(SSHKEY_TYPE, sshkey_resource::schema())
            .with_data_source(SSHKEY_TYPE, sshkey_data_source::schema())
    }

    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            resources: vec![SSHKEY_TYPE.to_string()],
            data_sources: vec![SSHKEY_TYPE.to_string()],
            capabilities: ServerCapabilities { plan_destroy: true },
        }
    }

    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(validation::validate(&config::schema(), &config))
    }

    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let diagnostics = validation::validate(&config::schema(), &config);
        if has_errors(&diagnostics) {
            return Ok(diagnostics);
        }

        let options = match ProviderConfig::from_value(config)?.resolve() {
            Ok(options) => options,
            Err(diagnostics) => return Ok(diagnostics),
        };
        let endpoint = options.endpoint.clone();

        let client = match IndigoClient::new(options) {
            Ok(client) => client,
            Err(err) => {
                return Ok(vec![Diagnostic::error("Unable to Create WebARENA API Client")
                    .with_detail(format!(
                        "An unexpected error occurred when creating the WebARENA API client. \
                         If the error is not clear, please contact the provider developers.\n\n\
                         WebARENA Client Error: {}",
                        err
                    ))]);
            }
        };

        *self.client.write().await = Some(Arc::new(client));
        info!(
            provider = PROVIDER_TYPE_NAME,
            version = %self.version,
            %endpoint,
            "configured WebARENA API client"
        );
        Ok(diagnostics)
    }

    async fn stop(&self) -> Result<(), ProviderError> {
        if self.client.write().await.take().is_some() {
            debug!("released WebARENA API client");
        }
        Ok(())
    }

    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        ensure_resource(resource_type)?;
        Ok(validation::validate(&sshkey_resource::schema(), &config))
    }

    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        _config: Value,
    ) -> Result<PlanResult, ProviderError> {
        ensure_resource(resource_type)?;
        sshkey_resource::plan(prior_state, proposed_state)
    }

    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
        ensure_resource(resource_type)?;
        let api = self.client().await?;
        sshkey_resource::create(api.as_ref(), planned_state).await
    }

    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError> {
        ensure_resource(resource_type)?;
        let api = self.client().await?;
        sshkey_resource::read(api.as_ref(), current_state).await
    }

    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        ensure_resource(resource_type)?;
        let api = self.client().await?;
        sshkey_resource::update(api.as_ref(), prior_state, planned_state).await
    }

    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        ensure_resource(resource_type)?;
        let api = self.client().await?;
        sshkey_resource::delete(api.as_ref(), current_state).await
    }

    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        ensure_resource(resource_type)?;
        let api = self.client().await?;
        let state = sshkey_resource::import(api.as_ref(), id).await?;
        Ok(vec![ImportedResource::new(resource_type, state)])
    }

    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        ensure_data_source(data_source_type)?;
        Ok(validation::validate(&sshkey_data_source::schema(), &config))
    }

    async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        ensure_data_source(data_source_type)?;
        let api = self.client().await?;
        sshkey_data_source::read(api.as_ref(), config).await
    }
}
