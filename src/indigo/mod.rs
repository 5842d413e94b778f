//! Client for the WebARENA Indigo SSH key API.
//!
//! Only the four SSH key endpoints the provider needs are covered. The
//! provider talks to them through the [`SshKeyApi`] trait so tests can
//! substitute an in-memory implementation.

mod client;
mod error;
mod types;

pub use client::{parse_endpoint, ClientOptions, IndigoClient, DEFAULT_ENDPOINT, DEFAULT_TIMEOUT};
pub use error::IndigoError;
pub use types::{
    CreateSshKeyRequest, CreateSshKeyResponse, RetrieveSshKeyResponse, SshKey, StatusResponse,
    UpdateSshKeyRequest,
};

/// The SSH key operations of the WebARENA Indigo API.
#[async_trait::async_trait]
pub trait SshKeyApi: Send + Sync {
    /// `POST /webarenaIndigo/v1/vm/sshkey`
    async fn create_ssh_key(
        &self,
        request: &CreateSshKeyRequest,
    ) -> Result<CreateSshKeyResponse, IndigoError>;

    /// `GET /webarenaIndigo/v1/vm/sshkey/{id}`
    async fn retrieve_ssh_key(&self, id: i64) -> Result<RetrieveSshKeyResponse, IndigoError>;

    /// `PUT /webarenaIndigo/v1/vm/sshkey/{id}`
    async fn update_ssh_key(
        &self,
        id: i64,
        request: &UpdateSshKeyRequest,
    ) -> Result<StatusResponse, IndigoError>;

    /// `DELETE /webarenaIndigo/v1/vm/sshkey/{id}`
    async fn destroy_ssh_key(&self, id: i64) -> Result<StatusResponse, IndigoError>;
}
