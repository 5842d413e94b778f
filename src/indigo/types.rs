//! Wire types for the WebARENA Indigo SSH key endpoints.
//!
//! Request bodies use camelCase keys; the SSH key record itself uses
//! snake_case keys, exactly as the API returns them.

use serde::{Deserialize, Deserializer, Serialize};

/// An SSH key record as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshKey {
    /// Numeric key id assigned by the API.
    pub id: i64,
    /// Service the key belongs to.
    #[serde(default)]
    pub service_id: String,
    /// Owning user.
    #[serde(default)]
    pub user_id: i64,
    /// Display name.
    pub name: String,
    /// The public key text.
    pub sshkey: String,
    /// `ACTIVE` or `DEACTIVE`.
    #[serde(default)]
    pub status: String,
    /// Creation time, `YYYY-mm-dd HH:MM:SS` in UTC.
    #[serde(default)]
    pub created_at: String,
    /// Last update time, `YYYY-mm-dd HH:MM:SS` in UTC.
    #[serde(default)]
    pub updated_at: String,
}

/// Body of `POST /webarenaIndigo/v1/vm/sshkey`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSshKeyRequest {
    /// Key name.
    pub ssh_name: String,
    /// Public key text.
    pub ssh_key: String,
}

/// Response of `POST /webarenaIndigo/v1/vm/sshkey`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSshKeyResponse {
    /// Whether the API reports success.
    #[serde(default)]
    pub success: bool,
    /// Human-readable outcome.
    #[serde(default)]
    pub message: String,
    /// The created record.
    #[serde(rename = "sshKey")]
    pub ssh_key: SshKey,
}

/// Response of `GET /webarenaIndigo/v1/vm/sshkey/{id}`.
///
/// The API wraps the single record in a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrieveSshKeyResponse {
    /// Whether the API reports success.
    #[serde(default)]
    pub success: bool,
    /// Number of records reported by the API.
    #[serde(default)]
    pub total: i64,
    /// The matching records.
    #[serde(rename = "sshKey", default)]
    pub ssh_key: Vec<SshKey>,
}

/// Body of `PUT /webarenaIndigo/v1/vm/sshkey/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSshKeyRequest {
    /// New key name.
    pub ssh_name: String,
    /// New public key text.
    pub ssh_key: String,
    /// `ACTIVE` or `DEACTIVE`.
    pub ssh_key_status: String,
}

/// Response of the update and destroy endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Whether the API reports success.
    #[serde(default)]
    pub success: bool,
    /// Human-readable outcome.
    #[serde(default)]
    pub message: String,
}

/// Body of `POST /oauth/v1/accesstokens`.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AccessTokenRequest<'a> {
    pub grant_type: &'static str,
    pub client_id: &'a str,
    pub client_secret: &'a str,
    pub code: &'static str,
}

/// Response of `POST /oauth/v1/accesstokens`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AccessTokenResponse {
    pub access_token: String,
    #[serde(deserialize_with = "seconds_from_string_or_number")]
    pub expires_in: u64,
}

/// The API sends `expiresIn` as a quoted number.
fn seconds_from_string_or_number<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Seconds {
        Number(u64),
        Text(String),
    }

    match Seconds::deserialize(deserializer)? {
        Seconds::Number(n) => Ok(n),
        Seconds::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record() -> serde_json::Value {
        json!({
            "id": 5012,
            "service_id": "wss-1234",
            "user_id": 77,
            "name": "deploy",
            "sshkey": "ssh-ed25519 AAAAC3Nza deploy@example",
            "status": "ACTIVE",
            "created_at": "2024-01-02 03:04:05",
            "updated_at": "2024-01-02 03:04:05"
        })
    }

    #[test]
    fn test_request_bodies_are_camel_case() {
        let body = serde_json::to_value(CreateSshKeyRequest {
            ssh_name: "deploy".into(),
            ssh_key: "ssh-ed25519 AAAA".into(),
        })
        .unwrap();
        assert_eq!(body, json!({"sshName": "deploy", "sshKey": "ssh-ed25519 AAAA"}));

        let body = serde_json::to_value(UpdateSshKeyRequest {
            ssh_name: "deploy".into(),
            ssh_key: "ssh-ed25519 AAAA".into(),
            ssh_key_status: "DEACTIVE".into(),
        })
        .unwrap();
        assert_eq!(body["sshKeyStatus"], "DEACTIVE");
    }

    #[test]
    fn test_create_response() {
        let resp: CreateSshKeyResponse = serde_json::from_value(json!({
            "success": true,
            "message": "SSH key has been added successfully",
            "sshKey": record()
        }))
        .unwrap();
        assert!(resp.success);
        assert_eq!(resp.ssh_key.id, 5012);
        assert_eq!(resp.ssh_key.service_id, "wss-1234");
    }

    #[test]
    fn test_retrieve_response_wraps_list() {
        let resp: RetrieveSshKeyResponse = serde_json::from_value(json!({
            "success": true,
            "total": 1,
            "sshKey": [record()]
        }))
        .unwrap();
        assert_eq!(resp.ssh_key.len(), 1);
        assert_eq!(resp.ssh_key[0].name, "deploy");

        let resp: RetrieveSshKeyResponse =
            serde_json::from_value(json!({"success": true, "total": 0})).unwrap();
        assert!(resp.ssh_key.is_empty());
    }

    #[test]
    fn test_access_token_expiry_formats() {
        let resp: AccessTokenResponse = serde_json::from_value(json!({
            "accessToken": "tok",
            "tokenType": "BearerToken",
            "expiresIn": "3599",
            "scope": "",
            "issuedAt": "1700000000000"
        }))
        .unwrap();
        assert_eq!(resp.expires_in, 3599);

        let resp: AccessTokenResponse =
            serde_json::from_value(json!({"accessToken": "tok", "expiresIn": 60})).unwrap();
        assert_eq!(resp.expires_in, 60);

        assert!(serde_json::from_value::<AccessTokenResponse>(
            json!({"accessToken": "tok", "expiresIn": "soon"})
        )
        .is_err());
    }
}
