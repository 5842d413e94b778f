//! `reqwest`-backed implementation of [`SshKeyApi`].

use std::fmt;
use std::time::{Duration, Instant};

use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{debug, trace};

use super::error::IndigoError;
use super::types::{
    AccessTokenRequest, AccessTokenResponse, CreateSshKeyRequest, CreateSshKeyResponse,
    RetrieveSshKeyResponse, StatusResponse, UpdateSshKeyRequest,
};
use super::SshKeyApi;

/// Production API endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.customer.jp";

/// Timeout applied to every API request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Tokens are refreshed this long before the API says they expire.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Upper bound on how long a token is cached, whatever `expiresIn` says.
const MAX_TOKEN_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

const ACCESS_TOKEN_PATH: &str = "/oauth/v1/accesstokens";
const SSH_KEY_PATH: &str = "/webarenaIndigo/v1/vm/sshkey";

/// Settings needed to build an [`IndigoClient`].
#[derive(Clone)]
pub struct ClientOptions {
    /// Base URL of the API, without a trailing path.
    pub endpoint: String,
    /// OAuth client id.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl ClientOptions {
    /// Options for the production endpoint.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Use a different API endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Use a different request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientOptions")
            .field("endpoint", &self.endpoint)
            .field("client_id", &"<redacted>")
            .field("client_secret", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// Client for the WebARENA Indigo SSH key API.
///
/// Authenticates with the OAuth client-credentials flow and caches the
/// bearer token until shortly before it expires.
pub struct IndigoClient {
    http: reqwest::Client,
    base: String,
    client_id: String,
    client_secret: String,
    token: Mutex<Option<CachedToken>>,
}

impl fmt::Debug for IndigoClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndigoClient")
            .field("base", &self.base)
            .finish_non_exhaustive()
    }
}

impl IndigoClient {
    /// Build a client. No request is made until the first API call.
    pub fn new(options: ClientOptions) -> Result<Self, IndigoError> {
        let base = parse_endpoint(&options.endpoint)?;
        let http = reqwest::Client::builder()
            .timeout(options.timeout)
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()?;

        Ok(Self {
            http,
            base,
            client_id: options.client_id,
            client_secret: options.client_secret,
            token: Mutex::new(None),
        })
    }

    /// The base URL requests are sent to.
    pub fn endpoint(&self) -> &str {
        &self.base
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn access_token(&self) -> Result<String, IndigoError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }

        debug!(endpoint = %self.base, "requesting WebARENA access token");
        let body = AccessTokenRequest {
            grant_type: "client_credentials",
            client_id: &self.client_id,
            client_secret: &self.client_secret,
            code: "",
        };
        let resp: AccessTokenResponse = self
            .execute(self.http.post(self.url(ACCESS_TOKEN_PATH)).json(&body))
            .await?;

        let lifetime = Duration::from_secs(resp.expires_in)
            .min(MAX_TOKEN_LIFETIME)
            .saturating_sub(TOKEN_EXPIRY_MARGIN);
        *cached = Instant::now()
            .checked_add(lifetime)
            .map(|refresh_at| CachedToken {
                value: resp.access_token.clone(),
                refresh_at,
            });
        Ok(resp.access_token)
    }

    async fn authorized(&self, method: Method, path: &str) -> Result<RequestBuilder, IndigoError> {
        let token = self.access_token().await?;
        Ok(self.http.request(method, self.url(path)).bearer_auth(token))
    }

    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, IndigoError> {
        let response = request.send().await?;
        let status = response.status();
        let path = response.url().path().to_string();
        let body = response.text().await?;
        trace!(status = status.as_u16(), path = %path, "WebARENA API response");

        if !status.is_success() {
            return Err(IndigoError::Status {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| IndigoError::Decode(e.to_string()))
    }

    /// Execute an authorized request, dropping the cached token if the API
    /// rejects it so the next call authenticates again.
    async fn call<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, IndigoError> {
        let result = self.execute(request).await;
        if matches!(&result, Err(err) if err.status() == Some(401)) {
            *self.token.lock().await = None;
        }
        result
    }
}

#[async_trait::async_trait]
impl SshKeyApi for IndigoClient {
    async fn create_ssh_key(
        &self,
        request: &CreateSshKeyRequest,
    ) -> Result<CreateSshKeyResponse, IndigoError> {
        let builder = self.authorized(Method::POST, SSH_KEY_PATH).await?;
        self.call(builder.json(request)).await
    }

    async fn retrieve_ssh_key(&self, id: i64) -> Result<RetrieveSshKeyResponse, IndigoError> {
        let path = format!("{}/{}", SSH_KEY_PATH, id);
        let builder = self.authorized(Method::GET, &path).await?;
        self.call(builder).await
    }

    async fn update_ssh_key(
        &self,
        id: i64,
        request: &UpdateSshKeyRequest,
    ) -> Result<StatusResponse, IndigoError> {
        let path = format!("{}/{}", SSH_KEY_PATH, id);
        let builder = self.authorized(Method::PUT, &path).await?;
        self.call(builder.json(request)).await
    }

    async fn destroy_ssh_key(&self, id: i64) -> Result<StatusResponse, IndigoError> {
        let path = format!("{}/{}", SSH_KEY_PATH, id);
        let builder = self.authorized(Method::DELETE, &path).await?;
        self.call(builder).await
    }
}

/// Validate an endpoint and strip any trailing slash.
pub fn parse_endpoint(endpoint: &str) -> Result<String, IndigoError> {
    let invalid = |reason: String| IndigoError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason,
    };

    let url = url::Url::parse(endpoint).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => {},
        other => return Err(invalid(format!("unsupported scheme {:?}", other))),
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host".to_string()));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(invalid("query and fragment are not allowed".to_string()));
    }

    Ok(url.as_str().trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use httpmock::prelude::*;
    use serde_json::json;

    fn record(id: i64, name: &str) -> serde_json::Value {
        json!({
            "id": id,
            "service_id": "wss-1234",
            "user_id": 77,
            "name": name,
            "sshkey": "ssh-ed25519 AAAAC3Nza deploy@example",
            "status": "ACTIVE",
            "created_at": "2024-01-02 03:04:05",
            "updated_at": "2024-01-02 03:04:05"
        })
    }

    fn client_for(server: &MockServer) -> IndigoClient {
        IndigoClient::new(ClientOptions::new("id", "secret").with_endpoint(server.base_url()))
            .unwrap()
    }

    async fn mock_token<'a>(server: &'a MockServer, expires_in: &str) -> httpmock::Mock<'a> {
        let expires_in = expires_in.to_string();
        server
            .mock_async(|when, then| {
                when.method(POST).path("/oauth/v1/accesstokens").json_body(json!({
                    "grantType": "client_credentials",
                    "clientId": "id",
                    "clientSecret": "secret",
                    "code": ""
                }));
                then.status(201).json_body(json!({
                    "accessToken": "tok",
                    "tokenType": "BearerToken",
                    "expiresIn": expires_in,
                    "scope": "",
                    "issuedAt": "1700000000000"
                }));
            })
            .await
    }

    #[test]
    fn test_parse_endpoint() {
        assert_eq!(
            parse_endpoint("https://api.customer.jp/").unwrap(),
            "https://api.customer.jp"
        );
        assert_eq!(
            parse_endpoint("http://127.0.0.1:8080").unwrap(),
            "http://127.0.0.1:8080"
        );
        assert!(parse_endpoint("api.customer.jp").is_err());
        assert!(parse_endpoint("ftp://api.customer.jp").is_err());
        assert!(parse_endpoint("https://api.customer.jp/?a=b").is_err());
    }

    #[test]
    fn test_options_debug_redacts_secrets() {
        let options = ClientOptions::new("my-id", "my-secret");
        let debug = format!("{:?}", options);
        assert!(!debug.contains("my-id"));
        assert!(!debug.contains("my-secret"));
        assert!(debug.contains(DEFAULT_ENDPOINT));
    }

    #[tokio::test]
    async fn test_create_sends_bearer_and_body() {
        let server = MockServer::start_async().await;
        let token = mock_token(&server, "3599").await;
        let create = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/webarenaIndigo/v1/vm/sshkey")
                    .header("authorization", "Bearer tok")
                    .json_body(json!({"sshName": "deploy", "sshKey": "ssh-ed25519 AAAA"}));
                then.status(201).json_body(json!({
                    "success": true,
                    "message": "SSH key has been added successfully",
                    "sshKey": record(5012, "deploy")
                }));
            })
            .await;

        let client = client_for(&server);
        let resp = client
            .create_ssh_key(&CreateSshKeyRequest {
                ssh_name: "deploy".into(),
                ssh_key: "ssh-ed25519 AAAA".into(),
            })
            .await
            .unwrap();

        assert_eq!(resp.ssh_key.id, 5012);
        token.assert_async().await;
        create.assert_async().await;
    }

    #[tokio::test]
    async fn test_token_is_cached() {
        let server = MockServer::start_async().await;
        let token = mock_token(&server, "3599").await;
        let retrieve = server
            .mock_async(|when, then| {
                when.method(GET).path("/webarenaIndigo/v1/vm/sshkey/5012");
                then.status(200).json_body(json!({
                    "success": true,
                    "total": 1,
                    "sshKey": [record(5012, "deploy")]
                }));
            })
            .await;

        let client = client_for(&server);
        client.retrieve_ssh_key(5012).await.unwrap();
        client.retrieve_ssh_key(5012).await.unwrap();

        token.assert_hits_async(1).await;
        retrieve.assert_hits_async(2).await;
    }

    #[tokio::test]
    async fn test_short_lived_token_is_refreshed() {
        let server = MockServer::start_async().await;
        // Shorter than the refresh margin, so every call fetches a new token.
        let token = mock_token(&server, "30").await;
        server
            .mock_async(|when, then| {
                when.method(DELETE).path("/webarenaIndigo/v1/vm/sshkey/9");
                then.status(200).json_body(json!({
                    "success": true,
                    "message": "SSH Key has been removed successfully"
                }));
            })
            .await;

        let client = client_for(&server);
        let resp = client.destroy_ssh_key(9).await.unwrap();
        assert!(resp.success);
        client.destroy_ssh_key(9).await.unwrap();

        token.assert_hits_async(2).await;
    }

    #[tokio::test]
    async fn test_oversized_token_lifetime_is_capped() {
        let server = MockServer::start_async().await;
        let token = mock_token(&server, "18446744073709551615").await;
        server
            .mock_async(|when, then| {
                when.method(DELETE).path("/webarenaIndigo/v1/vm/sshkey/9");
                then.status(200).json_body(json!({
                    "success": true,
                    "message": "SSH Key has been removed successfully"
                }));
            })
            .await;

        let client = client_for(&server);
        client.destroy_ssh_key(9).await.unwrap();
        client.destroy_ssh_key(9).await.unwrap();

        token.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn test_rejected_token_is_dropped() {
        let server = MockServer::start_async().await;
        let token = mock_token(&server, "3599").await;
        let mut rejected = server
            .mock_async(|when, then| {
                when.method(GET).path("/webarenaIndigo/v1/vm/sshkey/5012");
                then.status(401).body("Unauthorized");
            })
            .await;

        let client = client_for(&server);
        let err = client.retrieve_ssh_key(5012).await.unwrap_err();
        assert_eq!(err.status(), Some(401));
        rejected.assert_async().await;
        rejected.delete_async().await;

        server
            .mock_async(|when, then| {
                when.method(GET).path("/webarenaIndigo/v1/vm/sshkey/5012");
                then.status(200).json_body(json!({
                    "success": true,
                    "total": 1,
                    "sshKey": [record(5012, "deploy")]
                }));
            })
            .await;
        client.retrieve_ssh_key(5012).await.unwrap();

        token.assert_hits_async(2).await;
    }

    #[tokio::test]
    async fn test_slow_response_times_out() {
        let server = MockServer::start_async().await;
        mock_token(&server, "3599").await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/webarenaIndigo/v1/vm/sshkey/1");
                then.status(200)
                    .delay(Duration::from_secs(2))
                    .json_body(json!({"success": true, "total": 0, "sshKey": []}));
            })
            .await;

        let client = IndigoClient::new(
            ClientOptions::new("id", "secret")
                .with_endpoint(server.base_url())
                .with_timeout(Duration::from_millis(200)),
        )
        .unwrap();
        let err = client.retrieve_ssh_key(1).await.unwrap_err();
        let err = err.with_context("Unable to read sshkey");

        assert!(matches!(err, ProviderError::DeadlineExceeded(_)));
        assert!(err.message().starts_with("Unable to read sshkey, got error:"));
    }

    #[tokio::test]
    async fn test_update_body() {
        let server = MockServer::start_async().await;
        mock_token(&server, "3599").await;
        let update = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/webarenaIndigo/v1/vm/sshkey/5012")
                    .json_body(json!({
                        "sshName": "renamed",
                        "sshKey": "ssh-ed25519 AAAA",
                        "sshKeyStatus": "ACTIVE"
                    }));
                then.status(200).json_body(json!({
                    "success": true,
                    "message": "SSH Key has been updated successfully"
                }));
            })
            .await;

        let client = client_for(&server);
        let resp = client
            .update_ssh_key(
                5012,
                &UpdateSshKeyRequest {
                    ssh_name: "renamed".into(),
                    ssh_key: "ssh-ed25519 AAAA".into(),
                    ssh_key_status: "ACTIVE".into(),
                },
            )
            .await
            .unwrap();

        assert_eq!(resp.message, "SSH Key has been updated successfully");
        update.assert_async().await;
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let server = MockServer::start_async().await;
        mock_token(&server, "3599").await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/webarenaIndigo/v1/vm/sshkey/404");
                then.status(404)
                    .json_body(json!({"success": false, "message": "SSH key not found"}));
            })
            .await;

        let client = client_for(&server);
        let err = client.retrieve_ssh_key(404).await.unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert!(err.to_string().contains("SSH key not found"));
    }

    #[tokio::test]
    async fn test_rejected_credentials() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/oauth/v1/accesstokens");
                then.status(401).body("Unauthorized");
            })
            .await;

        let client = client_for(&server);
        let err = client.retrieve_ssh_key(1).await.unwrap_err();
        assert_eq!(err.status(), Some(401));
    }

    #[tokio::test]
    async fn test_undecodable_body() {
        let server = MockServer::start_async().await;
        mock_token(&server, "3599").await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/webarenaIndigo/v1/vm/sshkey/1");
                then.status(200).body("<html>maintenance</html>");
            })
            .await;

        let client = client_for(&server);
        let err = client.retrieve_ssh_key(1).await.unwrap_err();
        assert!(matches!(err, IndigoError::Decode(_)));
    }
}
