//! The provider configuration block.
//!
//! Each setting may come from configuration or from the environment; a
//! non-null configuration value wins over the environment.

use std::fmt;

use serde::Deserialize;

use crate::indigo::{parse_endpoint, ClientOptions, DEFAULT_ENDPOINT};
use crate::schema::{Attribute, Diagnostic, Schema};

/// Environment variable for the API endpoint.
pub const ENV_ENDPOINT: &str = "WEBARENA_INDIGO_ENDPOINT";
/// Environment variable for the OAuth client id.
pub const ENV_CLIENT_ID: &str = "WEBARENA_INDIGO_CLIENT_ID";
/// Environment variable for the OAuth client secret.
pub const ENV_CLIENT_SECRET: &str = "WEBARENA_INDIGO_CLIENT_SECRET";

/// Schema of the provider configuration block.
pub fn schema() -> Schema {
    Schema::v0()
        .with_description("WebARENA provider configuration")
        .with_attribute(
            "endpoint",
            Attribute::optional_string().with_description("WebARENA API endpoint"),
        )
        .with_attribute(
            "client_id",
            Attribute::optional_string()
                .sensitive()
                .with_description("WebARENA API client ID"),
        )
        .with_attribute(
            "client_secret",
            Attribute::optional_string()
                .sensitive()
                .with_description("WebARENA API client secret"),
        )
}

/// Provider configuration as written by the user.
#[derive(Clone, Default, Deserialize)]
pub struct ProviderConfig {
    /// API endpoint.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// OAuth client id.
    #[serde(default)]
    pub client_id: Option<String>,
    /// OAuth client secret.
    #[serde(default)]
    pub client_secret: Option<String>,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("ProviderConfig")
            .field("endpoint", &self.endpoint)
            .field("client_id", &redact(&self.client_id))
            .field("client_secret", &redact(&self.client_secret))
            .finish()
    }
}

impl ProviderConfig {
    /// Parse the configuration object sent by the host. `null` is an empty block.
    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(value)
    }

    /// Resolve against the process environment.
    pub fn resolve(&self) -> Result<ClientOptions, Vec<Diagnostic>> {
        self.resolve_with(|key| std::env::var(key).ok())
    }

    /// Resolve against an arbitrary environment lookup.
    ///
    /// Returns every problem at once so the user can fix them in one pass.
    pub fn resolve_with<F>(&self, env: F) -> Result<ClientOptions, Vec<Diagnostic>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let pick = |configured: &Option<String>, key: &str| {
            configured.clone().or_else(|| env(key)).unwrap_or_default()
        };

        let endpoint = pick(&self.endpoint, ENV_ENDPOINT);
        let client_id = pick(&self.client_id, ENV_CLIENT_ID);
        let client_secret = pick(&self.client_secret, ENV_CLIENT_SECRET);

        let mut diagnostics = Vec::new();

        if client_id.is_empty() {
            diagnostics.push(missing("client_id", "ClientID", ENV_CLIENT_ID));
        }
        if client_secret.is_empty() {
            diagnostics.push(missing("client_secret", "ClientSecret", ENV_CLIENT_SECRET));
        }

        let endpoint = if endpoint.is_empty() {
            DEFAULT_ENDPOINT.to_string()
        } else {
            endpoint
        };
        if let Err(err) = parse_endpoint(&endpoint) {
            diagnostics.push(
                Diagnostic::error("Invalid WebARENA API Endpoint")
                    .with_detail(format!(
                        "The provider cannot create the WebARENA API client because the endpoint is not a valid http(s) URL: {}",
                        err
                    ))
                    .with_attribute("endpoint"),
            );
        }

        if !diagnostics.is_empty() {
            return Err(diagnostics);
        }

        Ok(ClientOptions::new(client_id, client_secret).with_endpoint(endpoint))
    }
}

fn missing(attribute: &str, label: &str, env_key: &str) -> Diagnostic {
    Diagnostic::error(format!("Missing WebARENA API {}", label))
        .with_detail(format!(
            "The provider cannot create the WebARENA API client as there is a missing or empty value for the WebARENA API {attribute}. \
             Set the {attribute} value in the configuration or use the {env_key} environment variable. \
             If either is already set, ensure the value is not empty."
        ))
        .with_attribute(attribute)
}
