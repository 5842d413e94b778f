//! Hemmer provider for WebARENA Indigo
//!
//! Manages WebARENA Indigo SSH keys through the Hemmer provider protocol:
//! a `webarena_indigo_v1_vm_sshkey` resource with create, read, update,
//! delete and import, and a data source of the same name that looks a key
//! up by its numeric id.
//!
//! # Layout
//!
//! - [`provider`]: [`WebArenaProvider`], the resource and the data source
//! - [`indigo`]: the HTTP client for the SSH key endpoints
//! - [`config`]: the provider configuration block and its environment fallback
//! - [`server`]: the [`ProviderService`] trait and the gRPC server
//! - [`schema`], [`validation`], [`types`]: schema description, configuration
//!   checks and plan types shared by the above
//!
//! # Configuration
//!
//! ```hcl
//! provider "webarena" {
//!   endpoint      = "https://api.customer.jp"   # or WEBARENA_INDIGO_ENDPOINT
//!   client_id     = "..."                       # or WEBARENA_INDIGO_CLIENT_ID
//!   client_secret = "..."                       # or WEBARENA_INDIGO_CLIENT_SECRET
//! }
//! ```
//!
//! # Handshake Protocol
//!
//! When started via [`serve`], the provider prints one line on stdout:
//!
//! ```text
//! HEMMER_PROVIDER|1|127.0.0.1:50051
//! ```
//!
//! Format: `HEMMER_PROVIDER|<protocol_version>|<address>`. Hemmer spawns the
//! provider as a subprocess and connects to that address over gRPC. Logs go
//! to stderr.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod indigo;
pub mod logging;
pub mod provider;
pub mod schema;
pub mod server;
pub mod testing;
pub mod types;
pub mod validation;

#[allow(missing_docs)]
#[allow(clippy::all)]
pub mod generated;

pub use error::ProviderError;
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use provider::{WebArenaProvider, PROVIDER_TYPE_NAME, SSHKEY_TYPE};
pub use schema::ProviderSchema;
pub use server::{
    serve, serve_on, serve_on_with_options, serve_with_options, ProviderService, ServeOptions,
};
pub use types::{
    AttributeChange, ImportedResource, PlanResult, ProviderMetadata, ServerCapabilities,
    HANDSHAKE_PREFIX, PROTOCOL_VERSION,
};
pub use validation::validate;
