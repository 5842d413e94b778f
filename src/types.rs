//! Plan, import and metadata types exchanged with the host.
//!
//! These wrap the raw protobuf messages with `serde_json::Value` payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A change to a single attribute during a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeChange {
    /// Name of the attribute that changed.
    pub path: String,
    /// Value before the change; `None` when creating.
    pub before: Option<Value>,
    /// Value after the change; `None` when destroying.
    pub after: Option<Value>,
}

impl AttributeChange {
    /// Create a change for an attribute that gains a value.
    pub fn added(path: impl Into<String>, value: Value) -> Self {
        Self {
            path: path.into(),
            before: None,
            after: Some(value),
        }
    }

    /// Create a change for an attribute that loses its value.
    pub fn removed(path: impl Into<String>, value: Value) -> Self {
        Self {
            path: path.into(),
            before: Some(value),
            after: None,
        }
    }

    /// Create a change for a modified attribute.
    pub fn modified(path: impl Into<String>, before: Value, after: Value) -> Self {
        Self {
            path: path.into(),
            before: Some(before),
            after: Some(after),
        }
    }
}

fn decode_optional(bytes: &[u8]) -> Option<Value> {
    if bytes.is_empty() {
        None
    } else {
        serde_json::from_slice(bytes).ok()
    }
}

fn encode_optional(value: Option<&Value>) -> Vec<u8> {
    value
        .and_then(|v| serde_json::to_vec(v).ok())
        .unwrap_or_default()
}

impl From<crate::generated::AttributeChange> for AttributeChange {
    fn from(proto: crate::generated::AttributeChange) -> Self {
        Self {
            before: decode_optional(&proto.before),
            after: decode_optional(&proto.after),
            path: proto.path,
        }
    }
}

impl From<AttributeChange> for crate::generated::AttributeChange {
    fn from(change: AttributeChange) -> Self {
        Self {
            before: encode_optional(change.before.as_ref()),
            after: encode_optional(change.after.as_ref()),
            path: change.path,
        }
    }
}

/// The result of a plan operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResult {
    /// The state the resource will have once the plan is applied.
    /// Attributes the provider only learns after applying are `null`.
    pub planned_state: Value,
    /// The attribute changes.
    pub changes: Vec<AttributeChange>,
    /// Whether the resource must be destroyed and recreated.
    pub requires_replace: bool,
}

impl PlanResult {
    /// A plan with no changes.
    pub fn no_change(state: Value) -> Self {
        Self {
            planned_state: state,
            changes: Vec::new(),
            requires_replace: false,
        }
    }

    /// A plan with changes that can be applied in place.
    pub fn in_place(planned_state: Value, changes: Vec<AttributeChange>) -> Self {
        Self {
            planned_state,
            changes,
            requires_replace: false,
        }
    }

    /// Whether applying this plan changes anything.
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }
}

/// A resource produced by an import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedResource {
    /// The resource type.
    pub resource_type: String,
    /// The imported state.
    pub state: Value,
}

impl ImportedResource {
    /// Create a new imported resource.
    pub fn new(resource_type: impl Into<String>, state: Value) -> Self {
        Self {
            resource_type: resource_type.into(),
            state,
        }
    }
}

/// Provider metadata returned by GetMetadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProviderMetadata {
    /// Resource type names.
    pub resources: Vec<String>,
    /// Data source type names.
    pub data_sources: Vec<String>,
    /// Server capabilities.
    pub capabilities: ServerCapabilities,
}

/// Server capability flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ServerCapabilities {
    /// Whether the provider plans destroy operations.
    pub plan_destroy: bool,
}

/// The protocol version announced in the handshake.
pub const PROTOCOL_VERSION: u32 = 1;

/// The handshake prefix printed on stdout.
pub const HANDSHAKE_PREFIX: &str = "HEMMER_PROVIDER";

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_attribute_change_constructors() {
        let added = AttributeChange::added("name", json!("deploy"));
        assert!(added.before.is_none());
        assert_eq!(added.after, Some(json!("deploy")));

        let removed = AttributeChange::removed("name", json!("deploy"));
        assert_eq!(removed.before, Some(json!("deploy")));
        assert!(removed.after.is_none());

        let modified = AttributeChange::modified("sshkey", json!("old"), json!("new"));
        assert_eq!(modified.before, Some(json!("old")));
        assert_eq!(modified.after, Some(json!("new")));
    }

    #[test]
    fn test_attribute_change_to_proto_and_back() {
        let change = AttributeChange::added("user_id", json!(12));
        let proto: crate::generated::AttributeChange = change.clone().into();
        assert_eq!(proto.path, "user_id");
        assert!(proto.before.is_empty());
        assert_eq!(proto.after, b"12");

        let back: AttributeChange = proto.into();
        assert_eq!(back, change);
    }

    #[test]
    fn test_plan_result() {
        let plan = PlanResult::no_change(json!({"id": "1"}));
        assert!(!plan.has_changes());
        assert!(!plan.requires_replace);

        let plan = PlanResult::in_place(
            json!({"id": "1", "name": "new"}),
            vec![AttributeChange::modified("name", json!("old"), json!("new"))],
        );
        assert!(plan.has_changes());
        assert!(!plan.requires_replace);
    }

    #[test]
    fn test_imported_resource() {
        let imported = ImportedResource::new("webarena_indigo_v1_vm_sshkey", json!({"id": "7"}));
        assert_eq!(imported.resource_type, "webarena_indigo_v1_vm_sshkey");
        assert_eq!(imported.state["id"], "7");
    }

    #[test]
    fn test_protocol_constants() {
        assert_eq!(PROTOCOL_VERSION, 1);
        assert_eq!(HANDSHAKE_PREFIX, "HEMMER_PROVIDER");
    }
}
