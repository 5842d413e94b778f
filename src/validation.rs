//! Schema validation helpers.
//!
//! Checks a configuration object against a [`Schema`] before it reaches the
//! WebARENA API, so that user mistakes surface as diagnostics pointing at the
//! offending attribute.
//!
//! # Example
//!
//! ```
//! use hemmer_provider_webarena::schema::{Attribute, Schema};
//! use hemmer_provider_webarena::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::v0()
//!     .with_attribute("name", Attribute::required_string())
//!     .with_attribute("id", Attribute::computed_string());
//!
//! assert!(validate(&schema, &json!({"name": "deploy"})).is_empty());
//!
//! let diagnostics = validate(&schema, &json!({"name": 42}));
//! assert_eq!(diagnostics.len(), 1);
//! assert_eq!(diagnostics[0].attribute, Some("name".to_string()));
//! ```

use crate::schema::{Attribute, AttributeType, Diagnostic, Schema};
use serde_json::Value;

/// Validate a configuration object against a schema.
///
/// # Rules
///
/// - The configuration must be an object (or null, treated as empty)
/// - Required attributes must be present and non-null
/// - Values must match the attribute type; `int64` accepts integral numbers only
/// - Computed-only attributes must not be configured
/// - Attributes the schema does not declare are rejected
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let empty = serde_json::Map::new();
    let obj = match value {
        Value::Object(map) => map,
        Value::Null => &empty,
        other => {
            return vec![Diagnostic::error("Expected object")
                .with_detail(format!("Got {}", value_type_name(other)))];
        },
    };

    let mut diagnostics = Vec::new();

    for (name, attr) in &schema.attributes {
        validate_attribute(name, attr, obj.get(name), &mut diagnostics);
    }

    for name in obj.keys() {
        if !schema.attributes.contains_key(name) {
            diagnostics.push(
                Diagnostic::error(format!("Unsupported attribute '{}'", name))
                    .with_detail("An attribute with this name is not expected here")
                    .with_attribute(name.as_str()),
            );
        }
    }

    diagnostics
}

fn validate_attribute(
    name: &str,
    attr: &Attribute,
    value: Option<&Value>,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match value {
        None | Some(Value::Null) => {
            if attr.flags.required {
                diagnostics.push(
                    Diagnostic::error(format!("Missing required attribute '{}'", name))
                        .with_detail("This attribute is required and must be provided")
                        .with_attribute(name),
                );
            }
        },
        Some(_) if attr.flags.is_computed_only() => {
            diagnostics.push(
                Diagnostic::error(format!("Invalid configuration for computed attribute '{}'", name))
                    .with_detail("This attribute is set by the provider and cannot be configured")
                    .with_attribute(name),
            );
        },
        Some(v) => {
            let matches = match attr.attr_type {
                AttributeType::String => v.is_string(),
                AttributeType::Int64 => as_int64(v).is_some(),
            };
            if !matches {
                diagnostics.push(type_error(name, attr.attr_type, v));
            }
        },
    }
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Read an `int64` attribute value. Integral floats such as `900.0` are
/// accepted; fractions and values outside the `i64` range are not.
pub fn as_int64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        _ => None,
    }
}

fn type_error(path: &str, expected: AttributeType, got: &Value) -> Diagnostic {
    let expected = match expected {
        AttributeType::String => "string",
        AttributeType::Int64 => "int64",
    };
    Diagnostic::error(format!("Invalid type for attribute '{}'", path))
        .with_detail(format!("Expected {}, got {}", expected, value_type_name(got)))
        .with_attribute(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sshkey_schema() -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("name", Attribute::required_string())
            .with_attribute("sshkey", Attribute::required_string())
    }

    #[test]
    fn test_validate_required_string() {
        let schema = sshkey_schema();

        let diagnostics = validate(&schema, &json!({"name": "a", "sshkey": "ssh-ed25519 AAAA"}));
        assert!(diagnostics.is_empty());

        let diagnostics = validate(&schema, &json!({"name": "a"}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("sshkey".to_string()));
        assert!(diagnostics[0].summary.contains("Missing required attribute"));

        let diagnostics = validate(&schema, &json!({"name": null, "sshkey": "k"}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("name".to_string()));
    }

    #[test]
    fn test_validate_type_mismatch() {
        let schema = sshkey_schema();
        let diagnostics = validate(&schema, &json!({"name": 7, "sshkey": "k"}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].detail.as_deref(), Some("Expected string, got number"));
    }

    #[test]
    fn test_validate_int64() {
        let schema = Schema::v0().with_attribute("id", Attribute::required_int64());

        assert!(validate(&schema, &json!({"id": 42})).is_empty());
        assert!(validate(&schema, &json!({"id": 42.0})).is_empty());
        assert_eq!(validate(&schema, &json!({"id": 4.2})).len(), 1);
        assert_eq!(validate(&schema, &json!({"id": "42"})).len(), 1);
        assert_eq!(validate(&schema, &json!({"id": 1e19})).len(), 1);
    }

    #[test]
    fn test_as_int64() {
        assert_eq!(as_int64(&json!(900)), Some(900));
        assert_eq!(as_int64(&json!(900.0)), Some(900));
        assert_eq!(as_int64(&json!(-3.0)), Some(-3));
        assert_eq!(as_int64(&json!(i64::MAX)), Some(i64::MAX));
        assert_eq!(as_int64(&json!(u64::MAX)), None);
        assert_eq!(as_int64(&json!(0.5)), None);
        assert_eq!(as_int64(&json!("900")), None);
    }

    #[test]
    fn test_validate_computed_attribute_rejected() {
        let schema = sshkey_schema();
        let diagnostics = validate(&schema, &json!({"id": "1", "name": "a", "sshkey": "k"}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("id".to_string()));
        assert!(diagnostics[0].summary.contains("computed attribute"));
    }

    #[test]
    fn test_validate_unknown_attribute() {
        let schema = sshkey_schema();
        let diagnostics = validate(
            &schema,
            &json!({"name": "a", "sshkey": "k", "configurable_attribute": "one"}),
        );
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].attribute,
            Some("configurable_attribute".to_string())
        );
    }

    #[test]
    fn test_validate_non_object() {
        let schema = sshkey_schema();
        let diagnostics = validate(&schema, &json!(["a"]));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].summary, "Expected object");
        assert!(diagnostics[0].attribute.is_none());
    }

    #[test]
    fn test_validate_null_is_empty_object() {
        let schema = Schema::v0().with_attribute("endpoint", Attribute::optional_string());
        assert!(validate(&schema, &Value::Null).is_empty());

        let schema = sshkey_schema();
        assert_eq!(validate(&schema, &Value::Null).len(), 2);
    }
}
