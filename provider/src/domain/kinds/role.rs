//! Role store roles.
//!
//! `source_rules` travels as JSON text in declarative state and as a parsed
//! [`RuleNode`] in the domain record. Drift on it is judged structurally.

use serde::{Deserialize, Deserializer, Serialize};

use super::{IdSyntax, KindSchema, ObjectKind};
use crate::domain::attributes::{
    AttributePath, DecodeError, Decoder, EncodeError, Record, RecordBuilder, Value,
};
use crate::domain::rule_tree::{self, RuleNode};

/// Attribute holding the generated principal public keys.
pub const PUBLIC_KEYS_ATTRIBUTE: &str = "principal_public_key_strings";

/// PrivX role.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Role {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub comment: String,
    pub access_group_id: String,
    pub permissions: Vec<String>,
    pub permit_agent: bool,
    #[serde(deserialize_with = "null_as_empty_tree")]
    pub source_rules: RuleNode,
    /// Server-generated principal keys; never written.
    #[serde(rename = "principal_public_key_strings", skip_serializing)]
    pub public_keys: Vec<String>,
}

fn null_as_empty_tree<'de, D: Deserializer<'de>>(deserializer: D) -> Result<RuleNode, D::Error> {
    Ok(Option::<RuleNode>::deserialize(deserializer)?.unwrap_or_default())
}

/// Marker for the role kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoleKind;

impl ObjectKind for RoleKind {
    type Record = Role;

    const SCHEMA: KindSchema = KindSchema {
        name: "role",
        id_syntax: IdSyntax::Uuid,
        computed: &["id", PUBLIC_KEYS_ATTRIBUTE],
        immutable: &[],
        sensitive: &[],
        refresh_after_write: false,
    };

    fn decode(record: &Record) -> Result<Role, DecodeError> {
        let root = AttributePath::root();
        let d = Decoder::new(record, &root);

        let access_group_id = d.required_string("access_group_id")?;
        if access_group_id.is_empty() {
            return Err(DecodeError::new(
                root.attr("access_group_id"),
                "must not be an empty string",
            ));
        }
        let rules_text = d.string_or("source_rules", rule_tree::EMPTY_RULE_TREE)?;
        let source_rules = rule_tree::parse(&rules_text)
            .map_err(|error| DecodeError::new(root.attr("source_rules"), error.to_string()))?;

        Ok(Role {
            id: d.string("id")?.known(),
            name: d.required_string("name")?,
            comment: d.string_or("comment", "")?,
            access_group_id,
            permissions: d.strings("permissions")?,
            permit_agent: d.bool_or("permit_agent", false)?,
            source_rules,
            public_keys: d.strings(PUBLIC_KEYS_ATTRIBUTE)?,
        })
    }

    fn encode(role: &Role, _prior: Option<&Record>) -> Result<Record, EncodeError> {
        let source_rules = rule_tree::serialize(&role.source_rules).map_err(|error| {
            EncodeError::new(AttributePath::root().attr("source_rules"), error.to_string())
        })?;
        Ok(RecordBuilder::new()
            .optional_string("id", role.id.as_deref())
            .string("name", role.name.as_str())
            .string("comment", role.comment.as_str())
            .string("access_group_id", role.access_group_id.as_str())
            .set("permissions", &role.permissions)
            .bool("permit_agent", role.permit_agent)
            .string("source_rules", source_rules)
            .set(PUBLIC_KEYS_ATTRIBUTE, &role.public_keys)
            .build())
    }

    fn remote_id(role: &Role) -> Option<String> {
        role.id.clone()
    }

    fn attribute_equal(attribute: &str, left: &Value, right: &Value) -> bool {
        match (attribute, left.as_str(), right.as_str()) {
            ("source_rules", Some(a), Some(b)) => rule_tree::structurally_equal(a, b),
            _ => left == right,
        }
    }
}

#[cfg(test)]
mod tests {
    //! Translator coverage for roles.

    use super::*;
    use crate::domain::rule_tree::MatchPolicy;
    use rstest::rstest;
    use serde_json::json;

    fn record(json: serde_json::Value) -> Record {
        match Value::from_json(json).expect("fixture converts") {
            Value::Object(record) => record,
            other => panic!("expected object, got {}", other.kind_name()),
        }
    }

    #[rstest]
    fn unset_rules_default_to_the_canonical_empty_group() {
        let role = RoleKind::decode(&record(json!({ "name": "ops", "access_group_id": "g" })))
            .expect("decodes");
        assert_eq!(role.source_rules, RuleNode::empty());
        assert!(!role.permit_agent);

        let encoded = RoleKind::encode(&role, None).expect("encodes");
        assert_eq!(
            encoded.get("source_rules"),
            Some(&Value::string(rule_tree::EMPTY_RULE_TREE))
        );
    }

    #[rstest]
    fn empty_access_group_id_is_rejected() {
        let err = RoleKind::decode(&record(json!({ "name": "ops", "access_group_id": "" })))
            .expect_err("empty group must fail");
        assert_eq!(err.path.to_string(), "access_group_id");
    }

    #[rstest]
    fn malformed_rules_are_reported_on_their_attribute() {
        let err = RoleKind::decode(&record(json!({
            "name": "ops",
            "access_group_id": "g",
            "source_rules": "{\"type\":\"GROUP\""
        })))
        .expect_err("truncated JSON must fail");
        assert_eq!(err.path.to_string(), "source_rules");
    }

    #[rstest]
    fn rule_drift_ignores_key_order() {
        let local = Value::string(r#"{"type":"GROUP","match":"ALL","rules":[]}"#);
        let server = Value::string(r#"{"rules":[],"type":"GROUP","match":"ALL"}"#);
        assert!(RoleKind::attribute_equal("source_rules", &local, &server));
        assert!(!RoleKind::attribute_equal("comment", &local, &server));
    }

    #[rstest]
    fn server_payload_with_null_rules_decodes() {
        let role: Role = serde_json::from_value(json!({
            "id": "r1",
            "name": "ops",
            "source_rules": null,
            "principal_public_key_strings": ["ssh-rsa AAAA"]
        }))
        .expect("deserialises");
        assert!(matches!(
            role.source_rules,
            RuleNode::Group { matching: MatchPolicy::Any, ref rules } if rules.is_empty()
        ));
        assert_eq!(role.public_keys.len(), 1);

        let body = serde_json::to_value(&role).expect("serialises");
        assert!(body.get("principal_public_key_strings").is_none());
    }
}
