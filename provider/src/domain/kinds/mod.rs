//! Object kinds and their attribute translators.
//!
//! Each kind pairs a plain domain record (mirroring the PrivX JSON payload)
//! with a zero-sized marker implementing [`ObjectKind`]. The marker carries
//! the schema flags the reconciler needs and the two translation functions.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::attributes::{
    AttributePath, DecodeError, Decoder, EncodeError, Record, RecordBuilder, Value,
};

pub mod access_group;
pub mod api_client;
pub mod host;
pub mod role;
pub mod secret;
pub mod source;
pub mod trusted_client;

pub use access_group::{AccessGroup, AccessGroupKind};
pub use api_client::{ApiClient, ApiClientKind};
pub use host::{Host, HostKind, Principal, Scheme, Service, SshPublicKey};
pub use role::{Role, RoleKind};
pub use secret::{Secret, SecretKind};
pub use source::{ExternalUserMapping, OidcConnection, Source, SourceKind};
pub use trusted_client::{CarrierKind, ClientType, ExtenderKind, TrustedClient};

/// Attribute holding the remote identifier on every kind.
pub const ID_ATTRIBUTE: &str = "id";

/// Syntax of the identifier a kind is addressed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdSyntax {
    /// Server-assigned UUID.
    Uuid,
    /// User-chosen name.
    Name,
}

impl IdSyntax {
    /// Check `id` against this syntax.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when `id` is not acceptable.
    pub fn validate(self, id: &str) -> Result<(), String> {
        match self {
            Self::Uuid => Uuid::parse_str(id)
                .map(|_| ())
                .map_err(|error| format!("expected a UUID: {error}")),
            Self::Name if id.trim().is_empty() => Err("name must not be blank".to_owned()),
            Self::Name if id.contains('/') => Err("name must not contain '/'".to_owned()),
            Self::Name => Ok(()),
        }
    }
}

/// Static schema flags of one object kind.
#[derive(Debug, Clone, Copy)]
pub struct KindSchema {
    /// Kind name used by the orchestrator.
    pub name: &'static str,
    /// How remote objects are addressed.
    pub id_syntax: IdSyntax,
    /// Attributes owned by the server; never part of the diff.
    pub computed: &'static [&'static str],
    /// Attributes stripped from desired state on update and never diffed.
    pub immutable: &'static [&'static str],
    /// Attributes redacted from diagnostics at any depth.
    pub sensitive: &'static [&'static str],
    /// Whether writes are followed by a fetch to capture server state.
    pub refresh_after_write: bool,
}

impl KindSchema {
    /// Whether `attribute` takes part in update diffs.
    pub fn is_mutable(&self, attribute: &str) -> bool {
        attribute != ID_ATTRIBUTE
            && !self.computed.contains(&attribute)
            && !self.immutable.contains(&attribute)
    }
}

/// Capabilities the generic reconciler needs from one object kind.
pub trait ObjectKind: Send + Sync + 'static {
    /// Typed domain record exchanged with the resource client.
    type Record: Clone + fmt::Debug + Send + Sync + 'static;

    /// Schema flags.
    const SCHEMA: KindSchema;

    /// Build a domain record from declarative attributes, filling defaults.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] naming the offending attribute.
    fn decode(record: &Record) -> Result<Self::Record, DecodeError>;

    /// Build declarative attributes from a domain record. Write-only values
    /// the server never echoes are carried over from `prior`.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError`] naming the offending attribute.
    fn encode(domain: &Self::Record, prior: Option<&Record>) -> Result<Record, EncodeError>;

    /// Identifier the record is addressed by, when known.
    fn remote_id(domain: &Self::Record) -> Option<String>;

    /// Drift comparison for one attribute.
    fn attribute_equal(_attribute: &str, left: &Value, right: &Value) -> bool {
        left == right
    }
}

/// Weak reference to a role: the id identifies it, the name is advisory.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleRef {
    /// Role identifier.
    pub id: String,
    /// Display name, populated by the server on reads.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
}

pub(crate) fn decode_role_refs(
    decoder: Decoder<'_>,
    name: &str,
) -> Result<Vec<RoleRef>, DecodeError> {
    decoder.objects(name, |role| {
        Ok(RoleRef {
            id: role.required_string("id")?,
            name: role.string_or("name", "")?,
        })
    })
}

/// Encode role references, keeping the last known display name for ids the
/// server returned without one.
pub(crate) fn encode_role_refs(refs: &[RoleRef], prior: Option<&Value>) -> Vec<Record> {
    refs.iter()
        .map(|role| {
            let name = if role.name.is_empty() {
                prior_role_name(prior, &role.id).unwrap_or_default()
            } else {
                role.name.clone()
            };
            RecordBuilder::new()
                .string("id", role.id.as_str())
                .string("name", name)
                .build()
        })
        .collect()
}

fn prior_role_name(prior: Option<&Value>, id: &str) -> Option<String> {
    let (Value::List(items) | Value::Set(items)) = prior? else {
        return None;
    };
    items
        .iter()
        .filter_map(Value::as_object)
        .find(|role| role.get("id").and_then(Value::as_str) == Some(id))
        .and_then(|role| role.get("name").and_then(Value::as_str))
        .map(str::to_owned)
}

/// Read a string carried in prior state, failing if it has the wrong shape.
pub(crate) fn prior_string(
    prior: Option<&Record>,
    attribute: &str,
    path: &AttributePath,
) -> Result<Option<String>, EncodeError> {
    match prior.and_then(|record| record.get(attribute)) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.clone())),
        Some(other) => Err(EncodeError::new(
            path.attr(attribute),
            format!("prior state holds {} where a string was expected", other.kind_name()),
        )),
    }
}

/// Compare two JSON texts structurally; unparsable texts compare verbatim.
pub(crate) fn json_text_equal(left: &Value, right: &Value) -> bool {
    match (left.as_str(), right.as_str()) {
        (Some(a), Some(b)) => match (
            serde_json::from_str::<serde_json::Value>(a),
            serde_json::from_str::<serde_json::Value>(b),
        ) {
            (Ok(x), Ok(y)) => x == y,
            _ => a == b,
        },
        _ => left == right,
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for shared translator helpers.

    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::uuid_ok(IdSyntax::Uuid, "0f1b6c3e-4e6a-4c49-9b53-8d5e4f8c2a11", true)]
    #[case::uuid_bad(IdSyntax::Uuid, "host-1", false)]
    #[case::name_ok(IdSyntax::Name, "db-password", true)]
    #[case::name_blank(IdSyntax::Name, "  ", false)]
    #[case::name_slash(IdSyntax::Name, "a/b", false)]
    fn id_syntax_validation(#[case] syntax: IdSyntax, #[case] id: &str, #[case] ok: bool) {
        assert_eq!(syntax.validate(id).is_ok(), ok);
    }

    #[rstest]
    fn role_ref_names_fall_back_to_prior_state() {
        let prior = Value::List(vec![Value::Object(
            RecordBuilder::new().string("id", "r1").string("name", "admins").build(),
        )]);
        let refs = vec![RoleRef {
            id: "r1".to_owned(),
            name: String::new(),
        }];
        let encoded = encode_role_refs(&refs, Some(&prior));
        assert_eq!(encoded[0].get("name"), Some(&Value::string("admins")));
    }

    #[rstest]
    fn json_texts_compare_structurally() {
        assert!(json_text_equal(
            &Value::string(r#"{"a":1,"b":[2]}"#),
            &Value::string(r#"{ "b": [2], "a": 1 }"#),
        ));
        assert!(!json_text_equal(&Value::string("{}"), &Value::string(r#"{"a":1}"#)));
    }
}
