//! Vault secrets. A secret has no separate id: its name addresses it.

use serde::{Deserialize, Serialize};

use super::{
    IdSyntax, KindSchema, ObjectKind, RoleRef, decode_role_refs, encode_role_refs, json_text_equal,
};
use crate::domain::attributes::{
    AttributePath, DecodeError, Decoder, EncodeError, Record, RecordBuilder, Value,
};

/// Secret payload applied when none is declared.
pub const EMPTY_DATA: &str = "{}";

/// PrivX vault secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Secret {
    pub name: String,
    pub data: serde_json::Value,
    pub read_roles: Vec<RoleRef>,
    pub write_roles: Vec<RoleRef>,
}

impl Default for Secret {
    fn default() -> Self {
        Self {
            name: String::new(),
            data: serde_json::Value::Object(serde_json::Map::new()),
            read_roles: Vec::new(),
            write_roles: Vec::new(),
        }
    }
}

/// Marker for the secret kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecretKind;

impl ObjectKind for SecretKind {
    type Record = Secret;

    const SCHEMA: KindSchema = KindSchema {
        name: "secret",
        id_syntax: IdSyntax::Name,
        computed: &["id"],
        immutable: &[],
        sensitive: &["data"],
        refresh_after_write: false,
    };

    fn decode(record: &Record) -> Result<Secret, DecodeError> {
        let root = AttributePath::root();
        let d = Decoder::new(record, &root);
        let data_text = d.string_or("data", EMPTY_DATA)?;
        // Sensitive payload: report the position only.
        let data = serde_json::from_str(&data_text).map_err(|error| {
            DecodeError::new(
                root.attr("data"),
                format!("not valid JSON (line {}, column {})", error.line(), error.column()),
            )
        })?;

        Ok(Secret {
            name: d.required_string("name")?,
            data,
            read_roles: decode_role_refs(d, "read_roles")?,
            write_roles: decode_role_refs(d, "write_roles")?,
        })
    }

    fn encode(secret: &Secret, prior: Option<&Record>) -> Result<Record, EncodeError> {
        let data = serde_json::to_string(&secret.data).map_err(|error| {
            EncodeError::new(AttributePath::root().attr("data"), error.to_string())
        })?;
        let prior_roles = |name: &str| prior.and_then(|record| record.get(name));

        Ok(RecordBuilder::new()
            .string("id", secret.name.as_str())
            .string("name", secret.name.as_str())
            .string("data", data)
            .objects("read_roles", encode_role_refs(&secret.read_roles, prior_roles("read_roles")))
            .objects(
                "write_roles",
                encode_role_refs(&secret.write_roles, prior_roles("write_roles")),
            )
            .build())
    }

    fn remote_id(secret: &Secret) -> Option<String> {
        Some(secret.name.clone()).filter(|name| !name.is_empty())
    }

    fn attribute_equal(attribute: &str, left: &Value, right: &Value) -> bool {
        if attribute == "data" {
            json_text_equal(left, right)
        } else {
            left == right
        }
    }
}
