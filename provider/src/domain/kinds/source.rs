//! Identity sources backed by an OIDC connection.

use serde::{Deserialize, Serialize};

use super::{IdSyntax, KindSchema, ObjectKind, prior_string};
use crate::domain::attributes::{
    AttributePath, DecodeError, Decoder, EncodeError, Record, RecordBuilder,
};

/// Session TTL in seconds applied when none is declared.
pub const DEFAULT_TTL_SECONDS: u32 = 900;

/// Mask the server returns in place of the OIDC client secret.
pub const SECRET_MASK: &str = "*****";

const CONNECTION_TYPE: &str = "OIDC";

/// Mapping of users onto another source's attribute.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExternalUserMapping {
    pub source_id: String,
    pub source_search_field: String,
}

/// OIDC connection settings of a source.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OidcConnection {
    #[serde(rename = "type")]
    pub connection_type: String,
    pub address: String,
    pub oidc_enabled: bool,
    pub oidc_issuer: String,
    pub oidc_button_title: String,
    pub oidc_client_id: String,
    /// Write-only; echoed back as [`SECRET_MASK`].
    pub oidc_client_secret: String,
    pub oidc_tags_attribute_name: String,
    pub oidc_additional_scopes: Vec<String>,
}

/// PrivX identity source.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Source {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub comment: String,
    pub ttl: u32,
    pub enabled: bool,
    pub tags: Vec<String>,
    pub username_pattern: Vec<String>,
    pub external_user_mapping: Vec<ExternalUserMapping>,
    pub connection: OidcConnection,
}

/// Marker for the source kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceKind;

impl ObjectKind for SourceKind {
    type Record = Source;

    const SCHEMA: KindSchema = KindSchema {
        name: "source",
        id_syntax: IdSyntax::Uuid,
        computed: &["id"],
        immutable: &[],
        sensitive: &["client_secret"],
        refresh_after_write: false,
    };

    fn decode(record: &Record) -> Result<Source, DecodeError> {
        let root = AttributePath::root();
        let d = Decoder::new(record, &root);
        let connection = d
            .object("oidc_connection", decode_connection)?
            .ok_or_else(|| {
                DecodeError::new(root.attr("oidc_connection"), "required attribute is not set")
            })?;

        Ok(Source {
            id: d.string("id")?.known(),
            name: d.required_string("name")?,
            comment: d.string_or("comment", "")?,
            ttl: d.int_in("ttl", DEFAULT_TTL_SECONDS)?,
            enabled: d.bool_or("enabled", false)?,
            tags: d.strings("tags")?,
            username_pattern: d.strings("username_pattern")?,
            external_user_mapping: d.objects("external_user_mapping", |mapping| {
                Ok(ExternalUserMapping {
                    source_id: mapping.required_string("source_id")?,
                    source_search_field: mapping.required_string("source_search_field")?,
                })
            })?,
            connection,
        })
    }

    fn encode(source: &Source, prior: Option<&Record>) -> Result<Record, EncodeError> {
        let connection_path = AttributePath::root().attr("oidc_connection");
        let prior_connection = prior
            .and_then(|record| record.get("oidc_connection"))
            .and_then(|value| value.as_object());
        let secret = &source.connection.oidc_client_secret;
        let client_secret = if secret.is_empty() || secret == SECRET_MASK {
            prior_string(prior_connection, "client_secret", &connection_path)?
                .unwrap_or_else(|| secret.clone())
        } else {
            secret.clone()
        };

        let connection = RecordBuilder::new()
            .string("address", source.connection.address.as_str())
            .bool("enabled", source.connection.oidc_enabled)
            .string("issuer", source.connection.oidc_issuer.as_str())
            .string("button_title", source.connection.oidc_button_title.as_str())
            .string("client_id", source.connection.oidc_client_id.as_str())
            .string("client_secret", client_secret)
            .string(
                "tags_attribute_name",
                source.connection.oidc_tags_attribute_name.as_str(),
            )
            .list(
                "additional_scopes_secret",
                &source.connection.oidc_additional_scopes,
            )
            .build();

        let mappings = source
            .external_user_mapping
            .iter()
            .map(|mapping| {
                RecordBuilder::new()
                    .string("source_id", mapping.source_id.as_str())
                    .string("source_search_field", mapping.source_search_field.as_str())
                    .build()
            })
            .collect();

        Ok(RecordBuilder::new()
            .optional_string("id", source.id.as_deref())
            .string("name", source.name.as_str())
            .string("comment", source.comment.as_str())
            .int("ttl", source.ttl)
            .bool("enabled", source.enabled)
            .list("tags", &source.tags)
            .list("username_pattern", &source.username_pattern)
            .objects("external_user_mapping", mappings)
            .object("oidc_connection", Some(connection))
            .build())
    }

    fn remote_id(source: &Source) -> Option<String> {
        source.id.clone()
    }
}

fn decode_connection(connection: Decoder<'_>) -> Result<OidcConnection, DecodeError> {
    Ok(OidcConnection {
        connection_type: CONNECTION_TYPE.to_owned(),
        address: connection.string_or("address", "")?,
        oidc_enabled: connection.bool_or("enabled", false)?,
        oidc_issuer: connection.string_or("issuer", "")?,
        oidc_button_title: connection.string_or("button_title", "")?,
        oidc_client_id: connection.string_or("client_id", "")?,
        oidc_client_secret: connection.string_or("client_secret", "")?,
        oidc_tags_attribute_name: connection.string_or("tags_attribute_name", "")?,
        oidc_additional_scopes: connection.strings("additional_scopes_secret")?,
    })
}

#[cfg(test)]
mod tests {
    //! Translator coverage for identity sources.

    use super::*;
    use crate::domain::attributes::Value;
    use rstest::rstest;
    use serde_json::json;

    fn declared() -> Record {
        match Value::from_json(json!({
            "name": "corp-oidc",
            "tags": ["b", "a"],
            "oidc_connection": {
                "address": "https://idp.example.com",
                "enabled": true,
                "client_id": "privx",
                "client_secret": "s3cret",
                "additional_scopes_secret": ["email"]
            }
        }))
        .expect("fixture converts")
        {
            Value::Object(record) => record,
            other => panic!("expected object, got {}", other.kind_name()),
        }
    }

    #[rstest]
    fn ttl_defaults_and_connection_type_is_oidc() {
        let source = SourceKind::decode(&declared()).expect("decodes");
        assert_eq!(source.ttl, DEFAULT_TTL_SECONDS);
        assert_eq!(source.connection.connection_type, "OIDC");
        assert_eq!(source.tags, vec!["b".to_owned(), "a".to_owned()]);
    }

    #[rstest]
    fn masked_client_secret_keeps_the_prior_value() {
        let prior = declared();
        let mut from_server = SourceKind::decode(&prior).expect("decodes");
        from_server.connection.oidc_client_secret = SECRET_MASK.to_owned();

        let encoded = SourceKind::encode(&from_server, Some(&prior)).expect("encodes");
        let secret = encoded
            .get("oidc_connection")
            .and_then(Value::as_object)
            .and_then(|connection| connection.get("client_secret"))
            .cloned();
        assert_eq!(secret, Some(Value::string("s3cret")));
    }

    #[rstest]
    fn missing_connection_is_a_decode_error() {
        let mut record = declared();
        record.remove("oidc_connection");
        let err = SourceKind::decode(&record).expect_err("connection required");
        assert_eq!(err.path.to_string(), "oidc_connection");
    }

    #[rstest]
    fn prior_secret_of_the_wrong_shape_is_an_encode_error() {
        let mut prior = declared();
        prior.insert(
            "oidc_connection",
            Value::Object(RecordBuilder::new().int("client_secret", 5).build()),
        );
        let mut from_server = SourceKind::decode(&declared()).expect("decodes");
        from_server.connection.oidc_client_secret = SECRET_MASK.to_owned();

        let err = SourceKind::encode(&from_server, Some(&prior)).expect_err("int secret");
        assert_eq!(err.path.to_string(), "oidc_connection.client_secret");
    }
}
