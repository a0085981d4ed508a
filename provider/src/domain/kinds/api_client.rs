//! API clients. The server generates their credentials on creation.

use serde::{Deserialize, Serialize};

use super::{IdSyntax, KindSchema, ObjectKind, RoleRef, decode_role_refs, encode_role_refs};
use crate::domain::attributes::{
    AttributePath, DecodeError, Decoder, EncodeError, Record, RecordBuilder,
};

/// PrivX API client.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiClient {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub roles: Vec<RoleRef>,
    #[serde(skip_serializing)]
    pub secret: String,
    #[serde(skip_serializing)]
    pub oauth_client_id: String,
    #[serde(skip_serializing)]
    pub oauth_client_secret: String,
}

const GENERATED: &[&str] = &["secret", "oauth_client_id", "oauth_client_secret"];

/// Marker for the API client kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiClientKind;

impl ObjectKind for ApiClientKind {
    type Record = ApiClient;

    const SCHEMA: KindSchema = KindSchema {
        name: "api_client",
        id_syntax: IdSyntax::Uuid,
        computed: &["id"],
        immutable: GENERATED,
        sensitive: &["secret", "oauth_client_secret"],
        refresh_after_write: true,
    };

    fn decode(record: &Record) -> Result<ApiClient, DecodeError> {
        let root = AttributePath::root();
        let d = Decoder::new(record, &root);
        Ok(ApiClient {
            id: d.string("id")?.known(),
            name: d.required_string("name")?,
            roles: decode_role_refs(d, "roles")?,
            secret: d.string_or("secret", "")?,
            oauth_client_id: d.string_or("oauth_client_id", "")?,
            oauth_client_secret: d.string_or("oauth_client_secret", "")?,
        })
    }

    fn encode(client: &ApiClient, prior: Option<&Record>) -> Result<Record, EncodeError> {
        let prior_roles = prior.and_then(|record| record.get("roles"));
        Ok(RecordBuilder::new()
            .optional_string("id", client.id.as_deref())
            .string("name", client.name.as_str())
            .objects("roles", encode_role_refs(&client.roles, prior_roles))
            .string("secret", client.secret.as_str())
            .string("oauth_client_id", client.oauth_client_id.as_str())
            .string("oauth_client_secret", client.oauth_client_secret.as_str())
            .build())
    }

    fn remote_id(client: &ApiClient) -> Option<String> {
        client.id.clone()
    }
}
