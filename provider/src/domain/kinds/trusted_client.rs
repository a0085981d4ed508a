//! Trusted network clients: extenders and carriers.
//!
//! Both kinds share one remote collection and one record type; the marker
//! decides which attributes are exposed and which permissions are sent.

use serde::{Deserialize, Serialize};

use super::{IdSyntax, KindSchema, ObjectKind};
use crate::domain::attributes::{
    AttributePath, DecodeError, Decoder, EncodeError, Record, RecordBuilder,
};

/// Permission the platform requires on every carrier.
pub const CARRIER_PERMISSION: &str = "privx-carrier";

/// Trusted client flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ClientType {
    /// Network extender.
    #[default]
    Extender,
    /// Web-access carrier.
    Carrier,
    /// Web proxy.
    Icap,
}

impl ClientType {
    /// Wire name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Extender => "EXTENDER",
            Self::Carrier => "CARRIER",
            Self::Icap => "ICAP",
        }
    }
}

/// PrivX trusted client.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustedClient {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub client_type: ClientType,
    pub name: String,
    pub enabled: bool,
    pub permissions: Vec<String>,
    pub routing_prefix: String,
    pub web_proxy_address: String,
    pub web_proxy_port: u16,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub web_proxy_extender_route_patterns: Vec<String>,
    pub extender_address: Vec<String>,
    pub subnets: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub access_group_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub group_id: String,
    #[serde(skip_serializing)]
    pub registered: bool,
}

fn decode_common(d: Decoder<'_>, client_type: ClientType) -> Result<TrustedClient, DecodeError> {
    Ok(TrustedClient {
        id: d.string("id")?.known(),
        client_type,
        name: d.required_string("name")?,
        enabled: d.bool_or("enabled", false)?,
        permissions: Vec::new(),
        routing_prefix: d.string_or("routing_prefix", "")?,
        web_proxy_address: d.string_or("web_proxy_address", "")?,
        web_proxy_port: d.int_in("web_proxy_port", 0_u16)?,
        web_proxy_extender_route_patterns: Vec::new(),
        extender_address: d.strings("extender_address")?,
        subnets: d.strings("subnets")?,
        access_group_id: d.string_or("access_group_id", "")?,
        group_id: String::new(),
        registered: d.bool_or("registered", false)?,
    })
}

fn encode_common(client: &TrustedClient) -> RecordBuilder {
    RecordBuilder::new()
        .optional_string("id", client.id.as_deref())
        .string("name", client.name.as_str())
        .bool("enabled", client.enabled)
        .list("permissions", &client.permissions)
        .string("routing_prefix", client.routing_prefix.as_str())
        .string("web_proxy_address", client.web_proxy_address.as_str())
        .int("web_proxy_port", client.web_proxy_port)
        .list("extender_address", &client.extender_address)
        .list("subnets", &client.subnets)
        .string("access_group_id", client.access_group_id.as_str())
        .bool("registered", client.registered)
}

/// Marker for the extender kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtenderKind;

impl ObjectKind for ExtenderKind {
    type Record = TrustedClient;

    const SCHEMA: KindSchema = KindSchema {
        name: "extender",
        id_syntax: IdSyntax::Uuid,
        computed: &["id", "permissions", "registered"],
        immutable: &[],
        sensitive: &[],
        refresh_after_write: true,
    };

    fn decode(record: &Record) -> Result<TrustedClient, DecodeError> {
        let root = AttributePath::root();
        let d = Decoder::new(record, &root);
        let mut client = decode_common(d, ClientType::Extender)?;
        client.permissions = d.strings("permissions")?;
        Ok(client)
    }

    fn encode(client: &TrustedClient, _prior: Option<&Record>) -> Result<Record, EncodeError> {
        Ok(encode_common(client).build())
    }

    fn remote_id(client: &TrustedClient) -> Option<String> {
        client.id.clone()
    }
}

/// Marker for the carrier kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct CarrierKind;

impl ObjectKind for CarrierKind {
    type Record = TrustedClient;

    const SCHEMA: KindSchema = KindSchema {
        name: "carrier",
        id_syntax: IdSyntax::Uuid,
        computed: &["id", "permissions", "registered"],
        immutable: &["type"],
        sensitive: &[],
        refresh_after_write: true,
    };

    fn decode(record: &Record) -> Result<TrustedClient, DecodeError> {
        let root = AttributePath::root();
        let d = Decoder::new(record, &root);
        let declared_type = d.string_or("type", ClientType::Carrier.as_str())?;
        if declared_type != ClientType::Carrier.as_str() {
            return Err(DecodeError::new(
                root.attr("type"),
                format!("carrier type must be CARRIER, found '{declared_type}'"),
            ));
        }
        let mut client = decode_common(d, ClientType::Carrier)?;
        client.permissions = vec![CARRIER_PERMISSION.to_owned()];
        client.web_proxy_extender_route_patterns =
            d.strings("web_proxy_extender_route_patterns")?;
        client.group_id = d.string_or("group_id", "")?;
        Ok(client)
    }

    fn encode(client: &TrustedClient, _prior: Option<&Record>) -> Result<Record, EncodeError> {
        Ok(encode_common(client)
            .string("type", client.client_type.as_str())
            .list(
                "web_proxy_extender_route_patterns",
                &client.web_proxy_extender_route_patterns,
            )
            .string("group_id", client.group_id.as_str())
            .build())
    }

    fn remote_id(client: &TrustedClient) -> Option<String> {
        client.id.clone()
    }
}
