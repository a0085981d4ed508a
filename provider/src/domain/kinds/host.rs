//! Host store objects.

use serde::{Deserialize, Serialize};

use super::{
    IdSyntax, KindSchema, ObjectKind, RoleRef, decode_role_refs, encode_role_refs, prior_string,
};
use crate::domain::attributes::{
    AttributePath, DecodeError, Decoder, EncodeError, Record, RecordBuilder, Value,
};

/// Connection scheme of a host service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Scheme {
    /// Secure shell.
    #[default]
    Ssh,
    /// Remote desktop.
    Rdp,
    /// VNC remote framebuffer.
    Vnc,
    /// Plain web.
    Http,
    /// TLS web.
    Https,
}

impl Scheme {
    const ALL: [Self; 5] = [Self::Ssh, Self::Rdp, Self::Vnc, Self::Http, Self::Https];

    /// Wire name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ssh => "SSH",
            Self::Rdp => "RDP",
            Self::Vnc => "VNC",
            Self::Http => "HTTP",
            Self::Https => "HTTPS",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|scheme| scheme.as_str() == value)
    }
}

/// A reachable service on the host.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Service {
    /// Connection scheme.
    #[serde(rename = "service")]
    pub scheme: Scheme,
    /// Address the service listens on.
    pub address: String,
    /// Port the service listens on.
    pub port: u16,
}

/// A target account on the host.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Principal {
    /// Account name.
    #[serde(rename = "principal")]
    pub id: String,
    /// Roles granted access to this account.
    pub roles: Vec<RoleRef>,
    /// Connect as the requesting user's own account.
    pub use_user_account: bool,
    /// Write-only account passphrase; the server never echoes it.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub passphrase: String,
    /// Applications allowed for this account.
    pub applications: Vec<String>,
}

/// A known SSH host key.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SshPublicKey {
    /// Key in OpenSSH format.
    pub key: String,
}

/// PrivX host.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Host {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub access_group_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub external_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub instance_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub source_id: String,
    #[serde(rename = "common_name")]
    pub name: String,
    pub contact_address: String,
    pub cloud_provider: String,
    pub cloud_provider_region: String,
    pub distinguished_name: String,
    pub organization: String,
    pub organizational_unit: String,
    pub zone: String,
    pub host_type: String,
    pub host_classification: String,
    pub comment: String,
    pub tofu: bool,
    #[serde(rename = "stand_alone_host")]
    pub stand_alone: bool,
    #[serde(rename = "audit_enabled")]
    pub audit: bool,
    pub scope: Vec<String>,
    pub tags: Vec<String>,
    pub addresses: Vec<String>,
    pub services: Vec<Service>,
    pub principals: Vec<Principal>,
    #[serde(rename = "ssh_host_public_keys")]
    pub public_keys: Vec<SshPublicKey>,
}

/// Marker for the host kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostKind;

impl ObjectKind for HostKind {
    type Record = Host;

    const SCHEMA: KindSchema = KindSchema {
        name: "host",
        id_syntax: IdSyntax::Uuid,
        computed: &["id"],
        immutable: &[],
        sensitive: &["passphrase"],
        refresh_after_write: false,
    };

    fn decode(record: &Record) -> Result<Host, DecodeError> {
        let root = AttributePath::root();
        let d = Decoder::new(record, &root);
        let text = |name: &str| d.string_or(name, "");

        Ok(Host {
            id: d.string("id")?.known(),
            access_group_id: text("access_group_id")?,
            external_id: text("external_id")?,
            instance_id: text("instance_id")?,
            source_id: text("source_id")?,
            name: d.required_string("common_name")?,
            contact_address: text("contact_address")?,
            cloud_provider: text("cloud_provider")?,
            cloud_provider_region: text("cloud_provider_region")?,
            distinguished_name: text("distinguished_name")?,
            organization: text("organization")?,
            organizational_unit: text("organizational_unit")?,
            zone: text("zone")?,
            host_type: text("host_type")?,
            host_classification: text("host_classification")?,
            comment: text("comment")?,
            tofu: d.bool_or("tofu", false)?,
            stand_alone: d.bool_or("stand_alone_host", false)?,
            audit: d.bool_or("audit_enabled", false)?,
            scope: d.strings("scope")?,
            tags: d.strings("tags")?,
            addresses: d.strings("addresses")?,
            services: d.objects("services", decode_service)?,
            principals: d.objects("principals", decode_principal)?,
            public_keys: d.objects("ssh_host_public_keys", |key| {
                Ok(SshPublicKey {
                    key: key.required_string("key")?,
                })
            })?,
        })
    }

    fn encode(host: &Host, prior: Option<&Record>) -> Result<Record, EncodeError> {
        let prior_principals = prior.and_then(|record| record.get("principals"));
        let principals = host
            .principals
            .iter()
            .enumerate()
            .map(|(index, principal)| encode_principal(principal, index, prior_principals))
            .collect::<Result<Vec<_>, _>>()?;

        let services = host
            .services
            .iter()
            .map(|service| {
                RecordBuilder::new()
                    .string("service", service.scheme.as_str())
                    .string("address", service.address.as_str())
                    .int("port", service.port)
                    .build()
            })
            .collect();

        let public_keys = host
            .public_keys
            .iter()
            .map(|key| RecordBuilder::new().string("key", key.key.as_str()).build())
            .collect();

        Ok(RecordBuilder::new()
            .optional_string("id", host.id.as_deref())
            .string("access_group_id", host.access_group_id.as_str())
            .string("external_id", host.external_id.as_str())
            .string("instance_id", host.instance_id.as_str())
            .string("source_id", host.source_id.as_str())
            .string("common_name", host.name.as_str())
            .string("contact_address", host.contact_address.as_str())
            .string("cloud_provider", host.cloud_provider.as_str())
            .string("cloud_provider_region", host.cloud_provider_region.as_str())
            .string("distinguished_name", host.distinguished_name.as_str())
            .string("organization", host.organization.as_str())
            .string("organizational_unit", host.organizational_unit.as_str())
            .string("zone", host.zone.as_str())
            .string("host_type", host.host_type.as_str())
            .string("host_classification", host.host_classification.as_str())
            .string("comment", host.comment.as_str())
            .bool("tofu", host.tofu)
            .bool("stand_alone_host", host.stand_alone)
            .bool("audit_enabled", host.audit)
            .set("scope", &host.scope)
            .set("tags", &host.tags)
            .set("addresses", &host.addresses)
            .objects("services", services)
            .objects("principals", principals)
            .objects("ssh_host_public_keys", public_keys)
            .build())
    }

    fn remote_id(host: &Host) -> Option<String> {
        host.id.clone()
    }
}

fn decode_service(service: Decoder<'_>) -> Result<Service, DecodeError> {
    let scheme_text = service.required_string("service")?;
    let scheme = Scheme::parse(&scheme_text).ok_or_else(|| {
        DecodeError::new(
            service.path().attr("service"),
            format!("'{scheme_text}' is not one of SSH, RDP, VNC, HTTP, HTTPS"),
        )
    })?;
    Ok(Service {
        scheme,
        address: service.required_string("address")?,
        port: service.int_in("port", 0_u16)?,
    })
}

fn decode_principal(principal: Decoder<'_>) -> Result<Principal, DecodeError> {
    Ok(Principal {
        id: principal.required_string("principal")?,
        roles: decode_role_refs(principal, "roles")?,
        use_user_account: principal.bool_or("use_user_account", false)?,
        passphrase: principal.string_or("passphrase", "")?,
        applications: principal.strings("applications")?,
    })
}

fn encode_principal(
    principal: &Principal,
    index: usize,
    prior_principals: Option<&Value>,
) -> Result<Record, EncodeError> {
    let path = AttributePath::root().attr("principals").index(index);
    let prior = find_prior_principal(prior_principals, &principal.id);
    let passphrase = if principal.passphrase.is_empty() {
        prior_string(prior, "passphrase", &path)?.unwrap_or_default()
    } else {
        principal.passphrase.clone()
    };
    let prior_roles = prior.and_then(|record| record.get("roles"));

    Ok(RecordBuilder::new()
        .string("principal", principal.id.as_str())
        .objects("roles", encode_role_refs(&principal.roles, prior_roles))
        .bool("use_user_account", principal.use_user_account)
        .string("passphrase", passphrase)
        .list("applications", &principal.applications)
        .build())
}

fn find_prior_principal<'a>(prior: Option<&'a Value>, id: &str) -> Option<&'a Record> {
    let Value::List(items) = prior? else {
        return None;
    };
    items
        .iter()
        .filter_map(Value::as_object)
        .find(|record| record.get("principal").and_then(Value::as_str) == Some(id))
}

#[cfg(test)]
mod tests {
    //! Translator coverage for hosts.

    use super::*;
    use rstest::{fixture, rstest};
    use serde_json::json;

    fn record(json: serde_json::Value) -> Record {
        match Value::from_json(json).expect("fixture converts") {
            Value::Object(record) => record,
            other => panic!("expected object, got {}", other.kind_name()),
        }
    }

    #[fixture]
    fn declared() -> Record {
        record(json!({
            "common_name": "db-01",
            "addresses": ["10.0.0.1"],
            "services": [
                { "service": "SSH", "address": "10.0.0.1", "port": 22 },
                { "service": "RDP", "address": "10.0.0.1", "port": 3389 }
            ],
            "principals": [
                {
                    "principal": "root",
                    "use_user_account": true,
                    "passphrase": "hunter2",
                    "roles": [{ "id": "r-1", "name": "admins" }],
                    "applications": ["bash"]
                }
            ]
        }))
    }

    #[rstest]
    fn decodes_services_and_principals(declared: Record) {
        let host = HostKind::decode(&declared).expect("decodes");

        assert_eq!(
            host.services[0],
            Service {
                scheme: Scheme::Ssh,
                address: "10.0.0.1".to_owned(),
                port: 22,
            }
        );
        assert_eq!(host.principals.len(), 1);
        assert!(host.principals[0].use_user_account);
        assert_eq!(host.comment, "");
        assert!(!host.tofu);
        assert!(host.tags.is_empty());
    }

    #[rstest]
    fn re_encoding_preserves_list_order(declared: Record) {
        let host = HostKind::decode(&declared).expect("decodes");
        let encoded = HostKind::encode(&host, None).expect("encodes");
        let Some(Value::List(services)) = encoded.get("services") else {
            panic!("services must be a list");
        };
        let ports: Vec<_> = services
            .iter()
            .filter_map(Value::as_object)
            .filter_map(|service| service.get("port").cloned())
            .collect();
        assert_eq!(ports, vec![Value::Int(22), Value::Int(3389)]);
    }

    #[rstest]
    fn domain_round_trip_is_lossless(declared: Record) {
        let host = HostKind::decode(&declared).expect("decodes");
        let again = HostKind::decode(&HostKind::encode(&host, None).expect("encodes"))
            .expect("decodes again");
        assert_eq!(again, host);
    }

    #[rstest]
    fn passphrase_is_carried_from_prior_state(declared: Record) {
        let mut from_server = HostKind::decode(&declared).expect("decodes");
        from_server.principals[0].passphrase.clear();

        let encoded = HostKind::encode(&from_server, Some(&declared)).expect("encodes");
        let passphrase = match encoded.get("principals") {
            Some(Value::List(items)) => items[0]
                .as_object()
                .and_then(|p| p.get("passphrase"))
                .cloned(),
            _ => None,
        };
        assert_eq!(passphrase, Some(Value::string("hunter2")));
    }

    #[rstest]
    fn unknown_scheme_names_the_attribute() {
        let rec = record(json!({
            "common_name": "x",
            "services": [{ "service": "FTP", "address": "a", "port": 21 }]
        }));
        let err = HostKind::decode(&rec).expect_err("FTP is unsupported");
        assert_eq!(err.path.to_string(), "services[0].service");
    }

    #[rstest]
    fn missing_common_name_is_a_decode_error() {
        let err = HostKind::decode(&Record::new()).expect_err("name required");
        assert_eq!(err.path.to_string(), "common_name");
    }

    #[rstest]
    fn empty_collections_stay_empty_in_json() {
        let host = HostKind::decode(&record(json!({ "common_name": "x" }))).expect("decodes");
        let payload = serde_json::to_value(&host).expect("serialises");
        assert_eq!(payload["tags"], json!([]));
        assert_eq!(payload["services"], json!([]));
        assert!(payload.get("id").is_none());
    }
}
