//! Read-only queries by name or flag.

use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use super::attributes::{Record, RecordBuilder, Value};
use super::error::ProviderError;
use super::kinds::{
    AccessGroup, AccessGroupKind, ApiClientKind, CarrierKind, ClientType, ExtenderKind, HostKind,
    ObjectKind, RoleKind, SecretKind,
};
use super::ports::{ConfigTarget, RemoteError, ResourceClients};

/// A lookup request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "lookup", content = "query", rename_all = "snake_case")]
pub enum LookupQuery {
    /// Role by exact name.
    Role { name: String },
    /// Access group by name, or the default group.
    AccessGroup {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        default: Option<bool>,
    },
    /// Trusted client by name and type.
    TrustedClient {
        name: String,
        #[serde(rename = "type")]
        client_type: ClientType,
    },
    /// Extender configuration bundle.
    ExtenderConfig { trusted_client_id: String },
    /// Carrier configuration bundle.
    CarrierConfig { trusted_client_id: String },
    /// Web proxy configuration bundle.
    WebProxyConfig { trusted_client_id: String },
    /// Host by id.
    Host { id: String },
    /// API client by id.
    ApiClient { id: String },
    /// Secret by name.
    Secret { name: String },
}

enum GroupCriterion<'a> {
    Name(&'a str),
    Default(bool),
}

impl GroupCriterion<'_> {
    fn matches(&self, group: &AccessGroup) -> bool {
        match self {
            Self::Name(name) => group.name == *name,
            Self::Default(flag) => group.default == *flag,
        }
    }
}

/// Answers [`LookupQuery`] values against one session.
pub struct Lookups {
    clients: Arc<dyn ResourceClients>,
}

impl Lookups {
    /// Lookups over `clients`.
    pub fn new(clients: Arc<dyn ResourceClients>) -> Self {
        Self { clients }
    }

    /// Run `query`, returning the matching object's attributes.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::InvalidQuery`] for contradictory queries and
    /// a remote not-found error when nothing matches.
    pub async fn run(&self, query: &LookupQuery) -> Result<Record, ProviderError> {
        debug!(?query, "running lookup");
        match query {
            LookupQuery::Role { name } => self.role(name).await,
            LookupQuery::AccessGroup { name, default } => {
                self.access_group(name.as_deref(), *default).await
            }
            LookupQuery::TrustedClient { name, client_type } => {
                self.trusted_client(name, *client_type).await
            }
            LookupQuery::ExtenderConfig { trusted_client_id } => {
                self.config(ConfigTarget::Extender, trusted_client_id).await
            }
            LookupQuery::CarrierConfig { trusted_client_id } => {
                self.config(ConfigTarget::Carrier, trusted_client_id).await
            }
            LookupQuery::WebProxyConfig { trusted_client_id } => {
                self.config(ConfigTarget::WebProxy, trusted_client_id).await
            }
            LookupQuery::Host { id } => {
                let host = self.clients.hosts().get(id).await?;
                Ok(HostKind::encode(&host, None)?)
            }
            LookupQuery::ApiClient { id } => {
                let client = self.clients.api_clients().get(id).await?;
                Ok(ApiClientKind::encode(&client, None)?)
            }
            LookupQuery::Secret { name } => {
                let secret = self.clients.secrets().get(name).await?;
                Ok(SecretKind::encode(&secret, None)?)
            }
        }
    }

    async fn role(&self, name: &str) -> Result<Record, ProviderError> {
        let resolved = self
            .clients
            .directory()
            .resolve_roles(&[name.to_owned()])
            .await?;
        let role_ref = resolved
            .into_iter()
            .find(|role| !role.id.is_empty())
            .ok_or_else(|| RemoteError::not_found(format!("no role named '{name}'")))?;
        let role = self.clients.roles().get(&role_ref.id).await?;
        Ok(RoleKind::encode(&role, None)?)
    }

    async fn access_group(
        &self,
        name: Option<&str>,
        default: Option<bool>,
    ) -> Result<Record, ProviderError> {
        let wanted = match (name, default) {
            (Some(name), None) => GroupCriterion::Name(name),
            (None, Some(flag)) => GroupCriterion::Default(flag),
            (Some(_), Some(_)) => {
                return Err(ProviderError::invalid_query(
                    "access group lookup takes either a name or the default flag, not both",
                ));
            }
            (None, None) => {
                return Err(ProviderError::invalid_query(
                    "access group lookup needs a name or the default flag",
                ));
            }
        };

        let mut groups = self.clients.access_groups().list().await?;
        groups.sort_by(|a, b| a.id.cmp(&b.id));
        let group = groups
            .iter()
            .find(|group| wanted.matches(group))
            .ok_or_else(|| RemoteError::not_found("no matching access group"))?;
        Ok(AccessGroupKind::encode(group, None)?)
    }

    async fn trusted_client(
        &self,
        name: &str,
        client_type: ClientType,
    ) -> Result<Record, ProviderError> {
        let clients = self.clients.trusted_clients().list().await?;
        let client = clients
            .iter()
            .find(|client| client.name == name && client.client_type == client_type)
            .ok_or_else(|| {
                RemoteError::not_found(format!(
                    "no {} trusted client named '{name}'",
                    client_type.as_str()
                ))
            })?;
        let mut record = match client_type {
            ClientType::Carrier => CarrierKind::encode(client, None)?,
            ClientType::Extender | ClientType::Icap => ExtenderKind::encode(client, None)?,
        };
        record.insert("type", Value::string(client_type.as_str()));
        Ok(record)
    }

    async fn config(
        &self,
        target: ConfigTarget,
        trusted_client_id: &str,
    ) -> Result<Record, ProviderError> {
        let text = self
            .clients
            .directory()
            .trusted_client_config(target, trusted_client_id)
            .await?;
        Ok(RecordBuilder::new()
            .string("trusted_client_id", trusted_client_id)
            .string("config", text)
            .build())
    }
}

#[cfg(test)]
mod tests {
    //! Lookup behaviour over in-memory collections.

    use super::*;
    use crate::domain::error::ErrorCode;
    use crate::domain::kinds::{Host, Role, TrustedClient};
    use crate::domain::ports::{FixtureDirectory, InMemoryPrivx, InMemoryResourceClient};
    use rstest::rstest;
    use serde_json::json;

    fn privx_with_groups() -> Arc<InMemoryPrivx> {
        let privx = InMemoryPrivx::default();
        privx.access_groups.seed(AccessGroup {
            id: Some("b".to_owned()),
            name: "ops".to_owned(),
            ..AccessGroup::default()
        });
        privx.access_groups.seed(AccessGroup {
            id: Some("a".to_owned()),
            name: "Default".to_owned(),
            default: true,
            ..AccessGroup::default()
        });
        Arc::new(privx)
    }

    #[rstest]
    #[tokio::test]
    async fn access_group_by_name_or_default_flag() {
        let lookups = Lookups::new(privx_with_groups());

        let by_name = lookups
            .run(&LookupQuery::AccessGroup {
                name: Some("ops".to_owned()),
                default: None,
            })
            .await
            .expect("found by name");
        assert_eq!(by_name.get("id"), Some(&Value::string("b")));

        let by_flag = lookups
            .run(&LookupQuery::AccessGroup {
                name: None,
                default: Some(true),
            })
            .await
            .expect("found by flag");
        assert_eq!(by_flag.get("name"), Some(&Value::string("Default")));
    }

    #[rstest]
    #[case(Some("ops"), Some(true))]
    #[case(None, None)]
    #[tokio::test]
    async fn access_group_queries_need_exactly_one_criterion(
        #[case] name: Option<&str>,
        #[case] default: Option<bool>,
    ) {
        let err = Lookups::new(privx_with_groups())
            .run(&LookupQuery::AccessGroup {
                name: name.map(str::to_owned),
                default,
            })
            .await
            .expect_err("invalid");
        assert!(matches!(err, ProviderError::InvalidQuery { .. }));
    }

    #[rstest]
    #[tokio::test]
    async fn role_lookup_resolves_the_name_first() {
        let roles = Arc::new(InMemoryResourceClient::<Role>::new());
        let id = roles.seed(Role {
            name: "admins".to_owned(),
            access_group_id: "g".to_owned(),
            ..Role::default()
        });
        let privx = InMemoryPrivx {
            roles,
            directory: Arc::new(FixtureDirectory::default().with_role("admins", id.as_str())),
            ..InMemoryPrivx::default()
        };
        let lookups = Lookups::new(Arc::new(privx));

        let role = lookups
            .run(&LookupQuery::Role {
                name: "admins".to_owned(),
            })
            .await
            .expect("found");
        assert_eq!(role.get("id"), Some(&Value::string(id.as_str())));

        let err = lookups
            .run(&LookupQuery::Role {
                name: "nobody".to_owned(),
            })
            .await
            .expect_err("unknown role");
        assert_eq!(err.code(), ErrorCode::RemoteNotFound);
    }

    #[rstest]
    #[tokio::test]
    async fn host_lookup_fetches_by_id() {
        let privx = InMemoryPrivx::default();
        let id = privx.hosts.seed(Host {
            name: "db-1".to_owned(),
            ..Host::default()
        });
        let lookups = Lookups::new(Arc::new(privx));

        let host = lookups
            .run(&LookupQuery::Host { id: id.clone() })
            .await
            .expect("found");
        assert_eq!(host.get("id"), Some(&Value::string(id.as_str())));
        assert_eq!(host.get("common_name"), Some(&Value::string("db-1")));

        let err = lookups
            .run(&LookupQuery::Host {
                id: "00000000-0000-0000-0000-000000000000".to_owned(),
            })
            .await
            .expect_err("unknown host");
        assert_eq!(err.code(), ErrorCode::RemoteNotFound);
    }

    #[rstest]
    #[tokio::test]
    async fn trusted_clients_filter_on_type() {
        let privx = InMemoryPrivx::default();
        privx.trusted_clients.seed(TrustedClient {
            name: "edge".to_owned(),
            client_type: ClientType::Carrier,
            ..TrustedClient::default()
        });
        let lookups = Lookups::new(Arc::new(privx));

        let err = lookups
            .run(&LookupQuery::TrustedClient {
                name: "edge".to_owned(),
                client_type: ClientType::Extender,
            })
            .await
            .expect_err("wrong type");
        assert_eq!(err.code(), ErrorCode::RemoteNotFound);

        let carrier = lookups
            .run(&LookupQuery::TrustedClient {
                name: "edge".to_owned(),
                client_type: ClientType::Carrier,
            })
            .await
            .expect("found");
        assert_eq!(carrier.get("type"), Some(&Value::string("CARRIER")));
    }

    #[rstest]
    #[tokio::test]
    async fn configuration_bundles_are_returned_verbatim() {
        let privx = InMemoryPrivx {
            directory: Arc::new(FixtureDirectory::default().with_config(
                ConfigTarget::Carrier,
                "tc-1",
                "[carrier]\nname = \"edge\"\n",
            )),
            ..InMemoryPrivx::default()
        };

        let record = Lookups::new(Arc::new(privx))
            .run(&LookupQuery::CarrierConfig {
                trusted_client_id: "tc-1".to_owned(),
            })
            .await
            .expect("downloaded");
        assert_eq!(record.get("config"), Some(&Value::string("[carrier]\nname = \"edge\"\n")));
    }

    #[rstest]
    fn queries_deserialise_from_the_envelope_shape() {
        let query: LookupQuery = serde_json::from_value(json!({
            "lookup": "trusted_client",
            "query": { "name": "edge", "type": "EXTENDER" }
        }))
        .expect("parses");
        assert_eq!(
            query,
            LookupQuery::TrustedClient {
                name: "edge".to_owned(),
                client_type: ClientType::Extender
            }
        );
    }
}
