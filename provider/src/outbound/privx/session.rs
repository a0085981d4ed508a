//! Collection clients sharing one authenticated transport.

use std::sync::Arc;

use super::directory::PrivxDirectory;
use super::principal_keys::PrivxPrincipalKeys;
use super::resource::{ListOrder, RestResourceClient};
use super::transport::PrivxTransport;
use crate::domain::kinds::{AccessGroup, ApiClient, Host, Role, Secret, Source, TrustedClient};
use crate::domain::ports::{Directory, PrincipalKeys, ResourceClient, ResourceClients};

const HOSTS: &str = "host-store/api/v1/hosts";
const ROLES: &str = "role-store/api/v1/roles";
const SOURCES: &str = "role-store/api/v1/sources";
const TRUSTED_CLIENTS: &str = "local-user-store/api/v1/trusted-clients";
const SECRETS: &str = "vault/api/v1/secrets";
const API_CLIENTS: &str = "local-user-store/api/v1/api-clients";
const ACCESS_GROUPS: &str = "authorizer/api/v1/accessgroups";

/// Every PrivX client of one authenticated connection.
#[derive(Clone)]
pub struct PrivxSession {
    hosts: Arc<RestResourceClient<Host>>,
    roles: Arc<RestResourceClient<Role>>,
    principal_keys: Arc<PrivxPrincipalKeys>,
    sources: Arc<RestResourceClient<Source>>,
    trusted_clients: Arc<RestResourceClient<TrustedClient>>,
    secrets: Arc<RestResourceClient<Secret>>,
    api_clients: Arc<RestResourceClient<ApiClient>>,
    access_groups: Arc<RestResourceClient<AccessGroup>>,
    directory: Arc<PrivxDirectory>,
}

impl PrivxSession {
    /// Session over an already authenticated `transport`.
    pub fn new(transport: &Arc<PrivxTransport>) -> Self {
        Self {
            hosts: rest(transport, HOSTS),
            roles: rest(transport, ROLES),
            principal_keys: Arc::new(PrivxPrincipalKeys::new(Arc::clone(transport))),
            sources: rest(transport, SOURCES),
            trusted_clients: rest(transport, TRUSTED_CLIENTS),
            secrets: rest(transport, SECRETS),
            api_clients: rest(transport, API_CLIENTS),
            access_groups: Arc::new(
                RestResourceClient::new(Arc::clone(transport), ACCESS_GROUPS)
                    .with_order(ListOrder::ById),
            ),
            directory: Arc::new(PrivxDirectory::new(Arc::clone(transport))),
        }
    }
}

fn rest<T>(
    transport: &Arc<PrivxTransport>,
    collection: &'static str,
) -> Arc<RestResourceClient<T>> {
    Arc::new(RestResourceClient::new(Arc::clone(transport), collection))
}

impl ResourceClients for PrivxSession {
    fn hosts(&self) -> Arc<dyn ResourceClient<Host>> {
        self.hosts.clone()
    }

    fn roles(&self) -> Arc<dyn ResourceClient<Role>> {
        self.roles.clone()
    }

    fn principal_keys(&self) -> Arc<dyn PrincipalKeys> {
        self.principal_keys.clone()
    }

    fn sources(&self) -> Arc<dyn ResourceClient<Source>> {
        self.sources.clone()
    }

    fn trusted_clients(&self) -> Arc<dyn ResourceClient<TrustedClient>> {
        self.trusted_clients.clone()
    }

    fn secrets(&self) -> Arc<dyn ResourceClient<Secret>> {
        self.secrets.clone()
    }

    fn api_clients(&self) -> Arc<dyn ResourceClient<ApiClient>> {
        self.api_clients.clone()
    }

    fn access_groups(&self) -> Arc<dyn ResourceClient<AccessGroup>> {
        self.access_groups.clone()
    }

    fn directory(&self) -> Arc<dyn Directory> {
        self.directory.clone()
    }
}
