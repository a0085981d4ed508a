//! Domain ports and supporting types for the hexagonal boundary.

mod macros;
pub(crate) use macros::define_port_error;

mod connector;
mod directory;
#[cfg(any(test, feature = "test-support"))]
mod fixtures;
mod principal_keys;
mod resource_client;

pub use connector::{AuthFailure, ConnectorFactory, ResourceClients};
#[cfg(test)]
pub use directory::MockDirectory;
pub use directory::{ConfigTarget, Directory};
#[cfg(any(test, feature = "test-support"))]
pub use fixtures::{
    FixtureConnectorFactory, FixtureDirectory, FixturePrincipalKeys, InMemoryPrivx,
    InMemoryResourceClient, StoredRecord,
};
#[cfg(test)]
pub use principal_keys::MockPrincipalKeys;
pub use principal_keys::{PrincipalKey, PrincipalKeys};
pub use resource_client::{RemoteError, ResourceClient};
