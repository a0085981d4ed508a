//! PrivX outbound adapters.
//!
//! One authenticated [`PrivxTransport`] backs every collection client of a
//! session. [`PrivxConnector`] performs the eager token acquisition and
//! hands out a [`PrivxSession`].

mod connector;
mod directory;
mod dto;
mod principal_keys;
mod resource;
mod session;
mod transport;

pub use connector::PrivxConnector;
pub use directory::PrivxDirectory;
pub use principal_keys::PrivxPrincipalKeys;
pub use resource::{ListOrder, RestResourceClient};
pub use session::PrivxSession;
pub use transport::PrivxTransport;
