//! Driven port for one remote PrivX collection.
//!
//! A resource client serialises a typed domain record to the collection's
//! JSON payload and back. It knows nothing about declarative attributes.

use async_trait::async_trait;

use super::define_port_error;

define_port_error! {
    /// Errors surfaced by PrivX resource clients.
    pub enum RemoteError {
        /// The addressed object does not exist.
        NotFound { message: String } =>
            "remote object not found: {message}",
        /// The server refused the request.
        Rejected { status: u16, message: String } =>
            "remote rejected request (status {status}): {message}",
        /// The server refused the credentials.
        Unauthorized { message: String } =>
            "remote refused credentials: {message}",
        /// Network transport failed before receiving a response.
        Transport { message: String } =>
            "remote transport failed: {message}",
        /// The call exceeded its timeout.
        Timeout { message: String } =>
            "remote call timed out: {message}",
        /// The response body could not be decoded.
        Decode { message: String } =>
            "remote response decode failed: {message}",
    }
}

impl RemoteError {
    /// Whether the error means the object is gone.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Human-readable message without the category prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::NotFound { message }
            | Self::Rejected { message, .. }
            | Self::Unauthorized { message }
            | Self::Transport { message }
            | Self::Timeout { message }
            | Self::Decode { message } => message,
        }
    }
}

/// CRUD operations over one remote collection.
///
/// # Examples
///
/// ```rust,ignore
/// use provider::domain::kinds::Host;
/// use provider::domain::ports::{InMemoryResourceClient, ResourceClient};
///
/// let hosts = InMemoryResourceClient::<Host>::new();
/// let id = hosts.create(&Host { name: "db".into(), ..Host::default() }).await?;
/// assert_eq!(hosts.get(&id).await?.name, "db");
/// # Ok::<(), provider::domain::ports::RemoteError>(())
/// ```
#[async_trait]
pub trait ResourceClient<T>: Send + Sync
where
    T: Send + Sync + 'static,
{
    /// List every object in the collection.
    async fn list(&self) -> Result<Vec<T>, RemoteError>;

    /// Fetch one object.
    async fn get(&self, id: &str) -> Result<T, RemoteError>;

    /// Create an object, returning its remote identifier.
    async fn create(&self, record: &T) -> Result<String, RemoteError>;

    /// Replace an object.
    async fn update(&self, id: &str, record: &T) -> Result<(), RemoteError>;

    /// Delete an object.
    async fn delete(&self, id: &str) -> Result<(), RemoteError>;
}
