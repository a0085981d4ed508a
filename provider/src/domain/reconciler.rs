//! Generic per-kind lifecycle state machine.
//!
//! One [`Reconciler`] drives create, read, update, delete and import for
//! any [`ObjectKind`]. Kind-specific behaviour comes from the kind's schema
//! flags, its translator and an optional [`CreateHook`].

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::attributes::{Field, Record, Value};
use super::error::{ImportError, ProviderError};
use super::kinds::{ID_ATTRIBUTE, IdSyntax, KindSchema, ObjectKind};
use super::ports::{RemoteError, ResourceClient};

mod key_poll;

pub use key_poll::{GENERATED_KEY_MARKER, PollPolicy, RoleKeyPoll};

/// Where an object is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    /// Declared only; no remote object.
    Planned,
    /// Remote id assigned; actual state not yet observed.
    Created,
    /// Remote id and last observed actual state.
    Synced,
    /// An update was rejected; declared and actual state diverge.
    Tainted,
    /// Remote object deleted or vanished.
    Gone,
}

/// Declarative state of one object as exchanged with the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceState {
    /// Remote identifier; `None` unless created.
    #[serde(default)]
    pub id: Option<String>,
    /// Lifecycle position.
    pub lifecycle: Lifecycle,
    /// Attribute values as last produced by the translator.
    #[serde(default)]
    pub attributes: Record,
}

impl ResourceState {
    /// State of an object that only exists as a declaration.
    pub fn planned(attributes: Record) -> Self {
        Self {
            id: None,
            lifecycle: Lifecycle::Planned,
            attributes,
        }
    }

    fn with_id(id: String, lifecycle: Lifecycle, mut attributes: Record) -> Self {
        attributes.insert(ID_ATTRIBUTE, Value::string(id.as_str()));
        Self {
            id: Some(id),
            lifecycle,
            attributes,
        }
    }

    fn gone(mut attributes: Record) -> Self {
        attributes.remove(ID_ATTRIBUTE);
        Self {
            id: None,
            lifecycle: Lifecycle::Gone,
            attributes,
        }
    }

    fn tainted(&self) -> Self {
        Self {
            lifecycle: Lifecycle::Tainted,
            ..self.clone()
        }
    }
}

/// An update that did not complete.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{error}")]
pub struct UpdateFailure {
    /// What went wrong.
    pub error: ProviderError,
    /// Prior state marked tainted when the remote rejected the change;
    /// `None` when nothing was sent.
    pub tainted: Option<ResourceState>,
}

impl UpdateFailure {
    fn before_send(error: impl Into<ProviderError>) -> Self {
        Self {
            error: error.into(),
            tainted: None,
        }
    }
}

/// Follow-up work run right after a successful create.
#[async_trait]
pub trait CreateHook<T>: Send + Sync {
    /// Complete `record` for the freshly created object `id`.
    async fn after_create(&self, id: &str, record: &mut T, cancel: &CancellationToken);
}

/// Object-safe view of a reconciler for kind-agnostic callers.
#[async_trait]
pub trait ObjectReconciler: Send + Sync {
    /// Schema of the driven kind.
    fn schema(&self) -> KindSchema;

    /// Create the declared object.
    async fn create(&self, desired: &Record) -> Result<ResourceState, ProviderError>;

    /// Refresh actual state.
    async fn read(&self, state: &ResourceState) -> Result<ResourceState, ProviderError>;

    /// Apply drift between `state` and `desired`.
    async fn update(
        &self,
        state: &ResourceState,
        desired: &Record,
    ) -> Result<ResourceState, UpdateFailure>;

    /// Delete the object. Deleting a missing object succeeds.
    async fn delete(&self, state: &ResourceState) -> Result<ResourceState, ProviderError>;

    /// Adopt an existing remote object.
    async fn import(&self, id: &str) -> Result<ResourceState, ProviderError>;
}

/// Lifecycle driver for kind `K`.
pub struct Reconciler<K: ObjectKind> {
    client: Arc<dyn ResourceClient<K::Record>>,
    hook: Option<Arc<dyn CreateHook<K::Record>>>,
    cancel: CancellationToken,
    kind: PhantomData<fn() -> K>,
}

impl<K: ObjectKind> Reconciler<K> {
    /// Reconciler over `client` with no create hook.
    pub fn new(client: Arc<dyn ResourceClient<K::Record>>) -> Self {
        Self {
            client,
            hook: None,
            cancel: CancellationToken::new(),
            kind: PhantomData,
        }
    }

    /// Run `hook` after every successful create.
    #[must_use]
    pub fn with_create_hook(mut self, hook: Arc<dyn CreateHook<K::Record>>) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Abort time-bounded work when `cancel` fires.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn kind_name() -> &'static str {
        K::SCHEMA.name
    }

    fn redacted(record: &Record) -> Record {
        record.redacted(K::SCHEMA.sensitive)
    }

    /// Encode `domain` and keep the prior representation of every attribute
    /// that compares equal, so reads never report cosmetic drift.
    fn observe(domain: &K::Record, prior: &Record) -> Result<Record, ProviderError> {
        let mut observed = K::encode(domain, Some(prior))?;
        let names: Vec<String> = observed.iter().map(|(name, _)| name.to_owned()).collect();
        for name in names {
            let Some(previous) = prior.get(&name) else {
                continue;
            };
            let unchanged = observed
                .get(&name)
                .is_some_and(|current| K::attribute_equal(&name, current, previous));
            if unchanged {
                observed.insert(name, previous.clone());
            }
        }
        Ok(observed)
    }

    fn drifted(normalised: &Record, state: &Record) -> Vec<String> {
        let mut names: Vec<&str> = normalised
            .iter()
            .map(|(name, _)| name)
            .chain(state.iter().map(|(name, _)| name))
            .filter(|name| K::SCHEMA.is_mutable(name))
            .collect();
        names.sort_unstable();
        names.dedup();
        names
            .into_iter()
            .filter(|name| match (normalised.get(name), state.get(name)) {
                (Some(left), Some(right)) => !K::attribute_equal(name, left, right),
                (None, None) => false,
                _ => true,
            })
            .map(str::to_owned)
            .collect()
    }

    fn strip_immutable(desired: &Record) -> Record {
        desired
            .iter()
            .filter(|(name, _)| !K::SCHEMA.immutable.contains(name))
            .map(|(name, value)| (name.to_owned(), value.clone()))
            .collect()
    }

    async fn fetch_after_write(
        &self,
        id: String,
        written: Record,
    ) -> Result<ResourceState, ProviderError> {
        if !K::SCHEMA.refresh_after_write {
            return Ok(ResourceState::with_id(id, Lifecycle::Created, written));
        }
        let fetched = self.client.get(&id).await?;
        let observed = Self::observe(&fetched, &written)?;
        Ok(ResourceState::with_id(id, Lifecycle::Synced, observed))
    }

    async fn rename(
        &self,
        state: &ResourceState,
        old_id: &str,
        domain: &K::Record,
        normalised: Record,
    ) -> Result<ResourceState, UpdateFailure> {
        let taint = |error: RemoteError| UpdateFailure {
            error: error.into(),
            tainted: Some(state.tainted()),
        };
        let new_id = self.client.create(domain).await.map_err(taint)?;
        match self.client.delete(old_id).await {
            Ok(()) => {}
            Err(error) if error.is_not_found() => {}
            Err(error) => {
                warn!(
                    kind = Self::kind_name(),
                    old_id,
                    %new_id,
                    error = %error,
                    "renamed object created but old name not deleted"
                );
                // The new object exists; later updates must target it.
                return Err(UpdateFailure {
                    error: error.into(),
                    tainted: Some(ResourceState::with_id(new_id, Lifecycle::Tainted, normalised)),
                });
            }
        }
        info!(kind = Self::kind_name(), old_id, %new_id, "object renamed");
        let state = self
            .fetch_after_write(new_id, normalised)
            .await
            .map_err(UpdateFailure::before_send)?;
        Ok(ResourceState {
            lifecycle: Lifecycle::Synced,
            ..state
        })
    }
}

#[async_trait]
impl<K: ObjectKind> ObjectReconciler for Reconciler<K> {
    fn schema(&self) -> KindSchema {
        K::SCHEMA
    }

    async fn create(&self, desired: &Record) -> Result<ResourceState, ProviderError> {
        let mut domain = K::decode(desired)?;
        debug!(
            kind = Self::kind_name(),
            attributes = ?Self::redacted(desired),
            "creating object"
        );

        let id = self.client.create(&domain).await?;
        info!(kind = Self::kind_name(), %id, "object created");

        if let Some(hook) = &self.hook {
            hook.after_create(&id, &mut domain, &self.cancel).await;
            let written = K::encode(&domain, Some(desired))?;
            return Ok(ResourceState::with_id(id, Lifecycle::Synced, written));
        }

        let written = K::encode(&domain, Some(desired))?;
        self.fetch_after_write(id, written).await
    }

    async fn read(&self, state: &ResourceState) -> Result<ResourceState, ProviderError> {
        let Some(id) = state.id.as_deref() else {
            return Ok(ResourceState::gone(state.attributes.clone()));
        };
        match self.client.get(id).await {
            Ok(domain) => {
                let observed = Self::observe(&domain, &state.attributes)?;
                debug!(
                    kind = Self::kind_name(),
                    id,
                    attributes = ?Self::redacted(&observed),
                    "object read"
                );
                Ok(ResourceState::with_id(id.to_owned(), Lifecycle::Synced, observed))
            }
            Err(error) if error.is_not_found() => {
                info!(kind = Self::kind_name(), id, "object vanished remotely");
                Ok(ResourceState::gone(state.attributes.clone()))
            }
            Err(error) => Err(error.into()),
        }
    }

    async fn update(
        &self,
        state: &ResourceState,
        desired: &Record,
    ) -> Result<ResourceState, UpdateFailure> {
        let Some(id) = state.id.as_deref() else {
            return Err(UpdateFailure::before_send(RemoteError::not_found(format!(
                "{} has no remote id",
                Self::kind_name()
            ))));
        };

        let domain =
            K::decode(&Self::strip_immutable(desired)).map_err(UpdateFailure::before_send)?;
        let mut normalised =
            K::encode(&domain, Some(&state.attributes)).map_err(UpdateFailure::before_send)?;
        let undeclared_computed = K::SCHEMA
            .computed
            .iter()
            .filter(|name| !matches!(desired.field(name), Field::Known(_)));
        for name in K::SCHEMA.immutable.iter().chain(undeclared_computed) {
            if let Some(kept) = state.attributes.get(name) {
                normalised.insert(*name, kept.clone());
            }
        }

        if K::SCHEMA.id_syntax == IdSyntax::Name {
            if let Some(new_id) = K::remote_id(&domain).filter(|new_id| new_id != id) {
                debug!(kind = Self::kind_name(), id, %new_id, "name changed; replacing object");
                return self.rename(state, id, &domain, normalised).await;
            }
        }

        let drift = Self::drifted(&normalised, &state.attributes);
        if drift.is_empty() {
            debug!(kind = Self::kind_name(), id, "no drift");
            return Ok(ResourceState {
                lifecycle: Lifecycle::Synced,
                ..state.clone()
            });
        }
        debug!(kind = Self::kind_name(), id, ?drift, "updating object");

        if let Err(error) = self.client.update(id, &domain).await {
            warn!(kind = Self::kind_name(), id, error = %error, "update rejected; object tainted");
            return Err(UpdateFailure {
                error: error.into(),
                tainted: Some(state.tainted()),
            });
        }
        info!(kind = Self::kind_name(), id, "object updated");

        let refreshed = self
            .fetch_after_write(id.to_owned(), normalised)
            .await
            .map_err(UpdateFailure::before_send)?;
        Ok(ResourceState {
            lifecycle: Lifecycle::Synced,
            ..refreshed
        })
    }

    async fn delete(&self, state: &ResourceState) -> Result<ResourceState, ProviderError> {
        let Some(id) = state.id.as_deref() else {
            return Ok(ResourceState::gone(Record::new()));
        };
        match self.client.delete(id).await {
            Ok(()) => info!(kind = Self::kind_name(), id, "object deleted"),
            Err(error) if error.is_not_found() => {
                debug!(kind = Self::kind_name(), id, "object already gone");
            }
            Err(error) => return Err(error.into()),
        }
        Ok(ResourceState::gone(Record::new()))
    }

    async fn import(&self, id: &str) -> Result<ResourceState, ProviderError> {
        K::SCHEMA
            .id_syntax
            .validate(id)
            .map_err(|reason| ImportError::InvalidId {
                kind: Self::kind_name(),
                id: id.to_owned(),
                reason,
            })?;

        let domain = match self.client.get(id).await {
            Ok(domain) => domain,
            Err(error) if error.is_not_found() => {
                return Err(ImportError::NotFound {
                    kind: Self::kind_name(),
                    id: id.to_owned(),
                }
                .into());
            }
            Err(error) => return Err(error.into()),
        };
        let attributes = K::encode(&domain, None)?;
        info!(kind = Self::kind_name(), id, "object imported");
        Ok(ResourceState::with_id(id.to_owned(), Lifecycle::Synced, attributes))
    }
}
