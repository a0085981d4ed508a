//! Static table of supported object kinds.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::error::ProviderError;
use super::kinds::{
    AccessGroupKind, ApiClientKind, CarrierKind, ExtenderKind, HostKind, RoleKind, SecretKind,
    SourceKind,
};
use super::ports::ResourceClients;
use super::reconciler::{ObjectReconciler, PollPolicy, Reconciler, RoleKeyPoll};

/// Per-session knobs shared by every reconciler.
#[derive(Debug, Clone, Default)]
pub struct ReconcilerOptions {
    /// Role key-pair wait.
    pub key_poll: PollPolicy,
    /// Fires when the orchestrator abandons the invocation.
    pub cancel: CancellationToken,
}

/// One registered kind.
pub struct KindEntry {
    /// Orchestrator-facing kind name.
    pub name: &'static str,
    build: fn(&dyn ResourceClients, &ReconcilerOptions) -> Box<dyn ObjectReconciler>,
}

impl KindEntry {
    /// Reconciler for this kind over `clients`.
    pub fn reconciler(
        &self,
        clients: &dyn ResourceClients,
        options: &ReconcilerOptions,
    ) -> Box<dyn ObjectReconciler> {
        (self.build)(clients, options)
    }
}

/// Every supported kind, in documentation order.
pub static KINDS: &[KindEntry] = &[
    KindEntry {
        name: "host",
        build: |clients, _| Box::new(Reconciler::<HostKind>::new(clients.hosts())),
    },
    KindEntry {
        name: "role",
        build: |clients, options| {
            let poll = RoleKeyPoll::new(clients.principal_keys(), options.key_poll);
            Box::new(
                Reconciler::<RoleKind>::new(clients.roles())
                    .with_create_hook(Arc::new(poll))
                    .with_cancellation(options.cancel.clone()),
            )
        },
    },
    KindEntry {
        name: "source",
        build: |clients, _| Box::new(Reconciler::<SourceKind>::new(clients.sources())),
    },
    KindEntry {
        name: "extender",
        build: |clients, _| Box::new(Reconciler::<ExtenderKind>::new(clients.trusted_clients())),
    },
    KindEntry {
        name: "carrier",
        build: |clients, _| Box::new(Reconciler::<CarrierKind>::new(clients.trusted_clients())),
    },
    KindEntry {
        name: "secret",
        build: |clients, _| Box::new(Reconciler::<SecretKind>::new(clients.secrets())),
    },
    KindEntry {
        name: "api_client",
        build: |clients, _| Box::new(Reconciler::<ApiClientKind>::new(clients.api_clients())),
    },
    KindEntry {
        name: "access_group",
        build: |clients, _| {
            Box::new(Reconciler::<AccessGroupKind>::new(clients.access_groups()))
        },
    },
];

/// Find the entry for `name`.
///
/// # Errors
///
/// Returns [`ProviderError::UnknownKind`] when no kind has that name.
pub fn find(name: &str) -> Result<&'static KindEntry, ProviderError> {
    KINDS
        .iter()
        .find(|entry| entry.name == name)
        .ok_or_else(|| ProviderError::UnknownKind {
            kind: name.to_owned(),
        })
}
