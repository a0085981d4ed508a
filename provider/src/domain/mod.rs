//! Reconciliation core.
//!
//! Purpose: translate declarative attribute records into PrivX domain
//! records and drive each object's lifecycle through driven ports. Nothing
//! here knows about HTTP, the command line or the orchestrator's wire
//! format.
//!
//! Public surface:
//! - `attributes`: the declarative value model and translation helpers.
//! - `credentials`: provider configuration resolution.
//! - `kinds`: one translator per object kind.
//! - `reconciler` / `registry`: the generic lifecycle driver and kind table.
//! - `lookups`: read-only queries.
//! - `ports`: driven port traits and their errors.

pub mod attributes;
pub mod credentials;
pub mod error;
pub mod kinds;
pub mod lookups;
pub mod ports;
pub mod reconciler;
pub mod registry;
pub mod rule_tree;

pub use self::error::{ErrorCode, ImportError, ProviderError, Redactor};
pub use self::lookups::{LookupQuery, Lookups};
pub use self::reconciler::{
    Lifecycle, ObjectReconciler, PollPolicy, Reconciler, ResourceState, UpdateFailure,
};
pub use self::registry::{KindEntry, ReconcilerOptions};
