//! Inbound adapters driving the reconciliation core.
//!
//! - **plugin**: line-delimited JSON requests from the orchestrator
//!
//! Adapters parse wire envelopes, call into the domain and render
//! responses. Secret values never leave through them.

pub mod plugin;
