//! Outbound adapters implementing domain ports for external infrastructure.
//!
//! - **privx**: reqwest-backed clients for the PrivX REST API
//!
//! Adapters are thin translators between domain records and wire payloads.
//! They contain no reconciliation logic.

pub mod privx;
