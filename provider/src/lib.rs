//! Declarative reconciliation of PrivX access-management objects.

pub mod config;
pub mod domain;
pub mod inbound;
pub mod outbound;
