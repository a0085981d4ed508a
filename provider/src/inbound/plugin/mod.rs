//! Orchestrator plugin adapter.
//!
//! The orchestrator writes one JSON request per line and reads one JSON
//! response per line. A `configure` request must come first; it resolves
//! credentials and opens the PrivX session every later request runs
//! against.

mod dispatcher;
pub mod messages;

pub use dispatcher::{DebugSwitch, Plugin};
pub use messages::{ErrorBody, Request, Response};

#[cfg(test)]
mod tests;
