//! Wire-level request and response envelopes.

use serde::{Deserialize, Serialize};

use crate::domain::attributes::Record;
use crate::domain::credentials::ProviderConfig;
use crate::domain::{ErrorCode, LookupQuery, ProviderError, Redactor, ResourceState};

/// One orchestrator request.
#[derive(Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum Request {
    /// Resolve credentials and connect.
    Configure {
        #[serde(default)]
        provider: ProviderConfig,
    },
    /// Create a declared object.
    Create { kind: String, desired: Record },
    /// Refresh an object's actual state.
    Read { kind: String, state: ResourceState },
    /// Apply drift between prior state and desired attributes.
    Update {
        kind: String,
        state: ResourceState,
        desired: Record,
    },
    /// Delete an object.
    Delete { kind: String, state: ResourceState },
    /// Adopt an existing remote object.
    Import { kind: String, id: String },
    /// Read-only query.
    Lookup(LookupQuery),
}

impl Request {
    /// Operation name as it appears on the wire.
    pub const fn operation(&self) -> &'static str {
        match self {
            Self::Configure { .. } => "configure",
            Self::Create { .. } => "create",
            Self::Read { .. } => "read",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
            Self::Import { .. } => "import",
            Self::Lookup(_) => "lookup",
        }
    }
}

/// Failure details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    /// Stable category.
    pub code: ErrorCode,
    /// Redacted human-readable message.
    pub message: String,
}

/// One response line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Response {
    /// Whether the operation succeeded.
    pub ok: bool,
    /// Resulting state, also present on tainted updates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<ResourceState>,
    /// Lookup result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Record>,
    /// Failure details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl Response {
    /// Success without a payload.
    pub const fn ok() -> Self {
        Self {
            ok: true,
            state: None,
            attributes: None,
            error: None,
        }
    }

    /// Success carrying object state.
    pub fn state(state: ResourceState) -> Self {
        Self {
            state: Some(state),
            ..Self::ok()
        }
    }

    /// Success carrying lookup attributes.
    pub fn attributes(attributes: Record) -> Self {
        Self {
            attributes: Some(attributes),
            ..Self::ok()
        }
    }

    /// Failure with an explicit code. `message` must already be redacted.
    pub fn failure(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            state: None,
            attributes: None,
            error: Some(ErrorBody {
                code,
                message: message.into(),
            }),
        }
    }

    /// Failure rendered from `error` with secrets scrubbed.
    pub fn error(error: &ProviderError, redactor: &Redactor) -> Self {
        Self::failure(error.code(), redactor.scrub(&error.to_string()))
    }

    /// Attach state to a response.
    #[must_use]
    pub fn with_state(mut self, state: Option<ResourceState>) -> Self {
        self.state = state;
        self
    }

    /// Error code, when the response is a failure.
    pub fn error_code(&self) -> Option<ErrorCode> {
        self.error.as_ref().map(|error| error.code)
    }
}
