//! Provider-wide error taxonomy.
//!
//! Every failure the orchestrator can observe maps onto one [`ErrorCode`].
//! Messages pass through a [`Redactor`] before they leave the process.

use serde::Serialize;

use super::attributes::{DecodeError, EncodeError, REDACTED};
use super::credentials::CredentialError;
use super::ports::{AuthFailure, RemoteError};
use super::rule_tree::RuleTreeParseError;

/// Stable machine-readable error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Provider configuration incomplete or malformed.
    CredentialError,
    /// Token acquisition failed.
    AuthFailure,
    /// Desired state could not be translated.
    DecodeError,
    /// Remote state could not be translated.
    EncodeError,
    /// Rule tree text could not be parsed.
    RuleTreeParseError,
    /// Remote object does not exist.
    RemoteNotFound,
    /// Remote refused the request.
    RemoteRejected,
    /// Remote could not be reached or answered garbage.
    RemoteUnavailable,
    /// Import id malformed or unmatched.
    ImportError,
    /// No such object kind.
    UnknownKind,
    /// Lookup query malformed.
    InvalidQuery,
    /// The request envelope was malformed.
    InvalidRequest,
    /// An operation ran before the provider was configured.
    NotConfigured,
}

/// Import could not produce a synced object.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ImportError {
    /// The id does not match the kind's id syntax.
    #[error("cannot import {kind} '{id}': {reason}")]
    InvalidId {
        kind: &'static str,
        id: String,
        reason: String,
    },
    /// No remote object has that id.
    #[error("cannot import {kind} '{id}': no such object")]
    NotFound { kind: &'static str, id: String },
}

/// Any failure surfaced by a reconciler or lookup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error(transparent)]
    Credential(#[from] CredentialError),
    #[error(transparent)]
    Auth(#[from] AuthFailure),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error(transparent)]
    RuleTree(#[from] RuleTreeParseError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Import(#[from] ImportError),
    #[error("unknown object kind '{kind}'")]
    UnknownKind { kind: String },
    #[error("invalid lookup: {message}")]
    InvalidQuery { message: String },
}

impl ProviderError {
    /// Build an invalid-query error.
    pub fn invalid_query(message: impl Into<String>) -> Self {
        Self::InvalidQuery {
            message: message.into(),
        }
    }

    /// Stable category for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Credential(_) => ErrorCode::CredentialError,
            Self::Auth(_) => ErrorCode::AuthFailure,
            Self::Decode(_) => ErrorCode::DecodeError,
            Self::Encode(_) => ErrorCode::EncodeError,
            Self::RuleTree(_) => ErrorCode::RuleTreeParseError,
            Self::Remote(RemoteError::NotFound { .. }) => ErrorCode::RemoteNotFound,
            Self::Remote(RemoteError::Rejected { .. } | RemoteError::Unauthorized { .. }) => {
                ErrorCode::RemoteRejected
            }
            Self::Remote(
                RemoteError::Transport { .. }
                | RemoteError::Timeout { .. }
                | RemoteError::Decode { .. },
            ) => ErrorCode::RemoteUnavailable,
            Self::Import(_) => ErrorCode::ImportError,
            Self::UnknownKind { .. } => ErrorCode::UnknownKind,
            Self::InvalidQuery { .. } => ErrorCode::InvalidQuery,
        }
    }
}

/// Replaces known secret values in rendered text.
#[derive(Debug, Clone, Default)]
pub struct Redactor {
    secrets: Vec<String>,
}

impl Redactor {
    /// Redactor for the given values. Empty values are ignored.
    pub fn new(secrets: impl IntoIterator<Item = String>) -> Self {
        let mut redactor = Self::default();
        redactor.extend(secrets);
        redactor
    }

    /// Register more values.
    pub fn extend(&mut self, secrets: impl IntoIterator<Item = String>) {
        self.secrets
            .extend(secrets.into_iter().filter(|secret| !secret.is_empty()));
        // Longest first so a secret containing another is replaced whole.
        self.secrets
            .sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        self.secrets.dedup();
    }

    /// `text` with every registered value replaced by a marker.
    pub fn scrub(&self, text: &str) -> String {
        self.secrets
            .iter()
            .fold(text.to_owned(), |acc, secret| acc.replace(secret.as_str(), REDACTED))
    }
}
