//! Provider credential resolution.
//!
//! Each credential field falls back from the explicit configuration value
//! to its environment variable and finally to the empty string. A bearer
//! token wins outright; without one, all four client-credential fields are
//! required and every missing field is reported in the same pass.

use std::fmt;

use mockable::Env;
use serde::Deserialize;
use url::Url;
use zeroize::Zeroizing;

const BOOL_EXPECTED: &str = "1|0|true|false|yes|no|y|n";

/// One configurable provider field, with its attribute and variable names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialField {
    /// PrivX API base URL.
    BaseUrl,
    /// Pre-issued bearer token.
    BearerToken,
    /// API client access id.
    ClientId,
    /// API client access secret.
    ClientSecret,
    /// OAuth client id.
    OauthClientId,
    /// OAuth client secret.
    OauthClientSecret,
    /// Verbose logging toggle.
    Debug,
}

impl CredentialField {
    /// Configuration attribute name.
    pub const fn attribute(self) -> &'static str {
        match self {
            Self::BaseUrl => "api_base_url",
            Self::BearerToken => "api_bearer_token",
            Self::ClientId => "api_client_id",
            Self::ClientSecret => "api_client_secret",
            Self::OauthClientId => "api_oauth_client_id",
            Self::OauthClientSecret => "api_oauth_client_secret",
            Self::Debug => "debug",
        }
    }

    /// Fallback environment variable.
    pub const fn env_var(self) -> &'static str {
        match self {
            Self::BaseUrl => "PRIVX_API_BASE_URL",
            Self::BearerToken => "PRIVX_API_BEARER_TOKEN",
            Self::ClientId => "PRIVX_API_CLIENT_ID",
            Self::ClientSecret => "PRIVX_API_CLIENT_SECRET",
            Self::OauthClientId => "PRIVX_API_OAUTH_CLIENT_ID",
            Self::OauthClientSecret => "PRIVX_API_OAUTH_CLIENT_SECRET",
            Self::Debug => "PRIVX_DEBUG",
        }
    }
}

impl fmt::Display for CredentialField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (or {})", self.attribute(), self.env_var())
    }
}

/// Explicit provider configuration as supplied by the orchestrator.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// PrivX API base URL.
    pub api_base_url: Option<String>,
    /// Pre-issued bearer token.
    pub api_bearer_token: Option<String>,
    /// API client access id.
    pub api_client_id: Option<String>,
    /// API client access secret.
    pub api_client_secret: Option<String>,
    /// OAuth client id.
    pub api_oauth_client_id: Option<String>,
    /// OAuth client secret.
    pub api_oauth_client_secret: Option<String>,
    /// Verbose logging toggle.
    pub debug: Option<bool>,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |value: &Option<String>| value.as_ref().map(|_| super::attributes::REDACTED);
        f.debug_struct("ProviderConfig")
            .field("api_base_url", &self.api_base_url)
            .field("api_bearer_token", &redact(&self.api_bearer_token))
            .field("api_client_id", &self.api_client_id)
            .field("api_client_secret", &redact(&self.api_client_secret))
            .field("api_oauth_client_id", &self.api_oauth_client_id)
            .field("api_oauth_client_secret", &redact(&self.api_oauth_client_secret))
            .field("debug", &self.debug)
            .finish()
    }
}

/// OAuth client-credentials material.
#[derive(Clone)]
pub struct ClientCredentials {
    /// API client access id.
    pub access_id: String,
    /// API client access secret.
    pub access_secret: Zeroizing<String>,
    /// OAuth client id.
    pub oauth_client_id: String,
    /// OAuth client secret.
    pub oauth_client_secret: Zeroizing<String>,
}

/// The one authentication strategy in effect.
pub enum Credential {
    /// Pre-issued token sent as `Authorization: Bearer <token>`.
    BearerToken(Zeroizing<String>),
    /// Token obtained through the OAuth client-credentials exchange.
    ClientCredentials(ClientCredentials),
}

impl Credential {
    /// Secret strings that must never reach diagnostics.
    pub fn secrets(&self) -> Vec<String> {
        let values: Vec<&str> = match self {
            Self::BearerToken(token) => vec![token.as_str()],
            Self::ClientCredentials(creds) => vec![
                creds.access_secret.as_str(),
                creds.oauth_client_secret.as_str(),
            ],
        };
        values
            .into_iter()
            .filter(|value| !value.is_empty())
            .map(str::to_owned)
            .collect()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BearerToken(_) => f.write_str("BearerToken(<redacted>)"),
            Self::ClientCredentials(creds) => f
                .debug_struct("ClientCredentials")
                .field("access_id", &creds.access_id)
                .field("access_secret", &"<redacted>")
                .field("oauth_client_id", &creds.oauth_client_id)
                .field("oauth_client_secret", &"<redacted>")
                .finish(),
        }
    }
}

/// Fully resolved provider settings.
#[derive(Debug)]
pub struct ResolvedConfig {
    /// PrivX API base URL.
    pub base_url: Url,
    /// Authentication strategy.
    pub credential: Credential,
    /// Whether verbose logging was requested.
    pub debug: bool,
}

/// A single configuration problem.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CredentialProblem {
    /// The field resolved to the empty string.
    #[error("missing {0}")]
    Missing(CredentialField),
    /// The field is set but unusable.
    #[error("invalid {field}: {reason}")]
    Invalid {
        /// Offending field.
        field: CredentialField,
        /// Why it was rejected.
        reason: String,
    },
}

impl CredentialProblem {
    /// Field this problem concerns.
    pub fn field(&self) -> CredentialField {
        match self {
            Self::Missing(field) | Self::Invalid { field, .. } => *field,
        }
    }
}

/// Every problem found while resolving credentials.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("provider configuration is incomplete: {}", join_problems(.problems))]
pub struct CredentialError {
    /// Problems in field order; never empty.
    pub problems: Vec<CredentialProblem>,
}

impl CredentialError {
    /// Whether `field` is among the reported problems.
    pub fn mentions(&self, field: CredentialField) -> bool {
        self.problems.iter().any(|problem| problem.field() == field)
    }
}

fn join_problems(problems: &[CredentialProblem]) -> String {
    problems
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn pick<E: Env>(env: &E, explicit: Option<&String>, field: CredentialField) -> String {
    match explicit {
        Some(value) => value.clone(),
        None => env.string(field.env_var()).unwrap_or_default(),
    }
}

/// Parse a boolean toggle using the `1|0|true|false|yes|no|y|n` vocabulary.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" => Some(true),
        "0" | "false" | "no" | "n" => Some(false),
        _ => None,
    }
}

/// Resolve the provider configuration against the environment.
///
/// # Examples
///
/// ```
/// use mockable::MockEnv;
/// use provider::domain::credentials::{resolve_credentials, Credential, ProviderConfig};
///
/// let mut env = MockEnv::new();
/// env.expect_string().returning(|name| match name {
///     "PRIVX_API_BASE_URL" => Some("https://privx.example.com".to_owned()),
///     "PRIVX_API_BEARER_TOKEN" => Some("token".to_owned()),
///     _ => None,
/// });
///
/// let resolved = resolve_credentials(&ProviderConfig::default(), &env).unwrap();
/// assert!(matches!(resolved.credential, Credential::BearerToken(_)));
/// ```
///
/// # Errors
///
/// Returns [`CredentialError`] listing every missing or invalid field.
pub fn resolve_credentials<E: Env>(
    config: &ProviderConfig,
    env: &E,
) -> Result<ResolvedConfig, CredentialError> {
    let mut problems = Vec::new();

    let base_url_text = pick(env, config.api_base_url.as_ref(), CredentialField::BaseUrl);
    let base_url = if base_url_text.trim().is_empty() {
        problems.push(CredentialProblem::Missing(CredentialField::BaseUrl));
        None
    } else {
        match Url::parse(base_url_text.trim()) {
            Ok(url) => Some(url),
            Err(error) => {
                problems.push(CredentialProblem::Invalid {
                    field: CredentialField::BaseUrl,
                    reason: error.to_string(),
                });
                None
            }
        }
    };

    let debug = match config.debug {
        Some(value) => value,
        None => match env.string(CredentialField::Debug.env_var()) {
            None => false,
            Some(raw) => parse_bool(&raw).unwrap_or_else(|| {
                problems.push(CredentialProblem::Invalid {
                    field: CredentialField::Debug,
                    reason: format!("expected {BOOL_EXPECTED}"),
                });
                false
            }),
        },
    };

    let bearer = Zeroizing::new(pick(
        env,
        config.api_bearer_token.as_ref(),
        CredentialField::BearerToken,
    ));
    let credential = if bearer.is_empty() {
        client_credentials(config, env, &mut problems)
    } else {
        Some(Credential::BearerToken(bearer))
    };

    match (base_url, credential) {
        (Some(base_url), Some(credential)) if problems.is_empty() => Ok(ResolvedConfig {
            base_url,
            credential,
            debug,
        }),
        _ => Err(CredentialError { problems }),
    }
}

fn client_credentials<E: Env>(
    config: &ProviderConfig,
    env: &E,
    problems: &mut Vec<CredentialProblem>,
) -> Option<Credential> {
    let access_id = pick(env, config.api_client_id.as_ref(), CredentialField::ClientId);
    let access_secret = Zeroizing::new(pick(
        env,
        config.api_client_secret.as_ref(),
        CredentialField::ClientSecret,
    ));
    let oauth_client_id = pick(
        env,
        config.api_oauth_client_id.as_ref(),
        CredentialField::OauthClientId,
    );
    let oauth_client_secret = Zeroizing::new(pick(
        env,
        config.api_oauth_client_secret.as_ref(),
        CredentialField::OauthClientSecret,
    ));

    let before = problems.len();
    for (value, field) in [
        (access_id.as_str(), CredentialField::ClientId),
        (access_secret.as_str(), CredentialField::ClientSecret),
        (oauth_client_id.as_str(), CredentialField::OauthClientId),
        (oauth_client_secret.as_str(), CredentialField::OauthClientSecret),
    ] {
        if value.is_empty() {
            problems.push(CredentialProblem::Missing(field));
        }
    }
    if problems.len() > before {
        return None;
    }

    Some(Credential::ClientCredentials(ClientCredentials {
        access_id,
        access_secret,
        oauth_client_id,
        oauth_client_secret,
    }))
}

#[cfg(test)]
mod tests;
