//! Authenticated HTTP transport shared by every PrivX client.
//!
//! The transport owns the reqwest client, the base URL and the bearer
//! token. OAuth tokens are cached and re-acquired once they expire; the
//! cache lock is never held across a network call.

use std::time::{Duration, Instant};

use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use tracing::debug;
use zeroize::Zeroizing;

use crate::domain::credentials::{ClientCredentials, Credential};
use crate::domain::ports::RemoteError;

const TOKEN_PATH: &str = "auth/api/v1/oauth/token";
/// Tokens are renewed this long before the server says they expire.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(30);
/// Upper bound on how long a cached token is trusted.
const MAX_TOKEN_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: u64,
}

struct CachedToken {
    value: Zeroizing<String>,
    expires_at: Instant,
}

enum TokenSource {
    Static(Zeroizing<String>),
    OAuth {
        credentials: ClientCredentials,
        cached: RwLock<Option<CachedToken>>,
    },
}

/// HTTP access to one PrivX deployment.
pub struct PrivxTransport {
    client: Client,
    base_url: Url,
    tokens: TokenSource,
}

impl PrivxTransport {
    /// Build a transport for `base_url` using `credential`.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(
        base_url: Url,
        credential: &Credential,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        let tokens = match credential {
            Credential::BearerToken(token) => TokenSource::Static(token.clone()),
            Credential::ClientCredentials(credentials) => TokenSource::OAuth {
                credentials: credentials.clone(),
                cached: RwLock::new(None),
            },
        };
        Ok(Self {
            client,
            base_url,
            tokens,
        })
    }

    /// URL for `path` below the base URL, followed by `segments`. Each
    /// segment is escaped as a single path component.
    pub fn url(&self, path: &str, segments: &[&str]) -> Result<Url, RemoteError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                RemoteError::transport(format!("base URL {} cannot hold a path", self.base_url))
            })?
            .pop_if_empty()
            .extend(path.split('/').filter(|part| !part.is_empty()))
            .extend(segments);
        Ok(url)
    }

    /// Current bearer token, acquiring a fresh one when needed.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError`] when the token exchange fails.
    pub async fn bearer(&self) -> Result<Zeroizing<String>, RemoteError> {
        let (credentials, cached) = match &self.tokens {
            TokenSource::Static(token) => return Ok(token.clone()),
            TokenSource::OAuth {
                credentials,
                cached,
            } => (credentials, cached),
        };

        if let Some(token) = cached.read().await.as_ref() {
            if Instant::now() < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        let fresh = self.exchange(credentials).await?;
        let value = fresh.value.clone();
        *cached.write().await = Some(fresh);
        Ok(value)
    }

    async fn exchange(&self, credentials: &ClientCredentials) -> Result<CachedToken, RemoteError> {
        let url = self.url(TOKEN_PATH, &[])?;
        debug!(%url, access_id = %credentials.access_id, "requesting access token");
        let form = [
            ("grant_type", "password"),
            ("username", credentials.access_id.as_str()),
            ("password", credentials.access_secret.as_str()),
        ];
        let response = self
            .client
            .post(url)
            .basic_auth(
                &credentials.oauth_client_id,
                Some(credentials.oauth_client_secret.as_str()),
            )
            .form(&form)
            .send()
            .await
            .map_err(map_transport_error)?;
        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(map_status_error(status, &body));
        }
        let token: TokenResponse = decode_json(&body)?;
        Ok(CachedToken {
            value: Zeroizing::new(token.access_token),
            expires_at: token_deadline(Instant::now(), token.expires_in),
        })
    }

    /// Start an authenticated request.
    async fn request(&self, method: Method, url: Url) -> Result<RequestBuilder, RemoteError> {
        let token = self.bearer().await?;
        Ok(self.client.request(method, url).bearer_auth(token.as_str()))
    }

    /// Send `request` and return the raw body of a successful response.
    pub async fn send(
        &self,
        method: Method,
        url: Url,
        configure: impl FnOnce(RequestBuilder) -> RequestBuilder,
    ) -> Result<Vec<u8>, RemoteError> {
        debug!(%method, %url, "privx request");
        let response = configure(self.request(method.clone(), url.clone()).await?)
            .send()
            .await
            .map_err(map_transport_error)?;
        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;
        debug!(%method, %url, status = status.as_u16(), "privx response");
        if !status.is_success() {
            return Err(map_status_error(status, &body));
        }
        Ok(body.to_vec())
    }

    /// Send `request` and decode a JSON response.
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        configure: impl FnOnce(RequestBuilder) -> RequestBuilder,
    ) -> Result<T, RemoteError> {
        let body = self.send(method, url, configure).await?;
        decode_json(&body)
    }
}

/// When a token issued at `now` with `expires_in` seconds must be renewed.
fn token_deadline(now: Instant, expires_in: u64) -> Instant {
    let lifetime = Duration::from_secs(expires_in)
        .min(MAX_TOKEN_LIFETIME)
        .saturating_sub(TOKEN_EXPIRY_MARGIN);
    now.checked_add(lifetime).unwrap_or(now)
}

pub(super) fn decode_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, RemoteError> {
    serde_json::from_slice(body).map_err(|error| {
        RemoteError::decode(format!("invalid PrivX JSON payload: {error}"))
    })
}

fn map_transport_error(error: reqwest::Error) -> RemoteError {
    if error.is_timeout() {
        RemoteError::timeout(error.to_string())
    } else {
        RemoteError::transport(error.to_string())
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error_code: String,
    #[serde(default)]
    error_message: String,
}

fn map_status_error(status: StatusCode, body: &[u8]) -> RemoteError {
    let detail = match serde_json::from_slice::<ErrorBody>(body) {
        Ok(parsed) if !parsed.error_message.is_empty() => {
            if parsed.error_code.is_empty() {
                parsed.error_message
            } else {
                format!("{}: {}", parsed.error_code, parsed.error_message)
            }
        }
        _ => body_preview(body),
    };
    let message = if detail.is_empty() {
        format!("status {}", status.as_u16())
    } else {
        format!("status {}: {detail}", status.as_u16())
    };

    match status {
        StatusCode::NOT_FOUND => RemoteError::not_found(message),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RemoteError::unauthorized(message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => RemoteError::timeout(message),
        _ if status.is_client_error() => RemoteError::rejected(status.as_u16(), message),
        _ => RemoteError::transport(message),
    }
}

fn body_preview(body: &[u8]) -> String {
    const PREVIEW_CHAR_LIMIT: usize = 160;

    let compact = String::from_utf8_lossy(body)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let preview = compact.chars().take(PREVIEW_CHAR_LIMIT).collect::<String>();
    if compact.chars().count() > PREVIEW_CHAR_LIMIT {
        format!("{preview}...")
    } else {
        preview
    }
}

#[cfg(test)]
mod tests {
    //! Status mapping and URL construction.

    use super::*;
    use rstest::rstest;

    fn transport(base: &str) -> PrivxTransport {
        PrivxTransport::new(
            Url::parse(base).expect("valid URL"),
            &Credential::BearerToken(Zeroizing::new("token".to_owned())),
            Duration::from_secs(5),
        )
        .expect("client builds")
    }

    #[rstest]
    #[case::root("https://privx.example", "https://privx.example/vault/api/v1/secrets/a%20b%2Fc")]
    #[case::prefixed(
        "https://privx.example/api/",
        "https://privx.example/api/vault/api/v1/secrets/a%20b%2Fc"
    )]
    fn urls_append_escaped_segments(#[case] base: &str, #[case] expected: &str) {
        let url = transport(base)
            .url("/vault/api/v1/secrets", &["a b/c"])
            .expect("url builds");
        assert_eq!(url.as_str(), expected);
    }

    #[rstest]
    #[case::not_found(StatusCode::NOT_FOUND, "NotFound")]
    #[case::unauthorized(StatusCode::UNAUTHORIZED, "Unauthorized")]
    #[case::gateway_timeout(StatusCode::GATEWAY_TIMEOUT, "Timeout")]
    #[case::bad_request(StatusCode::BAD_REQUEST, "Rejected")]
    #[case::server_error(StatusCode::INTERNAL_SERVER_ERROR, "Transport")]
    fn maps_http_statuses_to_remote_errors(#[case] status: StatusCode, #[case] expected: &str) {
        let error = map_status_error(status, br#"{"error_code":"E","error_message":"nope"}"#);
        let matched = match expected {
            "NotFound" => matches!(error, RemoteError::NotFound { .. }),
            "Unauthorized" => matches!(error, RemoteError::Unauthorized { .. }),
            "Timeout" => matches!(error, RemoteError::Timeout { .. }),
            "Rejected" => matches!(error, RemoteError::Rejected { status: 400, .. }),
            "Transport" => matches!(error, RemoteError::Transport { .. }),
            _ => panic!("unsupported test expectation: {expected}"),
        };
        assert!(matched, "{status} mapped to {error:?}");
        assert!(error.message().contains("E: nope"));
    }

    #[rstest]
    #[case::ordinary(300, Duration::from_secs(270))]
    #[case::shorter_than_margin(10, Duration::ZERO)]
    #[case::absurd(u64::MAX, MAX_TOKEN_LIFETIME - TOKEN_EXPIRY_MARGIN)]
    fn token_lifetimes_are_bounded(#[case] expires_in: u64, #[case] expected: Duration) {
        let now = Instant::now();
        assert_eq!(token_deadline(now, expires_in) - now, expected);
    }

    #[rstest]
    fn long_non_json_bodies_are_truncated() {
        let body = "x".repeat(400);
        let error = map_status_error(StatusCode::BAD_GATEWAY, body.as_bytes());
        assert!(error.message().ends_with("..."));
        assert!(error.message().len() < 200);
    }
}
