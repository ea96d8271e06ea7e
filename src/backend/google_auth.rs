//! Service-account authentication for Google APIs.
//!
//! A [`GoogleConnector`] turns the credentials blob into a [`GoogleAuth`]
//! (signing key, HTTP client, cached access token). Each backend owns a
//! [`GoogleSession`] that connects on first use and keeps the result.

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OnceCell};

use super::{BackendError, ConnectError};

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// Tokens this close to expiry are refreshed before use.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    pub fn from_json(json: &str) -> Result<Self, ConnectError> {
        if json.trim().is_empty() {
            return Err(ConnectError::MissingCredentials);
        }
        serde_json::from_str(json).map_err(|e| ConnectError::InvalidCredentials(e.to_string()))
    }
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// Builds authenticated Google clients from a service account blob.
#[derive(Clone)]
pub struct GoogleConnector {
    credentials_json: String,
    scope: &'static str,
    timeout: Duration,
}

impl GoogleConnector {
    pub fn new(credentials_json: impl Into<String>, scope: &'static str, timeout: Duration) -> Self {
        Self {
            credentials_json: credentials_json.into(),
            scope,
            timeout,
        }
    }

    pub fn connect(&self) -> Result<GoogleAuth, ConnectError> {
        let key = ServiceAccountKey::from_json(&self.credentials_json)?;
        let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| ConnectError::InvalidCredentials(e.to_string()))?;
        let http = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| ConnectError::Client(e.to_string()))?;

        tracing::info!(account = %key.client_email, scope = self.scope, "Google client created");

        Ok(GoogleAuth {
            key,
            signing_key,
            scope: self.scope,
            http,
            token: Mutex::new(None),
        })
    }
}

pub struct GoogleAuth {
    key: ServiceAccountKey,
    signing_key: EncodingKey,
    scope: &'static str,
    http: reqwest::Client,
    token: Mutex<Option<CachedToken>>,
}

impl GoogleAuth {
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Returns a bearer token, exchanging a fresh assertion when the cached
    /// one is missing or about to expire.
    pub async fn access_token(&self) -> Result<String, ConnectError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() + REFRESH_MARGIN {
                return Ok(token.value.clone());
            }
        }

        let fresh = self.fetch_token().await?;
        let value = fresh.value.clone();
        *cached = Some(fresh);
        Ok(value)
    }

    async fn fetch_token(&self) -> Result<CachedToken, ConnectError> {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            iss: &self.key.client_email,
            scope: self.scope,
            aud: &self.key.token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };
        let assertion = encode(&Header::new(Algorithm::RS256), &claims, &self.signing_key)
            .map_err(|e| ConnectError::Token(e.to_string()))?;

        let response = self
            .http
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| ConnectError::Token(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ConnectError::Token(format!("{status}: {body}")));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ConnectError::Token(e.to_string()))?;

        tracing::debug!(expires_in = token.expires_in, "Fetched Google access token");

        Ok(CachedToken {
            value: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        })
    }
}

/// Lazily connected Google client shared by one backend.
pub struct GoogleSession {
    connector: GoogleConnector,
    auth: OnceCell<GoogleAuth>,
}

impl GoogleSession {
    pub fn new(connector: GoogleConnector) -> Self {
        Self {
            connector,
            auth: OnceCell::new(),
        }
    }

    /// Connects on first call. A failed attempt is not cached, so the next
    /// call tries again.
    pub async fn auth(&self) -> Result<&GoogleAuth, ConnectError> {
        self.auth
            .get_or_try_init(|| async {
                self.connector.connect().inspect_err(|e| {
                    tracing::error!(error = %e, "Failed to create Google client");
                })
            })
            .await
    }

    /// Proves the credentials work by obtaining an access token.
    pub async fn check(&self) -> Result<(), BackendError> {
        self.auth().await?.access_token().await?;
        Ok(())
    }

    /// Sends an authenticated request and maps non-success statuses.
    pub async fn send<F>(&self, build: F) -> Result<Response, BackendError>
    where
        F: FnOnce(&reqwest::Client) -> RequestBuilder,
    {
        let auth = self.auth().await?;
        let token = auth.access_token().await?;
        let response = build(auth.http()).bearer_auth(token).send().await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, &body))
    }
}

/// Turns a Google error response into a [`BackendError`]. Missing resources
/// and unparseable sheet ranges both mean "not there".
pub(crate) fn status_error(status: StatusCode, body: &str) -> BackendError {
    let message = error_message(body);
    let missing_range = status == StatusCode::BAD_REQUEST && message.contains("Unable to parse range");

    if status == StatusCode::NOT_FOUND || missing_range {
        BackendError::NotFound(message)
    } else {
        BackendError::Status {
            status: status.as_u16(),
            message,
        }
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => envelope.error.message,
        Err(_) => body.chars().take(200).collect(),
    }
}
