//! GitHub App authentication.
//!
//! The App signs a short-lived RS256 assertion with its private key, lists its
//! installations, and exchanges the first installation for an installation
//! access token. Credential failures are not transient, so nothing here
//! retries.

use std::fmt;

use chrono::Utc;
use http::Method;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use super::error::ApiError;
use super::locator::BearerToken;
use super::models::{ApiInstallationToken, Installation};
use super::transport::{ApiRequest, Transport};

/// Seconds the assertion is back-dated to tolerate clock drift.
pub const CLOCK_DRIFT_SECONDS: i64 = 60;
/// Lifetime of the assertion; GitHub rejects anything beyond ten minutes.
pub const ASSERTION_LIFETIME_SECONDS: i64 = 10 * 60;

/// App identifier and PEM-encoded private key.
#[derive(Clone)]
pub struct AppCredentials {
    app_id: String,
    private_key: String,
}

impl AppCredentials {
    /// Creates credentials from the App id and its RSA private key.
    #[must_use]
    pub fn new(app_id: impl Into<String>, private_key: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            private_key: private_key.into(),
        }
    }

    /// The App identifier used as assertion issuer.
    #[must_use]
    pub const fn app_id(&self) -> &str {
        self.app_id.as_str()
    }
}

impl fmt::Debug for AppCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppCredentials")
            .field("app_id", &self.app_id)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Registered claims of the App assertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppClaims {
    /// Issued-at, back-dated by [`CLOCK_DRIFT_SECONDS`].
    pub iat: i64,
    /// Expiry, [`ASSERTION_LIFETIME_SECONDS`] after `now`.
    pub exp: i64,
    /// App identifier.
    pub iss: String,
}

impl AppClaims {
    /// Claims for an assertion issued at unix time `now`.
    #[must_use]
    pub fn issued_at(app_id: &str, now: i64) -> Self {
        Self {
            iat: now - CLOCK_DRIFT_SECONDS,
            exp: now + ASSERTION_LIFETIME_SECONDS,
            iss: app_id.to_owned(),
        }
    }
}

/// Signs the App assertion for unix time `now`.
///
/// # Errors
///
/// Returns [`ApiError::Signing`] when the private key is not a valid RSA PEM.
pub fn sign_app_assertion(credentials: &AppCredentials, now: i64) -> Result<BearerToken, ApiError> {
    let key = EncodingKey::from_rsa_pem(credentials.private_key.as_bytes()).map_err(|error| {
        ApiError::Signing {
            message: error.to_string(),
        }
    })?;
    let claims = AppClaims::issued_at(credentials.app_id(), now);
    let jwt = jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &key).map_err(
        |error| ApiError::Signing {
            message: error.to_string(),
        },
    )?;
    Ok(BearerToken::new(jwt))
}

/// Exchanges App credentials for an installation access token.
///
/// The first installation returned by GitHub is used.
///
/// # Errors
///
/// Returns [`ApiError::Authentication`] when either exchange answers with a
/// non-2xx status or the App has no installations, and propagates transport
/// and signing failures.
pub async fn exchange_installation_token<T>(
    transport: &T,
    credentials: &AppCredentials,
) -> Result<BearerToken, ApiError>
where
    T: Transport + ?Sized,
{
    let assertion = sign_app_assertion(credentials, Utc::now().timestamp())?;

    let installations: Vec<Installation> = transport
        .request(ApiRequest::get("/app/installations", &assertion))
        .await?
        .into_success("list app installations")
        .map_err(into_authentication)?;
    let installation = installations
        .first()
        .ok_or_else(|| ApiError::Authentication {
            message: format!("App {} has no installations", credentials.app_id()),
        })?;
    tracing::debug!("using installation {}", installation.id);

    let token: ApiInstallationToken = transport
        .request(ApiRequest::with_body(
            Method::POST,
            format!("/app/installations/{}/access_tokens", installation.id),
            &assertion,
            None,
        ))
        .await?
        .into_success("create installation access token")
        .map_err(into_authentication)?;

    Ok(BearerToken::new(token.token))
}

fn into_authentication(error: ApiError) -> ApiError {
    match error {
        ApiError::UnexpectedStatus {
            operation,
            status,
            message,
        } => ApiError::Authentication {
            message: format!("{operation} failed: GitHub returned {status} {message}"),
        },
        other => other,
    }
}
