//! Session tokens
//!
//! A session token is `base64url(claims JSON) "." hex(HMAC-SHA256(secret, first part))`,
//! sent either as `Authorization: Bearer <token>` or in the `noctua_session`
//! cookie. The identity provider that issues tokens is out of scope here; any
//! issuer sharing the secret works.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::request::Parts;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use hmac::{Hmac, Mac};
use noctua_core::Identity;
use noctua_core::storage::StorageTypes;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::collections::HashSet;
use thiserror::Error;
use tracing::debug;

use crate::error::ApiError;
use crate::state::AppState;

pub const SESSION_COOKIE: &str = "noctua_session";

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    /// Expiry, unix seconds
    pub exp: i64,
}

impl SessionClaims {
    pub fn new(email: impl Into<String>, exp: i64) -> Self {
        Self {
            email: email.into(),
            name: None,
            picture: None,
            exp,
        }
    }

    pub fn identity(&self) -> Identity {
        Identity::new(self.email.clone()).with_profile(self.name.clone(), self.picture.clone())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("no session token")]
    Missing,
    #[error("malformed session token")]
    Malformed,
    #[error("bad session signature")]
    BadSignature,
    #[error("session expired")]
    Expired,
    #[error("{0} is not on the allow-list")]
    NotAllowed(String),
}

#[derive(Clone)]
pub struct SessionSigner {
    secret: Vec<u8>,
}

impl SessionSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    fn mac(&self, payload: &str) -> Result<HmacSha256, AuthError> {
        let mut mac = HmacSha256::new_from_slice(&self.secret).map_err(|_| AuthError::BadSignature)?;
        mac.update(payload.as_bytes());
        Ok(mac)
    }

    pub fn sign(&self, claims: &SessionClaims) -> anyhow::Result<String> {
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims)?);
        let mac = self.mac(&payload)?;
        Ok(format!("{}.{}", payload, hex::encode(mac.finalize().into_bytes())))
    }

    /// Check the signature, then the expiry against `now` (unix seconds).
    pub fn verify(&self, token: &str, now: i64) -> Result<SessionClaims, AuthError> {
        let (payload, signature) = token.trim().split_once('.').ok_or(AuthError::Malformed)?;
        let signature = hex::decode(signature).map_err(|_| AuthError::Malformed)?;
        self.mac(payload)?
            .verify_slice(&signature)
            .map_err(|_| AuthError::BadSignature)?;

        let json = URL_SAFE_NO_PAD.decode(payload).map_err(|_| AuthError::Malformed)?;
        let claims: SessionClaims = serde_json::from_slice(&json).map_err(|_| AuthError::Malformed)?;
        if claims.email.trim().is_empty() {
            return Err(AuthError::Malformed);
        }
        if claims.exp <= now {
            return Err(AuthError::Expired);
        }
        Ok(claims)
    }
}

/// Verifies session tokens and applies the email allow-list
pub struct Authenticator {
    signer: SessionSigner,
    /// Lowercased; empty allows every signed session
    allowed: HashSet<String>,
}

impl Authenticator {
    pub fn new(signer: SessionSigner, allowed_emails: impl IntoIterator<Item = String>) -> Self {
        Self {
            signer,
            allowed: allowed_emails
                .into_iter()
                .map(|e| e.trim().to_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
        }
    }

    pub fn signer(&self) -> &SessionSigner {
        &self.signer
    }

    pub fn authenticate(&self, headers: &HeaderMap) -> Result<SessionClaims, AuthError> {
        let token = session_token(headers).ok_or(AuthError::Missing)?;
        let claims = self.signer.verify(&token, Utc::now().timestamp())?;
        if !self.allowed.is_empty() && !self.allowed.contains(&claims.email.to_lowercase()) {
            return Err(AuthError::NotAllowed(claims.email));
        }
        Ok(claims)
    }
}

/// Bearer token first, then the session cookie
fn session_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            let (scheme, token) = v.trim().split_once(' ')?;
            scheme.eq_ignore_ascii_case("bearer").then(|| token.trim().to_string())
        })
        .filter(|t| !t.is_empty());
    if bearer.is_some() {
        return bearer;
    }

    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// The signed-in user, extracted from the request's session
#[derive(Clone, Debug)]
pub struct CurrentUser(pub Identity);

#[async_trait]
impl<S: StorageTypes> FromRequestParts<AppState<S>> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState<S>) -> Result<Self, Self::Rejection> {
        match state.auth.authenticate(&parts.headers) {
            Ok(claims) => Ok(CurrentUser(claims.identity())),
            Err(e) => {
                debug!(path = %parts.uri.path(), "rejected session: {}", e);
                Err(ApiError::unauthorized())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const NOW: i64 = 1_700_000_000;

    fn signer() -> SessionSigner {
        SessionSigner::new("test-secret")
    }

    #[test]
    fn test_sign_then_verify() {
        let mut claims = SessionClaims::new("alice@example.com", NOW + 60);
        claims.name = Some("Alice".to_string());
        let token = signer().sign(&claims).unwrap();

        assert_eq!(signer().verify(&token, NOW).unwrap(), claims);
        assert_eq!(claims.identity().name.as_deref(), Some("Alice"));
    }

    #[test]
    fn test_verify_rejects_bad_tokens() {
        let token = signer()
            .sign(&SessionClaims::new("alice@example.com", NOW + 60))
            .unwrap();

        assert_eq!(
            SessionSigner::new("other").verify(&token, NOW),
            Err(AuthError::BadSignature)
        );
        assert_eq!(signer().verify(&token, NOW + 60), Err(AuthError::Expired));
        assert_eq!(signer().verify("no-dot", NOW), Err(AuthError::Malformed));
        assert_eq!(signer().verify("abc.not-hex", NOW), Err(AuthError::Malformed));

        // Payload swapped under a valid signature
        let (_, sig) = token.split_once('.').unwrap();
        let forged = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(br#"{"email":"mallory@example.com","exp":9999999999}"#),
            sig
        );
        assert_eq!(signer().verify(&forged, NOW), Err(AuthError::BadSignature));
    }

    #[test]
    fn test_token_from_bearer_or_cookie() {
        let mut headers = HeaderMap::new();
        assert_eq!(session_token(&headers), None);

        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; noctua_session=from-cookie"),
        );
        assert_eq!(session_token(&headers).as_deref(), Some("from-cookie"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        assert_eq!(session_token(&headers).as_deref(), Some("from-header"));
    }

    #[test]
    fn test_allow_list_is_case_insensitive() {
        let auth = Authenticator::new(signer(), vec!["Alice@Example.com".to_string()]);
        let far_future = Utc::now().timestamp() + 3600;

        let header = |email: &str| {
            let token = signer().sign(&SessionClaims::new(email, far_future)).unwrap();
            let mut headers = HeaderMap::new();
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
            );
            headers
        };

        assert!(auth.authenticate(&header("alice@example.com")).is_ok());
        assert_eq!(
            auth.authenticate(&header("bob@example.com")),
            Err(AuthError::NotAllowed("bob@example.com".to_string()))
        );

        let open = Authenticator::new(signer(), Vec::new());
        assert!(open.authenticate(&header("bob@example.com")).is_ok());
    }
}
