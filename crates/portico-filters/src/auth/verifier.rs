//! JWT verification.

use super::store::{StoreError, TokenStateStore};
use crate::filter::BoxFuture;
use chrono::DateTime;
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use portico_core::{AuthContext, AuthFailureReason, GatewayError, GatewayResult};
use serde_json::Value;
use std::sync::Arc;

/// Turns a raw bearer token into a verified identity.
pub trait TokenVerifier: Send + Sync + std::fmt::Debug {
    /// Verifies `token`.
    ///
    /// Fails with [`GatewayError::Authentication`] when the token is
    /// rejected, or [`GatewayError::TokenStoreUnavailable`] when revocation
    /// state cannot be read.
    fn verify<'a>(&'a self, token: &'a str) -> BoxFuture<'a, GatewayResult<AuthContext>>;
}

/// Settings for [`JwtVerifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JwtSettings {
    /// HMAC secret.
    pub secret: String,
    /// Required `iss`, if any.
    pub issuer: Option<String>,
    /// Required `aud`, if any.
    pub audience: Option<String>,
    /// Clock skew tolerance in seconds.
    pub leeway_secs: u64,
    /// Claim holding the granted roles.
    pub roles_claim: String,
}

impl Default for JwtSettings {
    fn default() -> Self {
        Self {
            secret: String::new(),
            issuer: None,
            audience: None,
            leeway_secs: 30,
            roles_claim: "roles".to_string(),
        }
    }
}

/// HS256 JWT verifier with optional revocation lookup.
#[derive(Clone)]
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
    roles_claim: String,
    store: Option<Arc<dyn TokenStateStore>>,
}

impl std::fmt::Debug for JwtVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtVerifier")
            .field("roles_claim", &self.roles_claim)
            .field("store", &self.store.as_ref().map(|s| s.name()))
            .finish_non_exhaustive()
    }
}

impl JwtVerifier {
    /// Creates a verifier.
    #[must_use]
    pub fn new(settings: &JwtSettings) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = settings.leeway_secs;
        validation.set_required_spec_claims(&["exp", "sub"]);
        if let Some(issuer) = &settings.issuer {
            validation.set_issuer(&[issuer]);
        }
        match &settings.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        Self {
            key: DecodingKey::from_secret(settings.secret.as_bytes()),
            validation,
            roles_claim: settings.roles_claim.clone(),
            store: None,
        }
    }

    /// Checks every verified token against `store`.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn TokenStateStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Verifies signature and claims without consulting the store.
    pub fn decode(&self, token: &str) -> GatewayResult<AuthContext> {
        let data = decode::<Value>(token, &self.key, &self.validation).map_err(|e| {
            let reason = match e.kind() {
                JwtErrorKind::ExpiredSignature => AuthFailureReason::ExpiredToken,
                JwtErrorKind::InvalidSignature
                | JwtErrorKind::InvalidIssuer
                | JwtErrorKind::InvalidAudience
                | JwtErrorKind::ImmatureSignature
                | JwtErrorKind::InvalidAlgorithm => AuthFailureReason::InvalidSignature,
                _ => AuthFailureReason::MalformedToken,
            };
            tracing::debug!(error = %e, reason = %reason, "token rejected");
            GatewayError::authentication(reason)
        })?;

        self.context_from_claims(&data.claims)
    }

    fn context_from_claims(&self, claims: &Value) -> GatewayResult<AuthContext> {
        let malformed = || GatewayError::authentication(AuthFailureReason::MalformedToken);

        let subject = claims
            .get("sub")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(malformed)?;
        let expiry = claims
            .get("exp")
            .and_then(Value::as_i64)
            .and_then(|exp| DateTime::from_timestamp(exp, 0))
            .ok_or_else(malformed)?;

        let roles = roles_from_claim(claims.get(&self.roles_claim));
        let mut context = AuthContext::new(subject, roles, expiry);
        if let Some(jti) = claims.get("jti").and_then(Value::as_str) {
            context = context.with_token_id(jti);
        }
        Ok(context)
    }
}

impl TokenVerifier for JwtVerifier {
    fn verify<'a>(&'a self, token: &'a str) -> BoxFuture<'a, GatewayResult<AuthContext>> {
        Box::pin(async move {
            let context = self.decode(token)?;

            if let Some(store) = &self.store {
                let key = context.token_id().unwrap_or(token);
                match store.is_revoked(key).await {
                    Ok(false) => {}
                    Ok(true) => {
                        return Err(GatewayError::authentication(
                            AuthFailureReason::RevokedToken,
                        ));
                    }
                    Err(e) => {
                        tracing::error!(store = store.name(), error = %e, "token store lookup failed");
                        return Err(match e {
                            StoreError::Connection(msg) | StoreError::Command(msg) => {
                                GatewayError::token_store(msg)
                            }
                        });
                    }
                }
            }

            Ok(context)
        })
    }
}

/// Reads roles from a JSON array or a comma-separated string.
fn roles_from_claim(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(ToString::to_string)
            .collect(),
        Some(Value::String(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(ToString::to_string)
            .collect(),
        _ => Vec::new(),
    }
}
