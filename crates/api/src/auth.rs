//! Bearer token verification and the request actor extractor.

use std::convert::Infallible;

use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use common::{Actor, ParseRoleError, Role, UserId};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Claims carried by an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub role: String,
    pub exp: u64,
}

/// Why a request carries no usable identity.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,

    #[error("invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),

    #[error(transparent)]
    UnknownRole(#[from] ParseRoleError),
}

/// Verifies HS256 access tokens signed with the configured secret.
#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Decodes and validates `token` (signature and expiry), returning the
    /// actor it identifies.
    pub fn verify(&self, token: &str) -> Result<Actor, AuthError> {
        let claims = decode::<AccessClaims>(token, &self.key, &self.validation)?.claims;
        let role: Role = claims.role.parse()?;
        Ok(Actor::new(UserId::from_uuid(claims.id), role))
    }

    /// Resolves the actor from an `Authorization: Bearer <token>` header.
    pub fn actor_from_parts(&self, parts: &Parts) -> Result<Actor, AuthError> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::MissingToken)?;
        self.verify(token)
    }
}

/// The verified actor of a request, if any.
///
/// Never rejects: a missing or invalid token yields `None`, and each
/// operation decides whether it needs an identity.
#[derive(Debug, Clone, Copy)]
pub struct CurrentActor(pub Option<Actor>);

impl CurrentActor {
    pub fn actor(&self) -> Option<&Actor> {
        self.0.as_ref()
    }
}

impl<St> FromRequestParts<St> for CurrentActor
where
    TokenVerifier: FromRef<St>,
    St: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &St) -> Result<Self, Self::Rejection> {
        let verifier = TokenVerifier::from_ref(state);
        match verifier.actor_from_parts(parts) {
            Ok(actor) => Ok(CurrentActor(Some(actor))),
            Err(AuthError::MissingToken) => Ok(CurrentActor(None)),
            Err(err) => {
                tracing::debug!(error = %err, "rejecting access token");
                Ok(CurrentActor(None))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Request;
    use jsonwebtoken::{EncodingKey, Header, encode, get_current_timestamp};

    use super::*;

    const SECRET: &str = "test-secret";

    fn token(secret: &str, role: &str, exp: u64) -> (Uuid, String) {
        let id = Uuid::new_v4();
        let claims = AccessClaims {
            id,
            email: Some("user@example.com".to_string()),
            role: role.to_string(),
            exp,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap();
        (id, token)
    }

    fn parts_with(header: Option<String>) -> Parts {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = header {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn valid_token_yields_actor() {
        let (id, token) = token(SECRET, "manager", get_current_timestamp() + 600);
        let actor = TokenVerifier::new(SECRET).verify(&token).unwrap();
        assert_eq!(actor.id, UserId::from_uuid(id));
        assert_eq!(actor.role, Role::Manager);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let (_, token) = token("other-secret", "customer", get_current_timestamp() + 600);
        assert!(matches!(
            TokenVerifier::new(SECRET).verify(&token),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let (_, token) = token(SECRET, "customer", get_current_timestamp() - 3600);
        assert!(matches!(
            TokenVerifier::new(SECRET).verify(&token),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn unknown_role_is_rejected() {
        let (_, token) = token(SECRET, "superuser", get_current_timestamp() + 600);
        assert!(matches!(
            TokenVerifier::new(SECRET).verify(&token),
            Err(AuthError::UnknownRole(_))
        ));
    }

    #[test]
    fn header_must_be_a_bearer_token() {
        let verifier = TokenVerifier::new(SECRET);
        let (_, token) = token(SECRET, "customer", get_current_timestamp() + 600);

        assert!(matches!(
            verifier.actor_from_parts(&parts_with(None)),
            Err(AuthError::MissingToken)
        ));
        assert!(matches!(
            verifier.actor_from_parts(&parts_with(Some(format!("Basic {token}")))),
            Err(AuthError::MissingToken)
        ));
        assert!(
            verifier
                .actor_from_parts(&parts_with(Some(format!("Bearer {token}"))))
                .is_ok()
        );
    }
}
