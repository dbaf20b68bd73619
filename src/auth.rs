use axum::{
    extract::{FromRef, FromRequestParts},
    http::{StatusCode, header, request::Parts},
};
use jsonwebtoken::{DecodingKey, Validation, decode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env},
    models::User,
    policy::Viewer,
    repository::RepositoryState,
};

/// Header accepted in `Env::Local` in place of a token.
pub const LOCAL_USER_HEADER: &str = "x-user-id";

/// Claims
///
/// Payload of the HS256 JWT issued by the external identity provider.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user's UUID (`profiles.id`).
    pub sub: Uuid,
    pub exp: usize,
    pub iat: usize,
}

/// AuthUser
///
/// The resolved identity of an authenticated request. Always re-read from the store, so
/// a deleted account or a revoked staff flag takes effect on the next request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub username: String,
    pub is_staff: bool,
}

impl From<User> for AuthUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            is_staff: user.is_staff,
        }
    }
}

async fn load_user(repo: &RepositoryState, id: Uuid) -> Result<Option<User>, StatusCode> {
    repo.get_user(id).await.map_err(|e| {
        tracing::error!("identity lookup failed: {:?}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

fn has_credentials(parts: &Parts, env: &Env) -> bool {
    parts.headers.contains_key(header::AUTHORIZATION)
        || (*env == Env::Local && parts.headers.contains_key(LOCAL_USER_HEADER))
}

/// AuthUser Extractor Implementation
///
/// 1. Local bypass: in `Env::Local` an `x-user-id` header naming an existing user is
///    accepted as-is.
/// 2. Otherwise a `Bearer` token is required and decoded with the configured secret.
/// 3. The token subject must still exist in the store.
///
/// Rejection: 401 on any authentication failure, 500 if the store is unreachable.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        if config.env == Env::Local {
            let local_id = parts
                .headers
                .get(LOCAL_USER_HEADER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| Uuid::parse_str(value).ok());
            if let Some(user_id) = local_id {
                if let Some(user) = load_user(&repo, user_id).await? {
                    return Ok(user.into());
                }
            }
        }

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(StatusCode::UNAUTHORIZED)?;

        let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());
        let mut validation = Validation::default();
        validation.validate_exp = true;

        let token_data = decode::<Claims>(token, &decoding_key, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => tracing::debug!("rejected expired token"),
                other => tracing::debug!("rejected token: {:?}", other),
            }
            StatusCode::UNAUTHORIZED
        })?;

        load_user(&repo, token_data.claims.sub)
            .await?
            .map(AuthUser::from)
            .ok_or(StatusCode::UNAUTHORIZED)
    }
}

/// Viewer Extractor Implementation
///
/// For routes readable by anyone. No credentials at all yields `Viewer::Anonymous`;
/// credentials that are present but invalid are still rejected with 401 rather than
/// silently downgraded.
impl<S> FromRequestParts<S> for Viewer
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config = AppConfig::from_ref(state);
        if !has_credentials(parts, &config.env) {
            return Ok(Viewer::Anonymous);
        }
        let user = AuthUser::from_request_parts(parts, state).await?;
        Ok(Viewer::from(&user))
    }
}
