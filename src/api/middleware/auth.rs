use crate::utils::auth::{Claims, validate_jwt};
use crate::{AppState, entities::prelude::Users};
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use sea_orm::EntityTrait;
use serde::Deserialize;

/// Claims for routes that accept anonymous sessions. Always inserted by
/// `optional_auth_middleware`, `None` when no valid token was presented.
#[derive(Clone, Debug)]
pub struct OptionalClaims(pub Option<Claims>);

#[derive(Deserialize)]
struct AuthQuery {
    token: Option<String>,
}

fn bearer_token(req: &Request) -> Option<String> {
    let header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|s| s.to_string());

    header.or_else(|| {
        // Media elements cannot set headers; allow ?token= for file serving.
        let query = req.uri().query().unwrap_or_default();
        serde_urlencoded::from_str::<AuthQuery>(query)
            .ok()
            .and_then(|q| q.token)
    })
}

async fn resolve_claims(
    state: &AppState,
    token: Option<String>,
) -> Result<Option<Claims>, StatusCode> {
    let Some(token) = token else {
        return Ok(None);
    };

    let Ok(claims) = validate_jwt(&token, &state.config.jwt_secret) else {
        return Ok(None);
    };

    // Check if user still exists in DB
    let user_exists = Users::find_by_id(claims.sub.clone())
        .one(&state.db)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .is_some();

    Ok(user_exists.then_some(claims))
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    match resolve_claims(&state, &req).await? {
        Some(claims) => {
            req.extensions_mut().insert(claims);
            Ok(next.run(req).await)
        }
        None => Err(StatusCode::UNAUTHORIZED),
    }
}

/// Like `auth_middleware`, but an absent or invalid token continues the
/// request anonymously instead of rejecting it.
pub async fn optional_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let claims = resolve_claims(&state, &req).await?;
    req.extensions_mut().insert(OptionalClaims(claims));
    Ok(next.run(req).await)
}
