use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use std::sync::Arc;
use uuid::Uuid;

use super::AuthContext;
use crate::app::AppState;
use crate::error::ApiError;
use crate::services::realtime::{self, ChangeEvent, ChangeOp, Table};

/// Extractor that requires a valid bearer token.
///
/// The token comes from the `Authorization` header. The realtime feed also
/// takes an `access_token` query parameter, since `EventSource` cannot set
/// headers.
/// The caller's user row is created on first sight so foreign keys hold.
#[derive(Debug, Clone)]
pub struct RequireAuth(pub AuthContext);

impl std::ops::Deref for RequireAuth {
    type Target = AuthContext;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// The only path that accepts a token in the query string
const QUERY_TOKEN_PATH: &str = "/realtime";

fn bearer_token(parts: &Parts) -> Result<String, ApiError> {
    if let Some(header) = parts.headers.get(AUTHORIZATION) {
        let value = header
            .to_str()
            .map_err(|_| ApiError::Unauthorized("Invalid authorization format".into()))?;
        let token = value
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::Unauthorized("Invalid authorization format".into()))?;
        if token.is_empty() {
            return Err(ApiError::Unauthorized("Missing authorization token".into()));
        }
        return Ok(token.to_string());
    }

    if parts.uri.path() != QUERY_TOKEN_PATH {
        return Err(ApiError::Unauthorized("Missing authorization token".into()));
    }

    parts
        .uri
        .query()
        .and_then(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .find(|(k, _)| k == "access_token")
                .map(|(_, v)| v.into_owned())
        })
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("Missing authorization token".into()))
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for RequireAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;

        let claims = state.verifier.verify_token(&token).await.map_err(|e| {
            tracing::warn!(error = %e, "JWT verification failed");
            ApiError::Unauthorized("Invalid or expired token".into())
        })?;

        let context = AuthContext::from_claims(&claims).map_err(|e| {
            tracing::warn!(error = %e, "Failed to build auth context");
            ApiError::Unauthorized(e.to_string())
        })?;

        ensure_user(state, &context).await?;

        Ok(RequireAuth(context))
    }
}

async fn ensure_user(state: &AppState, ctx: &AuthContext) -> Result<(), ApiError> {
    if state.seen_users.read().contains(&ctx.user_id) {
        return Ok(());
    }

    let inserted = sqlx::query(
        r#"
        INSERT INTO users (id, email, name)
        VALUES ($1, $2, $3)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(ctx.user_id)
    .bind(&ctx.email)
    .bind(&ctx.name)
    .execute(&state.db)
    .await?
    .rows_affected();

    if inserted > 0 {
        tracing::info!(user_id = %ctx.user_id, "User registered on first sign-in");
        realtime::announce(&state.db, user_created(ctx.user_id)).await;
    }

    state.seen_users.write().insert(ctx.user_id);
    Ok(())
}

fn user_created(user_id: Uuid) -> ChangeEvent {
    ChangeEvent::new(Table::Users, ChangeOp::Insert, user_id)
}

/// Extractor for destructive operations; requires `users.is_admin`.
#[derive(Debug, Clone)]
pub struct RequireAdmin(pub AuthContext);

impl RequireAdmin {
    pub fn user_id(&self) -> Uuid {
        self.0.user_id
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for RequireAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let RequireAuth(auth) = RequireAuth::from_request_parts(parts, state).await?;

        let is_admin: Option<bool> = sqlx::query_scalar("SELECT is_admin FROM users WHERE id = $1")
            .bind(auth.user_id)
            .fetch_optional(&state.db)
            .await?;

        if is_admin != Some(true) {
            tracing::warn!(user_id = %auth.user_id, "Non-admin user attempted an admin action");
            return Err(ApiError::forbidden("Admin privileges required"));
        }

        Ok(RequireAdmin(auth))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(uri: &str, auth: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri(uri);
        if let Some(value) = auth {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn header_token_wins() {
        let p = parts("/realtime?access_token=query", Some("Bearer header"));
        assert_eq!(bearer_token(&p).unwrap(), "header");
    }

    #[test]
    fn query_token_fallback() {
        let p = parts("/realtime?table=bids&access_token=abc%2Edef", None);
        assert_eq!(bearer_token(&p).unwrap(), "abc.def");
    }

    #[test]
    fn query_token_only_on_the_realtime_feed() {
        for uri in [
            "/bids?access_token=abc",
            "/vendors/123?access_token=abc",
            "/realtime/extra?access_token=abc",
        ] {
            assert_eq!(
                bearer_token(&parts(uri, None)).unwrap_err().status_code(),
                axum::http::StatusCode::UNAUTHORIZED,
                "{}",
                uri
            );
        }
        assert_eq!(
            bearer_token(&parts("/realtime?access_token=abc", None)).unwrap(),
            "abc"
        );
    }

    #[tokio::test]
    async fn first_sight_users_are_announced() {
        use crate::services::realtime::{ChangeFilter, ChangeHub};

        let user_id = Uuid::new_v4();
        let hub = ChangeHub::new(4);
        let mut rx = hub.subscribe();

        let wire = realtime::payload(&user_created(user_id)).unwrap();
        hub.publish(serde_json::from_str(&wire).unwrap());

        let event = rx.recv().await.unwrap();
        assert_eq!((event.table, event.op, event.id), (Table::Users, ChangeOp::Insert, user_id));
        let users_only = ChangeFilter {
            table: Some(Table::Users),
            bid_id: None,
        };
        assert!(users_only.accepts(&event));
    }

    #[test]
    fn malformed_or_missing_tokens_are_unauthorized() {
        for p in [
            parts("/bids", None),
            parts("/bids", Some("Basic dXNlcg==")),
            parts("/bids", Some("Bearer ")),
            parts("/bids?access_token=", None),
        ] {
            assert_eq!(
                bearer_token(&p).unwrap_err().status_code(),
                axum::http::StatusCode::UNAUTHORIZED
            );
        }
    }
}
