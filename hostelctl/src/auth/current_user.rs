use crate::{
    AppState,
    api::models::users::CurrentUser,
    auth::session,
    db::{errors::DbError, handlers::Users},
    errors::{Error, Result},
};
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use tracing::{debug, instrument, trace};

/// Pull the bearer token out of the `Authorization` header.
/// Returns:
/// - None: no header, or not a Bearer credential
/// - Some(token): the raw token text
fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    #[instrument(skip(parts, state))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let Some(token) = bearer_token(parts) else {
            trace!("No bearer token in request");
            return Err(Error::Unauthenticated { message: None });
        };

        let claims = session::verify_session_token(token, &state.config)?;

        // The token only carries an id; user, role and grants are always read fresh
        let mut conn = state.db.acquire().await.map_err(DbError::from)?;
        let Some(context) = Users::new(&mut conn).auth_context(claims.sub).await? else {
            debug!(user_id = %claims.sub, "token subject no longer exists");
            return Err(Error::Unauthenticated { message: None });
        };

        if !context.user.lifecycle.is_active() || !context.role_lifecycle.is_active() {
            debug!(user_id = %claims.sub, "user or role is inactive");
            return Err(Error::Unauthenticated { message: None });
        }

        Ok(CurrentUser::from(context))
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        api::models::users::CurrentUser,
        auth::session::create_session_token,
        db::handlers::{Repository, Roles, Users},
        db::models::{roles::RoleUpdateDBRequest, users::UserUpdateDBRequest},
        errors::Error,
        test_utils::{create_test_state, create_test_user},
        types::{Lifecycle, PermissionKey},
    };
    use axum::{extract::FromRequestParts as _, http::request::Parts};
    use sqlx::PgPool;

    fn parts_with_authorization(value: Option<&str>) -> Parts {
        let mut builder = axum::http::Request::builder().uri("http://localhost/api/test");
        if let Some(value) = value {
            builder = builder.header("authorization", value);
        }
        let (parts, _body) = builder.body(()).unwrap().into_parts();
        parts
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_valid_token_loads_permissions(pool: PgPool) {
        let state = create_test_state(pool.clone());
        let user = create_test_user(&pool, &[PermissionKey::RoomView, PermissionKey::BedView]).await;
        let token = create_session_token(user.id, &user.role_code, &state.config).unwrap();

        let mut parts = parts_with_authorization(Some(&format!("Bearer {token}")));
        let current = CurrentUser::from_request_parts(&mut parts, &state).await.unwrap();

        assert_eq!(current.id, user.id);
        assert_eq!(current.email, user.email);
        assert_eq!(current.permissions.len(), 2);
        assert!(current.permissions.contains(&PermissionKey::RoomView));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_missing_or_garbage_token_rejected(pool: PgPool) {
        let state = create_test_state(pool);

        let mut parts = parts_with_authorization(None);
        let result = CurrentUser::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(Error::Unauthenticated { .. })));

        let mut parts = parts_with_authorization(Some("Bearer not-a-jwt"));
        let result = CurrentUser::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(Error::Unauthenticated { .. })));

        let mut parts = parts_with_authorization(Some("Basic dXNlcjpwYXNz"));
        let result = CurrentUser::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(Error::Unauthenticated { .. })));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_deactivated_user_is_rejected_with_live_token(pool: PgPool) {
        let state = create_test_state(pool.clone());
        let user = create_test_user(&pool, &[PermissionKey::RoomView]).await;
        let token = create_session_token(user.id, &user.role_code, &state.config).unwrap();

        let mut conn = pool.acquire().await.unwrap();
        Users::new(&mut conn)
            .update(
                user.id,
                &UserUpdateDBRequest {
                    lifecycle: Some(Lifecycle::Inactive),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let mut parts = parts_with_authorization(Some(&format!("Bearer {token}")));
        let result = CurrentUser::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(Error::Unauthenticated { .. })));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_deactivated_role_is_rejected(pool: PgPool) {
        let state = create_test_state(pool.clone());
        let user = create_test_user(&pool, &[PermissionKey::RoomView]).await;
        let token = create_session_token(user.id, &user.role_code, &state.config).unwrap();

        let mut conn = pool.acquire().await.unwrap();
        Roles::new(&mut conn)
            .update(
                user.role_id,
                &RoleUpdateDBRequest {
                    lifecycle: Some(Lifecycle::Inactive),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let mut parts = parts_with_authorization(Some(&format!("Bearer {token}")));
        let result = CurrentUser::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(Error::Unauthenticated { .. })));
    }
}
