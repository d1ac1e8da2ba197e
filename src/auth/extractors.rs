use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::{debug, warn};

use crate::{
    auth::{
        dto::JwtKeys,
        session::{SessionContext, SessionId},
    },
    error::AppError,
    state::AppState,
};

/// The caller's session, resolved from `Authorization: Bearer <access token>`.
///
/// Never rejects a request for lack of credentials: a missing, expired or
/// logged-out token yields an empty context, and the operations that need an
/// identity fail with [`AppError::Unauthorized`] themselves.
#[derive(Debug, Clone, Copy)]
pub struct CurrentSession {
    pub id: Option<SessionId>,
    pub context: SessionContext,
}

impl CurrentSession {
    fn anonymous() -> Self {
        Self {
            id: None,
            context: SessionContext::new(),
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(header) = parts.headers.get(AUTHORIZATION) else {
            return Ok(Self::anonymous());
        };

        // Expect "Bearer <token>"
        let token = header
            .to_str()
            .ok()
            .and_then(|h| h.strip_prefix("Bearer ").or_else(|| h.strip_prefix("bearer ")))
            .ok_or(AppError::Unauthorized)?;

        let keys = JwtKeys::from_ref(state);
        let claims = match keys.verify_access(token) {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "invalid or expired token");
                return Ok(Self::anonymous());
            }
        };

        let context = state.sessions.context(claims.sid).await;
        if context.current() != Some(claims.sub) {
            debug!(session_id = %claims.sid, "token refers to an inactive session");
            return Ok(Self::anonymous());
        }

        Ok(Self {
            id: Some(claims.sid),
            context,
        })
    }
}
