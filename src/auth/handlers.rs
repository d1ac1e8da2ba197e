use axum::{
    extract::{rejection::JsonRejection, FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{AuthResponse, JwtKeys, LoginRequest, PublicUser, RefreshRequest, SignupRequest},
        extractors::CurrentSession,
        repo_types::User,
        services,
        session::SessionId,
    },
    db::UserId,
    error::AppError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
        }
    }
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PublicUser>), AppError> {
    let Json(payload) = payload?;
    if let Some(confirm) = payload.confirm_password.as_deref() {
        if confirm != payload.password {
            warn!("passwords don't match");
            return Err(AppError::Validation("passwords don't match".into()));
        }
    }

    let user_id = services::signup(
        &state.db,
        &payload.username,
        &payload.password,
        payload.email.as_deref(),
    )
    .await?;

    let user = load_user(&state, user_id).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, AppError> {
    let Json(payload) = payload?;
    let user_id = services::login(&state.db, &payload.username, &payload.password).await?;
    let sid = state.sessions.open(user_id).await;
    let (access_token, refresh_token) = issue_tokens(&state, user_id, sid)?;
    let user = load_user(&state, user_id).await?;

    info!(user_id = %user_id, session_id = %sid, "session established");
    Ok(Json(AuthResponse {
        access_token,
        refresh_token,
        user: user.into(),
    }))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, AppError> {
    let Json(payload) = payload?;
    let keys = JwtKeys::from_ref(&state);
    let claims = keys.verify_refresh(&payload.refresh_token).map_err(|e| {
        warn!(error = %e, "refresh token rejected");
        AppError::Unauthorized
    })?;

    let context = state.sessions.context(claims.sid).await;
    if context.current() != Some(claims.sub) {
        warn!(session_id = %claims.sid, "refresh for inactive session");
        return Err(AppError::Unauthorized);
    }
    state.sessions.establish(claims.sid, claims.sub).await;

    let (access_token, refresh_token) = issue_tokens(&state, claims.sub, claims.sid)?;
    let user = load_user(&state, claims.sub).await?;
    Ok(Json(AuthResponse {
        access_token,
        refresh_token,
        user: user.into(),
    }))
}

#[instrument(skip(state, session))]
pub async fn logout(
    State(state): State<AppState>,
    session: CurrentSession,
) -> Result<StatusCode, AppError> {
    let user_id = session.context.require()?;
    let sid = session.id.ok_or(AppError::Unauthorized)?;
    state.sessions.clear(sid).await;
    info!(user_id = %user_id, session_id = %sid, "user logged out");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, session))]
pub async fn get_me(
    State(state): State<AppState>,
    session: CurrentSession,
) -> Result<Json<PublicUser>, AppError> {
    let user_id = session.context.require()?;
    let user = load_user(&state, user_id).await?;
    Ok(Json(user.into()))
}

fn issue_tokens(
    state: &AppState,
    user_id: UserId,
    sid: SessionId,
) -> Result<(String, String), AppError> {
    let keys = JwtKeys::from_ref(state);
    let access_token = keys.sign_access(user_id, sid)?;
    let refresh_token = keys.sign_refresh(user_id, sid)?;
    Ok((access_token, refresh_token))
}

async fn load_user(state: &AppState, user_id: UserId) -> Result<User, AppError> {
    User::find_by_id(&state.db, user_id)
        .await?
        .ok_or(AppError::Unauthorized)
}
