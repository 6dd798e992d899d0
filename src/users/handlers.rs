use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument};

use super::{
    dto::{CreateUserRequest, TokenRequest, TokenResponse, UpdateMeRequest, UserResponse},
    service::{self, ProfileUpdate, Registration},
};
use crate::{
    auth::{AuthUser, JwtKeys},
    error::{AppError, AppJson},
    state::AppState,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/user/", post(create_user))
        .route("/user/auth/", post(create_token))
        .route(
            "/user/me/",
            get(get_me)
                .patch(update_me)
                .post(method_not_allowed)
                .put(method_not_allowed),
        )
}

#[instrument(skip(state, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    let input = Registration {
        email: payload.email,
        password: payload.password,
        name: payload.name,
    };
    let user = service::register(
        state.users.as_ref(),
        input,
        state.config.password_min_length,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[instrument(skip(state, payload))]
pub async fn create_token(
    State(state): State<AppState>,
    AppJson(payload): AppJson<TokenRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let user = service::authenticate(
        state.users.as_ref(),
        payload.email.as_deref(),
        payload.password.as_deref(),
    )
    .await?;

    let token = JwtKeys::from_ref(&state).sign(user.id)?;
    info!(user_id = %user.id, "token issued");
    Ok(Json(TokenResponse { token }))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<UserResponse>, AppError> {
    let user = service::current_user(state.users.as_ref(), user_id).await?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, payload))]
pub async fn update_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppJson(payload): AppJson<UpdateMeRequest>,
) -> Result<Json<UserResponse>, AppError> {
    service::current_user(state.users.as_ref(), user_id).await?;
    let update = ProfileUpdate {
        name: payload.name,
        password: payload.password,
    };
    let user = service::update_profile(
        state.users.as_ref(),
        user_id,
        update,
        state.config.password_min_length,
    )
    .await?;
    info!(%user_id, "profile updated");
    Ok(Json(user.into()))
}

async fn method_not_allowed(_user: AuthUser) -> AppError {
    AppError::MethodNotAllowed
}
