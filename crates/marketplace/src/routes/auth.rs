//! Account routes: registration, sessions, profile and password recovery.

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_sessions::Session;
use tracing::instrument;

use harvest_market_core::{CityId, StateId, UserRole};

use crate::db::UserRepository;
use crate::db::users::ProfileUpdate;
use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::extract::Json;
use crate::middleware::{
    RequireAuth, auth_rate_limiter, clear_current_user, rate_limit_json, set_current_user,
};
use crate::models::{CurrentUser, User};
use crate::routes::reference::check_location;
use crate::services::auth::{AuthService, Registration};
use crate::state::AppState;
use crate::validation;

const MAX_NAME_LENGTH: usize = 100;
const MAX_PHONE_LENGTH: usize = 32;

pub fn router() -> Router<AppState> {
    let limited = Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/password/forgot", post(forgot_password))
        .route("/password/reset", post(reset_password))
        .layer(auth_rate_limiter())
        .layer(axum::middleware::map_response(rate_limit_json));

    Router::new()
        .route("/logout", post(logout))
        .route("/me", get(me).put(update_me))
        .route("/password", put(change_password))
        .merge(limited)
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
    pub role: Option<UserRole>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ProfileRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
    pub state_id: Option<StateId>,
    pub city_id: Option<CityId>,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub code: String,
    pub new_password: String,
}

async fn sign_in(session: &Session, user: &User) -> Result<()> {
    set_current_user(session, &CurrentUser::from(user)).await?;
    set_sentry_user(&user.id, Some(user.email.as_str()));
    Ok(())
}

/// Create a buyer or seller account and sign it in.
#[instrument(skip(state, session, body), fields(email = %body.email))]
async fn register(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<User>)> {
    let auth = AuthService::new(state.pool(), state.email());
    let user = auth
        .register(&Registration {
            name: &body.name,
            email: &body.email,
            password: &body.password,
            phone: body.phone.as_deref(),
            role: body.role.unwrap_or(UserRole::Buyer),
        })
        .await?;

    sign_in(&session, &user).await?;
    tracing::info!(user_id = %user.id, role = %user.role, "User registered");

    Ok((StatusCode::CREATED, Json(user)))
}

#[instrument(skip(state, session, body), fields(email = %body.email))]
async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<LoginRequest>,
) -> Result<Json<User>> {
    let auth = AuthService::new(state.pool(), state.email());
    let user = auth.login(&body.email, &body.password).await?;

    sign_in(&session, &user).await?;
    tracing::info!(user_id = %user.id, "User logged in");

    Ok(Json(user))
}

async fn logout(session: Session) -> Result<StatusCode> {
    clear_current_user(&session).await?;
    clear_sentry_user();
    Ok(StatusCode::NO_CONTENT)
}

async fn me(State(state): State<AppState>, RequireAuth(current): RequireAuth) -> Result<Json<User>> {
    let user = UserRepository::new(state.pool())
        .get_by_id(current.id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Login required".to_string()))?;
    Ok(Json(user))
}

#[instrument(skip(state, current, body), fields(user_id = %current.id))]
async fn update_me(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Json(body): Json<ProfileRequest>,
) -> Result<Json<User>> {
    let update = ProfileUpdate {
        name: body
            .name
            .as_deref()
            .map(|name| validation::required_text("name", name, MAX_NAME_LENGTH))
            .transpose()?,
        phone: validation::optional_text("phone", body.phone.as_deref(), MAX_PHONE_LENGTH)?,
        avatar_url: validation::optional_url("avatar_url", body.avatar_url.as_deref())?,
        state_id: body.state_id,
        city_id: body.city_id,
    };

    check_location(state.pool(), update.state_id, update.city_id).await?;

    let user = UserRepository::new(state.pool())
        .update_profile(current.id, &update)
        .await?;
    Ok(Json(user))
}

#[instrument(skip(state, current, body), fields(user_id = %current.id))]
async fn change_password(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<StatusCode> {
    AuthService::new(state.pool(), state.email())
        .change_password(current.id, &body.current_password, &body.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Answers 200 whether or not the account exists.
#[instrument(skip(state, body))]
async fn forgot_password(
    State(state): State<AppState>,
    Json(body): Json<ForgotPasswordRequest>,
) -> Result<Json<Value>> {
    AuthService::new(state.pool(), state.email())
        .request_password_reset(&body.email)
        .await?;
    Ok(Json(json!({
        "message": "If an account exists for that email, a reset code has been sent"
    })))
}

#[instrument(skip(state, body))]
async fn reset_password(
    State(state): State<AppState>,
    Json(body): Json<ResetPasswordRequest>,
) -> Result<Json<Value>> {
    AuthService::new(state.pool(), state.email())
        .reset_password(&body.email, &body.code, &body.new_password)
        .await?;
    Ok(Json(json!({ "message": "Password updated, you can now log in" })))
}
