use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::{Duration, Utc};
use rand::Rng;
use serde::Deserialize;
use tracing::{error, info, warn};
use utoipa::ToSchema;

use crate::{
    AppState,
    auth::{self, TokenPurpose},
    error::ApiError,
    models::{NewResetCode, NewUser, PublicUser},
    store::StoreError,
    validation::{validate_password, validate_signup},
};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ResetCodeRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyCodeRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub code: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordRequest {
    #[serde(default)]
    pub reset_token: String,
    #[serde(default)]
    pub password: String,
}

fn normalise_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created, session token issued"),
        (status = 400, description = "Missing fields or weak password"),
        (status = 409, description = "Email already registered")
    ),
    tag = "users"
)]
pub async fn signup(
    State(state): State<AppState>,
    Json(request): Json<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_signup(&request.full_name, &request.email, &request.password)?;
    let email = normalise_email(&request.email);

    if state.store.find_user_by_email(&email).await?.is_some() {
        return Err(ApiError::Conflict("Email already registered".into()));
    }

    let new_user = NewUser {
        name: request.full_name.trim().to_string(),
        phone: request.phone.filter(|p| !p.trim().is_empty()),
        email,
        password: auth::hash_password(&request.password)?,
        is_admin: false,
    };

    let user = match state.store.insert_user(&new_user).await {
        Ok(Some(user)) => user,
        Ok(None) => return Err(ApiError::Internal("User was not created".into())),
        Err(StoreError::Status { status, .. }) if status == StatusCode::CONFLICT => {
            return Err(ApiError::Conflict("Email already registered".into()));
        }
        Err(err) => return Err(err.into()),
    };
    info!(user_id = user.id, "user signed up");

    let token = auth::issue_session(&state.settings, user.id, user.is_admin)?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "user": PublicUser::from(user),
            "token": token,
        })),
    ))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session token issued"),
        (status = 401, description = "Invalid email or password")
    ),
    tag = "users"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let invalid = || ApiError::Unauthorized("Invalid email or password".into());

    let user = state
        .store
        .find_user_by_email(&normalise_email(&request.email))
        .await?
        .ok_or_else(invalid)?;
    if !auth::verify_password(&request.password, &user.password) {
        return Err(invalid());
    }

    let token = auth::issue_session(&state.settings, user.id, user.is_admin)?;
    Ok(Json(serde_json::json!({
        "user": PublicUser::from(user),
        "token": token,
    })))
}

#[utoipa::path(
    post,
    path = "/send-reset-code",
    request_body = ResetCodeRequest,
    responses(
        (status = 200, description = "Code sent if the account exists"),
        (status = 400, description = "Email is required"),
        (status = 500, description = "Email failed to send")
    ),
    tag = "users"
)]
pub async fn send_reset_code(
    State(state): State<AppState>,
    Json(request): Json<ResetCodeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = normalise_email(&request.email);
    if email.is_empty() {
        return Err(ApiError::BadRequest("Email is required".into()));
    }

    let now = Utc::now();
    match state.store.delete_expired_reset_codes(now).await {
        Ok(0) => {}
        Ok(swept) => info!(swept, "expired reset codes removed"),
        Err(err) => warn!("failed to sweep expired reset codes: {err}"),
    }

    if state.store.find_user_by_email(&email).await?.is_none() {
        info!("reset code requested for unknown email");
        return Ok(Json(serde_json::json!({ "success": true })));
    }

    let code = rand::thread_rng().gen_range(100_000..=999_999).to_string();
    let ttl = state.settings.reset_code_ttl_minutes;
    state
        .store
        .insert_reset_code(&NewResetCode {
            email: email.clone(),
            code: code.clone(),
            expires_at: now + Duration::minutes(ttl),
            used: false,
        })
        .await?;

    let mail = state.mailer.reset_code(&email, &code, ttl);
    state.mailer.send(mail).await.map_err(|err| {
        error!("error sending reset code: {err}");
        ApiError::Internal("Email failed to send".into())
    })?;

    Ok(Json(serde_json::json!({ "success": true })))
}

#[utoipa::path(
    post,
    path = "/verify-reset-code",
    request_body = VerifyCodeRequest,
    responses(
        (status = 200, description = "Code verified, reset token issued"),
        (status = 400, description = "Invalid or expired code")
    ),
    tag = "users"
)]
pub async fn verify_reset_code(
    State(state): State<AppState>,
    Json(request): Json<VerifyCodeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = normalise_email(&request.email);
    let code = request.code.trim();
    if email.is_empty() || code.is_empty() {
        return Err(ApiError::BadRequest("Email and code are required".into()));
    }

    let record = state
        .store
        .latest_reset_code(&email)
        .await?
        .ok_or_else(|| ApiError::BadRequest("Invalid code".into()))?;
    if record.expires_at < Utc::now() {
        return Err(ApiError::BadRequest("Code expired".into()));
    }
    if record.code != code {
        let max_attempts = state.settings.reset_code_max_attempts;
        let attempts = state.store.record_reset_attempt(record.id, max_attempts).await?;
        if attempts >= max_attempts {
            warn!(code_id = record.id, attempts, "reset code burned after repeated wrong guesses");
            return Err(ApiError::BadRequest(
                "Too many attempts, please request a new code".into(),
            ));
        }
        return Err(ApiError::BadRequest("Invalid code".into()));
    }

    let user = state
        .store
        .find_user_by_email(&email)
        .await?
        .ok_or_else(|| ApiError::BadRequest("Invalid code".into()))?;

    state.store.mark_reset_code_used(record.id).await?;
    let reset_token = auth::issue_reset_token(&state.settings, user.id, &user.email)?;

    Ok(Json(serde_json::json!({
        "message": "Code verified",
        "success": true,
        "resetToken": reset_token,
    })))
}

#[utoipa::path(
    post,
    path = "/update-password",
    request_body = UpdatePasswordRequest,
    responses(
        (status = 200, description = "Password updated"),
        (status = 400, description = "Password too short"),
        (status = 401, description = "Invalid or expired reset token"),
        (status = 404, description = "User not found")
    ),
    tag = "users"
)]
pub async fn update_password(
    State(state): State<AppState>,
    Json(request): Json<UpdatePasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let claims = auth::decode_token(
        &state.settings,
        &request.reset_token,
        TokenPurpose::PasswordReset,
    )?;
    validate_password(&request.password)?;

    let hash = auth::hash_password(&request.password)?;
    if !state.store.update_password(&claims.email, &hash).await? {
        return Err(ApiError::NotFound("User not found".into()));
    }
    info!(user_id = claims.sub, "password updated");

    Ok(Json(serde_json::json!({
        "message": "Password updated successfully",
        "success": true,
    })))
}
