use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{info, instrument, warn};

use crate::{
    audit::Severity,
    auth::{
        codes::generate_code,
        dto::{
            AuthResponse, ChangeEmailRequest, ForgotPasswordRequest, LoginRequest,
            MessageResponse, ProfileResponse, ProfileUpdatedResponse, RegisterRequest,
            RegisterResponse, ResetPasswordRequest, UpdateProfileRequest, UserProfile,
            UserSummary, VerifyEmailRequest, VerifyNewEmailRequest, VerifyResetCodeRequest,
        },
        jwt::{AuthUser, JwtKeys},
        password::{hash_password, verify_password},
        repo_types::{ProfileUpdate, User},
        validate::{is_six_digit_code, is_valid_email, normalize_email},
    },
    error::{ApiError, FieldError},
    mail,
    state::AppState,
};

const RESET_CODE_TTL_MINUTES: i64 = 10;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/verify-email", post(verify_email))
        .route("/forgot-password", post(forgot_password))
        .route("/verify-reset-code", post(verify_reset_code))
        .route("/reset-password", post(reset_password))
        .route("/profile", get(get_profile).put(update_profile))
        .route("/change-email", post(change_email))
        .route("/verify-new-email", post(verify_new_email))
}

fn ensure(errors: Vec<FieldError>) -> Result<(), ApiError> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::Validation(errors))
    }
}

impl From<UpdateProfileRequest> for ProfileUpdate {
    fn from(payload: UpdateProfileRequest) -> Self {
        Self {
            name: payload.name,
            mobile: payload.mobile,
            college: payload.college,
            state: payload.state,
            // An empty ranking is treated as absent; the stored value stands.
            // mobile/college/state/esportsPurpose may be cleared with "".
            ranking: payload.ranking.filter(|r| !r.trim().is_empty()),
            esports_purpose: payload.esports_purpose,
        }
    }
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    payload.email = normalize_email(&payload.email);

    let mut errors = Vec::new();
    if payload.name.trim().is_empty() {
        errors.push(FieldError::new("name", "Name is required"));
    }
    if !is_valid_email(&payload.email) {
        errors.push(FieldError::new("email", "Valid email is required"));
    }
    if payload.password.len() < 6 {
        errors.push(FieldError::new(
            "password",
            "Password must be at least 6 characters",
        ));
    }
    ensure(errors)?;

    if User::find_by_email(&state.db, &payload.email).await?.is_some() {
        warn!(email = %payload.email, "email already registered");
        return Err(ApiError::bad_request("User already exists"));
    }

    let hash = hash_password(&payload.password)?;
    let code = generate_code();
    let user = User::create(
        &state.db,
        payload.name.trim(),
        &payload.email,
        &hash,
        &code,
    )
    .await?;

    // Delivery is best-effort; the account exists either way.
    let (subject, body) = mail::verification_email(&code);
    if let Err(e) = state.mailer.send(&user.email, &subject, &body).await {
        warn!(error = %e, email = %user.email, "failed to send verification email");
    }

    state
        .audit
        .record(
            Severity::Success,
            "user_registered",
            json!({ "userId": user.public_id, "name": user.name, "email": user.email }),
        )
        .await;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "Registration successful! Check your email for verification code.".into(),
            email: user.email,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    payload.email = normalize_email(&payload.email);

    let mut errors = Vec::new();
    if !is_valid_email(&payload.email) {
        errors.push(FieldError::new("email", "Valid email is required"));
    }
    if payload.password.is_empty() {
        errors.push(FieldError::new("password", "Password is required"));
    }
    ensure(errors)?;

    // Unknown email and wrong password are indistinguishable to the caller.
    let user = match User::find_by_email(&state.db, &payload.email).await? {
        Some(u) => u,
        None => {
            warn!(email = %payload.email, "login unknown email");
            return Err(ApiError::bad_request("Invalid credentials"));
        }
    };

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(email = %payload.email, user_id = %user.id, "login invalid password");
        return Err(ApiError::bad_request("Invalid credentials"));
    }

    if !user.email_verified {
        return Err(ApiError::NeedsVerification { email: user.email });
    }

    let token = JwtKeys::from_ref(&state).sign(user.id)?;

    state
        .audit
        .record(
            Severity::Info,
            "user_login",
            json!({ "userId": user.public_id, "name": user.name, "email": user.email }),
        )
        .await;

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(Json(AuthResponse {
        message: "Login successful".into(),
        token,
        user: UserSummary::from(&user),
    }))
}

#[instrument(skip(state, payload))]
pub async fn verify_email(
    State(state): State<AppState>,
    Json(mut payload): Json<VerifyEmailRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    payload.email = normalize_email(&payload.email);

    let mut errors = Vec::new();
    if !is_valid_email(&payload.email) {
        errors.push(FieldError::new("email", "Valid email is required"));
    }
    if !is_six_digit_code(&payload.code) {
        errors.push(FieldError::new("code", "Code must be 6 digits"));
    }
    ensure(errors)?;

    // Matching and clearing happen in one write; `None` covers wrong email
    // and wrong code alike.
    let user = User::verify_email_code(&state.db, &payload.email, &payload.code)
        .await?
        .ok_or_else(|| ApiError::bad_request("Invalid verification code"))?;

    let token = JwtKeys::from_ref(&state).sign(user.id)?;

    state
        .audit
        .record(
            Severity::Success,
            "email_verified",
            json!({ "userId": user.public_id, "name": user.name, "email": user.email }),
        )
        .await;

    info!(user_id = %user.id, email = %user.email, "email verified");
    Ok(Json(AuthResponse {
        message: "Email verified successfully".into(),
        token,
        user: UserSummary::from(&user),
    }))
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(mut payload): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    payload.email = normalize_email(&payload.email);

    if !is_valid_email(&payload.email) {
        return Err(ApiError::Validation(vec![FieldError::new(
            "email",
            "Valid email is required",
        )]));
    }

    // The response is identical whether or not the account exists.
    let response = Json(MessageResponse {
        message: "If that email is registered, a verification code has been sent".into(),
    });

    let Some(user) = User::find_by_email(&state.db, &payload.email).await? else {
        info!(email = %payload.email, "password reset requested for unknown email");
        return Ok(response);
    };

    let code = generate_code();
    let expires = OffsetDateTime::now_utc() + TimeDuration::minutes(RESET_CODE_TTL_MINUTES);
    User::set_reset_code(&state.db, &user.email, &code, expires).await?;

    state
        .audit
        .record(
            Severity::Warning,
            "password_reset_requested",
            json!({ "userId": user.public_id, "email": user.email }),
        )
        .await;

    // The stored code stays valid even if the mail never leaves; it is never
    // echoed to the caller.
    let (subject, body) = mail::reset_email(&code);
    if let Err(e) = state.mailer.send(&user.email, &subject, &body).await {
        warn!(error = %e, email = %user.email, "failed to send reset email");
    }

    Ok(response)
}

#[instrument(skip(state, payload))]
pub async fn verify_reset_code(
    State(state): State<AppState>,
    Json(mut payload): Json<VerifyResetCodeRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    payload.email = normalize_email(&payload.email);

    let mut errors = Vec::new();
    if !is_valid_email(&payload.email) {
        errors.push(FieldError::new("email", "Valid email is required"));
    }
    if !is_six_digit_code(&payload.code) {
        errors.push(FieldError::new("code", "Code must be 6 digits"));
    }
    ensure(errors)?;

    User::find_by_live_reset_code(&state.db, &payload.email, &payload.code)
        .await?
        .ok_or_else(|| ApiError::bad_request("Invalid or expired code"))?;

    Ok(Json(MessageResponse {
        message: "Code verified successfully".into(),
    }))
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(mut payload): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    payload.email = normalize_email(&payload.email);

    let mut errors = Vec::new();
    if !is_valid_email(&payload.email) {
        errors.push(FieldError::new("email", "Valid email is required"));
    }
    if !is_six_digit_code(&payload.code) {
        errors.push(FieldError::new("code", "Code must be 6 digits"));
    }
    if payload.password.len() < 6 {
        errors.push(FieldError::new(
            "password",
            "Password must be at least 6 characters",
        ));
    }
    ensure(errors)?;

    let hash = hash_password(&payload.password)?;

    // Match + expiry check, new hash and code clearing are a single write;
    // a second attempt with the same code finds nothing to update.
    let updated = User::reset_password(&state.db, &payload.email, &payload.code, &hash).await?;
    if !updated {
        return Err(ApiError::bad_request("Invalid or expired code"));
    }

    state
        .audit
        .record(
            Severity::Success,
            "password_reset_completed",
            json!({ "email": payload.email }),
        )
        .await;

    info!(email = %payload.email, "password reset");
    Ok(Json(MessageResponse {
        message: "Password reset successfully".into(),
    }))
}

#[instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<ProfileResponse>, ApiError> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(ProfileResponse {
        user: UserProfile::from(&user),
    }))
}

#[instrument(skip(state, payload))]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<ProfileUpdatedResponse>, ApiError> {
    if let Some(name) = &payload.name {
        if name.trim().is_empty() {
            return Err(ApiError::Validation(vec![FieldError::new(
                "name",
                "Name cannot be empty",
            )]));
        }
    }

    let update = ProfileUpdate::from(payload);

    let user = User::update_profile(&state.db, user_id, &update)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    state
        .audit
        .record(
            Severity::Info,
            "profile_updated",
            json!({ "userId": user.public_id, "name": user.name }),
        )
        .await;

    Ok(Json(ProfileUpdatedResponse {
        message: "Profile updated successfully".into(),
        user: UserProfile::from(&user),
    }))
}

#[instrument(skip(state, payload))]
pub async fn change_email(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(mut payload): Json<ChangeEmailRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    payload.new_email = normalize_email(&payload.new_email);

    if !is_valid_email(&payload.new_email) {
        return Err(ApiError::Validation(vec![FieldError::new(
            "newEmail",
            "Valid email is required",
        )]));
    }

    if User::email_taken(&state.db, &payload.new_email).await? {
        return Err(ApiError::bad_request("Email already in use"));
    }

    let code = generate_code();
    let staged = User::set_pending_email(&state.db, user_id, &payload.new_email, &code).await?;
    if !staged {
        return Err(ApiError::not_found("User not found"));
    }

    // The code goes to the address being claimed, not the current one.
    let (subject, body) = mail::change_email_email(&code);
    if let Err(e) = state.mailer.send(&payload.new_email, &subject, &body).await {
        warn!(error = %e, email = %payload.new_email, "failed to send email-change code");
    }

    info!(user_id = %user_id, new_email = %payload.new_email, "email change requested");
    Ok(Json(MessageResponse {
        message: "Verification code sent to new email".into(),
    }))
}

#[instrument(skip(state, payload))]
pub async fn verify_new_email(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<VerifyNewEmailRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    if !is_six_digit_code(&payload.code) {
        return Err(ApiError::Validation(vec![FieldError::new(
            "code",
            "Code must be 6 digits",
        )]));
    }

    let user = User::confirm_pending_email(&state.db, user_id, &payload.code)
        .await?
        .ok_or_else(|| ApiError::bad_request("Invalid verification code"))?;

    state
        .audit
        .record(
            Severity::Success,
            "email_changed",
            json!({ "userId": user.public_id, "email": user.email }),
        )
        .await;

    info!(user_id = %user.id, email = %user.email, "email updated");
    Ok(Json(MessageResponse {
        message: "Email updated successfully".into(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_passes_empty_and_collects_errors() {
        assert!(ensure(Vec::new()).is_ok());
        let err = ensure(vec![
            FieldError::new("name", "Name is required"),
            FieldError::new("password", "Password must be at least 6 characters"),
        ])
        .unwrap_err();
        match err {
            ApiError::Validation(errors) => assert_eq!(errors.len(), 2),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn empty_ranking_does_not_clear_the_stored_value() {
        let payload: UpdateProfileRequest =
            serde_json::from_str(r#"{"ranking": "", "college": ""}"#).unwrap();
        let update = ProfileUpdate::from(payload);
        assert!(update.ranking.is_none());
        // college stays clearable with an empty string
        assert_eq!(update.college.as_deref(), Some(""));
    }

    #[test]
    fn non_empty_ranking_passes_through() {
        let payload = UpdateProfileRequest {
            ranking: Some("Pro".into()),
            ..Default::default()
        };
        let update = ProfileUpdate::from(payload);
        assert_eq!(update.ranking.as_deref(), Some("Pro"));
    }

    #[test]
    fn auth_response_shape() {
        let user = crate::auth::dto::UserSummary {
            id: uuid::Uuid::new_v4(),
            user_id: 987_654_321,
            name: "Ann".into(),
            email: "ann@x.com".into(),
        };
        let response = AuthResponse {
            message: "Login successful".into(),
            token: "jwt".into(),
            user,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["message"], "Login successful");
        assert_eq!(json["user"]["userId"], 987_654_321);
    }
}
