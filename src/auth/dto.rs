use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::repo_types::User;

/// Request body for user registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyEmailRequest {
    pub email: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyResetCodeRequest {
    pub email: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub code: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub mobile: Option<String>,
    pub college: Option<String>,
    pub state: Option<String>,
    pub ranking: Option<String>,
    pub esports_purpose: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEmailRequest {
    pub new_email: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyNewEmailRequest {
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub message: String,
    pub email: String,
}

/// Response returned after login or email verification.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub message: String,
    pub token: String,
    pub user: UserSummary,
}

/// Minimal user summary attached to token-issuing responses.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: Uuid,
    pub user_id: i64,
    pub name: String,
    pub email: String,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            user_id: user.public_id,
            name: user.name.clone(),
            email: user.email.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub user: UserProfile,
}

#[derive(Debug, Serialize)]
pub struct ProfileUpdatedResponse {
    pub message: String,
    pub user: UserProfile,
}

/// Full profile as exposed to its owner. Credentials and pending verification
/// codes are deliberately absent.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub user_id: i64,
    pub name: String,
    pub email: String,
    pub mobile: String,
    pub college: String,
    pub state: String,
    pub ranking: String,
    pub esports_purpose: String,
    pub avatar: String,
    pub email_verified: bool,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            user_id: user.public_id,
            name: user.name.clone(),
            email: user.email.clone(),
            mobile: user.mobile.clone().unwrap_or_default(),
            college: user.college.clone(),
            state: user.state.clone(),
            ranking: user.ranking.clone(),
            esports_purpose: user.esports_purpose.clone(),
            avatar: user.avatar.clone(),
            email_verified: user.email_verified,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    fn sample_user() -> User {
        User {
            id: Uuid::new_v4(),
            public_id: 123_456_789,
            name: "Ann".into(),
            email: "ann@x.com".into(),
            mobile: None,
            password_hash: "$argon2id$secret".into(),
            avatar: String::new(),
            college: String::new(),
            state: String::new(),
            ranking: "Beginner".into(),
            esports_purpose: String::new(),
            email_verified: false,
            email_verification_code: Some("123456".into()),
            reset_password_code: None,
            reset_password_expires: None,
            new_email: None,
            new_email_verification_code: None,
            created_at: OffsetDateTime::now_utc(),
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn profile_uses_camel_case_and_hides_secrets() {
        let profile = UserProfile::from(&sample_user());
        let json = serde_json::to_string(&profile).unwrap();
        assert!(json.contains("\"userId\":123456789"));
        assert!(json.contains("\"esportsPurpose\""));
        assert!(json.contains("\"emailVerified\":false"));
        assert!(!json.contains("argon2"));
        assert!(!json.contains("123456\""));
    }

    #[test]
    fn summary_carries_public_and_internal_ids() {
        let user = sample_user();
        let summary = UserSummary::from(&user);
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["userId"], 123_456_789);
        assert_eq!(json["id"], serde_json::json!(user.id));
    }

    #[test]
    fn change_email_request_accepts_camel_case() {
        let req: ChangeEmailRequest =
            serde_json::from_str(r#"{"newEmail": "new@x.com"}"#).unwrap();
        assert_eq!(req.new_email, "new@x.com");
    }

    #[test]
    fn update_profile_request_fields_are_optional() {
        let req: UpdateProfileRequest =
            serde_json::from_str(r#"{"esportsPurpose": "competitive"}"#).unwrap();
        assert_eq!(req.esports_purpose.as_deref(), Some("competitive"));
        assert!(req.name.is_none());
    }
}
