use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database. Never serialized directly; responses go
/// through the DTOs so the hash and pending codes cannot leak.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,        // internal identifier, subject of session tokens
    pub public_id: i64,  // public 9-digit userId
    pub name: String,
    pub email: String,
    pub mobile: Option<String>,
    pub password_hash: String,
    pub avatar: String,
    pub college: String,
    pub state: String,
    pub ranking: String,
    pub esports_purpose: String,
    pub email_verified: bool,
    pub email_verification_code: Option<String>,
    pub reset_password_code: Option<String>,
    pub reset_password_expires: Option<OffsetDateTime>,
    pub new_email: Option<String>,
    pub new_email_verification_code: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Partial profile update; `None` leaves the column untouched.
#[derive(Debug, Default, Clone)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub mobile: Option<String>,
    pub college: Option<String>,
    pub state: Option<String>,
    pub ranking: Option<String>,
    pub esports_purpose: Option<String>,
}
