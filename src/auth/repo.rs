use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::codes::generate_public_id;
use crate::auth::repo_types::{ProfileUpdate, User};

const USER_COLUMNS: &str = r#"
    id, public_id, name, email, mobile, password_hash, avatar, college, state,
    ranking, esports_purpose, email_verified, email_verification_code,
    reset_password_code, reset_password_expires, new_email,
    new_email_verification_code, created_at, updated_at
"#;

impl User {
    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn email_taken(db: &PgPool, email: &str) -> anyhow::Result<bool> {
        let taken: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE email = $1)")
                .bind(email)
                .fetch_one(db)
                .await?;
        Ok(taken)
    }

    /// Create an unverified user. The public 9-digit id is drawn at random and
    /// retried on collision against the unique index.
    pub async fn create(
        db: &PgPool,
        name: &str,
        email: &str,
        password_hash: &str,
        verification_code: &str,
    ) -> anyhow::Result<User> {
        for _ in 0..5 {
            let public_id = generate_public_id();
            let result = sqlx::query_as::<_, User>(&format!(
                r#"
                INSERT INTO users (public_id, name, email, password_hash, email_verification_code)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING {USER_COLUMNS}
                "#
            ))
            .bind(public_id)
            .bind(name)
            .bind(email)
            .bind(password_hash)
            .bind(verification_code)
            .fetch_one(db)
            .await;

            match result {
                Ok(user) => return Ok(user),
                Err(sqlx::Error::Database(e))
                    if e.constraint() == Some("users_public_id_key") =>
                {
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        }
        anyhow::bail!("could not allocate a unique public id")
    }

    /// Match email + pending code, mark verified and clear the code in one
    /// statement. Returns `None` when either side does not match, so callers
    /// cannot tell an unknown email from a wrong code. Single-use by
    /// construction: a second attempt finds the code already cleared.
    pub async fn verify_email_code(
        db: &PgPool,
        email: &str,
        code: &str,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET email_verified = TRUE, email_verification_code = NULL, updated_at = now()
            WHERE email = $1 AND email_verification_code = $2
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(email)
        .bind(code)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn set_reset_code(
        db: &PgPool,
        email: &str,
        code: &str,
        expires: OffsetDateTime,
    ) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET reset_password_code = $2, reset_password_expires = $3, updated_at = now()
            WHERE email = $1
            "#,
        )
        .bind(email)
        .bind(code)
        .bind(expires)
        .execute(db)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// A reset code is live iff it matches and the expiry has not passed.
    pub async fn find_by_live_reset_code(
        db: &PgPool,
        email: &str,
        code: &str,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS} FROM users
            WHERE email = $1 AND reset_password_code = $2 AND reset_password_expires > now()
            "#
        ))
        .bind(email)
        .bind(code)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Store the new hash and clear the code and expiry in the same write, so
    /// the code cannot be replayed after a successful reset.
    pub async fn reset_password(
        db: &PgPool,
        email: &str,
        code: &str,
        password_hash: &str,
    ) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $3, reset_password_code = NULL,
                reset_password_expires = NULL, updated_at = now()
            WHERE email = $1 AND reset_password_code = $2 AND reset_password_expires > now()
            "#,
        )
        .bind(email)
        .bind(code)
        .bind(password_hash)
        .execute(db)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn update_profile(
        db: &PgPool,
        id: Uuid,
        update: &ProfileUpdate,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET name = COALESCE($2, name),
                mobile = COALESCE($3, mobile),
                college = COALESCE($4, college),
                state = COALESCE($5, state),
                ranking = COALESCE($6, ranking),
                esports_purpose = COALESCE($7, esports_purpose),
                updated_at = now()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&update.name)
        .bind(&update.mobile)
        .bind(&update.college)
        .bind(&update.state)
        .bind(&update.ranking)
        .bind(&update.esports_purpose)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Stage an email change on the current record; the live email column is
    /// untouched until the code sent to the new address is confirmed.
    pub async fn set_pending_email(
        db: &PgPool,
        id: Uuid,
        new_email: &str,
        code: &str,
    ) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET new_email = $2, new_email_verification_code = $3, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(new_email)
        .bind(code)
        .execute(db)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Promote the pending email and clear both staging fields in one write.
    /// `None` covers a wrong code and a missing pending request alike.
    pub async fn confirm_pending_email(
        db: &PgPool,
        id: Uuid,
        code: &str,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET email = new_email, new_email = NULL,
                new_email_verification_code = NULL, updated_at = now()
            WHERE id = $1 AND new_email_verification_code = $2 AND new_email IS NOT NULL
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(code)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }
}

// Each test runs against its own database with migrations applied, so the
// conditional-UPDATE invariants are exercised against real Postgres.
#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration as TimeDuration;

    async fn seed(db: &PgPool, email: &str, code: &str) -> User {
        User::create(db, "Ann", email, "hash-v1", code)
            .await
            .expect("create user")
    }

    #[sqlx::test]
    async fn registration_creates_one_unverified_record(db: PgPool) {
        let user = seed(&db, "ann@x.com", "123456").await;
        assert!(!user.email_verified);
        assert_eq!(user.email_verification_code.as_deref(), Some("123456"));
        assert!((100_000_000..1_000_000_000).contains(&user.public_id));

        let count: i64 = sqlx::query_scalar("SELECT count(*) FROM users")
            .fetch_one(&db)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[sqlx::test]
    async fn duplicate_email_is_rejected(db: PgPool) {
        seed(&db, "ann@x.com", "111111").await;
        let dup = User::create(&db, "Other", "ann@x.com", "hash-v2", "222222").await;
        assert!(dup.is_err());

        let count: i64 = sqlx::query_scalar("SELECT count(*) FROM users")
            .fetch_one(&db)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[sqlx::test]
    async fn verification_code_is_single_use(db: PgPool) {
        seed(&db, "ann@x.com", "123456").await;

        let verified = User::verify_email_code(&db, "ann@x.com", "123456")
            .await
            .unwrap()
            .expect("first use succeeds");
        assert!(verified.email_verified);
        assert!(verified.email_verification_code.is_none());

        let second = User::verify_email_code(&db, "ann@x.com", "123456")
            .await
            .unwrap();
        assert!(second.is_none());
    }

    #[sqlx::test]
    async fn wrong_verification_code_leaves_the_code_pending(db: PgPool) {
        seed(&db, "ann@x.com", "123456").await;

        let miss = User::verify_email_code(&db, "ann@x.com", "654321")
            .await
            .unwrap();
        assert!(miss.is_none());

        let user = User::find_by_email(&db, "ann@x.com").await.unwrap().unwrap();
        assert!(!user.email_verified);
        assert_eq!(user.email_verification_code.as_deref(), Some("123456"));
    }

    #[sqlx::test]
    async fn expired_reset_code_is_dead_even_when_correct(db: PgPool) {
        seed(&db, "ann@x.com", "111111").await;
        let past = OffsetDateTime::now_utc() - TimeDuration::minutes(1);
        User::set_reset_code(&db, "ann@x.com", "222333", past)
            .await
            .unwrap();

        let live = User::find_by_live_reset_code(&db, "ann@x.com", "222333")
            .await
            .unwrap();
        assert!(live.is_none());
        assert!(!User::reset_password(&db, "ann@x.com", "222333", "hash-v2")
            .await
            .unwrap());
    }

    #[sqlx::test]
    async fn reset_code_works_once_before_expiry(db: PgPool) {
        seed(&db, "ann@x.com", "111111").await;
        let expires = OffsetDateTime::now_utc() + TimeDuration::minutes(10);
        User::set_reset_code(&db, "ann@x.com", "222333", expires)
            .await
            .unwrap();

        let live = User::find_by_live_reset_code(&db, "ann@x.com", "222333")
            .await
            .unwrap();
        assert!(live.is_some());

        assert!(User::reset_password(&db, "ann@x.com", "222333", "hash-v2")
            .await
            .unwrap());
        let user = User::find_by_email(&db, "ann@x.com").await.unwrap().unwrap();
        assert_eq!(user.password_hash, "hash-v2");
        assert!(user.reset_password_code.is_none());
        assert!(user.reset_password_expires.is_none());

        // The cleared code cannot be replayed.
        assert!(!User::reset_password(&db, "ann@x.com", "222333", "hash-v3")
            .await
            .unwrap());
    }

    #[sqlx::test]
    async fn pending_email_promotes_once(db: PgPool) {
        let user = seed(&db, "ann@x.com", "111111").await;
        User::set_pending_email(&db, user.id, "new@x.com", "444555")
            .await
            .unwrap();

        let miss = User::confirm_pending_email(&db, user.id, "999999")
            .await
            .unwrap();
        assert!(miss.is_none());

        let updated = User::confirm_pending_email(&db, user.id, "444555")
            .await
            .unwrap()
            .expect("pending email promotes");
        assert_eq!(updated.email, "new@x.com");
        assert!(updated.new_email.is_none());
        assert!(updated.new_email_verification_code.is_none());

        let again = User::confirm_pending_email(&db, user.id, "444555")
            .await
            .unwrap();
        assert!(again.is_none());
    }

    #[sqlx::test]
    async fn profile_update_touches_only_provided_fields(db: PgPool) {
        let user = seed(&db, "ann@x.com", "111111").await;
        let update = ProfileUpdate {
            college: Some("State U".into()),
            ..Default::default()
        };

        let updated = User::update_profile(&db, user.id, &update)
            .await
            .unwrap()
            .expect("user exists");
        assert_eq!(updated.college, "State U");
        assert_eq!(updated.name, "Ann");
        assert_eq!(updated.ranking, "Beginner");
    }
}
