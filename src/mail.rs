use async_trait::async_trait;
use lettre::{
    message::header::ContentType,
    transport::smtp::{authentication::Credentials, PoolConfig},
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::info;

use crate::config::SmtpConfig;

/// Outbound mail capability. Handlers treat delivery as best-effort: a failed
/// send is logged by the caller and never rolls back the state transition that
/// produced the code.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: lettre::message::Mailbox,
}

impl SmtpMailer {
    pub fn new(cfg: &SmtpConfig) -> anyhow::Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&cfg.host)?
            .credentials(Credentials::new(cfg.username.clone(), cfg.password.clone()))
            .port(cfg.port)
            .pool_config(PoolConfig::new().max_size(4))
            .build();
        let from = cfg
            .from
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid SMTP_FROM address: {e}"))?;
        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        let email = Message::builder()
            .from(self.from.clone())
            .to(to
                .parse()
                .map_err(|e| anyhow::anyhow!("invalid recipient address: {e}"))?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())?;
        self.transport.send(email).await?;
        Ok(())
    }
}

/// Used when no SMTP configuration is present (local development).
pub struct NoopMailer;

#[async_trait]
impl Mailer for NoopMailer {
    async fn send(&self, to: &str, subject: &str, _body: &str) -> anyhow::Result<()> {
        info!(to = %to, subject = %subject, "SMTP not configured; skipping send");
        Ok(())
    }
}

pub fn verification_email(code: &str) -> (String, String) {
    (
        "ArenaHub Email Verification".to_string(),
        format!(
            "Welcome to ArenaHub!\n\
            \n\
            Your verification code is: {code}\n\
            \n\
            Please verify your email to complete registration.\n\
            \n\
            ArenaHub Team"
        ),
    )
}

pub fn reset_email(code: &str) -> (String, String) {
    (
        "ArenaHub Password Reset Code".to_string(),
        format!(
            "A password reset was requested for your ArenaHub account.\n\
            \n\
            Your verification code is: {code}\n\
            \n\
            This code will expire in 10 minutes.\n\
            \n\
            If you didn't request this, please ignore this email.\n\
            \n\
            ArenaHub Team"
        ),
    )
}

pub fn change_email_email(code: &str) -> (String, String) {
    (
        "ArenaHub Email Change Verification".to_string(),
        format!(
            "An email change was requested for your ArenaHub account.\n\
            \n\
            Your verification code is: {code}\n\
            \n\
            Enter this code to confirm your new email address.\n\
            \n\
            ArenaHub Team"
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn templates_embed_the_code() {
        let cases = [
            ("123456", verification_email("123456")),
            ("654321", reset_email("654321")),
            ("111222", change_email_email("111222")),
        ];
        for (code, (subject, body)) in cases {
            assert!(subject.starts_with("ArenaHub"));
            assert!(body.contains(code));
        }
    }

    #[test]
    fn reset_template_mentions_expiry() {
        let (_, body) = reset_email("000000");
        assert!(body.contains("10 minutes"));
    }

    #[tokio::test]
    async fn noop_mailer_always_succeeds() {
        let mailer = NoopMailer;
        assert!(mailer.send("a@b.com", "subject", "body").await.is_ok());
    }
}
