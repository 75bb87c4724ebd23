use async_trait::async_trait;
use serde_json::Value;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Success => "success",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

/// Append-only record of security-relevant events. Fire-and-forget: `record`
/// is infallible from the caller's point of view and never blocks a state
/// transition on delivery.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, severity: Severity, action: &str, payload: Value);
}

/// Emits audit events through the tracing pipeline, where the subscriber
/// decides on formatting and shipping.
pub struct TracingAudit;

#[async_trait]
impl AuditSink for TracingAudit {
    async fn record(&self, severity: Severity, action: &str, payload: Value) {
        match severity {
            Severity::Info | Severity::Success => {
                info!(target: "audit", severity = severity.as_str(), action = %action, payload = %payload, "audit event")
            }
            Severity::Warning => {
                warn!(target: "audit", severity = severity.as_str(), action = %action, payload = %payload, "audit event")
            }
            Severity::Error => {
                error!(target: "audit", severity = severity.as_str(), action = %action, payload = %payload, "audit event")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn severity_labels() {
        assert_eq!(Severity::Info.as_str(), "info");
        assert_eq!(Severity::Success.as_str(), "success");
        assert_eq!(Severity::Warning.as_str(), "warning");
        assert_eq!(Severity::Error.as_str(), "error");
    }

    #[tokio::test]
    async fn tracing_sink_accepts_events() {
        let sink = TracingAudit;
        sink.record(
            Severity::Success,
            "user_registered",
            json!({ "email": "ann@x.com" }),
        )
        .await;
    }
}
