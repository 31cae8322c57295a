//! Share notification delivery
//!
//! When a share link is created the owner can ask for the recipient to be
//! told about it. Delivery is best-effort: notification failures are logged
//! by the caller and never fail the share creation itself.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Everything a delivery channel needs to describe a new share link
#[derive(Debug, Clone)]
pub struct ShareNotice {
    pub token: String,
    pub file_name: String,
    pub sender_name: String,
    pub recipient: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub password_protected: bool,
}

/// Trait for share notification channels
#[async_trait]
pub trait ShareNotifier: Send + Sync {
    async fn share_created(&self, notice: &ShareNotice) -> anyhow::Result<()>;
}

/// Notifier that writes notices to the log instead of sending anything
pub struct LogNotifier;

#[async_trait]
impl ShareNotifier for LogNotifier {
    async fn share_created(&self, notice: &ShareNotice) -> anyhow::Result<()> {
        let expires = notice
            .expires_at
            .map(|at| at.to_rfc3339())
            .unwrap_or_else(|| "never".to_string());

        tracing::info!(
            token = %notice.token,
            file = %notice.file_name,
            sender = %notice.sender_name,
            recipient = notice.recipient.as_deref().unwrap_or("-"),
            %expires,
            password_protected = notice.password_protected,
            "Share link created"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn log_notifier_accepts_every_notice() {
        let notifier = LogNotifier;
        let notice = ShareNotice {
            token: "abc123".to_string(),
            file_name: "report.pdf".to_string(),
            sender_name: "ada".to_string(),
            recipient: Some("grace@example.com".to_string()),
            expires_at: None,
            password_protected: true,
        };
        assert!(notifier.share_created(&notice).await.is_ok());
    }
}
