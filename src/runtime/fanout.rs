//! Best-effort announcement delivery
//!
//! Recipients are messaged one at a time with a fixed pause between sends so
//! the transport's per-bot rate limit is not tripped. A failed recipient is
//! logged and skipped.

use super::traits::ChatTransport;
use crate::db::UserId;
use std::time::Duration;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FanoutReport {
    pub delivered: usize,
    pub failed: usize,
}

pub async fn broadcast<T: ChatTransport + ?Sized>(
    transport: &T,
    recipients: &[UserId],
    text: &str,
    delay: Duration,
) -> FanoutReport {
    let mut report = FanoutReport::default();
    for (i, user) in recipients.iter().enumerate() {
        if i > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match transport.send_message(*user, text, None).await {
            Ok(_) => report.delivered += 1,
            Err(e) => {
                tracing::warn!(user_id = user, error = %e, "Broadcast delivery failed");
                report.failed += 1;
            }
        }
    }
    tracing::info!(
        delivered = report.delivered,
        failed = report.failed,
        "Broadcast finished"
    );
    report
}
