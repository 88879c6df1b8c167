//! Long-poll transport binding
//!
//! Alternative to the webhook for hosts without a public URL. Updates are
//! handled one at a time, in delivery order, so a user's consecutive
//! messages never race each other.

use super::client::TelegramClient;
use crate::runtime::UpdateHandler;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const POLL_TIMEOUT_SECS: u64 = 30;
const RETRY_DELAY: Duration = Duration::from_secs(5);

pub async fn run_polling(
    client: Arc<TelegramClient>,
    handler: Arc<dyn UpdateHandler>,
    cancel: CancellationToken,
) {
    tracing::info!("Long-poll loop started");
    let mut offset = 0;

    loop {
        let batch = tokio::select! {
            () = cancel.cancelled() => break,
            batch = client.get_updates(offset, POLL_TIMEOUT_SECS) => batch,
        };

        let updates = match batch {
            Ok(updates) => updates,
            Err(e) => {
                tracing::warn!(error = %e, "getUpdates failed, retrying");
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(RETRY_DELAY) => continue,
                }
            }
        };

        for update in updates {
            let update_id = update.update_id;
            let Some(event) = update.into_inbound() else {
                offset = update_id + 1;
                continue;
            };
            match handler.handle(event).await {
                Err(e) if e.is_transient() => {
                    // Leave the offset on the failed update so the next poll redelivers it
                    tracing::warn!(update_id, error = %e, "Update failed, will retry");
                    tokio::time::sleep(RETRY_DELAY).await;
                    break;
                }
                Err(e) => tracing::warn!(update_id, error = %e, "Update failed, skipping"),
                Ok(()) => {}
            }
            offset = update_id + 1;
        }
    }

    tracing::info!("Long-poll loop stopped");
}
