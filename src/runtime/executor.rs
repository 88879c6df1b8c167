//! Per-event engine
//!
//! One inbound event is claimed, routed, matched to the records it needs,
//! passed through the pure transition and the resulting effects executed:
//! record mutations first, in order, then outbound messages. A failed
//! mutation aborts the event and releases its claim so the transport's
//! redelivery is processed. Outbound failures are logged and skipped.

use super::fanout;
use super::traits::{
    ChatTransport, FileSink, RecordStore, StoreError, TransportError, UpdateHandler,
};
use crate::db::{
    ChatId, PaymentStatus, ProofFile, ShipmentId, ShipmentPatch, ShipmentStatus, UserId,
    EXCHANGE_RATE_KEY,
};
use crate::workflow::dispatch::Handler;
use crate::workflow::{
    keyboard, render, route, transition, Context, Effect, Inbound, Markup, Outgoing, Route, View,
};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// How long processed event ids are remembered
const CLAIM_RETENTION_HOURS: i64 = 24;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl EngineError {
    /// Redelivering the event may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            EngineError::Store(StoreError::Unavailable(_))
                | EngineError::Transport(TransportError::Unavailable(_))
        )
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Chat that receives approval requests and registration notices
    pub staff_channel: ChatId,
    /// Users approved as admin on first contact
    pub admin_ids: Vec<UserId>,
    /// Pause between broadcast sends
    pub broadcast_delay: Duration,
    /// Shipments listed on the staff panel
    pub staff_panel_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            staff_channel: 0,
            admin_ids: Vec::new(),
            broadcast_delay: Duration::from_millis(50),
            staff_panel_limit: 10,
        }
    }
}

/// Generic engine that can work with any store, sink and transport
pub struct Engine<S, F, T>
where
    S: RecordStore + 'static,
    F: FileSink + 'static,
    T: ChatTransport + 'static,
{
    store: S,
    files: F,
    transport: Arc<T>,
    config: EngineConfig,
}

impl<S, F, T> Engine<S, F, T>
where
    S: RecordStore + 'static,
    F: FileSink + 'static,
    T: ChatTransport + 'static,
{
    pub fn new(store: S, files: F, transport: Arc<T>, config: EngineConfig) -> Self {
        Self {
            store,
            files,
            transport,
            config,
        }
    }

    #[cfg(test)]
    pub fn files(&self) -> &F {
        &self.files
    }

    /// Process one event end to end
    pub async fn process(&self, event: &Inbound) -> Result<(), EngineError> {
        if let Some(id) = &event.event_id {
            if !self.store.claim_event(id).await? {
                tracing::debug!(event_id = %id, "Duplicate delivery dropped");
                return Ok(());
            }
        }

        let outcome = self.run(event).await;

        let toast = match &outcome {
            Ok(toast) => toast.clone(),
            Err(e) => {
                tracing::warn!(user_id = event.actor.id, error = %e, "Event failed");
                if let Some(id) = &event.event_id {
                    if let Err(release) = self.store.release_event(id).await {
                        tracing::error!(
                            event_id = %id,
                            error = %release,
                            "Failed to release claim"
                        );
                    }
                }
                None
            }
        };
        self.acknowledge(event, toast.as_deref()).await;

        outcome.map(|_| ())
    }

    /// Forget claims older than the retention window
    pub async fn prune_claims(&self) -> Result<usize, EngineError> {
        let cutoff = Utc::now() - chrono::Duration::hours(CLAIM_RETENTION_HOURS);
        let removed = self.store.prune_events(cutoff).await?;
        if removed > 0 {
            tracing::debug!(removed, "Pruned processed event ids");
        }
        Ok(removed)
    }

    /// Route, transition and execute. Returns the button toast, if any.
    async fn run(&self, event: &Inbound) -> Result<Option<String>, EngineError> {
        let user = self.store.get_user(event.actor.id).await?;
        let route = route(user.as_ref(), event);
        tracing::debug!(
            user_id = event.actor.id,
            route = route.name(),
            token = user.as_ref().and_then(|u| u.state.as_ref()).map(ToString::to_string),
            "Routed event"
        );

        let ctx = self.load_context(user, &route, event).await?;
        let result = match transition(&ctx, &route, event) {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(user_id = event.actor.id, error = %e, "Event dropped");
                return Ok(None);
            }
        };

        let (mutations, outbound): (Vec<_>, Vec<_>) =
            result.effects.into_iter().partition(Effect::is_mutation);

        for effect in mutations {
            self.apply(effect).await?;
        }

        let mut toast = None;
        for effect in outbound {
            if let Effect::Toast(text) = effect {
                toast = Some(text);
                continue;
            }
            if let Err(e) = self.deliver(effect, event).await {
                tracing::warn!(user_id = event.actor.id, error = %e, "Outbound effect failed");
            }
        }
        Ok(toast)
    }

    async fn load_context(
        &self,
        user: Option<crate::db::User>,
        route: &Route,
        event: &Inbound,
    ) -> Result<Context, EngineError> {
        let token = user.as_ref().and_then(|u| u.state.as_ref());

        let shipment = match route.target_shipment(token) {
            Some(id) => self.store.get_shipment(id).await?,
            None => None,
        };
        let subject = match route.target_user() {
            Some(id) => self.store.get_user(id).await?,
            None => None,
        };
        let pending_proofs = match (route, &shipment) {
            (Route::Token(Handler::ProofIntake), Some(s)) => {
                self.store.count_pending_proofs(s.id).await?
            }
            _ => 0,
        };
        let exchange_rate = self.store.get_setting(EXCHANGE_RATE_KEY).await?;

        Ok(Context {
            shipment,
            subject,
            pending_proofs,
            exchange_rate,
            allow_listed: self.config.admin_ids.contains(&event.actor.id),
            ..Context::new(user)
        })
    }

    /// Execute one record mutation
    async fn apply(&self, effect: Effect) -> Result<(), EngineError> {
        match effect {
            Effect::CreateUser(new) => {
                self.store.create_user(&new).await?;
                tracing::info!(user_id = new.id, role = %new.role, "Profile created");
            }
            Effect::UpdateUser { id, patch } => {
                self.store.update_user(id, &patch).await?;
            }
            Effect::DeleteUser(id) => {
                self.store.delete_user(id).await?;
                tracing::info!(user_id = id, "Profile deleted");
            }
            Effect::CreateShipment(new) => {
                self.store.create_shipment(&new).await?;
                tracing::info!(shipment_id = %new.id, user_id = new.owner_id, "Draft created");
            }
            Effect::UpdateShipment { id, patch } => {
                self.store.update_shipment(id, &patch).await?;
            }
            Effect::SetStatus {
                shipment,
                status,
                payment,
            } => {
                self.store.set_status(shipment, status, payment).await?;
                tracing::info!(shipment_id = %shipment, status = %status, "Status changed");
            }
            Effect::SetSetting { key, value } => {
                self.store.set_setting(key, value).await?;
                tracing::info!(key, value, "Setting updated");
            }
            Effect::ResetPendingProofs { shipment, owner } => {
                self.store.reset_pending_proofs(shipment, owner).await?;
            }
            Effect::StoreProof {
                shipment,
                owner,
                file,
            } => {
                let bytes = self.transport.fetch_file(&file.file_id).await?;
                let path = format!(
                    "{owner}/{shipment}/{}{}",
                    uuid::Uuid::new_v4(),
                    file.extension()
                );
                let url = self.files.store_file(&path, bytes, file.mime()).await?;
                let count = self
                    .store
                    .append_pending_proof(
                        shipment,
                        owner,
                        &ProofFile {
                            url,
                            kind: file.kind,
                        },
                    )
                    .await?;
                tracing::debug!(shipment_id = %shipment, count, "Proof stored");
            }
            Effect::CommitProofs { shipment } => self.commit_proofs(shipment).await?,

            Effect::Send(_)
            | Effect::EditSource { .. }
            | Effect::ForwardProofs { .. }
            | Effect::Render { .. }
            | Effect::Broadcast { .. }
            | Effect::Toast(_) => {}
        }
        Ok(())
    }

    async fn commit_proofs(&self, shipment: ShipmentId) -> Result<(), EngineError> {
        let proofs = self.store.take_pending_proofs(shipment).await?;
        let patch = ShipmentPatch {
            files: Some(proofs),
            status: Some(ShipmentStatus::PaymentReceived),
            payment_status: Some(PaymentStatus::Unpaid),
            ..ShipmentPatch::default()
        };
        self.store.update_shipment(shipment, &patch).await?;
        tracing::info!(shipment_id = %shipment, "Payment proofs committed");
        Ok(())
    }

    /// Execute one outbound effect
    async fn deliver(&self, effect: Effect, event: &Inbound) -> Result<(), EngineError> {
        let staff = self.config.staff_channel;
        match effect {
            Effect::Send(out) => self.send(out, event.chat_id).await?,
            Effect::EditSource { text, markup } => {
                let source = event.button().and_then(|b| b.source.as_ref());
                match source {
                    Some(src) => {
                        self.transport
                            .edit_message(src.chat_id, src.message_id, &text, markup.as_ref())
                            .await?;
                    }
                    None => {
                        self.transport
                            .send_message(event.chat_id, &text, markup.as_ref())
                            .await?;
                    }
                }
            }
            Effect::ForwardProofs { shipment, to } => {
                let chat = to.resolve(event.chat_id, staff);
                let Some(s) = self.store.get_shipment(shipment).await? else {
                    return Ok(());
                };
                for file in &s.files {
                    self.transport.send_media(chat, file).await?;
                }
            }
            Effect::Render { view, to } => {
                let chat = to.resolve(event.chat_id, staff);
                for (text, markup) in self.render(view).await? {
                    self.transport
                        .send_message(chat, &text, markup.as_ref())
                        .await?;
                }
            }
            Effect::Broadcast { text } => {
                let recipients = self.store.list_approved_ids().await?;
                fanout::broadcast(
                    self.transport.as_ref(),
                    &recipients,
                    &text,
                    self.config.broadcast_delay,
                )
                .await;
            }
            _ => {}
        }
        Ok(())
    }

    async fn send(&self, out: Outgoing, origin: ChatId) -> Result<(), EngineError> {
        let chat = out.to.resolve(origin, self.config.staff_channel);
        let message_id = self
            .transport
            .send_message(chat, &out.text, out.markup.as_ref())
            .await?;
        if let Some(shipment) = out.track {
            let patch = ShipmentPatch {
                admin_message_id: Some(message_id),
                ..ShipmentPatch::default()
            };
            self.store.update_shipment(shipment, &patch).await?;
        }
        Ok(())
    }

    /// Messages making up a view, in display order
    async fn render(&self, view: View) -> Result<Vec<(String, Option<Markup>)>, EngineError> {
        let messages = match view {
            View::Tracking { owner } => {
                let shipments = self.store.list_shipments_by_owner(owner).await?;
                if shipments.is_empty() {
                    vec![(
                        "You have no shipments yet.".to_string(),
                        Some(keyboard::back_to_main()),
                    )]
                } else {
                    std::iter::once(("📦 Your Shipments".to_string(), None))
                        .chain(
                            shipments
                                .iter()
                                .map(|s| (render::tracking_card(s), keyboard::shipment_actions(s))),
                        )
                        .collect()
                }
            }
            View::StaffPanel => {
                let shipments = self
                    .store
                    .list_recent_shipments(self.config.staff_panel_limit)
                    .await?;
                if shipments.is_empty() {
                    vec![("🛠 Staff Panel\nNo shipments yet.".to_string(), None)]
                } else {
                    std::iter::once(("🛠 Staff Panel\nRecent shipments:".to_string(), None))
                        .chain(
                            shipments
                                .iter()
                                .map(|s| (render::staff_card(s), keyboard::staff_actions(s))),
                        )
                        .collect()
                }
            }
            View::PendingUsers => {
                let pending = self.store.list_pending_users().await?;
                if pending.is_empty() {
                    vec![("✅ No pending user requests.".to_string(), None)]
                } else {
                    pending
                        .iter()
                        .map(|u| {
                            (
                                render::registration_notice(u),
                                Some(keyboard::user_approval(u.id)),
                            )
                        })
                        .collect()
                }
            }
            View::AdminPanel => {
                let rate = self.store.get_setting(EXCHANGE_RATE_KEY).await?;
                let stats = self.store.stats().await?;
                vec![(
                    render::admin_panel(rate, stats),
                    Some(keyboard::admin_settings()),
                )]
            }
        };
        Ok(messages)
    }

    /// Answer a button press so the client stops its spinner
    async fn acknowledge(&self, event: &Inbound, toast: Option<&str>) {
        let Some(press) = event.button() else {
            return;
        };
        if let Err(e) = self.transport.answer_button(&press.callback_id, toast).await {
            tracing::debug!(error = %e, "Failed to answer button");
        }
    }
}

#[async_trait]
impl<S, F, T> UpdateHandler for Engine<S, F, T>
where
    S: RecordStore + 'static,
    F: FileSink + 'static,
    T: ChatTransport + 'static,
{
    async fn handle(&self, event: Inbound) -> Result<(), EngineError> {
        self.process(&event).await
    }
}
