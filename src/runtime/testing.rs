//! Mock implementations for testing
//!
//! These mocks enable end-to-end event scenarios without real I/O.

use super::traits::*;
use crate::db::{ChatId, ProofFile};
use crate::workflow::Markup;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Mutex;

// ============================================================================
// Mock Chat Transport
// ============================================================================

/// A message the engine sent or edited
#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub chat: ChatId,
    pub message_id: i64,
    pub text: String,
    pub markup: Option<Markup>,
}

/// Recording transport; every call succeeds unless told otherwise
pub struct MockTransport {
    next_id: AtomicI64,
    sent: Mutex<Vec<SentMessage>>,
    edits: Mutex<Vec<SentMessage>>,
    media: Mutex<Vec<(ChatId, ProofFile)>>,
    answers: Mutex<Vec<(String, Option<String>)>>,
    failing_chats: Mutex<HashSet<ChatId>>,
    fail_fetch: AtomicBool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1000),
            sent: Mutex::new(Vec::new()),
            edits: Mutex::new(Vec::new()),
            media: Mutex::new(Vec::new()),
            answers: Mutex::new(Vec::new()),
            failing_chats: Mutex::new(HashSet::new()),
            fail_fetch: AtomicBool::new(false),
        }
    }

    /// Reject every send to `chat`
    pub fn fail_chat(&self, chat: ChatId) {
        self.failing_chats.lock().unwrap().insert(chat);
    }

    /// Make file downloads fail as if the platform were down
    pub fn set_fetch_failing(&self, failing: bool) {
        self.fail_fetch.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, chat: ChatId) -> Vec<SentMessage> {
        self.sent().into_iter().filter(|m| m.chat == chat).collect()
    }

    pub fn edits(&self) -> Vec<SentMessage> {
        self.edits.lock().unwrap().clone()
    }

    pub fn media(&self) -> Vec<(ChatId, ProofFile)> {
        self.media.lock().unwrap().clone()
    }

    pub fn answers(&self) -> Vec<(String, Option<String>)> {
        self.answers.lock().unwrap().clone()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatTransport for MockTransport {
    async fn send_message(
        &self,
        chat: ChatId,
        text: &str,
        markup: Option<&Markup>,
    ) -> Result<i64, TransportError> {
        if self.failing_chats.lock().unwrap().contains(&chat) {
            return Err(TransportError::Rejected(format!("chat {chat} blocked")));
        }
        let message_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.sent.lock().unwrap().push(SentMessage {
            chat,
            message_id,
            text: text.to_string(),
            markup: markup.cloned(),
        });
        Ok(message_id)
    }

    async fn edit_message(
        &self,
        chat: ChatId,
        message_id: i64,
        text: &str,
        markup: Option<&Markup>,
    ) -> Result<(), TransportError> {
        self.edits.lock().unwrap().push(SentMessage {
            chat,
            message_id,
            text: text.to_string(),
            markup: markup.cloned(),
        });
        Ok(())
    }

    async fn send_media(&self, chat: ChatId, file: &ProofFile) -> Result<(), TransportError> {
        self.media.lock().unwrap().push((chat, file.clone()));
        Ok(())
    }

    async fn answer_button(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), TransportError> {
        self.answers
            .lock()
            .unwrap()
            .push((callback_id.to_string(), text.map(str::to_string)));
        Ok(())
    }

    async fn fetch_file(&self, file_id: &str) -> Result<Vec<u8>, TransportError> {
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(TransportError::Unavailable("file server down".to_string()));
        }
        Ok(format!("bytes of {file_id}").into_bytes())
    }
}

// ============================================================================
// Mock File Sink
// ============================================================================

/// Keeps stored blobs in memory and hands out fake URLs
#[derive(Default)]
pub struct MemoryFileSink {
    pub stored: Mutex<Vec<(String, Vec<u8>, String)>>,
}

#[async_trait]
impl FileSink for MemoryFileSink {
    async fn store_file(
        &self,
        path: &str,
        bytes: Vec<u8>,
        mime: &str,
    ) -> Result<String, StoreError> {
        self.stored
            .lock()
            .unwrap()
            .push((path.to_string(), bytes, mime.to_string()));
        Ok(format!("https://files.test/{path}"))
    }
}

// ============================================================================
// Scenario tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{
        Database, NewUser, PaymentStatus, ProofFile, ProofKind, Role, Shipment, ShipmentStatus,
        UserId, EXCHANGE_RATE_KEY,
    };
    use crate::runtime::{Engine, EngineConfig};
    use crate::workflow::action::Action;
    use crate::workflow::event::{Actor, ButtonPress, FileRef, SourceMessage};
    use crate::workflow::token::{SessionToken, UploadSlot};
    use crate::workflow::{Inbound, InboundKind};
    use std::sync::atomic::AtomicU64;
    use std::sync::Arc;
    use std::time::Duration;

    const STAFF_CHANNEL: ChatId = -500;
    const OWNER: UserId = 11;
    const STAFF: UserId = 22;
    const ADMIN: UserId = 33;

    struct Harness {
        engine: Engine<DatabaseStore, MemoryFileSink, MockTransport>,
        transport: Arc<MockTransport>,
        db: Database,
        next_event: AtomicU64,
    }

    impl Harness {
        fn new() -> Self {
            let db = Database::open_in_memory().unwrap();
            let transport = Arc::new(MockTransport::new());
            let config = EngineConfig {
                staff_channel: STAFF_CHANNEL,
                admin_ids: vec![ADMIN],
                broadcast_delay: Duration::ZERO,
                ..EngineConfig::default()
            };
            let engine = Engine::new(
                DatabaseStore::new(db.clone()),
                MemoryFileSink::default(),
                Arc::clone(&transport),
                config,
            );
            Self {
                engine,
                transport,
                db,
                next_event: AtomicU64::new(1),
            }
        }

        fn seed(&self, id: UserId, role: Role) {
            self.db
                .create_user(&NewUser {
                    id,
                    username: Some(format!("user{id}")),
                    role,
                    is_approved: true,
                    state: None,
                })
                .unwrap();
        }

        fn event(&self, actor: UserId, kind: InboundKind) -> Inbound {
            Inbound {
                event_id: Some(self.next_event.fetch_add(1, Ordering::SeqCst).to_string()),
                actor: Actor {
                    id: actor,
                    username: None,
                },
                chat_id: actor,
                kind,
            }
        }

        async fn text(&self, actor: UserId, text: &str) {
            let event = self.event(
                actor,
                InboundKind::Text {
                    text: text.to_string(),
                },
            );
            self.engine.process(&event).await.unwrap();
        }

        async fn press(&self, actor: UserId, action: &Action) {
            let event = self.event(
                actor,
                InboundKind::Button(ButtonPress {
                    callback_id: format!("cb-{actor}"),
                    payload: action.to_string(),
                    source: Some(SourceMessage {
                        chat_id: STAFF_CHANNEL,
                        message_id: 77,
                        text: "request card".to_string(),
                    }),
                }),
            );
            self.engine.process(&event).await.unwrap();
        }

        fn file_event(&self, actor: UserId, file_id: &str) -> Inbound {
            self.event(
                actor,
                InboundKind::File(FileRef {
                    file_id: file_id.to_string(),
                    kind: ProofKind::Document,
                    mime_type: Some("application/pdf".to_string()),
                }),
            )
        }

        fn token(&self, user: UserId) -> Option<SessionToken> {
            self.db.get_user(user).unwrap().unwrap().state
        }

        fn only_shipment(&self, owner: UserId) -> Shipment {
            let mut shipments = self.db.list_shipments_by_owner(owner).unwrap();
            assert_eq!(shipments.len(), 1);
            shipments.remove(0)
        }

        /// Drive the owner through the wizard up to the review screen
        async fn fill_wizard(&self) -> Shipment {
            self.text(OWNER, "📦 New Shipment").await;
            for input in [
                "ET",
                "ADD",
                "DXB",
                "071-1234",
                "2",
                "100",
                "auto",
                "100x100x100",
                "5, 6",
                "Shipper Co",
                "Consignee Co",
                "Notify Co",
            ] {
                self.text(OWNER, input).await;
            }
            self.only_shipment(OWNER)
        }

        async fn upload_two_proofs(&self, shipment: &Shipment) {
            self.press(OWNER, &Action::StartUpload(shipment.id)).await;
            for file in ["proof-a", "proof-b"] {
                let event = self.file_event(OWNER, file);
                self.engine.process(&event).await.unwrap();
            }
        }
    }

    #[tokio::test]
    async fn test_registration_and_approval() {
        let h = Harness::new();
        h.seed(STAFF, Role::Staff);

        h.text(OWNER, "hi").await;
        assert_eq!(h.token(OWNER), Some(SessionToken::RegName));
        h.text(OWNER, "Abebe Kebede").await;
        h.text(OWNER, "Acme Freight").await;
        assert_eq!(h.token(OWNER), None);

        let notices = h.transport.sent_to(STAFF_CHANNEL);
        assert_eq!(notices.len(), 1);
        assert!(notices[0].text.contains("Company: Acme Freight"));

        // Unapproved users cannot use the dashboard yet
        h.text(OWNER, "📦 New Shipment").await;
        assert!(h.db.list_shipments_by_owner(OWNER).unwrap().is_empty());

        h.press(
            STAFF,
            &Action::ApproveUser {
                user: OWNER,
                role: Role::User,
            },
        )
        .await;
        let owner = h.db.get_user(OWNER).unwrap().unwrap();
        assert!(owner.is_approved);
        assert_eq!(owner.role, Role::User);
        assert!(h
            .transport
            .sent_to(OWNER)
            .iter()
            .any(|m| m.text.starts_with("🎉 Account Approved!")));
    }

    #[tokio::test]
    async fn test_allow_listed_admin_skips_review() {
        let h = Harness::new();
        h.text(ADMIN, "/start").await;
        h.text(ADMIN, "Root").await;
        h.text(ADMIN, "HQ").await;

        let admin = h.db.get_user(ADMIN).unwrap().unwrap();
        assert!(admin.is_approved);
        assert_eq!(admin.role, Role::Admin);
        assert!(h.transport.sent_to(STAFF_CHANNEL).is_empty());
    }

    #[tokio::test]
    async fn test_full_booking_flow() {
        let h = Harness::new();
        h.seed(OWNER, Role::User);
        h.seed(STAFF, Role::Staff);
        h.db.set_setting(EXCHANGE_RATE_KEY, 56.5).unwrap();

        let draft = h.fill_wizard().await;
        assert_eq!(h.token(OWNER), Some(SessionToken::review(draft.id)));
        assert_eq!(draft.pieces, Some(2));
        assert_eq!(draft.chargeable_weight, Some(333.33));
        assert_eq!(draft.exchange_rate, Some(56.5));

        h.press(OWNER, &Action::ConfirmShipment).await;
        let submitted = h.only_shipment(OWNER);
        assert_eq!(submitted.status, ShipmentStatus::PendingRateApproval);
        let request = h.transport.sent_to(STAFF_CHANNEL).pop().unwrap();
        assert!(request.text.starts_with("🚨 NEW SHIPMENT REVIEW REQUEST"));
        assert_eq!(submitted.admin_message_id, Some(request.message_id));

        h.press(STAFF, &Action::ApproveRate(draft.id)).await;
        assert_eq!(h.only_shipment(OWNER).status, ShipmentStatus::RateApproved);
        assert!(h.transport.edits().iter().any(|e| e.message_id == 77
            && e.text.contains("✅ RATE APPROVED BY STAFF")));

        h.upload_two_proofs(&draft).await;
        let received = h.only_shipment(OWNER);
        assert_eq!(received.status, ShipmentStatus::PaymentReceived);
        assert_eq!(received.files.len(), 2);
        let stored = h.engine.files().stored.lock().unwrap().clone();
        assert_eq!(stored.len(), 2);
        for ((path, bytes, _), (proof, name)) in stored
            .iter()
            .zip(received.files.iter().zip(["proof-a", "proof-b"]))
        {
            assert_eq!(proof.url, format!("https://files.test/{path}"));
            assert_eq!(bytes, &format!("bytes of {name}").into_bytes());
        }
        assert_eq!(h.token(OWNER), None);
        assert_eq!(h.transport.media().len(), 2);
        assert!(h.db.take_pending_proofs(draft.id).unwrap().is_empty());

        h.press(STAFF, &Action::ApprovePayment(draft.id)).await;
        let booked = h.only_shipment(OWNER);
        assert_eq!(booked.status, ShipmentStatus::Booked);
        assert_eq!(booked.payment_status, PaymentStatus::Paid);

        h.press(
            STAFF,
            &Action::AdvanceStatus {
                status: ShipmentStatus::Uplifted,
                shipment: draft.id,
            },
        )
        .await;
        assert_eq!(h.only_shipment(OWNER).status, ShipmentStatus::Uplifted);
    }

    #[tokio::test]
    async fn test_duplicate_delivery_processed_once() {
        let h = Harness::new();
        let event = h.event(
            OWNER,
            InboundKind::Text {
                text: "hello".to_string(),
            },
        );
        h.engine.process(&event).await.unwrap();
        h.engine.process(&event).await.unwrap();
        assert_eq!(h.transport.sent_to(OWNER).len(), 1);
    }

    #[tokio::test]
    async fn test_failed_download_releases_claim() {
        let h = Harness::new();
        h.seed(OWNER, Role::User);
        h.seed(STAFF, Role::Staff);
        let draft = h.fill_wizard().await;
        h.press(OWNER, &Action::ConfirmShipment).await;
        h.press(STAFF, &Action::ApproveRate(draft.id)).await;
        h.press(OWNER, &Action::StartUpload(draft.id)).await;

        h.transport.set_fetch_failing(true);
        let event = h.file_event(OWNER, "proof-a");
        assert!(h.engine.process(&event).await.is_err());
        assert_eq!(h.db.count_pending_proofs(draft.id).unwrap(), 0);
        assert_eq!(
            h.token(OWNER),
            Some(SessionToken::Upload {
                slot: UploadSlot::First,
                shipment: draft.id
            })
        );

        // Redelivery of the same event succeeds once the transport recovers
        h.transport.set_fetch_failing(false);
        h.engine.process(&event).await.unwrap();
        assert_eq!(h.db.count_pending_proofs(draft.id).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_album_upload_commits_exactly_two_proofs() {
        let h = Harness::new();
        h.seed(OWNER, Role::User);
        h.seed(STAFF, Role::Staff);
        let draft = h.fill_wizard().await;
        h.press(OWNER, &Action::ConfirmShipment).await;
        h.press(STAFF, &Action::ApproveRate(draft.id)).await;
        h.press(OWNER, &Action::StartUpload(draft.id)).await;

        // A sibling album photo was stored while the token still read slot 1
        h.db.append_pending_proof(
            draft.id,
            OWNER,
            &ProofFile {
                url: "https://files.test/sibling.jpg".to_string(),
                kind: ProofKind::Photo,
            },
        )
        .unwrap();
        assert_eq!(
            h.token(OWNER),
            Some(SessionToken::Upload {
                slot: UploadSlot::First,
                shipment: draft.id
            })
        );

        for file in ["proof-a", "proof-b"] {
            let event = h.file_event(OWNER, file);
            h.engine.process(&event).await.unwrap();
        }

        let received = h.only_shipment(OWNER);
        assert_eq!(received.status, ShipmentStatus::PaymentReceived);
        assert_eq!(received.files.len(), 2);
        assert_eq!(received.files[0].url, "https://files.test/sibling.jpg");
        assert_eq!(h.token(OWNER), None);
    }

    #[tokio::test]
    async fn test_tracking_without_shipments() {
        let h = Harness::new();
        h.seed(OWNER, Role::User);
        h.text(OWNER, "🔍 Track My Shipments").await;
        let sent = h.transport.sent_to(OWNER);
        assert_eq!(sent.last().unwrap().text, "You have no shipments yet.");
    }

    #[tokio::test]
    async fn test_unauthorized_press_is_dropped_but_answered() {
        let h = Harness::new();
        h.seed(OWNER, Role::User);
        let draft = h.fill_wizard().await;
        h.press(OWNER, &Action::ConfirmShipment).await;
        let before = h.transport.sent().len();

        h.press(OWNER, &Action::ApproveRate(draft.id)).await;

        assert_eq!(h.only_shipment(OWNER).status, ShipmentStatus::PendingRateApproval);
        assert_eq!(h.transport.sent().len(), before);
        assert_eq!(h.transport.answers().last().unwrap().0, format!("cb-{OWNER}"));
    }

    #[tokio::test]
    async fn test_broadcast_reaches_approved_users() {
        let h = Harness::new();
        h.seed(OWNER, Role::User);
        h.seed(ADMIN, Role::Admin);
        h.press(ADMIN, &Action::Broadcast).await;
        h.text(ADMIN, "Office closed Friday").await;

        assert!(h
            .transport
            .sent_to(OWNER)
            .iter()
            .any(|m| m.text == "Office closed Friday"));
        assert_eq!(h.token(ADMIN), None);
    }
}
