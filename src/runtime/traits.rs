//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the engine with mock implementations.

use super::executor::EngineError;
use crate::db::{
    ChatId, Database, DbError, NewShipment, NewUser, PaymentStatus, ProofFile, Shipment,
    ShipmentId, ShipmentPatch, ShipmentStatus, Stats, User, UserId, UserPatch,
};
use crate::workflow::{Inbound, Markup};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

/// Failure at the record-store or file-sink seam
#[derive(Debug, Error)]
pub enum StoreError {
    /// Transient; the event may be retried
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("record not found: {0}")]
    NotFound(String),
}

impl From<DbError> for StoreError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::UserNotFound(_) | DbError::ShipmentNotFound(_) => {
                StoreError::NotFound(e.to_string())
            }
            other => StoreError::Unavailable(other.to_string()),
        }
    }
}

/// Failure at the chat-transport seam
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network trouble or a 5xx; the event may be retried
    #[error("transport unavailable: {0}")]
    Unavailable(String),
    /// The platform refused the request (blocked bot, bad chat id, ...)
    #[error("transport rejected request: {0}")]
    Rejected(String),
}

/// Persistent records: profiles, shipments, settings, pending proofs, claims
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError>;
    async fn create_user(&self, new: &NewUser) -> Result<User, StoreError>;
    async fn update_user(&self, id: UserId, patch: &UserPatch) -> Result<User, StoreError>;
    async fn delete_user(&self, id: UserId) -> Result<bool, StoreError>;
    async fn list_pending_users(&self) -> Result<Vec<User>, StoreError>;
    async fn list_approved_ids(&self) -> Result<Vec<UserId>, StoreError>;

    async fn create_shipment(&self, new: &NewShipment) -> Result<Shipment, StoreError>;
    async fn get_shipment(&self, id: ShipmentId) -> Result<Option<Shipment>, StoreError>;
    async fn update_shipment(
        &self,
        id: ShipmentId,
        patch: &ShipmentPatch,
    ) -> Result<Shipment, StoreError>;
    async fn set_status(
        &self,
        id: ShipmentId,
        status: ShipmentStatus,
        payment: Option<PaymentStatus>,
    ) -> Result<Shipment, StoreError>;
    async fn list_shipments_by_owner(&self, owner: UserId) -> Result<Vec<Shipment>, StoreError>;
    async fn list_recent_shipments(&self, limit: usize) -> Result<Vec<Shipment>, StoreError>;

    async fn get_setting(&self, key: &str) -> Result<f64, StoreError>;
    async fn set_setting(&self, key: &str, value: f64) -> Result<(), StoreError>;
    async fn stats(&self) -> Result<Stats, StoreError>;

    async fn reset_pending_proofs(&self, shipment: ShipmentId, owner: UserId)
        -> Result<(), StoreError>;
    async fn append_pending_proof(
        &self,
        shipment: ShipmentId,
        owner: UserId,
        proof: &ProofFile,
    ) -> Result<usize, StoreError>;
    async fn count_pending_proofs(&self, shipment: ShipmentId) -> Result<usize, StoreError>;
    async fn take_pending_proofs(&self, shipment: ShipmentId) -> Result<Vec<ProofFile>, StoreError>;

    /// Record an event id; `false` if it was already claimed
    async fn claim_event(&self, event_id: &str) -> Result<bool, StoreError>;
    async fn release_event(&self, event_id: &str) -> Result<(), StoreError>;
    async fn prune_events(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError>;
}

/// Public blob storage for uploaded proofs
#[async_trait]
pub trait FileSink: Send + Sync {
    /// Store `bytes` at `path` and return the public URL
    async fn store_file(&self, path: &str, bytes: Vec<u8>, mime: &str)
        -> Result<String, StoreError>;
}

/// The chat platform
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send a message and return its id
    async fn send_message(
        &self,
        chat: ChatId,
        text: &str,
        markup: Option<&Markup>,
    ) -> Result<i64, TransportError>;

    /// Replace the text of a sent message; `None` markup removes its buttons
    async fn edit_message(
        &self,
        chat: ChatId,
        message_id: i64,
        text: &str,
        markup: Option<&Markup>,
    ) -> Result<(), TransportError>;

    /// Send a stored proof as a photo or document
    async fn send_media(&self, chat: ChatId, file: &ProofFile) -> Result<(), TransportError>;

    /// Acknowledge a button press, optionally with a short notice
    async fn answer_button(&self, callback_id: &str, text: Option<&str>)
        -> Result<(), TransportError>;

    /// Download an uploaded file's bytes
    async fn fetch_file(&self, file_id: &str) -> Result<Vec<u8>, TransportError>;
}

/// Entry point shared by the webhook route and the long-poll loop
#[async_trait]
pub trait UpdateHandler: Send + Sync {
    async fn handle(&self, event: Inbound) -> Result<(), EngineError>;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: ChatTransport + ?Sized> ChatTransport for Arc<T> {
    async fn send_message(
        &self,
        chat: ChatId,
        text: &str,
        markup: Option<&Markup>,
    ) -> Result<i64, TransportError> {
        (**self).send_message(chat, text, markup).await
    }

    async fn edit_message(
        &self,
        chat: ChatId,
        message_id: i64,
        text: &str,
        markup: Option<&Markup>,
    ) -> Result<(), TransportError> {
        (**self).edit_message(chat, message_id, text, markup).await
    }

    async fn send_media(&self, chat: ChatId, file: &ProofFile) -> Result<(), TransportError> {
        (**self).send_media(chat, file).await
    }

    async fn answer_button(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), TransportError> {
        (**self).answer_button(callback_id, text).await
    }

    async fn fetch_file(&self, file_id: &str) -> Result<Vec<u8>, TransportError> {
        (**self).fetch_file(file_id).await
    }
}

#[async_trait]
impl<T: UpdateHandler + ?Sized> UpdateHandler for Arc<T> {
    async fn handle(&self, event: Inbound) -> Result<(), EngineError> {
        (**self).handle(event).await
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

/// Adapter to use Database as RecordStore
#[derive(Clone)]
pub struct DatabaseStore {
    db: Database,
}

impl DatabaseStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    #[cfg(test)]
    pub fn inner(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl RecordStore for DatabaseStore {
    async fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.db.get_user(id)?)
    }

    async fn create_user(&self, new: &NewUser) -> Result<User, StoreError> {
        Ok(self.db.create_user(new)?)
    }

    async fn update_user(&self, id: UserId, patch: &UserPatch) -> Result<User, StoreError> {
        Ok(self.db.update_user(id, patch)?)
    }

    async fn delete_user(&self, id: UserId) -> Result<bool, StoreError> {
        Ok(self.db.delete_user(id)?)
    }

    async fn list_pending_users(&self) -> Result<Vec<User>, StoreError> {
        Ok(self.db.list_pending_users()?)
    }

    async fn list_approved_ids(&self) -> Result<Vec<UserId>, StoreError> {
        Ok(self.db.list_approved_ids()?)
    }

    async fn create_shipment(&self, new: &NewShipment) -> Result<Shipment, StoreError> {
        Ok(self.db.create_shipment(new)?)
    }

    async fn get_shipment(&self, id: ShipmentId) -> Result<Option<Shipment>, StoreError> {
        Ok(self.db.get_shipment(id)?)
    }

    async fn update_shipment(
        &self,
        id: ShipmentId,
        patch: &ShipmentPatch,
    ) -> Result<Shipment, StoreError> {
        Ok(self.db.update_shipment(id, patch)?)
    }

    async fn set_status(
        &self,
        id: ShipmentId,
        status: ShipmentStatus,
        payment: Option<PaymentStatus>,
    ) -> Result<Shipment, StoreError> {
        Ok(self.db.set_status(id, status, payment)?)
    }

    async fn list_shipments_by_owner(&self, owner: UserId) -> Result<Vec<Shipment>, StoreError> {
        Ok(self.db.list_shipments_by_owner(owner)?)
    }

    async fn list_recent_shipments(&self, limit: usize) -> Result<Vec<Shipment>, StoreError> {
        Ok(self.db.list_recent_shipments(limit)?)
    }

    async fn get_setting(&self, key: &str) -> Result<f64, StoreError> {
        Ok(self.db.get_setting(key)?)
    }

    async fn set_setting(&self, key: &str, value: f64) -> Result<(), StoreError> {
        Ok(self.db.set_setting(key, value)?)
    }

    async fn stats(&self) -> Result<Stats, StoreError> {
        Ok(self.db.stats()?)
    }

    async fn reset_pending_proofs(
        &self,
        shipment: ShipmentId,
        owner: UserId,
    ) -> Result<(), StoreError> {
        Ok(self.db.reset_pending_proofs(shipment, owner)?)
    }

    async fn append_pending_proof(
        &self,
        shipment: ShipmentId,
        owner: UserId,
        proof: &ProofFile,
    ) -> Result<usize, StoreError> {
        Ok(self.db.append_pending_proof(shipment, owner, proof)?)
    }

    async fn count_pending_proofs(&self, shipment: ShipmentId) -> Result<usize, StoreError> {
        Ok(self.db.count_pending_proofs(shipment)?)
    }

    async fn take_pending_proofs(
        &self,
        shipment: ShipmentId,
    ) -> Result<Vec<ProofFile>, StoreError> {
        Ok(self.db.take_pending_proofs(shipment)?)
    }

    async fn claim_event(&self, event_id: &str) -> Result<bool, StoreError> {
        Ok(self.db.claim_event(event_id)?)
    }

    async fn release_event(&self, event_id: &str) -> Result<(), StoreError> {
        Ok(self.db.release_event(event_id)?)
    }

    async fn prune_events(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        Ok(self.db.prune_events(cutoff)?)
    }
}
