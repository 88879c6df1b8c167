//! Effects produced by transitions

use super::event::FileRef;
use super::keyboard::Markup;
use super::token::SessionToken;
use crate::db::{
    ChatId, NewShipment, NewUser, PaymentStatus, ShipmentId, ShipmentPatch, ShipmentStatus,
    UserId, UserPatch,
};

/// Where an outbound message goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    /// The chat the inbound event arrived in
    Origin,
    /// A user's private chat
    User(UserId),
    /// The configured staff-notification channel
    StaffChannel,
}

impl Recipient {
    pub fn resolve(self, origin: ChatId, staff_channel: ChatId) -> ChatId {
        match self {
            Recipient::Origin => origin,
            Recipient::User(id) => id,
            Recipient::StaffChannel => staff_channel,
        }
    }
}

/// One outbound message
#[derive(Debug, Clone, PartialEq)]
pub struct Outgoing {
    pub to: Recipient,
    pub text: String,
    pub markup: Option<Markup>,
    /// Record the sent message id on this shipment for later follow-up
    pub track: Option<ShipmentId>,
}

impl Outgoing {
    pub fn new(to: Recipient, text: impl Into<String>) -> Self {
        Self {
            to,
            text: text.into(),
            markup: None,
            track: None,
        }
    }

    #[must_use]
    pub fn markup(mut self, markup: Markup) -> Self {
        self.markup = Some(markup);
        self
    }

    #[must_use]
    pub fn tracked(mut self, shipment: ShipmentId) -> Self {
        self.track = Some(shipment);
        self
    }
}

/// Screens whose content needs a store read at execution time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    /// One card per shipment owned by the user
    Tracking { owner: UserId },
    /// Recent shipments across all users, with lifecycle buttons
    StaffPanel,
    /// Registrations waiting for approval
    PendingUsers,
    /// Exchange rate and record counts
    AdminPanel,
}

/// Effects to be executed after a transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    // ---- record mutations; executed first, in order, failures abort ----
    CreateUser(NewUser),
    UpdateUser {
        id: UserId,
        patch: UserPatch,
    },
    DeleteUser(UserId),
    CreateShipment(NewShipment),
    UpdateShipment {
        id: ShipmentId,
        patch: ShipmentPatch,
    },
    SetStatus {
        shipment: ShipmentId,
        status: ShipmentStatus,
        payment: Option<PaymentStatus>,
    },
    SetSetting {
        key: &'static str,
        value: f64,
    },
    /// Start a fresh pending-upload record for the shipment
    ResetPendingProofs {
        shipment: ShipmentId,
        owner: UserId,
    },
    /// Download the file from the transport, store it and add it to the pending record
    StoreProof {
        shipment: ShipmentId,
        owner: UserId,
        file: FileRef,
    },
    /// Move pending proofs onto the shipment and mark payment as received
    CommitProofs {
        shipment: ShipmentId,
    },

    // ---- outbound; executed after mutations, failures are logged ----
    Send(Outgoing),
    /// Replace the text (and buttons) of the message the pressed button sits on
    EditSource {
        text: String,
        markup: Option<Markup>,
    },
    /// Send the shipment's stored proofs as photos/documents
    ForwardProofs {
        shipment: ShipmentId,
        to: Recipient,
    },
    Render {
        view: View,
        to: Recipient,
    },
    /// Best-effort announcement to every approved user
    Broadcast {
        text: String,
    },
    /// Short acknowledgement shown on the pressed button
    Toast(String),
}

impl Effect {
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Effect::CreateUser(_)
                | Effect::UpdateUser { .. }
                | Effect::DeleteUser(_)
                | Effect::CreateShipment(_)
                | Effect::UpdateShipment { .. }
                | Effect::SetStatus { .. }
                | Effect::SetSetting { .. }
                | Effect::ResetPendingProofs { .. }
                | Effect::StoreProof { .. }
                | Effect::CommitProofs { .. }
        )
    }

    pub fn set_token(user: UserId, token: Option<SessionToken>) -> Self {
        Effect::UpdateUser {
            id: user,
            patch: UserPatch::token(token),
        }
    }

    pub fn reply(text: impl Into<String>) -> Self {
        Effect::Send(Outgoing::new(Recipient::Origin, text))
    }

    pub fn reply_with(text: impl Into<String>, markup: Markup) -> Self {
        Effect::Send(Outgoing::new(Recipient::Origin, text).markup(markup))
    }

    pub fn notify(user: UserId, text: impl Into<String>) -> Self {
        Effect::Send(Outgoing::new(Recipient::User(user), text))
    }

    pub fn edit_source(text: impl Into<String>) -> Self {
        Effect::EditSource {
            text: text.into(),
            markup: None,
        }
    }
}
