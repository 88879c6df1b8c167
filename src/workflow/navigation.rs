//! Read-only screens and the entry into proof upload

use super::effect::{Effect, Recipient, View};
use super::keyboard;
use super::render;
use super::token::{SessionToken, UploadSlot};
use super::transition::{Context, TransitionResult};
use crate::db::{ShipmentId, ShipmentStatus, User};

pub fn profile(user: &User) -> TransitionResult {
    TransitionResult::new().with_effect(Effect::reply_with(
        render::profile(user),
        keyboard::back_to_main(),
    ))
}

pub fn tracking(user: &User) -> TransitionResult {
    TransitionResult::new().with_effect(Effect::Render {
        view: View::Tracking { owner: user.id },
        to: Recipient::Origin,
    })
}

/// `start_upload_<id>`: owner begins sending the two proof files
pub fn start_upload(ctx: &Context, user: &User, id: ShipmentId) -> TransitionResult {
    let Some(s) = ctx.owned_shipment(id, user.id) else {
        return TransitionResult::stale(user.id);
    };
    match s.status {
        ShipmentStatus::RateApproved => TransitionResult::new()
            .with_effect(Effect::ResetPendingProofs {
                shipment: id,
                owner: user.id,
            })
            .with_effect(Effect::set_token(
                user.id,
                Some(SessionToken::Upload {
                    slot: UploadSlot::First,
                    shipment: id,
                }),
            ))
            .with_effect(Effect::reply(
                "💳 Payment Proof Upload\nSend the first file now (Photo or PDF):",
            )),
        ShipmentStatus::PaymentReceived => {
            TransitionResult::toast("Payment proof is already under review.")
        }
        _ => TransitionResult::toast("This shipment is not waiting for payment."),
    }
}
