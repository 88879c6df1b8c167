//! Two-phase approval workflow
//!
//! Phase 1: staff approve or reject the quoted rate.
//! Phase 2: the owner uploads two proof files, staff verify or reject them.
//! Staff then push booked shipments through uplifted and completed.
//! Role checks happen before these handlers run; admin text input is
//! re-checked here because the role may have changed since the prompt.

use super::action::Action;
use super::effect::{Effect, Outgoing, Recipient};
use super::event::Inbound;
use super::keyboard::{self, Button, Markup};
use super::metrics::quote;
use super::render;
use super::token::{SessionToken, UploadSlot};
use super::transition::{Context, TransitionError, TransitionResult};
use super::validate;
use crate::db::{
    PaymentStatus, Role, Shipment, ShipmentId, ShipmentStatus, User, UserId, UserPatch,
    EXCHANGE_RATE_KEY, REQUIRED_PROOFS,
};

const ALREADY_HANDLED: &str = "Already handled.";

/// Append a decision line to the staff card the button sits on
fn annotate(event: &Inbound, decision: &str) -> Option<Effect> {
    let source = event.button()?.source.as_ref()?;
    Some(Effect::edit_source(format!("{}\n\n{decision}", source.text)))
}

fn awb(s: &Shipment) -> &str {
    s.awb_number.as_deref().unwrap_or("N/A")
}

// ============================================================
// Phase 1: rate approval
// ============================================================

pub fn approve_rate(
    ctx: &Context,
    staff: &User,
    id: ShipmentId,
    event: &Inbound,
) -> TransitionResult {
    let Some(s) = ctx.shipment_for(id) else {
        return TransitionResult::stale(staff.id);
    };
    if s.status != ShipmentStatus::PendingRateApproval {
        return TransitionResult::toast(ALREADY_HANDLED);
    }

    let q = quote(s);
    TransitionResult::new()
        .with_effect(Effect::SetStatus {
            shipment: id,
            status: ShipmentStatus::RateApproved,
            payment: None,
        })
        .with_effects(annotate(
            event,
            "✅ RATE APPROVED BY STAFF\nWaiting for user payment proof.",
        ))
        .with_effect(Effect::Send(
            Outgoing::new(
                Recipient::User(s.owner_id),
                format!(
                    "✅ Shipment Rate Approved!\nAWB: {}\nTotal USD: {}\n\n\
                     Please click the button below to upload your payment proof.",
                    awb(s),
                    q.total_usd
                ),
            )
            .markup(keyboard::upload_proof(id)),
        ))
        .with_effect(Effect::Toast("Rate approved.".to_string()))
}

pub fn reject_rate(ctx: &Context, staff: &User, id: ShipmentId) -> TransitionResult {
    let Some(s) = ctx.shipment_for(id) else {
        return TransitionResult::stale(staff.id);
    };
    if s.status != ShipmentStatus::PendingRateApproval {
        return TransitionResult::toast(ALREADY_HANDLED);
    }
    TransitionResult::new()
        .with_effect(Effect::set_token(
            staff.id,
            Some(SessionToken::RejectRate { shipment: id }),
        ))
        .with_effect(Effect::reply(
            "📝 Please type the reason for rejecting this shipment/rate:",
        ))
}

// ============================================================
// Phase 2: payment verification
// ============================================================

pub fn approve_payment(
    ctx: &Context,
    staff: &User,
    id: ShipmentId,
    event: &Inbound,
) -> TransitionResult {
    let Some(s) = ctx.shipment_for(id) else {
        return TransitionResult::stale(staff.id);
    };
    if s.status != ShipmentStatus::PaymentReceived {
        return TransitionResult::toast(ALREADY_HANDLED);
    }
    TransitionResult::new()
        .with_effect(Effect::SetStatus {
            shipment: id,
            status: ShipmentStatus::Booked,
            payment: Some(PaymentStatus::Paid),
        })
        .with_effects(annotate(event, "✅ PAYMENT VERIFIED AND SHIPMENT BOOKED"))
        .with_effect(Effect::notify(
            s.owner_id,
            format!(
                "💰 Payment Verified!\nAWB: {}\n\n\
                 Your shipment is now officially BOOKED. We will notify you of further updates.",
                awb(s)
            ),
        ))
        .with_effect(Effect::Toast("Payment approved.".to_string()))
}

pub fn reject_payment(ctx: &Context, staff: &User, id: ShipmentId) -> TransitionResult {
    let Some(s) = ctx.shipment_for(id) else {
        return TransitionResult::stale(staff.id);
    };
    if s.status != ShipmentStatus::PaymentReceived {
        return TransitionResult::toast(ALREADY_HANDLED);
    }
    TransitionResult::new()
        .with_effect(Effect::set_token(
            staff.id,
            Some(SessionToken::RejectPayment { shipment: id }),
        ))
        .with_effect(Effect::reply(
            "📝 Please type the reason why the payment proof was rejected:",
        ))
}

/// File (or stray text) sent while the token is `UPLOAD_<n>_<id>`
pub fn proof_intake(
    ctx: &Context,
    user: &User,
    id: ShipmentId,
    event: &Inbound,
) -> TransitionResult {
    let Some(s) = ctx.owned_shipment(id, user.id) else {
        return TransitionResult::stale(user.id);
    };
    if s.status != ShipmentStatus::RateApproved {
        return TransitionResult::new()
            .with_effect(Effect::set_token(user.id, None))
            .with_effect(Effect::reply(
                "This shipment is not waiting for payment proof.",
            ));
    }
    let Some(file) = event.file() else {
        return TransitionResult::new().with_effect(Effect::reply("❌ Send a Photo or PDF."));
    };

    let store = Effect::StoreProof {
        shipment: id,
        owner: user.id,
        file: file.clone(),
    };

    // The collected count decides, not the slot: album photos can arrive
    // together and both read the first slot.
    if ctx.pending_proofs + 1 < REQUIRED_PROOFS {
        return TransitionResult::new()
            .with_effect(store)
            .with_effect(Effect::set_token(
                user.id,
                Some(SessionToken::Upload {
                    slot: UploadSlot::Second,
                    shipment: id,
                }),
            ))
            .with_effect(Effect::reply("📥 Received file 1/2. Send the second:"));
    }

    let mut received = s.clone();
    received.status = ShipmentStatus::PaymentReceived;
    received.payment_status = PaymentStatus::Unpaid;

    let mut result = TransitionResult::new();
    if ctx.pending_proofs < REQUIRED_PROOFS {
        result = result.with_effect(store);
    }
    result
        .with_effect(Effect::CommitProofs { shipment: id })
        .with_effect(Effect::set_token(user.id, None))
        .with_effect(Effect::reply_with(
            "✅ Payment Proof Submitted!",
            Markup::Dashboard(user.role),
        ))
        .with_effect(Effect::ForwardProofs {
            shipment: id,
            to: Recipient::StaffChannel,
        })
        .with_effect(Effect::Send(
            Outgoing::new(Recipient::StaffChannel, render::payment_request(&received))
                .markup(keyboard::payment_decision(id))
                .tracked(id),
        ))
}

// ============================================================
// Lifecycle
// ============================================================

pub fn advance_status(
    ctx: &Context,
    staff: &User,
    status: ShipmentStatus,
    id: ShipmentId,
    event: &Inbound,
) -> TransitionResult {
    let Some(s) = ctx.shipment_for(id) else {
        return TransitionResult::stale(staff.id);
    };
    if s.status.next_lifecycle() != Some(status) {
        return TransitionResult::toast(ALREADY_HANDLED);
    }
    let notice = match status {
        ShipmentStatus::Uplifted => format!(
            "🛫 Shipment Uplifted!\nAWB: {}\n\nYour cargo is on its way.",
            awb(s)
        ),
        _ => format!(
            "🏁 Shipment Completed!\nAWB: {}\n\nYour cargo has been delivered.",
            awb(s)
        ),
    };
    TransitionResult::new()
        .with_effect(Effect::SetStatus {
            shipment: id,
            status,
            payment: None,
        })
        .with_effects(annotate(
            event,
            &format!("✅ Marked {}", render::status_title(status)),
        ))
        .with_effect(Effect::notify(s.owner_id, notice))
        .with_effect(Effect::Toast(format!(
            "Marked {}.",
            render::status_title(status)
        )))
}

// ============================================================
// Access management
// ============================================================

pub fn approve_user(ctx: &Context, target: UserId, role: Role) -> TransitionResult {
    let Some(subject) = ctx.subject.as_ref().filter(|u| u.id == target) else {
        return TransitionResult::new()
            .with_effect(Effect::edit_source(format!("⚠️ User ID {target} no longer exists.")));
    };
    if subject.is_approved {
        return TransitionResult::toast(ALREADY_HANDLED);
    }
    let role_name = role.as_str().to_uppercase();
    TransitionResult::new()
        .with_effect(Effect::UpdateUser {
            id: target,
            patch: UserPatch {
                role: Some(role),
                is_approved: Some(true),
                state: Some(None),
                ..UserPatch::default()
            },
        })
        .with_effect(Effect::edit_source(format!(
            "✅ User ID {target} approved as {role_name}."
        )))
        .with_effect(Effect::Send(
            Outgoing::new(
                Recipient::User(target),
                format!(
                    "🎉 Account Approved!\nYou have been granted {role_name} access.\n\n\
                     Use the dashboard menu at the bottom of your screen to begin."
                ),
            )
            .markup(Markup::Dashboard(role)),
        ))
}

pub fn block_user(ctx: &Context, target: UserId) -> TransitionResult {
    let Some(subject) = ctx.subject.as_ref().filter(|u| u.id == target) else {
        return TransitionResult::new()
            .with_effect(Effect::edit_source(format!("⚠️ User ID {target} no longer exists.")));
    };
    if subject.role.is_admin() {
        return TransitionResult::toast("Admins cannot be blocked.");
    }
    TransitionResult::new()
        .with_effect(Effect::DeleteUser(target))
        .with_effect(Effect::edit_source(format!(
            "🚫 User ID {target} has been blocked."
        )))
}

// ============================================================
// Admin settings
// ============================================================

pub fn begin_exchange_rate(admin: &User) -> TransitionResult {
    TransitionResult::new()
        .with_effect(Effect::set_token(admin.id, Some(SessionToken::SetExchange)))
        .with_effect(Effect::reply_with(
            "📈 Enter the new Exchange Rate (USD to ETB):",
            keyboard::back_to_main(),
        ))
}

pub fn begin_broadcast(admin: &User) -> TransitionResult {
    TransitionResult::new()
        .with_effect(Effect::set_token(admin.id, Some(SessionToken::AdmBroadcast)))
        .with_effect(Effect::reply_with(
            "📣 Send the announcement to deliver to every approved user:",
            keyboard::back_to_main(),
        ))
}

/// Text typed while the token is `SET_EXCHANGE`, `REJECT_*` or `ADM_BROADCAST`
pub fn admin_text(
    ctx: &Context,
    user: &User,
    token: &SessionToken,
    text: &str,
) -> Result<TransitionResult, TransitionError> {
    match token {
        SessionToken::SetExchange => {
            if !user.role.is_admin() {
                return Err(TransitionError::unauthorized(user.id, token));
            }
            let Ok(rate) = validate::positive_float(text) else {
                return Ok(TransitionResult::new().with_effect(Effect::reply(
                    "❌ Invalid number. Please enter a numeric value (e.g. 56.5):",
                )));
            };
            Ok(TransitionResult::new()
                .with_effect(Effect::SetSetting {
                    key: EXCHANGE_RATE_KEY,
                    value: rate,
                })
                .with_effect(Effect::set_token(user.id, None))
                .with_effect(Effect::reply_with(
                    format!("✅ Exchange Rate updated to: {rate} ETB"),
                    keyboard::back_to_main(),
                )))
        }
        SessionToken::AdmBroadcast => {
            if !user.role.is_admin() {
                return Err(TransitionError::unauthorized(user.id, token));
            }
            let Ok(text) = validate::non_empty(text) else {
                return Ok(TransitionResult::new()
                    .with_effect(Effect::reply("⚠️ The announcement cannot be empty.")));
            };
            Ok(TransitionResult::new()
                .with_effect(Effect::set_token(user.id, None))
                .with_effect(Effect::reply("📣 Broadcast started."))
                .with_effect(Effect::Broadcast { text }))
        }
        SessionToken::RejectRate { shipment } | SessionToken::RejectPayment { shipment } => {
            if !user.role.is_staff() {
                return Err(TransitionError::unauthorized(user.id, token));
            }
            Ok(rejection_reason(ctx, user, token, *shipment, text))
        }
        other => Err(TransitionError::Unexpected(format!(
            "admin text with token {other}"
        ))),
    }
}

fn rejection_reason(
    ctx: &Context,
    staff: &User,
    token: &SessionToken,
    id: ShipmentId,
    text: &str,
) -> TransitionResult {
    let Some(s) = ctx.shipment_for(id) else {
        return TransitionResult::stale(staff.id);
    };
    let Ok(reason) = validate::non_empty(text) else {
        return TransitionResult::new()
            .with_effect(Effect::reply("⚠️ Please type a reason for the rejection:"));
    };

    let payment = matches!(token, SessionToken::RejectPayment { .. });
    let (expected, title, status, payment_status, markup) = if payment {
        (
            ShipmentStatus::PaymentReceived,
            "❌ Payment Proof Rejected",
            ShipmentStatus::RateApproved,
            Some(PaymentStatus::Unpaid),
            keyboard::upload_proof(id),
        )
    } else {
        (
            ShipmentStatus::PendingRateApproval,
            "❌ Shipment/Rate Rejected",
            ShipmentStatus::QuotationCreated,
            None,
            Markup::Inline(vec![vec![Button::new(
                "📝 Edit and Resubmit",
                Action::EditExisting(id),
            )]]),
        )
    };

    if s.status != expected {
        return TransitionResult::new()
            .with_effect(Effect::set_token(staff.id, None))
            .with_effect(Effect::reply("This shipment was already handled."));
    }

    TransitionResult::new()
        .with_effect(Effect::SetStatus {
            shipment: id,
            status,
            payment: payment_status,
        })
        .with_effect(Effect::set_token(staff.id, None))
        .with_effect(Effect::Send(
            Outgoing::new(
                Recipient::User(s.owner_id),
                format!(
                    "{title}\nAWB: {}\n\nComment from Staff:\n{reason}",
                    awb(s)
                ),
            )
            .markup(markup),
        ))
        .with_effect(Effect::reply("✅ Rejection sent to user."))
}
