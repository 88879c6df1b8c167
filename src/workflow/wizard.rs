//! Shipment wizard
//!
//! A strictly ordered walk over [`WizardStep::ORDER`]. The draft shipment is
//! created at the first step and every accepted input is written straight
//! to it, so the walk survives any number of process restarts.

use super::action::airline_name;
use super::edit;
use super::effect::{Effect, Outgoing, Recipient};
use super::field::{apply_input, Field};
use super::keyboard::{self, Markup};
use super::render;
use super::token::{SessionToken, WizardStep};
use super::transition::{Context, TransitionResult};
use crate::db::{NewShipment, ShipmentId, ShipmentStatus, User};

/// Prompt and buttons for a wizard step
fn prompt(step: WizardStep) -> (&'static str, Markup) {
    match step.field() {
        Some(Field::Airline) => (
            "✈️ Enter the Airline Name or pick one below:",
            keyboard::airline_picker(),
        ),
        Some(field) => (field.prompt(), keyboard::cancel_back()),
        None => ("Everything correct?", keyboard::confirmation()),
    }
}

/// Open a fresh draft, abandoning any earlier one
pub fn start(ctx: &Context, user: &User) -> TransitionResult {
    let id = ctx.fresh_shipment_id;
    let (_, markup) = prompt(WizardStep::FIRST);
    TransitionResult::new()
        .with_effect(Effect::CreateShipment(NewShipment {
            id,
            owner_id: user.id,
            exchange_rate: ctx.exchange_rate,
        }))
        .with_effect(Effect::set_token(
            user.id,
            Some(SessionToken::ship(WizardStep::FIRST, id)),
        ))
        .with_effect(Effect::reply_with(
            "✈️ New Shipment\nEnter the Airline Name or pick one below:",
            markup,
        ))
}

/// Text typed while the token is `SHIP_<step>_<id>`
pub fn text_input(
    ctx: &Context,
    user: &User,
    step: WizardStep,
    id: ShipmentId,
    text: &str,
) -> TransitionResult {
    let Some(shipment) = ctx.owned_shipment(id, user.id) else {
        return TransitionResult::stale(user.id);
    };
    let Some(field) = step.field() else {
        return TransitionResult::new().with_effect(Effect::reply_with(
            "Please use the buttons to submit or edit this shipment.",
            keyboard::confirmation(),
        ));
    };

    let patch = match apply_input(field, text, shipment) {
        Ok(patch) => patch,
        Err(e) => {
            let (prompt, markup) = prompt(step);
            return TransitionResult::new()
                .with_effect(Effect::reply_with(format!("{e}\n{prompt}"), markup));
        }
    };

    let next = step.next().unwrap_or(WizardStep::Review);
    let updated = shipment.patched(&patch);
    let reply = if next == WizardStep::Review {
        Effect::reply_with(render::summary(&updated), keyboard::confirmation())
    } else {
        let (prompt, markup) = prompt(next);
        Effect::reply_with(prompt, markup)
    };

    TransitionResult::new()
        .with_effect(Effect::UpdateShipment { id, patch })
        .with_effect(Effect::set_token(user.id, Some(SessionToken::ship(next, id))))
        .with_effect(reply)
}

/// Airline quick-pick button; behaves as if the name was typed
pub fn pick_airline(ctx: &Context, user: &User, code: &str) -> TransitionResult {
    let name = airline_name(code);
    match user.state {
        Some(SessionToken::Ship {
            step: WizardStep::Airline,
            shipment,
        }) => text_input(ctx, user, WizardStep::Airline, shipment, name),
        Some(SessionToken::EditInput {
            field: Field::Airline,
            shipment,
        }) => edit::input(ctx, user, Field::Airline, shipment, name),
        _ => TransitionResult::toast("This step has already passed."),
    }
}

pub fn back_step(user: &User) -> TransitionResult {
    let Some(SessionToken::Ship { step, shipment }) = user.state else {
        return TransitionResult::toast("Nothing to go back to.");
    };
    let Some(previous) = step.previous() else {
        return TransitionResult::toast("Already at the first step.");
    };
    let (prompt, markup) = prompt(previous);
    TransitionResult::new()
        .with_effect(Effect::set_token(
            user.id,
            Some(SessionToken::ship(previous, shipment)),
        ))
        .with_effect(Effect::EditSource {
            text: prompt.to_string(),
            markup: Some(markup),
        })
}

/// Abandon the current flow. A draft shipment is left as it is.
pub fn cancel(user: &User) -> TransitionResult {
    TransitionResult::new()
        .with_effect(Effect::set_token(user.id, None))
        .with_effect(Effect::edit_source("❌ Action cancelled."))
        .with_effect(Effect::reply_with(
            "Back at the main menu.",
            Markup::Dashboard(user.role),
        ))
}

/// Shipment bound to the actor's review-step or edit token
fn reviewing(ctx: &Context, user: &User) -> Option<ShipmentId> {
    match user.state {
        Some(SessionToken::Ship {
            step: WizardStep::Review,
            shipment,
        }
        | SessionToken::EditInput { shipment, .. }) => ctx
            .owned_shipment(shipment, user.id)
            .map(|s| s.id),
        _ => None,
    }
}

/// Submit for rate approval
pub fn confirm(ctx: &Context, user: &User) -> TransitionResult {
    let Some(SessionToken::Ship {
        step: WizardStep::Review,
        shipment: id,
    }) = user.state
    else {
        return TransitionResult::toast("Nothing to submit.");
    };
    let Some(shipment) = ctx.owned_shipment(id, user.id) else {
        return TransitionResult::stale(user.id);
    };
    if shipment.status != ShipmentStatus::QuotationCreated {
        return TransitionResult::new()
            .with_effect(Effect::set_token(user.id, None))
            .with_effect(Effect::Toast("This shipment was already submitted.".to_string()));
    }

    let mut submitted = shipment.clone();
    submitted.status = ShipmentStatus::PendingRateApproval;

    TransitionResult::new()
        .with_effect(Effect::SetStatus {
            shipment: id,
            status: ShipmentStatus::PendingRateApproval,
            payment: None,
        })
        .with_effect(Effect::set_token(user.id, None))
        .with_effect(Effect::edit_source("🚀 Shipment Submitted for Rate Review."))
        .with_effect(Effect::Send(
            Outgoing::new(
                Recipient::StaffChannel,
                render::rate_request(&submitted, user),
            )
            .markup(keyboard::rate_approval(id))
            .tracked(id),
        ))
}

pub fn open_edit_menu(ctx: &Context, user: &User) -> TransitionResult {
    let Some(id) = reviewing(ctx, user) else {
        return TransitionResult::toast("Nothing to edit.");
    };
    if !ctx.shipment_for(id).is_some_and(|s| s.status.is_editable()) {
        return TransitionResult::toast("This shipment can no longer be edited.");
    }
    TransitionResult::new().with_effect(Effect::EditSource {
        text: "📝 Select field to edit:".to_string(),
        markup: Some(keyboard::edit_menu()),
    })
}

pub fn edit_field(ctx: &Context, user: &User, field: Field) -> TransitionResult {
    let Some(id) = reviewing(ctx, user) else {
        return TransitionResult::toast("Nothing to edit.");
    };
    if !ctx.shipment_for(id).is_some_and(|s| s.status.is_editable()) {
        return TransitionResult::toast("This shipment can no longer be edited.");
    }
    let markup = if field == Field::Airline {
        keyboard::airline_picker()
    } else {
        keyboard::back_to_summary()
    };
    TransitionResult::new()
        .with_effect(Effect::set_token(
            user.id,
            Some(SessionToken::EditInput {
                field,
                shipment: id,
            }),
        ))
        .with_effect(Effect::EditSource {
            text: field.prompt().to_string(),
            markup: Some(markup),
        })
}

pub fn back_to_summary(ctx: &Context, user: &User) -> TransitionResult {
    let Some(id) = reviewing(ctx, user) else {
        return TransitionResult::toast("Nothing to show.");
    };
    let Some(shipment) = ctx.shipment_for(id) else {
        return TransitionResult::stale(user.id);
    };
    TransitionResult::new()
        .with_effect(Effect::set_token(user.id, Some(SessionToken::review(id))))
        .with_effect(Effect::EditSource {
            text: render::summary(shipment),
            markup: Some(keyboard::confirmation()),
        })
}

/// Re-open a tracked shipment on the review screen
pub fn edit_existing(ctx: &Context, user: &User, id: ShipmentId) -> TransitionResult {
    let Some(shipment) = ctx.owned_shipment(id, user.id) else {
        return TransitionResult::stale(user.id);
    };
    if !shipment.status.is_editable() {
        return TransitionResult::new()
            .with_effect(Effect::reply("🔒 This shipment can no longer be edited."));
    }
    TransitionResult::new()
        .with_effect(Effect::set_token(user.id, Some(SessionToken::review(id))))
        .with_effect(Effect::reply_with(
            format!("Editing Shipment Mode:\n\n{}", render::summary(shipment)),
            keyboard::confirmation(),
        ))
}
