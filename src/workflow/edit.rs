//! Edit engine: change one field of an existing shipment
//!
//! Any accepted edit on a shipment that has left `quotation_created` sends
//! it back there, so a staff-approved rate never drifts after sign-off.

use super::effect::Effect;
use super::field::{apply_input, Field};
use super::keyboard;
use super::render;
use super::token::SessionToken;
use super::transition::{Context, TransitionResult};
use crate::db::{ShipmentId, ShipmentStatus, User};

/// Text typed while the token is `EDIT_INPUT_<field>_<id>`
pub fn input(
    ctx: &Context,
    user: &User,
    field: Field,
    id: ShipmentId,
    text: &str,
) -> TransitionResult {
    let Some(shipment) = ctx.owned_shipment(id, user.id) else {
        return TransitionResult::stale(user.id);
    };
    if !shipment.status.is_editable() {
        return TransitionResult::new()
            .with_effect(Effect::set_token(user.id, None))
            .with_effect(Effect::reply("🔒 This shipment can no longer be edited."));
    }

    let mut patch = match apply_input(field, text, shipment) {
        Ok(patch) => patch,
        Err(e) => {
            return TransitionResult::new().with_effect(Effect::reply_with(
                format!("{e}\n{}", field.prompt()),
                keyboard::back_to_summary(),
            ));
        }
    };

    let reset = shipment.status != ShipmentStatus::QuotationCreated;
    if reset {
        patch.status = Some(ShipmentStatus::QuotationCreated);
    }
    let updated = shipment.patched(&patch);
    let headline = if reset {
        "✅ Field updated. Shipment reset for re-approval."
    } else {
        "✅ Field updated."
    };

    TransitionResult::new()
        .with_effect(Effect::UpdateShipment { id, patch })
        .with_effect(Effect::set_token(user.id, Some(SessionToken::review(id))))
        .with_effect(Effect::reply_with(
            format!("{headline}\n\n{}", render::summary(&updated)),
            keyboard::confirmation(),
        ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Role;
    use crate::workflow::transition::tests::{
        ctx, run, shipment, status_after, text_event, token_after, user,
    };

    fn editing(status: ShipmentStatus, field: Field) -> (Context, ShipmentId) {
        let s = shipment(1, status);
        let id = s.id;
        let u = user(1, Role::User, Some(SessionToken::EditInput { field, shipment: id }));
        (ctx(u, Some(s)), id)
    }

    #[test]
    fn test_edit_after_approval_resets_status() {
        let (c, id) = editing(ShipmentStatus::RateApproved, Field::Awb);
        let result = run(&c, &text_event(1, "071-9999")).unwrap();
        assert_eq!(status_after(&result), Some(ShipmentStatus::QuotationCreated));
        assert_eq!(token_after(&result, 1), Some(Some(SessionToken::review(id))));
    }

    #[test]
    fn test_edit_on_draft_keeps_status() {
        let (c, _) = editing(ShipmentStatus::QuotationCreated, Field::Awb);
        let result = run(&c, &text_event(1, "071-9999")).unwrap();
        assert_eq!(status_after(&result), None);
    }

    #[test]
    fn test_edit_locked_after_payment() {
        let (c, _) = editing(ShipmentStatus::PaymentReceived, Field::Awb);
        let result = run(&c, &text_event(1, "071-9999")).unwrap();
        assert_eq!(status_after(&result), None);
        assert_eq!(token_after(&result, 1), Some(None));
    }

    #[test]
    fn test_invalid_edit_keeps_token() {
        let (c, _) = editing(ShipmentStatus::RateApproved, Field::Dimensions);
        let result = run(&c, &text_event(1, "big")).unwrap();
        assert_eq!(token_after(&result, 1), None);
        assert!(result.mutations().next().is_none());
    }
}
