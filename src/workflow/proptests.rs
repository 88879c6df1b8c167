//! Property-based tests for the workflow core
//!
//! These tests verify key invariants hold across all possible inputs.

use super::action::Action;
use super::dispatch::route;
use super::effect::Effect;
use super::field::{apply_input, Field};
use super::metrics::{chargeable_weight, round2, volumetric_weight};
use super::token::{SessionToken, UploadSlot, WizardStep};
use super::transition::tests::{button_event, ctx, shipment, text_event, token_after, user};
use super::transition::transition;
use crate::db::{Dimensions, Role, ShipmentId, ShipmentStatus};
use proptest::prelude::*;

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_status() -> impl Strategy<Value = ShipmentStatus> {
    prop::sample::select(ShipmentStatus::ALL.to_vec())
}

fn arb_step() -> impl Strategy<Value = WizardStep> {
    prop::sample::select(WizardStep::ORDER.to_vec())
}

fn arb_field() -> impl Strategy<Value = Field> {
    prop::sample::select(Field::ALL.to_vec())
}

fn arb_dims() -> impl Strategy<Value = Dimensions> {
    (1u32..400, 1u32..400, 1u32..400).prop_map(|(l, w, h)| Dimensions {
        length: f64::from(l),
        width: f64::from(w),
        height: f64::from(h),
    })
}

fn arb_token() -> impl Strategy<Value = SessionToken> {
    let id = ShipmentId::new();
    prop_oneof![
        Just(SessionToken::RegName),
        Just(SessionToken::RegCompany),
        arb_step().prop_map(move |step| SessionToken::ship(step, id)),
        arb_field().prop_map(move |field| SessionToken::EditInput { field, shipment: id }),
        prop::sample::select(vec![UploadSlot::First, UploadSlot::Second])
            .prop_map(move |slot| SessionToken::Upload { slot, shipment: id }),
        Just(SessionToken::SetExchange),
        Just(SessionToken::RejectRate { shipment: id }),
        Just(SessionToken::RejectPayment { shipment: id }),
        Just(SessionToken::AdmBroadcast),
    ]
}

/// Buttons that move a shipment's status when pressed by staff
fn arb_staff_action(id: ShipmentId) -> impl Strategy<Value = Action> {
    prop_oneof![
        Just(Action::ApproveRate(id)),
        Just(Action::RejectRate(id)),
        Just(Action::ApprovePayment(id)),
        Just(Action::RejectPayment(id)),
        arb_status().prop_map(move |status| Action::AdvanceStatus {
            status,
            shipment: id
        }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn prop_chargeable_never_below_gross(
        gross in 1u32..5000,
        dims in arb_dims(),
        pieces in 1u32..50,
    ) {
        let gross = f64::from(gross);
        let chargeable = chargeable_weight(gross, dims, pieces);
        prop_assert!(chargeable >= round2(gross));
        prop_assert!(chargeable >= round2(volumetric_weight(dims, pieces)));
    }

    #[test]
    fn prop_first_dims_entry_keeps_manual_chargeable(
        gross in 1u32..1000,
        extra in 0u32..1000,
        dims in arb_dims(),
    ) {
        let mut s = shipment(1, ShipmentStatus::QuotationCreated);
        s.pieces = Some(1);
        s.gross_weight = Some(f64::from(gross));
        let manual = f64::from(gross + extra);
        s.chargeable_weight = Some(manual);
        s.chargeable_manual = true;

        let raw = format!("{}x{}x{}", dims.length, dims.width, dims.height);
        let patch = apply_input(Field::Dimensions, &raw, &s).unwrap();
        prop_assert_eq!(patch.chargeable_weight, None);

        // A second entry always recomputes
        let entered = s.patched(&patch);
        let patch = apply_input(Field::Dimensions, &raw, &entered).unwrap();
        prop_assert_eq!(patch.chargeable_manual, Some(false));
        prop_assert_eq!(
            patch.chargeable_weight,
            Some(Some(chargeable_weight(f64::from(gross), dims, 1)))
        );
    }

    #[test]
    fn prop_regular_users_never_change_status(
        (s, action) in arb_status().prop_flat_map(|status| {
            let s = shipment(1, status);
            let id = s.id;
            (Just(s), arb_staff_action(id))
        })
    ) {
        let c = ctx(user(1, Role::User, None), Some(s));
        let event = button_event(1, &action);
        let route = route(c.user.as_ref(), &event);
        if let Ok(result) = transition(&c, &route, &event) {
            let changed = result.effects.iter().any(|e| {
                matches!(e, Effect::SetStatus { .. } | Effect::UpdateShipment { .. })
            });
            prop_assert!(!changed);
        }
    }

    #[test]
    fn prop_new_shipment_always_starts_at_first_step(token in proptest::option::of(arb_token())) {
        let c = ctx(user(1, Role::User, token), None);
        let result =
            super::transition::tests::run(&c, &text_event(1, "📦 New Shipment")).unwrap();
        prop_assert_eq!(
            token_after(&result, 1),
            Some(Some(SessionToken::ship(WizardStep::FIRST, c.fresh_shipment_id)))
        );
        prop_assert!(matches!(
            &result.effects[0],
            Effect::CreateShipment(new) if new.id == c.fresh_shipment_id
        ));
    }

    #[test]
    fn prop_token_text_parses_back(token in arb_token()) {
        let text = token.to_string();
        prop_assert_eq!(text.parse::<SessionToken>().ok(), Some(token));
    }
}
