//! Pure transition function
//!
//! Given the loaded records and one routed event, produce the effects that
//! move the workflow forward. No I/O happens here; the runtime loads the
//! [`Context`] before and executes the effects after.

use super::action::Action;
use super::dispatch::{DashboardCommand, Handler, Route};
use super::effect::{Effect, Recipient, View};
use super::event::Inbound;
use super::render;
use super::token::SessionToken;
use super::{approval, edit, navigation, registration, wizard};
use crate::db::{Role, Shipment, ShipmentId, User, UserId};
use thiserror::Error;

/// Records loaded for one event
#[derive(Debug, Clone)]
pub struct Context {
    /// The actor's profile; `None` only on first contact
    pub user: Option<User>,
    /// Shipment named by the payload or the actor's token
    pub shipment: Option<Shipment>,
    /// Profile named by a user-management payload
    pub subject: Option<User>,
    /// Proofs collected so far for the targeted shipment
    pub pending_proofs: usize,
    /// Current exchange rate setting
    pub exchange_rate: f64,
    /// Id to use if this event opens a new draft
    pub fresh_shipment_id: ShipmentId,
    /// Actor is on the configured admin allow-list
    pub allow_listed: bool,
}

impl Context {
    pub fn new(user: Option<User>) -> Self {
        Self {
            user,
            shipment: None,
            subject: None,
            pending_proofs: 0,
            exchange_rate: 1.0,
            fresh_shipment_id: ShipmentId::new(),
            allow_listed: false,
        }
    }

    /// The loaded shipment if it is the one `id` names
    pub fn shipment_for(&self, id: ShipmentId) -> Option<&Shipment> {
        self.shipment.as_ref().filter(|s| s.id == id)
    }

    /// The loaded shipment if `owner` owns it
    pub fn owned_shipment(&self, id: ShipmentId, owner: UserId) -> Option<&Shipment> {
        self.shipment_for(id).filter(|s| s.owner_id == owner)
    }
}

/// Result of a state transition
#[derive(Debug, Default, PartialEq)]
pub struct TransitionResult {
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    #[must_use]
    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }

    /// Only acknowledge the pressed button
    pub fn toast(text: impl Into<String>) -> Self {
        Self::new().with_effect(Effect::Toast(text.into()))
    }

    /// The token or payload named a record that is gone
    pub fn stale(actor: UserId) -> Self {
        Self::new()
            .with_effect(Effect::set_token(actor, None))
            .with_effect(Effect::reply(render::NO_LONGER_AVAILABLE))
    }

    pub fn mutations(&self) -> impl Iterator<Item = &Effect> {
        self.effects.iter().filter(|e| e.is_mutation())
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    /// Role check failed; dropped without a reply
    #[error("{actor} may not {attempted}")]
    Unauthorized { actor: UserId, attempted: String },
    #[error("Unexpected event: {0}")]
    Unexpected(String),
}

impl TransitionError {
    pub fn unauthorized(actor: UserId, attempted: impl ToString) -> Self {
        TransitionError::Unauthorized {
            actor,
            attempted: attempted.to_string(),
        }
    }
}

/// Pure transition function
pub fn transition(
    ctx: &Context,
    route: &Route,
    event: &Inbound,
) -> Result<TransitionResult, TransitionError> {
    let user = match (route, ctx.user.as_ref()) {
        (Route::Welcome, _) => return Ok(registration::welcome(ctx, event)),
        (Route::Ignored | Route::Idle, _) => return Ok(TransitionResult::new()),
        (Route::UnknownButton, _) => return Ok(TransitionResult::toast("This button has expired.")),
        (_, Some(user)) => user,
        (_, None) => {
            return Err(TransitionError::Unexpected(format!(
                "route {} without a profile",
                route.name()
            )))
        }
    };

    match route {
        Route::NotApprovedYet => {
            Ok(TransitionResult::new().with_effect(Effect::reply(render::NOT_APPROVED_YET)))
        }

        Route::Dashboard(command) => dashboard(ctx, user, *command),

        Route::Token(handler) => token_input(ctx, user, *handler, event),

        Route::Button(action) => {
            if !action.access().allows(user.role) {
                return Err(TransitionError::unauthorized(user.id, action));
            }
            Ok(button(ctx, user, action, event))
        }

        Route::Welcome | Route::Ignored | Route::Idle | Route::UnknownButton => {
            Ok(TransitionResult::new())
        }
    }
}

fn dashboard(
    ctx: &Context,
    user: &User,
    command: DashboardCommand,
) -> Result<TransitionResult, TransitionError> {
    let required = match command {
        DashboardCommand::StaffPanel => Some(Role::Staff),
        DashboardCommand::AdminSettings => Some(Role::Admin),
        _ => None,
    };
    if let Some(required) = required {
        let allowed = match required {
            Role::Admin => user.role.is_admin(),
            _ => user.role.is_staff(),
        };
        if !allowed {
            return Err(TransitionError::unauthorized(user.id, command.label()));
        }
    }

    // Dashboard commands abandon whatever flow was in progress
    let clear = user
        .state
        .as_ref()
        .map(|_| Effect::set_token(user.id, None));

    let result = match command {
        DashboardCommand::Start | DashboardCommand::BackToMenu => {
            return Ok(registration::start(user));
        }
        DashboardCommand::NewShipment => return Ok(wizard::start(ctx, user)),
        DashboardCommand::TrackShipments => navigation::tracking(user),
        DashboardCommand::Profile => navigation::profile(user),
        DashboardCommand::StaffPanel => TransitionResult::new().with_effect(Effect::Render {
            view: View::StaffPanel,
            to: Recipient::Origin,
        }),
        DashboardCommand::AdminSettings => TransitionResult::new().with_effect(Effect::Render {
            view: View::AdminPanel,
            to: Recipient::Origin,
        }),
    };
    Ok(TransitionResult::new().with_effects(clear).with_effects(result.effects))
}

fn token_input(
    ctx: &Context,
    user: &User,
    handler: Handler,
    event: &Inbound,
) -> Result<TransitionResult, TransitionError> {
    let Some(token) = user.state.as_ref() else {
        return Ok(TransitionResult::new());
    };
    let text = event.text().unwrap_or_default();

    match (handler, token) {
        (Handler::Registration, _) => Ok(registration::input(user, text)),
        (Handler::WizardText, SessionToken::Ship { step, shipment }) => {
            Ok(wizard::text_input(ctx, user, *step, *shipment, text))
        }
        (Handler::EditText, SessionToken::EditInput { field, shipment }) => {
            Ok(edit::input(ctx, user, *field, *shipment, text))
        }
        (Handler::ProofIntake, SessionToken::Upload { shipment, .. }) => {
            Ok(approval::proof_intake(ctx, user, *shipment, event))
        }
        (Handler::AdminText, _) => approval::admin_text(ctx, user, token, text),
        (Handler::ExpectText, _) => Ok(TransitionResult::new()
            .with_effect(Effect::reply("⚠️ Please reply with text."))),
        (handler, token) => Err(TransitionError::Unexpected(format!(
            "handler {handler:?} does not accept token {token}"
        ))),
    }
}

fn button(ctx: &Context, user: &User, action: &Action, event: &Inbound) -> TransitionResult {
    match action {
        Action::BackToMain => registration::start(user),
        Action::TrackShipments => navigation::tracking(user),
        Action::ViewProfile => navigation::profile(user),
        Action::NewShipment => wizard::start(ctx, user),
        Action::StaffPanel => TransitionResult::new().with_effect(Effect::Render {
            view: View::StaffPanel,
            to: Recipient::Origin,
        }),
        Action::StartUpload(id) => navigation::start_upload(ctx, user, *id),

        Action::PickAirline(code) => wizard::pick_airline(ctx, user, code),
        Action::ConfirmShipment => wizard::confirm(ctx, user),
        Action::OpenEditMenu => wizard::open_edit_menu(ctx, user),
        Action::EditField(field) => wizard::edit_field(ctx, user, *field),
        Action::BackToSummary => wizard::back_to_summary(ctx, user),
        Action::EditExisting(id) => wizard::edit_existing(ctx, user, *id),
        Action::BackStep => wizard::back_step(user),
        Action::CancelWizard => wizard::cancel(user),

        Action::ApproveRate(id) => approval::approve_rate(ctx, user, *id, event),
        Action::RejectRate(id) => approval::reject_rate(ctx, user, *id),
        Action::ApprovePayment(id) => approval::approve_payment(ctx, user, *id, event),
        Action::RejectPayment(id) => approval::reject_payment(ctx, user, *id),
        Action::ApproveUser { user: target, role } => {
            approval::approve_user(ctx, *target, *role)
        }
        Action::BlockUser(target) => approval::block_user(ctx, *target),
        Action::AdvanceStatus { status, shipment } => {
            approval::advance_status(ctx, user, *status, *shipment, event)
        }
        Action::AdminSettings => TransitionResult::new().with_effect(Effect::Render {
            view: View::AdminPanel,
            to: Recipient::Origin,
        }),
        Action::SetExchangeRate => approval::begin_exchange_rate(user),
        Action::ManageUsers => TransitionResult::new().with_effect(Effect::Render {
            view: View::PendingUsers,
            to: Recipient::Origin,
        }),
        Action::Broadcast => approval::begin_broadcast(user),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::{NewShipment, ShipmentStatus};
    use crate::workflow::event::{Actor, ButtonPress, FileRef, InboundKind, SourceMessage};
    use chrono::Utc;

    pub(crate) fn user(id: UserId, role: Role, state: Option<SessionToken>) -> User {
        User {
            id,
            username: Some(format!("u{id}")),
            full_name: Some(format!("User {id}")),
            company_name: Some("Acme".to_string()),
            role,
            is_approved: true,
            state,
            created_at: Utc::now(),
        }
    }

    pub(crate) fn shipment(owner: UserId, status: ShipmentStatus) -> Shipment {
        let mut s = Shipment::draft(
            &NewShipment {
                id: ShipmentId::new(),
                owner_id: owner,
                exchange_rate: 56.5,
            },
            Utc::now(),
        );
        s.status = status;
        s.awb_number = Some("071-0001".to_string());
        s
    }

    pub(crate) fn text_event(actor: UserId, text: &str) -> Inbound {
        Inbound {
            event_id: None,
            actor: Actor {
                id: actor,
                username: None,
            },
            chat_id: actor,
            kind: InboundKind::Text {
                text: text.to_string(),
            },
        }
    }

    pub(crate) fn button_event(actor: UserId, action: &Action) -> Inbound {
        Inbound {
            kind: InboundKind::Button(ButtonPress {
                callback_id: "cb".to_string(),
                payload: action.to_string(),
                source: Some(SourceMessage {
                    chat_id: -100,
                    message_id: 10,
                    text: "card".to_string(),
                }),
            }),
            ..text_event(actor, "")
        }
    }

    pub(crate) fn file_event(actor: UserId) -> Inbound {
        Inbound {
            kind: InboundKind::File(FileRef {
                file_id: "file-1".to_string(),
                kind: crate::db::ProofKind::Photo,
                mime_type: None,
            }),
            ..text_event(actor, "")
        }
    }

    pub(crate) fn ctx(user: User, shipment: Option<Shipment>) -> Context {
        Context {
            shipment,
            ..Context::new(Some(user))
        }
    }

    pub(crate) fn run(ctx: &Context, event: &Inbound) -> Result<TransitionResult, TransitionError> {
        let route = crate::workflow::dispatch::route(ctx.user.as_ref(), event);
        transition(ctx, &route, event)
    }

    pub(crate) fn token_after(
        result: &TransitionResult,
        user: UserId,
    ) -> Option<Option<SessionToken>> {
        result.effects.iter().rev().find_map(|e| match e {
            Effect::UpdateUser { id, patch } if *id == user => patch.state.clone(),
            _ => None,
        })
    }

    pub(crate) fn status_after(result: &TransitionResult) -> Option<ShipmentStatus> {
        result.effects.iter().rev().find_map(|e| match e {
            Effect::SetStatus { status, .. } => Some(*status),
            Effect::UpdateShipment { patch, .. } => patch.status,
            _ => None,
        })
    }

    pub(crate) fn replies(result: &TransitionResult) -> Vec<&str> {
        result
            .effects
            .iter()
            .filter_map(|e| match e {
                Effect::Send(out) => Some(out.text.as_str()),
                Effect::EditSource { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_non_staff_cannot_approve() {
        let owner = user(1, Role::User, None);
        let s = shipment(1, ShipmentStatus::PendingRateApproval);
        let c = ctx(owner, Some(s.clone()));
        let err = run(&c, &button_event(1, &Action::ApproveRate(s.id))).unwrap_err();
        assert!(matches!(err, TransitionError::Unauthorized { actor: 1, .. }));
    }

    #[test]
    fn test_staff_cannot_open_admin_settings() {
        let staff = user(2, Role::Staff, None);
        let c = ctx(staff, None);
        let err = run(&c, &text_event(2, "👑 Admin Settings")).unwrap_err();
        assert!(matches!(err, TransitionError::Unauthorized { .. }));
    }

    #[test]
    fn test_dashboard_clears_in_flight_token() {
        let s = shipment(1, ShipmentStatus::QuotationCreated);
        let u = user(1, Role::User, Some(SessionToken::review(s.id)));
        let c = ctx(u, Some(s));
        let result = run(&c, &text_event(1, "👤 My Profile")).unwrap();
        assert_eq!(token_after(&result, 1), Some(None));
        assert!(replies(&result)[0].starts_with("👤 USER PROFILE"));
    }

    #[test]
    fn test_unknown_button_only_toasts() {
        let c = ctx(user(1, Role::User, None), None);
        let result = run(&c, &button_event(1, &Action::BackToMain)).unwrap();
        assert!(!result.effects.is_empty());

        let mut bogus = button_event(1, &Action::BackToMain);
        if let InboundKind::Button(press) = &mut bogus.kind {
            press.payload = "expired_thing".to_string();
        }
        let result = run(&c, &bogus).unwrap();
        assert_eq!(
            result.effects,
            vec![Effect::Toast("This button has expired.".to_string())]
        );
    }
}
