//! Dispatcher: picks the handler for one inbound event
//!
//! Priority, highest first:
//! 1. Unknown users are welcomed into registration.
//! 2. Dashboard labels win over any stored token.
//! 3. Buttons are routed by payload.
//! 4. Everything else is routed by the token's verb through [`handler_for`].

use super::action::Action;
use super::event::{EventKind, Inbound, InboundKind};
use super::token::{SessionToken, Verb};
use crate::db::{ShipmentId, User, UserId};

/// Fixed dashboard labels. Exact text matches only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DashboardCommand {
    Start,
    NewShipment,
    TrackShipments,
    Profile,
    StaffPanel,
    AdminSettings,
    BackToMenu,
}

impl DashboardCommand {
    pub const ALL: [DashboardCommand; 7] = [
        DashboardCommand::Start,
        DashboardCommand::NewShipment,
        DashboardCommand::TrackShipments,
        DashboardCommand::Profile,
        DashboardCommand::StaffPanel,
        DashboardCommand::AdminSettings,
        DashboardCommand::BackToMenu,
    ];

    pub fn label(self) -> &'static str {
        match self {
            DashboardCommand::Start => "/start",
            DashboardCommand::NewShipment => "📦 New Shipment",
            DashboardCommand::TrackShipments => "🔍 Track My Shipments",
            DashboardCommand::Profile => "👤 My Profile",
            DashboardCommand::StaffPanel => "🛠 Staff Panel",
            DashboardCommand::AdminSettings => "👑 Admin Settings",
            DashboardCommand::BackToMenu => "🏠 Back to Menu",
        }
    }

    pub fn from_text(text: &str) -> Option<DashboardCommand> {
        let text = text.trim();
        Self::ALL.into_iter().find(|c| c.label() == text)
    }
}

/// Handler owning a (token verb, event kind) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    Registration,
    WizardText,
    EditText,
    ProofIntake,
    AdminText,
    /// Token expects text but something else arrived
    ExpectText,
    /// Buttons never reach the token table
    ByPayload,
    Ignore,
}

/// Route table. Adding a [`Verb`] or [`EventKind`] fails to compile until
/// every pair is assigned.
pub const fn handler_for(verb: Verb, kind: EventKind) -> Handler {
    match (verb, kind) {
        (_, EventKind::Button) => Handler::ByPayload,

        (Verb::Reg, EventKind::Text) => Handler::Registration,
        (Verb::Ship, EventKind::Text) => Handler::WizardText,
        (Verb::EditInput, EventKind::Text) => Handler::EditText,
        (Verb::SetExchange | Verb::Reject | Verb::AdmBroadcast, EventKind::Text) => {
            Handler::AdminText
        }

        (Verb::Upload, EventKind::Text | EventKind::File | EventKind::Unsupported) => {
            Handler::ProofIntake
        }

        (
            Verb::Reg | Verb::Ship | Verb::EditInput | Verb::SetExchange | Verb::Reject,
            EventKind::File | EventKind::Unsupported,
        ) => Handler::ExpectText,
        (Verb::AdmBroadcast, EventKind::File | EventKind::Unsupported) => Handler::Ignore,
    }
}

/// Dispatcher decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// First contact: open registration
    Welcome,
    Dashboard(DashboardCommand),
    /// Unapproved user pressed a dashboard label
    NotApprovedYet,
    Token(Handler),
    Button(Action),
    /// Button payload outside the grammar
    UnknownButton,
    /// Idle user sent something nothing is waiting for
    Idle,
    Ignored,
}

impl Route {
    /// Shipment the handler needs loaded, taken from the payload or the token
    pub fn target_shipment(&self, token: Option<&SessionToken>) -> Option<ShipmentId> {
        match self {
            Route::Button(action) => match action {
                Action::StartUpload(id)
                | Action::EditExisting(id)
                | Action::ApproveRate(id)
                | Action::RejectRate(id)
                | Action::ApprovePayment(id)
                | Action::RejectPayment(id)
                | Action::AdvanceStatus { shipment: id, .. } => Some(*id),
                Action::PickAirline(_)
                | Action::ConfirmShipment
                | Action::OpenEditMenu
                | Action::EditField(_)
                | Action::BackToSummary
                | Action::BackStep => token.and_then(SessionToken::shipment_id),
                _ => None,
            },
            Route::Token(_) => token.and_then(SessionToken::shipment_id),
            _ => None,
        }
    }

    /// Profile other than the actor's that the handler needs loaded
    pub fn target_user(&self) -> Option<UserId> {
        match self {
            Route::Button(Action::ApproveUser { user, .. } | Action::BlockUser(user)) => {
                Some(*user)
            }
            _ => None,
        }
    }

    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Route::Welcome => "welcome",
            Route::Dashboard(_) => "dashboard",
            Route::NotApprovedYet => "not_approved",
            Route::Token(Handler::Registration) => "registration",
            Route::Token(Handler::WizardText) => "wizard",
            Route::Token(Handler::EditText) => "edit",
            Route::Token(Handler::ProofIntake) => "proof_intake",
            Route::Token(Handler::AdminText) => "admin_text",
            Route::Token(_) => "token_other",
            Route::Button(_) => "button",
            Route::UnknownButton => "unknown_button",
            Route::Idle => "idle",
            Route::Ignored => "ignored",
        }
    }
}

/// Decide which handler runs for `event` given the actor's profile
pub fn route(user: Option<&User>, event: &Inbound) -> Route {
    match (&event.kind, user) {
        (InboundKind::Button(press), Some(user)) => match press.payload.parse::<Action>() {
            Ok(Action::BackToMain) => Route::Button(Action::BackToMain),
            Ok(_) if !user.is_approved => Route::NotApprovedYet,
            Ok(action) => Route::Button(action),
            Err(_) => Route::UnknownButton,
        },
        // Strangers pressing buttons (e.g. in the staff channel) get nothing
        (InboundKind::Button(_), None) => Route::Ignored,

        (_, None) => Route::Welcome,

        (InboundKind::Text { text }, Some(user)) => {
            if let Some(command) = DashboardCommand::from_text(text) {
                return if user.is_approved || command == DashboardCommand::Start {
                    Route::Dashboard(command)
                } else {
                    Route::NotApprovedYet
                };
            }
            by_token(user, EventKind::Text)
        }

        (InboundKind::File(_), Some(user)) => by_token(user, EventKind::File),
        (InboundKind::Unsupported, Some(user)) => by_token(user, EventKind::Unsupported),
    }
}

fn by_token(user: &User, kind: EventKind) -> Route {
    match &user.state {
        None => Route::Idle,
        Some(token) => match handler_for(token.verb(), kind) {
            Handler::Ignore | Handler::ByPayload => Route::Ignored,
            handler => Route::Token(handler),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Role, ShipmentId};
    use crate::workflow::event::{Actor, ButtonPress};
    use crate::workflow::token::WizardStep;
    use chrono::Utc;

    fn user(approved: bool, state: Option<SessionToken>) -> User {
        User {
            id: 1,
            username: None,
            full_name: Some("Abebe".to_string()),
            company_name: Some("Acme".to_string()),
            role: Role::User,
            is_approved: approved,
            state,
            created_at: Utc::now(),
        }
    }

    fn text(t: &str) -> Inbound {
        Inbound {
            event_id: None,
            actor: Actor {
                id: 1,
                username: None,
            },
            chat_id: 1,
            kind: InboundKind::Text {
                text: t.to_string(),
            },
        }
    }

    fn button(payload: &str) -> Inbound {
        Inbound {
            kind: InboundKind::Button(ButtonPress {
                callback_id: "cb".to_string(),
                payload: payload.to_string(),
                source: None,
            }),
            ..text("")
        }
    }

    #[test]
    fn test_unknown_user_is_welcomed() {
        assert_eq!(route(None, &text("hello")), Route::Welcome);
        assert_eq!(route(None, &text("/start")), Route::Welcome);
        assert_eq!(route(None, &button("back_to_main")), Route::Ignored);
    }

    #[test]
    fn test_dashboard_overrides_token() {
        let id = ShipmentId::new();
        let u = user(true, Some(SessionToken::ship(WizardStep::Dimensions, id)));
        assert_eq!(
            route(Some(&u), &text("📦 New Shipment")),
            Route::Dashboard(DashboardCommand::NewShipment)
        );
        assert_eq!(
            route(Some(&u), &text("120x80x100")),
            Route::Token(Handler::WizardText)
        );
    }

    #[test]
    fn test_unapproved_dashboard_is_refused() {
        let u = user(false, Some(SessionToken::RegCompany));
        assert_eq!(route(Some(&u), &text("👤 My Profile")), Route::NotApprovedYet);
        assert_eq!(
            route(Some(&u), &text("/start")),
            Route::Dashboard(DashboardCommand::Start)
        );
        assert_eq!(route(Some(&u), &text("Acme")), Route::Token(Handler::Registration));
    }

    #[test]
    fn test_idle_text_is_noop() {
        let u = user(true, None);
        assert_eq!(route(Some(&u), &text("anything")), Route::Idle);
    }

    #[test]
    fn test_buttons_route_by_payload() {
        let u = user(true, Some(SessionToken::RegName));
        let id = ShipmentId::new();
        assert_eq!(
            route(Some(&u), &button(&format!("rate_apprv_{id}"))),
            Route::Button(Action::ApproveRate(id))
        );
        assert_eq!(route(Some(&u), &button("bogus")), Route::UnknownButton);
    }

    #[test]
    fn test_route_table_pairs() {
        assert_eq!(handler_for(Verb::Upload, EventKind::File), Handler::ProofIntake);
        assert_eq!(handler_for(Verb::Reject, EventKind::Text), Handler::AdminText);
        assert_eq!(handler_for(Verb::Ship, EventKind::File), Handler::ExpectText);
        assert_eq!(handler_for(Verb::Reg, EventKind::Button), Handler::ByPayload);
    }

    #[test]
    fn test_target_shipment_prefers_payload() {
        let in_token = ShipmentId::new();
        let in_payload = ShipmentId::new();
        let token = SessionToken::review(in_token);

        let r = Route::Button(Action::ApproveRate(in_payload));
        assert_eq!(r.target_shipment(Some(&token)), Some(in_payload));

        let r = Route::Button(Action::ConfirmShipment);
        assert_eq!(r.target_shipment(Some(&token)), Some(in_token));

        let r = Route::Dashboard(DashboardCommand::NewShipment);
        assert_eq!(r.target_shipment(Some(&token)), None);
    }
}
