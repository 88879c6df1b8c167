//! Button layouts

use super::action::{Action, AIRLINES};
use super::dispatch::DashboardCommand;
use super::field::Field;
use crate::db::{Role, Shipment, ShipmentId, ShipmentStatus, UserId};

/// One inline button
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub action: Action,
}

impl Button {
    pub fn new(label: impl Into<String>, action: Action) -> Self {
        Self {
            label: label.into(),
            action,
        }
    }
}

/// Buttons attached to an outbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Markup {
    /// Buttons under the message, rows top to bottom
    Inline(Vec<Vec<Button>>),
    /// Persistent reply keyboard with the dashboard labels for a role
    Dashboard(Role),
}

impl Markup {
    fn rows(rows: Vec<Vec<Button>>) -> Self {
        Markup::Inline(rows)
    }

    /// Label rows of the persistent dashboard
    pub fn dashboard_rows(role: Role) -> Vec<Vec<&'static str>> {
        let mut rows = vec![
            vec![DashboardCommand::NewShipment.label()],
            vec![
                DashboardCommand::TrackShipments.label(),
                DashboardCommand::Profile.label(),
            ],
        ];
        if role.is_admin() {
            rows.push(vec![
                DashboardCommand::StaffPanel.label(),
                DashboardCommand::AdminSettings.label(),
            ]);
        } else if role.is_staff() {
            rows.push(vec![DashboardCommand::StaffPanel.label()]);
        }
        rows.push(vec![DashboardCommand::BackToMenu.label()]);
        rows
    }
}

pub fn back_to_main() -> Markup {
    Markup::rows(vec![vec![Button::new(
        "⬅️ Back to Main Menu",
        Action::BackToMain,
    )]])
}

/// Navigation under every wizard prompt
pub fn cancel_back() -> Markup {
    Markup::rows(vec![vec![
        Button::new("⬅️ Back", Action::BackStep),
        Button::new("❌ Cancel", Action::CancelWizard),
    ]])
}

pub fn back_to_summary() -> Markup {
    Markup::rows(vec![vec![Button::new(
        "⬅️ Back to Summary",
        Action::BackToSummary,
    )]])
}

/// Quick-pick airlines for the first wizard step
pub fn airline_picker() -> Markup {
    let mut rows: Vec<Vec<Button>> = AIRLINES
        .iter()
        .map(|(code, name)| vec![Button::new(*name, Action::PickAirline((*code).to_string()))])
        .collect();
    rows.push(vec![Button::new("❌ Cancel", Action::CancelWizard)]);
    Markup::rows(rows)
}

/// Review screen
pub fn confirmation() -> Markup {
    Markup::rows(vec![
        vec![Button::new(
            "✅ Confirm and Submit for Review",
            Action::ConfirmShipment,
        )],
        vec![Button::new("📝 Edit Details", Action::OpenEditMenu)],
        vec![Button::new("❌ Cancel", Action::CancelWizard)],
    ])
}

pub fn edit_menu() -> Markup {
    let mut rows: Vec<Vec<Button>> = Field::ALL
        .chunks(2)
        .map(|pair| {
            pair.iter()
                .map(|f| Button::new(f.label(), Action::EditField(*f)))
                .collect()
        })
        .collect();
    rows.push(vec![Button::new(
        "⬅️ Back to Summary",
        Action::BackToSummary,
    )]);
    Markup::rows(rows)
}

/// Phase 1 decision buttons for staff
pub fn rate_approval(shipment: ShipmentId) -> Markup {
    Markup::rows(vec![
        vec![Button::new("✅ Approve Rate", Action::ApproveRate(shipment))],
        vec![Button::new(
            "❌ Reject Shipment",
            Action::RejectRate(shipment),
        )],
    ])
}

pub fn upload_proof(shipment: ShipmentId) -> Markup {
    Markup::rows(vec![vec![Button::new(
        "💳 Upload Payment Proof",
        Action::StartUpload(shipment),
    )]])
}

/// Phase 2 decision buttons for staff
pub fn payment_decision(shipment: ShipmentId) -> Markup {
    Markup::rows(vec![
        vec![Button::new(
            "💰 Approve Payment",
            Action::ApprovePayment(shipment),
        )],
        vec![Button::new(
            "🚫 Reject Payment Proof",
            Action::RejectPayment(shipment),
        )],
    ])
}

pub fn admin_settings() -> Markup {
    Markup::rows(vec![
        vec![Button::new(
            "📈 Change Exchange Rate",
            Action::SetExchangeRate,
        )],
        vec![Button::new("👥 Manage Pending Users", Action::ManageUsers)],
        vec![Button::new("📣 Broadcast", Action::Broadcast)],
        vec![Button::new("⬅️ Back to Main", Action::BackToMain)],
    ])
}

pub fn user_approval(user: UserId) -> Markup {
    Markup::rows(vec![
        vec![
            Button::new(
                "✅ Approve User",
                Action::ApproveUser {
                    user,
                    role: Role::User,
                },
            ),
            Button::new(
                "👔 Approve Staff",
                Action::ApproveUser {
                    user,
                    role: Role::Staff,
                },
            ),
        ],
        vec![Button::new("🚫 Block", Action::BlockUser(user))],
    ])
}

/// Owner actions on a tracking card, if any apply
pub fn shipment_actions(shipment: &Shipment) -> Option<Markup> {
    let mut row = Vec::new();
    if shipment.status.is_editable() {
        row.push(Button::new("📝 Edit", Action::EditExisting(shipment.id)));
    }
    if shipment.status == ShipmentStatus::RateApproved {
        row.push(Button::new(
            "💳 Upload Proof",
            Action::StartUpload(shipment.id),
        ));
    }
    (!row.is_empty()).then(|| Markup::rows(vec![row]))
}

/// Lifecycle button on a staff-panel card, if the shipment can advance
pub fn staff_actions(shipment: &Shipment) -> Option<Markup> {
    let next = shipment.status.next_lifecycle()?;
    let label = match next {
        ShipmentStatus::Uplifted => "🛫 Mark Uplifted",
        _ => "🏁 Mark Completed",
    };
    Some(Markup::rows(vec![vec![Button::new(
        label,
        Action::AdvanceStatus {
            status: next,
            shipment: shipment.id,
        },
    )]]))
}
