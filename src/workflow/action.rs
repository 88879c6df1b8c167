//! Button payload grammar
//!
//! Inline buttons carry an opaque string payload. Buttons are dispatched by
//! payload, never by the presser's stored token, so every payload that
//! needs an entity carries its id.

use super::field::Field;
use crate::db::{Role, ShipmentId, ShipmentStatus, UserId};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unrecognized button payload: {0}")]
pub struct ParseActionError(pub String);

/// Airlines offered as quick-pick buttons on the first wizard step
pub const AIRLINES: [(&str, &str); 4] = [
    ("ET", "ET (Ethiopian)"),
    ("TK", "TK (Turkish)"),
    ("EK", "EK (Emirates)"),
    ("QR", "QR (Qatar)"),
];

/// Display name stored for a quick-pick airline code
pub fn airline_name(code: &str) -> &str {
    AIRLINES
        .iter()
        .find(|(c, _)| *c == code)
        .map_or(code, |(_, name)| name)
}

/// Parsed button payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    // Universal navigation
    BackToMain,
    TrackShipments,
    ViewProfile,
    NewShipment,
    StaffPanel,
    StartUpload(ShipmentId),

    // Wizard and edit engine
    PickAirline(String),
    ConfirmShipment,
    OpenEditMenu,
    EditField(Field),
    BackToSummary,
    EditExisting(ShipmentId),
    BackStep,
    CancelWizard,

    // Approval workflow
    ApproveRate(ShipmentId),
    RejectRate(ShipmentId),
    ApprovePayment(ShipmentId),
    RejectPayment(ShipmentId),
    ApproveUser { user: UserId, role: Role },
    BlockUser(UserId),
    AdvanceStatus {
        status: ShipmentStatus,
        shipment: ShipmentId,
    },
    AdminSettings,
    SetExchangeRate,
    ManageUsers,
    Broadcast,
}

/// Which workflow owns a payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionFamily {
    Navigation,
    Shipment,
    Approval,
}

/// Who may press a button
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Access {
    Anyone,
    Staff,
    Admin,
}

impl Access {
    pub fn allows(self, role: Role) -> bool {
        match self {
            Access::Anyone => true,
            Access::Staff => role.is_staff(),
            Access::Admin => role.is_admin(),
        }
    }
}

impl Action {
    pub fn family(&self) -> ActionFamily {
        match self {
            Action::BackToMain
            | Action::TrackShipments
            | Action::ViewProfile
            | Action::NewShipment
            | Action::StaffPanel
            | Action::StartUpload(_) => ActionFamily::Navigation,
            Action::PickAirline(_)
            | Action::ConfirmShipment
            | Action::OpenEditMenu
            | Action::EditField(_)
            | Action::BackToSummary
            | Action::EditExisting(_)
            | Action::BackStep
            | Action::CancelWizard => ActionFamily::Shipment,
            Action::ApproveRate(_)
            | Action::RejectRate(_)
            | Action::ApprovePayment(_)
            | Action::RejectPayment(_)
            | Action::ApproveUser { .. }
            | Action::BlockUser(_)
            | Action::AdvanceStatus { .. }
            | Action::AdminSettings
            | Action::SetExchangeRate
            | Action::ManageUsers
            | Action::Broadcast => ActionFamily::Approval,
        }
    }

    /// Minimum role checked before the owning handler runs
    pub fn access(&self) -> Access {
        match self {
            Action::ApproveUser {
                role: Role::Staff | Role::Admin,
                ..
            }
            | Action::AdminSettings
            | Action::SetExchangeRate
            | Action::Broadcast => Access::Admin,
            Action::StaffPanel
            | Action::ApproveRate(_)
            | Action::RejectRate(_)
            | Action::ApprovePayment(_)
            | Action::RejectPayment(_)
            | Action::ApproveUser { .. }
            | Action::BlockUser(_)
            | Action::AdvanceStatus { .. }
            | Action::ManageUsers => Access::Staff,
            _ => Access::Anyone,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::BackToMain => f.write_str("back_to_main"),
            Action::TrackShipments => f.write_str("track_shipment"),
            Action::ViewProfile => f.write_str("view_profile"),
            Action::NewShipment => f.write_str("new_shipment"),
            Action::StaffPanel => f.write_str("staff_panel"),
            Action::StartUpload(id) => write!(f, "start_upload_{id}"),
            Action::PickAirline(code) => write!(f, "air_{code}"),
            Action::ConfirmShipment => f.write_str("confirm_shipment"),
            Action::OpenEditMenu => f.write_str("open_edit_menu"),
            Action::EditField(field) => write!(f, "edit_field_{}", field.code()),
            Action::BackToSummary => f.write_str("back_to_summary"),
            Action::EditExisting(id) => write!(f, "edit_hist_{id}"),
            Action::BackStep => f.write_str("back_step"),
            Action::CancelWizard => f.write_str("cancel_wizard"),
            Action::ApproveRate(id) => write!(f, "rate_apprv_{id}"),
            Action::RejectRate(id) => write!(f, "rate_rejct_{id}"),
            Action::ApprovePayment(id) => write!(f, "pay_apprv_{id}"),
            Action::RejectPayment(id) => write!(f, "pay_rejct_{id}"),
            Action::ApproveUser { user, role } => write!(f, "usr_apprv_{user}_{role}"),
            Action::BlockUser(user) => write!(f, "usr_block_{user}"),
            Action::AdvanceStatus { status, shipment } => write!(f, "st_upd_{status}_{shipment}"),
            Action::AdminSettings => f.write_str("admin_settings"),
            Action::SetExchangeRate => f.write_str("set_ex_rate"),
            Action::ManageUsers => f.write_str("adm_users"),
            Action::Broadcast => f.write_str("adm_broadcast"),
        }
    }
}

impl FromStr for Action {
    type Err = ParseActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseActionError(s.to_string());
        let shipment = |raw: &str| raw.parse::<ShipmentId>().map_err(|_| invalid());
        let user = |raw: &str| raw.parse::<UserId>().map_err(|_| invalid());

        let action = match s {
            "back_to_main" => Action::BackToMain,
            "track_shipment" => Action::TrackShipments,
            "view_profile" => Action::ViewProfile,
            "new_shipment" => Action::NewShipment,
            "staff_panel" => Action::StaffPanel,
            "confirm_shipment" => Action::ConfirmShipment,
            "open_edit_menu" => Action::OpenEditMenu,
            "back_to_summary" => Action::BackToSummary,
            "back_step" => Action::BackStep,
            "cancel_wizard" | "cancel_action" => Action::CancelWizard,
            "admin_settings" => Action::AdminSettings,
            "set_ex_rate" => Action::SetExchangeRate,
            "adm_users" | "manage_users" => Action::ManageUsers,
            "adm_broadcast" => Action::Broadcast,
            _ => {
                if let Some(rest) = s.strip_prefix("start_upload_") {
                    Action::StartUpload(shipment(rest)?)
                } else if let Some(code) = s.strip_prefix("air_") {
                    if code.is_empty() {
                        return Err(invalid());
                    }
                    Action::PickAirline(code.to_string())
                } else if let Some(code) = s.strip_prefix("edit_field_") {
                    Action::EditField(Field::from_code(code).ok_or_else(invalid)?)
                } else if let Some(rest) = s.strip_prefix("edit_hist_") {
                    Action::EditExisting(shipment(rest)?)
                } else if let Some(rest) = s.strip_prefix("rate_apprv_") {
                    Action::ApproveRate(shipment(rest)?)
                } else if let Some(rest) = s.strip_prefix("rate_rejct_") {
                    Action::RejectRate(shipment(rest)?)
                } else if let Some(rest) = s.strip_prefix("pay_apprv_") {
                    Action::ApprovePayment(shipment(rest)?)
                } else if let Some(rest) = s.strip_prefix("pay_rejct_") {
                    Action::RejectPayment(shipment(rest)?)
                } else if let Some(rest) = s.strip_prefix("usr_apprv_") {
                    let (id, role) = rest.split_once('_').ok_or_else(invalid)?;
                    Action::ApproveUser {
                        user: user(id)?,
                        role: role.parse().map_err(|_| invalid())?,
                    }
                } else if let Some(rest) = s.strip_prefix("usr_block_") {
                    Action::BlockUser(user(rest)?)
                } else if let Some(rest) = s.strip_prefix("st_upd_") {
                    // Status names contain '_', the id does not
                    let (status, id) = rest.rsplit_once('_').ok_or_else(invalid)?;
                    Action::AdvanceStatus {
                        status: status.parse().map_err(|_| invalid())?,
                        shipment: shipment(id)?,
                    }
                } else {
                    return Err(invalid());
                }
            }
        };
        Ok(action)
    }
}
