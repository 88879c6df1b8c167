//! Session token grammar
//!
//! A user's position in any multi-step flow is persisted as one short string
//! on their profile, e.g. `SHIP_DIMS_<id>` or `REJECT_RATE_<id>`. The string
//! is parsed into [`SessionToken`] when the profile is loaded, so every
//! consumer works with the typed form and unknown shapes never reach a
//! handler.

use super::field::Field;
use crate::db::ShipmentId;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unrecognized session token: {0}")]
pub struct ParseTokenError(pub String);

// ============================================================================
// Wizard steps
// ============================================================================

/// Ordered steps of the shipment wizard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WizardStep {
    Airline,
    Origin,
    Destination,
    Awb,
    Pieces,
    GrossWeight,
    ChargeableWeight,
    Dimensions,
    Rates,
    Shipper,
    Consignee,
    NotifyParty,
    Review,
}

impl WizardStep {
    pub const ORDER: [WizardStep; 13] = [
        WizardStep::Airline,
        WizardStep::Origin,
        WizardStep::Destination,
        WizardStep::Awb,
        WizardStep::Pieces,
        WizardStep::GrossWeight,
        WizardStep::ChargeableWeight,
        WizardStep::Dimensions,
        WizardStep::Rates,
        WizardStep::Shipper,
        WizardStep::Consignee,
        WizardStep::NotifyParty,
        WizardStep::Review,
    ];

    pub const FIRST: WizardStep = WizardStep::Airline;

    fn index(self) -> usize {
        Self::ORDER
            .iter()
            .position(|s| *s == self)
            .unwrap_or_default()
    }

    pub fn next(self) -> Option<WizardStep> {
        Self::ORDER.get(self.index() + 1).copied()
    }

    pub fn previous(self) -> Option<WizardStep> {
        self.index().checked_sub(1).map(|i| Self::ORDER[i])
    }

    /// The field captured at this step (`None` for the review step)
    pub fn field(self) -> Option<Field> {
        match self {
            WizardStep::Airline => Some(Field::Airline),
            WizardStep::Origin => Some(Field::Origin),
            WizardStep::Destination => Some(Field::Destination),
            WizardStep::Awb => Some(Field::Awb),
            WizardStep::Pieces => Some(Field::Pieces),
            WizardStep::GrossWeight => Some(Field::GrossWeight),
            WizardStep::ChargeableWeight => Some(Field::ChargeableWeight),
            WizardStep::Dimensions => Some(Field::Dimensions),
            WizardStep::Rates => Some(Field::Rates),
            WizardStep::Shipper => Some(Field::Shipper),
            WizardStep::Consignee => Some(Field::Consignee),
            WizardStep::NotifyParty => Some(Field::NotifyParty),
            WizardStep::Review => None,
        }
    }

    fn code(self) -> &'static str {
        match self {
            WizardStep::Airline => "AIRLINE",
            WizardStep::Origin => "ORIGIN",
            WizardStep::Destination => "DEST",
            WizardStep::Awb => "AWB",
            WizardStep::Pieces => "PIECES",
            WizardStep::GrossWeight => "GROSS",
            WizardStep::ChargeableWeight => "CHARGEABLE",
            WizardStep::Dimensions => "DIMS",
            WizardStep::Rates => "RATES",
            WizardStep::Shipper => "SHIPPER",
            WizardStep::Consignee => "CONSIGNEE",
            WizardStep::NotifyParty => "NOTIFY",
            WizardStep::Review => "CONFIRM",
        }
    }

    fn from_code(code: &str) -> Option<WizardStep> {
        Self::ORDER.into_iter().find(|s| s.code() == code)
    }
}

/// Which proof file the user is expected to send next
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UploadSlot {
    First,
    Second,
}

impl UploadSlot {
    pub fn number(self) -> u8 {
        match self {
            UploadSlot::First => 1,
            UploadSlot::Second => 2,
        }
    }
}

// ============================================================================
// Token
// ============================================================================

/// Persisted per-user workflow position. Absence means idle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SessionToken {
    RegName,
    RegCompany,
    Ship {
        step: WizardStep,
        shipment: ShipmentId,
    },
    EditInput {
        field: Field,
        shipment: ShipmentId,
    },
    Upload {
        slot: UploadSlot,
        shipment: ShipmentId,
    },
    SetExchange,
    RejectRate {
        shipment: ShipmentId,
    },
    RejectPayment {
        shipment: ShipmentId,
    },
    AdmBroadcast,
}

/// Owning workflow of a token, used as the row key of the route table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Reg,
    Ship,
    EditInput,
    Upload,
    SetExchange,
    Reject,
    AdmBroadcast,
}

impl SessionToken {
    pub fn verb(&self) -> Verb {
        match self {
            SessionToken::RegName | SessionToken::RegCompany => Verb::Reg,
            SessionToken::Ship { .. } => Verb::Ship,
            SessionToken::EditInput { .. } => Verb::EditInput,
            SessionToken::Upload { .. } => Verb::Upload,
            SessionToken::SetExchange => Verb::SetExchange,
            SessionToken::RejectRate { .. } | SessionToken::RejectPayment { .. } => Verb::Reject,
            SessionToken::AdmBroadcast => Verb::AdmBroadcast,
        }
    }

    /// Shipment the token is bound to, if any
    pub fn shipment_id(&self) -> Option<ShipmentId> {
        match self {
            SessionToken::Ship { shipment, .. }
            | SessionToken::EditInput { shipment, .. }
            | SessionToken::Upload { shipment, .. }
            | SessionToken::RejectRate { shipment }
            | SessionToken::RejectPayment { shipment } => Some(*shipment),
            SessionToken::RegName
            | SessionToken::RegCompany
            | SessionToken::SetExchange
            | SessionToken::AdmBroadcast => None,
        }
    }

    pub fn ship(step: WizardStep, shipment: ShipmentId) -> Self {
        SessionToken::Ship { step, shipment }
    }

    pub fn review(shipment: ShipmentId) -> Self {
        SessionToken::Ship {
            step: WizardStep::Review,
            shipment,
        }
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionToken::RegName => f.write_str("REG_NAME"),
            SessionToken::RegCompany => f.write_str("REG_COMPANY"),
            SessionToken::Ship { step, shipment } => write!(f, "SHIP_{}_{shipment}", step.code()),
            SessionToken::EditInput { field, shipment } => {
                write!(f, "EDIT_INPUT_{}_{shipment}", field.code())
            }
            SessionToken::Upload { slot, shipment } => {
                write!(f, "UPLOAD_{}_{shipment}", slot.number())
            }
            SessionToken::SetExchange => f.write_str("SET_EXCHANGE"),
            SessionToken::RejectRate { shipment } => write!(f, "REJECT_RATE_{shipment}"),
            SessionToken::RejectPayment { shipment } => write!(f, "REJECT_PAYMENT_{shipment}"),
            SessionToken::AdmBroadcast => f.write_str("ADM_BROADCAST"),
        }
    }
}

impl FromStr for SessionToken {
    type Err = ParseTokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseTokenError(s.to_string());

        match s {
            "REG_NAME" => return Ok(SessionToken::RegName),
            "REG_COMPANY" => return Ok(SessionToken::RegCompany),
            "SET_EXCHANGE" => return Ok(SessionToken::SetExchange),
            "ADM_BROADCAST" => return Ok(SessionToken::AdmBroadcast),
            _ => {}
        }

        // Every remaining shape ends in `_<shipment-id>`; ids never contain '_'
        let (head, id) = s.rsplit_once('_').ok_or_else(invalid)?;
        let shipment: ShipmentId = id.parse().map_err(|_| invalid())?;

        if let Some(step) = head.strip_prefix("SHIP_") {
            let step = WizardStep::from_code(step).ok_or_else(invalid)?;
            return Ok(SessionToken::Ship { step, shipment });
        }
        if let Some(code) = head.strip_prefix("EDIT_INPUT_") {
            let field = Field::from_code(code).ok_or_else(invalid)?;
            return Ok(SessionToken::EditInput { field, shipment });
        }
        match head {
            "UPLOAD_1" => Ok(SessionToken::Upload {
                slot: UploadSlot::First,
                shipment,
            }),
            "UPLOAD_2" => Ok(SessionToken::Upload {
                slot: UploadSlot::Second,
                shipment,
            }),
            "REJECT_RATE" => Ok(SessionToken::RejectRate { shipment }),
            "REJECT_PAYMENT" => Ok(SessionToken::RejectPayment { shipment }),
            _ => Err(invalid()),
        }
    }
}
