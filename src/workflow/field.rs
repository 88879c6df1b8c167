//! Shipment fields: prompts, parsing and the patch each input produces
//!
//! The wizard and the edit engine share these rules, so a value accepted at
//! wizard step N is accepted by `EDIT_INPUT_<field>` and vice versa.

use super::metrics::{computed_chargeable, round2};
use super::token::WizardStep;
use super::validate::{self, ValidationError};
use crate::db::{Dimensions, Shipment, ShipmentPatch};

/// Editable shipment field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
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
}

/// Typed value parsed from one text input
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Pieces(u32),
    Weight(f64),
    Chargeable(ChargeableInput),
    Dimensions(Dimensions),
    Rates { approved: f64, sale: f64 },
}

/// Chargeable weight is either typed in or derived from the other inputs
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChargeableInput {
    Manual(f64),
    Auto,
}

impl Field {
    pub const ALL: [Field; 12] = [
        Field::Airline,
        Field::Origin,
        Field::Destination,
        Field::Awb,
        Field::Pieces,
        Field::GrossWeight,
        Field::ChargeableWeight,
        Field::Dimensions,
        Field::Rates,
        Field::Shipper,
        Field::Consignee,
        Field::NotifyParty,
    ];

    /// Short code used in tokens and button payloads
    pub fn code(self) -> &'static str {
        match self {
            Field::Airline => "airline",
            Field::Origin => "origin",
            Field::Destination => "dest",
            Field::Awb => "awb",
            Field::Pieces => "pcs",
            Field::GrossWeight => "gross",
            Field::ChargeableWeight => "chargeable",
            Field::Dimensions => "dims",
            Field::Rates => "rates",
            Field::Shipper => "shipper",
            Field::Consignee => "consignee",
            Field::NotifyParty => "notify",
        }
    }

    pub fn from_code(code: &str) -> Option<Field> {
        Self::ALL.into_iter().find(|f| f.code() == code)
    }

    /// Wizard step that captures this field
    pub fn step(self) -> WizardStep {
        match self {
            Field::Airline => WizardStep::Airline,
            Field::Origin => WizardStep::Origin,
            Field::Destination => WizardStep::Destination,
            Field::Awb => WizardStep::Awb,
            Field::Pieces => WizardStep::Pieces,
            Field::GrossWeight => WizardStep::GrossWeight,
            Field::ChargeableWeight => WizardStep::ChargeableWeight,
            Field::Dimensions => WizardStep::Dimensions,
            Field::Rates => WizardStep::Rates,
            Field::Shipper => WizardStep::Shipper,
            Field::Consignee => WizardStep::Consignee,
            Field::NotifyParty => WizardStep::NotifyParty,
        }
    }

    /// Button label on the edit menu
    pub fn label(self) -> &'static str {
        match self {
            Field::Airline => "✈️ Airline",
            Field::Origin => "📍 Origin",
            Field::Destination => "🏁 Destination",
            Field::Awb => "🔢 AWB",
            Field::Pieces => "📦 Pieces",
            Field::GrossWeight => "⚖️ Normal Weight",
            Field::ChargeableWeight => "⚖️ Chargeable Weight",
            Field::Dimensions => "📏 Dimensions",
            Field::Rates => "💰 Rates (USD)",
            Field::Shipper => "🏠 Shipper",
            Field::Consignee => "🏢 Consignee",
            Field::NotifyParty => "🔔 Notify Party",
        }
    }

    pub fn prompt(self) -> &'static str {
        match self {
            Field::Airline => "✈️ Enter the Airline Name:",
            Field::Origin => "📍 Enter Origin City:",
            Field::Destination => "🏁 Enter Destination City:",
            Field::Awb => "🔢 Enter AWB Number:",
            Field::Pieces => "🔢 Enter Total Pieces:",
            Field::GrossWeight => "⚖️ Enter Normal Weight (kg):",
            Field::ChargeableWeight => {
                "⚖️ Enter Chargeable Weight (kg), or type auto to calculate it from the dimensions:"
            }
            Field::Dimensions => "📏 Enter Dimensions LxWxH (e.g., 120x80x100 or 12*5*7):",
            Field::Rates => "💰 Enter Approved Rate, Sale Rate in USD (e.g., 4.5, 5.2):",
            Field::Shipper => "🏠 Enter Shipper Details:",
            Field::Consignee => "🏢 Enter Consignee Details:",
            Field::NotifyParty => "🔔 Enter Notify Party Details:",
        }
    }

    /// Inputs of the derived chargeable weight
    pub fn feeds_chargeable(self) -> bool {
        matches!(
            self,
            Field::Pieces | Field::GrossWeight | Field::Dimensions
        )
    }

    pub fn parse(self, raw: &str) -> Result<FieldValue, ValidationError> {
        match self {
            Field::Airline
            | Field::Origin
            | Field::Destination
            | Field::Awb
            | Field::Shipper
            | Field::Consignee
            | Field::NotifyParty => validate::non_empty(raw).map(FieldValue::Text),
            Field::Pieces => validate::positive_integer(raw).map(FieldValue::Pieces),
            Field::GrossWeight => validate::positive_float(raw).map(FieldValue::Weight),
            Field::ChargeableWeight => {
                if raw.trim().eq_ignore_ascii_case("auto") {
                    Ok(FieldValue::Chargeable(ChargeableInput::Auto))
                } else {
                    validate::positive_float(raw)
                        .map(|w| FieldValue::Chargeable(ChargeableInput::Manual(w)))
                }
            }
            Field::Dimensions => validate::dimensions(raw).map(FieldValue::Dimensions),
            Field::Rates => validate::rate_pair(raw)
                .map(|(approved, sale)| FieldValue::Rates { approved, sale }),
        }
    }

    /// Whether the shipment already holds a value for this field
    pub fn is_set(self, s: &Shipment) -> bool {
        match self {
            Field::Airline => s.airline.is_some(),
            Field::Origin => s.origin.is_some(),
            Field::Destination => s.destination.is_some(),
            Field::Awb => s.awb_number.is_some(),
            Field::Pieces => s.pieces.is_some(),
            Field::GrossWeight => s.gross_weight.is_some(),
            Field::ChargeableWeight => s.chargeable_weight.is_some(),
            Field::Dimensions => s.dimensions.is_some(),
            Field::Rates => s.sale_rate_usd.is_some(),
            Field::Shipper => s.shipper_info.is_some(),
            Field::Consignee => s.consignee_info.is_some(),
            Field::NotifyParty => s.notify_party.is_some(),
        }
    }
}

/// Validate one text input for `field` and build the resulting patch.
///
/// Writing pieces, gross weight or dimensions recomputes the chargeable
/// weight once all three are known. A manually entered chargeable weight is
/// kept through the first entry of those inputs and replaced only when one
/// of them is entered again.
pub fn apply_input(
    field: Field,
    raw: &str,
    shipment: &Shipment,
) -> Result<ShipmentPatch, ValidationError> {
    let value = field.parse(raw)?;
    let mut patch = ShipmentPatch::default();

    match value {
        FieldValue::Text(text) => match field {
            Field::Airline => patch.airline = Some(text),
            Field::Origin => patch.origin = Some(text),
            Field::Destination => patch.destination = Some(text),
            Field::Awb => patch.awb_number = Some(text),
            Field::Shipper => patch.shipper_info = Some(text),
            Field::Consignee => patch.consignee_info = Some(text),
            _ => patch.notify_party = Some(text),
        },
        FieldValue::Pieces(pieces) => patch.pieces = Some(pieces),
        FieldValue::Weight(gross) => patch.gross_weight = Some(gross),
        FieldValue::Dimensions(dims) => patch.dimensions = Some(dims),
        FieldValue::Rates { approved, sale } => {
            patch.approved_rate_usd = Some(approved);
            patch.sale_rate_usd = Some(sale);
        }
        FieldValue::Chargeable(ChargeableInput::Manual(weight)) => {
            let weight = round2(weight);
            if let Some(gross) = shipment.gross_weight {
                if weight < gross {
                    return Err(ValidationError::BelowGross(gross.to_string()));
                }
            }
            patch.chargeable_weight = Some(Some(weight));
            patch.chargeable_manual = Some(true);
        }
        FieldValue::Chargeable(ChargeableInput::Auto) => {
            patch.chargeable_weight = Some(computed_chargeable(shipment));
            patch.chargeable_manual = Some(false);
        }
    }

    if field.feeds_chargeable() {
        let reentry = field.is_set(shipment);
        if !shipment.chargeable_manual || reentry {
            let computed = computed_chargeable(&shipment.patched(&patch));
            if computed.is_some() || reentry {
                patch.chargeable_weight = Some(computed);
                patch.chargeable_manual = Some(false);
            }
        }
    }

    Ok(patch)
}
