//! Derived shipment metrics

use crate::db::{Dimensions, Shipment};

/// Cubic centimetres per volumetric kilogram
pub const VOLUMETRIC_DIVISOR: f64 = 6000.0;

/// Round half away from zero to two decimals
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn volumetric_weight(dims: Dimensions, pieces: u32) -> f64 {
    dims.length * dims.width * dims.height * f64::from(pieces) / VOLUMETRIC_DIVISOR
}

/// Billing weight: the greater of actual and volumetric weight
pub fn chargeable_weight(gross: f64, dims: Dimensions, pieces: u32) -> f64 {
    round2(gross.max(volumetric_weight(dims, pieces)))
}

/// Computed chargeable weight when every input is known
pub fn computed_chargeable(shipment: &Shipment) -> Option<f64> {
    Some(chargeable_weight(
        shipment.gross_weight?,
        shipment.dimensions?,
        shipment.pieces?,
    ))
}

/// Money figures shown on summaries
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quote {
    pub volumetric: Option<f64>,
    pub chargeable: f64,
    pub total_usd: f64,
    pub total_etb: f64,
}

/// Totals from whichever chargeable weight is currently recorded
pub fn quote(shipment: &Shipment) -> Quote {
    let volumetric = shipment
        .dimensions
        .zip(shipment.pieces)
        .map(|(d, p)| round2(volumetric_weight(d, p)));
    let chargeable = shipment.chargeable_weight.unwrap_or_default();
    let sale = shipment.sale_rate_usd.unwrap_or_default();
    let exchange = shipment.exchange_rate.unwrap_or(1.0);

    let total_usd = round2(chargeable * sale);
    let total_etb = round2(total_usd * exchange);
    Quote {
        volumetric,
        chargeable,
        total_usd,
        total_etb,
    }
}
