//! Human-readable texts

use super::metrics::quote;
use crate::db::{Shipment, ShipmentStatus, Stats, User};
use std::fmt::Write;

const RULE: &str = "━━━━━━━━━━━━━━━";

fn or_na(value: Option<&str>) -> &str {
    value.unwrap_or("N/A")
}

fn num(value: Option<f64>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| v.to_string())
}

/// Full shipment summary as shown on review screens and staff cards
pub fn summary(s: &Shipment) -> String {
    let q = quote(s);
    let dims = s.dimensions.map_or_else(
        || "N/A".to_string(),
        |d| format!("{} x {} x {} cm", d.length, d.width, d.height),
    );
    let chargeable = match (s.chargeable_weight, s.chargeable_manual) {
        (Some(w), true) => format!("{w}kg (manual)"),
        (Some(w), false) => format!("{w}kg"),
        (None, _) => "N/A".to_string(),
    };
    let status = if s.status == ShipmentStatus::QuotationCreated {
        "Everything correct?"
    } else {
        s.status.describe()
    };

    let mut out = String::new();
    let _ = writeln!(out, "📋 SHIPMENT SUMMARY");
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "✈️ Airline: {}", or_na(s.airline.as_deref()));
    let _ = writeln!(
        out,
        "📍 Route: {} to {}",
        or_na(s.origin.as_deref()),
        or_na(s.destination.as_deref())
    );
    let _ = writeln!(out, "🔢 AWB: {}", or_na(s.awb_number.as_deref()));
    let _ = writeln!(out, "📦 Pieces: {} Pcs", s.pieces.unwrap_or_default());
    let _ = writeln!(out, "⚖️ Normal Weight: {}kg", num(s.gross_weight));
    if let Some(vol) = q.volumetric {
        let _ = writeln!(out, "📐 Volumetric Weight: {vol}kg");
    }
    let _ = writeln!(out, "⚖️ Chargeable Weight: {chargeable}");
    let _ = writeln!(out, "📏 Dims: {dims}");
    let _ = writeln!(out, "💵 Sale Rate: ${}", num(s.sale_rate_usd));
    let _ = writeln!(out, "💰 Total: ${} ({} ETB)", q.total_usd, q.total_etb);
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "🏠 Shipper:\n{}\n", or_na(s.shipper_info.as_deref()));
    let _ = writeln!(out, "🏢 Consignee:\n{}\n", or_na(s.consignee_info.as_deref()));
    let _ = writeln!(out, "🔔 Notify:\n{}", or_na(s.notify_party.as_deref()));
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(
        out,
        "Payment Status: {}",
        s.payment_status.as_str().to_uppercase()
    );
    let _ = write!(out, "Shipment Status: {status}");
    out
}

/// Phase 1 request posted to the staff channel
pub fn rate_request(s: &Shipment, owner: &User) -> String {
    format!(
        "🚨 NEW SHIPMENT REVIEW REQUEST\nFrom: {}\nID: {}\n\n{}",
        owner.display_name(),
        s.id,
        summary(s)
    )
}

/// Phase 2 request posted to the staff channel
pub fn payment_request(s: &Shipment) -> String {
    format!(
        "💰 PAYMENT VERIFICATION REQUIRED\nID: {}\n\n{}",
        s.id,
        summary(s)
    )
}

/// Title-cased status, e.g. "Rate Approved"
pub fn status_title(status: ShipmentStatus) -> String {
    status
        .as_str()
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars).collect()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// One line-card in the tracking list
pub fn tracking_card(s: &Shipment) -> String {
    format!(
        "✈️ {} | AWB: {}\nPayment: {}\nStatus: {}",
        or_na(s.airline.as_deref()),
        or_na(s.awb_number.as_deref()),
        s.payment_status.as_str().to_uppercase(),
        status_title(s.status)
    )
}

/// Card on the staff panel
pub fn staff_card(s: &Shipment) -> String {
    format!(
        "{}\nOwner ID: {}\nID: {}",
        tracking_card(s),
        s.owner_id,
        s.id
    )
}

pub fn profile(user: &User) -> String {
    format!(
        "👤 USER PROFILE\n\nName: {}\nCompany: {}\nRole: {}\nStatus: {}",
        user.display_name(),
        or_na(user.company_name.as_deref()),
        user.role.as_str().to_uppercase(),
        if user.is_approved { "Approved" } else { "Pending" }
    )
}

pub const REGISTRATION_PROMPT: &str = "🚀 Welcome to AERP Cargo System\n\n\
    Your account is not registered. To gain access, please provide your details for Admin review.\n\n\
    Please enter your Full Name:";

pub const ACCOUNT_PENDING: &str = "⏳ Account Pending\n\n\
    Your registration is currently under review by our staff. You will be notified once approved.";

pub const NOT_APPROVED_YET: &str =
    "❌ Your account is not approved yet. Please finish your registration first.";

pub const NO_LONGER_AVAILABLE: &str = "⚠️ This shipment is no longer available.";

/// Greeting for an approved user
pub fn greeting(user: &User) -> String {
    format!(
        "👋 Hello, {}!\nRole: {}\nCompany: {}\n\n\
         The dashboard menu is available at the bottom of your screen. Select an option to proceed.",
        user.display_name(),
        user.role.as_str().to_uppercase(),
        or_na(user.company_name.as_deref())
    )
}

/// Staff-channel notice of a finished registration
pub fn registration_notice(user: &User) -> String {
    format!(
        "👤 New User Request\n\nName: {}\nCompany: {}\nTelegram: @{}\nID: {}",
        user.display_name(),
        or_na(user.company_name.as_deref()),
        user.username.as_deref().unwrap_or("NoUsername"),
        user.id
    )
}

pub fn admin_panel(exchange_rate: f64, stats: Stats) -> String {
    format!(
        "👑 Admin Control Panel\n\n\
         Current Global Exchange Rate: {exchange_rate} ETB\n\
         Updating this will only affect new shipments.\n\n\
         Users: {}\nShipments: {}",
        stats.users, stats.shipments
    )
}
