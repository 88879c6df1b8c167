//! Field input validators

use crate::db::Dimensions;
use thiserror::Error;

/// Malformed field input. Recovered by re-prompting the same step.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("⚠️ This field cannot be empty.")]
    Empty,
    #[error("⚠️ Enter a valid whole number.")]
    NotInteger,
    #[error("⚠️ Enter a valid number.")]
    NotNumber,
    #[error("⚠️ The value must be greater than zero.")]
    NotPositive,
    #[error("⚠️ Use format: LxWxH (e.g. 120x80x100)")]
    BadDimensions,
    #[error("⚠️ Use format: AppRate, SaleRate (e.g. 4.5, 5.2)")]
    BadRatePair,
    #[error("⚠️ Chargeable weight cannot be below the gross weight ({0}kg).")]
    BelowGross(String),
}

pub fn non_empty(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty);
    }
    Ok(trimmed.to_string())
}

pub fn positive_integer(raw: &str) -> Result<u32, ValidationError> {
    let value: u32 = raw
        .trim()
        .parse()
        .map_err(|_| ValidationError::NotInteger)?;
    if value == 0 {
        return Err(ValidationError::NotPositive);
    }
    Ok(value)
}

fn number(raw: &str) -> Result<f64, ValidationError> {
    let value: f64 = raw.trim().parse().map_err(|_| ValidationError::NotNumber)?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ValidationError::NotNumber)
    }
}

pub fn positive_float(raw: &str) -> Result<f64, ValidationError> {
    let value = number(raw)?;
    if value <= 0.0 {
        return Err(ValidationError::NotPositive);
    }
    Ok(value)
}

pub fn non_negative_float(raw: &str) -> Result<f64, ValidationError> {
    let value = number(raw)?;
    if value < 0.0 {
        return Err(ValidationError::NotPositive);
    }
    Ok(value)
}

/// `L×W×H`, separated by any of `x X * / , -` or whitespace
pub fn dimensions(raw: &str) -> Result<Dimensions, ValidationError> {
    let parts: Vec<&str> = raw
        .trim()
        .split(|c: char| matches!(c, 'x' | 'X' | '*' | '/' | ',' | '-') || c.is_whitespace())
        .filter(|p| !p.is_empty())
        .collect();

    let [length, width, height] = parts.as_slice() else {
        return Err(ValidationError::BadDimensions);
    };
    let side = |p: &str| positive_float(p).map_err(|_| ValidationError::BadDimensions);

    Ok(Dimensions {
        length: side(length)?,
        width: side(width)?,
        height: side(height)?,
    })
}

/// `approved, sale` rate pair in USD
pub fn rate_pair(raw: &str) -> Result<(f64, f64), ValidationError> {
    let mut parts = raw.split(',').map(str::trim);
    let (Some(approved), Some(sale), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(ValidationError::BadRatePair);
    };
    let rate = |p: &str| non_negative_float(p).map_err(|_| ValidationError::BadRatePair);
    Ok((rate(approved)?, rate(sale)?))
}
