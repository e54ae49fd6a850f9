//! Value Objects for the storefront cart

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Money value object
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money { amount: Decimal, currency: String }

impl Money {
    pub fn new(amount: Decimal, currency: &str) -> Self { Self { amount, currency: currency.trim().to_uppercase() } }
    pub fn ars(amount: Decimal) -> Self { Self::new(amount, "ARS") }
    pub fn zero(currency: &str) -> Self { Self::new(Decimal::ZERO, currency) }
    pub fn amount(&self) -> Decimal { self.amount }
    pub fn currency(&self) -> &str { &self.currency }
    pub fn is_negative(&self) -> bool { self.amount.is_sign_negative() && !self.amount.is_zero() }
    pub fn is_zero(&self) -> bool { self.amount.is_zero() }
    pub fn add(&self, other: &Money) -> Result<Money, MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch { expected: self.currency.clone(), found: other.currency.clone() });
        }
        let amount = self.amount.checked_add(other.amount).ok_or(MoneyError::Overflow)?;
        Ok(Money::new(amount, &self.currency))
    }
    pub fn multiply(&self, qty: u32) -> Result<Money, MoneyError> {
        let amount = self.amount.checked_mul(Decimal::from(qty)).ok_or(MoneyError::Overflow)?;
        Ok(Money::new(amount, &self.currency))
    }

    /// Renders the amount rounded to whole currency units with thousands
    /// grouping, e.g. `$ 12.500` for ARS or `US$ 1,250` for USD.
    pub fn format_whole(&self) -> String {
        let rounded = self.amount.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        let negative = rounded.is_sign_negative() && !rounded.is_zero();
        let digits = rounded.abs().trunc().to_string();
        let digits = digits.split('.').next().unwrap_or("0");

        let (symbol, separator) = match currency_style(&self.currency) {
            Some(style) => style,
            None => (self.currency.as_str(), ','),
        };
        let sign = if negative { "-" } else { "" };
        format!("{sign}{symbol} {}", group_thousands(digits, separator))
    }
}

impl Default for Money { fn default() -> Self { Self::zero("ARS") } }

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.format_whole()) }
}

/// Symbol and grouping separator for the currencies the storefront sells in.
fn currency_style(code: &str) -> Option<(&'static str, char)> {
    match code {
        "ARS" | "CLP" | "COP" | "UYU" => Some(("$", '.')),
        "MXN" => Some(("$", ',')),
        "USD" => Some(("US$", ',')),
        "EUR" => Some(("€", '.')),
        "BRL" => Some(("R$", '.')),
        _ => None,
    }
}

fn group_thousands(digits: &str, separator: char) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 { out.push(separator); }
        out.push(ch);
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    #[error("Currency mismatch: expected {expected}, found {found}")]
    CurrencyMismatch { expected: String, found: String },
    #[error("Amount is too large")]
    Overflow,
}

/// Identity of a cart line: product id plus the chosen size and color.
///
/// The textual form percent-encodes each component and joins them with `:`,
/// so it can be parsed back without ambiguity. Blank size or color values
/// are the same as no selection.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct LineId { product_id: String, size: Option<String>, color: Option<String> }

impl LineId {
    pub fn new(product_id: impl Into<String>, size: Option<&str>, color: Option<&str>) -> Self {
        Self { product_id: product_id.into(), size: normalize_option(size), color: normalize_option(color) }
    }
    pub fn product_id(&self) -> &str { &self.product_id }
    pub fn size(&self) -> Option<&str> { self.size.as_deref() }
    pub fn color(&self) -> Option<&str> { self.color.as_deref() }
}

/// Trims a selection and treats blank input as "not selected".
pub fn normalize_option(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            urlencoding::encode(&self.product_id),
            urlencoding::encode(self.size.as_deref().unwrap_or("")),
            urlencoding::encode(self.color.as_deref().unwrap_or("")),
        )
    }
}

impl FromStr for LineId {
    type Err = LineIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        let [product, size, color] = parts.as_slice() else { return Err(LineIdError::Malformed(s.to_string())) };
        let decode = |part: &str| urlencoding::decode(part).map(|v| v.into_owned()).map_err(|_| LineIdError::Malformed(s.to_string()));
        let product_id = decode(*product)?;
        if product_id.trim().is_empty() { return Err(LineIdError::Malformed(s.to_string())); }
        let size = decode(*size)?;
        let color = decode(*color)?;
        Ok(Self::new(product_id, Some(&size), Some(&color)))
    }
}

impl From<LineId> for String {
    fn from(id: LineId) -> Self { id.to_string() }
}

impl TryFrom<String> for LineId {
    type Error = LineIdError;
    fn try_from(value: String) -> Result<Self, Self::Error> { value.parse() }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineIdError {
    #[error("Malformed line id: {0}")]
    Malformed(String),
}
