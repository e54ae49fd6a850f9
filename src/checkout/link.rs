//! WhatsApp click-to-chat links.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

const WHATSAPP_BASE_URL: &str = "https://wa.me";
const MIN_DIGITS: usize = 8;
const MAX_DIGITS: usize = 15;

/// International phone number reduced to its digits, as wa.me expects.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhatsAppNumber(String);

impl WhatsAppNumber {
    /// Accepts the usual ways of writing a number (`+54 9 11 5555-0000`,
    /// `(011) 5555.0000`) and keeps only the digits.
    pub fn parse(raw: &str) -> Result<Self, LinkError> {
        let mut digits = String::with_capacity(raw.len());
        for ch in raw.trim().chars() {
            match ch {
                '0'..='9' => digits.push(ch),
                '+' | ' ' | '-' | '.' | '(' | ')' => {}
                other => return Err(LinkError::InvalidCharacter(other)),
            }
        }
        if !(MIN_DIGITS..=MAX_DIGITS).contains(&digits.len()) {
            return Err(LinkError::InvalidLength(digits.len()));
        }
        Ok(Self(digits))
    }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for WhatsAppNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    #[error("Phone number contains invalid character {0:?}")]
    InvalidCharacter(char),
    #[error("Phone number must have between 8 and 15 digits, got {0}")]
    InvalidLength(usize),
}

/// Link that opens a chat with `number` and the message pre-filled. Every
/// byte outside the URL unreserved set is percent-encoded.
pub fn whatsapp_link(number: &WhatsAppNumber, message: &str) -> String {
    format!("{WHATSAPP_BASE_URL}/{}?text={}", number, urlencoding::encode(message))
}

/// Same as [`whatsapp_link`] for a destination that has not been parsed yet.
pub fn build_whatsapp_link(destination: &str, message: &str) -> Result<String, LinkError> {
    Ok(whatsapp_link(&WhatsAppNumber::parse(destination)?, message))
}
