//! Checkout handoff: turns a cart into an order text and a WhatsApp link.
//!
//! The shop takes payment and shipping details in the chat, so checkout
//! here ends once the shopper has a link with the order pre-filled.

pub mod link;
pub mod message;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::domain::{Cart, CartError, Money};

pub use link::{build_whatsapp_link, whatsapp_link, LinkError, WhatsAppNumber};
pub use message::{format_order_message, OrderLine, DEFAULT_GREETING};

#[derive(Clone, Debug)]
pub struct CheckoutSettings {
    pub whatsapp: WhatsAppNumber,
    pub greeting: String,
}

impl CheckoutSettings {
    pub fn new(whatsapp: WhatsAppNumber) -> Self {
        Self { whatsapp, greeting: DEFAULT_GREETING.to_string() }
    }
}

/// Single-use result of a checkout. Never stored.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrderSummary {
    pub message: String,
    pub link: String,
    pub total: Money,
    pub item_count: u32,
    pub generated_at: DateTime<Utc>,
}

/// Snapshots `cart` into an order summary. The cart itself is not changed.
pub fn summarize(cart: &Cart, settings: &CheckoutSettings) -> Result<OrderSummary, CartError> {
    if cart.is_empty() { return Err(CartError::EmptyCart); }
    let lines: Vec<OrderLine> = cart.items().iter().map(OrderLine::from).collect();
    let total = cart.try_total()?;
    let message = format_order_message(&settings.greeting, &lines, &total)?;
    let link = whatsapp_link(&settings.whatsapp, &message);
    Ok(OrderSummary { message, link, total, item_count: cart.item_count(), generated_at: Utc::now() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Product;
    use rust_decimal::Decimal;

    fn settings() -> CheckoutSettings {
        CheckoutSettings::new(WhatsAppNumber::parse("+54 9 11 5555-0000").unwrap())
    }

    #[test]
    fn test_summarize_cart() {
        let mut cart = Cart::new("ARS");
        let a = Product::new("A", "Conjunto", Money::ars(Decimal::new(1000, 0)));
        cart.add_item(&a, Some("M"), None, 1).unwrap();
        cart.add_item(&a, Some("M"), None, 2).unwrap();

        let summary = summarize(&cart, &settings()).unwrap();
        assert_eq!(summary.total.amount(), Decimal::new(3000, 0));
        assert_eq!(summary.item_count, 3);
        assert!(summary.message.contains("• 3x Conjunto (Talle: M) - $ 3.000"));
        assert!(summary.message.ends_with("*Total: $ 3.000*"));
        assert!(summary.link.starts_with("https://wa.me/5491155550000?text="));
        let encoded = summary.link.split_once("?text=").unwrap().1;
        assert_eq!(urlencoding::decode(encoded).unwrap(), summary.message);
        assert_eq!(cart.line_count(), 1);
    }

    #[test]
    fn test_summarize_empty_cart() {
        assert_eq!(summarize(&Cart::new("ARS"), &settings()).unwrap_err(), CartError::EmptyCart);
    }
}
