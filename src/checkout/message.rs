//! Order text sent to the shop over WhatsApp.

use serde::{Deserialize, Serialize};
use crate::domain::{CartItem, Money, MoneyError};

pub const DEFAULT_GREETING: &str = "¡Hola! Quiero hacer el siguiente pedido:";
const SEPARATOR: &str = "--------------------";

/// What the order text needs to know about one cart line.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub name: String,
    pub quantity: u32,
    pub size: Option<String>,
    pub color: Option<String>,
    pub unit_price: Money,
}

impl OrderLine {
    pub fn subtotal(&self) -> Result<Money, MoneyError> { self.unit_price.multiply(self.quantity) }
}

impl From<&CartItem> for OrderLine {
    fn from(item: &CartItem) -> Self {
        Self {
            name: item.product.name.clone(),
            quantity: item.quantity,
            size: item.size.clone(),
            color: item.color.clone(),
            unit_price: item.unit_price.clone(),
        }
    }
}

/// Builds the order text: greeting, one bullet per line with its subtotal,
/// a separator and the total. The output depends only on the arguments.
pub fn format_order_message(greeting: &str, lines: &[OrderLine], total: &Money) -> Result<String, MoneyError> {
    let mut out = String::new();
    out.push_str(greeting.trim());
    out.push_str("\n\n");
    for line in lines {
        out.push_str(&format!("• {}x {}", line.quantity, line.name.trim()));
        let details: Vec<String> = [
            line.size.as_deref().map(|s| format!("Talle: {s}")),
            line.color.as_deref().map(|c| format!("Color: {c}")),
        ]
        .into_iter()
        .flatten()
        .collect();
        if !details.is_empty() {
            out.push_str(&format!(" ({})", details.join(", ")));
        }
        out.push_str(&format!(" - {}\n", line.subtotal()?.format_whole()));
    }
    out.push('\n');
    out.push_str(SEPARATOR);
    out.push('\n');
    out.push_str(&format!("*Total: {}*", total.format_whole()));
    Ok(out)
}
