//! Cart Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;
use tracing::error;
use uuid::Uuid;
use crate::domain::aggregates::product::{Product, ProductError, MAX_UNIT_PRICE};
use crate::domain::events::CartEvent;
use crate::domain::value_objects::{normalize_option, LineId, Money, MoneyError};

/// Most units a single line may hold.
pub const MAX_LINE_QUANTITY: u32 = 999;

/// Lines the shopper has picked, in the order they were first added.
///
/// Totals are never stored: [`Cart::total`] and [`Cart::item_count`] are
/// folded from the lines on every call. Mutations that would push a line
/// or the cart total out of range are refused before anything changes, so
/// the fold cannot fail on a cart built through this API.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Cart {
    id: String,
    currency: String,
    items: Vec<CartItem>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(skip)]
    events: Vec<CartEvent>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: LineId,
    pub product: Product,
    pub size: Option<String>,
    pub color: Option<String>,
    pub quantity: u32,
    /// Price at the moment the line was created.
    pub unit_price: Money,
}

impl CartItem {
    pub fn line_total(&self) -> Result<Money, MoneyError> { self.unit_price.multiply(self.quantity) }
}

impl Cart {
    pub fn new(currency: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(), currency: currency.trim().to_uppercase(),
            items: vec![], created_at: now, updated_at: now, events: vec![],
        }
    }

    pub fn id(&self) -> &str { &self.id }
    pub fn currency(&self) -> &str { &self.currency }
    pub fn items(&self) -> &[CartItem] { &self.items }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }
    pub fn line_count(&self) -> usize { self.items.len() }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }
    pub fn find(&self, line_id: &LineId) -> Option<&CartItem> { self.items.iter().find(|i| &i.id == line_id) }

    /// Sum of unit price times quantity over all lines.
    pub fn total(&self) -> Money {
        match self.try_total() {
            Ok(total) => total,
            Err(e) => {
                debug_assert!(false, "cart {} total out of range: {e}", self.id);
                error!(cart_id = %self.id, error = %e, "Cart total out of range");
                Money::zero(&self.currency)
            }
        }
    }

    /// Checked version of [`Cart::total`].
    pub fn try_total(&self) -> Result<Money, MoneyError> {
        self.total_with(None, None)
    }

    /// Total the cart would have if `line` held `replacement` instead; with
    /// no line given, `replacement` is counted as an extra line.
    fn total_with(&self, line: Option<&LineId>, replacement: Option<Money>) -> Result<Money, MoneyError> {
        let start = replacement.unwrap_or_else(|| Money::zero(&self.currency));
        self.items
            .iter()
            .filter(|i| Some(&i.id) != line)
            .try_fold(start, |acc, i| acc.add(&i.line_total()?))
    }

    /// Sum of quantities, used for the cart badge.
    pub fn item_count(&self) -> u32 {
        self.items.iter().fold(0u32, |acc, i| acc.saturating_add(i.quantity))
    }

    /// Adds `quantity` units of a product in the given size and color.
    ///
    /// An existing line with the same product, size and color is
    /// incremented; otherwise a new line is appended with the product's
    /// current price. Zero quantities, lines above [`MAX_LINE_QUANTITY`] and
    /// totals out of range are rejected and leave the cart untouched.
    pub fn add_item(&mut self, product: &Product, size: Option<&str>, color: Option<&str>, quantity: u32) -> Result<&CartItem, CartError> {
        if quantity == 0 { return Err(CartError::InvalidQuantity); }
        let price = product.validate()?;
        if price.currency() != self.currency {
            return Err(CartError::CurrencyMismatch { expected: self.currency.clone(), found: price.currency().to_string() });
        }

        let line_id = LineId::new(product.id.clone(), size, color);
        let existing = self.items.iter().position(|i| i.id == line_id);
        let (unit_price, new_quantity) = match existing {
            Some(index) => (self.items[index].unit_price.clone(), self.items[index].quantity.saturating_add(quantity)),
            None => (price.clone(), quantity),
        };
        if new_quantity > MAX_LINE_QUANTITY { return Err(CartError::QuantityLimit { max: MAX_LINE_QUANTITY }); }
        self.total_with(existing.map(|_| &line_id), Some(unit_price.multiply(new_quantity)?))?;

        let index = match existing {
            Some(index) => {
                self.items[index].quantity = new_quantity;
                index
            }
            None => {
                self.items.push(CartItem {
                    id: line_id.clone(),
                    product: product.clone(),
                    size: normalize_option(size),
                    color: normalize_option(color),
                    quantity,
                    unit_price,
                });
                self.items.len() - 1
            }
        };
        self.touch();
        self.raise_event(CartEvent::ItemAdded { line_id, quantity, merged: existing.is_some() });
        Ok(&self.items[index])
    }

    /// Sets the quantity of a line; zero removes it. Returns `Ok(false)` when
    /// no such line exists. Quantities above [`MAX_LINE_QUANTITY`] are
    /// rejected and leave the cart untouched.
    pub fn update_quantity(&mut self, line_id: &LineId, quantity: u32) -> Result<bool, CartError> {
        if quantity == 0 { return Ok(self.remove_item(line_id).is_some()); }
        if quantity > MAX_LINE_QUANTITY { return Err(CartError::QuantityLimit { max: MAX_LINE_QUANTITY }); }
        let Some(index) = self.items.iter().position(|i| &i.id == line_id) else { return Ok(false) };
        self.total_with(Some(line_id), Some(self.items[index].unit_price.multiply(quantity)?))?;

        let from = std::mem::replace(&mut self.items[index].quantity, quantity);
        self.touch();
        self.raise_event(CartEvent::QuantityChanged { line_id: line_id.clone(), from, to: quantity });
        Ok(true)
    }

    /// Removes a line. Unknown ids are ignored.
    pub fn remove_item(&mut self, line_id: &LineId) -> Option<CartItem> {
        let index = self.items.iter().position(|i| &i.id == line_id)?;
        let removed = self.items.remove(index);
        self.touch();
        self.raise_event(CartEvent::ItemRemoved { line_id: line_id.clone() });
        Some(removed)
    }

    pub fn clear(&mut self) {
        let lines = self.items.len();
        self.items.clear();
        self.touch();
        self.raise_event(CartEvent::Cleared { lines });
    }

    /// Whether a cart read back from storage still upholds the line
    /// invariants: unique ids matching their selection, quantities within
    /// limits, prices in range and in the cart currency, and a total that
    /// can be computed.
    pub fn is_consistent(&self) -> bool {
        let mut seen = HashSet::new();
        let lines_ok = self.items.iter().all(|i| {
            seen.insert(i.id.clone())
                && (1..=MAX_LINE_QUANTITY).contains(&i.quantity)
                && i.id == LineId::new(i.product.id.clone(), i.size.as_deref(), i.color.as_deref())
                && i.unit_price.currency() == self.currency
                && !i.unit_price.is_negative()
                && i.unit_price.amount() <= Decimal::from(MAX_UNIT_PRICE)
        });
        lines_ok && self.try_total().is_ok()
    }

    pub fn take_events(&mut self) -> Vec<CartEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: CartEvent) { self.events.push(e); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    #[error("Quantity must be at least 1")]
    InvalidQuantity,
    #[error("A line can hold at most {max} units")]
    QuantityLimit { max: u32 },
    #[error(transparent)]
    InvalidProduct(#[from] ProductError),
    #[error("Price is in {found} but the cart uses {expected}")]
    CurrencyMismatch { expected: String, found: String },
    #[error(transparent)]
    Amount(#[from] MoneyError),
    #[error("The cart is empty")]
    EmptyCart,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal::Decimal;

    fn product(id: &str, price: i64) -> Product {
        Product::new(id, format!("Product {id}"), Money::ars(Decimal::new(price, 0)))
    }

    #[test]
    fn test_cart_operations() {
        let mut cart = Cart::new("ARS");
        let a = product("A", 1000);
        cart.add_item(&a, Some("M"), Some("Negro"), 1).unwrap();
        cart.add_item(&a, Some("M"), Some("Negro"), 2).unwrap();
        assert_eq!(cart.line_count(), 1);
        assert_eq!(cart.items()[0].quantity, 3); // Merged
        assert_eq!(cart.total().amount(), Decimal::new(3000, 0));
        assert_eq!(cart.item_count(), 3);
    }

    #[test]
    fn test_different_size_or_color_is_a_new_line() {
        let mut cart = Cart::new("ARS");
        let a = product("A", 500);
        cart.add_item(&a, Some("S"), None, 1).unwrap();
        cart.add_item(&a, Some("M"), None, 1).unwrap();
        cart.add_item(&a, Some("M"), Some("Rojo"), 2).unwrap();
        assert_eq!(cart.line_count(), 3);
        assert_eq!(cart.item_count(), 4);
        assert_eq!(cart.total().amount(), Decimal::new(2000, 0));
        let sizes: Vec<_> = cart.items().iter().map(|i| i.size.as_deref()).collect();
        assert_eq!(sizes, vec![Some("S"), Some("M"), Some("M")]);
    }

    #[test]
    fn test_zero_quantity_add_is_rejected() {
        let mut cart = Cart::new("ARS");
        assert_eq!(cart.add_item(&product("A", 10), None, None, 0).unwrap_err(), CartError::InvalidQuantity);
        assert!(cart.is_empty());
        assert!(cart.take_events().is_empty());
    }

    #[test]
    fn test_malformed_product_is_rejected() {
        let mut cart = Cart::new("ARS");
        let mut p = product("A", 10);
        p.price = None;
        let err = cart.add_item(&p, None, None, 1).unwrap_err();
        assert!(matches!(err, CartError::InvalidProduct(ProductError::MissingPrice { .. })));
        assert_eq!(err.to_string(), "Product A has no price yet and cannot be added to the cart");
        assert!(cart.is_empty());
    }

    #[test]
    fn test_foreign_currency_is_rejected() {
        let mut cart = Cart::new("ARS");
        let p = Product::new("U", "Import", Money::new(Decimal::new(5, 0), "USD"));
        assert!(matches!(cart.add_item(&p, None, None, 1), Err(CartError::CurrencyMismatch { .. })));
    }

    #[test]
    fn test_price_is_snapshotted_at_add_time() {
        let mut cart = Cart::new("ARS");
        let mut a = product("A", 1000);
        cart.add_item(&a, None, None, 1).unwrap();
        a.price = Some(Money::ars(Decimal::new(5000, 0)));
        cart.add_item(&a, None, None, 1).unwrap();
        assert_eq!(cart.items()[0].unit_price.amount(), Decimal::new(1000, 0));
        assert_eq!(cart.total().amount(), Decimal::new(2000, 0));
    }

    #[test]
    fn test_update_quantity() {
        let mut cart = Cart::new("ARS");
        let id = cart.add_item(&product("A", 100), Some("L"), None, 1).unwrap().id.clone();
        assert!(cart.update_quantity(&id, 5).unwrap());
        assert_eq!(cart.total().amount(), Decimal::new(500, 0));
        assert!(cart.update_quantity(&id, 0).unwrap());
        assert!(cart.is_empty());
        assert!(!cart.update_quantity(&id, 3).unwrap());
        assert!(cart.is_empty());
    }

    #[test]
    fn test_quantity_limit_leaves_cart_unchanged() {
        let mut cart = Cart::new("ARS");
        let a = product("A", 100);
        let id = cart.add_item(&a, None, None, MAX_LINE_QUANTITY - 1).unwrap().id.clone();
        cart.take_events();

        let err = cart.add_item(&a, None, None, 2).unwrap_err();
        assert_eq!(err, CartError::QuantityLimit { max: MAX_LINE_QUANTITY });
        assert_eq!(cart.add_item(&a, None, None, u32::MAX).unwrap_err(), CartError::QuantityLimit { max: MAX_LINE_QUANTITY });
        assert_eq!(cart.update_quantity(&id, MAX_LINE_QUANTITY + 1).unwrap_err(), CartError::QuantityLimit { max: MAX_LINE_QUANTITY });
        assert_eq!(cart.items()[0].quantity, MAX_LINE_QUANTITY - 1);
        assert!(cart.take_events().is_empty());

        cart.add_item(&a, None, None, 1).unwrap();
        assert_eq!(cart.item_count(), MAX_LINE_QUANTITY);
    }

    #[test]
    fn test_largest_allowed_lines_keep_total_in_range() {
        let mut cart = Cart::new("ARS");
        for id in ["A", "B", "C"] {
            let p = Product::new(id, "Tapado", Money::ars(Decimal::from(MAX_UNIT_PRICE)));
            cart.add_item(&p, None, None, MAX_LINE_QUANTITY).unwrap();
        }
        let expected = Decimal::from(MAX_UNIT_PRICE) * Decimal::from(MAX_LINE_QUANTITY) * Decimal::from(3);
        assert_eq!(cart.try_total().unwrap().amount(), expected);
        assert_eq!(cart.total().amount(), expected);
    }

    #[test]
    fn test_out_of_range_snapshot_is_inconsistent() {
        let mut cart = Cart::new("ARS");
        cart.add_item(&product("A", 100), None, None, 2).unwrap();
        let mut json = serde_json::to_value(&cart).unwrap();
        json["items"][0]["unit_price"]["amount"] = serde_json::json!("50000000000000000000000000000");
        let tampered: Cart = serde_json::from_value(json).unwrap();
        assert!(tampered.try_total().is_err());
        assert!(!tampered.is_consistent());
    }

    #[test]
    fn test_remove_unknown_line_is_noop() {
        let mut cart = Cart::new("ARS");
        cart.add_item(&product("A", 100), None, None, 2).unwrap();
        let before = cart.items().to_vec();
        assert!(cart.remove_item(&LineId::new("missing", None, None)).is_none());
        assert_eq!(cart.items(), before.as_slice());
        assert_eq!(cart.total().amount(), Decimal::new(200, 0));
    }

    #[test]
    fn test_clear_zeroes_totals() {
        let mut cart = Cart::new("ARS");
        cart.add_item(&product("A", 100), None, None, 2).unwrap();
        cart.add_item(&product("B", 300), None, None, 1).unwrap();
        cart.clear();
        assert!(cart.total().is_zero());
        assert_eq!(cart.item_count(), 0);
    }

    #[test]
    fn test_events_are_recorded() {
        let mut cart = Cart::new("ARS");
        let id = cart.add_item(&product("A", 100), None, None, 1).unwrap().id.clone();
        cart.add_item(&product("A", 100), None, None, 1).unwrap();
        cart.update_quantity(&id, 4).unwrap();
        cart.clear();
        assert_eq!(cart.take_events(), vec![
            CartEvent::ItemAdded { line_id: id.clone(), quantity: 1, merged: false },
            CartEvent::ItemAdded { line_id: id.clone(), quantity: 1, merged: true },
            CartEvent::QuantityChanged { line_id: id, from: 2, to: 4 },
            CartEvent::Cleared { lines: 1 },
        ]);
        assert!(cart.take_events().is_empty());
    }

    #[test]
    fn test_consistency_check_catches_tampered_lines() {
        let mut cart = Cart::new("ARS");
        cart.add_item(&product("A", 100), Some("M"), None, 1).unwrap();
        assert!(cart.is_consistent());
        let mut json = serde_json::to_value(&cart).unwrap();
        json["items"][0]["quantity"] = serde_json::json!(0);
        let tampered: Cart = serde_json::from_value(json).unwrap();
        assert!(!tampered.is_consistent());
    }

    #[derive(Clone, Debug)]
    enum Op {
        Add { product: usize, size: usize, qty: u32 },
        Update { line: usize, qty: u32 },
        Remove { line: usize },
        Clear,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            4 => (0..3usize, 0..3usize, 0..5u32).prop_map(|(product, size, qty)| Op::Add { product, size, qty }),
            2 => (0..6usize, 0..5u32).prop_map(|(line, qty)| Op::Update { line, qty }),
            1 => (0..6usize).prop_map(|line| Op::Remove { line }),
            1 => Just(Op::Clear),
        ]
    }

    proptest! {
        #[test]
        fn prop_repeated_adds_merge_into_one_line(quantities in prop::collection::vec(1..50u32, 1..20)) {
            let mut cart = Cart::new("ARS");
            let a = product("A", 250);
            for q in &quantities {
                cart.add_item(&a, Some("M"), Some("Negro"), *q).unwrap();
            }
            let expected: u32 = quantities.iter().sum();
            prop_assert_eq!(cart.line_count(), 1);
            prop_assert_eq!(cart.items()[0].quantity, expected);
            prop_assert_eq!(cart.total().amount(), Decimal::from(expected) * Decimal::new(250, 0));
        }

        #[test]
        fn prop_totals_track_lines_after_every_mutation(ops in prop::collection::vec(op(), 0..40)) {
            let products = [product("A", 100), product("B", 1999), product("C", 0)];
            let sizes = [None, Some("S"), Some("M")];
            let mut cart = Cart::new("ARS");
            for op in ops {
                match op {
                    Op::Add { product, size, qty } => { let _ = cart.add_item(&products[product], sizes[size], None, qty); }
                    Op::Update { line, qty } => {
                        if let Some(id) = cart.items().get(line).map(|i| i.id.clone()) { cart.update_quantity(&id, qty).unwrap(); }
                    }
                    Op::Remove { line } => {
                        if let Some(id) = cart.items().get(line).map(|i| i.id.clone()) { cart.remove_item(&id); }
                    }
                    Op::Clear => cart.clear(),
                }
                let expected: Decimal = cart.items().iter().map(|i| i.unit_price.amount() * Decimal::from(i.quantity)).sum();
                let count: u32 = cart.items().iter().map(|i| i.quantity).sum();
                prop_assert_eq!(cart.total().amount(), expected);
                prop_assert_eq!(cart.item_count(), count);
                prop_assert!(cart.is_consistent());
            }
        }
    }
}
