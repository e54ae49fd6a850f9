//! Aggregates module
pub mod product;
pub mod cart;

pub use product::{Product, ProductError, MAX_UNIT_PRICE};
pub use cart::{Cart, CartError, CartItem, MAX_LINE_QUANTITY};
