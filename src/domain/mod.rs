//! Cart domain: products, lines and the cart aggregate.
pub mod aggregates;
pub mod events;
pub mod value_objects;

pub use aggregates::{Cart, CartError, CartItem, Product, ProductError, MAX_LINE_QUANTITY, MAX_UNIT_PRICE};
pub use events::CartEvent;
pub use value_objects::{LineId, LineIdError, Money, MoneyError};
