//! Catalog product as seen by the cart.
//!
//! Products are fetched by the catalog collaborator and handed to the cart
//! as plain values. Records coming from the hosted backend may be
//! incomplete, so the price is optional on the wire and checked by
//! [`Product::validate`] before anything is added to a cart.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use crate::domain::value_objects::Money;

/// Highest unit price accepted from the catalog, in whole currency units.
pub const MAX_UNIT_PRICE: i64 = 1_000_000_000_000;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub price: Option<Money>,
    #[serde(default)]
    pub sizes: Vec<String>,
    #[serde(default)]
    pub colors: Vec<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub product_type: Option<String>,
}

impl Product {
    pub fn new(id: impl Into<String>, name: impl Into<String>, price: Money) -> Self {
        Self {
            id: id.into(), name: name.into(), price: Some(price),
            sizes: vec![], colors: vec![], image_url: None, category: None, product_type: None,
        }
    }

    pub fn with_sizes<I, S>(mut self, sizes: I) -> Self where I: IntoIterator<Item = S>, S: Into<String> {
        self.sizes = sizes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_colors<I, S>(mut self, colors: I) -> Self where I: IntoIterator<Item = S>, S: Into<String> {
        self.colors = colors.into_iter().map(Into::into).collect();
        self
    }

    /// Checks that the record can be sold and returns its price.
    pub fn validate(&self) -> Result<&Money, ProductError> {
        if self.id.trim().is_empty() { return Err(ProductError::MissingId); }
        if self.name.trim().is_empty() { return Err(ProductError::MissingName { id: self.id.clone() }); }
        let price = self.price.as_ref().ok_or_else(|| ProductError::MissingPrice { name: self.name.clone() })?;
        if price.is_negative() { return Err(ProductError::NegativePrice { name: self.name.clone() }); }
        if price.amount() > Decimal::from(MAX_UNIT_PRICE) { return Err(ProductError::PriceTooHigh { name: self.name.clone() }); }
        Ok(price)
    }
}

/// Reasons a catalog record cannot be added to a cart. The messages are
/// shown to shoppers as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProductError {
    #[error("This product is no longer available")]
    MissingId,
    #[error("Product {id} has no name and cannot be added to the cart")]
    MissingName { id: String },
    #[error("{name} has no price yet and cannot be added to the cart")]
    MissingPrice { name: String },
    #[error("{name} has an invalid price and cannot be added to the cart")]
    NegativePrice { name: String },
    #[error("{name} has an invalid price and cannot be added to the cart")]
    PriceTooHigh { name: String },
}
