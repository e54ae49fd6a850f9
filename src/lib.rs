//! Boutique Storefront
//!
//! Cart and checkout core for a lingerie catalog that takes orders over
//! WhatsApp.
//!
//! ## Features
//! - Session cart with size/color line merging and price snapshots
//! - Cart persistence with in-memory fallback
//! - Order text formatting and WhatsApp deep links
//! - JSON API hosting one cart per session

pub mod api;
pub mod checkout;
pub mod config;
pub mod domain;
pub mod storage;
pub mod store;

use thiserror::Error;

pub use checkout::{CheckoutSettings, OrderSummary};
pub use config::StorefrontConfig;
pub use domain::{Cart, CartItem, LineId, Money, Product};
pub use storage::{CartStorage, FileStorage, MemoryStorage};
pub use store::CartStore;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum StorefrontError {
    #[error(transparent)]
    Cart(#[from] domain::CartError),

    #[error(transparent)]
    LineId(#[from] domain::LineIdError),

    #[error("Line not found")]
    LineNotFound,

    #[error("Invalid session id")]
    InvalidSession,

    #[error(transparent)]
    Storage(#[from] storage::StorageError),

    #[error("{0}")]
    Validation(String),

    #[error("Cart state unavailable")]
    StateUnavailable,
}

pub type Result<T> = std::result::Result<T, StorefrontError>;
