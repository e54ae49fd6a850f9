//! Cart store: the single owner of a shopper's cart.
//!
//! Every mutation goes through [`CartStore`], which applies it to the
//! [`Cart`] aggregate, logs the resulting events and writes a snapshot to
//! the storage backend. A failed write never fails the mutation; the store
//! keeps working in memory and reports itself as degraded until a later
//! write succeeds.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use crate::checkout::{self, CheckoutSettings, OrderSummary};
use crate::domain::{Cart, CartError, CartItem, LineId, Money, Product};
use crate::storage::{CartStorage, StorageError};

pub const DEFAULT_STORAGE_KEY: &str = "cart-storage";
const SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize)]
struct SnapshotRef<'a> { version: u32, cart: &'a Cart }

#[derive(Deserialize)]
struct Snapshot { version: u32, cart: Cart }

pub struct CartStore<S: CartStorage> {
    cart: Cart,
    storage: S,
    key: String,
    degraded: bool,
}

impl<S: CartStorage> CartStore<S> {
    /// Opens the cart persisted under `key`, or an empty one in `currency`.
    ///
    /// Snapshots that cannot be read back (corrupt JSON, another format
    /// version, broken line invariants, a different currency) are dropped
    /// with a warning.
    pub fn open(storage: S, key: impl Into<String>, currency: &str) -> Self {
        let key = key.into();
        let (cart, degraded) = match storage.load(&key) {
            Ok(Some(raw)) => (restore(&key, &raw, currency).unwrap_or_else(|| Cart::new(currency)), false),
            Ok(None) => (Cart::new(currency), false),
            Err(e) => {
                warn!(key = %key, error = %e, "Cart storage unavailable, keeping cart in memory");
                (Cart::new(currency), true)
            }
        };
        Self { cart, storage, key, degraded }
    }

    pub fn cart(&self) -> &Cart { &self.cart }
    pub fn items(&self) -> &[CartItem] { self.cart.items() }
    pub fn total(&self) -> Money { self.cart.total() }
    pub fn item_count(&self) -> u32 { self.cart.item_count() }
    pub fn key(&self) -> &str { &self.key }
    /// True while the last storage access failed.
    pub fn is_degraded(&self) -> bool { self.degraded }

    pub fn add_item(&mut self, product: &Product, size: Option<&str>, color: Option<&str>, quantity: u32) -> Result<CartItem, CartError> {
        let item = match self.cart.add_item(product, size, color, quantity) {
            Ok(item) => item.clone(),
            Err(e) => {
                debug!(key = %self.key, product_id = %product.id, error = %e, "Add to cart rejected");
                return Err(e);
            }
        };
        self.commit();
        Ok(item)
    }

    /// Sets a line's quantity; zero or negative removes the line. Returns
    /// `false` if the line does not exist. Quantities over the line limit
    /// are refused and leave the cart as it was.
    pub fn update_quantity(&mut self, line_id: &LineId, quantity: i64) -> Result<bool, CartError> {
        let quantity = u32::try_from(quantity.max(0)).unwrap_or(u32::MAX);
        let changed = self.cart.update_quantity(line_id, quantity)?;
        if changed { self.commit(); }
        Ok(changed)
    }

    pub fn remove_item(&mut self, line_id: &LineId) -> Option<CartItem> {
        let removed = self.cart.remove_item(line_id);
        if removed.is_some() { self.commit(); }
        removed
    }

    pub fn clear(&mut self) {
        self.cart.clear();
        self.commit();
    }

    /// Builds the order summary and empties the cart.
    pub fn checkout(&mut self, settings: &CheckoutSettings) -> Result<OrderSummary, CartError> {
        let summary = checkout::summarize(&self.cart, settings)?;
        info!(key = %self.key, items = summary.item_count, total = %summary.total, "Order handed off to WhatsApp");
        self.clear();
        Ok(summary)
    }

    fn commit(&mut self) {
        for event in self.cart.take_events() {
            debug!(key = %self.key, ?event, "Cart event");
        }
        match self.persist() {
            Ok(()) if self.degraded => {
                info!(key = %self.key, "Cart storage available again");
                self.degraded = false;
            }
            Ok(()) => {}
            Err(e) => {
                if !self.degraded {
                    warn!(key = %self.key, error = %e, "Failed to persist cart, keeping it in memory");
                }
                self.degraded = true;
            }
        }
    }

    fn persist(&self) -> Result<(), StorageError> {
        let raw = serde_json::to_string(&SnapshotRef { version: SNAPSHOT_VERSION, cart: &self.cart })?;
        self.storage.save(&self.key, &raw)
    }
}

fn restore(key: &str, raw: &str, currency: &str) -> Option<Cart> {
    let snapshot: Snapshot = match serde_json::from_str(raw) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            warn!(key = %key, error = %e, "Discarding unreadable cart snapshot");
            return None;
        }
    };
    if snapshot.version != SNAPSHOT_VERSION {
        warn!(key = %key, version = snapshot.version, "Discarding cart snapshot from another format version");
        return None;
    }
    if !snapshot.cart.currency().eq_ignore_ascii_case(currency.trim()) || !snapshot.cart.is_consistent() {
        warn!(key = %key, "Discarding inconsistent cart snapshot");
        return None;
    }
    Some(snapshot.cart)
}
