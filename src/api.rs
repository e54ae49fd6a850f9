//! JSON API hosting one cart store per shopper session.
//!
//! Line ids travel as a single path segment, so clients percent-encode
//! the id text once more when building the URL.

use axum::{extract::{Path, State}, http::StatusCode, routing::{get, post, put}, Json, Router};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, TryLockError};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::warn;
use uuid::Uuid;
use validator::Validate;

use crate::checkout::OrderSummary;
use crate::config::StorefrontConfig;
use crate::domain::{CartError, CartItem, LineId, Money, Product};
use crate::storage::{CartStorage, FileStorage};
use crate::store::CartStore;
use crate::StorefrontError;

const MAX_SESSION_ID_LEN: usize = 64;

pub type SharedStorage = Arc<dyn CartStorage + Send + Sync>;
type SessionStore = CartStore<SharedStorage>;
/// A session's store, opened by the first request that locks it.
type Slot = Arc<Mutex<Option<SessionStore>>>;
type ApiResult<T> = Result<T, (StatusCode, String)>;

#[derive(Clone)]
pub struct AppState { pub config: Arc<StorefrontConfig>, storage: SharedStorage, sessions: Arc<Mutex<HashMap<String, Slot>>> }

impl AppState {
    pub fn new(config: StorefrontConfig, storage: SharedStorage) -> Self {
        Self { config: Arc::new(config), storage, sessions: Arc::new(Mutex::new(HashMap::new())) }
    }

    /// State backed by file storage in the configured directory.
    pub fn from_config(config: StorefrontConfig) -> crate::Result<Self> {
        let storage = FileStorage::new(&config.storage_dir)?;
        Ok(Self::new(config, Arc::new(storage)))
    }

    /// Number of session stores currently held in memory.
    pub fn open_sessions(&self) -> usize {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Runs `f` against the session's store on the blocking pool. Requests
    /// for one session are serialized in arrival order; other sessions are
    /// not held up.
    async fn with_store<T, F>(&self, session: &str, f: F) -> crate::Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut SessionStore) -> crate::Result<T> + Send + 'static,
    {
        validate_session(session)?;
        let state = self.clone();
        let session = session.to_string();
        tokio::task::spawn_blocking(move || state.run(&session, f)).await.unwrap_or_else(|e| {
            warn!(error = %e, "Cart request aborted");
            Err(StorefrontError::StateUnavailable)
        })
    }

    fn run<T>(&self, session: &str, f: impl FnOnce(&mut SessionStore) -> crate::Result<T>) -> crate::Result<T> {
        let lease = Lease { state: self, session, slot: self.slot(session) };
        let mut guard = lease.slot.lock().unwrap_or_else(|poisoned| {
            // A request panicked mid-way; start over from the persisted cart.
            warn!(session = %session, "Reopening cart after an aborted request");
            let mut guard = poisoned.into_inner();
            *guard = None;
            lease.slot.clear_poison();
            guard
        });
        let store = guard.get_or_insert_with(|| self.open_store(session));
        f(store)
    }

    fn slot(&self, session: &str) -> Slot {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        sessions.entry(session.to_string()).or_default().clone()
    }

    fn open_store(&self, session: &str) -> SessionStore {
        CartStore::open(self.storage.clone(), format!("{}:{}", self.config.storage_key, session), &self.config.currency)
    }

    /// Drops the session's store once no request is using it. Every
    /// mutation is already persisted, so the next request reopens it from
    /// storage. Degraded stores hold the only copy of their cart and stay.
    fn release(&self, session: &str, slot: &Slot) {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        // One reference in the map, one held by the caller.
        if Arc::strong_count(slot) > 2 || !sessions.get(session).is_some_and(|held| Arc::ptr_eq(held, slot)) {
            return;
        }
        let keep = match slot.try_lock() {
            Ok(store) => store.as_ref().is_some_and(|store| store.is_degraded()),
            Err(TryLockError::WouldBlock) => true,
            Err(TryLockError::Poisoned(_)) => false,
        };
        if !keep { sessions.remove(session); }
    }
}

/// Releases the session slot when the request finishes, including by
/// unwinding.
struct Lease<'a> { state: &'a AppState, session: &'a str, slot: Slot }

impl Drop for Lease<'_> {
    fn drop(&mut self) { self.state.release(self.session, &self.slot); }
}

fn validate_session(session: &str) -> crate::Result<()> {
    let valid = !session.is_empty()
        && session.len() <= MAX_SESSION_ID_LEN
        && session.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid { Ok(()) } else { Err(StorefrontError::InvalidSession) }
}

fn error_response(e: StorefrontError) -> (StatusCode, String) {
    let status = match &e {
        StorefrontError::Cart(_) | StorefrontError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        StorefrontError::LineId(_) | StorefrontError::InvalidSession => StatusCode::BAD_REQUEST,
        StorefrontError::LineNotFound => StatusCode::NOT_FOUND,
        StorefrontError::Storage(_) | StorefrontError::StateUnavailable => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, e.to_string())
}

fn parse_line(line: &str) -> ApiResult<LineId> {
    line.parse::<LineId>().map_err(|e| error_response(e.into()))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "boutique-storefront"})) }))
        .route("/api/v1/cart", post(create_session))
        .route("/api/v1/cart/:session", get(get_cart).delete(clear_cart))
        .route("/api/v1/cart/:session/items", post(add_item))
        .route("/api/v1/cart/:session/items/:line", put(update_item).delete(remove_item))
        .route("/api/v1/cart/:session/checkout", post(checkout))
        .layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()).with_state(state)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CartView { pub items: Vec<CartLineView>, pub total: Money, pub total_formatted: String, pub item_count: u32, pub line_count: usize, pub degraded: bool }

#[derive(Debug, Serialize, Deserialize)]
pub struct CartLineView {
    pub line_id: String, pub product_id: String, pub name: String, pub image_url: Option<String>,
    pub size: Option<String>, pub color: Option<String>, pub quantity: u32,
    pub unit_price: Money, pub line_total: Money, pub line_total_formatted: String,
}

impl TryFrom<&CartItem> for CartLineView {
    type Error = CartError;

    fn try_from(i: &CartItem) -> Result<Self, CartError> {
        let line_total = i.line_total()?;
        Ok(Self {
            line_id: i.id.to_string(), product_id: i.product.id.clone(), name: i.product.name.clone(), image_url: i.product.image_url.clone(),
            size: i.size.clone(), color: i.color.clone(), quantity: i.quantity,
            unit_price: i.unit_price.clone(), line_total_formatted: line_total.format_whole(), line_total,
        })
    }
}

impl CartView {
    pub fn from_store<S: CartStorage>(store: &CartStore<S>) -> Result<Self, CartError> {
        let total = store.cart().try_total()?;
        Ok(Self {
            items: store.items().iter().map(CartLineView::try_from).collect::<Result<_, _>>()?,
            total_formatted: total.format_whole(), total,
            item_count: store.item_count(), line_count: store.items().len(), degraded: store.is_degraded(),
        })
    }
}

#[derive(Debug, Serialize, Deserialize)] pub struct SessionCreated { pub session_id: Uuid }

#[derive(Debug, Deserialize, Validate)]
pub struct AddItemRequest {
    pub product: Product,
    #[validate(length(max = 32))] pub size: Option<String>,
    #[validate(length(max = 32))] pub color: Option<String>,
    #[serde(default = "default_quantity")] #[validate(range(min = 1, max = 999))] pub quantity: u32,
}

fn default_quantity() -> u32 { 1 }

#[derive(Debug, Deserialize)] pub struct UpdateQuantityRequest { pub quantity: i64 }

async fn create_session() -> (StatusCode, Json<SessionCreated>) {
    (StatusCode::CREATED, Json(SessionCreated { session_id: Uuid::new_v4() }))
}

async fn get_cart(State(s): State<AppState>, Path(session): Path<String>) -> ApiResult<Json<CartView>> {
    s.with_store(&session, |store| Ok(CartView::from_store(store)?)).await.map(Json).map_err(error_response)
}

async fn add_item(State(s): State<AppState>, Path(session): Path<String>, Json(r): Json<AddItemRequest>) -> ApiResult<(StatusCode, Json<CartView>)> {
    r.validate().map_err(|e| error_response(StorefrontError::Validation(e.to_string())))?;
    let view = s.with_store(&session, move |store| {
        store.add_item(&r.product, r.size.as_deref(), r.color.as_deref(), r.quantity)?;
        Ok(CartView::from_store(store)?)
    }).await.map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(view)))
}

async fn update_item(State(s): State<AppState>, Path((session, line)): Path<(String, String)>, Json(r): Json<UpdateQuantityRequest>) -> ApiResult<Json<CartView>> {
    let line_id = parse_line(&line)?;
    s.with_store(&session, move |store| {
        if !store.update_quantity(&line_id, r.quantity)? { return Err(StorefrontError::LineNotFound); }
        Ok(CartView::from_store(store)?)
    }).await.map(Json).map_err(error_response)
}

async fn remove_item(State(s): State<AppState>, Path((session, line)): Path<(String, String)>) -> ApiResult<Json<CartView>> {
    let line_id = parse_line(&line)?;
    s.with_store(&session, move |store| {
        store.remove_item(&line_id);
        Ok(CartView::from_store(store)?)
    }).await.map(Json).map_err(error_response)
}

async fn clear_cart(State(s): State<AppState>, Path(session): Path<String>) -> ApiResult<StatusCode> {
    s.with_store(&session, |store| { store.clear(); Ok(StatusCode::NO_CONTENT) }).await.map_err(error_response)
}

async fn checkout(State(s): State<AppState>, Path(session): Path<String>) -> ApiResult<Json<OrderSummary>> {
    let settings = s.config.checkout.clone();
    s.with_store(&session, move |store| Ok(store.checkout(&settings)?)).await.map(Json).map_err(error_response)
}
