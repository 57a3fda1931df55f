//! Shared application state.

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use domain::OrderService;
use realtime::{Identity, RealtimeHub, TokenVerifier, bearer_token};
use store::OrderStore;

/// Shared application state accessible from all handlers.
pub struct AppState<S: OrderStore> {
    pub orders: OrderService<S, RealtimeHub>,
    pub hub: RealtimeHub,
    pub tokens: TokenVerifier,
}

impl<S: OrderStore> AppState<S> {
    /// Identity carried by an `Authorization: Bearer` header, or a guest.
    pub fn identify(&self, headers: &HeaderMap) -> Identity {
        self.tokens.identify(header_token(headers))
    }
}

pub(crate) fn header_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_token)
}
