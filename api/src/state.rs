//! Shared application state.

use std::sync::Arc;

use subtle::ConstantTimeEq;

use crate::auth::SessionValidator;
use crate::config::ServerConfig;
use crate::ws::Gateway;

/// State shared by every route.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The realtime gateway.
    pub gateway: Gateway,

    /// Shared secret required on `POST /events`, if any.
    pub internal_key: Option<Arc<str>>,
}

impl AppState {
    /// Creates state around a gateway with open event ingestion.
    #[must_use]
    pub fn new(gateway: Gateway) -> Self {
        Self {
            gateway,
            internal_key: None,
        }
    }

    /// Builds the state described by `config`.
    #[must_use]
    pub fn from_config(config: &ServerConfig, validator: Arc<dyn SessionValidator>) -> Self {
        let gateway = Gateway::new(validator).with_outbound_buffer(config.outbound_buffer);
        let state = Self::new(gateway);
        match &config.internal_key {
            Some(key) => state.with_internal_key(key.as_str()),
            None => state,
        }
    }

    /// Requires `key` on event ingestion.
    #[must_use]
    pub fn with_internal_key(mut self, key: impl Into<Arc<str>>) -> Self {
        self.internal_key = Some(key.into());
        self
    }

    /// Returns true if `presented` may ingest events.
    ///
    /// The key is compared in constant time.
    #[must_use]
    pub fn may_ingest(&self, presented: Option<&str>) -> bool {
        match (&self.internal_key, presented) {
            (None, _) => true,
            (Some(key), Some(presented)) => bool::from(presented.as_bytes().ct_eq(key.as_bytes())),
            (Some(_), None) => false,
        }
    }
}
