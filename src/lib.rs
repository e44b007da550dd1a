//! Chat Relay
//!
//! Forwards chat messages from a front end to one of several conversational AI
//! backends, normalizes their streaming replies, and reports balance and proxy
//! configuration.

pub mod api;
pub mod backend;
pub mod config;
pub mod error;
pub mod relay;

pub use error::{AppError, Result};

use std::sync::Arc;

use relay::Relay;

/// Application state shared across all handlers
pub struct AppState {
    pub settings: Arc<config::Settings>,
    pub relay: Arc<Relay>,
}

impl AppState {
    pub fn new(settings: config::Settings, relay: Relay) -> Self {
        Self {
            settings: Arc::new(settings),
            relay: Arc::new(relay),
        }
    }
}
