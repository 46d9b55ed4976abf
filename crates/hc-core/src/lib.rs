//! hc-core: HealthConnect Gateway Core Library
//!
//! Shared configuration, error types, and per-user conversation state
//! for the WhatsApp intake gateway.

pub mod config;
pub mod error;
pub mod user;

pub use config::{Config, ServerConfig, StoreConfig, WhatsAppConfig};
pub use error::{Error, Result};
pub use user::{GeoPoint, Service, Step, UserState, UserStore};
