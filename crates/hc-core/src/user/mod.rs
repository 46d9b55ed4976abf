//! User conversation state module
//!
//! Provides the per-sender intake state and its SQLite persistence.

mod store;
mod types;

pub use store::UserStore;
pub use types::{GeoPoint, Service, Step, UserState};
