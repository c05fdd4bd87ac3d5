//! Throttling gate for authentication attempts.
//!
//! Attempts are counted per ip, login and password in sliding windows;
//! operators can permanently allow or block networks through white and
//! black lists.

pub mod bucket;
pub mod config;
pub mod counter_store;
pub mod database;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod lists;
pub mod network;
pub mod types;

pub use engine::Engine;
pub use error::{CounterError, EngineError, StoreError};
pub use types::{AppState, Attempt, Limits, ListEntry, ListKind, User};
