//! OS-family initialization over SSH
//!
//! This module handles:
//! - Registering initializers per OS family at startup
//! - Dispatching a freshly connected device to its initializer
//! - Built-in initializers for common families

mod dispatcher;
pub mod handlers;

pub use dispatcher::{DispatchOutcome, InitializerRegistry, OsInitializer};
