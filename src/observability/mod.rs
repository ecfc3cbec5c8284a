//! # Observability
//!
//! - `logging`: `tracing` subscriber setup (text or JSON)

pub mod logging;

pub use logging::init_logging;
