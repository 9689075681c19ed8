//! # Utility Modules
//!
//! Supporting utilities used throughout the framework.
//!
//! ## Components
//! - **Logging**: structured logging configuration via `tracing-subscriber`

pub mod logging;
