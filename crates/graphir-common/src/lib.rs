//! # graphir-common
//!
//! Foundation layer for Graphir: literal values and error types.
//!
//! This crate provides the building blocks shared by the other Graphir
//! crates. It has no internal dependencies and should be kept minimal.
//!
//! ## Modules
//!
//! - [`types`] - Core type definitions ([`Value`])
//! - [`utils`] - Utility functions and helpers (errors)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod types;
pub mod utils;

// Re-export commonly used types at crate root
pub use types::Value;
pub use utils::error::{Error, LoweringError, Result};
