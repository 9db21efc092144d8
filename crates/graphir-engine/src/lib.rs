//! # graphir-engine
//!
//! Lowers graph traversal step trees into linear operator programs for an
//! execution engine, and decodes the engine's results.
//!
//! ## Modules
//!
//! - [`query`] - Step trees, expression extraction, lowering rules and the operator IR
//! - [`config`] - Lowering options
//! - [`result`] - Engine result decoding
//!
//! ```
//! use graphir_engine::query::{Traversal, lower};
//!
//! let traversal = Traversal::identity().v(Vec::new()).out(&["knows"]).count();
//! let program = lower(&traversal).unwrap();
//! assert_eq!(program.len(), 3);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod query;
pub mod result;

pub use config::{LoweringConfig, ModulatorPolicy};
pub use query::{OperatorProgram, Traversal, lower, lower_with_config};
pub use result::{QueryResult, ResultDecoder, TagTable};
