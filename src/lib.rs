//! JSON Schema draft 2019-09 compiler and validator.
//!
//! Two tightly coupled halves:
//! - [`compile`] turns a schema document (itself a JSON value) into an
//!   immutable tree with resolved `$ref` cross-links, or a list of parser
//!   errors.
//! - [`validate`] interprets that tree against an instance and reports every
//!   violation with a JSON-pointer location.
//!
//! Out of scope: remote `$ref` fetching, `format` assertions,
//! content-encoding keywords, unevaluated-items/properties tracking, and
//! dialects other than 2019-09.

pub mod compile;
pub mod errors;
pub mod load;
pub mod matcher;
pub mod node;
pub mod resolve;
pub mod validate;

pub use compile::compile;
pub use errors::ValidationResult;
pub use load::{load_from_file, load_from_reader};
pub use node::{InstanceType, NodeId, Schema, SchemaNode};
pub use validate::validate;
