//! Reader for the textual listing format of the control-flow-graph IR.
//!
//! ```
//! let program = ir_listing::parse("$start:\n  return\n").unwrap();
//! assert_eq!(1, program.basic_block_count());
//! ```

pub mod error;
pub mod ir;
pub mod parser;
pub mod span;

pub use error::ListingError;
pub use ir::Program;
pub use parser::parse;
pub use span::{Location, locate};
