pub mod builder;
pub mod ids;
pub mod program;

pub use builder::ProgramBuilder;
pub use ids::{BlockId, VariableId};
pub use program::*;
