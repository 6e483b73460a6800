//! Database layer: backend pools, statement execution, type handling.

pub mod executor;
pub mod pool;
pub mod types;

pub use executor::ExecOutcome;
pub use pool::{Backend, DbPool};
pub use types::TypeCategory;
