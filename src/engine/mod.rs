// Core engine components
pub mod query_validator;
pub mod query_compiler;
pub mod query_executor;
pub mod result_store;
pub mod engine;

pub use query_validator::validate;
pub use query_compiler::{compile, render_value};
pub use query_executor::*;
pub use result_store::*;
pub use engine::*;
