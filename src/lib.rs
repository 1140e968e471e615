pub mod engine;
pub mod connectors;
pub mod schema;
pub mod cli;
pub mod utils;

pub use engine::*;
pub use connectors::*;
pub use schema::*;
pub use cli::*;
pub use utils::*;
