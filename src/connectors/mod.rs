// Storage backends
pub mod connector_trait;
pub mod mock_connector;
pub mod postgres_connector;

pub use connector_trait::*;
pub use mock_connector::*;
pub use postgres_connector::*;
