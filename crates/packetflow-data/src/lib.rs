pub mod config;
pub mod loader;
pub mod schema;

pub use config::{ConfigError, load_network};
pub use loader::{DataLoadError, Format};
pub use schema::NetworkConfig;
