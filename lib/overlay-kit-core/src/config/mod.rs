mod config;
mod config_serializer;

pub use config::{Config, ConfigError};
pub use config_serializer::serialize_config;
