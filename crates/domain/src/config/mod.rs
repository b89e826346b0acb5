mod errors;
mod logging;
mod root;

pub use errors::ConfigError;
pub use logging::LoggingConfig;
pub use root::{CacheConfig, CliOverrides, Config};
