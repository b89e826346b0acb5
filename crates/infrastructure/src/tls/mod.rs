mod config_cache;

pub use config_cache::TlsConfigCache;
