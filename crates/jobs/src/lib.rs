pub mod cache_writeback;

pub use cache_writeback::CacheWriteBackJob;
