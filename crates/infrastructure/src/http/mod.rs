mod one_shot;
pub mod request_engine;

pub use one_shot::send_request;
pub use request_engine::{RequestEngine, RequestEngineError};
