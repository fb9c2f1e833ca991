pub mod contracts;
pub mod http;
