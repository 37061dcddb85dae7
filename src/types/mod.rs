//! Core request/response types shared by every layer.

pub mod request;
pub mod response;

pub use request::{CacheOptions, Request};
pub use response::Response;
