// Data models for the API envelope

pub mod response;

pub use response::{ApiResponse, RawResponse};
