// Gigantier SDK - Library root

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod executor;
pub mod models;
pub mod storage;
pub mod transport;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use client::SessionClient;
pub use config::Config;
pub use error::{ApiError, Result};
pub use models::ApiResponse;
