// Refresh-credential encryption
pub mod credentials;

// Signed session tokens
pub mod session;

// File and environment configuration
pub mod config;

// HTTP APIs
pub mod api;

pub use api::{create_router, AppState};
pub use config::{AppConfig, Secrets};
