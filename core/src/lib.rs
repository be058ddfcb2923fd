// Core ChatKit API functionality:
// - API client for the sessions endpoint
// - Request/response data structures
// - Configuration loading
// - Shared error types

// Export client module - API client for ChatKit sessions
pub mod client;
pub use client::*;

// Export types module - Request/response data structures
pub mod types;
pub use types::*;

// Export config module - Configuration loading
pub mod config;
pub use config::*;

// Export errors module - Shared error types
pub mod errors;
pub use errors::*;
