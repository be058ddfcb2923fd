// Relay daemon functionality:
// - HTTP server exposing the session exchange endpoint
// - Session cookie handling
// - Daemon configuration

// Export config module - Daemon configuration
pub mod config;

// Export http_server module - HTTP server and exchange endpoint
pub mod http_server;

// Export session module - Session cookie handling
pub mod session;
