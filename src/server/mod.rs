mod routes;
mod server;
mod types;

// Re-export from server
pub use server::ApiServer;
// Re-export from types
pub use types::{ApiResponse, Query, StatusResponse};
