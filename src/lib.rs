pub mod api;
pub mod blockchain;
pub mod cache;
pub mod config;
pub mod db;
pub mod decoder;
pub mod models;
pub mod network;
pub mod resolver;
pub mod state;
pub mod trackers;
pub mod validation;

#[cfg(test)]
pub mod tests;

// Re-export specific items for convenience
pub use api::error::ApiError;
pub use api::response::ApiResponse;
pub use api::route::create_router;
pub use db::connection;
pub use decoder::{decode, decode_base64, DecodeResult};
pub use network::{NetworkRegistry, NetworkServices};
