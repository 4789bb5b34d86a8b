//! HTTP surface for KeyProofs.
//!
//! This crate wires the resolvers, runner and cache into an axum
//! application:
//! - identity pages with progressive rendering
//! - QR, DNS and vCard helper endpoints
//! - avatar and WKD file serving with hashed symlink trees
//! - HKP key submission

pub mod assemble;
pub mod error;
pub mod handlers;
pub mod links;
pub mod render;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
