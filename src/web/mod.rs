//! Web API module for PESOS.
//!
//! This module provides a thin REST API for triggering synchronization runs,
//! polling their status and reading stored items.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod server;

pub use error::ApiError;
pub use handlers::AppState;
pub use router::create_router;
pub use server::WebServer;
