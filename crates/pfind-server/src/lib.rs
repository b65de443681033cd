//! HTTP surface for pfind

pub mod rest;
pub mod types;

pub use rest::{AppError, AppState, IDENTITY_HEADER, create_router, serve};
pub use types::*;
