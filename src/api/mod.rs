//! HTTP API for the complaint desk
//!
//! JSON over REST, mounted under `/api`. Errors use the structured body in
//! [`error`].

pub mod auth_helpers;
pub mod error;
pub mod handlers;
mod rest;
pub mod types;
pub mod utils;

pub use error::{ApiError, ErrorCode};
pub use rest::*;
