//! REST API handlers organized by domain.

pub mod auth;
pub mod bills;
pub mod citizens;
pub mod complaints;
pub mod health;
pub mod officers;

pub use auth::*;
pub use bills::*;
pub use citizens::*;
pub use complaints::*;
pub use health::*;
pub use officers::*;
