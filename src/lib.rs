//! civic-desk library
//!
//! Citizen complaint desk: complaints with photo and location, officer
//! assignment and resolution, citizen verification, an officer leaderboard
//! and municipal bill payments.
//!
//! ## Modules
//!
//! - [`domain`] - Core domain types (complaints, accounts, bills, scoring, wards)
//! - [`infra`] - Infrastructure implementations (SQLite stores, gateway, uploads)
//! - [`auth`] - Authentication (JWT, passwords, OTP) and role authorization
//! - [`api`] - REST API routes
//! - [`client`] - Typed client core: session, route guard, views, bill payment
//! - [`telemetry`] - Logging setup

pub mod api;
pub mod auth;
pub mod client;
pub mod domain;
pub mod infra;
pub mod migrations;
pub mod seed;
pub mod server;
pub mod telemetry;

// Re-export commonly used types
pub use domain::{
    Bill, Complaint, ComplaintId, ComplaintStatus, LeaderboardEntry, OfficerId, Principal, Role,
    UserId,
};

pub use infra::{DeskError, Result};
