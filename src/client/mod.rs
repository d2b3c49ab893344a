//! Client core
//!
//! Everything a front-end needs apart from rendering: the session built once
//! from the stored token, the route guard and navigation, a typed API client
//! and per-page view state. Views talk to the backend only through
//! [`CivicApi`], so they can be driven by [`HttpCivicApi`] or a test double.
//!
//! ```text
//! TokenStore ──► SessionContext ──► guard(route) ──► view ──► CivicApi
//! ```

pub mod api;
pub mod auth;
pub mod bills;
pub mod complaints;
pub mod guard;
pub mod leaderboard;
pub mod mutation;
pub mod navigation;
pub mod session;

pub use api::{CivicApi, ClientError, ComplaintSubmission, HttpCivicApi, ImageUpload};
pub use bills::{BillPaymentView, CheckoutCompletion, HostedCheckout};
pub use guard::{guard, guard_path, GuardOutcome, Route};
pub use mutation::{Mutation, MutationState};
pub use navigation::{nav_items, NavItem};
pub use session::{decode_identity, Identity, MemoryTokenStore, SessionContext, TokenStore};
