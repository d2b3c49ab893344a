//! Infrastructure layer for the complaint desk
//!
//! Contains:
//! - SQLite stores (accounts, OTP, catalog, complaints, ledger, bills)
//! - Payment gateways and signature verification
//! - Uploaded image storage
//! - The background SLA sweep
//! - Graceful shutdown

mod error;
mod graceful_shutdown;
mod payment;
mod sla_sweep;
pub mod sqlite;
mod uploads;

pub use error::*;
pub use graceful_shutdown::{
    serve_with_shutdown, shutdown_signal, GracefulShutdownConfig, ShutdownCoordinator,
    ShutdownSignal,
};
pub use payment::*;
pub use sla_sweep::{spawn_sla_sweeper, SlaSweepConfig, SlaSweeper, SweepReport};
pub use sqlite::{
    BillOrder, ComplaintFilter, LedgerEntry, NewComplaint, NewPayment, OtpRecord,
    SqliteAccountStore, SqliteBillStore, SqliteCatalog, SqliteComplaintStore, SqliteLedger,
    SqliteOtpStore, UpvoteOutcome, VerifyOutcome,
};
pub use uploads::{image_extension, UploadStore, ALLOWED_IMAGE_EXTENSIONS, MAX_IMAGE_BYTES};
