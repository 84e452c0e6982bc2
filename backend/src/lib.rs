pub mod auth;
pub mod config;
pub mod error;
pub mod ledger;
pub mod memory;
pub mod postgres;
pub mod store;
pub mod watcher;
pub use shared::{models::*, error::{Error, ErrorCode}, voter::*};
pub use shared::tally::{compute_tally, CandidatesByPosition, PositionTally, Tally, TallyRow};
