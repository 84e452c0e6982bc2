pub mod error;
pub mod models;
pub mod validation;
pub mod voter;
pub mod tally;

pub use error::{Error, ErrorCode, Result};
pub use models::*;
pub use validation::*;
pub use voter::*;
pub use tally::{compute_tally, CandidatesByPosition, PositionTally, Tally, TallyRow};

#[cfg(test)]
mod tests;
