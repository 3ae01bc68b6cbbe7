//! Common types, seams and utilities shared across the crate

pub mod clock;
pub mod traits;
pub mod types;

pub use clock::{ManualClock, SystemClock};
pub use traits::{Clock, Ledger, RandomnessConsumer, RandomnessOracle};
pub use types::{Address, Amount, RandomWord, RoundId, Timestamp, Token};
