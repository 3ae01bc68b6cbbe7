//! Salad - round-based pari-mutuel pool over six outcomes
//!
//! Participants stake on one of six ingredients for a fixed-duration
//! round. When the round expires anyone may close it; a VRF oracle then
//! delivers a random word that picks the spoiled ingredient. Stakes on it
//! are shared among the other buckets, and a round leader whose secondary
//! pick was drawn takes the whole pool. `Donut` is a one-block coin flip
//! on the same rails.

pub mod access;
pub mod common;
pub mod config;
pub mod errors;
pub mod events;
pub mod games;
pub mod ledger;
pub mod logging;
pub mod oracle;
pub mod services;

pub use access::AdminCap;
pub use common::{Address, Amount, Clock, Ledger, RandomWord, RandomnessOracle, RoundId, Timestamp, Token};
pub use config::{ConfigBuilder, ConfigLoader, SaladConfig};
pub use errors::{ErrorKind, SaladError, SaladResult};
pub use events::{EventBus, SaladEvent};
pub use games::{CoinSide, Donut, Outcome, Round, RoundStatus, Salad};
pub use ledger::InMemoryLedger;
pub use services::{GameServices, ServiceBuilder, ServiceContainer};
