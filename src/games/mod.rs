//! Game logic: the Salad round pool and the Donut coin flip

pub mod bets;
pub mod donut;
pub mod guard;
pub mod round;
pub mod salad;
pub mod settlement;
pub mod types;

pub use bets::{BetBook, BetUpdate, StakePolicy};
pub use donut::{BlockStatus, Donut, DonutBet, DonutBlock};
pub use guard::ReentrancyGuard;
pub use round::RoundBook;
pub use salad::Salad;
pub use settlement::Settlement;
pub use types::*;
