//! Error types for the Salad pool and its collaborators
//!
//! Every rejection is synchronous and leaves balances, rounds and bets
//! exactly as they were before the call.

use crate::common::types::{Amount, RoundId};
use thiserror::Error;

/// Coarse classification of a rejection, stable across variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidRound,
    InvalidState,
    InvalidOutcome,
    DuplicateAction,
    BelowMinimum,
    AboveMaximum,
    NotYetExpired,
    AlreadyExpired,
    NothingToClaim,
    NoReward,
    Unauthorized,
    /// Failure reported by the ledger or the oracle.
    External,
    /// A broken internal invariant. Never a user error.
    Internal,
}

/// Root error type for all pool operations
#[derive(Debug, Error)]
pub enum SaladError {
    #[error("Round {requested} is not the current round ({current})")]
    WrongRound { requested: RoundId, current: RoundId },

    #[error("Round {0} does not exist")]
    UnknownRound(RoundId),

    #[error("Round {0} is closed for betting")]
    AlreadyClosed(RoundId),

    #[error("Participant already has a bet in round {0}")]
    DuplicateBet(RoundId),

    #[error("Stake {amount} is below the minimum of {minimum}")]
    BelowMinimum { amount: Amount, minimum: Amount },

    #[error("Stake {amount} is above the maximum of {maximum}")]
    AboveMaximum { amount: Amount, maximum: Amount },

    #[error("Outcome index {0} is outside the six-outcome domain")]
    InvalidOutcome(u8),

    #[error("Round {round_id} expired at {expires_at}")]
    RoundExpired { round_id: RoundId, expires_at: u64 },

    #[error("No bet placed in round {0}")]
    NoBetPlaced(RoundId),

    #[error("Amount must be greater than zero")]
    ZeroValue,

    #[error("Round {round_id} does not expire until {expires_at}")]
    NotExpiredYet { round_id: RoundId, expires_at: u64 },

    #[error("Round {0} is already settling or settled")]
    AlreadySettling(RoundId),

    #[error("Randomness for round {0} was not expected")]
    UnexpectedRandomness(RoundId),

    #[error("Round {0} is not settled yet")]
    NotSettled(RoundId),

    #[error("Nothing to claim in round {0}")]
    NothingToClaim(RoundId),

    #[error("No reward for this bet in round {0}")]
    NoRewardComputed(RoundId),

    #[error("Caller {0} is not authorized for this operation")]
    Unauthorized(String),

    #[error("Round duration {secs}s is outside [{min}s, {max}s]")]
    InvalidDuration { secs: u64, min: u64, max: u64 },

    #[error("Token {0} is not whitelisted")]
    TokenNotWhitelisted(String),

    #[error("Re-entrant call by {0} rejected")]
    Reentrancy(String),

    #[error("Arithmetic overflow while computing {0}")]
    ArithmeticOverflow(&'static str),

    #[error("Invariant violated: {0}")]
    InvariantViolation(String),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
}

impl SaladError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SaladError::WrongRound { .. } | SaladError::UnknownRound(_) => ErrorKind::InvalidRound,
            SaladError::AlreadyClosed(_)
            | SaladError::NoBetPlaced(_)
            | SaladError::NotSettled(_)
            | SaladError::ZeroValue
            | SaladError::InvalidDuration { .. }
            | SaladError::TokenNotWhitelisted(_) => ErrorKind::InvalidState,
            SaladError::InvalidOutcome(_) => ErrorKind::InvalidOutcome,
            SaladError::DuplicateBet(_)
            | SaladError::AlreadySettling(_)
            | SaladError::UnexpectedRandomness(_)
            | SaladError::Reentrancy(_) => ErrorKind::DuplicateAction,
            SaladError::BelowMinimum { .. } => ErrorKind::BelowMinimum,
            SaladError::AboveMaximum { .. } => ErrorKind::AboveMaximum,
            SaladError::NotExpiredYet { .. } => ErrorKind::NotYetExpired,
            SaladError::RoundExpired { .. } => ErrorKind::AlreadyExpired,
            SaladError::NothingToClaim(_) => ErrorKind::NothingToClaim,
            SaladError::NoRewardComputed(_) => ErrorKind::NoReward,
            SaladError::Unauthorized(_) => ErrorKind::Unauthorized,
            SaladError::Ledger(_) | SaladError::Oracle(_) => ErrorKind::External,
            SaladError::ArithmeticOverflow(_)
            | SaladError::InvariantViolation(_)
            | SaladError::Configuration(_) => ErrorKind::Internal,
        }
    }

    /// "You did not win" outcomes, as opposed to misuse or bugs.
    pub fn is_no_win(&self) -> bool {
        matches!(self.kind(), ErrorKind::NothingToClaim | ErrorKind::NoReward)
    }
}

/// Value transfer failures
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Insufficient funds for {account}: needed {needed}, available {available}")]
    InsufficientFunds {
        account: String,
        needed: Amount,
        available: Amount,
    },

    #[error("Transfer rejected: {0}")]
    Rejected(String),
}

/// Randomness service failures
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OracleError {
    #[error("Randomness for request {0} already requested")]
    AlreadyRequested(u64),

    #[error("Oracle queue closed")]
    QueueClosed,

    #[error("Oracle queue full")]
    QueueFull,

    #[error("VRF failure: {0}")]
    Vrf(String),
}

/// Configuration and validation errors
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Missing required field: {0}")]
    MissingRequired(String),

    #[error("Invalid value for {field}: '{value}' ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("Failed to save configuration: {0}")]
    SaveFailed(String),
}

impl From<std::io::Error> for ConfigurationError {
    fn from(e: std::io::Error) -> Self {
        ConfigurationError::LoadFailed(e.to_string())
    }
}

pub type SaladResult<T> = Result<T, SaladError>;
