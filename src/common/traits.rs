//! Seams to the collaborators the pool does not own
//!
//! Value transfer, randomness and time are injected so the round logic
//! can be exercised without a host chain.

use crate::common::types::{Address, Amount, RandomWord, RoundId, Timestamp, Token};
use crate::errors::{LedgerError, OracleError, SaladResult};

/// Moves value between participants and the pool.
///
/// Implementations may deduct a commission on `receive`; the returned
/// credited amount is authoritative for all pool accounting. `send` never
/// deducts.
pub trait Ledger: Send + Sync {
    /// Pull `amount` of `token` from `from` into the pool
    fn receive(&self, token: &Token, from: &Address, amount: Amount) -> Result<Amount, LedgerError>;

    /// Pay `amount` of `token` from the pool to `to`
    fn send(&self, token: &Token, to: &Address, amount: Amount) -> Result<(), LedgerError>;
}

/// Asynchronous randomness provider.
///
/// `request_randomness` returns as soon as the request is queued; the
/// value arrives later through the game's `consume_randomness` entry
/// point, called by `principal()`.
pub trait RandomnessOracle: Send + Sync {
    fn request_randomness(&self, request_id: RoundId) -> Result<(), OracleError>;

    /// The only caller allowed to deliver randomness
    fn principal(&self) -> Address;
}

/// Receiving end of an oracle: a game that accepts delivered words.
pub trait RandomnessConsumer: Send + Sync {
    fn consume_randomness(&self, caller: &Address, request_id: RoundId, word: RandomWord) -> SaladResult<()>;
}

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct RecordingOracle {
        requests: Mutex<Vec<RoundId>>,
    }

    impl RandomnessOracle for RecordingOracle {
        fn request_randomness(&self, request_id: RoundId) -> Result<(), OracleError> {
            self.requests.lock().push(request_id);
            Ok(())
        }

        fn principal(&self) -> Address {
            Address::from("oracle")
        }
    }

    #[test]
    fn test_oracle_is_object_safe() {
        let oracle: Box<dyn RandomnessOracle> = Box::new(RecordingOracle {
            requests: Mutex::new(Vec::new()),
        });
        oracle.request_randomness(7).unwrap();
        assert_eq!(oracle.principal().as_str(), "oracle");
    }
}
