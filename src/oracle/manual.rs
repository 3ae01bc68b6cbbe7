use crate::common::traits::{RandomnessConsumer, RandomnessOracle};
use crate::common::types::{Address, RandomWord, RoundId};
use crate::errors::{OracleError, SaladResult};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Oracle that only records requests; words are delivered by hand.
pub struct ManualOracle {
    principal: Address,
    requests: Mutex<Vec<RoundId>>,
    fail_next: AtomicBool,
}

impl ManualOracle {
    pub fn new(principal: impl Into<Address>) -> Self {
        Self {
            principal: principal.into(),
            requests: Mutex::new(Vec::new()),
            fail_next: AtomicBool::new(false),
        }
    }

    pub fn requests(&self) -> Vec<RoundId> {
        self.requests.lock().clone()
    }

    pub fn last_request(&self) -> Option<RoundId> {
        self.requests.lock().last().copied()
    }

    /// Make the next `request_randomness` fail with `QueueClosed`
    pub fn fail_next_request(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Deliver `word` for `request_id` as the oracle principal
    pub fn deliver(&self, consumer: &dyn RandomnessConsumer, request_id: RoundId, word: RandomWord) -> SaladResult<()> {
        consumer.consume_randomness(&self.principal, request_id, word)
    }
}

impl RandomnessOracle for ManualOracle {
    fn request_randomness(&self, request_id: RoundId) -> Result<(), OracleError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(OracleError::QueueClosed);
        }
        self.requests.lock().push(request_id);
        Ok(())
    }

    fn principal(&self) -> Address {
        self.principal.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_requests() {
        let oracle = ManualOracle::new("oracle");
        oracle.request_randomness(0).unwrap();
        oracle.request_randomness(1).unwrap();

        assert_eq!(oracle.requests(), vec![0, 1]);
        assert_eq!(oracle.last_request(), Some(1));
        assert_eq!(oracle.principal(), Address::from("oracle"));
    }

    #[test]
    fn test_fail_next_request_is_one_shot() {
        let oracle = ManualOracle::new("oracle");
        oracle.fail_next_request();

        assert_eq!(oracle.request_randomness(0), Err(OracleError::QueueClosed));
        assert!(oracle.request_randomness(0).is_ok());
        assert_eq!(oracle.requests(), vec![0]);
    }
}
