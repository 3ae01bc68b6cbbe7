use crate::common::types::{RoundId, Timestamp};
use crate::errors::OracleError;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

/// Randomness requests queued but not yet delivered
#[derive(Clone, Default)]
pub struct PendingRequests {
    /// request id -> time the request was made
    pending: Arc<DashMap<RoundId, Timestamp>>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails if `request_id` is already outstanding
    pub fn add(&self, request_id: RoundId, requested_at: Timestamp) -> Result<(), OracleError> {
        match self.pending.entry(request_id) {
            Entry::Occupied(_) => Err(OracleError::AlreadyRequested(request_id)),
            Entry::Vacant(slot) => {
                slot.insert(requested_at);
                Ok(())
            }
        }
    }

    /// Request time of a completed request, or `None` if it was not pending
    pub fn complete(&self, request_id: RoundId) -> Option<Timestamp> {
        self.pending.remove(&request_id).map(|(_, at)| at)
    }

    pub fn is_pending(&self, request_id: RoundId) -> bool {
        self.pending.contains_key(&request_id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
