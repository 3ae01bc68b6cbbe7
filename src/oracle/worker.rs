//! Queue-backed VRF oracle
//!
//! `VrfOracle` is the request side handed to a game; `OracleWorker` is the
//! task that answers requests and calls back into the game as the oracle
//! principal.

use crate::common::traits::{Clock, RandomnessConsumer, RandomnessOracle};
use crate::common::types::{Address, RoundId};
use crate::config::OracleConfig;
use crate::errors::OracleError;
use crate::oracle::pending_pool::PendingRequests;
use crate::oracle::vrf_engine::{VrfBundle, VrfEngine};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

pub struct VrfOracle {
    principal: Address,
    queue: mpsc::Sender<RoundId>,
    pending: PendingRequests,
    bundles: Arc<DashMap<RoundId, VrfBundle>>,
    clock: Arc<dyn Clock>,
}

impl VrfOracle {
    /// Build the oracle and the worker that serves it. `context` is mixed
    /// into every VRF input so two games never share words.
    pub fn new(
        config: &OracleConfig,
        engine: VrfEngine,
        context: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> (Self, OracleWorker) {
        let (queue, requests) = mpsc::channel(config.queue_capacity.max(1));
        let principal = Address::new(config.principal.clone());
        let pending = PendingRequests::new();
        let bundles = Arc::new(DashMap::new());

        let worker = OracleWorker {
            principal: principal.clone(),
            requests,
            engine: Arc::new(engine),
            context: context.into(),
            delivery_delay: Duration::from_millis(config.delivery_delay_ms),
            pending: pending.clone(),
            bundles: Arc::clone(&bundles),
        };

        let oracle = Self {
            principal,
            queue,
            pending,
            bundles,
            clock,
        };
        (oracle, worker)
    }

    /// Proof for a delivered request
    pub fn bundle(&self, request_id: RoundId) -> Option<VrfBundle> {
        self.bundles.get(&request_id).map(|entry| entry.clone())
    }

    pub fn pending(&self) -> &PendingRequests {
        &self.pending
    }
}

impl RandomnessOracle for VrfOracle {
    fn request_randomness(&self, request_id: RoundId) -> Result<(), OracleError> {
        self.pending.add(request_id, self.clock.now())?;

        if let Err(e) = self.queue.try_send(request_id) {
            self.pending.complete(request_id);
            return Err(match e {
                TrySendError::Full(_) => OracleError::QueueFull,
                TrySendError::Closed(_) => OracleError::QueueClosed,
            });
        }

        debug!(request_id, "randomness requested");
        Ok(())
    }

    fn principal(&self) -> Address {
        self.principal.clone()
    }
}

pub struct OracleWorker {
    principal: Address,
    requests: mpsc::Receiver<RoundId>,
    engine: Arc<VrfEngine>,
    context: String,
    delivery_delay: Duration,
    pending: PendingRequests,
    bundles: Arc<DashMap<RoundId, VrfBundle>>,
}

impl OracleWorker {
    pub fn spawn(self, consumer: Arc<dyn RandomnessConsumer>) -> JoinHandle<()> {
        tokio::spawn(self.run(consumer))
    }

    /// Serve requests until every `VrfOracle` handle is dropped.
    pub async fn run(mut self, consumer: Arc<dyn RandomnessConsumer>) {
        info!(principal = %self.principal, context = %self.context, "oracle worker started");
        while let Some(request_id) = self.requests.recv().await {
            self.deliver(consumer.as_ref(), request_id).await;
        }
        info!("oracle worker stopped");
    }

    /// One delivery attempt. A rejection is an integration fault and is
    /// never retried.
    async fn deliver(&self, consumer: &dyn RandomnessConsumer, request_id: RoundId) -> bool {
        if !self.delivery_delay.is_zero() {
            tokio::time::sleep(self.delivery_delay).await;
        }

        let bundle = self.engine.generate(request_id, &self.context);
        self.pending.complete(request_id);
        let word = match bundle.word() {
            Ok(word) => word,
            Err(e) => {
                error!(request_id, error = %e, "VRF produced an unusable word");
                return false;
            }
        };
        self.bundles.insert(request_id, bundle);

        match consumer.consume_randomness(&self.principal, request_id, word) {
            Ok(()) => {
                info!(request_id, word = %word, "randomness delivered");
                true
            }
            Err(e) => {
                error!(request_id, error = %e, "randomness delivery rejected");
                false
            }
        }
    }
}
