//! Wiring: builds the ledger, clock, event bus and oracles a game needs
//! and hands them out as one `GameServices` bundle.

use crate::access::AdminCap;
use crate::common::clock::SystemClock;
use crate::common::traits::{Clock, Ledger, RandomnessOracle};
use crate::config::{ConfigLoader, SaladConfig};
use crate::errors::SaladResult;
use crate::events::EventBus;
use crate::games::donut::Donut;
use crate::games::salad::Salad;
use crate::ledger::InMemoryLedger;
use crate::oracle::{VrfEngine, VrfOracle};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Collaborators injected into a game
#[derive(Clone)]
pub struct GameServices {
    pub ledger: Arc<dyn Ledger>,
    pub oracle: Arc<dyn RandomnessOracle>,
    pub clock: Arc<dyn Clock>,
    pub events: Arc<EventBus>,
}

/// A running pool with its VRF oracle worker
pub struct SaladHandle {
    pub salad: Arc<Salad>,
    pub admin: AdminCap,
    pub oracle: Arc<VrfOracle>,
    worker: JoinHandle<()>,
}

impl SaladHandle {
    pub fn shutdown(self) {
        self.worker.abort();
    }
}

pub struct DonutHandle {
    pub donut: Arc<Donut>,
    pub oracle: Arc<VrfOracle>,
    worker: JoinHandle<()>,
}

impl DonutHandle {
    pub fn shutdown(self) {
        self.worker.abort();
    }
}

/// Shared services for every game in the process
pub struct ServiceContainer {
    config: SaladConfig,
    ledger: Arc<InMemoryLedger>,
    clock: Arc<dyn Clock>,
    events: Arc<EventBus>,
}

impl ServiceContainer {
    pub fn new(config: SaladConfig, clock: Arc<dyn Clock>) -> Self {
        let ledger = Arc::new(InMemoryLedger::from_config(&config.ledger));
        let events = Arc::new(EventBus::new(
            config.events.channel_capacity,
            config.events.history_limit,
        ));
        Self {
            config,
            ledger,
            clock,
            events,
        }
    }

    pub fn config(&self) -> &SaladConfig {
        &self.config
    }

    pub fn ledger(&self) -> Arc<InMemoryLedger> {
        Arc::clone(&self.ledger)
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    pub fn events(&self) -> Arc<EventBus> {
        Arc::clone(&self.events)
    }

    pub fn game_services(&self, oracle: Arc<dyn RandomnessOracle>) -> GameServices {
        GameServices {
            ledger: self.ledger.clone(),
            oracle,
            clock: self.clock(),
            events: self.events(),
        }
    }

    /// Start a Salad pool served by a VRF oracle. Must run inside a tokio
    /// runtime.
    pub fn launch_salad(&self, engine: VrfEngine) -> SaladResult<SaladHandle> {
        let (oracle, worker) = VrfOracle::new(&self.config.oracle, engine, "salad", self.clock());
        let oracle = Arc::new(oracle);
        let (salad, admin) = Salad::new(&self.config.game, self.game_services(oracle.clone()))?;
        let salad = Arc::new(salad);
        let worker = worker.spawn(salad.clone());

        Ok(SaladHandle {
            salad,
            admin,
            oracle,
            worker,
        })
    }

    /// Start a Donut game served by its own VRF oracle
    pub fn launch_donut(&self, engine: VrfEngine) -> DonutHandle {
        let (oracle, worker) = VrfOracle::new(&self.config.oracle, engine, "donut", self.clock());
        let oracle = Arc::new(oracle);
        let donut = Arc::new(Donut::new(&self.config.game, self.game_services(oracle.clone())));
        let worker = worker.spawn(donut.clone());

        DonutHandle {
            donut,
            oracle,
            worker,
        }
    }
}

/// Builder for `ServiceContainer`
#[derive(Default)]
pub struct ServiceBuilder {
    config_path: Option<String>,
    config: Option<SaladConfig>,
    clock: Option<Arc<dyn Clock>>,
}

impl ServiceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config_path(mut self, path: impl Into<String>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Use this configuration as is, skipping file and environment
    pub fn with_config(mut self, config: SaladConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Override the wall clock (useful for testing)
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> SaladResult<ServiceContainer> {
        let config = match (self.config, self.config_path) {
            (Some(config), _) => config,
            (None, Some(path)) => ConfigLoader::new().with_path(path).load()?,
            (None, None) => ConfigLoader::new().load()?,
        };
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        Ok(ServiceContainer::new(config, clock))
    }
}
