//! Randomness oracle: VRF engine, request bookkeeping and delivery worker

pub mod manual;
pub mod pending_pool;
pub mod vrf_engine;
pub mod worker;

pub use manual::ManualOracle;
pub use pending_pool::PendingRequests;
pub use vrf_engine::{VrfBundle, VrfEngine};
pub use worker::{OracleWorker, VrfOracle};
