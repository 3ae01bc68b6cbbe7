//! Owner capability for the privileged pool setters

use uuid::Uuid;

/// Proof of ownership of one pool instance. Minted exactly once, when the
/// pool is created; not `Clone`.
#[derive(Debug)]
pub struct AdminCap {
    instance: Uuid,
}

impl AdminCap {
    pub(crate) fn mint(instance: Uuid) -> Self {
        Self { instance }
    }

    pub fn instance(&self) -> Uuid {
        self.instance
    }

    pub fn grants(&self, instance: Uuid) -> bool {
        self.instance == instance
    }
}
