//! Re-entrancy protection for game entry points
//!
//! Two busy-bits: one per caller, held for a whole entry point, and one
//! per thread, held while a ledger or oracle call is in flight. An entry
//! point fails with `SaladError::Reentrancy` if either is already set.

use crate::common::types::Address;
use crate::errors::{SaladError, SaladResult};
use dashmap::DashSet;
use std::thread::{self, ThreadId};

#[derive(Default)]
pub struct ReentrancyGuard {
    callers: DashSet<Address>,
    external: DashSet<ThreadId>,
}

impl ReentrancyGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a frame for `caller`; released when the frame drops.
    pub fn enter(&self, caller: &Address) -> SaladResult<CallerFrame<'_>> {
        if self.external.contains(&thread::current().id()) {
            return Err(SaladError::Reentrancy(caller.to_string()));
        }
        if !self.callers.insert(caller.clone()) {
            return Err(SaladError::Reentrancy(caller.to_string()));
        }
        Ok(CallerFrame {
            guard: self,
            caller: caller.clone(),
        })
    }

    /// Mark the current thread as inside a collaborator call
    pub fn external_call(&self) -> ExternalFrame<'_> {
        let thread = thread::current().id();
        self.external.insert(thread);
        ExternalFrame {
            guard: self,
            thread,
        }
    }

    pub fn is_busy(&self, caller: &Address) -> bool {
        self.callers.contains(caller)
    }
}

pub struct CallerFrame<'a> {
    guard: &'a ReentrancyGuard,
    caller: Address,
}

impl Drop for CallerFrame<'_> {
    fn drop(&mut self) {
        self.guard.callers.remove(&self.caller);
    }
}

pub struct ExternalFrame<'a> {
    guard: &'a ReentrancyGuard,
    thread: ThreadId,
}

impl Drop for ExternalFrame<'_> {
    fn drop(&mut self) {
        self.guard.external.remove(&self.thread);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_caller_rejected_while_frame_live() {
        let guard = ReentrancyGuard::new();
        let alice = Address::from("alice");

        let frame = guard.enter(&alice).unwrap();
        assert!(matches!(guard.enter(&alice), Err(SaladError::Reentrancy(_))));
        assert!(guard.enter(&Address::from("bob")).is_ok());

        drop(frame);
        assert!(!guard.is_busy(&alice));
        assert!(guard.enter(&alice).is_ok());
    }

    #[test]
    fn test_no_entry_during_external_call() {
        let guard = ReentrancyGuard::new();
        let _frame = guard.enter(&Address::from("alice")).unwrap();

        {
            let _external = guard.external_call();
            assert!(guard.enter(&Address::from("mallory")).is_err());
        }
        assert!(guard.enter(&Address::from("mallory")).is_ok());
    }

    #[test]
    fn test_external_call_is_per_thread() {
        let guard = ReentrancyGuard::new();
        let _external = guard.external_call();

        std::thread::scope(|scope| {
            scope.spawn(|| assert!(guard.enter(&Address::from("bob")).is_ok()));
        });
    }
}
