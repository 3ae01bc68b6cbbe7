//! In-memory ledger with a proportional commission on receipt.

use crate::common::traits::Ledger;
use crate::common::types::{Address, Amount, Token};
use crate::config::{LedgerConfig, BPS_DENOMINATOR};
use crate::errors::LedgerError;
use dashmap::DashMap;
use parking_lot::Mutex;

/// Balances keyed by (account, token); the pool and the treasury are
/// ordinary accounts.
pub struct InMemoryLedger {
    balances: DashMap<(Address, Token), Amount>,
    pool: Address,
    treasury: Address,
    commission_bps: u32,
    // Serializes multi-account moves
    transfer_lock: Mutex<()>,
}

impl InMemoryLedger {
    pub fn new(commission_bps: u32, treasury: Address) -> Self {
        Self {
            balances: DashMap::new(),
            pool: Address::from("salad-pool"),
            treasury,
            commission_bps: commission_bps.min(BPS_DENOMINATOR - 1),
            transfer_lock: Mutex::new(()),
        }
    }

    pub fn from_config(config: &LedgerConfig) -> Self {
        Self::new(config.commission_bps, Address::new(config.treasury.clone()))
    }

    /// Credit an account out of thin air (faucet for tests and simulation)
    pub fn deposit(&self, to: &Address, token: &Token, amount: Amount) {
        *self.balances.entry((to.clone(), token.clone())).or_insert(0) += amount;
    }

    pub fn balance_of(&self, who: &Address, token: &Token) -> Amount {
        self.balances
            .get(&(who.clone(), token.clone()))
            .map(|entry| *entry)
            .unwrap_or(0)
    }

    pub fn pool_balance(&self, token: &Token) -> Amount {
        self.balance_of(&self.pool, token)
    }

    pub fn treasury_balance(&self, token: &Token) -> Amount {
        self.balance_of(&self.treasury, token)
    }

    pub fn commission_for(&self, amount: Amount) -> Amount {
        amount * self.commission_bps as Amount / BPS_DENOMINATOR as Amount
    }

    fn debit(&self, who: &Address, token: &Token, amount: Amount) -> Result<(), LedgerError> {
        let mut entry = self.balances.entry((who.clone(), token.clone())).or_insert(0);
        if *entry < amount {
            return Err(LedgerError::InsufficientFunds {
                account: who.to_string(),
                needed: amount,
                available: *entry,
            });
        }
        *entry -= amount;
        Ok(())
    }
}

impl Ledger for InMemoryLedger {
    fn receive(&self, token: &Token, from: &Address, amount: Amount) -> Result<Amount, LedgerError> {
        let _transfer = self.transfer_lock.lock();
        self.debit(from, token, amount)?;

        let fee = self.commission_for(amount);
        let credited = amount - fee;
        self.deposit(&self.pool, token, credited);
        if fee > 0 {
            self.deposit(&self.treasury, token, fee);
        }

        tracing::debug!(%from, %token, amount, credited, fee, "stake received");
        Ok(credited)
    }

    fn send(&self, token: &Token, to: &Address, amount: Amount) -> Result<(), LedgerError> {
        let _transfer = self.transfer_lock.lock();
        self.debit(&self.pool, token, amount)?;
        self.deposit(to, token, amount);

        tracing::debug!(%to, %token, amount, "payout sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receive_takes_commission() {
        let ledger = InMemoryLedger::new(250, Address::from("treasury"));
        let alice = Address::from("alice");
        let token = Token::native();
        ledger.deposit(&alice, &token, 1_000);

        let credited = ledger.receive(&token, &alice, 1_000).unwrap();

        assert_eq!(credited, 975);
        assert_eq!(ledger.balance_of(&alice, &token), 0);
        assert_eq!(ledger.pool_balance(&token), 975);
        assert_eq!(ledger.treasury_balance(&token), 25);
    }

    #[test]
    fn test_small_stake_still_credits() {
        let ledger = InMemoryLedger::new(9_999, Address::from("treasury"));
        let alice = Address::from("alice");
        ledger.deposit(&alice, &Token::native(), 1);
        assert_eq!(ledger.receive(&Token::native(), &alice, 1).unwrap(), 1);
    }

    #[test]
    fn test_receive_insufficient_funds_leaves_balances() {
        let ledger = InMemoryLedger::new(100, Address::from("treasury"));
        let alice = Address::from("alice");
        let token = Token::native();
        ledger.deposit(&alice, &token, 10);

        let err = ledger.receive(&token, &alice, 11).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds { needed: 11, available: 10, .. }));
        assert_eq!(ledger.balance_of(&alice, &token), 10);
        assert_eq!(ledger.pool_balance(&token), 0);
    }

    #[test]
    fn test_send_has_no_commission() {
        let ledger = InMemoryLedger::new(500, Address::from("treasury"));
        let alice = Address::from("alice");
        let token = Token::native();
        ledger.deposit(&alice, &token, 200);
        ledger.receive(&token, &alice, 200).unwrap();

        ledger.send(&token, &alice, 190).unwrap();
        assert_eq!(ledger.balance_of(&alice, &token), 190);
        assert_eq!(ledger.pool_balance(&token), 0);
        assert!(ledger.send(&token, &alice, 1).is_err());
    }

    #[test]
    fn test_tokens_are_separate() {
        let ledger = InMemoryLedger::new(0, Address::from("treasury"));
        let alice = Address::from("alice");
        let usdc = Token::new("USDC", None);
        ledger.deposit(&alice, &Token::native(), 50);
        assert!(ledger.receive(&usdc, &alice, 10).is_err());
    }
}
