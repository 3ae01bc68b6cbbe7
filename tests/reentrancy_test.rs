//! Ledgers that call back into the pool, or fail, during a transfer.

use parking_lot::Mutex;
use salad::common::{Address, Amount, Ledger, ManualClock, RandomWord, RoundId, Token};
use salad::config::GameConfig;
use salad::errors::{LedgerError, SaladError, SaladResult};
use salad::events::EventBus;
use salad::games::{Outcome, Salad};
use salad::ledger::InMemoryLedger;
use salad::oracle::ManualOracle;
use salad::GameServices;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

const HOUR: u64 = 3_600;

/// Wraps the in-memory ledger; on every transfer it tries to re-enter the
/// pool and records what the pool answered.
struct HostileLedger {
    inner: InMemoryLedger,
    pool: Mutex<Option<Arc<Salad>>>,
    attempts: Mutex<Vec<SaladResult<()>>>,
    fail_sends: AtomicBool,
    read_only: AtomicBool,
    views: Mutex<Vec<(RoundId, Option<Amount>)>>,
}

impl HostileLedger {
    fn new() -> Self {
        Self {
            inner: InMemoryLedger::new(0, Address::from("treasury")),
            pool: Mutex::new(None),
            attempts: Mutex::new(Vec::new()),
            fail_sends: AtomicBool::new(false),
            read_only: AtomicBool::new(false),
            views: Mutex::new(Vec::new()),
        }
    }

    fn reenter(&self, who: &Address) {
        let pool = self.pool.lock().clone();
        if let Some(pool) = pool {
            if self.read_only.load(Ordering::SeqCst) {
                let view = (pool.current_round_id(), pool.round(0).map(|round| round.total_pool()));
                let _ = pool.pending_reward(0, who);
                let _ = pool.bet(0, who);
                self.views.lock().push(view);
                return;
            }
            let claim = pool.claim(who, 0).map(|_| ());
            let bet = pool
                .place_bet(&Address::from("mallory"), 0, Outcome::Olive, Outcome::Olive, 1, None)
                .map(|_| ());
            self.attempts.lock().extend([claim, bet]);
        }
    }
}

impl Ledger for HostileLedger {
    fn receive(&self, token: &Token, from: &Address, amount: Amount) -> Result<Amount, LedgerError> {
        self.reenter(from);
        self.inner.receive(token, from, amount)
    }

    fn send(&self, token: &Token, to: &Address, amount: Amount) -> Result<(), LedgerError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(LedgerError::Rejected("payouts paused".to_string()));
        }
        self.reenter(to);
        self.inner.send(token, to, amount)
    }
}

struct Setup {
    salad: Arc<Salad>,
    ledger: Arc<HostileLedger>,
    oracle: Arc<ManualOracle>,
    clock: Arc<ManualClock>,
}

fn setup() -> Setup {
    let ledger = Arc::new(HostileLedger::new());
    let oracle = Arc::new(ManualOracle::new("oracle"));
    let clock = Arc::new(ManualClock::new(0));
    let config = GameConfig {
        min_stake: 1,
        ..GameConfig::default()
    };
    let (salad, _cap) = Salad::new(
        &config,
        GameServices {
            ledger: ledger.clone(),
            oracle: oracle.clone(),
            clock: clock.clone(),
            events: Arc::new(EventBus::default()),
        },
    )
    .unwrap();
    let salad = Arc::new(salad);

    for name in ["alice", "mallory"] {
        ledger.inner.deposit(&Address::from(name), &Token::native(), 1_000);
    }
    Setup {
        salad,
        ledger,
        oracle,
        clock,
    }
}

fn settle_round_zero(setup: &Setup) {
    setup.clock.advance(HOUR + 1);
    setup.salad.start_settlement(&Address::from("keeper"), 0).unwrap();
    setup
        .oracle
        .deliver(setup.salad.as_ref(), 0, RandomWord::from_u64(1))
        .unwrap();
}

#[test]
fn test_reentry_during_stake_transfer_rejected() {
    let setup = setup();
    *setup.ledger.pool.lock() = Some(setup.salad.clone());
    let alice = Address::from("alice");

    setup
        .salad
        .place_bet(&alice, 0, Outcome::Tomato, Outcome::Onion, 100, None)
        .unwrap();

    let attempts = setup.ledger.attempts.lock();
    assert_eq!(attempts.len(), 2);
    assert!(attempts
        .iter()
        .all(|attempt| matches!(attempt, Err(SaladError::Reentrancy(_)))));
    drop(attempts);

    assert!(setup.salad.bet(0, &Address::from("mallory")).is_none());
    assert_eq!(setup.salad.round(0).unwrap().total_pool(), 100);
}

#[test]
fn test_reentry_during_payout_cannot_double_claim() {
    let setup = setup();
    let alice = Address::from("alice");
    setup
        .salad
        .place_bet(&alice, 0, Outcome::Tomato, Outcome::Onion, 100, None)
        .unwrap();
    settle_round_zero(&setup);

    *setup.ledger.pool.lock() = Some(setup.salad.clone());
    assert_eq!(setup.salad.claim(&alice, 0).unwrap(), 100);

    let attempts = setup.ledger.attempts.lock();
    assert_eq!(attempts.len(), 2);
    assert!(attempts
        .iter()
        .all(|attempt| matches!(attempt, Err(SaladError::Reentrancy(_)))));
    drop(attempts);

    assert_eq!(setup.ledger.inner.balance_of(&alice, &Token::native()), 1_000);
    assert!(matches!(setup.salad.claim(&alice, 0), Err(SaladError::NothingToClaim(0))));
}

#[test]
fn test_failed_payout_restores_bet() {
    let setup = setup();
    let alice = Address::from("alice");
    setup
        .salad
        .place_bet(&alice, 0, Outcome::Tomato, Outcome::Onion, 100, None)
        .unwrap();
    settle_round_zero(&setup);

    setup.ledger.fail_sends.store(true, Ordering::SeqCst);
    assert!(matches!(
        setup.salad.claim(&alice, 0),
        Err(SaladError::Ledger(LedgerError::Rejected(_)))
    ));
    assert_eq!(setup.salad.bet(0, &alice).unwrap().total_stake, 100);

    setup.ledger.fail_sends.store(false, Ordering::SeqCst);
    assert_eq!(setup.salad.claim(&alice, 0).unwrap(), 100);
    assert!(setup.salad.bet(0, &alice).is_none());
}

#[test]
fn test_pool_readable_during_transfers() {
    let setup = setup();
    setup.ledger.read_only.store(true, Ordering::SeqCst);
    *setup.ledger.pool.lock() = Some(setup.salad.clone());

    let (done_tx, done_rx) = mpsc::channel();
    let salad = setup.salad.clone();
    let oracle = setup.oracle.clone();
    let clock = setup.clock.clone();
    thread::spawn(move || {
        let alice = Address::from("alice");
        salad
            .place_bet(&alice, 0, Outcome::Tomato, Outcome::Onion, 100, None)
            .unwrap();
        salad.increase_bet(&alice, 0, Outcome::Lettuce, 50).unwrap();
        clock.advance(HOUR + 1);
        salad.start_settlement(&Address::from("keeper"), 0).unwrap();
        oracle.deliver(salad.as_ref(), 0, RandomWord::from_u64(1)).unwrap();
        let reward = salad.claim(&alice, 0).unwrap();
        done_tx.send(reward).unwrap();
    });

    let reward = done_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("pool stalled while the ledger read it");
    assert_eq!(reward, 150);

    // Each view shows the pool as it was before the transfer committed.
    let views = setup.ledger.views.lock();
    assert_eq!(*views, vec![(0, None), (0, Some(100)), (1, Some(150))]);
}
