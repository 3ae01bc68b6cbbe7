//! The Salad pool service
//!
//! `Salad` serializes every state change behind one writer lock and talks
//! to its collaborators (ledger, oracle) through the seams in
//! `common::traits`. Each entry point validates the whole call before it
//! commits anything, so a rejection leaves rounds, bets and balances as
//! they were. The state lock is never held across a collaborator call, so
//! a ledger or oracle may read the pool while it runs.

use crate::access::AdminCap;
use crate::common::traits::{Clock, Ledger, RandomnessConsumer, RandomnessOracle};
use crate::common::types::{Address, Amount, RandomWord, RoundId, Token};
use crate::config::GameConfig;
use crate::errors::{SaladError, SaladResult};
use crate::events::{EventBus, SaladEvent};
use crate::games::bets::{BetBook, BetUpdate, StakePolicy};
use crate::games::guard::ReentrancyGuard;
use crate::games::round::RoundBook;
use crate::games::settlement::{self, Settlement};
use crate::games::types::{Bet, Outcome, Round};
use crate::services::GameServices;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

struct PoolState {
    rounds: RoundBook,
    bets: BetBook,
}

pub struct Salad {
    id: Uuid,
    /// Held for the whole of a state-changing entry point
    writer: Mutex<()>,
    state: Mutex<PoolState>,
    policy: StakePolicy,
    allowed_tokens: Vec<Token>,
    ledger: Arc<dyn Ledger>,
    oracle: Arc<dyn RandomnessOracle>,
    clock: Arc<dyn Clock>,
    events: Arc<EventBus>,
    guard: ReentrancyGuard,
}

impl Salad {
    /// Create a pool and the only capability that can administer it
    pub fn new(config: &GameConfig, services: GameServices) -> SaladResult<(Self, AdminCap)> {
        if !config.is_whitelisted(&config.stake_token) {
            return Err(SaladError::TokenNotWhitelisted(config.stake_token.to_string()));
        }

        let id = Uuid::new_v4();
        let salad = Self {
            id,
            writer: Mutex::new(()),
            state: Mutex::new(PoolState {
                rounds: RoundBook::new(config.round_duration_secs, config.stake_token.clone())?,
                bets: BetBook::new(),
            }),
            policy: StakePolicy {
                min: config.min_stake(),
                max: config.max_stake(),
            },
            allowed_tokens: config.allowed_tokens.clone(),
            ledger: services.ledger,
            oracle: services.oracle,
            clock: services.clock,
            events: services.events,
            guard: ReentrancyGuard::new(),
        };

        info!(pool = %id, round_duration = config.round_duration_secs, token = %config.stake_token, "salad pool created");
        Ok((salad, AdminCap::mint(id)))
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Stake on `primary` for the current round, creating it if this is
    /// its first bet.
    pub fn place_bet(
        &self,
        caller: &Address,
        round_id: RoundId,
        primary: Outcome,
        secondary: Outcome,
        amount: Amount,
        referrer: Option<&Address>,
    ) -> SaladResult<BetUpdate> {
        let result = self.place_bet_inner(caller, round_id, primary, secondary, amount, referrer);
        log_rejection("place_bet", caller, round_id, &result);
        result
    }

    fn place_bet_inner(
        &self,
        caller: &Address,
        round_id: RoundId,
        primary: Outcome,
        secondary: Outcome,
        amount: Amount,
        referrer: Option<&Address>,
    ) -> SaladResult<BetUpdate> {
        let _frame = self.guard.enter(caller)?;
        let _writer = self.writer.lock();
        let now = self.clock.now();

        let (current_id, created, token) = {
            let state = self.state.lock();
            let current_id = state.rounds.current_round_id();
            let created = state.rounds.lazy_current(now);
            let token = {
                let round = match created.as_ref() {
                    Some(round) => round,
                    None => current_round(&state.rounds, current_id)?,
                };
                state
                    .bets
                    .check_place(round, current_id, round_id, caller, amount, &self.policy, now)?;
                round.stake_token.clone()
            };
            (current_id, created, token)
        };

        let credited = {
            let _external = self.guard.external_call();
            self.ledger.receive(&token, caller, amount)?
        };

        let mut state = self.state.lock();
        if let Some(round) = created {
            info!(round_id = round.id, expires_at = round.expires_at, token = %round.stake_token, "round created");
            self.events.emit(round_created(&round));
            state.rounds.insert_created(round);
        }

        let PoolState { rounds, bets } = &mut *state;
        let round = rounds
            .round_mut(current_id)
            .ok_or_else(|| SaladError::InvariantViolation(format!("round {} vanished", current_id)))?;
        let update = bets.record_place(round, caller, primary, secondary, credited, referrer);

        debug!(
            round_id = current_id,
            participant = %caller,
            %primary,
            %secondary,
            amount,
            credited,
            leader = update.is_leader,
            "bet placed"
        );
        self.events.emit(SaladEvent::BetPlaced {
            round_id: current_id,
            participant: caller.clone(),
            primary,
            secondary,
            amount,
            credited,
            referrer: referrer.cloned(),
            is_leader: update.is_leader,
        });
        if let Some(referrer) = &update.referrer_bound {
            self.events.emit(SaladEvent::ReferrerBound {
                participant: caller.clone(),
                referrer: referrer.clone(),
            });
        }

        Ok(update)
    }

    /// Add `extra` to an existing bet and move its secondary outcome.
    pub fn increase_bet(
        &self,
        caller: &Address,
        round_id: RoundId,
        secondary: Outcome,
        extra: Amount,
    ) -> SaladResult<BetUpdate> {
        let result = self.increase_bet_inner(caller, round_id, secondary, extra);
        log_rejection("increase_bet", caller, round_id, &result);
        result
    }

    fn increase_bet_inner(
        &self,
        caller: &Address,
        round_id: RoundId,
        secondary: Outcome,
        extra: Amount,
    ) -> SaladResult<BetUpdate> {
        let _frame = self.guard.enter(caller)?;
        let _writer = self.writer.lock();
        let now = self.clock.now();

        let token = {
            let state = self.state.lock();
            let round = state
                .rounds
                .round(round_id)
                .ok_or(SaladError::NoBetPlaced(round_id))?;
            state
                .bets
                .check_increase(round, caller, extra, &self.policy, now)?;
            round.stake_token.clone()
        };

        let credited = {
            let _external = self.guard.external_call();
            self.ledger.receive(&token, caller, extra)?
        };

        let mut state = self.state.lock();
        let PoolState { rounds, bets } = &mut *state;
        let round = rounds
            .round_mut(round_id)
            .ok_or_else(|| SaladError::InvariantViolation(format!("round {} vanished", round_id)))?;
        let (primary, update) = bets.record_increase(round, caller, secondary, credited)?;

        debug!(
            round_id,
            participant = %caller,
            %secondary,
            amount = extra,
            credited,
            total_stake = update.total_stake,
            leader = update.is_leader,
            "bet increased"
        );
        self.events.emit(SaladEvent::BetIncreased {
            round_id,
            participant: caller.clone(),
            primary,
            secondary,
            amount: extra,
            credited,
            total_stake: update.total_stake,
            is_leader: update.is_leader,
        });

        Ok(update)
    }

    /// Close an expired round and ask the oracle for its word. Anyone may
    /// call this; if the request fails the round stays open.
    pub fn start_settlement(&self, caller: &Address, round_id: RoundId) -> SaladResult<()> {
        let result = self.start_settlement_inner(caller, round_id);
        log_rejection("start_settlement", caller, round_id, &result);
        result
    }

    fn start_settlement_inner(&self, caller: &Address, round_id: RoundId) -> SaladResult<()> {
        let _frame = self.guard.enter(caller)?;
        let _writer = self.writer.lock();
        let now = self.clock.now();

        let total_pool = self
            .state
            .lock()
            .rounds
            .check_begin_settlement(round_id, now)?
            .total_pool();
        {
            let _external = self.guard.external_call();
            self.oracle.request_randomness(round_id)?;
        }
        self.state.lock().rounds.mark_settling(round_id);

        info!(round_id, requested_by = %caller, total_pool, "settlement started");
        self.events.emit(SaladEvent::SettlementStarted {
            round_id,
            requested_by: caller.clone(),
            total_pool,
        });
        Ok(())
    }

    /// Oracle callback. Only the oracle principal may deliver, and only
    /// once per settling round.
    pub fn consume_randomness(&self, caller: &Address, round_id: RoundId, word: RandomWord) -> SaladResult<Settlement> {
        let principal = self.oracle.principal();
        if *caller != principal {
            warn!(round_id, caller = %caller, "randomness from non-oracle caller");
            return Err(SaladError::Unauthorized(caller.to_string()));
        }

        let _frame = self.guard.enter(caller)?;
        let _writer = self.writer.lock();
        let now = self.clock.now();
        let settled = {
            let mut state = self.state.lock();
            let PoolState { rounds, bets } = &mut *state;
            settlement::settle(rounds, bets, round_id, word, now)
        };

        let settled = match settled {
            Ok(settled) => settled,
            Err(e) => {
                error!(round_id, error = %e, "oracle delivered randomness that cannot be applied");
                return Err(e);
            }
        };

        info!(
            round_id,
            outcome = %settled.outcome,
            jackpot = settled.jackpot,
            total_pool = settled.total_pool,
            next_round = settled.next_round.id,
            "round settled"
        );
        self.events.emit(SaladEvent::RoundSettled {
            round_id,
            outcome: settled.outcome,
            randomness: word,
            jackpot: settled.jackpot,
            leader: settled.leader.clone(),
            total_pool: settled.total_pool,
        });
        self.events.emit(round_created(&settled.next_round));

        Ok(settled)
    }

    /// Pay out the caller's reward for a settled round. The bet is removed
    /// before any value moves; a failed payout puts it back.
    pub fn claim(&self, caller: &Address, round_id: RoundId) -> SaladResult<Amount> {
        let result = self.claim_inner(caller, round_id);
        log_rejection("claim", caller, round_id, &result);
        result
    }

    fn claim_inner(&self, caller: &Address, round_id: RoundId) -> SaladResult<Amount> {
        let _frame = self.guard.enter(caller)?;
        let _writer = self.writer.lock();

        let (token, reward, jackpot, bet) = {
            let mut state = self.state.lock();
            let round = state
                .rounds
                .round(round_id)
                .ok_or(SaladError::UnknownRound(round_id))?;
            let reward = settlement::claimable(round, state.bets.bet(round_id, caller), caller)?;
            let token = round.stake_token.clone();
            let jackpot = round.jackpot;
            let bet = state
                .bets
                .take_bet(round_id, caller)
                .ok_or(SaladError::NothingToClaim(round_id))?;
            (token, reward, jackpot, bet)
        };

        let sent = {
            let _external = self.guard.external_call();
            self.ledger.send(&token, caller, reward)
        };
        if let Err(e) = sent {
            self.state.lock().bets.restore_bet(round_id, caller, bet);
            return Err(e.into());
        }

        info!(round_id, participant = %caller, reward, jackpot, "reward claimed");
        self.events.emit(SaladEvent::RewardClaimed {
            round_id,
            participant: caller.clone(),
            reward,
            jackpot,
        });
        Ok(reward)
    }

    /// Duration for rounds created from now on, in `[1h, 4d]`
    pub fn set_round_duration(&self, cap: &AdminCap, secs: u64) -> SaladResult<()> {
        self.authorize(cap)?;
        let old_secs = self.state.lock().rounds.set_round_duration(secs)?;

        info!(old_secs, new_secs = secs, "round duration changed");
        self.events.emit(SaladEvent::RoundDurationChanged {
            old_secs,
            new_secs: secs,
        });
        Ok(())
    }

    /// Stake token for rounds created from now on; must be whitelisted.
    pub fn set_token_for_next_round(&self, cap: &AdminCap, token: Token) -> SaladResult<()> {
        self.authorize(cap)?;
        if !self.allowed_tokens.contains(&token) {
            return Err(SaladError::TokenNotWhitelisted(token.to_string()));
        }
        let old = self.state.lock().rounds.set_next_token(token.clone());

        info!(old = %old, new = %token, "next round token changed");
        self.events.emit(SaladEvent::NextTokenChanged { old, new: token });
        Ok(())
    }

    fn authorize(&self, cap: &AdminCap) -> SaladResult<()> {
        if !cap.grants(self.id) {
            warn!(pool = %self.id, cap = %cap.instance(), "admin capability from another pool");
            return Err(SaladError::Unauthorized(format!("admin cap {}", cap.instance())));
        }
        Ok(())
    }

    pub fn current_round_id(&self) -> RoundId {
        self.state.lock().rounds.current_round_id()
    }

    pub fn round(&self, round_id: RoundId) -> Option<Round> {
        self.state.lock().rounds.round(round_id).cloned()
    }

    pub fn bet(&self, round_id: RoundId, participant: &Address) -> Option<Bet> {
        self.state.lock().bets.bet(round_id, participant).cloned()
    }

    pub fn referrer_of(&self, participant: &Address) -> Option<Address> {
        self.state.lock().bets.referrer_of(participant).cloned()
    }

    /// What `claim` would pay right now, without paying it
    pub fn pending_reward(&self, round_id: RoundId, participant: &Address) -> SaladResult<Amount> {
        let state = self.state.lock();
        let round = state
            .rounds
            .round(round_id)
            .ok_or(SaladError::UnknownRound(round_id))?;
        settlement::claimable(round, state.bets.bet(round_id, participant), participant)
    }

    pub fn round_duration(&self) -> u64 {
        self.state.lock().rounds.round_duration()
    }

    pub fn next_token(&self) -> Token {
        self.state.lock().rounds.next_token().clone()
    }
}

impl RandomnessConsumer for Salad {
    fn consume_randomness(&self, caller: &Address, request_id: RoundId, word: RandomWord) -> SaladResult<()> {
        Salad::consume_randomness(self, caller, request_id, word).map(|_| ())
    }
}

fn current_round(rounds: &RoundBook, round_id: RoundId) -> SaladResult<&Round> {
    rounds
        .round(round_id)
        .ok_or_else(|| SaladError::InvariantViolation(format!("current round {} missing", round_id)))
}

fn round_created(round: &Round) -> SaladEvent {
    SaladEvent::RoundCreated {
        round_id: round.id,
        created_at: round.created_at,
        expires_at: round.expires_at,
        stake_token: round.stake_token.clone(),
    }
}

fn log_rejection<T>(operation: &'static str, caller: &Address, round_id: RoundId, result: &SaladResult<T>) {
    if let Err(e) = result {
        if e.is_no_win() {
            debug!(operation, round_id, caller = %caller, error = %e, "no reward");
        } else {
            warn!(operation, round_id, caller = %caller, error = %e, "call rejected");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::clock::ManualClock;
    use crate::ledger::InMemoryLedger;
    use crate::oracle::ManualOracle;

    const HOUR: u64 = 3_600;

    struct Fixture {
        salad: Salad,
        cap: AdminCap,
        ledger: Arc<InMemoryLedger>,
        oracle: Arc<ManualOracle>,
        clock: Arc<ManualClock>,
    }

    fn fixture() -> Fixture {
        let ledger = Arc::new(InMemoryLedger::new(0, Address::from("treasury")));
        let oracle = Arc::new(ManualOracle::new("oracle"));
        let clock = Arc::new(ManualClock::new(1_000));
        let config = GameConfig {
            min_stake: 1,
            ..GameConfig::default()
        };
        let services = GameServices {
            ledger: ledger.clone(),
            oracle: oracle.clone(),
            clock: clock.clone(),
            events: Arc::new(EventBus::default()),
        };
        let (salad, cap) = Salad::new(&config, services).unwrap();
        Fixture {
            salad,
            cap,
            ledger,
            oracle,
            clock,
        }
    }

    fn funded(fx: &Fixture, name: &str, amount: Amount) -> Address {
        let who = Address::from(name);
        fx.ledger.deposit(&who, &Token::native(), amount);
        who
    }

    #[test]
    fn test_first_bet_creates_round_zero() {
        let fx = fixture();
        let alice = funded(&fx, "alice", 100);
        assert!(fx.salad.round(0).is_none());

        fx.salad
            .place_bet(&alice, 0, Outcome::Tomato, Outcome::Onion, 100, None)
            .unwrap();

        let round = fx.salad.round(0).unwrap();
        assert_eq!(round.created_at, 1_000);
        assert_eq!(round.expires_at, 1_000 + HOUR);
        assert_eq!(round.bucket(Outcome::Tomato), 100);
        assert_eq!(fx.salad.current_round_id(), 0);
    }

    #[test]
    fn test_rejected_first_bet_creates_nothing() {
        let fx = fixture();
        let alice = Address::from("alice");

        let err = fx
            .salad
            .place_bet(&alice, 0, Outcome::Tomato, Outcome::Onion, 100, None)
            .unwrap_err();

        assert!(matches!(err, SaladError::Ledger(_)));
        assert!(fx.salad.round(0).is_none());
        assert!(fx.salad.events().history().is_empty());
    }

    #[test]
    fn test_settlement_waits_for_expiry() {
        let fx = fixture();
        let alice = funded(&fx, "alice", 100);
        fx.salad
            .place_bet(&alice, 0, Outcome::Tomato, Outcome::Onion, 100, None)
            .unwrap();

        let err = fx.salad.start_settlement(&alice, 0).unwrap_err();
        assert!(matches!(err, SaladError::NotExpiredYet { .. }));

        fx.clock.advance(HOUR + 1);
        fx.salad.start_settlement(&alice, 0).unwrap();
        assert_eq!(fx.oracle.requests(), vec![0]);
        assert!(matches!(
            fx.salad.start_settlement(&alice, 0),
            Err(SaladError::AlreadySettling(0))
        ));
    }

    #[test]
    fn test_failed_oracle_request_keeps_round_open() {
        let fx = fixture();
        let alice = funded(&fx, "alice", 100);
        fx.salad
            .place_bet(&alice, 0, Outcome::Tomato, Outcome::Onion, 100, None)
            .unwrap();
        fx.clock.advance(HOUR + 1);

        fx.oracle.fail_next_request();
        assert!(matches!(fx.salad.start_settlement(&alice, 0), Err(SaladError::Oracle(_))));
        assert!(fx.salad.round(0).unwrap().is_open());

        fx.salad.start_settlement(&alice, 0).unwrap();
    }

    #[test]
    fn test_only_oracle_delivers() {
        let fx = fixture();
        let mallory = Address::from("mallory");

        let err = fx
            .salad
            .consume_randomness(&mallory, 0, RandomWord::from_u64(1))
            .unwrap_err();
        assert!(matches!(err, SaladError::Unauthorized(_)));
    }

    #[test]
    fn test_admin_setters() {
        let fx = fixture();

        fx.salad.set_round_duration(&fx.cap, 2 * HOUR).unwrap();
        assert_eq!(fx.salad.round_duration(), 2 * HOUR);
        assert!(matches!(
            fx.salad.set_round_duration(&fx.cap, 60),
            Err(SaladError::InvalidDuration { .. })
        ));

        let usdc = GameConfig::default().allowed_tokens[1].clone();
        fx.salad.set_token_for_next_round(&fx.cap, usdc.clone()).unwrap();
        assert_eq!(fx.salad.next_token(), usdc);
        assert!(matches!(
            fx.salad.set_token_for_next_round(&fx.cap, Token::new("DOGE", None)),
            Err(SaladError::TokenNotWhitelisted(_))
        ));
    }

    #[test]
    fn test_foreign_cap_rejected() {
        let fx = fixture();
        let other = fixture();

        assert!(matches!(
            fx.salad.set_round_duration(&other.cap, 2 * HOUR),
            Err(SaladError::Unauthorized(_))
        ));
        assert_eq!(fx.salad.round_duration(), HOUR);
    }

    #[test]
    fn test_duration_change_applies_to_next_round() {
        let fx = fixture();
        let alice = funded(&fx, "alice", 100);
        fx.salad
            .place_bet(&alice, 0, Outcome::Tomato, Outcome::Onion, 100, None)
            .unwrap();

        fx.salad.set_round_duration(&fx.cap, 2 * HOUR).unwrap();
        assert_eq!(fx.salad.round(0).unwrap().expires_at, 1_000 + HOUR);

        fx.clock.advance(HOUR + 1);
        fx.salad.start_settlement(&alice, 0).unwrap();
        fx.oracle.deliver(&fx.salad, 0, RandomWord::from_u64(1)).unwrap();

        let next = fx.salad.round(1).unwrap();
        assert_eq!(next.expires_at - next.created_at, 2 * HOUR);
    }
}
