//! Donut: a one-block coin flip on the same staking and claim rails as
//! the Salad pool.
//!
//! Bets on a side are collected per block height. Closing a block asks
//! the oracle for a word; even words land heads. Winners split the whole
//! block pro rata. If nobody backed the winning side, every bettor can
//! take their stake back.

use crate::common::traits::{Clock, Ledger, RandomnessConsumer, RandomnessOracle};
use crate::common::types::{Address, Amount, RandomWord, Token};
use crate::config::GameConfig;
use crate::errors::{SaladError, SaladResult};
use crate::events::{EventBus, SaladEvent};
use crate::games::bets::StakePolicy;
use crate::games::guard::ReentrancyGuard;
use crate::games::settlement::mul_div;
use crate::games::types::CoinSide;
use crate::services::GameServices;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub type BlockHeight = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockStatus {
    Open,
    Closing,
    Resolved,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DonutBlock {
    pub height: BlockHeight,
    pub status: BlockStatus,
    pub stake_token: Token,
    pub heads_stake: Amount,
    pub tails_stake: Amount,
    pub side: Option<CoinSide>,
    pub randomness: Option<RandomWord>,
    /// Nobody backed the drawn side; every stake is refundable
    pub refund_only: bool,
}

impl DonutBlock {
    fn new(height: BlockHeight, stake_token: Token) -> Self {
        Self {
            height,
            status: BlockStatus::Open,
            stake_token,
            heads_stake: 0,
            tails_stake: 0,
            side: None,
            randomness: None,
            refund_only: false,
        }
    }

    pub fn total_pool(&self) -> Amount {
        self.heads_stake + self.tails_stake
    }

    pub fn stake_on(&self, side: CoinSide) -> Amount {
        match side {
            CoinSide::Heads => self.heads_stake,
            CoinSide::Tails => self.tails_stake,
        }
    }

    fn stake_on_mut(&mut self, side: CoinSide) -> &mut Amount {
        match side {
            CoinSide::Heads => &mut self.heads_stake,
            CoinSide::Tails => &mut self.tails_stake,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DonutBet {
    pub side: CoinSide,
    pub total_stake: Amount,
}

#[derive(Default)]
struct DonutState {
    blocks: BTreeMap<BlockHeight, DonutBlock>,
    bets: HashMap<(BlockHeight, Address), DonutBet>,
}

pub struct Donut {
    state: Mutex<DonutState>,
    policy: StakePolicy,
    stake_token: Token,
    ledger: Arc<dyn Ledger>,
    oracle: Arc<dyn RandomnessOracle>,
    clock: Arc<dyn Clock>,
    events: Arc<EventBus>,
    guard: ReentrancyGuard,
    writer: Mutex<()>,
}

impl Donut {
    pub fn new(config: &GameConfig, services: GameServices) -> Self {
        Self {
            state: Mutex::new(DonutState::default()),
            policy: StakePolicy {
                min: config.min_stake(),
                max: config.max_stake(),
            },
            stake_token: config.stake_token.clone(),
            ledger: services.ledger,
            oracle: services.oracle,
            clock: services.clock,
            events: services.events,
            guard: ReentrancyGuard::new(),
            writer: Mutex::new(()),
        }
    }

    /// Bet on `side` for `height`, or add to an earlier bet on the same
    /// side. Returns the caller's total stake in the block.
    pub fn place_bet(&self, caller: &Address, height: BlockHeight, side: CoinSide, amount: Amount) -> SaladResult<Amount> {
        let _frame = self.guard.enter(caller)?;
        let _writer = self.writer.lock();

        let token = {
            let state = self.state.lock();
            if let Some(block) = state.blocks.get(&height) {
                if block.status != BlockStatus::Open {
                    return Err(SaladError::AlreadyClosed(height));
                }
            }
            if let Some(bet) = state.bets.get(&(height, caller.clone())) {
                if bet.side != side {
                    return Err(SaladError::DuplicateBet(height));
                }
            }
            self.policy.check(amount)?;

            state
                .blocks
                .get(&height)
                .map(|block| block.stake_token.clone())
                .unwrap_or_else(|| self.stake_token.clone())
        };
        let credited = {
            let _external = self.guard.external_call();
            self.ledger.receive(&token, caller, amount)?
        };

        let mut state = self.state.lock();

        let block = state
            .blocks
            .entry(height)
            .or_insert_with(|| DonutBlock::new(height, token));
        *block.stake_on_mut(side) += credited;

        let bet = state
            .bets
            .entry((height, caller.clone()))
            .or_insert(DonutBet { side, total_stake: 0 });
        bet.total_stake += credited;
        let total_stake = bet.total_stake;

        debug!(height, participant = %caller, %side, amount, credited, total_stake, "donut bet placed");
        self.events.emit(SaladEvent::DonutBetPlaced {
            block: height,
            participant: caller.clone(),
            side,
            amount,
            credited,
            total_stake,
        });
        Ok(total_stake)
    }

    /// Stop taking bets for `height` and request its coin.
    pub fn close_block(&self, caller: &Address, height: BlockHeight) -> SaladResult<()> {
        let _frame = self.guard.enter(caller)?;
        let _writer = self.writer.lock();

        let total_pool = match self.state.lock().blocks.get(&height) {
            None => return Err(SaladError::UnknownRound(height)),
            Some(block) if block.status != BlockStatus::Open => {
                return Err(SaladError::AlreadySettling(height))
            }
            Some(block) => block.total_pool(),
        };
        {
            let _external = self.guard.external_call();
            self.oracle.request_randomness(height)?;
        }
        if let Some(block) = self.state.lock().blocks.get_mut(&height) {
            block.status = BlockStatus::Closing;
        }

        info!(height, total_pool, at = self.clock.now(), "donut block closed");
        self.events.emit(SaladEvent::DonutBlockClosed {
            block: height,
            total_pool,
        });
        Ok(())
    }

    pub fn consume_randomness(&self, caller: &Address, height: BlockHeight, word: RandomWord) -> SaladResult<CoinSide> {
        if *caller != self.oracle.principal() {
            warn!(height, caller = %caller, "randomness from non-oracle caller");
            return Err(SaladError::Unauthorized(caller.to_string()));
        }
        let _frame = self.guard.enter(caller)?;
        let _writer = self.writer.lock();
        let mut state = self.state.lock();

        let block = match state.blocks.get_mut(&height) {
            Some(block) if block.status == BlockStatus::Closing => block,
            _ => {
                error!(height, "oracle delivered randomness for a block that is not closing");
                return Err(SaladError::UnexpectedRandomness(height));
            }
        };

        let side = CoinSide::from_random(&word);
        block.status = BlockStatus::Resolved;
        block.side = Some(side);
        block.randomness = Some(word);
        block.refund_only = block.stake_on(side) == 0;

        info!(height, %side, refund_only = block.refund_only, "donut block resolved");
        self.events.emit(SaladEvent::DonutBlockResolved {
            block: height,
            side,
            randomness: word,
            refund_only: block.refund_only,
        });
        Ok(side)
    }

    pub fn claim(&self, caller: &Address, height: BlockHeight) -> SaladResult<Amount> {
        let _frame = self.guard.enter(caller)?;
        let _writer = self.writer.lock();

        let (token, reward, bet) = {
            let mut state = self.state.lock();
            let block = state
                .blocks
                .get(&height)
                .ok_or(SaladError::UnknownRound(height))?;
            let reward = donut_reward(block, state.bets.get(&(height, caller.clone())))?;
            let token = block.stake_token.clone();
            let bet = state
                .bets
                .remove(&(height, caller.clone()))
                .ok_or(SaladError::NothingToClaim(height))?;
            (token, reward, bet)
        };

        let sent = {
            let _external = self.guard.external_call();
            self.ledger.send(&token, caller, reward)
        };
        if let Err(e) = sent {
            self.state.lock().bets.insert((height, caller.clone()), bet);
            return Err(e.into());
        }

        info!(height, participant = %caller, reward, "donut reward claimed");
        self.events.emit(SaladEvent::DonutClaimed {
            block: height,
            participant: caller.clone(),
            reward,
        });
        Ok(reward)
    }

    pub fn block(&self, height: BlockHeight) -> Option<DonutBlock> {
        self.state.lock().blocks.get(&height).cloned()
    }

    pub fn bet(&self, height: BlockHeight, participant: &Address) -> Option<DonutBet> {
        self.state.lock().bets.get(&(height, participant.clone())).copied()
    }

    pub fn pending_reward(&self, height: BlockHeight, participant: &Address) -> SaladResult<Amount> {
        let state = self.state.lock();
        let block = state
            .blocks
            .get(&height)
            .ok_or(SaladError::UnknownRound(height))?;
        donut_reward(block, state.bets.get(&(height, participant.clone())))
    }
}

impl RandomnessConsumer for Donut {
    fn consume_randomness(&self, caller: &Address, request_id: u64, word: RandomWord) -> SaladResult<()> {
        Donut::consume_randomness(self, caller, request_id, word).map(|_| ())
    }
}

/// `floor(stake * total / winning_side_total)`, or the stake back when
/// nobody backed the drawn side.
pub fn donut_reward(block: &DonutBlock, bet: Option<&DonutBet>) -> SaladResult<Amount> {
    let side = match (block.status, block.side) {
        (BlockStatus::Resolved, Some(side)) => side,
        _ => return Err(SaladError::NotSettled(block.height)),
    };
    let bet = bet
        .filter(|bet| bet.total_stake > 0)
        .ok_or(SaladError::NothingToClaim(block.height))?;

    if block.refund_only {
        return Ok(bet.total_stake);
    }
    if bet.side != side {
        return Err(SaladError::NoRewardComputed(block.height));
    }

    let winning_total = block.stake_on(side);
    if winning_total < bet.total_stake {
        return Err(SaladError::InvariantViolation(format!(
            "side total {} smaller than stake {}",
            winning_total, bet.total_stake
        )));
    }
    mul_div(bet.total_stake, block.total_pool(), winning_total, "donut reward")
}
