//! Settlement: turning the oracle's word into a result, and a settled
//! round into per-bet rewards.
//!
//! The drawn outcome is the spoiled ingredient. Bets whose primary
//! outcome was drawn lose their stake; every other bucket keeps its stake
//! and takes a fifth of the drawn bucket, split pro rata. If the round
//! leader backed the drawn outcome as their secondary (and not as their
//! primary), the leader takes the whole pool instead.
//!
//! Payouts never exceed the pool: a bucket `b` pays at most
//! `S[b] + S[r] / 5`, and at most five buckets pay.

use crate::common::types::{Address, Amount, RandomWord, RoundId, Timestamp};
use crate::errors::{SaladError, SaladResult};
use crate::games::bets::BetBook;
use crate::games::round::RoundBook;
use crate::games::types::{Bet, Outcome, Round, RoundStatus, OUTCOME_COUNT};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

/// Share of the drawn bucket each other bucket receives is `1 / LOSING_SHARE`
const LOSING_SHARE: Amount = (OUTCOME_COUNT - 1) as Amount;

/// Result of consuming randomness for a round
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settlement {
    pub round_id: RoundId,
    pub outcome: Outcome,
    pub jackpot: bool,
    pub leader: Option<Address>,
    pub total_pool: Amount,
    pub randomness: RandomWord,
    pub next_round: Round,
}

/// Jackpot fires when the drawn outcome is the leader's secondary and not
/// their primary.
pub fn is_jackpot(outcome: Outcome, leader_bet: Option<&Bet>) -> bool {
    match leader_bet {
        Some(bet) => bet.primary != outcome && bet.secondary == outcome,
        None => false,
    }
}

/// Apply the oracle's word to a settling round and open the next one.
pub(crate) fn settle(
    rounds: &mut RoundBook,
    bets: &BetBook,
    round_id: RoundId,
    word: RandomWord,
    now: Timestamp,
) -> SaladResult<Settlement> {
    let round = rounds.check_complete_settlement(round_id)?;
    let leader = round.leader.clone();
    let total_pool = round.total_pool();
    let leader_bet = leader.as_ref().and_then(|who| bets.bet(round_id, who)).cloned();

    let (outcome, next_round) = rounds.complete_settlement(round_id, word, now)?;
    let jackpot = is_jackpot(outcome, leader_bet.as_ref());
    if let Some(round) = rounds.round_mut(round_id) {
        round.jackpot = jackpot;
    }

    Ok(Settlement {
        round_id,
        outcome,
        jackpot,
        leader,
        total_pool,
        randomness: word,
        next_round,
    })
}

/// Reward owed to `caller` for `bet` in a settled round.
///
/// Errors with `NothingToClaim` when there is no bet or its primary
/// outcome was drawn. Zero is a valid return (a non-leader in a jackpot
/// round); `claimable` turns it into `NoRewardComputed`.
pub fn compute_reward(round: &Round, bet: Option<&Bet>, caller: &Address) -> SaladResult<Amount> {
    let drawn = match (round.status, round.winning_outcome) {
        (RoundStatus::Settled, Some(outcome)) => outcome,
        _ => return Err(SaladError::NotSettled(round.id)),
    };

    let bet = match bet {
        Some(bet) if bet.total_stake > 0 && bet.primary != drawn => bet,
        _ => return Err(SaladError::NothingToClaim(round.id)),
    };

    if round.jackpot {
        let is_leader = round.leader.as_ref() == Some(caller);
        return Ok(if is_leader { round.total_pool() } else { 0 });
    }

    proportional_reward(
        round.bucket(bet.primary),
        round.bucket(drawn),
        bet.total_stake,
    )
}

/// `floor((5·S[b] + S[r]) · v / (5·S[b]))`, numerator computed in full
/// before dividing.
///
/// The numerator can reach about `6 · 2^256`, so it is built as a
/// `BigUint`. The quotient is at most `S[b] + S[r] / 5`, which is bounded
/// by the round pool and always fits in `Amount`.
pub fn proportional_reward(own_bucket: Amount, drawn_bucket: Amount, stake: Amount) -> SaladResult<Amount> {
    // Every credited unit of a bet lands in its primary bucket, so a
    // live bet implies own_bucket >= stake > 0.
    if own_bucket == 0 || own_bucket < stake {
        return Err(SaladError::InvariantViolation(format!(
            "bucket {} smaller than stake {}",
            own_bucket, stake
        )));
    }

    let scaled_bucket = BigUint::from(own_bucket) * LOSING_SHARE;
    let numerator = (scaled_bucket.clone() + drawn_bucket) * stake;
    narrow(&(numerator / scaled_bucket), "reward")
}

/// `floor(value · mul / div)` with an unbounded intermediate
pub(crate) fn mul_div(value: Amount, mul: Amount, div: Amount, what: &'static str) -> SaladResult<Amount> {
    if div == 0 {
        return Err(SaladError::InvariantViolation(format!("{} divides by zero", what)));
    }
    narrow(&(BigUint::from(value) * mul / div), what)
}

fn narrow(value: &BigUint, what: &'static str) -> SaladResult<Amount> {
    Amount::try_from(value).map_err(|_| SaladError::ArithmeticOverflow(what))
}

/// Reward for a claim; zero is a rejection
pub fn claimable(round: &Round, bet: Option<&Bet>, caller: &Address) -> SaladResult<Amount> {
    match compute_reward(round, bet, caller)? {
        0 => Err(SaladError::NoRewardComputed(round.id)),
        reward => Ok(reward),
    }
}
