//! Per-round bet records, outcome accumulators and the round leader.

use crate::common::types::{Address, Amount, RoundId, Timestamp};
use crate::errors::{SaladError, SaladResult};
use crate::games::types::{Bet, Outcome, Round};
use std::collections::HashMap;

/// Stake bounds applied to every incoming stake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StakePolicy {
    pub min: Amount,
    pub max: Amount,
}

impl StakePolicy {
    pub fn check(&self, amount: Amount) -> SaladResult<()> {
        if amount == 0 {
            return Err(SaladError::ZeroValue);
        }
        if amount < self.min {
            return Err(SaladError::BelowMinimum {
                amount,
                minimum: self.min,
            });
        }
        if amount > self.max {
            return Err(SaladError::AboveMaximum {
                amount,
                maximum: self.max,
            });
        }
        Ok(())
    }
}

/// What a recorded bet changed, for events and logs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BetUpdate {
    pub total_stake: Amount,
    pub is_leader: bool,
    /// Set when this call bound the participant's referrer
    pub referrer_bound: Option<Address>,
}

#[derive(Debug, Default, Clone)]
pub struct BetBook {
    bets: HashMap<(RoundId, Address), Bet>,
    referrers: HashMap<Address, Address>,
}

impl BetBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bet(&self, round_id: RoundId, participant: &Address) -> Option<&Bet> {
        self.bets
            .get(&(round_id, participant.clone()))
            .filter(|bet| bet.total_stake > 0)
    }

    pub fn referrer_of(&self, participant: &Address) -> Option<&Address> {
        self.referrers.get(participant)
    }

    /// Bets of one round, in no particular order
    pub fn bets_in_round(&self, round_id: RoundId) -> impl Iterator<Item = (&Address, &Bet)> {
        self.bets
            .iter()
            .filter(move |((id, _), bet)| *id == round_id && bet.total_stake > 0)
            .map(|((_, who), bet)| (who, bet))
    }

    /// `place_bet` preconditions. `current_round_id` is the id bets are
    /// accepted for; `round` is that round, possibly not stored yet.
    pub fn check_place(
        &self,
        round: &Round,
        current_round_id: RoundId,
        requested_round_id: RoundId,
        participant: &Address,
        amount: Amount,
        policy: &StakePolicy,
        now: Timestamp,
    ) -> SaladResult<()> {
        if requested_round_id != current_round_id {
            return Err(SaladError::WrongRound {
                requested: requested_round_id,
                current: current_round_id,
            });
        }
        if !round.is_open() {
            return Err(SaladError::AlreadyClosed(round.id));
        }
        if round.is_expired(now) {
            return Err(SaladError::RoundExpired {
                round_id: round.id,
                expires_at: round.expires_at,
            });
        }
        if self.bet(round.id, participant).is_some() {
            return Err(SaladError::DuplicateBet(round.id));
        }
        policy.check(amount)?;
        check_headroom(round, amount)
    }

    /// Record a new bet with the amount the ledger actually credited.
    pub(crate) fn record_place(
        &mut self,
        round: &mut Round,
        participant: &Address,
        primary: Outcome,
        secondary: Outcome,
        credited: Amount,
        referrer: Option<&Address>,
    ) -> BetUpdate {
        round.sum_by_outcome[primary.index()] += credited;
        self.bets.insert(
            (round.id, participant.clone()),
            Bet {
                primary,
                secondary,
                total_stake: credited,
            },
        );

        let referrer_bound = referrer.and_then(|referrer| self.bind_referrer(participant, referrer));
        let is_leader = update_leader(round, participant, credited);

        BetUpdate {
            total_stake: credited,
            is_leader,
            referrer_bound,
        }
    }

    /// `increase_bet` preconditions
    pub fn check_increase(
        &self,
        round: &Round,
        participant: &Address,
        extra: Amount,
        policy: &StakePolicy,
        now: Timestamp,
    ) -> SaladResult<()> {
        if extra == 0 {
            return Err(SaladError::ZeroValue);
        }
        if self.bet(round.id, participant).is_none() {
            return Err(SaladError::NoBetPlaced(round.id));
        }
        if !round.is_open() {
            return Err(SaladError::AlreadyClosed(round.id));
        }
        if round.is_expired(now) {
            return Err(SaladError::RoundExpired {
                round_id: round.id,
                expires_at: round.expires_at,
            });
        }
        if extra > policy.max {
            return Err(SaladError::AboveMaximum {
                amount: extra,
                maximum: policy.max,
            });
        }
        check_headroom(round, extra)
    }

    /// Add to an existing bet. The primary outcome never changes; the
    /// secondary one is overwritten.
    pub(crate) fn record_increase(
        &mut self,
        round: &mut Round,
        participant: &Address,
        secondary: Outcome,
        credited: Amount,
    ) -> SaladResult<(Outcome, BetUpdate)> {
        let bet = self
            .bets
            .get_mut(&(round.id, participant.clone()))
            .filter(|bet| bet.total_stake > 0)
            .ok_or(SaladError::NoBetPlaced(round.id))?;

        round.sum_by_outcome[bet.primary.index()] += credited;
        bet.secondary = secondary;
        bet.total_stake += credited;

        let primary = bet.primary;
        let total_stake = bet.total_stake;
        let is_leader = update_leader(round, participant, total_stake);

        Ok((
            primary,
            BetUpdate {
                total_stake,
                is_leader,
                referrer_bound: None,
            },
        ))
    }

    /// Remove a bet for payout. The record is gone before any value moves.
    pub(crate) fn take_bet(&mut self, round_id: RoundId, participant: &Address) -> Option<Bet> {
        self.bets
            .remove(&(round_id, participant.clone()))
            .filter(|bet| bet.total_stake > 0)
    }

    /// Put back a bet whose payout failed
    pub(crate) fn restore_bet(&mut self, round_id: RoundId, participant: &Address, bet: Bet) {
        self.bets.insert((round_id, participant.clone()), bet);
    }

    /// First writer wins; self-referrals are ignored.
    fn bind_referrer(&mut self, participant: &Address, referrer: &Address) -> Option<Address> {
        if referrer == participant || self.referrers.contains_key(participant) {
            return None;
        }
        self.referrers.insert(participant.clone(), referrer.clone());
        Some(referrer.clone())
    }
}

/// Raise the leader stake to `candidate_total` if larger. A participant
/// reaching the current maximum, including by a tie, becomes the leader.
pub fn update_leader(round: &mut Round, participant: &Address, candidate_total: Amount) -> bool {
    round.leader_stake = round.leader_stake.max(candidate_total);
    if candidate_total == round.leader_stake {
        round.leader = Some(participant.clone());
    }
    round.leader.as_ref() == Some(participant)
}

/// The stake must fit in the bucket and the pool total
fn check_headroom(round: &Round, amount: Amount) -> SaladResult<()> {
    round
        .total_pool()
        .checked_add(amount)
        .map(|_| ())
        .ok_or(SaladError::ArithmeticOverflow("round pool"))
}
