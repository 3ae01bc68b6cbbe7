//! Round lifecycle: creation, expiry, settling and settled.
//!
//! Checks are split from mutations so the pool service can validate a
//! whole call before committing any of it.

use crate::common::types::{RandomWord, RoundId, Timestamp, Token};
use crate::config::{MAX_ROUND_DURATION_SECS, MIN_ROUND_DURATION_SECS};
use crate::errors::{SaladError, SaladResult};
use crate::games::types::{Outcome, Round, RoundStatus};
use std::collections::BTreeMap;

/// Store of every round plus the parameters for the next one
#[derive(Debug, Clone)]
pub struct RoundBook {
    current_round_id: RoundId,
    round_duration: u64,
    next_token: Token,
    rounds: BTreeMap<RoundId, Round>,
}

impl RoundBook {
    pub fn new(round_duration: u64, next_token: Token) -> SaladResult<Self> {
        check_duration(round_duration)?;
        Ok(Self {
            current_round_id: 0,
            round_duration,
            next_token,
            rounds: BTreeMap::new(),
        })
    }

    pub fn current_round_id(&self) -> RoundId {
        self.current_round_id
    }

    pub fn round_duration(&self) -> u64 {
        self.round_duration
    }

    pub fn next_token(&self) -> &Token {
        &self.next_token
    }

    pub fn round(&self, round_id: RoundId) -> Option<&Round> {
        self.rounds.get(&round_id)
    }

    pub(crate) fn round_mut(&mut self, round_id: RoundId) -> Option<&mut Round> {
        self.rounds.get_mut(&round_id)
    }

    pub fn rounds(&self) -> impl Iterator<Item = &Round> {
        self.rounds.values()
    }

    /// The round a first bet would create, if the current id has none yet.
    ///
    /// Nothing is stored until `insert_created` is called.
    pub fn lazy_current(&self, now: Timestamp) -> Option<Round> {
        if self.rounds.contains_key(&self.current_round_id) {
            return None;
        }
        Some(Round::new(
            self.current_round_id,
            now,
            self.round_duration,
            self.next_token.clone(),
        ))
    }

    pub(crate) fn insert_created(&mut self, round: Round) {
        debug_assert_eq!(round.id, self.current_round_id);
        self.rounds.entry(round.id).or_insert(round);
    }

    /// Open → Settling preconditions
    pub fn check_begin_settlement(&self, round_id: RoundId, now: Timestamp) -> SaladResult<&Round> {
        let round = self
            .rounds
            .get(&round_id)
            .ok_or(SaladError::UnknownRound(round_id))?;

        if round.status != RoundStatus::Open {
            return Err(SaladError::AlreadySettling(round_id));
        }
        if !round.is_expired(now) {
            return Err(SaladError::NotExpiredYet {
                round_id,
                expires_at: round.expires_at,
            });
        }
        Ok(round)
    }

    pub(crate) fn mark_settling(&mut self, round_id: RoundId) {
        if let Some(round) = self.rounds.get_mut(&round_id) {
            debug_assert_eq!(round.status, RoundStatus::Open);
            round.status = RoundStatus::Settling;
        }
    }

    /// Settling → Settled preconditions. Anything else means the oracle
    /// delivered twice or for a round it was never asked about.
    pub fn check_complete_settlement(&self, round_id: RoundId) -> SaladResult<&Round> {
        match self.rounds.get(&round_id) {
            Some(round) if round.status == RoundStatus::Settling => Ok(round),
            _ => Err(SaladError::UnexpectedRandomness(round_id)),
        }
    }

    /// Record the result and open the next round immediately.
    pub(crate) fn complete_settlement(
        &mut self,
        round_id: RoundId,
        word: RandomWord,
        now: Timestamp,
    ) -> SaladResult<(Outcome, Round)> {
        self.check_complete_settlement(round_id)?;

        let outcome = Outcome::from_random(&word);
        if let Some(round) = self.rounds.get_mut(&round_id) {
            round.status = RoundStatus::Settled;
            round.winning_outcome = Some(outcome);
            round.randomness = Some(word);
            round.settled_at = Some(now);
        }

        let next_id = round_id + 1;
        let next = Round::new(next_id, now, self.round_duration, self.next_token.clone());
        self.current_round_id = next_id;
        self.rounds.insert(next_id, next.clone());

        Ok((outcome, next))
    }

    /// Applies to rounds created after the call
    pub(crate) fn set_round_duration(&mut self, secs: u64) -> SaladResult<u64> {
        check_duration(secs)?;
        Ok(std::mem::replace(&mut self.round_duration, secs))
    }

    pub(crate) fn set_next_token(&mut self, token: Token) -> Token {
        std::mem::replace(&mut self.next_token, token)
    }
}

fn check_duration(secs: u64) -> SaladResult<()> {
    if !(MIN_ROUND_DURATION_SECS..=MAX_ROUND_DURATION_SECS).contains(&secs) {
        return Err(SaladError::InvalidDuration {
            secs,
            min: MIN_ROUND_DURATION_SECS,
            max: MAX_ROUND_DURATION_SECS,
        });
    }
    Ok(())
}
