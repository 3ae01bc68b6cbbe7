use crate::common::types::{Address, Amount, RandomWord, RoundId, Timestamp, Token};
use crate::errors::{SaladError, SaladResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of bettable outcomes per round
pub const OUTCOME_COUNT: usize = 6;

/// One of the six salad ingredients a round can land on
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Tomato,
    Cucumber,
    Lettuce,
    Onion,
    Pepper,
    Olive,
}

impl Outcome {
    pub const ALL: [Outcome; OUTCOME_COUNT] = [
        Outcome::Tomato,
        Outcome::Cucumber,
        Outcome::Lettuce,
        Outcome::Onion,
        Outcome::Pepper,
        Outcome::Olive,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// `random mod 6`
    pub fn from_random(word: &RandomWord) -> Self {
        Self::ALL[word.reduce(OUTCOME_COUNT as u64) as usize]
    }
}

impl TryFrom<u8> for Outcome {
    type Error = SaladError;

    fn try_from(value: u8) -> SaladResult<Self> {
        Self::ALL
            .get(value as usize)
            .copied()
            .ok_or(SaladError::InvalidOutcome(value))
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Outcome::Tomato => "tomato",
            Outcome::Cucumber => "cucumber",
            Outcome::Lettuce => "lettuce",
            Outcome::Onion => "onion",
            Outcome::Pepper => "pepper",
            Outcome::Olive => "olive",
        };
        f.write_str(name)
    }
}

/// Round lifecycle. Only ever moves forward.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum RoundStatus {
    Open,
    Settling,
    Settled,
}

impl fmt::Display for RoundStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoundStatus::Open => write!(f, "open"),
            RoundStatus::Settling => write!(f, "settling"),
            RoundStatus::Settled => write!(f, "settled"),
        }
    }
}

/// One betting epoch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Round {
    pub id: RoundId,
    pub created_at: Timestamp,
    /// Always `created_at + round duration at creation time`
    pub expires_at: Timestamp,
    pub status: RoundStatus,
    pub stake_token: Token,
    pub sum_by_outcome: [Amount; OUTCOME_COUNT],
    /// Largest single-participant cumulative stake
    pub leader_stake: Amount,
    pub leader: Option<Address>,
    pub winning_outcome: Option<Outcome>,
    /// Frozen at settlement so later claims never re-read the leader's bet
    pub jackpot: bool,
    /// Randomness that settled the round, kept for audit
    pub randomness: Option<RandomWord>,
    pub settled_at: Option<Timestamp>,
}

impl Round {
    pub fn new(id: RoundId, created_at: Timestamp, duration_secs: u64, stake_token: Token) -> Self {
        Self {
            id,
            created_at,
            expires_at: created_at.saturating_add(duration_secs),
            status: RoundStatus::Open,
            stake_token,
            sum_by_outcome: [0; OUTCOME_COUNT],
            leader_stake: 0,
            leader: None,
            winning_outcome: None,
            jackpot: false,
            randomness: None,
            settled_at: None,
        }
    }

    /// Sum of every bucket; equals the credited stake received by the round
    pub fn total_pool(&self) -> Amount {
        self.sum_by_outcome.iter().sum()
    }

    pub fn bucket(&self, outcome: Outcome) -> Amount {
        self.sum_by_outcome[outcome.index()]
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        now > self.expires_at
    }

    pub fn is_open(&self) -> bool {
        self.status == RoundStatus::Open
    }
}

/// A participant's position in one round
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Bet {
    /// Fixed when the bet is placed
    pub primary: Outcome,
    /// Overwritten by every increase
    pub secondary: Outcome,
    /// Cumulative credited stake; zero means no bet
    pub total_stake: Amount,
}

/// Coin side for the Donut game
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CoinSide {
    Heads,
    Tails,
}

impl CoinSide {
    /// Even words land heads
    pub fn from_random(word: &RandomWord) -> Self {
        if word.reduce(2) == 0 {
            CoinSide::Heads
        } else {
            CoinSide::Tails
        }
    }
}

impl fmt::Display for CoinSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoinSide::Heads => write!(f, "heads"),
            CoinSide::Tails => write!(f, "tails"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_domain() {
        for (i, outcome) in Outcome::ALL.iter().enumerate() {
            assert_eq!(outcome.index(), i);
            assert_eq!(Outcome::try_from(i as u8).unwrap(), *outcome);
        }
        assert!(matches!(Outcome::try_from(6), Err(SaladError::InvalidOutcome(6))));
    }

    #[test]
    fn test_outcome_from_random() {
        assert_eq!(Outcome::from_random(&RandomWord::from_u64(9)), Outcome::Onion);
        assert_eq!(Outcome::from_random(&RandomWord::from_u64(6)), Outcome::Tomato);
        assert_eq!(
            Outcome::from_random(&RandomWord::from_bytes([0xff; 32])),
            Outcome::Onion
        );
    }

    #[test]
    fn test_round_expiry() {
        let round = Round::new(0, 1_000, 3_600, Token::native());
        assert_eq!(round.expires_at, 4_600);
        assert!(!round.is_expired(4_600));
        assert!(round.is_expired(4_601));
        assert_eq!(round.total_pool(), 0);
    }

    #[test]
    fn test_status_ordering() {
        assert!(RoundStatus::Open < RoundStatus::Settling);
        assert!(RoundStatus::Settling < RoundStatus::Settled);
    }

    #[test]
    fn test_coin_side_from_random() {
        assert_eq!(CoinSide::from_random(&RandomWord::from_u64(4)), CoinSide::Heads);
        assert_eq!(CoinSide::from_random(&RandomWord::from_u64(5)), CoinSide::Tails);
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(serde_json::to_string(&Outcome::Olive).unwrap(), "\"olive\"");
        assert_eq!(serde_json::to_string(&RoundStatus::Settling).unwrap(), "\"settling\"");
    }
}
