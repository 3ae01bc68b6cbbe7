//! Observable pool events for indexers and tests
//!
//! Every event is broadcast on a tokio channel, kept in a bounded
//! in-memory history when one is configured, and logged.

use crate::common::types::{Address, Amount, RandomWord, RoundId, Timestamp, Token};
use crate::games::types::{CoinSide, Outcome};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SaladEvent {
    RoundCreated {
        round_id: RoundId,
        created_at: Timestamp,
        expires_at: Timestamp,
        stake_token: Token,
    },
    BetPlaced {
        round_id: RoundId,
        participant: Address,
        primary: Outcome,
        secondary: Outcome,
        amount: Amount,
        credited: Amount,
        referrer: Option<Address>,
        is_leader: bool,
    },
    BetIncreased {
        round_id: RoundId,
        participant: Address,
        primary: Outcome,
        secondary: Outcome,
        amount: Amount,
        credited: Amount,
        total_stake: Amount,
        is_leader: bool,
    },
    ReferrerBound {
        participant: Address,
        referrer: Address,
    },
    SettlementStarted {
        round_id: RoundId,
        requested_by: Address,
        total_pool: Amount,
    },
    RoundSettled {
        round_id: RoundId,
        outcome: Outcome,
        randomness: RandomWord,
        jackpot: bool,
        leader: Option<Address>,
        total_pool: Amount,
    },
    RewardClaimed {
        round_id: RoundId,
        participant: Address,
        reward: Amount,
        jackpot: bool,
    },
    RoundDurationChanged {
        old_secs: u64,
        new_secs: u64,
    },
    NextTokenChanged {
        old: Token,
        new: Token,
    },
    DonutBetPlaced {
        block: u64,
        participant: Address,
        side: CoinSide,
        amount: Amount,
        credited: Amount,
        total_stake: Amount,
    },
    DonutBlockClosed {
        block: u64,
        total_pool: Amount,
    },
    DonutBlockResolved {
        block: u64,
        side: CoinSide,
        randomness: RandomWord,
        refund_only: bool,
    },
    DonutClaimed {
        block: u64,
        participant: Address,
        reward: Amount,
    },
}

impl SaladEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SaladEvent::RoundCreated { .. } => "round_created",
            SaladEvent::BetPlaced { .. } => "bet_placed",
            SaladEvent::BetIncreased { .. } => "bet_increased",
            SaladEvent::ReferrerBound { .. } => "referrer_bound",
            SaladEvent::SettlementStarted { .. } => "settlement_started",
            SaladEvent::RoundSettled { .. } => "round_settled",
            SaladEvent::RewardClaimed { .. } => "reward_claimed",
            SaladEvent::RoundDurationChanged { .. } => "round_duration_changed",
            SaladEvent::NextTokenChanged { .. } => "next_token_changed",
            SaladEvent::DonutBetPlaced { .. } => "donut_bet_placed",
            SaladEvent::DonutBlockClosed { .. } => "donut_block_closed",
            SaladEvent::DonutBlockResolved { .. } => "donut_block_resolved",
            SaladEvent::DonutClaimed { .. } => "donut_claimed",
        }
    }
}

/// Fan-out of pool events
pub struct EventBus {
    publisher: broadcast::Sender<SaladEvent>,
    history: Option<RwLock<VecDeque<SaladEvent>>>,
    history_limit: usize,
}

impl EventBus {
    /// `history_limit` of zero keeps no history. Past the limit the oldest
    /// event is dropped.
    pub fn new(capacity: usize, history_limit: usize) -> Self {
        let (publisher, _) = broadcast::channel(capacity.max(1));
        Self {
            publisher,
            history: (history_limit > 0).then(|| RwLock::new(VecDeque::new())),
            history_limit,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SaladEvent> {
        self.publisher.subscribe()
    }

    pub fn emit(&self, event: SaladEvent) {
        tracing::debug!(event = event.name(), payload = ?event, "salad event");
        if let Some(history) = &self.history {
            let mut history = history.write();
            if history.len() == self.history_limit {
                history.pop_front();
            }
            history.push_back(event.clone());
        }
        // No subscribers is fine
        let _ = self.publisher.send(event);
    }

    /// Recorded events, oldest first. Empty when history is disabled.
    pub fn history(&self) -> Vec<SaladEvent> {
        self.history
            .as_ref()
            .map(|history| history.read().iter().cloned().collect())
            .unwrap_or_default()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1_024, 10_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SaladEvent {
        SaladEvent::RewardClaimed {
            round_id: 3,
            participant: Address::from("alice"),
            reward: 150,
            jackpot: false,
        }
    }

    #[test]
    fn test_emit_reaches_subscriber_and_history() {
        let bus = EventBus::new(16, 8);
        let mut rx = bus.subscribe();

        bus.emit(sample());

        assert_eq!(rx.try_recv().unwrap(), sample());
        assert_eq!(bus.history(), vec![sample()]);
    }

    #[test]
    fn test_emit_without_subscribers_or_history() {
        let bus = EventBus::new(16, 0);
        bus.emit(sample());
        assert!(bus.history().is_empty());
    }

    #[test]
    fn test_history_keeps_most_recent() {
        let bus = EventBus::new(16, 3);
        for round_id in 0..5 {
            bus.emit(SaladEvent::SettlementStarted {
                round_id,
                requested_by: Address::from("keeper"),
                total_pool: 0,
            });
        }

        let kept: Vec<RoundId> = bus
            .history()
            .into_iter()
            .filter_map(|event| match event {
                SaladEvent::SettlementStarted { round_id, .. } => Some(round_id),
                _ => None,
            })
            .collect();
        assert_eq!(kept, vec![2, 3, 4]);
    }

    #[test]
    fn test_event_json_is_tagged() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["event"], "reward_claimed");
        assert_eq!(json["participant"], "alice");
        assert_eq!(sample().name(), "reward_claimed");
    }
}
