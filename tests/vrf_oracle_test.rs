//! Full wiring: games served by the VRF oracle worker.

use salad::common::{Address, ManualClock, Token};
use salad::config::ConfigBuilder;
use salad::errors::SaladError;
use salad::games::{BlockStatus, CoinSide, Outcome, RoundStatus};
use salad::oracle::VrfEngine;
use salad::{ServiceBuilder, ServiceContainer};
use std::sync::Arc;
use std::time::Duration;

fn container(clock: Arc<ManualClock>) -> ServiceContainer {
    let config = ConfigBuilder::new()
        .stake_bounds(1, 1_000_000)
        .commission_bps(0)
        .build()
        .unwrap();
    ServiceBuilder::new()
        .with_config(config)
        .with_clock(clock)
        .build()
        .unwrap()
}

async fn eventually(mut done: impl FnMut() -> bool) {
    for _ in 0..200 {
        if done() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}

#[tokio::test]
async fn test_round_settled_by_vrf_worker() {
    let clock = Arc::new(ManualClock::new(0));
    let container = container(clock.clone());
    let handle = container.launch_salad(VrfEngine::from_seed(99)).unwrap();
    let salad = handle.salad.clone();

    let alice = Address::from("alice");
    let bob = Address::from("bob");
    for who in [&alice, &bob] {
        container.ledger().deposit(who, &Token::native(), 1_000);
    }
    salad
        .place_bet(&alice, 0, Outcome::Tomato, Outcome::Onion, 100, None)
        .unwrap();
    salad
        .place_bet(&bob, 0, Outcome::Pepper, Outcome::Olive, 40, None)
        .unwrap();

    clock.advance(salad.round_duration() + 1);
    salad.start_settlement(&bob, 0).unwrap();
    eventually(|| salad.round(0).map(|round| round.status) == Some(RoundStatus::Settled)).await;

    let round = salad.round(0).unwrap();
    let bundle = handle.oracle.bundle(0).unwrap();
    assert!(VrfEngine::verify_bundle(&bundle, &VrfEngine::input_message(0, "salad")).unwrap());
    assert_eq!(round.randomness, Some(bundle.word().unwrap()));
    assert_eq!(round.winning_outcome, Some(Outcome::from_random(&bundle.word().unwrap())));
    assert_eq!(salad.current_round_id(), 1);

    handle.shutdown();
}

#[tokio::test]
async fn test_impostor_cannot_deliver() {
    let clock = Arc::new(ManualClock::new(0));
    let container = container(clock.clone());
    let handle = container.launch_salad(VrfEngine::from_seed(5)).unwrap();

    let alice = Address::from("alice");
    container.ledger().deposit(&alice, &Token::native(), 1_000);
    handle
        .salad
        .place_bet(&alice, 0, Outcome::Tomato, Outcome::Onion, 100, None)
        .unwrap();

    let forged = VrfEngine::from_seed(6).generate(0, "salad").word().unwrap();
    assert!(matches!(
        handle.salad.consume_randomness(&alice, 0, forged),
        Err(SaladError::Unauthorized(_))
    ));
    assert_eq!(handle.salad.round(0).unwrap().status, RoundStatus::Open);

    handle.shutdown();
}

#[tokio::test]
async fn test_donut_block_resolved_by_vrf_worker() {
    let clock = Arc::new(ManualClock::new(0));
    let container = container(clock);
    let handle = container.launch_donut(VrfEngine::from_seed(11));
    let donut = handle.donut.clone();

    let alice = Address::from("alice");
    let bob = Address::from("bob");
    for who in [&alice, &bob] {
        container.ledger().deposit(who, &Token::native(), 1_000);
    }
    donut.place_bet(&alice, 7, CoinSide::Heads, 100).unwrap();
    donut.place_bet(&bob, 7, CoinSide::Tails, 100).unwrap();
    donut.close_block(&alice, 7).unwrap();

    eventually(|| donut.block(7).map(|block| block.status) == Some(BlockStatus::Resolved)).await;

    let side = donut.block(7).unwrap().side.unwrap();
    let (winner, loser) = if side == CoinSide::Heads { (&alice, &bob) } else { (&bob, &alice) };
    assert_eq!(donut.claim(winner, 7).unwrap(), 200);
    assert!(matches!(donut.claim(loser, 7), Err(SaladError::NoRewardComputed(7))));
    assert_eq!(container.ledger().pool_balance(&Token::native()), 0);

    handle.shutdown();
}
