//! Salad command line: simulations, sample configs and VRF proof checks

use clap::{Parser, Subcommand};
use rand::{rngs::StdRng, Rng, SeedableRng};
use salad::{
    common::{Address, Amount, ManualClock, RoundId},
    config::generate_sample_config,
    games::{Outcome, RoundStatus, Salad},
    logging,
    oracle::{VrfBundle, VrfEngine},
    ConfigLoader, SaladError, ServiceBuilder,
};
use std::{path::PathBuf, sync::Arc, time::Duration};
use tokio::time::sleep;
use tracing::info;

#[derive(Parser)]
#[command(name = "salad")]
#[command(about = "Round-based pari-mutuel pool over six outcomes")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Play rounds with random bettors against an in-memory ledger
    Simulate {
        #[arg(short, long, default_value = "5")]
        rounds: u64,

        #[arg(short, long, default_value = "8")]
        players: usize,

        #[arg(short, long, default_value = "7")]
        seed: u64,

        /// Write the VRF bundle of the last round here
        #[arg(long)]
        proof_out: Option<PathBuf>,

        /// Write the full event history here (JSON)
        #[arg(long)]
        events_out: Option<PathBuf>,
    },
    /// Write a sample configuration file
    SampleConfig {
        #[arg(default_value = "salad.toml")]
        path: String,
    },
    /// Check a VRF bundle written by `simulate --proof-out`
    VerifyProof {
        path: PathBuf,

        /// Expected input message; defaults to the one in the bundle
        #[arg(long)]
        input: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut loader = ConfigLoader::new();
    if let Some(path) = &cli.config {
        loader = loader.with_path(path);
    }
    let mut config = loader.load()?;
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    logging::init(&config.logging);

    match cli.command {
        Commands::Simulate {
            rounds,
            players,
            seed,
            proof_out,
            events_out,
        } => run_simulation(config, rounds, players, seed, proof_out, events_out).await,
        Commands::SampleConfig { path } => {
            generate_sample_config(&path)?;
            println!("Sample configuration written to {}", path);
            Ok(())
        }
        Commands::VerifyProof { path, input } => verify_proof(path, input),
    }
}

async fn run_simulation(
    config: salad::SaladConfig,
    rounds: u64,
    players: usize,
    seed: u64,
    proof_out: Option<PathBuf>,
    events_out: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let clock = Arc::new(ManualClock::new(chrono::Utc::now().timestamp().max(0) as u64));
    let container = ServiceBuilder::new()
        .with_config(config)
        .with_clock(clock.clone())
        .build()?;
    let handle = container.launch_salad(VrfEngine::from_seed(seed))?;
    let salad = handle.salad.clone();
    let ledger = container.ledger();

    let game = container.config().game.clone();
    let token = game.stake_token.clone();
    let keeper = Address::from("keeper");
    let bettors: Vec<Address> = (0..players)
        .map(|i| Address::new(format!("player-{}", i)))
        .collect();
    let bankroll = game.min_stake() * 1_000 * rounds.max(1) as Amount;
    for bettor in &bettors {
        ledger.deposit(bettor, &token, bankroll);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    println!("Simulating {} rounds with {} players (seed {})", rounds, players, seed);

    let mut last_round = None;
    for _ in 0..rounds {
        let round_id = salad.current_round_id();
        for (i, bettor) in bettors.iter().enumerate() {
            let primary = random_outcome(&mut rng);
            let secondary = random_outcome(&mut rng);
            let amount = rng.gen_range(game.min_stake()..=game.min_stake() * 10);
            let referrer = (i > 0).then(|| &bettors[0]);
            salad.place_bet(bettor, round_id, primary, secondary, amount, referrer)?;

            if rng.gen_bool(0.25) {
                salad.increase_bet(bettor, round_id, random_outcome(&mut rng), game.min_stake())?;
            }
        }

        clock.advance(salad.round_duration() + 1);
        salad.start_settlement(&keeper, round_id)?;
        wait_for_settlement(&salad, round_id).await?;

        let round = salad.round(round_id).ok_or(SaladError::UnknownRound(round_id))?;
        let mut paid: Amount = 0;
        let mut winners = 0;
        for bettor in &bettors {
            match salad.claim(bettor, round_id) {
                Ok(reward) => {
                    paid += reward;
                    winners += 1;
                }
                Err(e) if e.is_no_win() => {}
                Err(e) => return Err(e.into()),
            }
        }

        println!(
            "round {:>3}: spoiled {:<8} pool {:>10} paid {:>10} to {:>2} winners{}",
            round_id,
            round.winning_outcome.map(|o| o.to_string()).unwrap_or_default(),
            round.total_pool(),
            paid,
            winners,
            if round.jackpot { "  JACKPOT" } else { "" }
        );
        last_round = Some(round_id);
    }

    println!();
    println!("pool balance:     {}", ledger.pool_balance(&token));
    println!("treasury balance: {}", ledger.treasury_balance(&token));

    if let (Some(path), Some(round_id)) = (proof_out, last_round) {
        if let Some(bundle) = handle.oracle.bundle(round_id) {
            std::fs::write(&path, serde_json::to_string_pretty(&bundle)?)?;
            println!("VRF bundle for round {} written to {}", round_id, path.display());
        }
    }
    if let Some(path) = events_out {
        let history = container.events().history();
        std::fs::write(&path, serde_json::to_string_pretty(&history)?)?;
        println!("{} events written to {}", history.len(), path.display());
    }

    handle.shutdown();
    Ok(())
}

fn random_outcome(rng: &mut StdRng) -> Outcome {
    Outcome::ALL[rng.gen_range(0..Outcome::ALL.len())]
}

async fn wait_for_settlement(salad: &Salad, round_id: RoundId) -> Result<(), SaladError> {
    for _ in 0..500 {
        if salad.round(round_id).map(|round| round.status) == Some(RoundStatus::Settled) {
            return Ok(());
        }
        sleep(Duration::from_millis(10)).await;
    }
    Err(SaladError::NotSettled(round_id))
}

fn verify_proof(path: PathBuf, input: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let bundle: VrfBundle = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
    let expected = input.unwrap_or_else(|| bundle.input_message.clone());

    let valid = VrfEngine::verify_bundle(&bundle, &expected)?;
    info!(path = %path.display(), valid, "proof checked");
    if !valid {
        println!("INVALID proof for input {:?}", expected);
        std::process::exit(1);
    }

    let word = bundle.word()?;
    println!("valid proof for input {:?}", expected);
    println!("word:    {}", word);
    println!("outcome: {}", Outcome::from_random(&word));
    println!("coin:    {}", salad::games::CoinSide::from_random(&word));
    Ok(())
}
