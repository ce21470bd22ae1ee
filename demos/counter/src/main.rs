//! # Counter Demo
//!
//! One authority and two participants sharing a lobby and a row of counters.
//! Participants predict their own events, the authority confirms some of
//! them, and the predictions it never confirms expire.
//!
//! ```text
//! RUST_LOG=debug TANDEM_OPTIMISTIC_LIFETIME_SECS=0.5 cargo run -p counter-demo
//! ```

use std::env;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tandem_core::{Absent, Action, System, SystemConfig, Typed, ValidatorExt};
use tandem_relay::{Authority, Participant, RelayMessage};
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Dispatcher id reserved for events the host itself originates.
const ROOT_DISPATCHER: &str = "<ROOT_DISPATCHER>";

const LIFETIME_VAR: &str = "TANDEM_OPTIMISTIC_LIFETIME_SECS";
const DEFAULT_LIFETIME_SECS: f64 = 0.5;

// ============================================================================
// Lobby
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Lobby {
    counter: i64,
    joiners: Vec<String>,
}

#[derive(Clone)]
struct LobbyActions {
    joiner: Action<String>,
    increment: Action<i64>,
    decrement: Action<i64>,
    clear: Action<()>,
}

fn lobby_system(config: &SystemConfig) -> Result<(System<Lobby>, LobbyActions)> {
    let mut system = System::builder(Lobby::default()).with_config(config).build();

    let joiner = system.register(
        "joiner",
        Typed::<String>::new().check("min_length", "must be at least 3 characters", |name| {
            name.chars().count() >= 3
        }),
        |state: &mut Lobby, dispatcher: &str, name: &String| {
            // Only the host announces joiners
            if dispatcher == ROOT_DISPATCHER && !state.joiners.contains(name) {
                state.joiners.push(name.clone());
            }
        },
    )?;

    let amount = || Typed::<i64>::new().check("min", "must be at least 1", |n| *n >= 1);
    let increment = system.register("increment", amount(), |state: &mut Lobby, _: &str, n: &i64| {
        state.counter += *n;
    })?;
    let decrement = system.register("decrement", amount(), |state: &mut Lobby, _: &str, n: &i64| {
        state.counter -= *n;
    })?;

    let clear = system.register("clear", Absent, |state: &mut Lobby, _: &str, _: &()| {
        state.counter = 0;
    })?;

    Ok((
        system,
        LobbyActions {
            joiner,
            increment,
            decrement,
            clear,
        },
    ))
}

// ============================================================================
// Counters
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Counters {
    counters: [i64; 5],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Increment {
    counter_index: usize,
    amount: i64,
}

fn counters_system(config: &SystemConfig) -> Result<(System<Counters>, Action<Increment>)> {
    let mut system = System::builder(Counters::default()).with_config(config).build();

    let increment = system.register(
        "increment",
        Typed::<Increment>::new()
            .check("max", "counterIndex must be at most 4", |p| p.counter_index <= 4)
            .check("positive", "amount must be positive", |p| p.amount > 0),
        |state: &mut Counters, _: &str, payload: &Increment| {
            state.counters[payload.counter_index] += payload.amount;
        },
    )?;

    Ok((system, increment))
}

// ============================================================================
// Wiring
// ============================================================================

fn load_config() -> Result<SystemConfig> {
    let optimistic_lifetime_secs = match env::var(LIFETIME_VAR) {
        Ok(raw) => raw
            .trim()
            .parse::<f64>()
            .with_context(|| format!("{LIFETIME_VAR} must be a number of seconds, got {raw:?}"))?,
        Err(_) => DEFAULT_LIFETIME_SECS,
    };
    Ok(SystemConfig {
        optimistic_lifetime_secs,
    })
}

/// A participant that logs both of its channels.
fn participant<S>(id: &str, mut system: System<S>) -> Participant<S>
where
    S: Clone + Serialize + std::fmt::Debug + Send + Sync + 'static,
{
    let confirmed_id = id.to_string();
    system.on_confirmed_change(move |state| info!(participant = %confirmed_id, ?state, "confirmed"));
    let optimistic_id = id.to_string();
    system.on_optimistic_change(move |state| info!(participant = %optimistic_id, ?state, "optimistic"));
    Participant::new(id, system)
}

fn catch_up<S>(participant: &mut Participant<S>, rx: &mut broadcast::Receiver<RelayMessage>) -> Result<()>
where
    S: Clone + Serialize + 'static,
{
    let applied = participant
        .catch_up(rx)
        .with_context(|| format!("participant {} fell out of sync", participant.id()))?;
    info!(participant = %participant.id(), applied, "caught up");
    Ok(())
}

async fn run_lobby(config: &SystemConfig) -> Result<()> {
    info!("lobby: starting");
    let (system, actions) = lobby_system(config)?;
    let authority = Authority::new(system);

    let mut alice = participant("alice", lobby_system(config)?.0);
    let mut bob = participant("bob", lobby_system(config)?.0);
    let mut alice_rx = authority.subscribe();
    let mut bob_rx = authority.subscribe();

    // The host announces both joiners
    authority.submit(ROOT_DISPATCHER, &actions.joiner.event(&"alice".to_string())?).await?;
    authority.submit(ROOT_DISPATCHER, &actions.joiner.event(&"bob".to_string())?).await?;

    // Too short, rejected before anything changes
    if let Err(e) = authority.submit(ROOT_DISPATCHER, &actions.joiner.event(&"al".to_string())?).await {
        info!(error = %e, "lobby: joiner rejected");
    }
    // Accepted but ignored: only the host may announce joiners
    authority.submit("bob", &actions.joiner.event(&"mallory".to_string())?).await?;

    catch_up(&mut alice, &mut alice_rx)?;
    catch_up(&mut bob, &mut bob_rx)?;

    // alice predicts +3 and bob predicts -1; only alice's reaches the authority
    let up = actions.increment.event(&3)?;
    let down = actions.decrement.event(&1)?;
    alice.propose(&up)?;
    bob.propose(&down)?;
    authority.submit(alice.id(), &up).await?;

    catch_up(&mut alice, &mut alice_rx)?;
    catch_up(&mut bob, &mut bob_rx)?;
    info!(
        pending = bob.system().pending_len(),
        optimistic = ?bob.system().optimistic_state(),
        "lobby: bob still predicts his decrement"
    );

    authority.submit(bob.id(), &down).await?;
    authority.submit(ROOT_DISPATCHER, &actions.clear.bare()).await?;
    catch_up(&mut alice, &mut alice_rx)?;
    catch_up(&mut bob, &mut bob_rx)?;

    info!(state = ?authority.source_state().await, "lobby: authority");
    Ok(())
}

async fn run_counters(config: &SystemConfig) -> Result<()> {
    info!(lifetime_secs = config.optimistic_lifetime_secs, "counters: starting");
    let (system, increment) = counters_system(config)?;
    let authority = Authority::new(system);

    let mut alice = participant("alice", counters_system(config)?.0);
    let mut bob = participant("bob", counters_system(config)?.0);
    let (history, mut alice_rx) = authority.join().await;
    alice.resync(&history);
    let mut bob_rx = authority.subscribe();

    let event = |counter_index, amount| {
        increment.event(&Increment {
            counter_index,
            amount,
        })
    };

    authority.submit("root", &event(1, 2)?).await?;

    // Confirmed
    let first = event(0, 1)?;
    alice.propose(&first)?;
    authority.submit(alice.id(), &first).await?;

    // Never confirmed; expires
    alice.propose(&event(0, 3)?)?;
    bob.propose(&event(3, 4)?)?;

    catch_up(&mut alice, &mut alice_rx)?;
    catch_up(&mut bob, &mut bob_rx)?;

    let wait = config.optimistic_lifetime().to_std().unwrap_or_default();
    info!(?wait, "counters: waiting for unconfirmed predictions to expire");
    tokio::time::sleep(wait).await;

    alice.system_mut().flush_expired_optimistic_state();
    bob.system_mut().flush_expired_optimistic_state();

    info!(
        authority = ?authority.source_state().await,
        alice = ?alice.system().optimistic_state(),
        bob = ?bob.system().optimistic_state(),
        "counters: settled"
    );
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tandem_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = load_config()?;

    run_lobby(&config).await?;
    run_counters(&config).await?;

    info!("demo complete");
    Ok(())
}
