//! Steward - Entry Point
//!
//! Runs one agent inside the in-memory sandbox world. Each stdin line is a
//! chat message (`Name: text`, or plain text spoken by `--issuer`). The
//! world ticks at the configured rate in real time, or a fixed number of
//! ticks per line with `--ticks-per-line` for scripted runs.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{self, MissedTickBehavior};
use tracing::Instrument;
use tracing_subscriber::EnvFilter;

use steward::capability::CapabilityRegistry;
use steward::command::events::{drain, AgentEvent, EventSink};
use steward::core::config::AgentConfig;
use steward::core::error::{AgentError, Result};
use steward::core::types::{BlockPos, Vec3};
use steward::dispatch::AgentState;
use steward::llm::client::{LanguageModel, LlmClient, PassthroughModel};
use steward::world::{SandboxWorld, WorldEvent};

/// Upper bound on ticks run after the script ends
const DRAIN_TICK_LIMIT: u64 = 20_000;

/// Steward - autonomous voxel-world agent
#[derive(Parser, Debug)]
#[command(name = "steward")]
#[command(about = "Drive a voxel-world agent with natural language")]
struct Args {
    /// Agent configuration (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Capability document (TOML); the built-in one when omitted
    #[arg(long)]
    capabilities: Option<PathBuf>,

    /// Player speaking lines without a `Name:` prefix
    #[arg(long, default_value = "Alex")]
    issuer: String,

    /// Random seed for the sandbox layout and response phrasing
    #[arg(long)]
    seed: Option<u64>,

    /// Run this many ticks after each line instead of ticking in real time
    #[arg(long)]
    ticks_per_line: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("steward=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match &args.config {
        Some(path) => AgentConfig::load(path)?,
        None => AgentConfig::default(),
    };
    config.validate().map_err(AgentError::Configuration)?;

    let registry = match &args.capabilities {
        Some(path) => CapabilityRegistry::load(path)?,
        None => CapabilityRegistry::builtin()?,
    };
    tracing::info!(capabilities = registry.len(), "Capability registry loaded");

    let model: Box<dyn LanguageModel> = match LlmClient::from_env(&config.llm) {
        Ok(client) => {
            tracing::info!(provider = ?client.provider(), model = client.model(), "Language model ready");
            Box::new(client)
        }
        Err(e) => {
            tracing::warn!(error = %e, "No language model, typed text is treated as model output");
            Box::new(PassthroughModel)
        }
    };

    let seed = args.seed.unwrap_or_else(rand::random);
    let (events, event_rx) = EventSink::channel();
    let mut world = sandbox(&config.agent.name, &args.issuer, seed);
    let mut agent = AgentState::new(Arc::new(config), Arc::new(registry), events, seed);

    let span = tracing::info_span!("session", id = %agent.session_id(), seed);
    run(&args, model.as_ref(), &mut agent, &mut world, event_rx)
        .instrument(span)
        .await
}

async fn run(
    args: &Args,
    model: &dyn LanguageModel,
    agent: &mut AgentState,
    world: &mut SandboxWorld,
    mut event_rx: UnboundedReceiver<AgentEvent>,
) -> Result<()> {
    println!("{} is online. Mention @{} to give it orders.", agent.name(), agent.name());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    if let Some(ticks) = args.ticks_per_line {
        while let Some(line) = lines.next_line().await? {
            handle_line(args, model, agent, world, &line).await;
            for _ in 0..ticks {
                step(agent, world);
            }
            flush_events(agent.name(), &mut event_rx);
        }

        let mut spent = 0;
        while agent.dispatcher().active().is_some() && spent < DRAIN_TICK_LIMIT {
            step(agent, world);
            spent += 1;
        }
        flush_events(agent.name(), &mut event_rx);
    } else {
        let rate = u64::from(agent_tick_rate(agent));
        let mut interval = time::interval(Duration::from_millis((1000 / rate).max(1)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                line = lines.next_line() => match line? {
                    Some(line) => handle_line(args, model, agent, world, &line).await,
                    None => break,
                },
                _ = interval.tick() => step(agent, world),
            }
            flush_events(agent.name(), &mut event_rx);
        }
    }

    agent.reset(world);
    flush_events(agent.name(), &mut event_rx);
    Ok(())
}

fn agent_tick_rate(agent: &AgentState) -> u32 {
    agent.config().agent.tick_rate_hz.max(1)
}

async fn handle_line(
    args: &Args,
    model: &dyn LanguageModel,
    agent: &mut AgentState,
    world: &mut SandboxWorld,
    line: &str,
) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }

    let (issuer, message) = match line.split_once(':') {
        Some((name, text)) if !name.trim().is_empty() && !name.contains(char::is_whitespace) => {
            (name.trim(), text.trim())
        }
        _ => (args.issuer.as_str(), line),
    };

    if !agent.should_respond(issuer, message) {
        tracing::debug!(issuer, "Message not addressed to the agent");
        return;
    }

    let reply = agent.handle_message(model, world, issuer, message).await;
    for text in reply.lines() {
        println!("<{}> {}", agent.name(), text);
    }
}

/// Advance the world and the agent by one tick
fn step(agent: &mut AgentState, world: &mut SandboxWorld) {
    for event in world.step() {
        match event {
            WorldEvent::EntityDied(id) => agent.on_entity_died(id),
            WorldEvent::ItemPickedUp { name, count } => {
                tracing::debug!(item = %name, count, "Picked up");
            }
        }
    }
    agent.tick(world);
}

/// Mirror agent events to the log and print their chat lines
fn flush_events(name: &str, event_rx: &mut UnboundedReceiver<AgentEvent>) {
    for event in drain(event_rx) {
        match &event {
            AgentEvent::Completed { outcome, .. } if !outcome.success => {
                tracing::warn!(?event, "Task failed");
            }
            _ => tracing::info!(?event, "Agent event"),
        }
        if let Some(line) = event.chat_line() {
            println!("<{}> {}", name, line);
        }
    }
}

/// A small clearing with trees, animals and a few mobs
fn sandbox(agent_name: &str, issuer: &str, seed: u64) -> SandboxWorld {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut world = SandboxWorld::new(agent_name, Vec3::new(0.5, 64.0, 0.5));

    world.place_tree(BlockPos::new(8, 64, 3), "oak_log", 4);
    world.place_tree(BlockPos::new(-6, 64, -5), "birch_log", 5);

    let kinds = ["oak_log", "birch_log", "spruce_log", "dark_oak_log"];
    for _ in 0..6 {
        let x = rng.gen_range(-24..=24);
        let z = rng.gen_range(-24..=24);
        let kind = kinds[rng.gen_range(0..kinds.len())];
        let height = rng.gen_range(3..=6);
        world.place_tree(BlockPos::new(x, 64, z), kind, height);
    }

    world.spawn_player(issuer, Vec3::new(4.5, 64.0, 2.5));
    world.spawn_mob("zombie", Vec3::new(15.5, 64.0, 10.5), 20.0);
    world.spawn_mob("skeleton", Vec3::new(-18.5, 64.0, 12.5), 20.0);
    world.spawn_mob("cow", Vec3::new(-10.5, 64.0, 8.5), 10.0);
    world.spawn_mob("creeper", Vec3::new(20.5, 64.0, -3.5), 20.0);
    world.give_item("iron_sword", 1);

    world
}
