//! Haven CLI - storage inspector and chat-state driver.
//!
//! Wires the persistence stack the way the chat front end does at startup:
//! probe the tiers once, run the version gate, then load roster, ledger,
//! and settings. Each subcommand exercises one public store or ledger
//! operation; the chat completion call itself is out of scope here.

mod config;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use haven_state::Session;
use haven_store::{
    DurableStore, FileTier, MemoryTier, StorageTier, StoreNotice, StoreNotifier, TierRank,
};
use haven_types::{AgentId, AgentProfile, Role};

use crate::config::HavenConfig;

const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "haven", version, about)]
struct Cli {
    /// Path to haven.toml (defaults to the platform config directory).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Probe the tier stack and report capabilities.
    Probe,
    /// Read a logical key.
    Get { key: String },
    /// Write a logical key.
    Set { key: String, value: String },
    /// Remove a logical key and all of its aliases.
    Remove { key: String },
    /// Scan every tier and alias for a recoverable prior value.
    Recover { key: String },
    /// Append a chat turn to an agent's history.
    Append {
        agent: String,
        role: RoleArg,
        content: String,
    },
    /// Print an agent's history.
    History { agent: String },
    /// Clear an agent's history.
    Clear { agent: String },
    /// List configured agents.
    Agents,
    /// Add or replace an agent profile.
    AddAgent {
        id: String,
        name: String,
        #[arg(long, default_value = "")]
        system_prompt: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum RoleArg {
    User,
    Assistant,
}

impl From<RoleArg> for Role {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::User => Role::User,
            RoleArg::Assistant => Role::Assistant,
        }
    }
}

/// Prints degraded-mode notices on stderr, keeping stdout parseable.
struct StderrNotifier;

impl StoreNotifier for StderrNotifier {
    fn notify(&self, notice: StoreNotice) {
        eprintln!("warning: {}", notice.message());
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

fn open_store(config: &HavenConfig) -> DurableStore {
    let mut primary = FileTier::new(TierRank::Primary, &config.primary_dir);
    if let Some(quota) = config.quota_bytes {
        primary = primary.with_quota(quota);
    }

    let tiers: Vec<Box<dyn StorageTier>> = vec![
        Box::new(primary),
        Box::new(FileTier::new(TierRank::Secondary, &config.secondary_dir)),
        Box::new(MemoryTier::new()),
    ];

    DurableStore::new(tiers)
        .with_device_class(config.device)
        .with_notifier(Box::new(StderrNotifier))
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = HavenConfig::load(cli.config.as_ref())?;
    let store = open_store(&config);

    match cli.command {
        Command::Probe => {
            let caps = store.capabilities();
            println!("primary:   {}", status(caps.primary_ok()));
            println!("secondary: {}", status(caps.secondary_ok()));
            println!("memory:    ok (always)");
            println!("durable:   {}", store.is_durable());
        }
        Command::Get { key } => {
            let session = Session::start(store, APP_VERSION);
            match session.store.get(&key) {
                Some(value) => println!("{value}"),
                None => println!("(absent)"),
            }
        }
        Command::Set { key, value } => {
            let mut session = Session::start(store, APP_VERSION);
            if session.store.set(&key, &value) {
                println!("ok");
            } else {
                anyhow::bail!("every tier rejected the write");
            }
        }
        Command::Remove { key } => {
            let mut session = Session::start(store, APP_VERSION);
            println!("removed: {}", session.store.remove(&key));
        }
        Command::Recover { key } => {
            let session = Session::start(store, APP_VERSION);
            match session.store.recover::<serde_json::Value>(&key) {
                Some(value) => println!("{value}"),
                None => println!("(nothing recoverable)"),
            }
        }
        Command::Append {
            agent,
            role,
            content,
        } => {
            let mut session = Session::start(store, APP_VERSION);
            if session
                .ledger
                .append(&mut session.store, &agent, role.into(), content)
            {
                println!("ok ({} entries)", session.ledger.history(&agent).len());
            } else {
                anyhow::bail!("append rejected: agent id must not be empty");
            }
        }
        Command::History { agent } => {
            let session = Session::start(store, APP_VERSION);
            for entry in session.ledger.history(&agent) {
                println!("{:>9}: {}", entry.role, entry.content);
            }
        }
        Command::Clear { agent } => {
            let mut session = Session::start(store, APP_VERSION);
            println!(
                "cleared: {}",
                session.ledger.clear(&mut session.store, &agent)
            );
        }
        Command::Agents => {
            let session = Session::start(store, APP_VERSION);
            if session.roster.is_empty() {
                println!("(no agents configured)");
            }
            for profile in session.roster.iter() {
                println!("{}  {}", profile.id, profile.name);
            }
        }
        Command::AddAgent {
            id,
            name,
            system_prompt,
        } => {
            let mut session = Session::start(store, APP_VERSION);
            let id = AgentId::new(id)?;
            let mut profile = AgentProfile::new(id, name);
            profile.system_prompt = system_prompt;
            if session.roster.upsert(&mut session.store, profile) {
                println!("ok ({} agents)", session.roster.len());
            } else {
                anyhow::bail!("roster save failed");
            }
        }
    }

    Ok(())
}

fn status(ok: bool) -> &'static str {
    if ok { "ok" } else { "unavailable" }
}
