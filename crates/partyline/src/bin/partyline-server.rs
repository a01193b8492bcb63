//! Runs a Partyline server with anonymous identities.
//!
//! ```text
//! RUST_LOG=partyline=debug partyline-server --bind 0.0.0.0:8080 --decks decks.json
//! ```

use std::path::PathBuf;

use clap::Parser;
use partyline::prelude::*;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

#[derive(Debug, Parser)]
#[command(name = "partyline-server", version, about = "Party game room server")]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "PARTYLINE_BIND", default_value = "127.0.0.1:8080")]
    bind: String,

    /// Seconds a dropped player keeps their seat.
    #[arg(long, env = "PARTYLINE_GRACE_SECS", default_value_t = 30)]
    grace_secs: u64,

    /// JSON file of decks keyed by game kind. Kinds it omits keep the
    /// built-in deck.
    #[arg(long, env = "PARTYLINE_DECKS")]
    decks: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), PartylineError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("partyline=info,partyline_room=info"));
    fmt::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .init();

    let args = Args::parse();

    let catalog = match &args.decks {
        Some(path) => {
            let json = tokio::fs::read_to_string(path).await?;
            let decks = DeckSet::from_json(&json)?;
            tracing::info!(path = %path.display(), "loaded decks");
            GameCatalog::with_decks(&decks)
        }
        None => GameCatalog::standard(),
    };

    let server = PartylineServer::builder()
        .bind(&args.bind)
        .session_config(SessionConfig {
            reconnect_grace_secs: args.grace_secs,
            ..SessionConfig::default()
        })
        .catalog(catalog)
        .build(AnonymousIdentity)
        .await?;

    tracing::info!(addr = %server.local_addr()?, "listening");

    tokio::select! {
        result = server.run() => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
            Ok(())
        }
    }
}
