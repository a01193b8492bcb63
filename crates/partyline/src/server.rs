//! `PartylineServer` builder, accept loop, and session sweeper.
//!
//! Ties the layers together: transport → protocol → session → rooms.

use std::sync::Arc;
use std::time::{Duration, Instant};

use partyline_protocol::{Codec, JsonCodec};
use partyline_room::{
    GameCatalog, MemorySnapshotStore, RegistryConfig, RoomRegistry, SnapshotStore,
};
use partyline_session::{AnonymousIdentity, IdentityProvider, SessionConfig, SessionManager};
use partyline_transport::{Transport, WebSocketTransport};
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;

use crate::PartylineError;
use crate::handler::handle_connection;

/// Shared server state passed to each connection task.
pub(crate) struct ServerState<I: IdentityProvider, C: Codec> {
    pub(crate) sessions: Mutex<SessionManager>,
    pub(crate) registry: RoomRegistry,
    pub(crate) identity: I,
    pub(crate) codec: C,
    /// Origin for envelope timestamps.
    pub(crate) started: Instant,
    pub(crate) idle_timeout: Duration,
    pub(crate) sweep_interval: Duration,
}

impl<I: IdentityProvider, C: Codec> ServerState<I, C> {
    /// Milliseconds since the server started.
    pub(crate) fn now_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

/// Builder for configuring and starting a Partyline server.
///
/// ```rust,ignore
/// let server = PartylineServer::builder()
///     .bind("0.0.0.0:8080")
///     .catalog(GameCatalog::with_decks(&decks))
///     .build(AnonymousIdentity)
///     .await?;
/// server.run().await
/// ```
pub struct PartylineServerBuilder {
    bind_addr: String,
    session_config: SessionConfig,
    registry_config: RegistryConfig,
    catalog: GameCatalog,
    store: Option<Arc<dyn SnapshotStore>>,
}

impl PartylineServerBuilder {
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            session_config: SessionConfig::default(),
            registry_config: RegistryConfig::default(),
            catalog: GameCatalog::standard(),
            store: None,
        }
    }

    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    pub fn registry_config(mut self, config: RegistryConfig) -> Self {
        self.registry_config = config;
        self
    }

    /// Game rules and decks. Defaults to the built-in catalog.
    pub fn catalog(mut self, catalog: GameCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Where room snapshots go. Defaults to memory.
    pub fn snapshot_store(mut self, store: Arc<dyn SnapshotStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Binds the listener. Uses `JsonCodec` over WebSocket.
    pub async fn build<I: IdentityProvider>(
        self,
        identity: I,
    ) -> Result<PartylineServer<I, JsonCodec>, PartylineError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemorySnapshotStore::new()));

        let state = Arc::new(ServerState {
            idle_timeout: self.session_config.idle_timeout(),
            sweep_interval: self.session_config.sweep_interval(),
            sessions: Mutex::new(SessionManager::new(self.session_config)),
            registry: RoomRegistry::new(self.registry_config, Arc::new(self.catalog), store),
            identity,
            codec: JsonCodec,
            started: Instant::now(),
        });

        Ok(PartylineServer { transport, state })
    }
}

impl Default for PartylineServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Partyline server. Call [`run()`](Self::run) to serve.
pub struct PartylineServer<I: IdentityProvider = AnonymousIdentity, C: Codec = JsonCodec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<I, C>>,
}

impl PartylineServer {
    /// Starts configuring a server. The identity provider is chosen in
    /// [`PartylineServerBuilder::build`].
    pub fn builder() -> PartylineServerBuilder {
        PartylineServerBuilder::new()
    }
}

impl<I, C> PartylineServer<I, C>
where
    I: IdentityProvider,
    C: Codec,
{
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Accepts connections until the process ends, one task per
    /// connection, plus the session sweeper.
    pub async fn run(mut self) -> Result<(), PartylineError> {
        tracing::info!("Partyline server running");

        let sweeper = tokio::spawn(sweep_sessions(Arc::clone(&self.state)));
        let _sweeper = AbortOnDrop(sweeper);

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}

/// Aborts a background task when dropped.
pub(crate) struct AbortOnDrop<T>(pub(crate) tokio::task::JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Evicts players whose reconnect grace ran out: each one leaves every
/// room it still belongs to.
async fn sweep_sessions<I: IdentityProvider, C: Codec>(state: Arc<ServerState<I, C>>) {
    let mut ticker = tokio::time::interval(state.sweep_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let expired = {
            let mut sessions = state.sessions.lock().await;
            let expired = sessions.expire_stale();
            sessions.cleanup_expired();
            expired
        };

        for session in expired {
            for room_id in &session.rooms {
                match state.registry.leave_room(room_id, &session.player_id).await {
                    Ok(outcome) => tracing::info!(
                        %room_id,
                        player_id = %session.player_id,
                        destroyed = outcome.destroyed,
                        "evicted after grace period"
                    ),
                    Err(e) => tracing::warn!(
                        %room_id,
                        player_id = %session.player_id,
                        error = %e,
                        "eviction failed"
                    ),
                }
            }
        }
    }
}
