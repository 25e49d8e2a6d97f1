//! # Engine
//!
//! The live side of the game: one actor per connected player, the command
//! pipeline, and the [`Engine`] handle front ends talk to.
//!
//! - [`session`] - the player actor and its mailbox
//! - [`registry`] - player id to actor, start-or-attach exactly once
//! - [`commands`] - grammars turning input lines into [`CommandValue`]s
//! - [`dispatch`] - isolated, time-bounded command execution
//! - [`handlers`] - what each command does to the world
//! - [`history`] - bounded, deduplicated per-player message log
//! - [`sink`] - delivery endpoints for attached clients
//!
//! ```text
//! front end --register_sink/handle_input--> Engine --mailbox--> PlayerActor
//!                                                                  |
//!                                      dispatch (worker+watchdog) <+
//!                                                |
//!                                  WorldStore::tx + Bus publish
//! ```
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use livemud::config::Config;
//! use livemud::engine::{ChannelSink, Engine};
//! use livemud::validation::validate_player_name;
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let engine = Engine::open(&Config::default())?;
//! engine.boot().await?;
//! let name = validate_player_name("Ann")?;
//! engine.create_player(&name).await?;
//! let (sink, mut rx) = ChannelSink::new();
//! engine.register_sink(&name.id, Arc::new(sink))?;
//! engine.handle_input(&name.id, "look")?;
//! let first = rx.recv().await;
//! # Ok(())
//! # }
//! ```

pub mod commands;
pub mod dispatch;
pub mod handlers;
pub mod history;
pub mod registry;
pub mod session;
pub mod sink;

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use thiserror::Error;
use tokio::sync::oneshot;

use crate::config::Config;
use crate::messaging::{Bus, Message};
use crate::validation::PlayerName;
use crate::world::{
    DespawnReason, PlayerRecord, WorldError, WorldStore, WorldStoreBuilder, START_ROOM_ID,
};

pub use commands::CommandValue;
pub use dispatch::{spawn_isolated, CommandContext, CommandError, CommandOutcome};
pub use history::{History, DEFAULT_HISTORY_CAPACITY};
pub use registry::Registry;
pub use session::{ActorHandle, ActorPhase};
pub use sink::{ChannelSink, Sink, SinkClosed, SinkId};

use session::ActorMsg;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("unknown player: {0}")]
    UnknownPlayer(String),
    #[error("actor for {0} stopped")]
    ActorStopped(String),
    #[error("engine is shutting down")]
    ShuttingDown,
    #[error(transparent)]
    World(#[from] WorldError),
}

/// Engine tunables, usually derived from [`Config`].
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub history_capacity: usize,
    pub away_timeout: Duration,
    pub shutdown_timeout: Duration,
    pub command_timeout: Duration,
    pub start_room: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            history_capacity: config.session.history_capacity.max(1),
            away_timeout: config.session.away_timeout(),
            shutdown_timeout: config.session.shutdown_timeout(),
            command_timeout: config.commands.timeout(),
            start_room: if config.server.start_room.is_empty() {
                START_ROOM_ID.to_string()
            } else {
                config.server.start_room.clone()
            },
        }
    }
}

/// State shared by the engine handle and every actor.
pub(crate) struct Shared {
    pub(crate) store: Arc<WorldStore>,
    pub(crate) bus: Arc<Bus>,
    pub(crate) registry: Registry,
    pub(crate) settings: EngineSettings,
    pub(crate) shutting_down: AtomicBool,
}

impl Shared {
    /// Live actor for `player_id`, started if needed. Concurrent callers get
    /// the same instance.
    pub(crate) fn ensure_started(self: &Arc<Self>, player_id: &str) -> Result<ActorHandle, SessionError> {
        if self.shutting_down.load(Ordering::Acquire) {
            return Err(SessionError::ShuttingDown);
        }
        if let Some(handle) = self.registry.get(player_id) {
            return Ok(handle);
        }
        match self.store.get_player(player_id) {
            Ok(_) => {}
            Err(e) if e.is_not_found() => {
                return Err(SessionError::UnknownPlayer(player_id.to_string()))
            }
            Err(e) => return Err(e.into()),
        }
        let (handle, started) = self
            .registry
            .ensure_started(player_id, || session::spawn(Arc::clone(self), player_id));
        if started {
            debug!(
                target: "livemud::session",
                "started actor {} for {}",
                handle.instance().as_u64(),
                player_id
            );
        }
        Ok(handle)
    }

    /// Deliver `msg` to the player's actor, starting a fresh one once if the
    /// current actor closed its mailbox in the meantime.
    fn send(self: &Arc<Self>, player_id: &str, msg: ActorMsg) -> Result<(), SessionError> {
        let handle = self.ensure_started(player_id)?;
        match handle.send(msg) {
            Ok(()) => Ok(()),
            Err(msg) => {
                let retry = self.ensure_started(player_id)?;
                retry
                    .send(msg)
                    .map_err(|_| SessionError::ActorStopped(player_id.to_string()))
            }
        }
    }
}

/// Cheap, cloneable handle on the running game.
#[derive(Clone)]
pub struct Engine {
    shared: Arc<Shared>,
}

impl Engine {
    pub fn new(store: Arc<WorldStore>, settings: EngineSettings) -> Self {
        Self {
            shared: Arc::new(Shared {
                store,
                bus: Arc::new(Bus::new()),
                registry: Registry::new(),
                settings,
                shutting_down: AtomicBool::new(false),
            }),
        }
    }

    /// Open the world store named by `config` and build an engine over it.
    pub fn open(config: &Config) -> Result<Self, SessionError> {
        let store = WorldStoreBuilder::new(Path::new(&config.storage.data_dir))
            .retry_policy(config.transactions.retry_policy())
            .open()?;
        Ok(Self::new(Arc::new(store), EngineSettings::from_config(config)))
    }

    pub fn store(&self) -> &Arc<WorldStore> {
        &self.shared.store
    }

    pub fn bus(&self) -> &Arc<Bus> {
        &self.shared.bus
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.shared.settings
    }

    /// Account creation for front ends. Existing players are returned as is.
    pub async fn create_player(&self, name: &PlayerName) -> Result<PlayerRecord, SessionError> {
        let record = self
            .shared
            .store
            .create_player(&name.id, &name.display, &self.shared.settings.start_room)
            .await?;
        Ok(record)
    }

    pub fn ensure_started(&self, player_id: &str) -> Result<ActorHandle, SessionError> {
        self.shared.ensure_started(player_id)
    }

    /// Attach `sink` to the player's actor. The sink is first replayed the
    /// player's history, then receives live messages.
    pub fn register_sink(&self, player_id: &str, sink: Arc<dyn Sink>) -> Result<SinkId, SessionError> {
        let id = SinkId::next();
        self.shared
            .send(player_id, ActorMsg::RegisterSink { id, sink })?;
        Ok(id)
    }

    /// Detach a sink. A player without an actor has nothing to detach; an
    /// actor that is stopping may pass the sink on, so the detach follows it
    /// to the successor.
    pub fn unregister_sink(&self, player_id: &str, sink_id: SinkId) {
        let msg = ActorMsg::UnregisterSink(sink_id);
        let registry = &self.shared.registry;
        let msg = match registry.get(player_id) {
            Some(handle) => match handle.send(msg) {
                Ok(()) => return,
                Err(msg) => msg,
            },
            None => msg,
        };
        if registry.get(player_id).is_none() && !registry.is_stopping(player_id) {
            return;
        }
        match self.shared.ensure_started(player_id) {
            Ok(next) => {
                let _ = next.send(msg);
            }
            Err(e) => debug!(
                target: "livemud::session",
                "dropping detach of sink {} for {}: {}",
                sink_id.as_u64(),
                player_id,
                e
            ),
        }
    }

    /// Queue one line of player input. Never waits for the command.
    pub fn handle_input(&self, player_id: &str, text: &str) -> Result<(), SessionError> {
        self.shared
            .send(player_id, ActorMsg::Input(text.to_string()))
    }

    /// The player's message history: from the live actor if there is one,
    /// otherwise whatever was last persisted.
    pub async fn history(&self, player_id: &str) -> Result<Vec<Message>, SessionError> {
        if let Some(handle) = self.shared.registry.get(player_id) {
            if let Some(messages) = handle.history().await {
                return Ok(messages);
            }
        }
        let capacity = self.shared.settings.history_capacity;
        let persisted = self
            .shared
            .store
            .read_actor_log(player_id)?
            .and_then(|bytes| History::decode(&bytes, capacity))
            .map(|history| history.snapshot())
            .unwrap_or_default();
        Ok(persisted)
    }

    pub fn command_context(&self, player_id: &str) -> Result<CommandContext, SessionError> {
        let handle = self.ensure_started(player_id)?;
        Ok(CommandContext::new(&self.shared, handle))
    }

    /// Startup hook: anyone still marked present was left over by a crash or
    /// an unclean stop.
    pub async fn boot(&self) -> Result<Vec<String>, SessionError> {
        let stale = self
            .shared
            .store
            .despawn_stale_players(DespawnReason::ServerStart)
            .await?;
        info!(
            "engine booted ({} stale player(s) despawned)",
            stale.len()
        );
        Ok(stale)
    }

    /// Stop every actor with `server_shutdown` and wait until each has
    /// despawned and flushed its history.
    pub async fn shutdown(&self) -> Result<(), SessionError> {
        if self.shared.shutting_down.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let handles = self.shared.registry.handles();
        info!("shutting down {} actor(s)", handles.len());
        let mut waiting = Vec::with_capacity(handles.len());
        for handle in handles {
            let (done, rx) = oneshot::channel();
            let msg = ActorMsg::Shutdown {
                reason: DespawnReason::ServerShutdown,
                done,
            };
            if handle.send(msg).is_ok() {
                waiting.push((handle, rx));
            }
        }
        for (handle, rx) in waiting {
            if rx.await.is_err() {
                warn!(
                    "actor for {} stopped without acknowledging shutdown",
                    handle.player_id()
                );
            }
        }
        self.shared.store.flush()?;
        Ok(())
    }

    pub fn online_players(&self) -> Result<Vec<PlayerRecord>, SessionError> {
        Ok(self.shared.store.online_players()?)
    }

    pub fn actor_count(&self) -> usize {
        self.shared.registry.len()
    }

    pub fn is_running(&self, player_id: &str) -> bool {
        self.shared.registry.get(player_id).is_some()
    }
}
