//! # livemud - live-session engine for a text-based multiplayer world
//!
//! livemud keeps many players connected to one shared world. Each player is
//! a long-lived actor that survives disconnects, replays recent history to
//! reconnecting clients, and drifts to away and then offline when nobody is
//! attached.
//!
//! ## Features
//!
//! - **Player actors**: one tokio task per player, started at most once, with
//!   race-free away and shutdown timers.
//! - **Command pipeline**: input is parsed into typed commands and each runs in
//!   an isolated, time-bounded worker; a crash or hang never touches the actor.
//! - **Pub/sub bus**: player, room and global topics with per-publish exclusion.
//! - **Markup**: `<red:b>inline</>` colors and modifiers, parsed into styled
//!   segments and rendered as ANSI or JSON.
//! - **Serializable world**: rooms, players and items in sled, mutated only
//!   inside retried optimistic transactions.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use livemud::config::Config;
//! use livemud::engine::Engine;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     let engine = Engine::open(&config)?;
//!     engine.boot().await?;
//!
//!     let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
//!     livemud::frontend::serve(listener, engine, config.server.protocol).await
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`engine`] - player actors, registry, command grammars and dispatch
//! - [`messaging`] - messages and the topic bus
//! - [`markup`] - markup parser and renderers
//! - [`world`] - sled-backed world model and transactions
//! - [`frontend`] - line-oriented TCP front end
//! - [`config`] - configuration loading and validation
//! - [`validation`] - player name and input checks
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   Front end     │ ← TCP lines in, rendered messages out
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │   Engine        │ ← Player actors, command dispatch, bus
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │   World         │ ← Serializable transactions over sled
//! └─────────────────┘
//! ```

pub mod config;
pub mod engine;
pub mod frontend;
pub mod logutil;
pub mod markup;
pub mod messaging;
pub mod metrics;
pub mod validation;
pub mod world;
