//! Test utilities & fixtures.
//! Engines over throwaway stores, and clients that read what a player sees.
#![allow(dead_code)] // Each test binary uses a different subset.

use std::sync::Arc;
use std::time::Duration;

use livemud::engine::{ChannelSink, Engine, EngineSettings, SinkId};
use livemud::messaging::Message;
use livemud::validation::validate_player_name;
use livemud::world::{WorldStoreBuilder, START_ROOM_ID};
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;

/// How long a test waits for an expected message before failing.
pub const WAIT: Duration = Duration::from_secs(5);

pub fn settings() -> EngineSettings {
    EngineSettings {
        history_capacity: 50,
        away_timeout: Duration::from_secs(60),
        shutdown_timeout: Duration::from_secs(60),
        command_timeout: Duration::from_secs(5),
        start_room: START_ROOM_ID.to_string(),
    }
}

/// Engine over a fresh seeded store. Keep the `TempDir` alive for the test.
pub fn test_engine(settings: EngineSettings) -> (TempDir, Engine) {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = WorldStoreBuilder::new(dir.path()).open().expect("open store");
    (dir, Engine::new(Arc::new(store), settings))
}

/// One attached front end for one player.
pub struct Client {
    pub id: String,
    pub sink_id: SinkId,
    rx: UnboundedReceiver<Arc<Message>>,
    pub seen: Vec<String>,
}

impl Client {
    pub fn send(&self, engine: &Engine, text: &str) {
        engine.handle_input(&self.id, text).expect("input accepted");
    }

    /// Wait for the next message whose text contains `needle`, recording
    /// everything read on the way.
    pub async fn expect(&mut self, needle: &str) -> String {
        let found = tokio::time::timeout(WAIT, async {
            while let Some(message) = self.rx.recv().await {
                let text = message.text();
                self.seen.push(text.clone());
                if text.contains(needle) {
                    return Some(text);
                }
            }
            None
        })
        .await;
        match found {
            Ok(Some(text)) => text,
            _ => panic!(
                "{} never saw {:?}; saw {:#?}",
                self.id, needle, self.seen
            ),
        }
    }

    /// Read whatever arrives within `window`.
    pub async fn drain_for(&mut self, window: Duration) -> Vec<String> {
        let mut out = Vec::new();
        let deadline = tokio::time::Instant::now() + window;
        while let Ok(Some(message)) = tokio::time::timeout_at(deadline, self.rx.recv()).await {
            let text = message.text();
            self.seen.push(text.clone());
            out.push(text);
        }
        out
    }

    pub fn saw(&self, needle: &str) -> usize {
        self.seen.iter().filter(|t| t.contains(needle)).count()
    }
}

/// Create the player if needed and attach a fresh sink.
pub async fn join(engine: &Engine, display: &str) -> Client {
    let name = validate_player_name(display).expect("valid name");
    engine.create_player(&name).await.expect("create player");
    attach(engine, &name.id).await
}

/// Attach a sink for an existing player. Returns once the actor has started
/// and taken the sink, so room traffic from here on is seen.
pub async fn attach(engine: &Engine, id: &str) -> Client {
    let (sink, rx) = ChannelSink::new();
    let sink_id = engine
        .register_sink(id, Arc::new(sink))
        .expect("register sink");
    // Mailbox order: the history reply comes after the sink is attached.
    engine.history(id).await.expect("history");
    Client {
        id: id.to_string(),
        sink_id,
        rx,
        seen: Vec::new(),
    }
}

/// Poll `check` until it holds or [`WAIT`] passes.
pub async fn eventually<F: FnMut() -> bool>(mut check: F) -> bool {
    let deadline = tokio::time::Instant::now() + WAIT;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
