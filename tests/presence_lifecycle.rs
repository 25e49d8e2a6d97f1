/// Away, return, timeout and re-arrival as seen by another player in the room.
mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{attach, eventually, join, settings, test_engine};
use livemud::engine::history::HISTORY_FORMAT_VERSION;
use livemud::engine::{ChannelSink, EngineSettings};
use livemud::validation::validate_player_name;
use livemud::world::{DespawnReason, Presence};

fn quick_timers() -> EngineSettings {
    EngineSettings {
        away_timeout: Duration::from_millis(150),
        shutdown_timeout: Duration::from_millis(300),
        ..settings()
    }
}

#[tokio::test]
async fn away_return_timeout_and_fresh_arrival() {
    let (_dir, engine) = test_engine(quick_timers());
    let ann = join(&engine, "Ann").await;
    let mut bob = join(&engine, "Bob").await;

    ann.send(&engine, "say remember me");
    bob.expect("Ann says, \"remember me\"").await;

    engine.unregister_sink("ann", ann.sink_id);
    bob.expect("Ann has gone away.").await;
    assert_eq!(engine.store().get_player("ann").unwrap().presence, Presence::Away);

    // Reattaching replays history and cancels the pending shutdown.
    let mut ann = attach(&engine, "ann").await;
    ann.expect("You say, \"remember me\"").await;
    bob.expect("Ann has returned.").await;
    assert!(
        eventually(|| engine.store().get_player("ann").unwrap().presence == Presence::Online)
            .await
    );

    engine.unregister_sink("ann", ann.sink_id);
    bob.expect("Ann has gone away.").await;
    bob.expect("Ann has left.").await;
    assert!(eventually(|| !engine.is_running("ann")).await);
    let record = engine.store().get_player("ann").unwrap();
    assert_eq!(record.presence, Presence::Offline);
    assert_eq!(record.last_despawn_reason, Some(DespawnReason::Timeout));

    // A fresh actor restores the persisted history and is announced again.
    let mut ann = attach(&engine, "ann").await;
    ann.expect("You say, \"remember me\"").await;
    bob.expect("Ann has arrived.").await;
    assert_eq!(engine.store().get_player("ann").unwrap().presence, Presence::Online);
}

#[tokio::test]
async fn quick_reconnect_never_goes_away() {
    let (_dir, engine) = test_engine(quick_timers());
    let ann = join(&engine, "Ann").await;
    let mut bob = join(&engine, "Bob").await;

    engine.unregister_sink("ann", ann.sink_id);
    let _ann = attach(&engine, "ann").await;

    let seen = bob.drain_for(Duration::from_millis(500)).await;
    assert!(
        !seen.iter().any(|t| t.contains("gone away") || t.contains("has left")),
        "{:?}",
        seen
    );
    assert!(engine.is_running("ann"));
    assert_eq!(engine.store().get_player("ann").unwrap().presence, Presence::Online);
}

#[tokio::test]
async fn second_sink_keeps_the_player_online() {
    let (_dir, engine) = test_engine(quick_timers());
    let first = join(&engine, "Ann").await;
    let mut second = attach(&engine, "ann").await;
    let mut bob = join(&engine, "Bob").await;

    engine.unregister_sink("ann", first.sink_id);
    bob.send(&engine, "say still there?");
    second.expect("Bob says, \"still there?\"").await;

    let seen = bob.drain_for(Duration::from_millis(400)).await;
    assert!(!seen.iter().any(|t| t.contains("gone away")), "{:?}", seen);
}

#[tokio::test]
async fn restart_despawn_suppresses_the_arrival_notice() {
    let (_dir, engine) = test_engine(settings());
    let ann = validate_player_name("Ann").unwrap();
    engine.create_player(&ann).await.unwrap();
    // Left marked online by an unclean stop.
    engine.store().spawn_player("ann").await.unwrap();

    let stale = engine.boot().await.unwrap();
    assert_eq!(stale, vec!["ann".to_string()]);
    assert_eq!(
        engine.store().get_player("ann").unwrap().last_despawn_reason,
        Some(DespawnReason::ServerStart)
    );

    let mut bob = join(&engine, "Bob").await;
    let ann = attach(&engine, "ann").await;
    ann.send(&engine, "say back again");
    bob.expect("Ann says").await;
    assert_eq!(bob.saw("Ann has arrived."), 0, "{:?}", bob.seen);
}

#[tokio::test]
async fn shutdown_despawns_everyone_and_persists_history() {
    let (_dir, engine) = test_engine(settings());
    let mut ann = join(&engine, "Ann").await;
    ann.send(&engine, "say goodnight");
    ann.expect("You say, \"goodnight\"").await;

    engine.shutdown().await.unwrap();
    assert_eq!(engine.actor_count(), 0);
    let record = engine.store().get_player("ann").unwrap();
    assert_eq!(record.last_despawn_reason, Some(DespawnReason::ServerShutdown));

    let history = engine.history("ann").await.unwrap();
    assert!(history.iter().any(|m| m.text() == "You say, \"goodnight\""));
}

/// Attach a sink whose client is already gone while Ann is away.
async fn dead_sink_while_away(ann_has_history: bool) {
    let (_dir, engine) = test_engine(EngineSettings {
        away_timeout: Duration::from_millis(150),
        shutdown_timeout: Duration::from_millis(1500),
        ..settings()
    });
    // Bob first, so Ann's own log stays empty unless she speaks.
    let mut bob = join(&engine, "Bob").await;
    let ann = join(&engine, "Ann").await;
    if ann_has_history {
        ann.send(&engine, "say brb");
        bob.expect("Ann says, \"brb\"").await;
    }

    engine.unregister_sink("ann", ann.sink_id);
    bob.expect("Ann has gone away.").await;

    let (sink, rx) = ChannelSink::new();
    drop(rx);
    engine.register_sink("ann", Arc::new(sink)).unwrap();

    // The pending shutdown still runs; nothing restarts the away countdown.
    bob.expect("Ann has left.").await;
    assert_eq!(bob.saw("Ann has gone away."), 1, "{:?}", bob.seen);
    assert_eq!(bob.saw("Ann has returned."), 0, "{:?}", bob.seen);
    assert_eq!(engine.store().get_player("ann").unwrap().presence, Presence::Offline);
}

#[tokio::test]
async fn dead_sink_does_not_bring_back_an_away_player() {
    dead_sink_while_away(false).await;
}

#[tokio::test]
async fn failed_replay_keeps_the_shutdown_countdown() {
    dead_sink_while_away(true).await;
}

#[tokio::test]
async fn history_in_an_old_format_is_wiped_on_start() {
    let (_dir, engine) = test_engine(settings());
    let ann = validate_player_name("Ann").unwrap();
    engine.create_player(&ann).await.unwrap();
    let stale = vec![HISTORY_FORMAT_VERSION.wrapping_add(1), 0, 1, 2, 3];
    engine.store().write_actor_log("ann", stale).unwrap();

    let _ann = attach(&engine, "ann").await;
    assert!(engine.history("ann").await.unwrap().is_empty());
    assert_eq!(engine.store().read_actor_log("ann").unwrap(), None);
}
