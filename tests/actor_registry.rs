/// Start-or-attach: however many callers race, one actor per player.
mod common;

use std::collections::HashSet;

use common::{join, settings, test_engine};
use livemud::engine::SessionError;
use livemud::validation::validate_player_name;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_starts_share_one_actor() {
    let (_dir, engine) = test_engine(settings());
    let ann = validate_player_name("Ann").unwrap();
    engine.create_player(&ann).await.unwrap();

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let engine = engine.clone();
            tokio::spawn(async move { engine.ensure_started("ann").unwrap().instance() })
        })
        .collect();
    let mut instances = HashSet::new();
    for task in tasks {
        instances.insert(task.await.unwrap());
    }

    assert_eq!(instances.len(), 1);
    assert_eq!(engine.actor_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn several_sinks_share_one_actor() {
    let (_dir, engine) = test_engine(settings());
    let mut clients = Vec::new();
    for _ in 0..4 {
        clients.push(join(&engine, "Ann").await);
    }
    assert_eq!(engine.actor_count(), 1);

    clients[0].send(&engine, "say hello all");
    for client in clients.iter_mut() {
        client.expect("You say, \"hello all\"").await;
    }
}

#[tokio::test]
async fn unknown_players_are_rejected() {
    let (_dir, engine) = test_engine(settings());
    assert!(matches!(
        engine.handle_input("nobody", "look"),
        Err(SessionError::UnknownPlayer(_))
    ));
    assert_eq!(engine.actor_count(), 0);
}
