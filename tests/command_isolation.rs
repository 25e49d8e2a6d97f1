/// Commands that hang or crash are contained to their own worker.
mod common;

use std::time::Duration;

use common::{join, settings, test_engine};
use livemud::engine::{spawn_isolated, CommandError, CommandOutcome, EngineSettings};

fn short_timeout() -> EngineSettings {
    EngineSettings {
        command_timeout: Duration::from_millis(800),
        ..settings()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn hung_command_times_out_while_others_proceed() {
    let (_dir, engine) = test_engine(short_timeout());
    let mut ann = join(&engine, "Ann").await;
    let mut bob = join(&engine, "Bob").await;

    let ctx = engine.command_context("ann").unwrap();
    let hung = spawn_isolated(&ctx, "hang", std::future::pending());

    bob.send(&engine, "say still here");
    bob.expect("You say, \"still here\"").await;
    assert!(!hung.is_finished());
    ann.expect("Bob says, \"still here\"").await;

    assert_eq!(hung.await.unwrap(), CommandOutcome::TimedOut);
    ann.expect("Command timed out.").await;

    // Exactly one notice, and the actor still answers.
    ann.send(&engine, "look");
    ann.expect("Town Square").await;
    assert_eq!(ann.saw("Command timed out."), 1);
    assert!(engine.is_running("ann"));
}

#[tokio::test]
async fn crashed_and_failed_commands_leave_the_actor_running() {
    let (_dir, engine) = test_engine(short_timeout());
    let mut ann = join(&engine, "Ann").await;
    let ctx = engine.command_context("ann").unwrap();

    let crashed = spawn_isolated(&ctx, "crash", async {
        let items: Vec<u8> = Vec::new();
        let _ = items[3];
        Ok(())
    });
    assert_eq!(crashed.await.unwrap(), CommandOutcome::Crashed);
    ann.expect("Command error.").await;

    let failed = spawn_isolated(&ctx, "fail", async {
        Err(CommandError::Internal("storage unavailable".into()))
    });
    assert!(matches!(failed.await.unwrap(), CommandOutcome::Failed(_)));
    ann.expect("Something went wrong with that command.").await;

    ann.send(&engine, "inventory");
    ann.expect("You are empty-handed.").await;
    assert!(engine.is_running("ann"));
}

#[tokio::test]
async fn parse_errors_go_only_to_the_sender() {
    let (_dir, engine) = test_engine(settings());
    let mut ann = join(&engine, "Ann").await;
    let mut bob = join(&engine, "Bob").await;

    ann.send(&engine, "dance wildly");
    ann.expect("Unknown command \"dance wildly\"").await;

    ann.send(&engine, "say done");
    bob.expect("Ann says, \"done\"").await;
    assert_eq!(bob.saw("Unknown command"), 0);
}

#[tokio::test]
async fn markup_in_player_text_is_shown_literally() {
    let (_dir, engine) = test_engine(settings());
    let mut ann = join(&engine, "Ann").await;
    let mut bob = join(&engine, "Bob").await;

    ann.send(&engine, "say <red>not red</> \\o/");
    let heard = bob.expect("Ann says").await;
    assert_eq!(heard, "Ann says, \"<red>not red</> \\o/\"");
    ann.expect("You say").await;
    assert_eq!(ann.saw("Something went wrong"), 0);
}
