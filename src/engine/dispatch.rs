//! Isolated command execution.
//!
//! Each command runs as its own tokio task (the worker) watched by a second
//! task (the watchdog). The watchdog waits up to the configured timeout:
//!
//! * worker returned `Ok` -> [`CommandOutcome::Completed`]
//! * worker returned `Err` -> [`CommandOutcome::Failed`]
//! * worker panicked -> [`CommandOutcome::Crashed`]
//! * deadline passed -> worker aborted, [`CommandOutcome::TimedOut`]
//!
//! Every outcome goes through [`report`], which logs it, counts it and sends
//! the player at most one notice. The actor that issued the command never
//! waits on any of this.
//!
//! Abort takes effect at the worker's next `.await`; handlers never block a
//! runtime thread.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, warn};
use thiserror::Error;
use tokio::task::{JoinError, JoinHandle};

use super::commands::CommandValue;
use super::handlers;
use super::session::ActorHandle;
use super::Shared;
use crate::logutil::escape_log;
use crate::markup::MarkupError;
use crate::messaging::{Bus, Content, Exclude, SubscriberId};
use crate::metrics::{self, CommandResult};
use crate::world::{WorldError, WorldStore};

pub const FAILED_NOTICE: &str = "Something went wrong with that command.";
pub const CRASHED_NOTICE: &str = "Command error.";
pub const TIMED_OUT_NOTICE: &str = "Command timed out.";

#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    World(#[from] WorldError),
    #[error("markup error: {0}")]
    Markup(#[from] MarkupError),
    #[error("{0}")]
    Internal(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Completed,
    Failed(String),
    Crashed,
    TimedOut,
}

impl CommandOutcome {
    pub fn notice(&self) -> Option<&'static str> {
        match self {
            CommandOutcome::Completed => None,
            CommandOutcome::Failed(_) => Some(FAILED_NOTICE),
            CommandOutcome::Crashed => Some(CRASHED_NOTICE),
            CommandOutcome::TimedOut => Some(TIMED_OUT_NOTICE),
        }
    }

    fn result(&self) -> CommandResult {
        match self {
            CommandOutcome::Completed => CommandResult::Completed,
            CommandOutcome::Failed(_) => CommandResult::Failed,
            CommandOutcome::Crashed => CommandResult::Crashed,
            CommandOutcome::TimedOut => CommandResult::TimedOut,
        }
    }
}

/// Everything a command effect may touch, bound to the issuing player.
#[derive(Clone)]
pub struct CommandContext {
    pub player_id: String,
    pub actor: ActorHandle,
    pub store: Arc<WorldStore>,
    pub bus: Arc<Bus>,
    pub timeout: Duration,
}

impl CommandContext {
    pub(crate) fn new(shared: &Shared, actor: ActorHandle) -> Self {
        Self {
            player_id: actor.player_id().to_string(),
            actor,
            store: Arc::clone(&shared.store),
            bus: Arc::clone(&shared.bus),
            timeout: shared.settings.command_timeout,
        }
    }

    pub fn subscriber(&self) -> SubscriberId {
        self.actor.instance()
    }

    /// Message the issuing player.
    pub fn notify(&self, content: impl Into<Content>) -> Result<usize, MarkupError> {
        self.bus.send_to_player(&self.player_id, content)
    }

    /// Message everyone in `room_id` except the issuing player.
    pub fn tell_room(
        &self,
        room_id: &str,
        content: impl Into<Content>,
    ) -> Result<usize, MarkupError> {
        let exclude = Exclude::Subscriber(self.subscriber());
        self.bus.send_to_room(room_id, content, Some(exclude))
    }
}

/// Run `work` in a supervised worker with a watchdog. Returns immediately;
/// the handle resolves to the final outcome once it has been reported.
pub fn spawn_isolated<F>(
    ctx: &CommandContext,
    label: &'static str,
    work: F,
) -> JoinHandle<CommandOutcome>
where
    F: Future<Output = Result<(), CommandError>> + Send + 'static,
{
    let worker = tokio::spawn(work);
    let ctx = ctx.clone();
    tokio::spawn(async move {
        let (outcome, detail) = watch(worker, ctx.timeout).await;
        report(&ctx, label, &outcome, detail.as_deref());
        outcome
    })
}

/// The outcome, plus the panic message when the worker crashed.
async fn watch(
    mut worker: JoinHandle<Result<(), CommandError>>,
    timeout: Duration,
) -> (CommandOutcome, Option<String>) {
    match tokio::time::timeout(timeout, &mut worker).await {
        Ok(Ok(Ok(()))) => (CommandOutcome::Completed, None),
        Ok(Ok(Err(e))) => (CommandOutcome::Failed(e.to_string()), None),
        Ok(Err(join_error)) => {
            if join_error.is_panic() {
                (CommandOutcome::Crashed, Some(panic_message(join_error)))
            } else {
                (CommandOutcome::Failed("worker cancelled".to_string()), None)
            }
        }
        Err(_) => {
            worker.abort();
            (CommandOutcome::TimedOut, None)
        }
    }
}

fn panic_message(join_error: JoinError) -> String {
    let payload = join_error.into_panic();
    if let Some(text) = payload.downcast_ref::<&str>() {
        text.to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn report(
    ctx: &CommandContext,
    label: &'static str,
    outcome: &CommandOutcome,
    detail: Option<&str>,
) {
    metrics::record_command(label, outcome.result());
    match outcome {
        CommandOutcome::Completed => {
            debug!(target: "livemud::commands", "{} by {} completed", label, ctx.player_id);
        }
        CommandOutcome::Failed(reason) => {
            warn!(
                target: "livemud::commands",
                "{} by {} failed: {}",
                label,
                ctx.player_id,
                reason
            );
        }
        CommandOutcome::Crashed => {
            error!(
                target: "livemud::commands",
                "{} by {} crashed: {}",
                label,
                ctx.player_id,
                escape_log(detail.unwrap_or("unknown panic"))
            );
        }
        CommandOutcome::TimedOut => {
            warn!(
                target: "livemud::commands",
                "{} by {} timed out after {:?}",
                label,
                ctx.player_id,
                ctx.timeout
            );
        }
    }
    if let Some(notice) = outcome.notice() {
        let _ = ctx.notify(Content::Plain(notice.to_string()));
    }
}

/// Execute a parsed command for the player bound to `ctx`.
pub fn execute(command: CommandValue, ctx: CommandContext) -> JoinHandle<CommandOutcome> {
    let label = command.label();
    let work = handlers::run(command, ctx.clone());
    spawn_isolated(&ctx, label, work)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::{Message, Subscriber, Topic};
    use crate::world::WorldStoreBuilder;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl Subscriber for Recorder {
        fn deliver(&self, message: Arc<Message>) -> bool {
            self.0.lock().unwrap().push(message.text());
            true
        }
    }

    fn context(dir: &TempDir, timeout: Duration) -> (CommandContext, Arc<Recorder>) {
        let store = Arc::new(WorldStoreBuilder::new(dir.path()).open().unwrap());
        let bus = Arc::new(Bus::new());
        let (actor, _mailbox) = ActorHandle::detached("ann");
        let recorder = Arc::new(Recorder::default());
        bus.subscribe(Topic::player("ann"), SubscriberId::next(), recorder.clone());
        let ctx = CommandContext {
            player_id: "ann".into(),
            actor,
            store,
            bus,
            timeout,
        };
        (ctx, recorder)
    }

    #[tokio::test]
    async fn completed_work_sends_no_notice() {
        let dir = TempDir::new().unwrap();
        let (ctx, recorder) = context(&dir, Duration::from_secs(1));
        let outcome = spawn_isolated(&ctx, "ok", async { Ok(()) }).await.unwrap();
        assert_eq!(outcome, CommandOutcome::Completed);
        assert!(recorder.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn each_failure_kind_sends_exactly_one_distinct_notice() {
        let dir = TempDir::new().unwrap();
        let (ctx, recorder) = context(&dir, Duration::from_millis(50));

        let failed = spawn_isolated(&ctx, "fail", async {
            Err(CommandError::Internal("boom".into()))
        })
        .await
        .unwrap();
        assert_eq!(failed, CommandOutcome::Failed("boom".into()));

        let crashed = spawn_isolated(&ctx, "crash", async {
            if true {
                panic!("handler bug");
            }
            Ok(())
        })
        .await
        .unwrap();
        assert_eq!(crashed, CommandOutcome::Crashed);

        let timed_out = spawn_isolated(&ctx, "hang", std::future::pending())
            .await
            .unwrap();
        assert_eq!(timed_out, CommandOutcome::TimedOut);

        let notices = recorder.0.lock().unwrap().clone();
        assert_eq!(notices, vec![FAILED_NOTICE, CRASHED_NOTICE, TIMED_OUT_NOTICE]);
    }

    #[tokio::test]
    async fn retry_exhaustion_is_a_failure_not_a_crash() {
        let dir = TempDir::new().unwrap();
        let (ctx, _recorder) = context(&dir, Duration::from_secs(5));
        let store = Arc::clone(&ctx.store);
        let outcome = spawn_isolated(&ctx, "conflict", async move {
            store
                .tx(|_tx| -> Result<(), WorldError> { Err(WorldError::Conflict) })
                .await?;
            Ok(())
        })
        .await
        .unwrap();
        assert!(matches!(outcome, CommandOutcome::Failed(reason) if reason.contains("10 attempts")));
    }

    #[tokio::test]
    async fn crash_logs_carry_the_panic_message() {
        let err = tokio::spawn(async { panic!("slot {} is empty", 3) }).await.unwrap_err();
        assert_eq!(panic_message(err), "slot 3 is empty");
        let err = tokio::spawn(async { panic!("no room") }).await.unwrap_err();
        assert_eq!(panic_message(err), "no room");

        let worker = tokio::spawn(async {
            let rooms: Vec<u8> = Vec::new();
            let _ = rooms[1];
            Ok(())
        });
        let (outcome, detail) = watch(worker, Duration::from_secs(5)).await;
        assert_eq!(outcome, CommandOutcome::Crashed);
        assert!(detail.unwrap().contains("index out of bounds"));
    }
}
