//! The player actor.
//!
//! One tokio task per connected player owns that player's history, sinks,
//! room subscription and presence timers. Everything reaches it through its
//! mailbox ([`ActorMsg`]) and is handled one message at a time, so timer
//! cancellation and sink re-attachment can never interleave.
//!
//! Presence:
//!
//! ```text
//! Online --last sink detached--> AwayPending --away timer--> Away
//!   ^                                 |                        |
//!   +--------- sink attached ---------+------------------------+
//! Away --shutdown timer--> terminated (despawned, history flushed)
//! ```
//!
//! Timer messages carry the generation they were armed in. Cancelling bumps
//! the generation, so a timer that already fired and is sitting in the
//! mailbox is ignored.
//!
//! A stopping actor closes its mailbox, then forwards any late sink or input
//! messages to its successor in arrival order. It leaves the registry only
//! after that handoff.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::commands;
use super::dispatch::{self, CommandContext};
use super::history::History;
use super::sink::{Sink, SinkId};
use super::{SessionError, Shared};
use crate::logutil::escape_log;
use crate::markup::{escape, Color, Segment};
use crate::messaging::{Exclude, Message, Subscriber, SubscriberId, Topic};
use crate::metrics;
use crate::world::{DespawnReason, Presence};

pub(crate) enum ActorMsg {
    RegisterSink {
        id: SinkId,
        sink: Arc<dyn Sink>,
    },
    UnregisterSink(SinkId),
    Input(String),
    Deliver(Arc<Message>),
    History(oneshot::Sender<Vec<Message>>),
    ChangeRoom {
        to: String,
        done: oneshot::Sender<()>,
    },
    AwayTimer(u64),
    ShutdownTimer(u64),
    Shutdown {
        reason: DespawnReason,
        done: oneshot::Sender<()>,
    },
}

/// How many unmatched detaches an actor remembers.
const MAX_DROPPED_SINKS: usize = 32;

/// Cheap, cloneable address of one actor instance.
#[derive(Clone)]
pub struct ActorHandle {
    player_id: Arc<str>,
    instance: SubscriberId,
    tx: mpsc::UnboundedSender<ActorMsg>,
}

impl fmt::Debug for ActorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorHandle")
            .field("player_id", &self.player_id)
            .field("instance", &self.instance)
            .field("alive", &self.is_alive())
            .finish()
    }
}

impl ActorHandle {
    /// A handle whose mailbox is not yet served by any task.
    pub(crate) fn detached(player_id: &str) -> (Self, mpsc::UnboundedReceiver<ActorMsg>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = Self {
            player_id: Arc::from(player_id),
            instance: SubscriberId::next(),
            tx,
        };
        (handle, rx)
    }

    pub fn player_id(&self) -> &str {
        &self.player_id
    }

    pub fn instance(&self) -> SubscriberId {
        self.instance
    }

    pub fn is_alive(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Hands the message back if the mailbox is closed.
    pub(crate) fn send(&self, msg: ActorMsg) -> Result<(), ActorMsg> {
        self.tx.send(msg).map_err(|e| e.0)
    }

    pub async fn history(&self) -> Option<Vec<Message>> {
        let (reply, rx) = oneshot::channel();
        self.send(ActorMsg::History(reply)).ok()?;
        rx.await.ok()
    }

    /// Ask the actor to move its room subscription and wait until it has.
    pub async fn change_room(&self, to: String) -> bool {
        let (done, rx) = oneshot::channel();
        if self.send(ActorMsg::ChangeRoom { to, done }).is_err() {
            return false;
        }
        rx.await.is_ok()
    }
}

impl Subscriber for ActorHandle {
    fn deliver(&self, message: Arc<Message>) -> bool {
        self.tx.send(ActorMsg::Deliver(message)).is_ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorPhase {
    Online,
    AwayPending,
    /// Away, with the shutdown timer pending.
    Away,
}

enum Exit {
    Despawn(DespawnReason, Option<oneshot::Sender<()>>),
    /// Startup failed; nothing was spawned in the world.
    Failed,
}

struct PlayerActor {
    shared: Arc<Shared>,
    handle: ActorHandle,
    player_id: String,
    player_name: String,
    room: String,
    history: History,
    sinks: Vec<(SinkId, Arc<dyn Sink>)>,
    /// Sinks detached before their attach arrived. Ids are never reused.
    dropped_sinks: VecDeque<SinkId>,
    phase: ActorPhase,
    timer_generation: u64,
    away_timer: Option<JoinHandle<()>>,
    shutdown_timer: Option<JoinHandle<()>>,
    last_activity_at: Instant,
}

/// Start an actor task for `player_id` and return its handle.
pub(crate) fn spawn(shared: Arc<Shared>, player_id: &str) -> ActorHandle {
    let (handle, rx) = ActorHandle::detached(player_id);
    let capacity = shared.settings.history_capacity;
    let actor = PlayerActor {
        shared,
        handle: handle.clone(),
        player_id: player_id.to_string(),
        player_name: player_id.to_string(),
        room: String::new(),
        history: History::new(capacity),
        sinks: Vec::new(),
        dropped_sinks: VecDeque::new(),
        phase: ActorPhase::AwayPending,
        timer_generation: 0,
        away_timer: None,
        shutdown_timer: None,
        last_activity_at: Instant::now(),
    };
    metrics::inc_actor_started();
    tokio::spawn(actor.run(rx));
    handle
}

impl PlayerActor {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<ActorMsg>) {
        let exit = match self.start().await {
            Ok(()) => self.serve(&mut rx).await,
            Err(e) => {
                error!(
                    target: "livemud::session",
                    "actor for {} failed to start: {}",
                    escape_log(&self.player_id),
                    e
                );
                Exit::Failed
            }
        };
        self.terminate(exit, rx).await;
    }

    async fn start(&mut self) -> Result<(), SessionError> {
        self.history = self.load_history();
        let spawned = self.shared.store.spawn_player(&self.player_id).await?;
        self.player_name = spawned.player.display_name.clone();
        self.room = spawned.player.current_room.clone();

        let bus = &self.shared.bus;
        let instance = self.handle.instance();
        bus.subscribe(Topic::player(&self.player_id), instance, self.subscriber());
        bus.subscribe(Topic::room(&self.room), instance, self.subscriber());
        bus.subscribe(Topic::Global, instance, self.subscriber());

        info!(
            target: "livemud::session",
            "actor {} started for {} in {} ({} messages restored)",
            instance.as_u64(),
            escape_log(&self.player_id),
            self.room,
            self.history.len()
        );
        if spawned.announce {
            self.announce(format!("<yellow>{}</> has arrived.", escape(&self.player_name)));
        }
        // Nobody is attached yet; a sink normally arrives right behind us.
        self.arm_away_timer();
        Ok(())
    }

    fn load_history(&self) -> History {
        let capacity = self.shared.settings.history_capacity;
        match self.shared.store.read_actor_log(&self.player_id) {
            Ok(Some(bytes)) => History::decode(&bytes, capacity).unwrap_or_else(|| {
                warn!(
                    target: "livemud::session",
                    "discarding message log for {} (format mismatch)",
                    escape_log(&self.player_id)
                );
                if let Err(e) = self.shared.store.clear_actor_log(&self.player_id) {
                    warn!(target: "livemud::session", "clearing message log failed: {}", e);
                }
                History::new(capacity)
            }),
            Ok(None) => History::new(capacity),
            Err(e) => {
                warn!(
                    target: "livemud::session",
                    "reading message log for {} failed: {}",
                    escape_log(&self.player_id),
                    e
                );
                History::new(capacity)
            }
        }
    }

    async fn serve(&mut self, rx: &mut mpsc::UnboundedReceiver<ActorMsg>) -> Exit {
        while let Some(msg) = rx.recv().await {
            match msg {
                ActorMsg::RegisterSink { id, sink } => self.attach(id, sink).await,
                ActorMsg::UnregisterSink(id) => self.detach(id),
                ActorMsg::Input(text) => self.input(text),
                ActorMsg::Deliver(message) => self.deliver(message),
                ActorMsg::History(reply) => {
                    let _ = reply.send(self.history.snapshot());
                }
                ActorMsg::ChangeRoom { to, done } => {
                    self.change_room(to);
                    let _ = done.send(());
                }
                ActorMsg::AwayTimer(generation) => self.away_timer_fired(generation).await,
                ActorMsg::ShutdownTimer(generation) => {
                    if self.shutdown_timer_fired(generation) {
                        return Exit::Despawn(DespawnReason::Timeout, None);
                    }
                }
                ActorMsg::Shutdown { reason, done } => return Exit::Despawn(reason, Some(done)),
            }
        }
        // Unreachable while `self.handle` holds a sender.
        Exit::Despawn(DespawnReason::Quit, None)
    }

    fn subscriber(&self) -> Arc<dyn Subscriber> {
        Arc::new(self.handle.clone())
    }

    /// Room-visible notice that skips this actor.
    fn announce(&self, markup: String) {
        let exclude = Exclude::Subscriber(self.handle.instance());
        if let Err(e) = self.shared.bus.send_to_room(&self.room, markup, Some(exclude)) {
            error!(target: "livemud::session", "room notice failed to render: {}", e);
        }
    }

    fn schedule(&self, delay: Duration, msg: ActorMsg) -> JoinHandle<()> {
        let handle = self.handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = handle.send(msg);
        })
    }

    fn cancel_timers(&mut self) {
        self.timer_generation = self.timer_generation.wrapping_add(1);
        if let Some(timer) = self.away_timer.take() {
            timer.abort();
        }
        if let Some(timer) = self.shutdown_timer.take() {
            timer.abort();
        }
    }

    fn arm_away_timer(&mut self) {
        self.cancel_timers();
        self.phase = ActorPhase::AwayPending;
        let delay = self.shared.settings.away_timeout;
        let msg = ActorMsg::AwayTimer(self.timer_generation);
        self.away_timer = Some(self.schedule(delay, msg));
    }

    async fn attach(&mut self, id: SinkId, sink: Arc<dyn Sink>) {
        if let Some(pos) = self.dropped_sinks.iter().position(|dropped| *dropped == id) {
            self.dropped_sinks.remove(pos);
            debug!(
                target: "livemud::session",
                "sink {} was detached before it attached",
                id.as_u64()
            );
            return;
        }
        // A dead sink leaves presence and timers exactly as they were.
        if sink.is_closed() || !self.history.iter().all(|message| sink.send(message).is_ok()) {
            debug!(target: "livemud::session", "sink {} closed during replay", id.as_u64());
            return;
        }
        self.cancel_timers();
        self.sinks.push((id, sink));
        let was_away = self.phase == ActorPhase::Away;
        self.phase = ActorPhase::Online;
        debug!(
            target: "livemud::session",
            "{} attached sink {} ({} total)",
            escape_log(&self.player_id),
            id.as_u64(),
            self.sinks.len()
        );

        if was_away {
            if let Err(e) = self
                .shared
                .store
                .set_presence(&self.player_id, Presence::Online)
                .await
            {
                warn!(target: "livemud::session", "presence update failed: {}", e);
            }
            self.announce(format!("<yellow>{}</> has returned.", escape(&self.player_name)));
        }
    }

    fn detach(&mut self, id: SinkId) {
        let before = self.sinks.len();
        self.sinks.retain(|(sink_id, _)| *sink_id != id);
        if self.sinks.len() != before {
            debug!(
                target: "livemud::session",
                "{} detached sink {}",
                escape_log(&self.player_id),
                id.as_u64()
            );
        } else {
            // The matching attach may still be on its way from a stopping actor.
            if self.dropped_sinks.len() == MAX_DROPPED_SINKS {
                self.dropped_sinks.pop_front();
            }
            self.dropped_sinks.push_back(id);
        }
        if self.sinks.is_empty() && self.phase == ActorPhase::Online {
            self.arm_away_timer();
        }
    }

    fn input(&mut self, text: String) {
        let text = text.trim().to_string();
        if text.is_empty() {
            return;
        }
        self.last_activity_at = Instant::now();
        debug!(
            target: "livemud::session",
            "{} input: {}",
            escape_log(&self.player_id),
            escape_log(&text)
        );

        let echo = Message::new(vec![Segment::colored(format!("> {}", text), Color::DarkGray)]);
        self.deliver(Arc::new(echo));

        match commands::parse(&text) {
            Some(command) => {
                // Fire and forget; the outcome notice comes back through the bus.
                let _ = dispatch::execute(command, self.command_context());
            }
            None => {
                let notice = Message::plain(format!(
                    "Unknown command \"{}\". Type help for a list of commands.",
                    text
                ));
                self.deliver(Arc::new(notice));
            }
        }
    }

    fn command_context(&self) -> CommandContext {
        CommandContext::new(&self.shared, self.handle.clone())
    }

    /// Append to history and fan out. Duplicates are dropped silently.
    fn deliver(&mut self, message: Arc<Message>) {
        if !self.history.push(Arc::clone(&message)) {
            return;
        }
        let before = self.sinks.len();
        self.sinks.retain(|(_, sink)| sink.send(&message).is_ok());
        if self.sinks.len() != before && self.sinks.is_empty() && self.phase == ActorPhase::Online
        {
            debug!(target: "livemud::session", "{} lost its last sink", escape_log(&self.player_id));
            self.arm_away_timer();
        }
    }

    fn change_room(&mut self, to: String) {
        if to == self.room {
            return;
        }
        let from = Topic::room(&self.room);
        self.shared.bus.resubscribe(
            &from,
            Topic::room(&to),
            self.handle.instance(),
            self.subscriber(),
        );
        self.room = to;
    }

    async fn away_timer_fired(&mut self, generation: u64) {
        if generation != self.timer_generation
            || !self.sinks.is_empty()
            || self.phase != ActorPhase::AwayPending
        {
            debug!(target: "livemud::session", "ignoring stale away timer");
            return;
        }
        self.away_timer = None;
        if let Err(e) = self
            .shared
            .store
            .set_presence(&self.player_id, Presence::Away)
            .await
        {
            warn!(target: "livemud::session", "presence update failed: {}", e);
        }
        self.phase = ActorPhase::Away;
        info!(
            target: "livemud::session",
            "{} is away (idle {:?})",
            escape_log(&self.player_id),
            self.last_activity_at.elapsed()
        );
        self.announce(format!("<yellow>{}</> has gone away.", escape(&self.player_name)));

        let delay = self.shared.settings.shutdown_timeout;
        let msg = ActorMsg::ShutdownTimer(self.timer_generation);
        self.shutdown_timer = Some(self.schedule(delay, msg));
    }

    fn shutdown_timer_fired(&self, generation: u64) -> bool {
        let live = generation == self.timer_generation
            && self.sinks.is_empty()
            && self.phase == ActorPhase::Away;
        if !live {
            debug!(target: "livemud::session", "ignoring stale shutdown timer");
        }
        live
    }

    fn flush_history(&self) {
        match self.history.encode() {
            Ok(bytes) => {
                if let Err(e) = self.shared.store.write_actor_log(&self.player_id, bytes) {
                    warn!(target: "livemud::session", "flushing message log failed: {}", e);
                }
            }
            Err(e) => warn!(target: "livemud::session", "encoding message log failed: {}", e),
        }
    }

    async fn terminate(mut self, exit: Exit, mut rx: mpsc::UnboundedReceiver<ActorMsg>) {
        self.cancel_timers();
        let (reason, done) = match exit {
            Exit::Despawn(reason, done) => (Some(reason), done),
            Exit::Failed => (None, None),
        };

        if let Some(reason) = reason {
            if let Err(e) = self.shared.store.despawn_player(&self.player_id, reason).await {
                warn!(target: "livemud::session", "despawn failed: {}", e);
            }
            if !reason.suppresses_arrival() {
                self.announce(format!("<yellow>{}</> has left.", escape(&self.player_name)));
            }
            self.flush_history();
        }

        let instance = self.handle.instance();
        self.shared.bus.unsubscribe_all(instance);

        // Anything that raced in after the decision to stop is either
        // answered here or handed to a successor. Once the mailbox is closed
        // the registry treats this entry as stopping, so new traffic starts
        // the successor instead of queueing here.
        rx.close();
        let mut forward = Vec::new();
        let mut acks = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            match msg {
                msg @ (ActorMsg::RegisterSink { .. }
                | ActorMsg::UnregisterSink(_)
                | ActorMsg::Input(_)) => forward.push(msg),
                ActorMsg::History(reply) => {
                    let _ = reply.send(self.history.snapshot());
                }
                ActorMsg::Shutdown { done, .. } => acks.push(done),
                _ => {}
            }
        }
        acks.extend(done);

        let restartable = reason.is_some() && !self.shared.shutting_down.load(Ordering::Acquire);
        // Detaches alone have nothing to follow.
        let needs_successor = forward
            .iter()
            .any(|msg| !matches!(msg, ActorMsg::UnregisterSink(_)));
        if restartable && needs_successor {
            self.hand_over(forward);
        }

        // A successor that already took the slot is left in place.
        self.shared.registry.remove_instance(&self.player_id, instance);
        metrics::inc_actor_terminated();
        info!(
            target: "livemud::session",
            "actor {} for {} stopped ({})",
            instance.as_u64(),
            escape_log(&self.player_id),
            reason.map(DespawnReason::as_str).unwrap_or("startup failure")
        );
        for ack in acks {
            let _ = ack.send(());
        }
    }

    /// Pass late mailbox traffic, in order, to a fresh actor.
    fn hand_over(&self, forward: Vec<ActorMsg>) {
        debug!(
            target: "livemud::session",
            "forwarding {} late message(s) for {} to a new actor",
            forward.len(),
            escape_log(&self.player_id)
        );
        match self.shared.ensure_started(&self.player_id) {
            Ok(next) => {
                for msg in forward {
                    let _ = next.send(msg);
                }
            }
            Err(e) => warn!(target: "livemud::session", "could not restart actor: {}", e),
        }
    }
}
