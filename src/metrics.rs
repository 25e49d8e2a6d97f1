//! Process-wide counters for actors, commands and transactions.
//! Logged periodically by the server; there is no exposition endpoint.
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, OnceLock};

static ACTORS_STARTED: AtomicU64 = AtomicU64::new(0);
static ACTORS_TERMINATED: AtomicU64 = AtomicU64::new(0);
static COMMANDS_COMPLETED: AtomicU64 = AtomicU64::new(0);
static COMMANDS_FAILED: AtomicU64 = AtomicU64::new(0);
static COMMANDS_CRASHED: AtomicU64 = AtomicU64::new(0);
static COMMANDS_TIMED_OUT: AtomicU64 = AtomicU64::new(0);
static TX_COMMITTED: AtomicU64 = AtomicU64::new(0);
static TX_CONFLICTS: AtomicU64 = AtomicU64::new(0);
static TX_EXHAUSTED: AtomicU64 = AtomicU64::new(0);

static COMMAND_COUNTERS: OnceLock<Mutex<HashMap<String, CommandCounter>>> = OnceLock::new();

pub fn inc_actor_started() {
    ACTORS_STARTED.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_actor_terminated() {
    ACTORS_TERMINATED.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_tx_committed() {
    TX_COMMITTED.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_tx_conflict() {
    TX_CONFLICTS.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_tx_exhausted() {
    TX_EXHAUSTED.fetch_add(1, Ordering::Relaxed);
}

/// Final outcome of one command, as counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandResult {
    Completed,
    Failed,
    Crashed,
    TimedOut,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CommandCounter {
    pub runs: u64,
    pub failures: u64,
}

fn command_counter_lock() -> MutexGuard<'static, HashMap<String, CommandCounter>> {
    COMMAND_COUNTERS
        .get_or_init(|| Mutex::new(HashMap::new()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub fn record_command(label: &str, result: CommandResult) -> CommandCounter {
    let global = match result {
        CommandResult::Completed => &COMMANDS_COMPLETED,
        CommandResult::Failed => &COMMANDS_FAILED,
        CommandResult::Crashed => &COMMANDS_CRASHED,
        CommandResult::TimedOut => &COMMANDS_TIMED_OUT,
    };
    global.fetch_add(1, Ordering::Relaxed);

    let mut guard = command_counter_lock();
    let counter = guard.entry(label.to_string()).or_default();
    counter.runs = counter.runs.saturating_add(1);
    if result != CommandResult::Completed {
        counter.failures = counter.failures.saturating_add(1);
    }
    *counter
}

pub fn command_counters_snapshot() -> HashMap<String, CommandCounter> {
    command_counter_lock().clone()
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub actors_started: u64,
    pub actors_terminated: u64,
    pub commands_completed: u64,
    pub commands_failed: u64,
    pub commands_crashed: u64,
    pub commands_timed_out: u64,
    pub tx_committed: u64,
    pub tx_conflicts: u64,
    pub tx_exhausted: u64,
}

impl Snapshot {
    pub fn actors_live(&self) -> u64 {
        self.actors_started.saturating_sub(self.actors_terminated)
    }
}

pub fn snapshot() -> Snapshot {
    Snapshot {
        actors_started: ACTORS_STARTED.load(Ordering::Relaxed),
        actors_terminated: ACTORS_TERMINATED.load(Ordering::Relaxed),
        commands_completed: COMMANDS_COMPLETED.load(Ordering::Relaxed),
        commands_failed: COMMANDS_FAILED.load(Ordering::Relaxed),
        commands_crashed: COMMANDS_CRASHED.load(Ordering::Relaxed),
        commands_timed_out: COMMANDS_TIMED_OUT.load(Ordering::Relaxed),
        tx_committed: TX_COMMITTED.load(Ordering::Relaxed),
        tx_conflicts: TX_CONFLICTS.load(Ordering::Relaxed),
        tx_exhausted: TX_EXHAUSTED.load(Ordering::Relaxed),
    }
}
