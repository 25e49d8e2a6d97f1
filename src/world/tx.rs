//! Serializable transactions with bounded retry.
//!
//! [`WorldTx`] is optimistic. Every key it reads is remembered with the value
//! first observed, and writes are buffered. At commit a single sled
//! transaction re-reads the whole read set. If any value moved underneath us
//! the commit aborts with [`WorldError::Conflict`]; otherwise the buffered
//! writes land atomically. Validating every read against the committed state
//! gives serializable outcomes for key-addressed access.
//!
//! [`run`] wraps a closure in that machinery and re-runs it from scratch on
//! conflict, sleeping `unit * 2^attempt` plus uniform jitter of up to the same
//! amount between attempts.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use log::{debug, warn};
use rand::Rng;
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::IVec;

use super::errors::WorldError;
use super::types::Record;
use crate::metrics;

/// Default number of attempts before a conflict is surfaced.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Exponent cap for backoff so the shift cannot overflow.
const MAX_BACKOFF_EXPONENT: u32 = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_unit: Duration::from_millis(1),
        }
    }
}

impl RetryPolicy {
    /// Deterministic part of the delay before retry number `attempt`.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.min(MAX_BACKOFF_EXPONENT);
        self.backoff_unit.saturating_mul(factor)
    }

    /// Base delay plus uniform jitter in `[0, base]`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        let jitter: f64 = rand::thread_rng().gen_range(0.0..=1.0);
        base + base.mul_f64(jitter)
    }
}

/// Marker abort value for the commit-time validation.
struct ReadSetChanged;

/// One attempt of a world transaction.
pub struct WorldTx<'a> {
    tree: &'a sled::Tree,
    reads: HashMap<Vec<u8>, Option<IVec>>,
    writes: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl<'a> WorldTx<'a> {
    pub(crate) fn new(tree: &'a sled::Tree) -> Self {
        Self {
            tree,
            reads: HashMap::new(),
            writes: BTreeMap::new(),
        }
    }

    /// Run `f` inside this transaction. Nested use never opens a second
    /// transaction or a second retry loop.
    pub fn tx<T, F>(&mut self, f: F) -> Result<T, WorldError>
    where
        F: FnOnce(&mut WorldTx<'a>) -> Result<T, WorldError>,
    {
        f(self)
    }

    pub fn get_raw(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>, WorldError> {
        if let Some(pending) = self.writes.get(key) {
            return Ok(pending.clone());
        }
        if let Some(seen) = self.reads.get(key) {
            return Ok(seen.as_ref().map(|v| v.to_vec()));
        }
        let value = self.tree.get(key)?;
        self.reads.insert(key.to_vec(), value.clone());
        Ok(value.map(|v| v.to_vec()))
    }

    pub fn put_raw(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.writes.insert(key, Some(value));
    }

    pub fn remove_raw(&mut self, key: Vec<u8>) {
        self.writes.insert(key, None);
    }

    /// Fetch a record, `None` if absent.
    pub fn find<R: Record>(&mut self, id: &str) -> Result<Option<R>, WorldError> {
        let Some(bytes) = self.get_raw(&R::key(id))? else {
            return Ok(None);
        };
        decode_record::<R>(&bytes).map(Some)
    }

    /// Fetch a record or fail with [`WorldError::NotFound`].
    pub fn get<R: Record>(&mut self, id: &str) -> Result<R, WorldError> {
        self.find::<R>(id)?
            .ok_or_else(|| WorldError::NotFound(format!("{}: {}", R::PREFIX, id)))
    }

    pub fn put<R: Record>(&mut self, mut record: R) -> Result<(), WorldError> {
        record.set_schema_version(R::SCHEMA_VERSION);
        let key = R::key(record.record_id());
        self.put_raw(key, bincode::serialize(&record)?);
        Ok(())
    }

    pub fn remove<R: Record>(&mut self, id: &str) {
        self.remove_raw(R::key(id));
    }

    pub(crate) fn commit(self) -> Result<(), WorldError> {
        if self.reads.is_empty() && self.writes.is_empty() {
            return Ok(());
        }
        let result = self.tree.transaction(|t| {
            for (key, seen) in &self.reads {
                let current = t.get(key.as_slice())?;
                if current != *seen {
                    return Err(ConflictableTransactionError::Abort(ReadSetChanged));
                }
            }
            for (key, value) in &self.writes {
                match value {
                    Some(bytes) => {
                        t.insert(key.as_slice(), bytes.as_slice())?;
                    }
                    None => {
                        t.remove(key.as_slice())?;
                    }
                }
            }
            Ok(())
        });
        match result {
            Ok(()) => Ok(()),
            Err(TransactionError::Abort(ReadSetChanged)) => Err(WorldError::Conflict),
            Err(TransactionError::Storage(e)) => Err(WorldError::Sled(e)),
        }
    }
}

pub(crate) fn decode_record<R: Record>(bytes: &[u8]) -> Result<R, WorldError> {
    let record: R = bincode::deserialize(bytes)?;
    if record.schema_version() != R::SCHEMA_VERSION {
        return Err(WorldError::SchemaMismatch {
            entity: R::PREFIX,
            expected: R::SCHEMA_VERSION,
            found: record.schema_version(),
        });
    }
    Ok(record)
}

/// Run `f` at serializable isolation, retrying the whole closure on conflict.
pub async fn run<T, F>(tree: &sled::Tree, policy: &RetryPolicy, mut f: F) -> Result<T, WorldError>
where
    F: FnMut(&mut WorldTx<'_>) -> Result<T, WorldError>,
{
    let max_attempts = policy.max_attempts.max(1);
    for attempt in 1..=max_attempts {
        let outcome = {
            let mut wtx = WorldTx::new(tree);
            match f(&mut wtx) {
                Ok(value) => wtx.commit().map(|()| value),
                Err(e) => Err(e),
            }
        };
        match outcome {
            Ok(value) => {
                metrics::inc_tx_committed();
                return Ok(value);
            }
            Err(WorldError::Conflict) => {
                metrics::inc_tx_conflict();
                if attempt == max_attempts {
                    break;
                }
                let delay = policy.backoff(attempt);
                debug!(
                    target: "livemud::tx",
                    "conflict on attempt {}/{}; retrying in {:?}",
                    attempt,
                    max_attempts,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
            Err(other) => return Err(other),
        }
    }
    metrics::inc_tx_exhausted();
    warn!(
        target: "livemud::tx",
        "giving up after {} conflicting attempts",
        max_attempts
    );
    Err(WorldError::RetriesExhausted {
        attempts: max_attempts,
    })
}
