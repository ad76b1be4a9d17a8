//! Time-ordered 64-bit identifiers.
//!
//! Layout, most significant first: 41 bits of milliseconds since
//! 2023-01-01T00:00:00Z, 10 bits of node id, 8 bits of sequence. A node
//! emits at most 256 ids per millisecond; the 257th caller sleeps until the
//! clock moves on, which bounds the wait at about one millisecond.

use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{debug, trace};

use crate::config::ConfigError;

/// Custom epoch in Unix milliseconds (Jan 1, 2023).
pub const EPOCH_MILLIS: u64 = 1_672_531_200_000;

pub const NODE_BITS: u32 = 10;
pub const SEQUENCE_BITS: u32 = 8;
pub const TIMESTAMP_BITS: u32 = 41;
pub const MAX_NODE_ID: u16 = (1 << NODE_BITS) - 1;
pub const MAX_SEQUENCE: u64 = (1 << SEQUENCE_BITS) - 1;

const TIMESTAMP_SHIFT: u32 = NODE_BITS + SEQUENCE_BITS;
const TIMESTAMP_MASK: u64 = (1 << TIMESTAMP_BITS) - 1;

// Sleep granularity while waiting out an exhausted millisecond.
const EXHAUSTED_BACKOFF: Duration = Duration::from_micros(100);

/// Source of wall-clock milliseconds.
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_millis(&self) -> u64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// The three fields packed into a generated id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdParts {
    /// Milliseconds since [`EPOCH_MILLIS`].
    pub timestamp: u64,
    pub node_id: u16,
    pub sequence: u8,
}

impl From<u64> for IdParts {
    fn from(id: u64) -> Self {
        IdParts {
            timestamp: id >> TIMESTAMP_SHIFT,
            node_id: ((id >> SEQUENCE_BITS) & MAX_NODE_ID as u64) as u16,
            sequence: (id & MAX_SEQUENCE) as u8,
        }
    }
}

/// Snowflake-style id generator, safe to share between threads.
///
/// The last timestamp and the sequence live in one atomic word,
/// `(timestamp << 8) | sequence`, so the transition between milliseconds is a
/// single compare-and-swap.
pub struct IdGenerator<C: Clock = SystemClock> {
    state: AtomicU64,
    node_id: u16,
    clock: C,
}

impl IdGenerator<SystemClock> {
    /// Creates a generator for `node_id` using the system clock.
    pub fn new(node_id: u16) -> Result<Self, ConfigError> {
        Self::with_clock(node_id, SystemClock)
    }
}

impl<C: Clock> IdGenerator<C> {
    pub fn with_clock(node_id: u16, clock: C) -> Result<Self, ConfigError> {
        if node_id > MAX_NODE_ID {
            return Err(ConfigError::InvalidNodeId(node_id.to_string()));
        }
        Ok(IdGenerator {
            state: AtomicU64::new(0),
            node_id,
            clock,
        })
    }

    pub fn node_id(&self) -> u16 {
        self.node_id
    }

    /// Returns the next id. Never fails; blocks for up to about a millisecond
    /// when this node has already issued 256 ids in the current millisecond.
    ///
    /// After the clock steps backwards, ids keep coming from the last issued
    /// millisecond and then from the ones after it, so the caller never waits
    /// for the wall clock to catch up.
    pub fn next_id(&self) -> u64 {
        loop {
            let now = self.elapsed_millis();
            let current = self.state.load(Ordering::Acquire);
            let last = current >> SEQUENCE_BITS;
            let sequence = current & MAX_SEQUENCE;

            // A clock that steps backwards keeps issuing on the last timestamp.
            let (timestamp, next_sequence) = if now > last {
                (now, 0)
            } else if sequence < MAX_SEQUENCE {
                (last, sequence + 1)
            } else if now < last {
                debug!(timestamp = last, now, "sequence exhausted behind a regressed clock");
                (last + 1, 0)
            } else {
                trace!(timestamp = last, "sequence exhausted, waiting for next millisecond");
                thread::sleep(EXHAUSTED_BACKOFF);
                continue;
            };

            let next = (timestamp << SEQUENCE_BITS) | next_sequence;
            if self
                .state
                .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return self.compose(timestamp, next_sequence);
            }
        }
    }

    fn elapsed_millis(&self) -> u64 {
        self.clock.now_millis().saturating_sub(EPOCH_MILLIS) & TIMESTAMP_MASK
    }

    fn compose(&self, timestamp: u64, sequence: u64) -> u64 {
        (timestamp << TIMESTAMP_SHIFT) | ((self.node_id as u64) << SEQUENCE_BITS) | sequence
    }
}
