//! Change feed of base-record mutations.
//!
//! When a database runs with [`crate::TriggerMode::ChangeFeed`], document
//! writes only touch base records and publish an event here. Index
//! maintenance happens when a [`ChangeFeedProcessor`] catches up with the
//! feed, which makes maintenance asynchronous and at-least-once:
//!
//! - Events carry full old/new images, so maintenance never reads state
//!   that may have moved on since the event was published
//! - The processor cursor advances only past events that were applied, so
//!   a failed event is delivered again on the next catch-up
//! - A [`ChangeFeed::retaining`] feed never evicts events its processor has
//!   not acknowledged, so history may grow past its limit while a failed
//!   event blocks the processor
//!
//! # Usage
//!
//! ```rust,ignore
//! use colonnade_core::{Config, Database, TriggerMode};
//!
//! let db = Database::with_config(Config::new().trigger_mode(TriggerMode::ChangeFeed));
//! let receiver = db.change_feed().subscribe();
//!
//! db.create_document("book", serde_json::json!({"isbn": "1"}))?;
//! assert_eq!(receiver.recv()?.sequence, 1);
//!
//! db.process_change_feed()?;
//! ```

use crate::encoding::is_index_sort_key;
use crate::error::{CoreError, CoreResult};
use crate::index::Mutation;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, Sender};
use tracing::{error, info, warn};

/// Type of change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeEventType {
    /// Record was written where none existed.
    Insert,
    /// Record was overwritten.
    Modify,
    /// Record was deleted.
    Remove,
}

/// A single record mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Position in the feed, starting at 1.
    pub sequence: u64,
    /// Type of change.
    pub event_type: ChangeEventType,
    /// Partition key of the mutated record.
    pub partition_key: String,
    /// Sort key of the mutated record.
    pub sort_key: String,
    /// Document before the change. None for Insert.
    pub old_image: Option<Value>,
    /// Document after the change. None for Remove.
    pub new_image: Option<Value>,
}

impl ChangeEvent {
    /// Returns true if the event concerns an index record.
    #[must_use]
    pub fn is_index_record(&self) -> bool {
        is_index_sort_key(&self.sort_key)
    }

    /// Converts the event into a mutation of its document.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the event carries no image.
    pub fn mutation(&self) -> CoreResult<Mutation> {
        Mutation::from_images(self.old_image.clone(), self.new_image.clone())
    }
}

struct History {
    events: VecDeque<ChangeEvent>,
    last_sequence: u64,
    /// Highest sequence a processor has acknowledged. None when the feed
    /// evicts regardless of consumers.
    acknowledged: Option<u64>,
}

impl History {
    fn evict(&mut self, max: usize) {
        while self.events.len() > max {
            let Some(front) = self.events.front() else {
                break;
            };
            if self.acknowledged.is_some_and(|ack| front.sequence > ack) {
                break;
            }
            self.events.pop_front();
        }
    }
}

/// A sequenced feed of record mutations.
///
/// The feed:
/// - Assigns strictly increasing sequence numbers
/// - Keeps a bounded history for polling, never evicting unacknowledged
///   events when created with [`ChangeFeed::retaining`]
/// - Supports multiple subscribers
/// - Is thread-safe
pub struct ChangeFeed {
    /// Subscribers (senders).
    subscribers: RwLock<Vec<Sender<ChangeEvent>>>,
    /// Recent events for polling.
    history: RwLock<History>,
    /// Maximum history size.
    max_history: usize,
}

impl ChangeFeed {
    /// Creates a new change feed.
    pub fn new() -> Self {
        Self::with_max_history(10_000)
    }

    /// Creates a change feed with a specific history limit.
    ///
    /// The oldest events are evicted once the limit is reached, whether or
    /// not anyone consumed them.
    pub fn with_max_history(max_history: usize) -> Self {
        Self::build(max_history, None)
    }

    /// Creates a change feed that only evicts acknowledged events.
    ///
    /// History is trimmed to `max_history` events as the consumer calls
    /// [`ChangeFeed::acknowledge`]. Unacknowledged events are kept past
    /// the limit.
    pub fn retaining(max_history: usize) -> Self {
        Self::build(max_history, Some(0))
    }

    fn build(max_history: usize, acknowledged: Option<u64>) -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            history: RwLock::new(History {
                events: VecDeque::new(),
                last_sequence: 0,
                acknowledged,
            }),
            max_history: max_history.max(1),
        }
    }

    /// Subscribes to the change feed.
    ///
    /// Returns a receiver that will receive all future change events.
    /// The receiver should be drained regularly to avoid unbounded memory growth.
    pub fn subscribe(&self) -> Receiver<ChangeEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.write().push(tx);
        rx
    }

    /// Publishes a mutation and returns its sequence number.
    pub fn publish(
        &self,
        event_type: ChangeEventType,
        partition_key: impl Into<String>,
        sort_key: impl Into<String>,
        old_image: Option<Value>,
        new_image: Option<Value>,
    ) -> u64 {
        let event = {
            let mut history = self.history.write();
            history.last_sequence += 1;
            let event = ChangeEvent {
                sequence: history.last_sequence,
                event_type,
                partition_key: partition_key.into(),
                sort_key: sort_key.into(),
                old_image,
                new_image,
            };
            history.events.push_back(event.clone());
            history.evict(self.max_history);
            event
        };

        let sequence = event.sequence;
        // Send to subscribers (remove disconnected ones)
        let mut subscribers = self.subscribers.write();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        sequence
    }

    /// Polls events from a sequence cursor.
    ///
    /// Returns events with sequence > cursor, up to limit.
    pub fn poll(&self, cursor: u64, limit: usize) -> Vec<ChangeEvent> {
        let history = self.history.read();
        history
            .events
            .iter()
            .filter(|e| e.sequence > cursor)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Returns the latest sequence number published.
    pub fn latest_sequence(&self) -> u64 {
        self.history.read().last_sequence
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Returns the number of events in history.
    pub fn history_len(&self) -> usize {
        self.history.read().events.len()
    }

    /// Marks every event up to `sequence` as consumed.
    ///
    /// Acknowledged events become eligible for eviction. No-op on a feed
    /// that does not retain.
    pub fn acknowledge(&self, sequence: u64) {
        let mut history = self.history.write();
        let Some(ack) = history.acknowledged else {
            return;
        };
        history.acknowledged = Some(ack.max(sequence));
        history.evict(self.max_history);
    }

    /// Returns the highest acknowledged sequence of a retaining feed.
    pub fn acknowledged(&self) -> Option<u64> {
        self.history.read().acknowledged
    }

    /// Clears history older than the given sequence.
    ///
    /// A retaining feed keeps unacknowledged events.
    pub fn truncate_history(&self, min_sequence: u64) {
        let mut history = self.history.write();
        let keep_from = match history.acknowledged {
            Some(ack) => min_sequence.min(ack + 1),
            None => min_sequence,
        };
        history.events.retain(|e| e.sequence >= keep_from);
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of one catch-up run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatchUp {
    /// Events handed to the handler successfully.
    pub applied: usize,
    /// Events ignored (index records, empty events).
    pub skipped: usize,
    /// Cursor after the run.
    pub cursor: u64,
}

/// Consumes a change feed with its own cursor.
pub struct ChangeFeedProcessor {
    cursor: Mutex<u64>,
    batch_size: usize,
}

impl ChangeFeedProcessor {
    /// Creates a processor that starts before the first event.
    pub fn new() -> Self {
        Self::starting_after(0)
    }

    /// Creates a processor that resumes after `sequence`.
    pub fn starting_after(sequence: u64) -> Self {
        Self {
            cursor: Mutex::new(sequence),
            batch_size: 256,
        }
    }

    /// Returns the sequence of the last event handled.
    pub fn cursor(&self) -> u64 {
        *self.cursor.lock()
    }

    /// Hands every pending base-record event to `handle`.
    ///
    /// `handle` receives the collection name (the base record's sort key)
    /// and the mutation. Index-record events and events without images are
    /// skipped.
    ///
    /// Every event the cursor passes is acknowledged on the feed, including
    /// when the run stops at a failed event.
    ///
    /// # Errors
    ///
    /// Returns the first error of `handle`. The cursor stays before the
    /// failed event, so it is delivered again by the next call.
    ///
    /// Returns `ChangeFeedGap` if the feed evicted events the cursor has
    /// not reached. The cursor does not move past the gap.
    pub fn catch_up<F>(&self, feed: &ChangeFeed, mut handle: F) -> CoreResult<CatchUp>
    where
        F: FnMut(&str, Mutation) -> CoreResult<()>,
    {
        let mut cursor = self.cursor.lock();
        let mut outcome = CatchUp::default();
        let drained = self.drain(feed, &mut *cursor, &mut outcome, &mut handle);
        feed.acknowledge(*cursor);
        drained?;

        outcome.cursor = *cursor;
        if outcome.applied > 0 {
            info!(applied = outcome.applied, skipped = outcome.skipped, cursor = *cursor, "change feed caught up");
        }
        Ok(outcome)
    }

    fn drain<F>(
        &self,
        feed: &ChangeFeed,
        cursor: &mut u64,
        outcome: &mut CatchUp,
        handle: &mut F,
    ) -> CoreResult<()>
    where
        F: FnMut(&str, Mutation) -> CoreResult<()>,
    {
        loop {
            let events = feed.poll(*cursor, self.batch_size);
            let Some(first) = events.first() else {
                return Ok(());
            };
            if first.sequence > *cursor + 1 {
                error!(
                    cursor = *cursor,
                    next = first.sequence,
                    "change feed history evicted events past processor cursor"
                );
                return Err(CoreError::ChangeFeedGap {
                    cursor: *cursor,
                    next: first.sequence,
                });
            }

            for event in events {
                if event.is_index_record() {
                    outcome.skipped += 1;
                } else {
                    match event.mutation() {
                        Ok(mutation) => {
                            handle(&event.sort_key, mutation)?;
                            outcome.applied += 1;
                        }
                        Err(e) => {
                            warn!(sequence = event.sequence, error = %e, "skipping change event");
                            outcome.skipped += 1;
                        }
                    }
                }
                *cursor = event.sequence;
            }
        }
    }
}

impl Default for ChangeFeedProcessor {
    fn default() -> Self {
        Self::new()
    }
}
