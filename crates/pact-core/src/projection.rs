use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;
use tracing::debug;

/// An immutable view of a projection at one refresh.
#[derive(Debug)]
pub struct Snapshot<T> {
    /// Sequence number of the refresh that produced this snapshot. Zero
    /// until the first refresh lands.
    pub version: u64,
    /// Actor the items were loaded for.
    pub actor_id: Option<String>,
    pub items: Arc<Vec<T>>,
}

impl<T> Snapshot<T> {
    fn empty() -> Self {
        Self {
            version: 0,
            actor_id: None,
            items: Arc::new(Vec::new()),
        }
    }
}

impl<T> Clone for Snapshot<T> {
    fn clone(&self) -> Self {
        Self {
            version: self.version,
            actor_id: self.actor_id.clone(),
            items: Arc::clone(&self.items),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshTicket {
    sequence: u64,
}

impl RefreshTicket {
    pub fn sequence(self) -> u64 {
        self.sequence
    }
}

/// A fenced, versioned list of records replaced wholesale on every refresh.
///
/// Each refresh takes a ticket before it starts its round-trip. When the
/// results come back they are only published if no later ticket has been
/// published in the meantime, so overlapping refreshes resolve to the most
/// recently issued one regardless of completion order. Readers either take
/// a snapshot or subscribe to changes.
pub struct Projection<T> {
    name: &'static str,
    issued: AtomicU64,
    snapshots: watch::Sender<Snapshot<T>>,
}

impl<T> Projection<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            issued: AtomicU64::new(0),
            snapshots: watch::Sender::new(Snapshot::empty()),
        }
    }

    pub fn begin(&self) -> RefreshTicket {
        RefreshTicket {
            sequence: self.issued.fetch_add(1, Ordering::SeqCst) + 1,
        }
    }

    /// Publishes `items` for `ticket`. Returns `false` and drops the items
    /// if a newer refresh has already been published.
    pub fn commit(&self, ticket: RefreshTicket, actor_id: Option<String>, items: Vec<T>) -> bool {
        let applied = self.snapshots.send_if_modified(|current| {
            if ticket.sequence <= current.version {
                return false;
            }
            *current = Snapshot {
                version: ticket.sequence,
                actor_id,
                items: Arc::new(items),
            };
            true
        });

        if !applied {
            debug!(
                projection = self.name,
                sequence = ticket.sequence,
                "discarded stale refresh"
            );
        }
        applied
    }

    /// Empties the projection, superseding any refresh still in flight.
    pub fn clear(&self) {
        let ticket = self.begin();
        self.commit(ticket, None, Vec::new());
    }

    pub fn current(&self) -> Snapshot<T> {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot<T>> {
        self.snapshots.subscribe()
    }
}
