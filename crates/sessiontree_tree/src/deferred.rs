//! Deferred-event queue.
//!
//! Browser events can arrive for a window or tab the tree has not learned
//! about yet. Such updates are parked here, keyed by host id, and replayed
//! once the id is registered. Entries older than the stale horizon are
//! dropped on the next insert, and each id keeps a bounded number of them.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use crate::model::HostId;

/// Entries older than this are discarded.
pub const STALE_EVENT_HORIZON: Duration = Duration::from_secs(60);

/// Upper bound on parked events per host id; the oldest one is dropped.
pub const MAX_EVENTS_PER_ID: usize = 64;

/// A parked update, replayed against the context `C` that owns the queue.
pub type DeferredEvent<C> = Box<dyn FnOnce(&mut C) + Send>;

struct Parked<C> {
    queued_at: Instant,
    event: DeferredEvent<C>,
}

pub struct DeferredEventQueue<C> {
    windows: HashMap<HostId, VecDeque<Parked<C>>>,
    tabs: HashMap<HostId, VecDeque<Parked<C>>>,
    horizon: Duration,
}

impl<C> Default for DeferredEventQueue<C> {
    fn default() -> Self {
        Self::with_horizon(STALE_EVENT_HORIZON)
    }
}

impl<C> DeferredEventQueue<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_horizon(horizon: Duration) -> Self {
        Self {
            windows: HashMap::new(),
            tabs: HashMap::new(),
            horizon,
        }
    }

    pub fn add_window_event(&mut self, window_id: HostId, event: DeferredEvent<C>) {
        self.prune_stale();
        log::debug!("deferred_event_queued kind=window id={}", window_id);
        Self::park(&mut self.windows, window_id, event);
    }

    pub fn add_tab_event(&mut self, tab_id: HostId, event: DeferredEvent<C>) {
        self.prune_stale();
        log::debug!("deferred_event_queued kind=tab id={}", tab_id);
        Self::park(&mut self.tabs, tab_id, event);
    }

    /// Removes and returns the events parked for a window, oldest first.
    pub fn take_window_events(&mut self, window_id: HostId) -> Vec<DeferredEvent<C>> {
        Self::take(&mut self.windows, window_id)
    }

    /// Removes and returns the events parked for a tab, oldest first.
    pub fn take_tab_events(&mut self, tab_id: HostId) -> Vec<DeferredEvent<C>> {
        Self::take(&mut self.tabs, tab_id)
    }

    pub fn pending_window_events(&self, window_id: HostId) -> usize {
        self.windows.get(&window_id).map_or(0, VecDeque::len)
    }

    pub fn pending_tab_events(&self, tab_id: HostId) -> usize {
        self.tabs.get(&tab_id).map_or(0, VecDeque::len)
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty() && self.tabs.is_empty()
    }

    pub fn clear(&mut self) {
        self.windows.clear();
        self.tabs.clear();
    }

    fn park(queues: &mut HashMap<HostId, VecDeque<Parked<C>>>, id: HostId, event: DeferredEvent<C>) {
        let queue = queues.entry(id).or_default();
        if queue.len() >= MAX_EVENTS_PER_ID {
            queue.pop_front();
            log::warn!("deferred_event_dropped reason=overflow id={}", id);
        }
        queue.push_back(Parked {
            queued_at: Instant::now(),
            event,
        });
    }

    fn take(queues: &mut HashMap<HostId, VecDeque<Parked<C>>>, id: HostId) -> Vec<DeferredEvent<C>> {
        queues
            .remove(&id)
            .map(|queue| queue.into_iter().map(|parked| parked.event).collect())
            .unwrap_or_default()
    }

    fn prune_stale(&mut self) {
        let horizon = self.horizon;
        for queues in [&mut self.windows, &mut self.tabs] {
            queues.retain(|id, queue| {
                let before = queue.len();
                queue.retain(|parked| parked.queued_at.elapsed() < horizon);
                if queue.len() < before {
                    log::warn!(
                        "deferred_event_dropped reason=stale id={} count={}",
                        id,
                        before - queue.len()
                    );
                }
                !queue.is_empty()
            });
        }
    }
}
