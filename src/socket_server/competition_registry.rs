//! Competition channel registry
//!
//! One [`CompetitionChannel`] per competition with connected viewers. Each
//! channel keeps a [`StandingsSnapshot`] as its current-state cache, stamps
//! every event with the next sequence and fans it out over a tokio broadcast
//! channel.
//!
//! The first viewer of a competition registers its channel in the loading
//! state and then rebuilds standings from the store. Events published while
//! the channel loads are held back and applied after the persisted scores, so
//! a score accepted during the rebuild is never lost. Later viewers wait for
//! the load to finish before they subscribe. Channels are evicted when the
//! last viewer leaves.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::{broadcast, watch};

use crate::error::Result;
use crate::schema::{ChannelEvent, CompetitionId, ScoreEvent};
use crate::standings::StandingsSnapshot;
use crate::submission::{Delivery, ScorePublisher};

/// Default number of events a slow receiver may fall behind
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Whether a channel's cache holds the persisted scores yet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Loading,
    Ready,
    Failed,
}

struct ChannelState {
    snapshot: StandingsSnapshot,
    next_sequence: u64,
    /// Events published while loading, in publish order
    backlog: Option<Vec<ChannelEvent>>,
}

impl ChannelState {
    fn stamp_and_apply(&mut self, event: ChannelEvent) -> ChannelEvent {
        let event = event.with_sequence(self.next_sequence);
        self.next_sequence += 1;
        self.snapshot.apply(&event);
        event
    }
}

/// Live channel for a single competition
pub struct CompetitionChannel {
    pub competition_id: CompetitionId,
    state: Mutex<ChannelState>,
    /// Number of connected clients
    client_count: AtomicUsize,
    event_tx: broadcast::Sender<ChannelEvent>,
    load_tx: watch::Sender<LoadState>,
}

impl CompetitionChannel {
    /// A channel that is live straight away
    pub fn new(competition_id: CompetitionId, capacity: usize) -> Self {
        Self::with_state(competition_id, capacity, LoadState::Ready)
    }

    /// A channel that holds events back until [`seed`](Self::seed) runs
    pub fn loading(competition_id: CompetitionId, capacity: usize) -> Self {
        Self::with_state(competition_id, capacity, LoadState::Loading)
    }

    fn with_state(competition_id: CompetitionId, capacity: usize, load: LoadState) -> Self {
        let (event_tx, _) = broadcast::channel(capacity.max(1));
        let (load_tx, _) = watch::channel(load);
        Self {
            competition_id,
            state: Mutex::new(ChannelState {
                snapshot: StandingsSnapshot::new(),
                next_sequence: 1,
                backlog: (load == LoadState::Loading).then(Vec::new),
            }),
            client_count: AtomicUsize::new(0),
            event_tx,
            load_tx,
        }
    }

    pub fn load_state(&self) -> LoadState {
        *self.load_tx.borrow()
    }

    /// Fill the cache from rebuilt events and go live
    ///
    /// Rebuilt events come first. Any (participation, round) written by a
    /// held-back event keeps the held-back version, which is then applied on
    /// top in publish order.
    pub fn seed(&self, events: Vec<ScoreEvent>) {
        let mut state = self.state.lock();
        let backlog = state.backlog.take().unwrap_or_default();
        let live: HashSet<_> = backlog.iter().map(ChannelEvent::key).collect();

        state.snapshot = StandingsSnapshot::new();
        for event in events {
            if !live.contains(&(event.participation_id, event.round)) {
                state.stamp_and_apply(ChannelEvent::Score(event));
            }
        }
        let held_back = backlog.len();
        for event in backlog {
            state.stamp_and_apply(event);
        }
        tracing::debug!(
            competition = self.competition_id,
            entries = state.snapshot.len(),
            held_back,
            "Seeded channel"
        );
        drop(state);
        self.load_tx.send_replace(LoadState::Ready);
    }

    /// Give up loading; waiting viewers are released with a failure
    pub fn fail_load(&self) {
        self.state.lock().backlog = None;
        self.load_tx.send_replace(LoadState::Failed);
    }

    /// Wait until the channel is live; false if loading failed
    pub async fn wait_ready(&self) -> bool {
        let mut rx = self.load_tx.subscribe();
        let state = rx
            .wait_for(|s| *s != LoadState::Loading)
            .await
            .map(|s| *s);
        matches!(state, Ok(LoadState::Ready))
    }

    /// Stamp, cache and fan out one event
    ///
    /// Returns the stamped sequence, or `None` when the event was held back
    /// because the channel is still loading.
    pub fn publish(&self, event: ChannelEvent) -> Option<u64> {
        let mut state = self.state.lock();
        if let Some(backlog) = state.backlog.as_mut() {
            backlog.push(event);
            return None;
        }
        let event = state.stamp_and_apply(event);
        let sequence = event.sequence();
        // No receivers is fine: the cache still moved forward
        let _ = self.event_tx.send(event);
        Some(sequence)
    }

    /// Subscribe together with the snapshot the receiver starts from
    pub fn subscribe(&self) -> (broadcast::Receiver<ChannelEvent>, Vec<ScoreEvent>, u64) {
        let state = self.state.lock();
        let rx = self.event_tx.subscribe();
        (rx, state.snapshot.all_round_events(), state.snapshot.last_sequence())
    }

    /// Current cache contents and the last applied sequence
    pub fn snapshot(&self) -> (Vec<ScoreEvent>, u64) {
        let state = self.state.lock();
        (state.snapshot.all_round_events(), state.snapshot.last_sequence())
    }

    /// Rendered standings table
    pub fn render(&self) -> String {
        self.state.lock().snapshot.render()
    }

    /// Increment client count
    pub fn add_client(&self) {
        self.client_count.fetch_add(1, Ordering::SeqCst);
    }

    /// Decrement client count, returns true if this was the last client
    pub fn remove_client(&self) -> bool {
        self.client_count.fetch_sub(1, Ordering::SeqCst) == 1
    }

    /// Get current client count
    pub fn client_count(&self) -> usize {
        self.client_count.load(Ordering::SeqCst)
    }
}

/// Global registry of all competition channels
pub struct CompetitionRegistry {
    channels: RwLock<HashMap<CompetitionId, Arc<CompetitionChannel>>>,
    capacity: usize,
}

impl CompetitionRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            capacity,
        }
    }

    pub fn get(&self, competition_id: CompetitionId) -> Option<Arc<CompetitionChannel>> {
        self.channels.read().get(&competition_id).cloned()
    }

    /// Join a competition's channel, counting the caller as a client
    ///
    /// Returns true as the second value when the caller created the channel
    /// and must [`seed`](CompetitionChannel::seed) or
    /// [`fail_load`](CompetitionChannel::fail_load) it. Everyone else waits
    /// with [`wait_ready`](CompetitionChannel::wait_ready).
    pub fn attach(&self, competition_id: CompetitionId) -> (Arc<CompetitionChannel>, bool) {
        let mut channels = self.channels.write();
        let mut created = false;
        let channel = channels
            .entry(competition_id)
            .or_insert_with(|| {
                tracing::info!(competition = competition_id, "Creating competition channel");
                created = true;
                Arc::new(CompetitionChannel::loading(competition_id, self.capacity))
            })
            .clone();
        channel.add_client();
        (channel, created)
    }

    /// Stop counting a client, evicting the channel after the last one
    pub fn detach(&self, channel: &Arc<CompetitionChannel>) {
        if channel.remove_client() {
            self.maybe_evict(channel.competition_id);
        }
    }

    /// Drop a channel whose load failed so the next viewer starts over
    pub fn discard(&self, channel: &Arc<CompetitionChannel>) {
        let mut channels = self.channels.write();
        if channels
            .get(&channel.competition_id)
            .is_some_and(|c| Arc::ptr_eq(c, channel))
        {
            tracing::warn!(competition = channel.competition_id, "Discarding channel that failed to load");
            channels.remove(&channel.competition_id);
        }
    }

    /// Remove a channel if it has no clients
    pub fn maybe_evict(&self, competition_id: CompetitionId) {
        let mut channels = self.channels.write();
        if let Some(channel) = channels.get(&competition_id) {
            if channel.client_count() == 0 {
                tracing::info!(competition = competition_id, "Evicting competition channel (no clients)");
                channels.remove(&competition_id);
            }
        }
    }

    /// Get all competitions with a live channel
    pub fn active_competitions(&self) -> Vec<CompetitionId> {
        let mut ids: Vec<CompetitionId> = self.channels.read().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Get stats about the registry
    pub fn stats(&self) -> RegistryStats {
        let channels = self.channels.read();
        let total_clients: usize = channels.values().map(|c| c.client_count()).sum();
        RegistryStats {
            channel_count: channels.len(),
            total_clients,
        }
    }
}

impl Default for CompetitionRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl ScorePublisher for CompetitionRegistry {
    /// Events for a competition nobody watches are not broadcast; the store
    /// stays authoritative and the next viewer seeds from it.
    fn publish(&self, event: ChannelEvent) -> Result<Delivery> {
        let competition_id = event.competition_id();
        let Some(channel) = self.get(competition_id) else {
            tracing::debug!(competition = competition_id, "No live channel, event not broadcast");
            return Ok(Delivery::Unwatched);
        };
        Ok(match channel.publish(event) {
            Some(sequence) => Delivery::Published { sequence },
            None => Delivery::Queued,
        })
    }
}

/// Statistics about the registry
#[derive(Debug, Clone)]
pub struct RegistryStats {
    pub channel_count: usize,
    pub total_clients: usize,
}
