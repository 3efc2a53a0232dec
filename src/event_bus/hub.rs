use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{self, BoxStream, StreamExt};
use parking_lot::RwLock;
use tokio::sync::{
    broadcast::{self, Receiver, Sender},
    watch,
};
use tokio::time::timeout;

use super::emitter::{EmitterError, EventEmitter};
use super::event::{Event, SessionEventKind};

/// Multiplier applied to a hub's broadcast capacity to size the retained
/// buffer of non-`StepProgress` session events (see
/// [`EventHub::retain_if_protected`]). These events are emitted far less
/// often than `StepProgress`, so this bound is not expected to bind in a
/// real session; it exists only to cap worst-case memory.
const RETAINED_CAPACITY_MULTIPLIER: usize = 8;

/// Snapshot of hub health for monitoring and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventHubMetrics {
    /// Maximum number of events buffered per subscriber before lag occurs.
    pub capacity: usize,
    /// Total count of events dropped due to slow subscribers.
    pub dropped: usize,
}

#[derive(Debug)]
pub struct EventHub {
    sender: RwLock<Option<Sender<Event>>>,
    dropped_events: AtomicUsize,
    capacity: usize,
    /// The most recent `SessionStarted` event, replayed to subscribers that
    /// join after it was published so a late dashboard still sees session
    /// identity/topic without racing the broadcast channel.
    last_session_started: RwLock<Option<Event>>,
    /// Every session event whose kind is not `StepProgress`, keyed by
    /// sequence number. The underlying broadcast channel drops whatever is
    /// oldest once a lagging subscriber falls behind, with no regard for
    /// kind; this buffer lets a lagged subscriber replay exactly the
    /// high-value events it missed instead of losing them outright, so only
    /// `StepProgress` is ever actually coalesced away.
    retained_session_events: RwLock<VecDeque<(u64, Event)>>,
}

impl EventHub {
    /// Create a new hub backed by a Tokio broadcast channel.
    ///
    /// `capacity` is clamped to at least 1 to satisfy the broadcast API.
    pub fn new(capacity: usize) -> Arc<Self> {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        Arc::new(Self {
            sender: RwLock::new(Some(sender)),
            dropped_events: AtomicUsize::new(0),
            capacity,
            last_session_started: RwLock::new(None),
            retained_session_events: RwLock::new(VecDeque::new()),
        })
    }

    /// Publish an event to all subscribers.
    ///
    /// Returns [`EmitterError::Closed`] if the hub has been shut down.
    pub fn publish(&self, event: Event) -> Result<(), EmitterError> {
        if let Event::Session(session) = &event {
            if matches!(session.kind, SessionEventKind::SessionStarted { .. }) {
                *self.last_session_started.write() = Some(event.clone());
            }
        }
        self.retain_if_protected(&event);
        match self.current_sender() {
            Some(sender) => match sender.send(event) {
                Ok(_) => Ok(()),
                Err(broadcast::error::SendError(event)) => {
                    drop(event);
                    Err(EmitterError::Closed)
                }
            },
            None => Err(EmitterError::Closed),
        }
    }

    /// Subscribe to a fresh receiver.
    ///
    /// If the hub has already been closed, this returns a closed receiver to keep
    /// downstream code simple.
    pub fn subscribe(self: &Arc<Self>) -> EventStream {
        let receiver = self
            .current_sender()
            .map(|sender| sender.subscribe())
            .unwrap_or_else(|| {
                let (sender, receiver) = broadcast::channel(self.capacity.max(1));
                drop(sender);
                receiver
            });
        EventStream {
            receiver,
            hub: Arc::clone(self),
            shutdown: None,
            replay: self.last_session_started.read().clone(),
            last_session_seq: None,
            pending_replays: VecDeque::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn dropped(&self) -> usize {
        self.dropped_events.load(Ordering::Relaxed)
    }

    pub fn metrics(&self) -> EventHubMetrics {
        EventHubMetrics {
            capacity: self.capacity(),
            dropped: self.dropped(),
        }
    }

    pub fn emitter(self: &Arc<Self>) -> HubEmitter {
        HubEmitter {
            hub: Arc::clone(self),
        }
    }

    /// Close the hub and signal all subscribers that no further events will arrive.
    pub fn close(&self) {
        let _ = self.sender.write().take();
    }

    fn current_sender(&self) -> Option<Sender<Event>> {
        self.sender.read().clone()
    }

    fn retain_if_protected(&self, event: &Event) {
        let Event::Session(session) = event else {
            return;
        };
        if matches!(session.kind, SessionEventKind::StepProgress { .. }) {
            return;
        }
        let cap = self.capacity.saturating_mul(RETAINED_CAPACITY_MULTIPLIER);
        let mut retained = self.retained_session_events.write();
        retained.push_back((session.sequence, event.clone()));
        while retained.len() > cap.max(1) {
            retained.pop_front();
        }
    }

    /// All retained (non-`StepProgress`) session events with a sequence
    /// number strictly greater than `after`, in sequence order.
    fn session_events_since(&self, after: Option<u64>) -> VecDeque<Event> {
        let after = after.unwrap_or(0);
        self.retained_session_events
            .read()
            .iter()
            .filter(|(seq, _)| *seq > after)
            .map(|(_, event)| event.clone())
            .collect()
    }

    fn record_lag(&self, missed: u64) {
        if missed == 0 {
            return;
        }
        let increment = usize::try_from(missed).unwrap_or(usize::MAX);
        let total = self
            .dropped_events
            .fetch_add(increment, Ordering::Relaxed)
            .saturating_add(increment);
        tracing::warn!(
            target: "synthgraph::event_bus",
            missed,
            total_dropped = total,
            "event stream lagged; dropped events"
        );
    }
}

#[derive(Clone, Debug)]
pub struct HubEmitter {
    hub: Arc<EventHub>,
}

impl EventEmitter for HubEmitter {
    fn emit(&self, event: Event) -> Result<(), EmitterError> {
        self.hub.publish(event)
    }
}

#[derive(Debug)]
pub struct EventStream {
    receiver: Receiver<Event>,
    hub: Arc<EventHub>,
    shutdown: Option<watch::Receiver<bool>>,
    /// One-shot replay of the last `SessionStarted` event, drained before the
    /// live receiver on a subscriber's first `recv`/`try_recv` call.
    replay: Option<Event>,
    /// Sequence number of the last `Event::Session` this stream delivered,
    /// so a lag recovery knows where to resume replay from.
    last_session_seq: Option<u64>,
    /// Non-`StepProgress` session events queued for replay after a lag was
    /// detected, drained before falling back to the live receiver.
    pending_replays: VecDeque<Event>,
}

impl EventStream {
    fn note_session_seq(&mut self, event: &Event) {
        if let Event::Session(session) = event {
            self.last_session_seq = Some(session.sequence);
        }
    }

    /// Recover from a lag by queuing every retained non-`StepProgress` event
    /// this stream missed. Returns the first one, if any.
    fn recover_lag(&mut self) -> Option<Event> {
        self.pending_replays = self.hub.session_events_since(self.last_session_seq);
        self.pending_replays.pop_front()
    }

    pub async fn recv(&mut self) -> Result<Event, broadcast::error::RecvError> {
        if let Some(event) = self.replay.take() {
            self.note_session_seq(&event);
            return Ok(event);
        }
        if let Some(event) = self.pending_replays.pop_front() {
            self.note_session_seq(&event);
            return Ok(event);
        }
        match self.receiver.recv().await {
            Ok(event) => {
                self.note_session_seq(&event);
                Ok(event)
            }
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                self.hub.record_lag(missed);
                match self.recover_lag() {
                    Some(event) => {
                        self.note_session_seq(&event);
                        Ok(event)
                    }
                    None => Err(broadcast::error::RecvError::Lagged(missed)),
                }
            }
            Err(err) => Err(err),
        }
    }

    pub fn try_recv(&mut self) -> Result<Event, broadcast::error::TryRecvError> {
        if let Some(event) = self.replay.take() {
            self.note_session_seq(&event);
            return Ok(event);
        }
        if let Some(event) = self.pending_replays.pop_front() {
            self.note_session_seq(&event);
            return Ok(event);
        }
        match self.receiver.try_recv() {
            Ok(event) => {
                self.note_session_seq(&event);
                Ok(event)
            }
            Err(broadcast::error::TryRecvError::Lagged(missed)) => {
                self.hub.record_lag(missed);
                if let Some(event) = self.recover_lag() {
                    self.note_session_seq(&event);
                    return Ok(event);
                }
                Err(broadcast::error::TryRecvError::Lagged(missed))
            }
            Err(err) => Err(err),
        }
    }

    /// Drops any pending replay event along with `self`; callers that need it
    /// should drain it via [`Self::try_recv`] first.
    pub fn into_inner(self) -> Receiver<Event> {
        self.receiver
    }

    pub fn into_blocking_iter(self) -> BlockingEventIter {
        BlockingEventIter {
            receiver: self.receiver,
            hub: self.hub,
            replay: self.replay,
            last_session_seq: self.last_session_seq,
            pending_replays: self.pending_replays,
        }
    }

    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        // Consumers can share a `watch` channel to terminate the stream early when
        // the producer side shuts down (e.g. HTTP connection dropped).
        self.shutdown = Some(shutdown);
        self
    }

    pub fn into_async_stream(self) -> BoxStream<'static, Event> {
        // Convert the broadcast receiver into a boxed stream so callers can plug it into
        // combinators without worrying about pinning or generics at the call site.
        let EventStream {
            receiver,
            hub,
            shutdown,
            replay,
            last_session_seq,
            pending_replays,
        } = self;
        let prefix = stream::iter(replay);
        let rest = stream::unfold(
            (receiver, hub, shutdown, last_session_seq, pending_replays),
            |(mut receiver, hub, mut shutdown, mut last_session_seq, mut pending_replays)| async move {
                loop {
                    if let Some(event) = pending_replays.pop_front() {
                        if let Event::Session(session) = &event {
                            last_session_seq = Some(session.sequence);
                        }
                        return Some((
                            event,
                            (receiver, hub, shutdown, last_session_seq, pending_replays),
                        ));
                    }
                    let recv = if let Some(ref mut shutdown_rx) = shutdown {
                        tokio::select! {
                            biased;
                            changed = shutdown_rx.changed() => {
                                if changed.is_ok() && *shutdown_rx.borrow() {
                                    return None;
                                }
                                continue;
                            }
                            recv = receiver.recv() => recv,
                        }
                    } else {
                        receiver.recv().await
                    };
                    match recv {
                        Ok(event) => {
                            if let Event::Session(session) = &event {
                                last_session_seq = Some(session.sequence);
                            }
                            return Some((
                                event,
                                (receiver, hub, shutdown, last_session_seq, pending_replays),
                            ));
                        }
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            hub.record_lag(missed);
                            pending_replays = hub.session_events_since(last_session_seq);
                            continue;
                        }
                        Err(broadcast::error::RecvError::Closed) => return None,
                    }
                }
            },
        );
        prefix.chain(rest).boxed()
    }

    pub async fn next_timeout(&mut self, duration: Duration) -> Option<Event> {
        // Keep polling until we either obtain an event, the channel closes, or the
        // deadline elapses. Lagged notifications simply increment drop metrics and retry.
        loop {
            match timeout(duration, self.recv()).await {
                Ok(Ok(event)) => return Some(event),
                Ok(Err(broadcast::error::RecvError::Lagged(_))) => continue,
                Ok(Err(broadcast::error::RecvError::Closed)) => return None,
                Err(_) => return None,
            }
        }
    }
}

pub struct BlockingEventIter {
    receiver: Receiver<Event>,
    hub: Arc<EventHub>,
    replay: Option<Event>,
    last_session_seq: Option<u64>,
    pending_replays: VecDeque<Event>,
}

impl BlockingEventIter {
    fn note_session_seq(&mut self, event: &Event) {
        if let Event::Session(session) = event {
            self.last_session_seq = Some(session.sequence);
        }
    }
}

impl Iterator for BlockingEventIter {
    type Item = Event;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(event) = self.replay.take() {
            self.note_session_seq(&event);
            return Some(event);
        }
        if let Some(event) = self.pending_replays.pop_front() {
            self.note_session_seq(&event);
            return Some(event);
        }
        loop {
            match self.receiver.blocking_recv() {
                Ok(event) => {
                    self.note_session_seq(&event);
                    return Some(event);
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    self.hub.record_lag(missed);
                    self.pending_replays = self.hub.session_events_since(self.last_session_seq);
                    if let Some(event) = self.pending_replays.pop_front() {
                        self.note_session_seq(&event);
                        return Some(event);
                    }
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
