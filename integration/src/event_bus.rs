//! In-process publish/subscribe event bus with bounded history and per-topic
//! debounce (spec §4.1).

use std::{
    collections::VecDeque,
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::error;

use crate::collection::FnvIndexMap;

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// An event published to the bus (spec §3 `Event`, §6 topic catalogue).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: String,
    pub timestamp: DateTime<Utc>,
    pub data: serde_json::Value,
    pub source: String,
    pub correlation_id: Option<String>,
}

impl Event {
    pub fn new(kind: impl Into<String>, data: serde_json::Value, source: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            timestamp: Utc::now(),
            data,
            source: source.into(),
            correlation_id: None,
        }
    }
}

/// Handle returned by [`EventBus::subscribe`]; pass to [`EventBus::unsubscribe`].
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Arc<dyn Fn(Event) -> BoxFuture<Result<(), String>> + Send + Sync>;

struct Subscriber {
    id: SubscriptionId,
    handler: Handler,
}

#[derive(Default)]
struct DebounceSlot {
    timer_running: bool,
    pending_count: u32,
    pending_event: Option<Event>,
}

struct Inner {
    subscribers: FnvIndexMap<String, Vec<Subscriber>>,
    history: VecDeque<Event>,
    history_cap: usize,
    debounce_topics: FnvIndexMap<String, std::time::Duration>,
    debounce_slots: FnvIndexMap<String, DebounceSlot>,
    next_id: AtomicU64,
}

/// In-process, single-lock event bus (spec §5: "Event bus internal tables:
/// mutated under a single lock").
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Mutex<Inner>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus").finish_non_exhaustive()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl EventBus {
    pub fn new(history_cap: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                subscribers: FnvIndexMap::default(),
                history: VecDeque::with_capacity(history_cap.min(4096)),
                history_cap,
                debounce_topics: FnvIndexMap::default(),
                debounce_slots: FnvIndexMap::default(),
                next_id: AtomicU64::new(1),
            })),
        }
    }

    /// Mark `topic` as debounced with the given coalescing `delay` (default 1s, spec §4.1).
    pub async fn set_debounced(&self, topic: impl Into<String>, delay: std::time::Duration) {
        let mut inner = self.inner.lock().await;
        inner.debounce_topics.insert(topic.into(), delay);
    }

    /// Register `handler` for `topic`. Subscribers are invoked in registration order.
    pub async fn subscribe<F, Fut>(&self, topic: impl Into<String>, handler: F) -> SubscriptionId
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), String>> + Send + 'static,
    {
        let mut inner = self.inner.lock().await;
        let id = SubscriptionId(inner.next_id.fetch_add(1, Ordering::Relaxed));
        let handler: Handler = Arc::new(move |event| Box::pin(handler(event)));
        inner
            .subscribers
            .entry(topic.into())
            .or_default()
            .push(Subscriber { id, handler });
        id
    }

    pub async fn unsubscribe(&self, id: SubscriptionId) {
        let mut inner = self.inner.lock().await;
        for subs in inner.subscribers.values_mut() {
            subs.retain(|s| s.id != id);
        }
    }

    /// Publish `payload` to `topic`. Non-debounced topics dispatch immediately
    /// to every subscriber, in registration order, under the bus's single
    /// lock; a subscriber error is logged to `tracing::error!` and never
    /// prevents later subscribers from running or propagates to the caller.
    pub async fn publish(&self, topic: impl Into<String>, payload: serde_json::Value, source: impl Into<String>) {
        let topic = topic.into();
        let event = Event::new(topic.clone(), payload, source);

        let mut inner = self.inner.lock().await;
        if let Some(delay) = inner.debounce_topics.get(&topic).copied() {
            self.schedule_debounced(&mut inner, topic, event, delay);
            return;
        }
        Self::record_history(&mut inner, event.clone());
        Self::dispatch(&mut inner, &topic, event).await;
    }

    fn schedule_debounced(&self, inner: &mut Inner, topic: String, event: Event, delay: std::time::Duration) {
        let slot = inner.debounce_slots.entry(topic.clone()).or_default();
        slot.pending_count += 1;
        slot.pending_event = Some(event);

        if slot.timer_running {
            return;
        }
        slot.timer_running = true;

        let bus = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            bus.fire_debounced(topic).await;
        });
    }

    async fn fire_debounced(&self, topic: String) {
        let mut inner = self.inner.lock().await;
        let Some(slot) = inner.debounce_slots.get_mut(&topic) else {
            return;
        };
        slot.timer_running = false;
        let count = slot.pending_count;
        let Some(mut event) = slot.pending_event.take() else {
            return;
        };
        slot.pending_count = 0;

        if let serde_json::Value::Object(ref mut map) = event.data {
            map.insert("coalescedCount".to_string(), serde_json::Value::from(count));
        }

        Self::record_history(&mut inner, event.clone());
        Self::dispatch(&mut inner, &topic, event).await;
    }

    fn record_history(inner: &mut Inner, event: Event) {
        if inner.history.len() >= inner.history_cap {
            inner.history.pop_front();
        }
        inner.history.push_back(event);
    }

    async fn dispatch(inner: &mut Inner, topic: &str, event: Event) {
        let Some(subs) = inner.subscribers.get(topic) else {
            return;
        };
        for sub in subs.clone_handlers() {
            if let Err(err) = (sub)(event.clone()).await {
                error!(topic, error = %err, "event bus subscriber failed");
            }
        }
    }

    /// Return up to `limit` (default 100) most recent events for `topic`, newest first.
    pub async fn get_history(&self, topic: &str, limit: Option<usize>) -> Vec<Event> {
        let inner = self.inner.lock().await;
        let limit = limit.unwrap_or(100);
        inner
            .history
            .iter()
            .rev()
            .filter(|e| e.kind == topic)
            .take(limit)
            .cloned()
            .collect()
    }
}

trait CloneHandlers {
    fn clone_handlers(&self) -> Vec<Handler>;
}

impl CloneHandlers for Vec<Subscriber> {
    fn clone_handlers(&self) -> Vec<Handler> {
        self.iter().map(|s| s.handler.clone()).collect()
    }
}
