//! Trigger events and the bus that dispatches them to registered handlers.

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use std::{collections::HashMap, fmt, future::Future, sync::Arc};
use tokio::{sync::mpsc, task::JoinSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    /// Fired once when the bridge starts.
    Ready,
    /// Fired each time the watch asks for a refresh.
    AppMessage,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::Ready => "ready",
            Event::AppMessage => "appmessage",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stream of trigger events; `None` means no more events will arrive.
#[async_trait]
pub trait EventSource: Send {
    async fn next_event(&mut self) -> Option<Event>;
}

/// Event source fed through a tokio channel.
#[derive(Debug)]
pub struct ChannelEvents {
    rx: mpsc::Receiver<Event>,
}

/// Producer half of [`ChannelEvents`]. The source ends once every sender is dropped.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::Sender<Event>,
}

impl EventSender {
    /// Returns `false` if the receiving side is gone.
    pub async fn emit(&self, event: Event) -> bool {
        self.tx.send(event).await.is_ok()
    }
}

pub fn channel(buffer: usize) -> (EventSender, ChannelEvents) {
    let (tx, rx) = mpsc::channel(buffer);
    (EventSender { tx }, ChannelEvents { rx })
}

#[async_trait]
impl EventSource for ChannelEvents {
    async fn next_event(&mut self) -> Option<Event> {
        self.rx.recv().await
    }
}

type Handler = Arc<dyn Fn(Event) -> BoxFuture<'static, ()> + Send + Sync>;

/// Explicit handler registry. Every dispatch spawns its handlers as
/// independent tasks; nothing serialises or deduplicates them.
#[derive(Default)]
pub struct EventBus {
    handlers: HashMap<Event, Vec<Handler>>,
    tasks: JoinSet<()>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("events", &self.handlers.keys().collect::<Vec<_>>())
            .field("in_flight", &self.tasks.len())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F, Fut>(&mut self, event: Event, handler: F)
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handler: Handler = Arc::new(move |event: Event| handler(event).boxed());
        self.handlers.entry(event).or_default().push(handler);
    }

    pub fn handler_count(&self, event: Event) -> usize {
        self.handlers.get(&event).map_or(0, Vec::len)
    }

    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Spawn every handler registered for `event`. Must be called from
    /// within a tokio runtime. Returns how many handlers were started.
    pub fn dispatch(&mut self, event: Event) -> usize {
        let Some(handlers) = self.handlers.get(&event) else {
            tracing::debug!(%event, "no handler registered");
            return 0;
        };

        for handler in handlers {
            self.tasks.spawn(handler(event));
        }
        handlers.len()
    }

    /// Dispatch events until the source ends, then wait for in-flight handlers.
    pub async fn run<S>(&mut self, source: &mut S) -> usize
    where
        S: EventSource + ?Sized,
    {
        let mut dispatched = 0;
        while let Some(event) = source.next_event().await {
            tracing::info!(%event, "event received");
            dispatched += self.dispatch(event);

            // Reap finished handlers so the set does not grow unbounded.
            while let Some(done) = self.tasks.try_join_next() {
                log_join(done);
            }
        }

        self.drain().await;
        dispatched
    }

    /// Wait for every spawned handler to finish.
    pub async fn drain(&mut self) {
        while let Some(done) = self.tasks.join_next().await {
            log_join(done);
        }
    }
}

fn log_join(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        tracing::error!("event handler aborted: {e}");
    }
}
