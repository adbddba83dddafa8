//! The subscription engine.
//!
//! Two modes share one table. Interval subscriptions poll their provider
//! on a dedicated ticker task and push an update frame when the sorted
//! result set changed. Event subscriptions (`interval == 0`, empty
//! query) wait for provider-namespaced values on a process-wide bus
//! drained by a single router task.
//!
//! There is no cancel message: a subscription lives until a frame write
//! to its connection fails, at which point it is reaped.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info};

use elephant_core::provider::{Provider, QueryContext};
use elephant_proto::messages::{Item, SubscribeRequest, SubscribeResponse, compare_ranked};
use elephant_proto::{ConnectionWriter, Format, Status};

/// Subscription ids start well above connection ids so the two spaces
/// never collide in logs.
const SID_BASE: u32 = 100_000_000;

/// Sender half of the event bus.
pub type EventSender = mpsc::UnboundedSender<String>;

struct Sub {
    provider: String,
    query: String,
    interval: i32,
    format: Format,
    writer: Arc<ConnectionWriter>,
}

/// The subscription table plus the event bus feeding it.
pub struct Subscriptions {
    next_sid: AtomicU32,
    subs: Mutex<HashMap<u32, Sub>>,
    events: EventSender,
}

impl Subscriptions {
    /// Create the table and spawn the event router task.
    #[must_use]
    pub fn new() -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();

        let this = Arc::new(Self {
            next_sid: AtomicU32::new(SID_BASE),
            subs: Mutex::new(HashMap::new()),
            events: tx,
        });

        tokio::spawn(Arc::clone(&this).route_events(rx));

        this
    }

    /// A handle for pushing provider-namespaced event values, e.g.
    /// `"menus:bookmarks"` or `"bluetooth:connect"`.
    #[must_use]
    pub fn sender(&self) -> EventSender {
        self.events.clone()
    }

    /// Publish an event value onto the bus.
    pub fn notify(&self, value: impl Into<String>) {
        let _ = self.events.send(value.into());
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subs.lock().expect("subscription lock poisoned").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Register a subscription from a decoded request.
    ///
    /// `provider` is the already-resolved instance for interval mode;
    /// event-mode subscriptions match purely by name and need none.
    pub fn subscribe(
        self: &Arc<Self>,
        request: &SubscribeRequest,
        provider: Option<Arc<dyn Provider>>,
        writer: Arc<ConnectionWriter>,
        format: Format,
    ) {
        let sid = self.next_sid.fetch_add(1, Ordering::Relaxed) + 1;

        {
            let mut subs = self.subs.lock().expect("subscription lock poisoned");
            subs.insert(
                sid,
                Sub {
                    provider: request.provider.clone(),
                    query: request.query.clone(),
                    interval: request.interval,
                    format,
                    writer: Arc::clone(&writer),
                },
            );
        }

        info!(sid, provider = %request.provider, interval = request.interval, "subscription");

        if request.interval > 0 {
            if let Some(provider) = provider {
                tokio::spawn(Arc::clone(self).watch(
                    sid,
                    provider,
                    request.query.clone(),
                    request.interval,
                    writer,
                    format,
                ));
            }
        }
    }

    fn contains(&self, sid: u32) -> bool {
        self.subs
            .lock()
            .expect("subscription lock poisoned")
            .contains_key(&sid)
    }

    fn remove(&self, sid: u32) {
        self.subs
            .lock()
            .expect("subscription lock poisoned")
            .remove(&sid);
    }

    /// Ticker task for one interval subscription.
    async fn watch(
        self: Arc<Self>,
        sid: u32,
        provider: Arc<dyn Provider>,
        query: String,
        interval: i32,
        writer: Arc<ConnectionWriter>,
        format: Format,
    ) {
        let mut previous: Option<Vec<Item>> = None;

        loop {
            tokio::time::sleep(Duration::from_millis(interval as u64)).await;

            // Racing a deletion is fine; re-checking here just avoids
            // querying on behalf of a dead subscription.
            if !self.contains(sid) {
                return;
            }

            let ctx = QueryContext::new(Arc::clone(&writer), format, query.clone());
            let mut results = provider.query(&ctx, &query, true, false).await;
            results.sort_by(compare_ranked);

            match &previous {
                Some(snapshot) if results_changed(snapshot, &results) => {
                    previous = Some(results);

                    if !send_update(&writer, format, "").await {
                        self.remove(sid);
                        return;
                    }
                }
                Some(_) => {}
                None => previous = Some(results),
            }
        }
    }

    /// The single consumer of the event bus.
    async fn route_events(self: Arc<Self>, mut rx: mpsc::UnboundedReceiver<String>) {
        while let Some(value) = rx.recv().await {
            let family = event_family(&value);

            let targets: Vec<(u32, Arc<ConnectionWriter>, Format)> = {
                let subs = self.subs.lock().expect("subscription lock poisoned");
                subs.iter()
                    .filter(|(_, s)| {
                        s.provider == family && s.interval == 0 && s.query.is_empty()
                    })
                    .map(|(sid, s)| (*sid, Arc::clone(&s.writer), s.format))
                    .collect()
            };

            let mut dead = Vec::new();
            for (sid, writer, format) in targets {
                if !send_update(&writer, format, &value).await {
                    dead.push(sid);
                }
            }

            if !dead.is_empty() {
                let mut subs = self.subs.lock().expect("subscription lock poisoned");
                for sid in dead {
                    debug!(sid, "reaping dead subscription");
                    subs.remove(&sid);
                }
            }
        }
    }
}

async fn send_update(writer: &ConnectionWriter, format: Format, value: &str) -> bool {
    let response = SubscribeResponse {
        value: value.to_string(),
    };

    match writer
        .write_message(Status::SUBSCRIPTION_UPDATE, format, &response)
        .await
    {
        Ok(()) => true,
        Err(err) => {
            debug!(error = %err, value, "subscription write failed");
            false
        }
    }
}

/// Family an event value belongs to: `menus:*` and `bluetooth:*` match
/// subscriptions on the bare family name.
fn event_family(value: &str) -> &str {
    for family in ["menus", "bluetooth"] {
        if let Some(rest) = value.strip_prefix(family) {
            if rest.starts_with(':') {
                return family;
            }
        }
    }
    value
}

/// Diff rule for interval subscriptions: length first, then the fields a
/// front-end actually renders.
fn results_changed(old: &[Item], new: &[Item]) -> bool {
    if old.len() != new.len() {
        return true;
    }

    old.iter().zip(new).any(|(a, b)| {
        a.icon != b.icon || a.text != b.text || a.subtext != b.subtext || a.score != b.score
    })
}
