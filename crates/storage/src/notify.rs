//! Bucket change notifications.

use crate::error::Result;
use async_stream::stream;
use futures::{Stream, StreamExt};
use std::collections::BTreeMap;
use std::pin::Pin;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// How often a polled bucket is rescanned unless configured otherwise.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Object key to an opaque fingerprint (size, modification time, etag...) of
/// every object in a bucket.
pub type Snapshot = BTreeMap<String, String>;

/// Something changed in a bucket.
///
/// Consumers should treat this as opaque. Not every backend knows which object
/// changed (or how many events it dropped on the floor), so `key` is purely
/// informational.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub bucket: String,
    pub key: Option<String>,
}
impl Notification {
    pub fn new(bucket: impl Into<String>, key: Option<String>) -> Self {
        Self { bucket: bucket.into(), key }
    }
}

/// Feed of [`Notification`]s, ending once the stop token it was created with
/// is cancelled.
pub type NotificationStream = Pin<Box<dyn Stream<Item = Notification> + Send + 'static>>;

/// A feed that never yields anything and ends when `stop` is cancelled.
///
/// Used by backends that have no way of finding out about changes.
pub fn idle(stop: CancellationToken) -> NotificationStream {
    Box::pin(futures::stream::once(stop.cancelled_owned()).filter_map(|()| futures::future::ready(None::<Notification>)))
}

/// A feed for backends that can only find out about changes by looking.
///
/// `scan` is called every `period` and its result compared with the previous
/// one; any difference yields a single [`Notification`]. Without a `baseline`
/// the first scan becomes the baseline, so changes made before it completes
/// are not reported. A failing scan is logged and skipped.
pub fn poll<F, Fut>(
    bucket: impl Into<String>,
    period: Duration,
    baseline: Option<Snapshot>,
    stop: CancellationToken,
    mut scan: F,
) -> NotificationStream
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Snapshot>> + Send + 'static,
{
    let bucket = bucket.into();
    Box::pin(stream! {
        let mut previous = baseline;
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = stop.cancelled() => break,
                _ = ticker.tick() => {},
            }
            let current = match scan().await {
                Ok(current) => current,
                Err(err) => {
                    tracing::warn!(bucket = %bucket, error = ?err, "Failed to scan bucket for changes");
                    continue;
                },
            };
            if let Some(previous) = &previous {
                if let Some(notification) = difference(&bucket, previous, &current) {
                    yield notification;
                }
            }
            previous = Some(current);
        }
    })
}

/// One notification for everything that differs between two snapshots. The
/// key is only filled in when exactly one object changed.
fn difference(bucket: &str, previous: &Snapshot, current: &Snapshot) -> Option<Notification> {
    let mut changed = current
        .iter()
        .filter(|(key, fingerprint)| previous.get(*key) != Some(*fingerprint))
        .map(|(key, _)| key)
        .chain(previous.keys().filter(|key| !current.contains_key(*key)));
    let first = changed.next()?;
    let key = match changed.next() {
        None => Some(first.clone()),
        Some(_) => None,
    };
    Some(Notification::new(bucket, key))
}
