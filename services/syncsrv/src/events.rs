//! In-process event fan-out
//!
//! The orchestrator publishes sync outcomes here; consumers subscribe
//! independently and slow ones only lag themselves. Publishing with no
//! subscribers is a no-op.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use gridwatch_cache::Snapshot;
use gridwatch_model::{AlarmRecord, ResolvedAlarm};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::orchestrator::SyncKind;

/// Default channel capacity. A receiver that falls this far behind starts
/// losing the oldest events and is told how many it missed.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// Active alarm snapshot was replaced
    AlarmsChanged {
        snapshot: Arc<Snapshot<AlarmRecord>>,
    },
    /// Alarms absent from the previous snapshot, with display names resolved
    NewAlarms { alarms: Arc<Vec<ResolvedAlarm>> },
    /// A non-alarm snapshot was replaced
    SnapshotChanged {
        kind: SyncKind,
        count: usize,
        taken_at: DateTime<Utc>,
    },
    /// A sync cycle failed; the previous snapshot is still being served
    SyncFailed { kind: SyncKind, message: String },
}

/// Broadcast hub for [`SyncEvent`]s.
pub struct EventHub {
    sender: broadcast::Sender<SyncEvent>,
}

impl EventHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: SyncEvent) {
        // send only fails when no receiver exists, which is fine
        let _ = self.sender.send(event);
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

/// Spawns the built-in subscriber that turns events into log lines. New
/// alarms are logged one per alarm with resolved names, never bare ids.
pub fn spawn_log_subscriber(hub: &EventHub) -> JoinHandle<()> {
    let mut receiver = hub.subscribe();
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(SyncEvent::AlarmsChanged { snapshot }) => {
                    debug!("active alarm snapshot replaced, {} alarms", snapshot.len());
                }
                Ok(SyncEvent::NewAlarms { alarms }) => {
                    for alarm in alarms.iter() {
                        info!("new alarm: {}", alarm.summary());
                    }
                }
                Ok(SyncEvent::SnapshotChanged {
                    kind,
                    count,
                    taken_at,
                }) => {
                    debug!("{kind} snapshot replaced, {count} records at {taken_at}");
                }
                Ok(SyncEvent::SyncFailed { kind, message }) => {
                    warn!("sync of {kind} failed: {message}");
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!("event log subscriber lagged, {missed} events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscriber_receives_published_events() {
        let hub = EventHub::new(16);
        let mut rx = hub.subscribe();

        hub.publish(SyncEvent::SyncFailed {
            kind: SyncKind::Stats,
            message: "gateway returned 503".into(),
        });

        match rx.recv().await.unwrap() {
            SyncEvent::SyncFailed { kind, message } => {
                assert_eq!(kind, SyncKind::Stats);
                assert!(message.contains("503"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_each_subscriber_gets_its_own_copy() {
        let hub = EventHub::new(16);
        let mut a = hub.subscribe();
        let mut b = hub.subscribe();

        hub.publish(SyncEvent::SnapshotChanged {
            kind: SyncKind::Areas,
            count: 3,
            taken_at: Utc::now(),
        });

        assert!(matches!(
            a.recv().await.unwrap(),
            SyncEvent::SnapshotChanged { count: 3, .. }
        ));
        assert!(matches!(
            b.recv().await.unwrap(),
            SyncEvent::SnapshotChanged { count: 3, .. }
        ));
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_a_noop() {
        let hub = EventHub::new(16);
        assert_eq!(hub.receiver_count(), 0);
        hub.publish(SyncEvent::SyncFailed {
            kind: SyncKind::Stations,
            message: "nobody listening".into(),
        });
    }

    #[tokio::test]
    async fn test_events_published_before_subscribe_are_not_seen() {
        let hub = EventHub::new(16);
        hub.publish(SyncEvent::SnapshotChanged {
            kind: SyncKind::Stats,
            count: 1,
            taken_at: Utc::now(),
        });

        let mut rx = hub.subscribe();
        hub.publish(SyncEvent::SnapshotChanged {
            kind: SyncKind::Stats,
            count: 2,
            taken_at: Utc::now(),
        });

        assert!(matches!(
            rx.recv().await.unwrap(),
            SyncEvent::SnapshotChanged { count: 2, .. }
        ));
    }
}
