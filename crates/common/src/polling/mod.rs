//! Notification polling
//!
//! The backend has no push channel, so notifications are the activity feed
//! refetched on a fixed interval. The poller task is owned by a
//! [`PollerHandle`]; stopping or dropping the handle ends it.

use crate::client::ApiClient;
use crate::errors::Result;
use crate::metrics::record_poll;
use crate::models::Activity;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// Default refetch interval
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Where notifications come from
#[async_trait]
pub trait ActivitySource: Send + Sync {
    async fn fetch_activities(&self) -> Result<Vec<Activity>>;
}

#[async_trait]
impl ActivitySource for ApiClient {
    async fn fetch_activities(&self) -> Result<Vec<Activity>> {
        self.list_activities().await
    }
}

/// Latest published notifications
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationState {
    pub activities: Vec<Activity>,

    /// True until the first fetch attempt has finished
    pub loading: bool,

    /// Message from the most recent failed fetch, cleared on success
    pub last_error: Option<String>,
}

pub struct NotificationPoller<S: ActivitySource + ?Sized> {
    source: Arc<S>,
    interval: Duration,
}

impl<S: ActivitySource + ?Sized + 'static> NotificationPoller<S> {
    pub fn new(source: Arc<S>) -> Self {
        Self {
            source,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Spawn the polling task. The first fetch happens immediately.
    pub fn start(self) -> PollerHandle {
        let (tx, rx) = watch::channel(NotificationState {
            loading: true,
            ..Default::default()
        });

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let result = self.source.fetch_activities().await;
                record_poll(result.is_ok());

                tx.send_if_modified(|state| {
                    let was_loading = std::mem::replace(&mut state.loading, false);
                    match result {
                        Ok(activities) => {
                            debug!(count = activities.len(), "Notifications refreshed");
                            let changed = was_loading
                                || state.last_error.is_some()
                                || state.activities != activities;
                            state.activities = activities;
                            state.last_error = None;
                            changed
                        }
                        Err(e) => {
                            // keep the previous list
                            warn!(error = %e, "Notification poll failed");
                            state.last_error = Some(e.to_string());
                            true
                        }
                    }
                });

                if tx.is_closed() {
                    debug!("All notification subscribers gone, stopping poller");
                    break;
                }
            }
        });

        PollerHandle { rx, task }
    }
}

/// Owner of a running poller
pub struct PollerHandle {
    rx: watch::Receiver<NotificationState>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Current notifications
    pub fn current(&self) -> NotificationState {
        self.rx.borrow().clone()
    }

    /// Receiver that is notified on every change
    pub fn subscribe(&self) -> watch::Receiver<NotificationState> {
        self.rx.clone()
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    pub fn stop(self) {
        self.task.abort();
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
