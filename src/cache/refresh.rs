//! Background refresh loop.
//!
//! The loop is an owned task: [`BackgroundRefresh`] keeps its join handle and
//! a shutdown channel. The task only holds a weak reference to the cache, so
//! dropping the cache ends it too.

use super::DiscoveryCache;
use std::sync::Weak;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub struct BackgroundRefresh {
    shutdown: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl BackgroundRefresh {
    pub(crate) fn spawn(cache: Weak<DiscoveryCache>, interval: Duration) -> Self {
        let (shutdown, rx) = watch::channel(false);
        let handle = tokio::spawn(run(cache, interval, rx));
        log::info!("Background refresh started (every {:?})", interval);
        Self {
            shutdown,
            handle: Some(handle),
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Signal the loop and wait for it to exit. An in-flight cycle is
    /// abandoned without touching the cached snapshots.
    pub async fn stop(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(handle) = self.handle.take()
            && let Err(e) = handle.await
        {
            log::error!("Background refresh task ended abnormally: {}", e);
        }
        log::info!("Background refresh stopped");
    }
}

impl Drop for BackgroundRefresh {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

async fn run(cache: Weak<DiscoveryCache>, interval: Duration, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick fires immediately; warm-up already covered it.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
        }

        let Some(cache) = cache.upgrade() else {
            log::debug!("Cache dropped, background refresh exiting");
            break;
        };
        if !cache.is_background_refresh_enabled() {
            continue;
        }

        tokio::select! {
            result = cache.refresh_expired() => {
                if let Err(e) = result {
                    log::warn!("Background refresh failed, retrying next tick: {}", e);
                }
            }
            _ = shutdown.changed() => {
                log::debug!("Background refresh cancelled mid-cycle");
                break;
            }
        }
    }
}
