//! Tokio background-sync scheduler
//!
//! Native stand-in for the browser's background-sync registration: registered
//! triggers are one-shot and fire on the next interval tick. The coordinator
//! re-registers a trigger whenever a drain leaves work behind.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::offline::SyncTrigger;
use crate::ports::SyncScheduler;

type TriggerCallback = Arc<dyn Fn(SyncTrigger) + Send + Sync + 'static>;

/// Interval-driven [`SyncScheduler`].
pub struct TokioScheduler {
    registered: Mutex<HashSet<SyncTrigger>>,
    callback: Mutex<Option<TriggerCallback>>,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl TokioScheduler {
    /// Create the scheduler and start its tick task. The task holds only a
    /// weak reference and stops when the scheduler is dropped.
    pub fn new(interval: Duration) -> Arc<Self> {
        let scheduler = Arc::new(Self {
            registered: Mutex::new(HashSet::new()),
            callback: Mutex::new(None),
            ticker: Mutex::new(None),
        });

        let weak = Arc::downgrade(&scheduler);
        let handle = tokio::spawn(async move {
            let mut tick = tokio::time::interval(interval);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tick.tick().await;
                let Some(scheduler) = weak.upgrade() else {
                    break;
                };
                scheduler.fire_registered();
            }
        });
        if let Ok(mut ticker) = scheduler.ticker.lock() {
            *ticker = Some(handle);
        }
        scheduler
    }

    fn fire_registered(&self) {
        let fired: Vec<SyncTrigger> = match self.registered.lock() {
            Ok(mut registered) => registered.drain().collect(),
            Err(_) => return,
        };
        if fired.is_empty() {
            return;
        }

        let callback = self.callback.lock().ok().and_then(|cb| cb.clone());
        match callback {
            Some(callback) => {
                for trigger in fired {
                    tracing::debug!(%trigger, "firing sync trigger");
                    callback(trigger);
                }
            }
            None => {
                // No handler yet; keep the triggers armed.
                if let Ok(mut registered) = self.registered.lock() {
                    registered.extend(fired);
                }
            }
        }
    }
}

impl SyncScheduler for TokioScheduler {
    fn register(&self, trigger: SyncTrigger) {
        if let Ok(mut registered) = self.registered.lock() {
            if registered.insert(trigger) {
                tracing::debug!(%trigger, "sync trigger registered");
            }
        }
    }

    fn on_trigger(&self, callback: Box<dyn Fn(SyncTrigger) + Send + Sync + 'static>) {
        if let Ok(mut slot) = self.callback.lock() {
            *slot = Some(Arc::from(callback));
        }
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        if let Ok(mut ticker) = self.ticker.lock() {
            if let Some(handle) = ticker.take() {
                handle.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_registered_trigger_fires_once() {
        let scheduler = TokioScheduler::new(Duration::from_secs(30));
        let fired = Arc::new(AtomicU32::new(0));

        let fired_clone = Arc::clone(&fired);
        scheduler.on_trigger(Box::new(move |trigger| {
            assert_eq!(trigger, SyncTrigger::DiceRolls);
            fired_clone.fetch_add(1, Ordering::SeqCst);
        }));
        scheduler.register(SyncTrigger::DiceRolls);

        // Triggers are one-shot: after firing once, further ticks are quiet.
        tokio::time::sleep(Duration::from_secs(95)).await;
        tokio::task::yield_now().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_triggers_survive_until_a_handler_exists() {
        let scheduler = TokioScheduler::new(Duration::from_secs(10));
        scheduler.register(SyncTrigger::ChatMessages);

        // Ticks pass with no handler installed; the trigger stays armed.
        tokio::time::sleep(Duration::from_secs(25)).await;
        tokio::task::yield_now().await;

        let fired = Arc::new(AtomicU32::new(0));
        let fired_clone = Arc::clone(&fired);
        scheduler.on_trigger(Box::new(move |_| {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        }));

        tokio::time::sleep(Duration::from_secs(15)).await;
        tokio::task::yield_now().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
