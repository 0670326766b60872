use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Weak;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

/// Work an observer hands back to be driven after its lock is released.
pub(crate) type TimeoutFollowUp = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Receiver of timer expirations.
#[async_trait]
pub(crate) trait TimeoutObserver {
    /// Invoked when the timer keyed by `key` fires. `token` identifies the
    /// arming; the observer must discard fires whose token is stale.
    async fn on_timeout(&mut self, key: &str, token: u64) -> Option<TimeoutFollowUp>;
}

struct TimerEntry {
    token: u64,
    close_tx: mpsc::Sender<()>,
}

/// Keyed single-shot timers.
///
/// Each armed timer is a spawned sleep guarded by a close channel; dropping
/// the sender cancels the task. The observer is held weakly so armed timers
/// never keep a dropped channel alive.
pub(crate) struct Timers<T: TimeoutObserver + Send + 'static> {
    observer: Weak<Mutex<T>>,
    entries: HashMap<String, TimerEntry>,
    next_token: u64,
}

impl<T: TimeoutObserver + Send + 'static> Timers<T> {
    pub(crate) fn new(observer: Weak<Mutex<T>>) -> Self {
        Timers {
            observer,
            entries: HashMap::new(),
            next_token: 0,
        }
    }

    /// Arms the timer under `key`, replacing (and thereby cancelling) any
    /// previous arming of the same key.
    pub(crate) fn set_timeout(&mut self, key: &str, timeout: Duration) {
        let token = self.next_token;
        self.next_token += 1;

        let (close_tx, mut close_rx) = mpsc::channel(1);
        self.entries
            .insert(key.to_owned(), TimerEntry { token, close_tx });

        let observer = self.observer.clone();
        let key = key.to_owned();
        tokio::spawn(async move {
            let timer = tokio::time::sleep(timeout);
            tokio::pin!(timer);

            tokio::select! {
                _ = timer.as_mut() => {
                    if let Some(observer) = observer.upgrade() {
                        let follow_up = {
                            let mut observer = observer.lock().await;
                            observer.on_timeout(&key, token).await
                        };
                        if let Some(follow_up) = follow_up {
                            follow_up.await;
                        }
                    }
                }
                _ = close_rx.recv() => {}
            }
        });
    }

    /// Cancels the timer under `key`, if armed.
    pub(crate) fn clear_timeout(&mut self, key: &str) {
        self.entries.remove(key);
    }

    /// Removes the entry for `key` if it still belongs to the arming that
    /// holds `token`. False means the timer was re-armed or cancelled after
    /// the task was spawned and the fire must be ignored.
    pub(crate) fn take_if_current(&mut self, key: &str, token: u64) -> bool {
        match self.entries.get(key) {
            Some(entry) if entry.token == token => {
                self.entries.remove(key);
                true
            }
            _ => false,
        }
    }

    /// Cancels every armed timer.
    pub(crate) fn clear_all(&mut self) {
        self.entries.clear();
    }
}
