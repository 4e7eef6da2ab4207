//! Filesystem watcher for the ban-list directory
//!
//! Translates raw notify events into debounced reload requests: a burst of
//! change events (a multi-file copy, an editor's write-and-rename dance)
//! collapses into a single request fired once the directory has been quiet
//! for the debounce window. A dead watch is surfaced, never swallowed.

use std::path::PathBuf;
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::error::WardenResult;

/// Delay after the most recent change event before a reload fires.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(500);

/// Signals crossing from notify's watch thread into the debounce task.
#[derive(Debug)]
enum WatchSignal {
    /// Something in the directory changed.
    Changed,
    /// The watch itself failed and will produce no further events.
    Fatal(String),
}

/// Requests consumed by the service's reload task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadRequest {
    /// The ban-list directory changed and has settled; reload it.
    Reload,
    /// The filesystem watch died; no further reloads will arrive.
    WatcherFailed(String),
    /// Stop the reload task.
    Shutdown,
}

/// Watches the ban-list directory and emits one reload request per quiescent
/// burst of change events.
pub struct ChangeWatcher {
    dir: PathBuf,
    window: Duration,
}

impl ChangeWatcher {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            window: DEBOUNCE_WINDOW,
        }
    }

    /// Install the filesystem watch and spawn the debounce task.
    ///
    /// Watching is non-recursive, matching the loader's enumeration. The
    /// notify watcher is moved into the spawned task and lives for as long
    /// as the debounce loop runs.
    ///
    /// # Errors
    /// Returns `WatcherInit` if the watch cannot be installed.
    pub fn spawn(self, reload_tx: Sender<ReloadRequest>) -> WardenResult<()> {
        let (signal_tx, signal_rx) = mpsc::channel::<WatchSignal>(64);

        let mut watcher = RecommendedWatcher::new(
            move |result: notify::Result<Event>| {
                let signal = match result {
                    Ok(event) if is_qualifying(&event.kind) => WatchSignal::Changed,
                    Ok(_) => return,
                    Err(err) => WatchSignal::Fatal(err.to_string()),
                };
                // A full channel just drops the signal; the debounce only
                // needs to know that something changed, not how many times.
                let _ = signal_tx.try_send(signal);
            },
            notify::Config::default(),
        )?;
        watcher.watch(&self.dir, RecursiveMode::NonRecursive)?;
        info!(dir = %self.dir.display(), "Watching ban-list directory");

        let window = self.window;
        tokio::spawn(async move {
            let _watcher = watcher;
            debounce_loop(signal_rx, reload_tx, window).await;
        });

        Ok(())
    }
}

/// Whether an event kind should arm the debounce timer.
fn is_qualifying(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

/// Debounce state machine: idle until a change arrives, then pending with a
/// deadline that every further change pushes back, firing exactly once when
/// the directory has been quiet for the whole window.
async fn debounce_loop(
    mut rx: Receiver<WatchSignal>,
    tx: Sender<ReloadRequest>,
    window: Duration,
) {
    let mut deadline: Option<Instant> = None;

    loop {
        let signal = match deadline {
            Some(at) => {
                tokio::select! {
                    () = tokio::time::sleep_until(at) => {
                        deadline = None;
                        debug!("Change events settled, requesting reload");
                        if tx.send(ReloadRequest::Reload).await.is_err() {
                            // Reload task is gone; nothing left to drive.
                            return;
                        }
                        continue;
                    }
                    signal = rx.recv() => signal,
                }
            }
            None => rx.recv().await,
        };

        match signal {
            Some(WatchSignal::Changed) => {
                deadline = Some(Instant::now() + window);
            }
            Some(WatchSignal::Fatal(message)) => {
                error!(
                    target: crate::ERROR_TARGET,
                    error = %message,
                    "Filesystem watch failed"
                );
                let _ = tx.send(ReloadRequest::WatcherFailed(message)).await;
                return;
            }
            None => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(500);

    fn start_loop() -> (Sender<WatchSignal>, Receiver<ReloadRequest>) {
        let (signal_tx, signal_rx) = mpsc::channel(16);
        let (reload_tx, reload_rx) = mpsc::channel(16);
        tokio::spawn(debounce_loop(signal_rx, reload_tx, WINDOW));
        (signal_tx, reload_rx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_event_fires_after_window() {
        let (signal_tx, mut reload_rx) = start_loop();

        let sent_at = Instant::now();
        signal_tx.send(WatchSignal::Changed).await.unwrap();

        let request = reload_rx.recv().await.unwrap();
        assert_eq!(request, ReloadRequest::Reload);
        assert!(Instant::now() - sent_at >= WINDOW);
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_collapses_to_one_reload() {
        let (signal_tx, mut reload_rx) = start_loop();

        // Five events 100ms apart, all inside one debounce window.
        for i in 0..5 {
            if i > 0 {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
            signal_tx.send(WatchSignal::Changed).await.unwrap();
        }
        let last_event = Instant::now();

        let request = reload_rx.recv().await.unwrap();
        assert_eq!(request, ReloadRequest::Reload);
        // No earlier than the full window after the burst's last event.
        assert!(Instant::now() - last_event >= WINDOW);

        // And nothing further once the burst is spent.
        tokio::time::sleep(WINDOW * 4).await;
        assert!(reload_rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_separated_bursts_fire_separately() {
        let (signal_tx, mut reload_rx) = start_loop();

        signal_tx.send(WatchSignal::Changed).await.unwrap();
        assert_eq!(reload_rx.recv().await.unwrap(), ReloadRequest::Reload);

        tokio::time::sleep(WINDOW * 2).await;

        signal_tx.send(WatchSignal::Changed).await.unwrap();
        assert_eq!(reload_rx.recv().await.unwrap(), ReloadRequest::Reload);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_is_surfaced_and_stops_the_loop() {
        let (signal_tx, mut reload_rx) = start_loop();

        signal_tx
            .send(WatchSignal::Fatal("directory removed".to_string()))
            .await
            .unwrap();

        let request = reload_rx.recv().await.unwrap();
        assert_eq!(
            request,
            ReloadRequest::WatcherFailed("directory removed".to_string())
        );
        // Loop has exited; its side of the channel is closed.
        assert!(reload_rx.recv().await.is_none());
    }

    #[test]
    fn test_qualifying_event_kinds() {
        use notify::event::{AccessKind, CreateKind, ModifyKind, RemoveKind};

        assert!(is_qualifying(&EventKind::Create(CreateKind::File)));
        assert!(is_qualifying(&EventKind::Modify(ModifyKind::Any)));
        assert!(is_qualifying(&EventKind::Remove(RemoveKind::File)));
        assert!(!is_qualifying(&EventKind::Access(AccessKind::Any)));
        assert!(!is_qualifying(&EventKind::Any));
    }
}
