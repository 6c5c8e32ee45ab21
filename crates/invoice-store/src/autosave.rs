//! Single-flight debounced autosave.
//!
//! Rapid content-change notifications collapse into one save fired after a
//! quiet period. The timer is cancel-and-restart: every new mark pushes the
//! deadline out. At most one save runs at a time; marks arriving while a
//! save is in flight start a fresh debounce window afterwards instead of
//! overlapping it.

use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::StoreError;

/// Reference quiet period: one second of inactivity.
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug)]
enum Signal {
    Dirty,
    Flush,
}

/// Handle to a running autosave worker. Dropping the handle stops the
/// worker; pending marks are discarded.
pub struct Autosave {
    tx: mpsc::UnboundedSender<Signal>,
    worker: JoinHandle<()>,
}

impl Autosave {
    /// Spawn the worker. `save` is invoked once per settled debounce window.
    pub fn spawn<F, Fut>(quiet: Duration, mut save: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), StoreError>> + Send,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<Signal>();

        let worker = tokio::spawn(async move {
            while let Some(first) = rx.recv().await {
                let mut flush = matches!(first, Signal::Flush);

                // Debounce window: restart on every new dirty mark, cut
                // short by an explicit flush.
                while !flush {
                    tokio::select! {
                        _ = tokio::time::sleep(quiet) => break,
                        signal = rx.recv() => match signal {
                            Some(Signal::Dirty) => continue,
                            Some(Signal::Flush) => flush = true,
                            None => return,
                        },
                    }
                }

                // Marks arriving during the save queue up in the channel
                // and open a fresh window on the next loop iteration.
                if let Err(err) = save().await {
                    tracing::warn!("autosave failed: {err}");
                }
            }
        });

        Self { tx, worker }
    }

    /// Note a content change. Cheap; callable from any edit notification.
    pub fn mark_dirty(&self) {
        let _ = self.tx.send(Signal::Dirty);
    }

    /// Skip the remaining quiet period and save now if anything is pending.
    pub fn flush(&self) {
        let _ = self.tx.send(Signal::Flush);
    }
}

impl Drop for Autosave {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_autosave(quiet: Duration) -> (Autosave, Arc<AtomicUsize>) {
        let saves = Arc::new(AtomicUsize::new(0));
        let saves_clone = Arc::clone(&saves);
        let autosave = Autosave::spawn(quiet, move || {
            let saves = Arc::clone(&saves_clone);
            async move {
                saves.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });
        (autosave, saves)
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_marks_collapse_into_one_save() {
        let (autosave, saves) = counting_autosave(Duration::from_secs(1));

        for _ in 0..5 {
            autosave.mark_dirty();
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(saves.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(saves.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_marks_after_save_trigger_another() {
        let (autosave, saves) = counting_autosave(Duration::from_secs(1));

        autosave.mark_dirty();
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(saves.load(Ordering::SeqCst), 1);

        autosave.mark_dirty();
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(saves.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_restarts_on_each_mark() {
        let (autosave, saves) = counting_autosave(Duration::from_secs(1));

        // keep marking every 900ms; the deadline keeps moving
        for _ in 0..4 {
            autosave.mark_dirty();
            tokio::time::sleep(Duration::from_millis(900)).await;
        }
        assert_eq!(saves.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(saves.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_saves_immediately() {
        let (autosave, saves) = counting_autosave(Duration::from_secs(1));

        autosave.mark_dirty();
        autosave.flush();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(saves.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_marks_no_saves() {
        let (_autosave, saves) = counting_autosave(Duration::from_secs(1));
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(saves.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_save_does_not_stop_worker() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_clone = Arc::clone(&attempts);
        let autosave = Autosave::spawn(Duration::from_secs(1), move || {
            let attempts = Arc::clone(&attempts_clone);
            async move {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                if n == 0 {
                    Err(StoreError::StorageUnavailable("disk full".into()))
                } else {
                    Ok(())
                }
            }
        });

        autosave.mark_dirty();
        tokio::time::sleep(Duration::from_millis(1100)).await;
        autosave.mark_dirty();
        tokio::time::sleep(Duration::from_millis(1100)).await;

        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }
}
