//! Crash-safe persistence of run progress.
//!
//! The run loop publishes an immutable [`Snapshot`] after every finalized
//! library. Whoever needs to write results (the end of the run, or an
//! interrupt) only ever reads the latest published snapshot, so a record
//! that's halfway through being updated can't end up on disk.
//!
//! The final write happens at most once. [`Checkpoint::commit`] takes the
//! flush guard, writes the snapshot, and marks the guard committed; any later
//! commit is a no-op.

use crate::error::{ErrorKind, Result};
use derive_more::Display;
use exn::ResultExt;
use futures::{Stream, StreamExt};
use libprobe_catalog::{Catalog, ProcessedCache, Store};
use std::pin::pin;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub catalog: Catalog,
    pub processed: ProcessedCache,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum FlushReason {
    #[display("run complete")]
    Completed,
    #[display("interrupted")]
    Interrupted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlushState {
    Open,
    Committed(FlushReason),
}

pub struct Checkpoint {
    store: Store,
    snapshots: watch::Sender<Arc<Snapshot>>,
    flush: Mutex<FlushState>,
}
impl Checkpoint {
    pub fn new(store: Store, initial: Snapshot) -> Self {
        let (snapshots, _) = watch::channel(Arc::new(initial));
        Self { store, snapshots, flush: Mutex::new(FlushState::Open) }
    }

    pub fn publish(&self, snapshot: Snapshot) {
        self.snapshots.send_replace(Arc::new(snapshot));
    }

    pub fn latest(&self) -> Arc<Snapshot> {
        Arc::clone(&self.snapshots.borrow())
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.snapshots.subscribe()
    }

    /// Reason of the final write, if it has happened.
    pub fn committed(&self) -> Option<FlushReason> {
        match *self.lock() {
            FlushState::Open => None,
            FlushState::Committed(reason) => Some(reason),
        }
    }

    /// Writes the latest snapshot unless a final write already happened.
    /// Returns whether this call did the writing.
    pub fn commit(&self, reason: FlushReason) -> Result<bool> {
        let mut state = self.lock();
        if let FlushState::Committed(earlier) = *state {
            tracing::debug!(%reason, %earlier, "Results already written");
            return Ok(false);
        }
        let snapshot = self.latest();
        self.store.save(&snapshot.catalog, &snapshot.processed).or_raise(|| ErrorKind::Persist)?;
        *state = FlushState::Committed(reason);
        tracing::info!(
            %reason,
            catalog = %self.store.catalog_path().display(),
            processed = snapshot.processed.len(),
            "Results written"
        );
        Ok(true)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FlushState> {
        // The state is a plain enum; a panic elsewhere can't leave it half-updated.
        self.flush.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Hands each event of `events` to `each` until the stream ends or `shutdown`
/// resolves, then writes the latest snapshot.
///
/// On shutdown the stream is dropped before the write, which tears down the
/// probe in flight: its unit directory is removed and any child build process
/// is killed.
pub async fn drain<S, F>(
    checkpoint: &Checkpoint,
    events: S,
    shutdown: F,
    mut each: impl FnMut(S::Item),
) -> Result<FlushReason>
where
    S: Stream,
    F: Future<Output = ()>,
{
    let reason = {
        let mut events = pin!(events);
        let mut shutdown = pin!(shutdown);
        loop {
            tokio::select! {
                event = events.next() => match event {
                    Some(event) => each(event),
                    None => break FlushReason::Completed,
                },
                () = &mut shutdown => break FlushReason::Interrupted,
            }
        }
    };
    if reason == FlushReason::Interrupted {
        tracing::warn!("Interrupted; writing results collected so far");
    }
    checkpoint.commit(reason)?;
    Ok(reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use libprobe_catalog::LibraryRecord;
    use std::fs;

    fn checkpoint(dir: &std::path::Path) -> Checkpoint {
        let catalog = Catalog::new(vec![LibraryRecord::new("A", "1.0.0"), LibraryRecord::new("B", "1.0.0")]);
        let store = Store::new(dir.join("library_index.json"), dir.join("cached_results.json"));
        Checkpoint::new(store, Snapshot { catalog, processed: ProcessedCache::new() })
    }

    fn finalize_a(checkpoint: &Checkpoint) {
        let mut snapshot = (*checkpoint.latest()).clone();
        snapshot.catalog.set_requires(0, vec!["Wire".to_string()], None);
        snapshot.processed.mark("A");
        checkpoint.publish(snapshot);
    }

    #[test]
    fn test_commit_writes_latest_snapshot_once() {
        let temp_dir = tempfile::tempdir().unwrap();
        let checkpoint = checkpoint(temp_dir.path());
        finalize_a(&checkpoint);
        assert!(checkpoint.commit(FlushReason::Interrupted).unwrap());
        assert_eq!(checkpoint.committed(), Some(FlushReason::Interrupted));

        // Published after the commit: must not be written.
        let mut later = (*checkpoint.latest()).clone();
        later.processed.mark("B");
        checkpoint.publish(later);
        assert!(!checkpoint.commit(FlushReason::Completed).unwrap());

        let written: Catalog =
            serde_json::from_slice(&fs::read(temp_dir.path().join("library_index.json")).unwrap()).unwrap();
        assert_eq!(written.libraries[0].requires, vec!["Wire"]);
        assert!(written.libraries[1].requires.is_empty());
        let processed: ProcessedCache =
            serde_json::from_slice(&fs::read(temp_dir.path().join("cached_results.json")).unwrap()).unwrap();
        assert!(processed.is_processed("A"));
        assert!(!processed.is_processed("B"));
    }

    #[tokio::test]
    async fn test_drain_to_completion() {
        let temp_dir = tempfile::tempdir().unwrap();
        let checkpoint = checkpoint(temp_dir.path());
        let mut seen = Vec::new();
        let events = futures::stream::iter([1, 2, 3]).inspect(|_| finalize_a(&checkpoint));
        let reason = drain(&checkpoint, events, std::future::pending::<()>(), |n| seen.push(n)).await.unwrap();
        assert_eq!(reason, FlushReason::Completed);
        assert_eq!(seen, vec![1, 2, 3]);
        assert_eq!(checkpoint.committed(), Some(FlushReason::Completed));
        let processed: ProcessedCache =
            serde_json::from_slice(&fs::read(temp_dir.path().join("cached_results.json")).unwrap()).unwrap();
        assert!(processed.is_processed("A"));
    }

    #[tokio::test]
    async fn test_drain_stops_on_shutdown() {
        let temp_dir = tempfile::tempdir().unwrap();
        let checkpoint = checkpoint(temp_dir.path());
        finalize_a(&checkpoint);
        let (trigger, triggered) = tokio::sync::oneshot::channel::<()>();
        trigger.send(()).unwrap();
        let shutdown = async move {
            let _ = triggered.await;
        };
        let events = futures::stream::pending::<()>();
        let reason = drain(&checkpoint, events, shutdown, |_| panic!("no events expected")).await.unwrap();
        assert_eq!(reason, FlushReason::Interrupted);
        assert_eq!(checkpoint.committed(), Some(FlushReason::Interrupted));
        assert!(temp_dir.path().join("library_index.json").is_file());
        assert!(!checkpoint.commit(FlushReason::Completed).unwrap());
    }
}
