use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::Duration;

use anyhow::Result;
use notify::RecommendedWatcher;
use notify_debouncer_mini::{DebounceEventResult, Debouncer, new_debouncer};
use parking_lot::Mutex;

pub type ListenerId = u64;

type Listener = Arc<dyn Fn(&[PathBuf]) + Send + Sync>;

/// One recursive watcher on the source tree, shared by any number of
/// listeners.
///
/// The watcher starts with the first `listen` and stops on `stop`, which
/// also drops every listener.
#[derive(Clone)]
pub struct WatcherHub {
    inner: Arc<HubInner>,
}

struct HubInner {
    root: PathBuf,
    debounce: Duration,
    state: Mutex<HubState>,
}

#[derive(Default)]
struct HubState {
    next_id: ListenerId,
    listeners: BTreeMap<ListenerId, Listener>,
    debouncer: Option<Debouncer<RecommendedWatcher>>,
}

impl WatcherHub {
    pub fn new<P: AsRef<Path>>(root: P, debounce: Duration) -> Self {
        let root = root.as_ref();
        Self {
            inner: Arc::new(HubInner {
                root: root.canonicalize().unwrap_or_else(|_| root.to_path_buf()),
                debounce,
                state: Mutex::new(HubState::default()),
            }),
        }
    }

    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    /// Register `callback` for every batch of changed paths.
    pub fn listen<F>(&self, callback: F) -> Result<ListenerId>
    where
        F: Fn(&[PathBuf]) + Send + Sync + 'static,
    {
        let mut state = self.inner.state.lock();
        if state.debouncer.is_none() {
            state.debouncer = Some(start_watcher(&self.inner)?);
            tracing::info!(root = %self.inner.root.display(), "file watcher started");
        }

        let id = state.next_id;
        state.next_id += 1;
        state.listeners.insert(id, Arc::new(callback));
        tracing::debug!(listener = id, "listener registered");
        Ok(id)
    }

    pub fn unlisten(&self, id: ListenerId) -> bool {
        let removed = self.inner.state.lock().listeners.remove(&id).is_some();
        if removed {
            tracing::debug!(listener = id, "listener removed");
        }
        removed
    }

    /// Drop all listeners and halt the watcher.
    pub fn stop(&self) {
        let (listeners, debouncer) = {
            let mut state = self.inner.state.lock();
            (
                std::mem::take(&mut state.listeners),
                state.debouncer.take(),
            )
        };

        if debouncer.is_some() {
            tracing::info!(root = %self.inner.root.display(), "file watcher stopped");
        }
        drop(listeners);
        drop(debouncer);
    }

    pub fn listener_count(&self) -> usize {
        self.inner.state.lock().listeners.len()
    }

    pub fn is_running(&self) -> bool {
        self.inner.state.lock().debouncer.is_some()
    }
}

impl HubInner {
    /// Deliver `paths` to a snapshot of the registry, outside the lock.
    fn dispatch(&self, paths: &[PathBuf]) {
        let listeners: Vec<Listener> = self.state.lock().listeners.values().cloned().collect();
        for listener in listeners {
            listener(paths);
        }
    }
}

fn start_watcher(inner: &Arc<HubInner>) -> Result<Debouncer<RecommendedWatcher>> {
    let hub: Weak<HubInner> = Arc::downgrade(inner);

    let mut debouncer = new_debouncer(inner.debounce, move |res: DebounceEventResult| {
        let Some(hub) = hub.upgrade() else {
            return;
        };
        match res {
            Ok(events) => {
                let paths = changed_paths(events.into_iter().map(|event| event.path));
                if !paths.is_empty() {
                    tracing::debug!(count = paths.len(), "files changed");
                    hub.dispatch(&paths);
                }
            }
            Err(e) => tracing::warn!(error = %e, "file watcher error"),
        }
    })?;

    debouncer
        .watcher()
        .watch(&inner.root, notify::RecursiveMode::Recursive)?;

    Ok(debouncer)
}

/// Paths that still exist after a batch (creations and modifications),
/// deduplicated.
fn changed_paths<I: IntoIterator<Item = PathBuf>>(paths: I) -> Vec<PathBuf> {
    paths
        .into_iter()
        .filter(|path| path.exists())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
