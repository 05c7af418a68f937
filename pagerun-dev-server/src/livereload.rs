use std::convert::Infallible;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use async_stream::stream;
use axum::{
    extract::State,
    http::StatusCode,
    response::{
        IntoResponse, Response,
        sse::{Event, Sse},
    },
};
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{Instant, interval_at};

use crate::server::AppState;
use crate::watcher::{ListenerId, WatcherHub};

/// Reserved path of the live-reload event stream.
pub const LIVERELOAD_PATH: &str = "/__pagerun/livereload";

/// Appended to rendered pages when auto-reload is on.
pub const RELOAD_SCRIPT: &str = r#"
<script>
(function() {
    const source = new EventSource("/__pagerun/livereload");
    source.addEventListener("fsevent", function() {
        source.close();
        location.reload();
    });
    window.addEventListener("beforeunload", function() {
        source.close();
    });
})();
</script>
"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadEvent {
    Ping,
    /// Changed paths, relative to the watched root
    FsEvent(Vec<String>),
}

impl ReloadEvent {
    fn into_sse(self) -> Event {
        match self {
            ReloadEvent::Ping => Event::default().event("ping").data(""),
            ReloadEvent::FsEvent(paths) => {
                let data = serde_json::to_string(&paths).unwrap_or_else(|_| "[]".to_string());
                Event::default().event("fsevent").data(data)
            }
        }
    }
}

/// Unregisters its listener when the event stream goes away, however it ends.
struct ListenerGuard {
    hub: WatcherHub,
    id: ListenerId,
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        self.hub.unlisten(self.id);
    }
}

/// Events for one live-reload connection: one `FsEvent` per batch of
/// changes and a `Ping` every `heartbeat` of the connection's life.
///
/// The stream ends when the hub is stopped.
pub fn reload_events(
    hub: &WatcherHub,
    heartbeat: Duration,
) -> Result<impl Stream<Item = ReloadEvent> + use<>> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Vec<PathBuf>>();
    let id = hub.listen(move |paths| {
        let _ = tx.send(paths.to_vec());
    })?;

    let guard = ListenerGuard {
        hub: hub.clone(),
        id,
    };
    let root = hub.root().to_path_buf();

    Ok(stream! {
        let _guard = guard;
        let mut ticker = interval_at(Instant::now() + heartbeat, heartbeat);

        loop {
            let event = tokio::select! {
                batch = rx.recv() => match batch {
                    Some(paths) => ReloadEvent::FsEvent(
                        paths
                            .iter()
                            .map(|path| {
                                path.strip_prefix(&root)
                                    .unwrap_or(path)
                                    .to_string_lossy()
                                    .into_owned()
                            })
                            .collect(),
                    ),
                    None => break,
                },
                _ = ticker.tick() => ReloadEvent::Ping,
            };
            yield event;
        }
    })
}

pub(crate) async fn livereload_handler(State(state): State<AppState>) -> Response {
    let Some(hub) = state.hub.as_ref() else {
        return (StatusCode::NOT_FOUND, "live reload is disabled").into_response();
    };

    match reload_events(hub, state.heartbeat) {
        Ok(events) => {
            tracing::debug!("live reload client connected");
            Sse::new(events.map(|event| Ok::<Event, Infallible>(event.into_sse()))).into_response()
        }
        Err(e) => {
            tracing::warn!(error = %e, "could not start file watcher");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hub(dir: &tempfile::TempDir) -> WatcherHub {
        WatcherHub::new(dir.path(), Duration::from_millis(100))
    }

    #[test]
    fn test_script_targets_reserved_path() {
        assert!(RELOAD_SCRIPT.contains(LIVERELOAD_PATH));
        assert!(RELOAD_SCRIPT.contains("\"fsevent\""));
    }

    #[tokio::test]
    async fn test_ping_when_idle() {
        let dir = tempfile::tempdir().unwrap();
        let hub = hub(&dir);
        let mut events = Box::pin(reload_events(&hub, Duration::from_millis(50)).unwrap());

        let event = tokio::time::timeout(Duration::from_secs(2), events.next())
            .await
            .unwrap();
        assert_eq!(event, Some(ReloadEvent::Ping));
    }

    #[tokio::test]
    async fn test_fsevent_on_change() {
        let dir = tempfile::tempdir().unwrap();
        let hub = hub(&dir);
        let mut events = Box::pin(reload_events(&hub, Duration::from_secs(3600)).unwrap());

        std::fs::write(dir.path().join("about.tsx"), "<p>new</p>").unwrap();

        let event = tokio::time::timeout(Duration::from_secs(5), events.next())
            .await
            .unwrap();
        assert_eq!(event, Some(ReloadEvent::FsEvent(vec!["about.tsx".to_string()])));

        // One write is one batch: nothing follows within a few debounce windows.
        let extra = tokio::time::timeout(Duration::from_millis(500), events.next()).await;
        assert!(extra.is_err(), "unexpected event: {extra:?}");
    }

    #[tokio::test]
    async fn test_dropping_stream_unregisters_listener() {
        let dir = tempfile::tempdir().unwrap();
        let hub = hub(&dir);
        let events = reload_events(&hub, Duration::from_secs(3600)).unwrap();
        assert_eq!(hub.listener_count(), 1);

        drop(events);
        assert_eq!(hub.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_stopping_hub_ends_stream() {
        let dir = tempfile::tempdir().unwrap();
        let hub = hub(&dir);
        let mut events = Box::pin(reload_events(&hub, Duration::from_secs(3600)).unwrap());

        hub.stop();
        let next = tokio::time::timeout(Duration::from_secs(2), events.next())
            .await
            .unwrap();
        assert_eq!(next, None);
    }
}
