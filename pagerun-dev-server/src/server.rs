use anyhow::{Context, Result};
use axum::{Router, routing::get};
use pagerun_core::{PathMapper, Renderer, TemplateConfig};
use std::{
    net::SocketAddr,
    path::PathBuf,
    sync::Arc,
    time::Duration,
};
use tokio::{net::TcpListener, sync::oneshot, task::JoinHandle};

use crate::handler::handle_request;
use crate::livereload::{LIVERELOAD_PATH, livereload_handler};
use crate::watcher::WatcherHub;

/// Configuration for the development server
#[derive(Debug, Clone)]
pub struct DevServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to serve on, 0 for any free port
    pub port: u16,
    /// Source directory holding templates and assets
    pub root: PathBuf,
    pub template: TemplateConfig,
    /// Inject the reload script and serve the live-reload stream
    pub auto_reload: bool,
    /// Print the address banner on start
    pub banner: bool,
    /// Auto-open browser
    pub open: bool,
    /// Interval between `ping` events on the live-reload stream
    pub heartbeat: Duration,
    /// Quiet period before a batch of file changes is announced
    pub debounce: Duration,
}

impl Default for DevServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            root: PathBuf::from("./src"),
            template: TemplateConfig::default(),
            auto_reload: true,
            banner: true,
            open: false,
            heartbeat: Duration::from_secs(15),
            debounce: Duration::from_millis(500),
        }
    }
}

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) root: Arc<PathBuf>,
    pub(crate) template: Arc<TemplateConfig>,
    pub(crate) mapper: Arc<PathMapper>,
    pub(crate) renderer: Renderer,
    pub(crate) auto_reload: bool,
    pub(crate) hub: Option<WatcherHub>,
    pub(crate) heartbeat: Duration,
}

/// Renders templates on request and serves everything else from the
/// source tree as-is.
pub struct DevServer {
    config: DevServerConfig,
}

impl DevServer {
    pub fn new(config: DevServerConfig) -> Self {
        Self { config }
    }

    /// Bind and start serving in the background.
    ///
    /// Failing to bind is the only error; everything after that is handled
    /// per request.
    pub async fn start(self) -> Result<RunningServer> {
        let config = self.config;

        if !config.root.is_dir() {
            return Err(anyhow::anyhow!(
                "Source directory does not exist: {}",
                config.root.display()
            ));
        }

        let hub = config
            .auto_reload
            .then(|| WatcherHub::new(&config.root, config.debounce));

        let state = AppState {
            root: Arc::new(config.root.clone()),
            template: Arc::new(config.template.clone()),
            mapper: Arc::new(PathMapper::new(&config.template)),
            renderer: Renderer::new(&config.template),
            auto_reload: config.auto_reload,
            hub: hub.clone(),
            heartbeat: config.heartbeat,
        };

        let app = Router::new()
            .route(LIVERELOAD_PATH, get(livereload_handler))
            .fallback(handle_request)
            .with_state(state);

        let addr: SocketAddr = format!("{}:{}", config.host, config.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", config.host, config.port))?;
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        let addr = listener.local_addr()?;

        if config.banner {
            println!("Serving at http://{}", addr);
            println!("Rendering: {}", config.root.display());
            if config.auto_reload {
                println!("Live reload enabled at http://{}{}", addr, LIVERELOAD_PATH);
            }
        }
        tracing::info!(%addr, root = %config.root.display(), "dev server listening");

        if config.open {
            if let Err(e) = open::that(format!("http://{}", addr)) {
                tracing::warn!(error = %e, "failed to open browser");
            }
        }

        Ok(RunningServer::spawn(listener, app, hub))
    }

    /// Serve until the server fails.
    pub async fn run(self) -> Result<()> {
        self.start().await?.wait().await
    }
}

/// Handle on a server accepting connections in the background.
pub struct RunningServer {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<std::io::Result<()>>,
    hub: Option<WatcherHub>,
}

impl RunningServer {
    pub(crate) fn spawn(listener: TcpListener, app: Router, hub: Option<WatcherHub>) -> Self {
        let addr = listener
            .local_addr()
            .unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], 0)));
        let (shutdown, signal) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = signal.await;
                })
                .await
        });

        Self {
            addr,
            shutdown,
            handle,
            hub,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting connections and wait for open ones to finish.
    ///
    /// Live-reload streams end because stopping the watcher drops their
    /// listeners.
    pub async fn stop(self) -> Result<()> {
        if let Some(hub) = &self.hub {
            hub.stop();
        }
        let _ = self.shutdown.send(());
        self.handle.await??;
        tracing::debug!(addr = %self.addr, "server stopped");
        Ok(())
    }

    /// Wait for the server to exit on its own.
    pub async fn wait(self) -> Result<()> {
        self.handle.await??;
        Ok(())
    }
}
