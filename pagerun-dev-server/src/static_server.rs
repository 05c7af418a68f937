use anyhow::{Context, Result};
use axum::Router;
use std::{net::SocketAddr, path::PathBuf};
use tokio::net::TcpListener;
use tower_http::services::ServeDir;

use crate::server::RunningServer;

/// Plain file server for a built site.
#[derive(Debug, Clone)]
pub struct StaticServer {
    pub host: String,
    pub port: u16,
    pub root: PathBuf,
    /// Auto-open browser
    pub open: bool,
}

impl StaticServer {
    pub fn new<P: Into<PathBuf>>(root: P, host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            root: root.into(),
            open: false,
        }
    }

    pub fn open(mut self, open: bool) -> Self {
        self.open = open;
        self
    }

    pub async fn start(self) -> Result<RunningServer> {
        if !self.root.is_dir() {
            return Err(anyhow::anyhow!(
                "Output directory does not exist: {} (run `pagerun build` first)",
                self.root.display()
            ));
        }

        let app = Router::new().fallback_service(ServeDir::new(&self.root));

        let addr: SocketAddr = format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))?;
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        let addr = listener.local_addr()?;

        println!("Serving {} at http://{}", self.root.display(), addr);
        tracing::info!(%addr, root = %self.root.display(), "static server listening");

        if self.open {
            if let Err(e) = open::that(format!("http://{}", addr)) {
                tracing::warn!(error = %e, "failed to open browser");
            }
        }

        Ok(RunningServer::spawn(listener, app, None))
    }

    pub async fn run(self) -> Result<()> {
        self.start().await?.wait().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_serves_built_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>home</h1>").unwrap();
        std::fs::write(dir.path().join("about[x=1].html"), "<h1>x</h1>").unwrap();

        let server = StaticServer::new(dir.path(), "127.0.0.1", 0)
            .start()
            .await
            .unwrap();
        let base = format!("http://{}", server.addr());
        let client = reqwest::Client::new();

        let home = client.get(format!("{base}/")).send().await.unwrap();
        assert_eq!(home.status(), 200);
        assert_eq!(home.text().await.unwrap(), "<h1>home</h1>");

        let variant = client
            .get(format!("{base}/about[x=1].html"))
            .send()
            .await
            .unwrap();
        assert_eq!(variant.text().await.unwrap(), "<h1>x</h1>");

        let missing = client.get(format!("{base}/nope.html")).send().await.unwrap();
        assert_eq!(missing.status(), 404);

        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_output_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = StaticServer::new(dir.path().join("build"), "127.0.0.1", 0)
            .start()
            .await;
        assert!(result.is_err());
    }
}
