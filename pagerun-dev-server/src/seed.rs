//! Static builds driven through a private dev server.
//!
//! The crawl in `pagerun_core::builder` only needs rendered HTML; here it gets
//! it the same way a browser would, over HTTP from a [`DevServer`] bound to an
//! ephemeral local port for the length of the build.

use anyhow::Result;
use async_trait::async_trait;
use pagerun_core::{BuildReport, FetchError, PageFetcher, SiteBuilder, SiteConfig};
use std::net::SocketAddr;
use url::Url;

use crate::server::{DevServer, DevServerConfig};

/// Fetches pages from a running dev server.
pub struct HttpFetcher {
    client: reqwest::Client,
    base: Url,
}

impl HttpFetcher {
    pub fn new(addr: SocketAddr) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::new(),
            base: Url::parse(&format!("http://{addr}/"))?,
        })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, href: &str) -> Result<String, FetchError> {
        let request_error = |message: String| FetchError::Request {
            href: href.to_string(),
            message,
        };

        let url = self.base.join(href).map_err(|e| request_error(e.to_string()))?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| request_error(e.to_string()))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(FetchError::Status {
                href: href.to_string(),
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            // Deliberate 404 pages and the like are still written out.
            tracing::warn!(page = %href, status = status.as_u16(), "page answered with non-success status");
        }

        response.text().await.map_err(|e| request_error(e.to_string()))
    }
}

/// Build the site described by `config` into its output directory.
///
/// The seed server is stopped whether or not the build succeeds.
pub async fn build_site(config: &SiteConfig, force: bool) -> Result<BuildReport> {
    let builder = SiteBuilder::new(config.clone()).force(force);

    let server = DevServer::new(DevServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        root: config.source.clone(),
        template: config.template.clone(),
        auto_reload: false,
        banner: false,
        open: false,
        ..DevServerConfig::default()
    })
    .start()
    .await?;
    tracing::debug!(addr = %server.addr(), "seed server started");

    let result = match HttpFetcher::new(server.addr()) {
        Ok(fetcher) => builder.build(&fetcher).await.map_err(anyhow::Error::from),
        Err(e) => Err(e),
    };

    server.stop().await?;

    let report = result?;
    report.log_summary();
    Ok(report)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use pagerun_core::TemplateConfig;
    use std::fs;
    use std::path::Path;

    const DELIMITER: &str = "~~~~~~~[response]~~~~~~\\n`";

    fn write(root: &Path, name: &str, contents: &str) {
        let path = root.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn sh_site() -> (tempfile::TempDir, tempfile::TempDir, SiteConfig) {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();

        write(
            src.path(),
            "index.tsx",
            "cat > /dev/null\nprintf '<a href=\"about.tsx?x=1\">one</a><a href=\"about.tsx?y=2&amp;x=3\">two</a><link href=\"style.css\" rel=\"stylesheet\">'\n",
        );
        write(src.path(), "about.tsx", "printf '<p>'\ncat\nprintf '</p>'\n");
        write(
            src.path(),
            "broken.tsx",
            &format!("cat > /dev/null\nprintf 'oops{DELIMITER}{{\"status\":500}}'\n"),
        );
        write(src.path(), "style.css", "p { color: red }");

        let config = SiteConfig::new(src.path(), out.path()).template(TemplateConfig {
            command: vec!["sh".to_string()],
            ..TemplateConfig::default()
        });
        (src, out, config)
    }

    #[tokio::test]
    async fn test_builds_site_through_seed_server() {
        let (_src, out, config) = sh_site();

        let report = build_site(&config, false).await.unwrap();
        assert_eq!(report.rendered, 4);
        assert_eq!(report.copied, 1);
        assert_eq!(report.failed, 1);
        assert!(report.invalid_links.is_empty());

        let index = fs::read_to_string(out.path().join("index.html")).unwrap();
        assert!(index.contains("href=\"about[x=1].html\""), "{index}");
        assert!(index.contains("href=\"about[x=3,y=2].html\""), "{index}");
        assert!(index.contains("href=\"style.css\""), "{index}");

        let variant = fs::read_to_string(out.path().join("about[x=3,y=2].html")).unwrap();
        assert!(variant.contains("\"x\":\"3\""), "{variant}");
        assert!(variant.contains("\"y\":\"2\""), "{variant}");

        assert!(out.path().join("about.html").is_file());
        assert!(out.path().join("style.css").is_file());
        assert!(!out.path().join("broken.html").exists());
    }

    #[tokio::test]
    async fn test_rebuild_without_changes_renders_nothing() {
        let (_src, _out, config) = sh_site();
        build_site(&config, false).await.unwrap();

        let again = build_site(&config, false).await.unwrap();
        assert_eq!(again.rendered, 0);
        assert_eq!(again.copied, 0);
        // index, about and both variants, plus the stylesheet
        assert_eq!(again.skipped, 5);
        assert_eq!(again.failed, 1);

        let forced = build_site(&config, true).await.unwrap();
        assert_eq!(forced.rendered, 4);
        assert_eq!(forced.copied, 1);
    }

    #[tokio::test]
    async fn test_built_links_resolve_when_served() {
        let (src, out, config) = sh_site();
        write(
            src.path(),
            "index.tsx",
            "cat > /dev/null\nprintf '<a href=\"about.tsx?name=John%%20Doe\">john</a>'\n",
        );

        let report = build_site(&config, false).await.unwrap();
        assert!(report.invalid_links.is_empty());

        let index = fs::read_to_string(out.path().join("index.html")).unwrap();
        let href = pagerun_core::links::extract_links(&index)
            .unwrap()
            .into_iter()
            .find(|link| link.is_anchor())
            .unwrap()
            .value;

        let server = crate::StaticServer::new(out.path(), "127.0.0.1", 0)
            .start()
            .await
            .unwrap();
        let response = reqwest::get(format!("http://{}/{href}", server.addr()))
            .await
            .unwrap();
        assert_eq!(response.status(), 200, "{href}");
        let body = response.text().await.unwrap();
        assert!(body.contains("\"name\":\"John Doe\""), "{body}");

        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_source_dir_fails() {
        let out = tempfile::tempdir().unwrap();
        let config = SiteConfig::new(out.path().join("missing"), out.path());
        assert!(build_site(&config, false).await.is_err());
    }
}
