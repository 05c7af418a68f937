use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::config::SiteConfig;
use crate::error::{BuildError, FetchError};
use crate::links::{LinkAction, extract_links, rewrite_links};
use crate::path::{
    PathMapper, decode_static_href, get_absolute_path, get_relative_path, is_local_link,
    parent_dir, split_suffix, static_href,
};
use crate::scanner::{ScanReport, SiteScanner, is_file_newer};

/// Source of rendered pages for the builder.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Rendered HTML for a site href such as `/about.tsx?x=1`.
    async fn fetch(&self, href: &str) -> Result<String, FetchError>;
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub rendered: usize,
    pub copied: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Source paths that rendered pages link to but that do not exist
    pub invalid_links: BTreeSet<String>,
}

impl BuildReport {
    fn from_scan(scan: &ScanReport) -> Self {
        Self {
            copied: scan.copied,
            skipped: scan.skipped,
            failed: scan.failed,
            ..Self::default()
        }
    }

    pub fn log_summary(&self) {
        tracing::info!(
            rendered = self.rendered,
            copied = self.copied,
            skipped = self.skipped,
            failed = self.failed,
            "build status"
        );

        if !self.invalid_links.is_empty() {
            let links: Vec<&str> = self.invalid_links.iter().map(String::as_str).collect();
            tracing::warn!("invalid links: {}", links.join(", "));
        }
    }
}

/// Crawls a site from its template modules, following links found in the
/// rendered pages and writing every distinct page variant once.
pub struct SiteBuilder {
    config: SiteConfig,
    mapper: PathMapper,
    force: bool,
}

impl SiteBuilder {
    pub fn new(config: SiteConfig) -> Self {
        let mapper = PathMapper::new(&config.template);
        Self {
            config,
            mapper,
            force: false,
        }
    }

    /// Render and copy everything regardless of timestamps.
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    /// Mirror assets and collect the template modules to seed the crawl with.
    pub fn scan(&self) -> Result<ScanReport, BuildError> {
        if !self.config.source.is_dir() {
            return Err(BuildError::MissingSourceDir(self.config.source.clone()));
        }

        let scanner = SiteScanner::new(
            &self.config.source,
            &self.config.output,
            self.config.template.clone(),
        )
        .force(self.force);

        Ok(scanner.scan()?)
    }

    /// Scan, then crawl every template module through `fetcher`.
    pub async fn build<F>(&self, fetcher: &F) -> Result<BuildReport, BuildError>
    where
        F: PageFetcher + ?Sized,
    {
        let scan = self.scan()?;
        let mut report = BuildReport::from_scan(&scan);
        self.crawl(scan.templates, fetcher, &mut report).await;
        Ok(report)
    }

    /// Render `seeds` and every page reachable from them through `<a>` links.
    ///
    /// Failures of individual pages are logged and counted; they never stop
    /// the crawl.
    pub async fn crawl<F>(&self, seeds: Vec<String>, fetcher: &F, report: &mut BuildReport)
    where
        F: PageFetcher + ?Sized,
    {
        let mut frontier: Vec<String> = seeds.into_iter().rev().collect();
        let mut visited: HashSet<String> = HashSet::new();

        while let Some(href) = frontier.pop() {
            let static_path = self.mapper.to_static_path(&href, false);
            if !visited.insert(static_path.clone()) {
                continue;
            }

            let (source_path, _) = split_suffix(&href);
            let source = self.source_file(source_path);
            let dest = self.output_file(&static_path);

            if !self.force && !is_file_newer(&source, &dest) {
                tracing::debug!(page = %static_path, "skip");
                report.skipped += 1;
                frontier.extend(self.links_in_existing_output(
                    &static_path,
                    &dest,
                    &mut report.invalid_links,
                ));
                continue;
            }

            let html = match fetcher.fetch(&href).await {
                Ok(html) => html,
                Err(e) => {
                    tracing::warn!(page = %href, error = %e, "render failed");
                    report.failed += 1;
                    continue;
                }
            };

            let (html, discovered) = match self.rewrite_page(&href, &html, &mut report.invalid_links) {
                Ok(page) => page,
                Err(e) => {
                    tracing::warn!(page = %href, error = %e, "link rewriting failed");
                    report.failed += 1;
                    continue;
                }
            };

            if let Err(e) = write_page(&dest, &html).await {
                tracing::warn!(path = %dest.display(), error = %e, "write failed");
                report.failed += 1;
                continue;
            }

            tracing::info!(page = %static_path, "render");
            report.rendered += 1;
            frontier.extend(discovered);
        }
    }

    /// Rewrite every local link in a page to its build-time name and return
    /// the template pages it links to.
    fn rewrite_page(
        &self,
        href: &str,
        html: &str,
        invalid_links: &mut BTreeSet<String>,
    ) -> Result<(String, Vec<String>), BuildError> {
        let page_dir = parent_dir(href).to_string();
        let mut discovered = Vec::new();

        let html = rewrite_links(html, |link| {
            let value = html_escape::decode_html_entities(&link.value);
            if link.no_build || !is_local_link(&value) {
                return LinkAction::Keep;
            }

            let Some(resolved) = self.resolve_link(&page_dir, &value) else {
                let absolute = get_absolute_path(&page_dir, &value);
                invalid_links.insert(split_suffix(&absolute).0.to_string());
                return LinkAction::Keep;
            };

            let is_page = self.mapper.is_template_href(&resolved);
            if is_page && link.is_anchor() {
                discovered.push(resolved.clone());
            }

            if is_page {
                let target = self.mapper.to_static_path(&resolved, true);
                LinkAction::Replace(static_href(&get_relative_path(&page_dir, &target)))
            } else {
                LinkAction::Replace(get_relative_path(&page_dir, &resolved))
            }
        })
        .map_err(|message| BuildError::Rewrite {
            page: href.to_string(),
            message,
        })?;

        Ok((html, discovered))
    }

    /// Resolve a link against the page directory to an existing source file.
    ///
    /// Directory links mean the directory's index page.
    fn resolve_link(&self, page_dir: &str, value: &str) -> Option<String> {
        let absolute = get_absolute_path(page_dir, value);
        let (path, suffix) = split_suffix(&absolute);

        let path = if path.ends_with('/') || self.source_file(path).is_dir() {
            format!(
                "{}/{}",
                path.trim_end_matches('/'),
                self.config.template.index_file()
            )
        } else {
            path.to_string()
        };

        if self.source_file(&path).exists() {
            Some(format!("{path}{suffix}"))
        } else {
            None
        }
    }

    /// Pages linked from an up-to-date output file, so that variants only
    /// reachable through a skipped page are still checked.
    ///
    /// Links in it that no longer resolve go to `invalid_links`, as they
    /// would have on a fresh render.
    fn links_in_existing_output(
        &self,
        static_path: &str,
        dest: &Path,
        invalid_links: &mut BTreeSet<String>,
    ) -> Vec<String> {
        let Ok(html) = std::fs::read_to_string(dest) else {
            return Vec::new();
        };
        let Ok(links) = extract_links(&html) else {
            return Vec::new();
        };

        let dir = parent_dir(static_path);
        let mut pages = Vec::new();
        for link in links.iter().filter(|link| !link.no_build) {
            let value = html_escape::decode_html_entities(&link.value);
            if !is_local_link(&value) {
                continue;
            }

            let absolute = get_absolute_path(dir, &value);
            let file = decode_static_href(&absolute);
            if file.ends_with(".html") && !self.source_file(&file).is_file() {
                let source = self.mapper.to_source_path(&file);
                let (source_path, _) = split_suffix(&source);
                if !self.source_file(source_path).is_file() {
                    invalid_links.insert(source_path.to_string());
                } else if link.is_anchor() {
                    pages.push(source);
                }
            } else if self.resolve_link(dir, &value).is_none() {
                invalid_links.insert(split_suffix(&absolute).0.to_string());
            }
        }
        pages
    }

    fn source_file(&self, site_path: &str) -> PathBuf {
        self.config.source.join(site_path.trim_start_matches('/'))
    }

    fn output_file(&self, static_path: &str) -> PathBuf {
        self.config.output.join(static_path.trim_start_matches('/'))
    }
}

async fn write_page(dest: &Path, html: &str) -> std::io::Result<()> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(dest, html).await
}
