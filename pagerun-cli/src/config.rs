use anyhow::Result;
use clap::ArgMatches;
use config::{Config as ConfigBuilder, Environment, File};
use pagerun_core::{SiteConfig, TemplateConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_CONFIG_FILE: &str = "./pagerun.toml";

/// Complete configuration that merges CLI args, env vars, config files, and defaults
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PagerunConfig {
    pub build: BuildConfig,
    /// How template modules are recognized and run
    pub template: TemplateConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BuildConfig {
    /// Source directory holding templates and assets
    pub source: String,
    /// Output directory for the built site
    pub output: String,
    /// Configuration file path
    pub config: String,
    /// Host for the dev and static servers
    pub host: String,
    /// Port for the dev and static servers
    pub port: u16,
    /// Open browser automatically
    pub open: bool,
    /// Inject the live-reload script in dev mode
    pub autoreload: bool,
    /// Rebuild everything regardless of timestamps
    pub force: bool,
    /// Seconds between live-reload heartbeats
    pub heartbeat: u64,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            source: "./src".to_string(),
            output: "./build".to_string(),
            config: DEFAULT_CONFIG_FILE.to_string(),
            host: "127.0.0.1".to_string(),
            port: 3000,
            open: false,
            autoreload: true,
            force: false,
            heartbeat: 15,
        }
    }
}

impl PagerunConfig {
    /// Load configuration with cascading precedence:
    /// 1. CLI arguments (highest priority)
    /// 2. Environment variables (PAGERUN_*, `__` between nested keys)
    /// 3. Configuration file
    /// 4. Defaults (lowest priority)
    pub fn load(args: &ArgMatches) -> Result<Self> {
        let config_file =
            string_arg(args, "config").unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());

        let mut builder = ConfigBuilder::builder()
            .add_source(ConfigBuilder::try_from(&Self::default())?)
            .add_source(File::from(Path::new(&config_file)).required(false))
            .add_source(
                Environment::with_prefix("PAGERUN")
                    .prefix_separator("_")
                    .separator("__"),
            );

        // Only override with CLI args that are actually defined for this command
        for (arg, key) in [
            ("source", "build.source"),
            ("output", "build.output"),
            ("config", "build.config"),
            ("host", "build.host"),
        ] {
            if let Some(value) = string_arg(args, arg) {
                builder = builder.set_override(key, value)?;
            }
        }
        if let Some(port) = args.try_get_one::<u16>("port").ok().flatten() {
            builder = builder.set_override("build.port", u64::from(*port))?;
        }
        if flag(args, "open") {
            builder = builder.set_override("build.open", true)?;
        }
        if flag(args, "force") {
            builder = builder.set_override("build.force", true)?;
        }
        if flag(args, "no-autoreload") {
            builder = builder.set_override("build.autoreload", false)?;
        }

        Ok(builder.build()?.try_deserialize()?)
    }

    pub fn site_config(&self) -> SiteConfig {
        SiteConfig::new(&self.build.source, &self.build.output).template(self.template.clone())
    }

    pub fn source_dir(&self) -> PathBuf {
        PathBuf::from(&self.build.source)
    }

    pub fn output_dir(&self) -> PathBuf {
        PathBuf::from(&self.build.output)
    }

    pub fn heartbeat(&self) -> Duration {
        Duration::from_secs(self.build.heartbeat.max(1))
    }
}

fn string_arg(args: &ArgMatches, id: &str) -> Option<String> {
    args.try_get_one::<String>(id).ok().flatten().cloned()
}

fn flag(args: &ArgMatches, id: &str) -> bool {
    args.try_get_one::<bool>(id)
        .ok()
        .flatten()
        .copied()
        .unwrap_or(false)
}
