use anyhow::{Context, Result};
use clap::{ArgMatches, Command};

use super::{config_arg, output_arg};
use crate::config::PagerunConfig;

pub fn make_subcommand() -> Command {
    Command::new("clean")
        .about("Remove the output directory")
        .arg(output_arg())
        .arg(config_arg())
}

pub async fn execute(args: &ArgMatches) -> Result<()> {
    let config = PagerunConfig::load(args)?;
    let output = config.output_dir();

    if !output.exists() {
        tracing::info!(path = %output.display(), "nothing to clean");
        return Ok(());
    }

    tokio::fs::remove_dir_all(&output)
        .await
        .with_context(|| format!("failed to remove {}", output.display()))?;
    println!("Removed {}", output.display());

    Ok(())
}
