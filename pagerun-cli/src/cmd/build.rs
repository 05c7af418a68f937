use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches, Command};
use pagerun_dev_server::build_site;

use super::{config_arg, output_arg, source_arg};
use crate::config::PagerunConfig;

pub fn make_subcommand() -> Command {
    Command::new("build")
        .about("Render every reachable page into a static site")
        .arg(source_arg())
        .arg(output_arg())
        .arg(config_arg())
        .arg(
            Arg::new("force")
                .short('f')
                .long("force")
                .visible_alias("force-build")
                .help("Rebuild every page and asset, even unchanged ones")
                .action(ArgAction::SetTrue),
        )
}

pub async fn execute(args: &ArgMatches) -> Result<()> {
    let config = PagerunConfig::load(args)?;

    let report = build_site(&config.site_config(), config.build.force).await?;

    println!(
        "Site built in {} ({} rendered, {} copied, {} skipped, {} failed)",
        config.output_dir().display(),
        report.rendered,
        report.copied,
        report.skipped,
        report.failed
    );

    Ok(())
}
