use anyhow::Result;
use clap::{ArgMatches, Command};
use pagerun_dev_server::StaticServer;

use super::{config_arg, host_arg, open_arg, output_arg, port_arg};
use crate::config::PagerunConfig;

pub fn make_subcommand() -> Command {
    Command::new("serve")
        .about("Serve the built site as plain files")
        .arg(output_arg())
        .arg(config_arg())
        .arg(port_arg())
        .arg(host_arg())
        .arg(open_arg())
}

pub async fn execute(args: &ArgMatches) -> Result<()> {
    let config = PagerunConfig::load(args)?;

    let server = StaticServer::new(config.output_dir(), config.build.host.clone(), config.build.port)
        .open(config.build.open)
        .start()
        .await?;

    tokio::signal::ctrl_c().await?;
    server.stop().await
}
