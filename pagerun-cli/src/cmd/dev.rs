use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches, Command};
use pagerun_dev_server::{DevServer, DevServerConfig};

use super::{config_arg, host_arg, open_arg, port_arg, source_arg};
use crate::config::PagerunConfig;

pub fn make_subcommand() -> Command {
    Command::new("dev")
        .about("Start development server rendering templates on request")
        .arg(source_arg())
        .arg(config_arg())
        .arg(port_arg())
        .arg(host_arg())
        .arg(open_arg())
        .arg(
            Arg::new("no-autoreload")
                .long("no-autoreload")
                .help("Do not inject the live reload script")
                .action(ArgAction::SetTrue),
        )
}

pub async fn execute(args: &ArgMatches) -> Result<()> {
    let config = PagerunConfig::load(args)?;

    let server = DevServer::new(DevServerConfig {
        host: config.build.host.clone(),
        port: config.build.port,
        root: config.source_dir(),
        template: config.template.clone(),
        auto_reload: config.build.autoreload,
        banner: true,
        open: config.build.open,
        heartbeat: config.heartbeat(),
        ..DevServerConfig::default()
    })
    .start()
    .await?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    server.stop().await
}
