use anyhow::Result;
use clap::{Arg, ArgAction, Command};
use tracing_subscriber::{EnvFilter, filter::LevelFilter};

mod cmd;
mod config;

fn cli() -> Command {
    Command::new("pagerun")
        .about("Render component templates live, or crawl them into a static site")
        .version(env!("CARGO_PKG_VERSION"))
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Log debug output")
                .global(true)
                .action(ArgAction::SetTrue),
        )
        .subcommand(cmd::build::make_subcommand())
        .subcommand(cmd::dev::make_subcommand())
        .subcommand(cmd::serve::make_subcommand())
        .subcommand(cmd::clean::make_subcommand())
        .subcommand(cmd::render::make_subcommand())
}

/// `RUST_LOG` wins over `--verbose`.
fn init_tracing(verbose: bool) {
    let level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("verbose"));

    match matches.subcommand() {
        Some(("build", args)) => cmd::build::execute(args).await,
        Some(("dev", args)) => cmd::dev::execute(args).await,
        Some(("serve", args)) => cmd::serve::execute(args).await,
        Some(("clean", args)) => cmd::clean::execute(args).await,
        Some(("render", args)) => cmd::render::execute(args).await,
        _ => Ok(()),
    }
}
