use clap::{Arg, ArgAction};

pub mod build;
pub mod clean;
pub mod dev;
pub mod render;
pub mod serve;

pub fn source_arg() -> Arg {
    Arg::new("source")
        .short('s')
        .long("source")
        .visible_alias("root")
        .value_name("DIR")
        .help("Source directory holding templates and assets")
}

pub fn output_arg() -> Arg {
    Arg::new("output")
        .short('o')
        .long("output")
        .visible_alias("dest")
        .value_name("DIR")
        .help("Output directory for the built site")
}

pub fn config_arg() -> Arg {
    Arg::new("config")
        .short('c')
        .long("config")
        .value_name("FILE")
        .help("Configuration file [default: ./pagerun.toml]")
}

pub fn port_arg() -> Arg {
    Arg::new("port")
        .short('p')
        .long("port")
        .value_name("PORT")
        .value_parser(clap::value_parser!(u16))
        .help("Port to serve on [default: 3000]")
}

pub fn host_arg() -> Arg {
    Arg::new("host")
        .long("host")
        .value_name("HOST")
        .help("Host to bind to [default: 127.0.0.1]")
}

pub fn open_arg() -> Arg {
    Arg::new("open")
        .long("open")
        .help("Open browser automatically")
        .action(ArgAction::SetTrue)
}
