mod handler;
mod livereload;
mod seed;
mod server;
mod static_server;
pub mod watcher;

pub use livereload::{LIVERELOAD_PATH, RELOAD_SCRIPT, ReloadEvent, reload_events};
pub use seed::{HttpFetcher, build_site};
pub use server::{DevServer, DevServerConfig, RunningServer};
pub use static_server::StaticServer;
pub use watcher::{ListenerId, WatcherHub};
