pub mod builder;
pub mod config;
pub mod error;
pub mod guest;
pub mod links;
pub mod path;
pub mod protocol;
pub mod render;
pub mod scanner;

// Re-export main types
pub use builder::{BuildReport, PageFetcher, SiteBuilder};
pub use config::{SiteConfig, TemplateConfig};
pub use error::{BuildError, FetchError, GuestError, RenderError, ScanError};
pub use path::PathMapper;
pub use protocol::{RenderRequest, ScriptResponse};
pub use render::{RenderResult, Renderer};
pub use scanner::SiteScanner;
