//! Development server with live reload for tessera.
//!
//! Serves the distribution directory, injects a reload client into HTML
//! pages, and re-runs build tasks when their sources change.

pub mod reload;
pub mod server;
pub mod session;
pub mod watcher;

pub use reload::{client_script, ReloadHub, ReloadMessage};
pub use server::{inject_script, DevServer, ServerConfig, ServerError};
pub use session::WatchSession;
pub use watcher::{ChangeKind, FileWatcher, WatchEvent};
