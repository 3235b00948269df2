//! Development server with live reload for goose sites.
//!
//! Serves the generated output, watches the source tree, rebuilds the site
//! once edits settle and tells connected browsers to reload.

pub mod server;
pub mod shutdown;
pub mod watcher;
pub mod websocket;

pub use server::{rebuild_and_notify, router, DevServer, DevServerConfig, ServerError};
pub use shutdown::{shutdown_channel, Shutdown, ShutdownTrigger};
pub use watcher::{debounce, ChangeEvent, ChangeKind, FileWatcher, WatchError};
pub use websocket::{reload_client_script, ClientHandle, ReloadHub, ReloadMessage};
