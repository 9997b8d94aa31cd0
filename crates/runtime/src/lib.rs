//! Browser runtime for chairside.
//!
//! Owns everything below the driver abstraction: finding and launching a
//! Chromium build with a remote-debugging port, querying its `/json/version`
//! endpoint, and the multiplexed DevTools WebSocket connection that commands
//! and events travel over.

pub mod connection;
pub mod discovery;
pub mod error;
pub mod launcher;
pub mod process;

pub use connection::{CdpConnection, CdpEvent, DEFAULT_COMMAND_TIMEOUT};
pub use discovery::{CdpVersionInfo, fetch_cdp_endpoint, resolve_ws_endpoint};
pub use error::{Result, RuntimeError};
pub use launcher::{BrowserProcess, LaunchOptions, find_chrome_executable};
