//! [`Browser`](crate::driver::Browser) implementation over the Chrome DevTools Protocol.
//!
//! Each context is a CDP browser context with a single page target attached
//! in flattened mode, so all sessions share the one browser WebSocket.

mod browser;
mod js;
mod page;

pub use browser::{CdpBrowser, SharedBrowser};
pub use page::CdpPage;
