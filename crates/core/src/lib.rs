//! Session lifecycle and patient lookup engine for a dental practice portal.
//!
//! The portal has no API, so everything goes through a browser:
//!
//! * [`session`] keeps an authenticated cookie snapshot fresh in the
//!   background and guarantees at most one refresh at a time.
//! * [`lookup`] runs one patient search per request, classifies the result
//!   page by racing DOM signals, matches the patient among look-alike rows and
//!   extracts the chart summary.
//! * [`driver`] is the browser capability both depend on; [`cdp`] implements it
//!   over the Chrome DevTools Protocol and [`fake`] scripts it for tests.

pub mod cdp;
pub mod clock;
pub mod config;
pub mod driver;
pub mod error;
pub mod fake;
pub mod lookup;
pub mod race;
pub mod scripts;
pub mod session;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{BrowserSettings, Credentials, LookupSettings, PortalConfig, SessionPolicy, SessionSettings};
pub use driver::{Browser, ClickOptions, ElementHandle, ElementState, PortalPage, Scope, Script, WaitUntil};
pub use error::{Error, Result};
pub use lookup::{LookupEngine, LookupReport};
pub use session::{RefreshOutcome, RefreshScheduler, SessionLifecycle, SessionState, SessionStore, StoreError};
