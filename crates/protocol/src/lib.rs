//! Wire and persistence types for chairside.
//!
//! This crate contains the serde-serializable shapes that cross a process
//! boundary: cookie records exchanged with the browser, the session file kept
//! on disk, and the JSON accepted and produced by the HTTP front end.
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! * Pure data: no behavior beyond serialization and small derived views
//! * Stable: field names match what is already on disk and on the wire
//!
//! Behavior built on top of these types lives in `chairside-core`.

pub mod cookie;
pub mod lookup;
pub mod session_file;
pub mod status;

pub use cookie::*;
pub use lookup::*;
pub use session_file::*;
pub use status::*;
