//! Authentication session management.
//!
//! [`SessionLifecycle`] is the single writer of the on-disk snapshot. It
//! decides whether the stored cookies are still usable, signs in again when
//! they are not, and guarantees that at most one refresh runs at a time.
//! [`RefreshScheduler`] re-triggers it on a fixed interval shorter than the
//! snapshot's maximum age.

pub mod login;
mod manager;
mod scheduler;
mod state;
mod store;

pub use manager::{RefreshOutcome, SessionLifecycle};
pub use scheduler::RefreshScheduler;
pub use state::SessionState;
pub use store::{SessionStore, StoreError};
