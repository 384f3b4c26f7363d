//! Exclusive audio session arbitration.
//!
//! The hardware audio session is a single shared resource. Listening,
//! speaking and in-vehicle playback each need a different configuration, and
//! only one can be in effect at a time.
//!
//! # Architecture
//!
//! ```text
//!  route-change feed ──► ConnectivityObserver ──┐
//!                                               ▼
//!  capture / synthesis ── request_mode ──► AudioSessionCoordinator ──► AudioPlatform
//!                                               │
//!                                               └──► watch<SessionSnapshot>
//! ```

mod config;
mod coordinator;
mod error;
mod mode;
mod platform;
mod route;

pub use config::*;
pub use coordinator::*;
pub use error::*;
pub use mode::*;
pub use platform::*;
pub use route::*;

#[cfg(test)]
mod tests;
