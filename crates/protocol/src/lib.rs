//! Wire types for talking to a Chromium remote-debugging endpoint.
//!
//! Two surfaces are covered:
//! - the HTTP target listing served at `http://host:port/json`
//! - the one CDP call the controller issues, `Runtime.evaluate`, plus the
//!   reply shapes the connection reads back for telemetry
//!
//! Types here are pure data. Selection rules and connection handling live in
//! the `ytctl` crate.

pub mod runtime;
pub mod target;

pub use runtime::*;
pub use target::*;
