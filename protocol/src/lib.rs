//! Tunnelbench Protocol Library
//!
//! Shared definitions for the tunnelbench client and tool server.
//! This includes the result schema, control-plane messages, the tunnel tool
//! table, and the external command runner both sides build on.

pub mod constants;
pub mod control;
pub mod digest;
pub mod error;
pub mod exec;
pub mod results;
pub mod tools;

pub use constants::*;
pub use error::CommandError;
pub use exec::{CommandRunner, SystemCommandRunner};
