//! Tunnel tools: the generic launch routine and the active-tunnel slot

mod adapter;
mod error;
mod session;

pub use adapter::TunnelAdapter;
pub use error::TunnelError;
pub use session::TunnelSession;
