//! Socket plumbing and the single-threaded event loop.
//!
//! - **`poller`**: readiness multiplexer adapter over `mio`
//! - **`listener`**: the bound listening socket
//! - **`reactor`**: owns the connection table and dispatches readiness events

pub mod listener;
pub mod poller;
pub mod reactor;

pub use listener::ListenerEndpoint;
pub use poller::{Interest, Poller, Readiness};
pub use reactor::Reactor;
