//! Client-side receiver for live post updates.
//!
//! [`UpdateReceiver`] keeps a socket to the server's `/ws` endpoint open,
//! reconnecting with a linear backoff. Once the reconnect budget is spent it
//! falls back to polling the reaction updates endpoint for good. Pushed and
//! polled updates go through the same [`Registry`] of per-post callbacks.

pub mod error;
pub mod receiver;
pub mod registry;
pub mod transport;

pub use error::{ClientError, Result};
pub use receiver::{ConnectionState, ReceiverConfig, UpdateReceiver};
pub use registry::{Callback, Registry, Topic};
pub use transport::{PollCursor, Session, Transport, WsTransport};
