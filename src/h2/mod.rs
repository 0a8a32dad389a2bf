//! HTTP/2 stream lifecycle and flow control.
//!
//! A [`Connection`] is shared by every [`Stream`] multiplexed on it. Frames received by the
//! connection read loop are applied with [`Stream::recv`], frames written by the application go
//! through [`Stream::write`], and the [`Dispatch`] implementation calls [`Stream::transmit`] when
//! it is the stream's turn to write.
pub mod error;
pub mod flow;
pub mod frame;
pub mod queue;
pub mod settings;
pub mod signal;
pub mod state;

mod conn;
mod stream;

pub use conn::{Builder, Connection};
pub use error::{ConnectionError, Error, ErrorCode, StreamError};
pub use flow::{Allocate, WindowAllocator};
pub use frame::{Frame, FrameWrite};
pub use queue::{Dispatch, WriteQueue};
pub use state::StreamState;
pub use stream::{PriorityNode, Stream, WindowIncrement};

/// Endpoint role, determines which stream identifiers are locally initiated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}
