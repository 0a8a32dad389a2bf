//! HTTP/2 stream states.
//!
//! <https://www.rfc-editor.org/rfc/rfc7540.html#section-5.1>
use crate::h2::frame::Type;

/// HTTP/2 Stream State.
///
/// ```not_rust
///                              +--------+
///                      send PP |        | recv PP
///                     ,--------|  idle  |--------.
///                    /         |        |         \
///                   v          +--------+          v
///            +----------+          |           +----------+
///            |          |          | send H /  |          |
///     ,------| reserved |          | recv H    | reserved |------.
///     |      | (local)  |          |           | (remote) |      |
///     |      +----------+          v           +----------+      |
///     |          |             +--------+             |          |
///     |          |     recv ES |        | send ES     |          |
///     |   send H |     ,-------|  open  |-------.     | recv H   |
///     |          |    /        |        |        \    |          |
///     |          v   v         +--------+         v   v          |
///     |      +----------+          |           +----------+      |
///     |      |   half   |          |           |   half   |      |
///     |      |  closed  |          | send R /  |  closed  |      |
///     |      | (remote) |          | recv R    | (local)  |      |
///     |      +----------+          |           +----------+      |
///     |           |                |                 |           |
///     |           | send ES /      |       recv ES / |           |
///     |           | send R /       v        send R / |           |
///     |           | recv R     +--------+   recv R   |           |
///     | send R /  `----------->|        |<-----------'  send R / |
///     | recv R                 | closed |               recv R   |
///     `----------------------->|        |<----------------------'
///                              +--------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StreamState {
    Idle = 0,
    ReservedLocal = 1,
    ReservedRemote = 2,
    Open = 3,
    HalfClosedLocal = 4,
    HalfClosedRemote = 5,
    Closed = 6,
}

impl StreamState {
    /// Every state, in declaration order.
    pub const ALL: [StreamState; 7] = [
        Self::Idle,
        Self::ReservedLocal,
        Self::ReservedRemote,
        Self::Open,
        Self::HalfClosedLocal,
        Self::HalfClosedRemote,
        Self::Closed,
    ];

    pub(crate) fn from_u8(state: u8) -> Self {
        match state {
            0 => Self::Idle,
            1 => Self::ReservedLocal,
            2 => Self::ReservedRemote,
            3 => Self::Open,
            4 => Self::HalfClosedLocal,
            5 => Self::HalfClosedRemote,
            _ => Self::Closed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::ReservedLocal => "reserved (local)",
            Self::ReservedRemote => "reserved (remote)",
            Self::Open => "open",
            Self::HalfClosedLocal => "half-closed (local)",
            Self::HalfClosedRemote => "half-closed (remote)",
            Self::Closed => "closed",
        }
    }

    /// Returns `true` for `open` and both `half-closed` states.
    #[inline]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Open | Self::HalfClosedLocal | Self::HalfClosedRemote)
    }

    /// Returns `true` if frames may still be received from the peer.
    #[inline]
    pub const fn is_readable(&self) -> bool {
        matches!(self, Self::Open | Self::HalfClosedLocal)
    }

    /// Returns `true` if frames may still be sent to the peer.
    #[inline]
    pub const fn is_writable(&self) -> bool {
        matches!(self, Self::Open | Self::HalfClosedRemote)
    }

    #[inline]
    pub const fn is_reserved(&self) -> bool {
        matches!(self, Self::ReservedLocal | Self::ReservedRemote)
    }

    /// Compute the state after a frame of type `ty` is received (`recv`) or sent.
    ///
    /// Returns `None` if the frame is not permitted in the current state.
    pub fn transition(self, recv: bool, ty: Type, end_stream: bool) -> Option<StreamState> {
        use StreamState as S;
        use Type as T;

        let to = if recv {
            match (self, ty) {
                (S::Idle, T::Headers) => S::Open,
                (S::Idle, T::Priority) => S::Idle,
                (S::Idle, T::PushPromise) => S::ReservedRemote,
                (S::Idle, _) => return None,

                (S::ReservedLocal | S::HalfClosedRemote, T::Priority | T::WindowUpdate) => self,
                (S::ReservedLocal | S::HalfClosedRemote, T::RstStream) => S::Closed,
                (S::ReservedLocal | S::HalfClosedRemote, _) => return None,

                (S::ReservedRemote, T::Headers) => S::HalfClosedLocal,
                (S::ReservedRemote, T::Priority) => S::ReservedRemote,
                (S::ReservedRemote, T::RstStream) => S::Closed,
                (S::ReservedRemote, _) => return None,

                (S::Open | S::HalfClosedLocal, T::RstStream) => S::Closed,
                (S::Open | S::HalfClosedLocal, _) => self,

                (S::Closed, T::Priority) => S::Closed,
                (S::Closed, _) => return None,
            }
        } else {
            match (self, ty) {
                (S::Idle, T::Headers) => S::Open,
                (S::Idle, T::Priority) => S::Idle,
                (S::Idle, T::PushPromise) => S::ReservedLocal,
                (S::Idle, _) => return None,

                (S::ReservedLocal, T::Headers) => S::HalfClosedRemote,
                (S::ReservedLocal, T::Priority) => S::ReservedLocal,
                (S::ReservedLocal, T::RstStream) => S::Closed,
                (S::ReservedLocal, _) => return None,

                (S::ReservedRemote | S::HalfClosedLocal, T::Priority | T::WindowUpdate) => self,
                (S::ReservedRemote | S::HalfClosedLocal, T::RstStream) => S::Closed,
                (S::ReservedRemote | S::HalfClosedLocal, _) => return None,

                (S::Open, T::RstStream) => S::Closed,
                (S::Open, _) => S::Open,

                (S::HalfClosedRemote, T::Data | T::Headers | T::Priority) => self,
                (S::HalfClosedRemote, T::RstStream) => S::Closed,
                (S::HalfClosedRemote, _) => return None,

                (S::Closed, T::Priority) => S::Closed,
                (S::Closed, _) => return None,
            }
        };

        if !end_stream {
            return Some(to);
        }

        Some(match to {
            S::Open if recv => S::HalfClosedRemote,
            S::Open => S::HalfClosedLocal,
            S::HalfClosedLocal | S::HalfClosedRemote => S::Closed,
            to => to,
        })
    }
}

impl std::fmt::Display for StreamState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod test;
