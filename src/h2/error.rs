use std::io;

use crate::h2::frame::Type;
use crate::h2::state::StreamState;

// ===== Error Code =====

/// HTTP/2 Error Codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    /// The associated condition is not a result of an error.
    ///
    /// For example, a GOAWAY might include this code to indicate graceful shutdown of a
    /// connection.
    NoError = 0x00,
    /// The endpoint detected an unspecific protocol error.
    ///
    /// This error is for use when a more specific error code is not available.
    ProtocolError = 0x01,
    /// The endpoint encountered an unexpected internal error.
    InternalError = 0x02,
    /// The endpoint detected that its peer violated the flow-control protocol.
    FlowControlError = 0x03,
    /// The endpoint sent a SETTINGS frame but did not receive a response in a timely manner.
    SettingsTimeout = 0x04,
    /// The endpoint received a frame after a stream was half-closed.
    StreamClosed = 0x05,
    /// The endpoint received a frame with an invalid size.
    FrameSizeError = 0x06,
    /// The endpoint refused the stream prior to performing any application processing.
    RefusedStream = 0x07,
    /// The endpoint uses this error code to indicate that the stream is no longer needed.
    Cancel = 0x08,
    /// The endpoint is unable to maintain the field section compression context for the
    /// connection.
    CompressionError = 0x09,
    /// The connection established in response to a CONNECT request was reset or abnormally closed.
    ConnectError = 0x0a,
    /// The endpoint detected that its peer is exhibiting a behavior that might be generating
    /// excessive load.
    EnhanceYourCalm = 0x0b,
    /// The underlying transport has properties that do not meet minimum security requirements.
    InadequateSecurity = 0x0c,
    /// The endpoint requires that HTTP/1.1 be used instead of HTTP/2.
    Http11Required = 0x0d,
}

impl ErrorCode {
    /// Unknown or unsupported error codes MUST NOT trigger any special behavior, they are
    /// treated as [`ErrorCode::InternalError`].
    pub fn from_u32(code: u32) -> Self {
        match code {
            0x00 => Self::NoError,
            0x01 => Self::ProtocolError,
            0x03 => Self::FlowControlError,
            0x04 => Self::SettingsTimeout,
            0x05 => Self::StreamClosed,
            0x06 => Self::FrameSizeError,
            0x07 => Self::RefusedStream,
            0x08 => Self::Cancel,
            0x09 => Self::CompressionError,
            0x0a => Self::ConnectError,
            0x0b => Self::EnhanceYourCalm,
            0x0c => Self::InadequateSecurity,
            0x0d => Self::Http11Required,
            _ => Self::InternalError,
        }
    }

    #[inline]
    pub const fn as_u32(self) -> u32 {
        self as u32
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoError => "NO_ERROR",
            Self::ProtocolError => "PROTOCOL_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
            Self::FlowControlError => "FLOW_CONTROL_ERROR",
            Self::SettingsTimeout => "SETTINGS_TIMEOUT",
            Self::StreamClosed => "STREAM_CLOSED",
            Self::FrameSizeError => "FRAME_SIZE_ERROR",
            Self::RefusedStream => "REFUSED_STREAM",
            Self::Cancel => "CANCEL",
            Self::CompressionError => "COMPRESSION_ERROR",
            Self::ConnectError => "CONNECT_ERROR",
            Self::EnhanceYourCalm => "ENHANCE_YOUR_CALM",
            Self::InadequateSecurity => "INADEQUATE_SECURITY",
            Self::Http11Required => "HTTP_1_1_REQUIRED",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ===== Stream Error =====

/// An error scoped to a single stream, other streams are unaffected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamError {
    /// Frame received after a RST_STREAM.
    Closed(u32),
}

impl StreamError {
    pub fn stream_id(&self) -> u32 {
        match self {
            Self::Closed(id) => *id,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Closed(_) => ErrorCode::StreamClosed,
        }
    }
}

impl std::error::Error for StreamError {}
impl std::fmt::Display for StreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed(id) => write!(f, "stream {id} already closed"),
        }
    }
}

// ===== Connection Error =====

/// A fatal error that can occur in connection causing shutdown.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectionError {
    /// Frame received after the peer ended its half of the stream.
    StreamClosed(u32),
    /// RST_STREAM or WINDOW_UPDATE received on a closed stream.
    ClosedStream(u32),
    /// Frame is not permitted in current stream state.
    BadState(u32, StreamState),
}

impl ConnectionError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::StreamClosed(_) => ErrorCode::StreamClosed,
            Self::ClosedStream(_) | Self::BadState(..) => ErrorCode::ProtocolError,
        }
    }
}

impl std::error::Error for ConnectionError {}
impl std::fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StreamClosed(id) | Self::ClosedStream(id) => {
                write!(f, "stream {id} already closed ({})", self.code())
            }
            Self::BadState(id, state) => write!(f, "bad stream state {state} of stream {id}"),
        }
    }
}

// ===== Error =====

/// An error that can occur in stream operation.
#[derive(Debug)]
pub enum Error {
    /// Connection is closed.
    ConnectionClosed,
    /// Stream is closed, or its sending half already ended.
    StreamClosed,
    /// Attempt to send a frame on a closed stream.
    AlreadyClosed(u32),
    /// Attempt to send a frame that current state does not permit.
    BadState(StreamState),
    /// Stream error.
    Stream(StreamError),
    /// Connection error.
    Connection(ConnectionError),
    /// Frame type that cannot be written through the stream.
    BadFlowControlFrame(Type),
    /// Flow-control window overflow or underflow.
    FlowControl,
    /// Failed to write frame.
    Io(io::Error),
}

impl Error {
    /// Returns `true` if the error is fatal to the whole connection.
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    /// Returns the protocol error code, if any.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Stream(err) => Some(err.code()),
            Self::Connection(err) => Some(err.code()),
            Self::FlowControl => Some(ErrorCode::FlowControlError),
            _ => None,
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Stream(err) => Some(err),
            Self::Connection(err) => Some(err),
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConnectionClosed => f.write_str("connection closed"),
            Self::StreamClosed => f.write_str("stream closed"),
            Self::AlreadyClosed(id) => write!(f, "stream {id} already closed"),
            Self::BadState(state) => write!(f, "bad stream state {state}"),
            Self::Stream(err) => err.fmt(f),
            Self::Connection(err) => err.fmt(f),
            Self::BadFlowControlFrame(ty) => write!(f, "bad flow control frame type {ty}"),
            Self::FlowControl => f.write_str("flow control window exceeded"),
            Self::Io(err) => err.fmt(f),
        }
    }
}

impl From<StreamError> for Error {
    fn from(v: StreamError) -> Self {
        Self::Stream(v)
    }
}

impl From<ConnectionError> for Error {
    fn from(v: ConnectionError) -> Self {
        Self::Connection(v)
    }
}

impl From<io::Error> for Error {
    fn from(v: io::Error) -> Self {
        Self::Io(v)
    }
}
