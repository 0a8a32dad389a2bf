use bytes::{BufMut, Bytes, BytesMut};
use std::io;

use crate::h2::error::ErrorCode;

/// HTTP/2 Frame Type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Type {
    Data = 0,
    Headers = 1,
    /// DEPRECATED.
    Priority = 2,
    RstStream = 3,
    Settings = 4,
    PushPromise = 5,
    Ping = 6,
    GoAway = 7,
    WindowUpdate = 8,
    Continuation = 9,
}

impl Type {
    pub fn from_u8(ty: u8) -> Option<Self> {
        if ty < 10 {
            Some(unsafe { core::mem::transmute::<u8, Self>(ty) })
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Data => "DATA",
            Self::Headers => "HEADERS",
            Self::Priority => "PRIORITY",
            Self::RstStream => "RST_STREAM",
            Self::Settings => "SETTINGS",
            Self::PushPromise => "PUSH_PROMISE",
            Self::Ping => "PING",
            Self::GoAway => "GOAWAY",
            Self::WindowUpdate => "WINDOW_UPDATE",
            Self::Continuation => "CONTINUATION",
        }
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ===== Header =====

/// HTTP/2 Frame Header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Header {
    /// The length of the frame payload expressed as an unsigned 24-bit integer in units of octets.
    ///
    /// The 9 octets of the frame header are not included in this value.
    pub len: u32,
    /// The 8-bit type of the frame.
    pub ty: u8,
    /// An 8-bit field reserved for boolean flags specific to the frame type.
    pub flags: u8,
    /// A stream identifier expressed as an unsigned 31-bit integer.
    pub stream_id: u32,
}

impl Header {
    /// Length of encoded frame header bytes.
    pub const SIZE: usize = 9;

    pub const END_STREAM: u8 = 0x01;
    pub const END_HEADERS: u8 = 0x04;
    pub const PADDED: u8 = 0x08;
    pub const PRIORITY: u8 = 0x20;

    const STREAM_ID_MASK: u32 = u32::MAX >> 1;

    pub fn encode(&self) -> [u8; Self::SIZE] {
        let [_, l0, l1, l2] = self.len.to_be_bytes();
        let [s0, s1, s2, s3] = (self.stream_id & Self::STREAM_ID_MASK).to_be_bytes();
        [l0, l1, l2, self.ty, self.flags, s0, s1, s2, s3]
    }
}

// ===== Frames =====

/// Stream frame submitted for writing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    Data(Data),
    Headers(Headers),
    Priority(Priority),
    Reset(Reset),
    WindowUpdate(u32),
}

impl Frame {
    pub fn frame_type(&self) -> Type {
        match self {
            Self::Data(_) => Type::Data,
            Self::Headers(_) => Type::Headers,
            Self::Priority(_) => Type::Priority,
            Self::Reset(_) => Type::RstStream,
            Self::WindowUpdate(_) => Type::WindowUpdate,
        }
    }

    pub fn is_end_stream(&self) -> bool {
        match self {
            Self::Data(data) => data.end_stream,
            Self::Headers(headers) => headers.end_stream,
            _ => false,
        }
    }

    /// Append the encoded frame to `buf`.
    pub fn encode(&self, stream_id: u32, buf: &mut BytesMut) {
        let ty = self.frame_type() as u8;
        match self {
            Self::Data(data) => {
                let mut flags = 0;
                let mut len = data.payload.len();
                if data.end_stream {
                    flags |= Header::END_STREAM;
                }
                if data.pad_len != 0 {
                    flags |= Header::PADDED;
                    len += 1 + data.pad_len as usize;
                }
                put_header(buf, len, ty, flags, stream_id);
                if data.pad_len != 0 {
                    buf.put_u8(data.pad_len);
                }
                buf.extend_from_slice(&data.payload);
                buf.put_bytes(0, data.pad_len as usize);
            }
            Self::Headers(headers) => {
                let mut flags = Header::END_HEADERS;
                let mut len = headers.block.len();
                if headers.end_stream {
                    flags |= Header::END_STREAM;
                }
                if headers.priority.is_some() {
                    flags |= Header::PRIORITY;
                    len += Priority::SIZE;
                }
                put_header(buf, len, ty, flags, stream_id);
                if let Some(priority) = &headers.priority {
                    priority.encode(buf);
                }
                buf.extend_from_slice(&headers.block);
            }
            Self::Priority(priority) => {
                put_header(buf, Priority::SIZE, ty, 0, stream_id);
                priority.encode(buf);
            }
            Self::Reset(reset) => {
                put_header(buf, 4, ty, 0, stream_id);
                buf.put_u32(reset.code.as_u32());
            }
            Self::WindowUpdate(increment) => {
                put_header(buf, 4, ty, 0, stream_id);
                buf.put_u32(increment & Header::STREAM_ID_MASK);
            }
        }
    }
}

fn put_header(buf: &mut BytesMut, len: usize, ty: u8, flags: u8, stream_id: u32) {
    let header = Header { len: len as u32, ty, flags, stream_id };
    buf.extend_from_slice(&header.encode());
}

/// DATA frame.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Data {
    pub payload: Bytes,
    /// Number of padding octets, not counting the pad length field itself.
    pub pad_len: u8,
    pub end_stream: bool,
}

impl Data {
    pub fn new(payload: impl Into<Bytes>, end_stream: bool) -> Self {
        Self { payload: payload.into(), pad_len: 0, end_stream }
    }

    pub fn with_padding(mut self, pad_len: u8) -> Self {
        self.pad_len = pad_len;
        self
    }

    #[inline]
    pub fn data_len(&self) -> usize {
        self.payload.len()
    }

    /// Octets counted against flow control.
    #[inline]
    pub fn flow_len(&self) -> usize {
        self.payload.len() + self.pad_len as usize
    }
}

/// HEADERS frame carrying an already encoded field block.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Headers {
    pub block: Bytes,
    pub priority: Option<Priority>,
    pub end_stream: bool,
}

impl Headers {
    pub fn new(block: impl Into<Bytes>, end_stream: bool) -> Self {
        Self { block: block.into(), priority: None, end_stream }
    }
}

/// Stream dependency and weight.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Priority {
    pub dependency: u32,
    pub exclusive: bool,
    pub weight: u8,
}

impl Priority {
    const SIZE: usize = 5;

    fn encode(&self, buf: &mut BytesMut) {
        let mut dependency = self.dependency & Header::STREAM_ID_MASK;
        if self.exclusive {
            dependency |= !Header::STREAM_ID_MASK;
        }
        buf.put_u32(dependency);
        // weight is transmitted as `weight - 1`
        buf.put_u8(self.weight.saturating_sub(1));
    }
}

/// RST_STREAM frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reset {
    pub code: ErrorCode,
}

// ===== Writer =====

/// Destination of encoded frames on the connection.
pub trait FrameWrite {
    fn write_frame(&mut self, stream_id: u32, frame: &Frame) -> io::Result<()>;
}

impl FrameWrite for BytesMut {
    fn write_frame(&mut self, stream_id: u32, frame: &Frame) -> io::Result<()> {
        frame.encode(stream_id, self);
        Ok(())
    }
}

impl<W: FrameWrite + ?Sized> FrameWrite for &mut W {
    fn write_frame(&mut self, stream_id: u32, frame: &Frame) -> io::Result<()> {
        (**self).write_frame(stream_id, frame)
    }
}

#[cfg(test)]
mod test;
