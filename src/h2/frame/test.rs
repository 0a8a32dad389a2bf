use bytes::{Bytes, BytesMut};

use crate::h2::error::ErrorCode;
use crate::h2::frame::{Data, Frame, Header, Headers, Priority, Reset, Type};

#[test]
fn frame_header() {
    let header = Header { len: 16_384, ty: 0, flags: 0x09, stream_id: 7 };
    assert_eq!(header.encode(), [0, 0x40, 0, 0, 0x09, 0, 0, 0, 7]);

    // reserved bit is never written
    let header = Header { len: 4, ty: 3, flags: 0, stream_id: u32::MAX };
    assert_eq!(header.encode(), [0, 0, 4, 3, 0, 0x7f, 0xff, 0xff, 0xff]);
}

#[test]
fn unknown_type() {
    assert_eq!(Type::from_u8(9), Some(Type::Continuation));
    assert_eq!(Type::from_u8(10), None);
}

#[test]
fn encode_padded_data() {
    let mut buf = BytesMut::new();
    Frame::Data(Data::new(&b"hello"[..], true).with_padding(3)).encode(3, &mut buf);

    let flags = Header::END_STREAM | Header::PADDED;
    assert_eq!(&buf[..Header::SIZE], &[0, 0, 9, Type::Data as u8, flags, 0, 0, 0, 3]);
    assert_eq!(&buf[Header::SIZE..], &[3, b'h', b'e', b'l', b'l', b'o', 0, 0, 0]);
}

#[test]
fn encode_headers_with_priority() {
    let mut buf = BytesMut::new();
    let mut headers = Headers::new(Bytes::from_static(&[0x82]), false);
    headers.priority = Some(Priority { dependency: 1, exclusive: true, weight: 16 });
    Frame::Headers(headers).encode(5, &mut buf);

    let flags = Header::END_HEADERS | Header::PRIORITY;
    assert_eq!(&buf[..Header::SIZE], &[0, 0, 6, Type::Headers as u8, flags, 0, 0, 0, 5]);
    assert_eq!(&buf[Header::SIZE..], &[0x80, 0, 0, 1, 15, 0x82]);
}

#[test]
fn encode_reset() {
    let mut buf = BytesMut::new();
    Frame::Reset(Reset { code: ErrorCode::Cancel }).encode(1, &mut buf);

    assert_eq!(&buf[..Header::SIZE], &[0, 0, 4, Type::RstStream as u8, 0, 0, 0, 0, 1]);
    assert_eq!(&buf[Header::SIZE..], &[0, 0, 0, 8]);
}
