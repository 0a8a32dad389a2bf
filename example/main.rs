use bytes::{Bytes, BytesMut};
use h2_stream::h2::{Connection, ErrorCode, Frame, Role, WriteQueue};
use h2_stream::h2::frame::{Data, Headers, Type};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    env_logger::init();

    let (conn, queue) = Connection::new(Role::Server);
    let writer = tokio::spawn(write_loop(Arc::clone(&conn), queue));

    // GET / with END_STREAM
    let stream = conn.stream(1);
    stream.recv(Type::Headers, true).unwrap();
    println!("> stream {} {}", stream.id(), stream.state());

    // :status 200
    stream.write(Frame::Headers(Headers::new(Bytes::from_static(&[0x88]), false))).await.unwrap();
    stream.write(Frame::Data(Data::new(&b"Hello World"[..], true))).await.unwrap();
    println!("< stream {} {}", stream.id(), stream.state());

    // refused before any response
    let refused = conn.stream(3);
    refused.recv(Type::Headers, false).unwrap();
    refused.reset(ErrorCode::RefusedStream).await.unwrap();

    conn.close();
    let buf = writer.await.unwrap();
    println!("wrote {} bytes: {:02x?}", buf.len(), &buf[..]);
}

async fn write_loop(conn: Arc<Connection>, queue: Arc<WriteQueue>) -> BytesMut {
    let mut buf = BytesMut::new();
    loop {
        let stream = tokio::select! {
            biased;
            stream = queue.next() => stream,
            _ = conn.closed() => break buf,
        };
        if let Err(err) = stream.transmit(&mut buf) {
            eprintln!("transmit error: {err}");
        }
    }
}
