use bytes::Bytes;
use h2_stream::h2::frame::{Data, FrameWrite, Headers};
use h2_stream::h2::settings::Settings;
use h2_stream::h2::{Connection, Frame, Role, WriteQueue};
use std::io;
use std::sync::Arc;
use std::time::Duration;

struct Print;

impl FrameWrite for Print {
    fn write_frame(&mut self, stream_id: u32, frame: &Frame) -> io::Result<()> {
        match frame {
            Frame::Data(data) => println!(
                "< {} stream={stream_id} len={} pad={} end_stream={}",
                frame.frame_type(),
                data.data_len(),
                data.pad_len,
                data.end_stream,
            ),
            _ => println!("< {} stream={stream_id}", frame.frame_type()),
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let mut remote = Settings::new();
    remote.initial_window_size = 1024;

    let queue = Arc::new(WriteQueue::new());
    let conn = Connection::builder(Role::Client).remote_settings(remote).build(queue.clone());

    tokio::spawn(async move {
        loop {
            if let Err(err) = queue.transmit_next(&mut Print).await {
                eprintln!("transmit error: {err}");
            }
        }
    });

    let stream = conn.stream(1);
    stream.write(Frame::Headers(Headers::new(Bytes::from_static(&[0x82]), false))).await.unwrap();

    // peer grants more window after a while
    tokio::spawn({
        let stream = Arc::clone(&stream);
        async move {
            for _ in 0..4 {
                tokio::time::sleep(Duration::from_millis(50)).await;
                println!("> WINDOW_UPDATE 1024");
                stream.send_flow().unwrap().increment_window(1024).unwrap();
            }
        }
    });

    let body = vec![b'x'; 4096];
    stream.write(Frame::Data(Data::new(body, true).with_padding(16))).await.unwrap();
    println!("stream {} {}", stream.id(), stream.state());
}
