#![cfg(all(unix, feature = "rpc"))]

use std::os::unix::net::UnixStream;
use std::thread;

use packwire::codec::{Bytes, DecodeConfig, EncodeOptions, Value};
use packwire::rpc::{ClientCodec, Header, RpcCodec, ServerCodec};

#[test]
fn open_values_through_rpc() {
    let (c, s) = UnixStream::pair().expect("pair should be creatable");
    let cfg = DecodeConfig::default().with_raw_as_text(true);
    let mut client = RpcCodec::new(c).expect("client codec");
    let mut server =
        RpcCodec::with_config(s, cfg, EncodeOptions::default()).expect("server codec");

    let handle = thread::spawn(move || {
        let header = server.read_request_header().expect("request header");
        let mut body = Value::Nil;
        server.read_request_body(Some(&mut body)).expect("request body");
        server
            .write_response(&Header::reply_to(&header), &body)
            .expect("echo response");
    });

    let body = Value::Binary(Bytes::from_static(b"echo"));
    client
        .write_request(&Header::request("Echo.Echo", 3), &body)
        .expect("request");
    let header = client.read_response_header().expect("response header");
    assert_eq!(header.sequence, 3);

    let mut reply = Value::Nil;
    client.read_response_body(Some(&mut reply)).expect("response body");
    // The server read the binary body as text and echoed a string back.
    assert_eq!(reply, Value::from("echo"));
    handle.join().expect("server thread should complete");
}

#[test]
fn marshal_roundtrip_via_facade() {
    let bytes = packwire::marshal(&vec![1u16, 300], &EncodeOptions::default()).unwrap();
    let v: Vec<u16> = packwire::unmarshal(&bytes, &DecodeConfig::default()).unwrap();
    assert_eq!(v, [1, 300]);
}

