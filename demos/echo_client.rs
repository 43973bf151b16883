use std::env;
use std::io::{Read, Write};
use std::net::IpAddr;

use rtp::RtpSocket;

fn main() {
    env_logger::init();

    let mut args = env::args().skip(1);
    let usage = "usage: echo-client <host> <port> [message]";
    let host: IpAddr = args.next().expect(usage).parse().expect("invalid host");
    let port: u16 = args.next().expect(usage).parse().expect("invalid port");
    let message = args.next().unwrap_or_else(|| "hello".to_string());

    let mut socket = RtpSocket::bind(0).expect("bind failed");
    socket.connect(host, port).expect("connect failed");
    log::info!("connected to {host}:{port}");

    socket.write_all(message.as_bytes()).expect("write failed");

    let mut buf = [0u8; 4096];
    let n = socket.read(&mut buf).expect("read failed");
    log::info!("echoed back: {:?}", String::from_utf8_lossy(&buf[..n]));

    socket.disconnect();
}
