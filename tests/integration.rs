use rand::RngCore;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep, timeout, Duration};

use rdbkv::config::Config;
use rdbkv::server::serve;

const REPLY_TIMEOUT: Duration = Duration::from_secs(5);

async fn start_server(config: Config) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(serve(listener, config));
    addr
}

async fn connect(config: Config) -> TcpStream {
    let addr = start_server(config).await;
    TcpStream::connect(addr).await.unwrap()
}

/// Encodes `args` the way clients send commands: an array of bulk strings.
fn command(args: &[&[u8]]) -> Vec<u8> {
    let mut bytes = format!("*{}\r\n", args.len()).into_bytes();
    for arg in args {
        bytes.extend(format!("${}\r\n", arg.len()).into_bytes());
        bytes.extend_from_slice(arg);
        bytes.extend_from_slice(b"\r\n");
    }
    bytes
}

async fn read_reply(stream: &mut TcpStream, len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    timeout(REPLY_TIMEOUT, stream.read_exact(&mut buf))
        .await
        .expect("timed out waiting for a reply")
        .unwrap();
    buf
}

async fn assert_reply(stream: &mut TcpStream, request: &[u8], expected: &[u8]) {
    stream.write_all(request).await.unwrap();
    let actual = read_reply(stream, expected.len()).await;
    assert_eq!(actual, expected);
}

async fn assert_closed(stream: &mut TcpStream) {
    let mut rest = Vec::new();
    timeout(REPLY_TIMEOUT, stream.read_to_end(&mut rest))
        .await
        .expect("timed out waiting for the server to close the connection")
        .unwrap();
    assert!(rest.is_empty());
}

fn no_snapshot() -> Config {
    Config::new("", "")
}

fn encode_string(bytes: &[u8]) -> Vec<u8> {
    assert!(bytes.len() < 64);
    let mut encoded = vec![bytes.len() as u8];
    encoded.extend_from_slice(bytes);
    encoded
}

/// Writes a snapshot file with `records` to the temp dir.
fn write_snapshot(name: &str, records: &[(&[u8], &[u8])]) -> PathBuf {
    let mut bytes = b"REDIS0011".to_vec();
    bytes.extend([0xFE, 0x00, 0xFB, records.len() as u8, 0x00]);
    for (key, value) in records {
        bytes.extend(encode_string(key));
        bytes.extend(encode_string(value));
    }
    bytes.push(0xFF);
    bytes.extend([0u8; 8]);

    let path = std::env::temp_dir().join(format!("rdbkv-{}-{}.rdb", name, std::process::id()));
    std::fs::write(&path, bytes).unwrap();
    path
}

fn snapshot_config(path: &PathBuf) -> Config {
    Config::new(
        path.parent().unwrap().to_str().unwrap(),
        path.file_name().unwrap().to_str().unwrap(),
    )
}

#[tokio::test]
async fn test_ping() {
    let mut stream = connect(no_snapshot()).await;

    assert_reply(&mut stream, b"*1\r\n$4\r\nPING\r\n", b"+PONG\r\n").await;
    assert_reply(&mut stream, &command(&[b"ping", b"ignored"]), b"+PONG\r\n").await;
}

#[tokio::test]
async fn test_echo() {
    let mut stream = connect(no_snapshot()).await;

    assert_reply(&mut stream, &command(&[b"ECHO", b"hey"]), b"$3\r\nhey\r\n").await;
}

#[tokio::test]
async fn test_echo_binary_payload() {
    let mut stream = connect(no_snapshot()).await;

    let mut payload = vec![0u8; 1024];
    rand::thread_rng().fill_bytes(&mut payload);
    payload[10..12].copy_from_slice(b"\r\n");

    let mut expected = b"$1024\r\n".to_vec();
    expected.extend_from_slice(&payload);
    expected.extend_from_slice(b"\r\n");

    assert_reply(&mut stream, &command(&[b"ECHO", &payload]), &expected).await;
}

#[tokio::test]
async fn test_set_and_get() {
    let mut stream = connect(no_snapshot()).await;

    assert_reply(
        &mut stream,
        b"*3\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$3\r\nbar\r\n",
        b"+OK\r\n",
    )
    .await;
    assert_reply(
        &mut stream,
        b"*2\r\n$3\r\nGET\r\n$3\r\nfoo\r\n",
        b"$3\r\nbar\r\n",
    )
    .await;
    assert_reply(&mut stream, &command(&[b"GET", b"missing"]), b"$-1\r\n").await;
}

#[tokio::test]
async fn test_set_binary_key_and_value() {
    let mut stream = connect(no_snapshot()).await;

    let mut value = vec![0u8; 300];
    rand::thread_rng().fill_bytes(&mut value);
    let key = b"key\r\nwith\x00bytes";

    let mut expected = b"$300\r\n".to_vec();
    expected.extend_from_slice(&value);
    expected.extend_from_slice(b"\r\n");

    assert_reply(&mut stream, &command(&[b"SET", key, &value]), b"+OK\r\n").await;
    assert_reply(&mut stream, &command(&[b"GET", key]), &expected).await;
}

#[tokio::test]
async fn test_set_px_expires() {
    let mut stream = connect(no_snapshot()).await;

    assert_reply(
        &mut stream,
        &command(&[b"SET", b"foo", b"bar", b"PX", b"50"]),
        b"+OK\r\n",
    )
    .await;
    assert_reply(&mut stream, &command(&[b"GET", b"foo"]), b"$3\r\nbar\r\n").await;

    sleep(Duration::from_millis(60)).await;

    assert_reply(&mut stream, &command(&[b"GET", b"foo"]), b"$-1\r\n").await;
}

#[tokio::test]
async fn test_store_is_shared_between_connections() {
    let addr = start_server(no_snapshot()).await;
    let mut first = TcpStream::connect(addr).await.unwrap();
    let mut second = TcpStream::connect(addr).await.unwrap();

    assert_reply(&mut first, &command(&[b"SET", b"shared", b"1"]), b"+OK\r\n").await;
    assert_reply(&mut second, &command(&[b"GET", b"shared"]), b"$1\r\n1\r\n").await;
}

#[tokio::test]
async fn test_frame_split_across_writes() {
    let mut stream = connect(no_snapshot()).await;

    stream.write_all(b"*2\r\n$4\r\nEC").await.unwrap();
    sleep(Duration::from_millis(50)).await;
    stream.write_all(b"HO\r\n$5\r\nhel").await.unwrap();
    sleep(Duration::from_millis(50)).await;
    stream.write_all(b"lo\r\n").await.unwrap();

    assert_eq!(read_reply(&mut stream, 11).await, b"$5\r\nhello\r\n");
}

#[tokio::test]
async fn test_buffered_commands_are_answered_in_order() {
    let mut stream = connect(no_snapshot()).await;

    let mut request = command(&[b"SET", b"a", b"1"]);
    request.extend(command(&[b"GET", b"a"]));
    request.extend(command(&[b"PING"]));

    assert_reply(&mut stream, &request, b"+OK\r\n$1\r\n1\r\n+PONG\r\n").await;
}

#[tokio::test]
async fn test_unknown_and_incomplete_commands_get_no_reply() {
    let mut stream = connect(no_snapshot()).await;

    stream.write_all(&command(&[b"FLUSHALL"])).await.unwrap();
    stream.write_all(&command(&[b"ECHO"])).await.unwrap();
    stream.write_all(&command(&[b"CONFIG", b"SET", b"dir", b"/"])).await.unwrap();

    // The first reply on the wire belongs to PING.
    assert_reply(&mut stream, &command(&[b"PING"]), b"+PONG\r\n").await;
}

#[tokio::test]
async fn test_malformed_frame_closes_only_that_connection() {
    let addr = start_server(no_snapshot()).await;
    let mut bad = TcpStream::connect(addr).await.unwrap();
    let mut good = TcpStream::connect(addr).await.unwrap();

    bad.write_all(b"*1\r\n$x\r\nPING\r\n").await.unwrap();
    assert_closed(&mut bad).await;

    assert_reply(&mut good, &command(&[b"PING"]), b"+PONG\r\n").await;
}

#[tokio::test]
async fn test_nested_arrays_close_only_that_connection() {
    let addr = start_server(no_snapshot()).await;
    let mut bad = TcpStream::connect(addr).await.unwrap();
    let mut good = TcpStream::connect(addr).await.unwrap();

    let mut nested = b"*1\r\n".repeat(100_000);
    nested.extend_from_slice(b"$4\r\nPING\r\n");

    // The server may hang up before the whole request is written.
    let _ = bad.write_all(&nested).await;
    let mut rest = Vec::new();
    let read = timeout(REPLY_TIMEOUT, bad.read_to_end(&mut rest))
        .await
        .expect("timed out waiting for the server to close the connection");
    assert!(read.is_err() || rest.is_empty());

    assert_reply(&mut good, &command(&[b"PING"]), b"+PONG\r\n").await;
}

#[tokio::test]
async fn test_config_get() {
    let mut stream = connect(Config::new("/tmp/redis-files", "dump.rdb")).await;

    assert_reply(
        &mut stream,
        &command(&[b"CONFIG", b"GET", b"dir"]),
        b"*2\r\n$3\r\ndir\r\n$16\r\n/tmp/redis-files\r\n",
    )
    .await;
    assert_reply(
        &mut stream,
        &command(&[b"CONFIG", b"GET", b"dbfilename"]),
        b"*2\r\n$10\r\ndbfilename\r\n$8\r\ndump.rdb\r\n",
    )
    .await;
    assert_reply(
        &mut stream,
        &command(&[b"CONFIG", b"GET", b"appendonly"]),
        b"*0\r\n",
    )
    .await;
}

#[tokio::test]
async fn test_get_falls_back_to_snapshot() {
    let path = write_snapshot("fallback", &[(b"foo", b"from-disk"), (b"both", b"disk")]);
    let mut stream = connect(snapshot_config(&path)).await;

    assert_reply(&mut stream, &command(&[b"GET", b"foo"]), b"$9\r\nfrom-disk\r\n").await;

    assert_reply(&mut stream, &command(&[b"SET", b"both", b"memory"]), b"+OK\r\n").await;
    assert_reply(&mut stream, &command(&[b"GET", b"both"]), b"$6\r\nmemory\r\n").await;

    assert_reply(&mut stream, &command(&[b"GET", b"nowhere"]), b"$-1\r\n").await;

    std::fs::remove_file(path).unwrap();
}

#[tokio::test]
async fn test_keys() {
    let path = write_snapshot("keys", &[(b"first", b"1"), (b"second", b"2")]);
    let mut stream = connect(snapshot_config(&path)).await;

    assert_reply(
        &mut stream,
        &command(&[b"KEYS", b"*"]),
        b"*1\r\n$5\r\nfirst\r\n",
    )
    .await;

    std::fs::remove_file(path).unwrap();
}

#[tokio::test]
async fn test_keys_without_snapshot() {
    let mut stream = connect(Config::new(
        std::env::temp_dir().to_str().unwrap(),
        format!("rdbkv-absent-{}.rdb", std::process::id()),
    ))
    .await;

    assert_reply(&mut stream, &command(&[b"KEYS", b"*"]), b"*0\r\n").await;
    assert_reply(&mut stream, &command(&[b"GET", b"foo"]), b"$-1\r\n").await;
}
