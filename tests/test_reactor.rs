//! End-to-end tests: a real reactor on a loopback listener, with std
//! clients on helper threads.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use mio::Token;
use pylon::config::Config;
use pylon::http::connection::LifecycleState;
use pylon::server::{Reactor, Readiness};

const TURN: Option<Duration> = Some(Duration::from_millis(10));
const DEADLINE: Duration = Duration::from_secs(10);

fn config_for(root: &std::path::Path) -> Config {
    Config {
        listen_addr: "127.0.0.1:0".to_string(),
        document_root: root.to_path_buf(),
        ..Config::default()
    }
}

fn connect(addr: SocketAddr) -> TcpStream {
    let stream = TcpStream::connect(addr).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    stream
}

fn fetch(addr: SocketAddr, request: &'static [u8]) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut stream = connect(addr);
        stream.write_all(request).unwrap();
        let mut response = Vec::new();
        stream.read_to_end(&mut response).unwrap();
        response
    })
}

/// Turns the reactor until every client thread has finished.
fn serve_until_done<T>(reactor: &mut Reactor, clients: Vec<JoinHandle<T>>) -> Vec<T> {
    let started = Instant::now();
    while !clients.iter().all(|c| c.is_finished()) {
        assert!(started.elapsed() < DEADLINE, "clients did not finish in time");
        reactor.turn(TURN).unwrap();
    }
    clients.into_iter().map(|c| c.join().unwrap()).collect()
}

fn sample_content(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 253) as u8).collect()
}

#[test]
fn test_serves_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), b"<h1>hello</h1>").unwrap();
    let mut reactor = Reactor::bind(&config_for(dir.path())).unwrap();

    let client = fetch(reactor.local_addr(), b"GET /index.html HTTP/1.0\r\n\r\n");
    let responses = serve_until_done(&mut reactor, vec![client]);

    assert_eq!(responses[0], b"HTTP/1.0 200 OK\r\n\r\n<h1>hello</h1>");
    assert_eq!(reactor.connection_count(), 0);
}

#[test]
fn test_missing_file_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let mut reactor = Reactor::bind(&config_for(dir.path())).unwrap();

    let client = fetch(reactor.local_addr(), b"GET /nope.txt HTTP/1.1\r\n\r\n");
    let responses = serve_until_done(&mut reactor, vec![client]);

    assert_eq!(responses[0], b"HTTP/1.0 404 Not Found\r\n\r\n");
}

#[test]
fn test_malformed_request_is_bad_request() {
    let dir = tempfile::tempdir().unwrap();
    let mut reactor = Reactor::bind(&config_for(dir.path())).unwrap();

    let client = fetch(reactor.local_addr(), b"garbage\r\n");
    let responses = serve_until_done(&mut reactor, vec![client]);

    assert_eq!(responses[0], b"HTTP/1.0 400 Bad Request\r\n\r\n");
}

#[test]
fn test_large_file_over_small_transfer_chunks() {
    let dir = tempfile::tempdir().unwrap();
    let content = sample_content(512 * 1024 + 17);
    std::fs::write(dir.path().join("big.bin"), &content).unwrap();

    let cfg = Config {
        max_transfer_chunk: 1000,
        ..config_for(dir.path())
    };
    let mut reactor = Reactor::bind(&cfg).unwrap();

    let client = fetch(reactor.local_addr(), b"GET /big.bin HTTP/1.0\r\n");
    let responses = serve_until_done(&mut reactor, vec![client]);

    let mut expected = b"HTTP/1.0 200 OK\r\n\r\n".to_vec();
    expected.extend_from_slice(&content);
    assert_eq!(responses[0].len(), expected.len());
    assert!(responses[0] == expected);
}

#[test]
fn test_concurrent_connections_get_their_own_files() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.txt"), b"contents of a").unwrap();
    std::fs::write(dir.path().join("b.txt"), b"contents of b").unwrap();
    let mut reactor = Reactor::bind(&config_for(dir.path())).unwrap();
    let addr = reactor.local_addr();

    // Each client sends its request line in two pieces, so both sessions
    // are mid-request at the same time.
    let split_fetch = |first: &'static [u8], rest: &'static [u8]| {
        thread::spawn(move || {
            let mut stream = connect(addr);
            stream.write_all(first).unwrap();
            thread::sleep(Duration::from_millis(100));
            stream.write_all(rest).unwrap();
            let mut response = Vec::new();
            stream.read_to_end(&mut response).unwrap();
            response
        })
    };

    let a = split_fetch(b"GET /a.t", b"xt HTTP/1.0\r\n");
    let b = split_fetch(b"GET /b", b".txt HTTP/1.0\r\n");
    let responses = serve_until_done(&mut reactor, vec![a, b]);

    assert_eq!(responses[0], b"HTTP/1.0 200 OK\r\n\r\ncontents of a");
    assert_eq!(responses[1], b"HTTP/1.0 200 OK\r\n\r\ncontents of b");
}

#[test]
fn test_late_event_for_closed_connection_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("f"), b"data").unwrap();
    let mut reactor = Reactor::bind(&config_for(dir.path())).unwrap();
    let addr = reactor.local_addr();

    // First session: completes and is destroyed.
    let done = fetch(addr, b"GET /f HTTP/1.0\r\n");
    serve_until_done(&mut reactor, vec![done]);
    assert_eq!(reactor.connection_count(), 0);
    let closed = Token(1);

    // Second session: connected but silent.
    let idle = connect(addr);
    let started = Instant::now();
    while reactor.connection_count() == 0 {
        assert!(started.elapsed() < DEADLINE);
        reactor.turn(TURN).unwrap();
    }
    let live = reactor.tokens()[0];
    assert_ne!(live, closed);

    reactor.dispatch(Readiness::new(closed, true, true));
    reactor.dispatch(Readiness::new(closed, true, true));

    assert!(!reactor.contains(closed));
    assert_eq!(reactor.connection_count(), 1);
    let conn = reactor.connection(live).unwrap();
    assert_eq!(conn.state(), LifecycleState::AwaitingRequest);
    assert!(conn.received().is_empty());

    drop(idle);
}

#[test]
fn test_peer_disconnect_destroys_connection() {
    let dir = tempfile::tempdir().unwrap();
    let mut reactor = Reactor::bind(&config_for(dir.path())).unwrap();

    let client = thread::spawn({
        let addr = reactor.local_addr();
        move || {
            let mut stream = connect(addr);
            stream.write_all(b"GET /half").unwrap();
        }
    });
    serve_until_done(&mut reactor, vec![client]);

    let started = Instant::now();
    loop {
        reactor.turn(TURN).unwrap();
        if reactor.connection_count() == 0 {
            break;
        }
        assert!(started.elapsed() < DEADLINE, "connection was never torn down");
    }
}

#[test]
fn test_idle_connections_are_swept() {
    let dir = tempfile::tempdir().unwrap();
    let mut reactor = Reactor::bind(&config_for(dir.path())).unwrap();

    let _silent = connect(reactor.local_addr());
    let started = Instant::now();
    while reactor.connection_count() == 0 {
        assert!(started.elapsed() < DEADLINE);
        reactor.turn(TURN).unwrap();
    }

    reactor.sweep_idle(Duration::from_secs(60), Instant::now());
    assert_eq!(reactor.connection_count(), 1);

    reactor.sweep_idle(Duration::ZERO, Instant::now());
    assert_eq!(reactor.connection_count(), 0);
}
