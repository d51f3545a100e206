//! Integration tests driving a real (blocking) `PeerSession` against a
//! small scripted TCP peer running on a background thread.

use std::cell::RefCell;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::rc::Rc;
use std::sync::Once;
use std::thread::JoinHandle;

use super::*;

static TRACING_INIT: Once = Once::new();

/// Installs a subscriber so `tracing::debug!`/`instrument` output from the
/// session under test is visible with `--nocapture`. Safe to call from every
/// test; only the first call actually installs anything.
fn init_tracing() {
    TRACING_INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .init();
    });
}

struct MockPeer {
    addr: std::net::SocketAddr,
    handle: JoinHandle<()>,
}

impl MockPeer {
    /// Spawns a listener that accepts exactly one connection, hands it to
    /// `script`, then drops it — closing the socket as soon as the script
    /// is done so the client side observes a prompt EOF.
    fn spawn(script: impl FnOnce(TcpStream) + Send + 'static) -> MockPeer {
        init_tracing();
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            script(stream);
        });
        MockPeer { addr, handle }
    }

    fn join(self) {
        self.handle.join().unwrap();
    }
}

fn echo_handshake_with_peer_id(stream: &mut TcpStream, peer_id: [u8; 20]) -> Handshake {
    let mut buf = [0u8; handshake::HANDSHAKE_LEN];
    stream.read_exact(&mut buf).unwrap();
    let received = Handshake::from_bytes(&buf).unwrap();
    let reply = Handshake::new(received.info_hash, peer_id);
    stream.write_all(&reply.to_bytes()).unwrap();
    received
}

fn session(addr: std::net::SocketAddr, info_hash: [u8; 20]) -> PeerSession {
    PeerSession::new(addr, info_hash, [9u8; 20], PeerSessionConfig::default())
}

#[test]
fn handshake_round_trip_fires_callback() {
    let info_hash = [1u8; 20];
    let remote_peer_id = [2u8; 20];
    let mock = MockPeer::spawn(move |mut stream| {
        echo_handshake_with_peer_id(&mut stream, remote_peer_id);
    });

    let mut peer = session(mock.addr, info_hash);
    let seen = Rc::new(RefCell::new(None));
    let seen_clone = Rc::clone(&seen);
    peer.on_handshake(move |handshake| {
        *seen_clone.borrow_mut() = Some(handshake.peer_id);
    });

    peer.connect().unwrap();
    let handshake = peer.handshake().unwrap();
    assert_eq!(handshake.peer_id, remote_peer_id);
    assert_eq!(*seen.borrow(), Some(remote_peer_id));
    mock.join();
}

#[test]
fn mismatched_info_hash_fails_handshake() {
    let info_hash = [1u8; 20];
    let mock = MockPeer::spawn(move |mut stream| {
        let mut buf = [0u8; handshake::HANDSHAKE_LEN];
        stream.read_exact(&mut buf).unwrap();
        let reply = Handshake::new([0xffu8; 20], [2u8; 20]);
        stream.write_all(&reply.to_bytes()).unwrap();
    });

    let mut peer = session(mock.addr, info_hash);
    peer.connect().unwrap();
    let result = peer.handshake();
    assert!(matches!(result, Err(PeerError::InfoHashMismatch { .. })));
    mock.join();
}

#[test]
fn have_message_updates_bitfield_and_fires_callback() {
    let info_hash = [3u8; 20];
    let remote_peer_id = [4u8; 20];
    let mock = MockPeer::spawn(move |mut stream| {
        echo_handshake_with_peer_id(&mut stream, remote_peer_id);
        stream.write_all(&Message::Have(5).to_bytes()).unwrap();
    });

    let mut peer = session(mock.addr, info_hash);
    let seen = Rc::new(RefCell::new(Vec::new()));
    let seen_clone = Rc::clone(&seen);
    peer.on(Event::Have, move |message| {
        if let Message::Have(index) = message {
            seen_clone.borrow_mut().push(*index);
        }
    });

    peer.connect().unwrap();
    peer.handshake().unwrap();
    peer.run().unwrap();

    assert!(peer.bitfield().has(5));
    assert_eq!(*seen.borrow(), vec![5]);
    mock.join();
}

#[test]
fn unchoke_message_clears_client_choked() {
    let info_hash = [5u8; 20];
    let remote_peer_id = [6u8; 20];
    let mock = MockPeer::spawn(move |mut stream| {
        echo_handshake_with_peer_id(&mut stream, remote_peer_id);
        stream.write_all(&Message::Unchoke.to_bytes()).unwrap();
    });

    let mut peer = session(mock.addr, info_hash);
    peer.connect().unwrap();
    peer.handshake().unwrap();
    assert!(peer.client_choked());
    peer.run().unwrap();
    assert!(!peer.client_choked());
    mock.join();
}

#[test]
fn keep_alive_frame_fires_only_the_keepalive_callback() {
    let info_hash = [7u8; 20];
    let remote_peer_id = [8u8; 20];
    let mock = MockPeer::spawn(move |mut stream| {
        echo_handshake_with_peer_id(&mut stream, remote_peer_id);
        stream.write_all(&Message::KeepAlive.to_bytes()).unwrap();
    });

    let mut peer = session(mock.addr, info_hash);
    let keepalive_count = Rc::new(RefCell::new(0));
    let choke_count = Rc::new(RefCell::new(0));
    let generic_count = Rc::new(RefCell::new(0));
    let keepalive_clone = Rc::clone(&keepalive_count);
    let choke_clone = Rc::clone(&choke_count);
    let generic_clone = Rc::clone(&generic_count);
    peer.on(Event::KeepAlive, move |_| *keepalive_clone.borrow_mut() += 1);
    peer.on(Event::Choke, move |_| *choke_clone.borrow_mut() += 1);
    peer.on(Event::Message, move |_| *generic_clone.borrow_mut() += 1);

    peer.connect().unwrap();
    peer.handshake().unwrap();
    peer.run().unwrap();

    assert_eq!(*keepalive_count.borrow(), 1);
    assert_eq!(*choke_count.borrow(), 0);
    assert_eq!(*generic_count.borrow(), 0);
    mock.join();
}

#[test]
fn sending_unchoke_clears_peer_choked() {
    let info_hash = [9u8; 20];
    let remote_peer_id = [10u8; 20];
    let mock = MockPeer::spawn(move |mut stream| {
        echo_handshake_with_peer_id(&mut stream, remote_peer_id);
    });

    let mut peer = session(mock.addr, info_hash);
    peer.connect().unwrap();
    peer.handshake().unwrap();
    assert!(peer.peer_choked());
    peer.send(&Message::Unchoke).unwrap();
    assert!(!peer.peer_choked());
    mock.join();
}
