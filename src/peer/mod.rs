//! Peer wire sessions: handshake, framed messages, choke/interest state,
//! keep-alives, and an explicit callback registry a download scheduler can
//! drive.
//!
//! The session owns exactly one blocking `TcpStream` for its lifetime. The
//! dispatch loop (`run`) is the sole reader; sends may happen from inside a
//! callback body, which executes on the dispatcher's own thread of control,
//! so no additional locking is needed as long as callers don't share one
//! session across threads.

mod bitfield;
mod error;
mod handshake;
mod message;
#[cfg(test)]
mod tests;

pub use bitfield::Bitfield;
pub use error::PeerError;
pub use handshake::Handshake;
pub use message::Message;

use std::collections::HashMap;
use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::{Duration, Instant};

use tracing::{debug, instrument};

/// Tunables for the connect/poll/keep-alive timers.
#[derive(Debug, Clone)]
pub struct PeerSessionConfig {
    pub connect_timeout: Duration,
    pub poll_interval: Duration,
    pub keepalive_interval: Duration,
}

impl Default for PeerSessionConfig {
    fn default() -> Self {
        PeerSessionConfig {
            connect_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_secs(1),
            keepalive_interval: Duration::from_secs(60),
        }
    }
}

/// The fixed enumeration of events a callback can be registered against.
/// `handshake` is handled by [`PeerSession::on_handshake`] separately since
/// its payload type (`Handshake`) differs from every other event's (`Message`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    Message,
    KeepAlive,
    Choke,
    Unchoke,
    Interested,
    NotInterested,
    Have,
    Bitfield,
    Request,
    Piece,
    Cancel,
    Port,
}

fn event_for(message: &Message) -> Option<Event> {
    match message {
        Message::KeepAlive => Some(Event::KeepAlive),
        Message::Choke => Some(Event::Choke),
        Message::Unchoke => Some(Event::Unchoke),
        Message::Interested => Some(Event::Interested),
        Message::NotInterested => Some(Event::NotInterested),
        Message::Have(_) => Some(Event::Have),
        Message::Bitfield(_) => Some(Event::Bitfield),
        Message::Request { .. } => Some(Event::Request),
        Message::Piece { .. } => Some(Event::Piece),
        Message::Cancel { .. } => Some(Event::Cancel),
        Message::Port(_) => Some(Event::Port),
        // Unrecognized ids only ever reach the generic on_message callback.
        Message::Unknown { .. } => None,
    }
}

pub struct PeerSession {
    addr: SocketAddr,
    local_peer_id: [u8; 20],
    info_hash: [u8; 20],
    config: PeerSessionConfig,
    stream: Option<TcpStream>,
    client_choked: bool,
    client_interested: bool,
    peer_choked: bool,
    peer_interested: bool,
    bitfield: Bitfield,
    last_send: Instant,
    on_handshake: Option<Box<dyn FnMut(&Handshake)>>,
    handlers: HashMap<Event, Box<dyn FnMut(&Message)>>,
}

impl PeerSession {
    pub fn new(
        addr: SocketAddr,
        info_hash: [u8; 20],
        local_peer_id: [u8; 20],
        config: PeerSessionConfig,
    ) -> Self {
        PeerSession {
            addr,
            local_peer_id,
            info_hash,
            config,
            stream: None,
            client_choked: true,
            client_interested: false,
            peer_choked: true,
            peer_interested: false,
            bitfield: Bitfield::new(),
            last_send: Instant::now(),
            on_handshake: None,
            handlers: HashMap::new(),
        }
    }

    pub fn client_choked(&self) -> bool {
        self.client_choked
    }

    pub fn client_interested(&self) -> bool {
        self.client_interested
    }

    pub fn peer_choked(&self) -> bool {
        self.peer_choked
    }

    pub fn peer_interested(&self) -> bool {
        self.peer_interested
    }

    pub fn bitfield(&self) -> &Bitfield {
        &self.bitfield
    }

    /// Registers a callback for one of the message-shaped events.
    /// Registering again for the same event replaces the previous handler.
    pub fn on(&mut self, event: Event, handler: impl FnMut(&Message) + 'static) {
        self.handlers.insert(event, Box::new(handler));
    }

    /// Registers the callback that fires once, right after a successful
    /// handshake.
    pub fn on_handshake(&mut self, handler: impl FnMut(&Handshake) + 'static) {
        self.on_handshake = Some(Box::new(handler));
    }

    /// Opens the TCP connection. Fails with [`PeerError::AlreadyOpen`] if
    /// already connected.
    #[instrument(skip(self), fields(addr = %self.addr))]
    pub fn connect(&mut self) -> Result<(), PeerError> {
        if self.stream.is_some() {
            return Err(PeerError::AlreadyOpen);
        }
        let stream = TcpStream::connect_timeout(&self.addr, self.config.connect_timeout)?;
        self.stream = Some(stream);
        self.last_send = Instant::now();
        Ok(())
    }

    /// Performs the BitTorrent handshake: writes ours, reads theirs, and
    /// fails if the remote's info-hash doesn't match ours.
    #[instrument(skip(self))]
    pub fn handshake(&mut self) -> Result<Handshake, PeerError> {
        let outbound = Handshake::new(self.info_hash, self.local_peer_id);
        {
            let stream = self.stream.as_mut().ok_or(PeerError::Closed)?;
            stream.write_all(&outbound.to_bytes())?;
        }
        self.last_send = Instant::now();

        let mut buf = [0u8; handshake::HANDSHAKE_LEN];
        {
            let stream = self.stream.as_mut().ok_or(PeerError::Closed)?;
            stream.read_exact(&mut buf)?;
        }
        let inbound = Handshake::from_bytes(&buf)?;
        if inbound.info_hash != self.info_hash {
            return Err(PeerError::InfoHashMismatch {
                expected: hex::encode(self.info_hash),
                got: hex::encode(inbound.info_hash),
            });
        }
        debug!(peer_id = %hex::encode(inbound.peer_id), "handshake complete");
        if let Some(handler) = self.on_handshake.as_mut() {
            handler(&inbound);
        }
        Ok(inbound)
    }

    /// Sends one message, updating the send-side state and the keep-alive
    /// timestamp.
    pub fn send(&mut self, message: &Message) -> Result<(), PeerError> {
        let stream = self.stream.as_mut().ok_or(PeerError::Closed)?;
        stream.write_all(&message.to_bytes())?;
        self.last_send = Instant::now();
        match message {
            Message::Choke => self.peer_choked = true,
            Message::Unchoke => self.peer_choked = false,
            Message::Interested => self.client_interested = true,
            Message::NotInterested => self.client_interested = false,
            _ => {}
        }
        Ok(())
    }

    /// Runs the dispatch loop until the socket closes or raises an I/O
    /// error (treated as orderly shutdown); a malformed message body still
    /// fails the session.
    #[instrument(skip(self))]
    pub fn run(&mut self) -> Result<(), PeerError> {
        {
            let stream = self.stream.as_ref().ok_or(PeerError::Closed)?;
            stream.set_read_timeout(Some(self.config.poll_interval))?;
        }
        loop {
            let mut len_buf = [0u8; 4];
            if !self.read_exact_poll(&mut len_buf)? {
                return Ok(());
            }
            let len = u32::from_be_bytes(len_buf) as usize;
            let mut payload = vec![0u8; len];
            if !self.read_exact_poll(&mut payload)? {
                return Ok(());
            }
            let message = Message::decode_frame(&payload)?;
            self.apply_receive_transition(&message);
            self.dispatch(&message);
            self.maybe_send_keepalive()?;
        }
    }

    fn apply_receive_transition(&mut self, message: &Message) {
        match message {
            Message::Choke => self.client_choked = true,
            Message::Unchoke => self.client_choked = false,
            Message::Interested => self.peer_interested = true,
            Message::NotInterested => self.peer_interested = false,
            Message::Have(index) => self.bitfield.add_piece(*index),
            Message::Bitfield(bits) => self.bitfield = Bitfield::from_bytes(bits.clone()),
            _ => {}
        }
    }

    /// Keep-alives fire only their own callback: the generic `Event::Message`
    /// handler is for real protocol messages, and a keep-alive carries no
    /// payload worth inspecting generically.
    fn dispatch(&mut self, message: &Message) {
        if matches!(message, Message::KeepAlive) {
            if let Some(handler) = self.handlers.get_mut(&Event::KeepAlive) {
                handler(message);
            }
            return;
        }
        if let Some(handler) = self.handlers.get_mut(&Event::Message) {
            handler(message);
        }
        if let Some(event) = event_for(message) {
            if let Some(handler) = self.handlers.get_mut(&event) {
                handler(message);
            }
        }
    }

    fn maybe_send_keepalive(&mut self) -> Result<(), PeerError> {
        if self.last_send.elapsed() > self.config.keepalive_interval {
            self.send(&Message::KeepAlive)?;
        }
        Ok(())
    }

    /// Reads exactly `buf.len()` bytes, retrying across poll-window timeouts
    /// (considering a keep-alive on each one) rather than giving up. Returns
    /// `Ok(true)` once `buf` is full. Any I/O error or EOF — whether at a
    /// frame boundary or mid-frame — returns `Ok(false)`, since the dispatch
    /// loop treats socket termination as an orderly shutdown rather than a
    /// propagated failure.
    fn read_exact_poll(&mut self, buf: &mut [u8]) -> Result<bool, PeerError> {
        if buf.is_empty() {
            return Ok(true);
        }
        let mut filled = 0;
        loop {
            let stream = match self.stream.as_mut() {
                Some(stream) => stream,
                None => return Ok(false),
            };
            match stream.read(&mut buf[filled..]) {
                Ok(0) => return Ok(false),
                Ok(n) => {
                    filled += n;
                    if filled == buf.len() {
                        return Ok(true);
                    }
                }
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    self.maybe_send_keepalive()?;
                }
                Err(_) => return Ok(false),
            }
        }
    }
}
