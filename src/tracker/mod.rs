//! Tracker client: announces to an HTTP/HTTPS or UDP tracker and reports
//! back the swarm's peer list and statistics.
//!
//! The announce URI's scheme selects the transport — no runtime registry of
//! transport subclasses, just a fixed match on `http`/`https` versus `udp`.

mod error;
mod http;
mod peer_id;
mod udp;

pub use error::TrackerError;

use std::net::{IpAddr, Ipv4Addr};

use tracing::instrument;

/// Tunables with the defaults named in the announce contract.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub port: u16,
    pub numwant: Option<u32>,
    pub key: Option<u32>,
    pub compact: bool,
    pub no_peer_id: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        TrackerConfig {
            port: 6881,
            numwant: None,
            key: None,
            compact: true,
            no_peer_id: false,
        }
    }
}

/// The announce event a client reports on each request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    None,
    Started,
    Completed,
    Stopped,
}

impl Event {
    /// Parses an event name, accepting the historical `stoped` typo as a
    /// synonym for `Stopped` — both normalize to the same canonical variant
    /// and are emitted identically.
    pub fn parse(name: &str) -> Option<Event> {
        match name {
            "none" => Some(Event::None),
            "started" => Some(Event::Started),
            "completed" => Some(Event::Completed),
            "stopped" | "stoped" => Some(Event::Stopped),
            _ => None,
        }
    }

    fn as_http_str(self) -> Option<&'static str> {
        match self {
            Event::None => None,
            Event::Started => Some("started"),
            Event::Completed => Some("completed"),
            Event::Stopped => Some("stopped"),
        }
    }

    fn as_udp_code(self) -> u32 {
        match self {
            Event::None => 0,
            Event::Completed => 1,
            Event::Started => 2,
            Event::Stopped => 3,
        }
    }
}

/// Inputs to a single announce call. `info_hash` and the resulting peer-id
/// are the only fields a tracker strictly requires; the rest default to
/// zero/none the way a client with nothing to report yet would send them.
#[derive(Debug, Clone)]
pub struct AnnounceRequest {
    pub info_hash: [u8; 20],
    pub downloaded: u64,
    pub uploaded: u64,
    pub left: u64,
    pub event: Event,
    pub ip: Option<Ipv4Addr>,
}

impl AnnounceRequest {
    pub fn new(info_hash: [u8; 20]) -> Self {
        AnnounceRequest {
            info_hash,
            downloaded: 0,
            uploaded: 0,
            left: 0,
            event: Event::None,
            ip: None,
        }
    }
}

/// One peer returned by a tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerAddr {
    pub ip: IpAddr,
    pub port: u16,
    pub peer_id: Option<[u8; 20]>,
}

/// Swarm statistics and peer list from one announce.
#[derive(Debug, Clone)]
pub struct AnnounceResponse {
    pub interval: u32,
    pub seeders: u32,
    pub leechers: u32,
    pub peers: Vec<PeerAddr>,
}

/// A tracker client with a peer-id fixed for its whole lifetime, so that
/// repeated announces (start, periodic reannounce, stop) all identify the
/// same client to the swarm.
pub struct TrackerClient {
    peer_id: [u8; 20],
    config: TrackerConfig,
}

impl TrackerClient {
    pub fn new(config: TrackerConfig) -> Self {
        TrackerClient {
            peer_id: peer_id::generate(),
            config,
        }
    }

    pub fn peer_id(&self) -> &[u8; 20] {
        &self.peer_id
    }

    #[instrument(skip(self, request), fields(announce_url))]
    pub fn announce(
        &self,
        announce_url: &str,
        request: &AnnounceRequest,
    ) -> Result<AnnounceResponse, TrackerError> {
        let scheme = announce_url
            .split_once("://")
            .map(|(scheme, _)| scheme)
            .ok_or_else(|| TrackerError::UrlParse(announce_url.to_string()))?;
        match scheme {
            "http" | "https" => http::announce(announce_url, &self.peer_id, &self.config, request),
            "udp" => udp::announce(announce_url, &self.peer_id, &self.config, request),
            other => Err(TrackerError::UnsupportedScheme(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_accepts_the_stoped_typo() {
        assert_eq!(Event::parse("stoped"), Some(Event::Stopped));
        assert_eq!(Event::parse("stopped"), Some(Event::Stopped));
    }

    #[test]
    fn udp_event_codes_match_the_wire_protocol() {
        assert_eq!(Event::None.as_udp_code(), 0);
        assert_eq!(Event::Completed.as_udp_code(), 1);
        assert_eq!(Event::Started.as_udp_code(), 2);
        assert_eq!(Event::Stopped.as_udp_code(), 3);
    }

    #[test]
    fn unsupported_scheme_is_rejected() {
        let client = TrackerClient::new(TrackerConfig::default());
        let request = AnnounceRequest::new([0u8; 20]);
        let result = client.announce("ftp://example.com/announce", &request);
        assert!(matches!(result, Err(TrackerError::UnsupportedScheme(_))));
    }
}
