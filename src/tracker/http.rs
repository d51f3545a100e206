//! HTTP/HTTPS tracker announces: a bencoded GET response over `reqwest`'s
//! blocking client, matching the synchronous, one-request-per-announce
//! model the rest of this crate uses.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use tracing::debug;

use crate::bencode::{self, BValue};
use crate::tracker::{AnnounceRequest, AnnounceResponse, PeerAddr, TrackerConfig, TrackerError};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub fn announce(
    announce_url: &str,
    peer_id: &[u8; 20],
    config: &TrackerConfig,
    request: &AnnounceRequest,
) -> Result<AnnounceResponse, TrackerError> {
    let url = build_url(announce_url, peer_id, config, request);
    debug!(url, "sending HTTP announce");

    let client = reqwest::blocking::Client::builder()
        .timeout(CONNECT_TIMEOUT)
        .build()?;
    let response = client.get(&url).send()?;
    let status = response.status();
    if !status.is_success() {
        return Err(TrackerError::Http {
            status: status.as_u16(),
        });
    }
    let body = response.bytes()?;
    let value = bencode::decode(&body)?;
    parse_response(&value)
}

fn build_url(
    announce_url: &str,
    peer_id: &[u8; 20],
    config: &TrackerConfig,
    request: &AnnounceRequest,
) -> String {
    let separator = if announce_url.contains('?') { '&' } else { '?' };
    let mut url = format!(
        "{announce_url}{separator}info_hash={}&peer_id={}&port={}&uploaded={}&downloaded={}&left={}&compact={}&no_peer_id={}",
        percent_encode(&request.info_hash),
        percent_encode(peer_id),
        config.port,
        request.uploaded,
        request.downloaded,
        request.left,
        config.compact as u8,
        config.no_peer_id as u8,
    );
    if let Some(event) = request.event.as_http_str() {
        url.push_str("&event=");
        url.push_str(event);
    }
    if let Some(ip) = request.ip {
        url.push_str("&ip=");
        url.push_str(&ip.to_string());
    }
    if let Some(numwant) = config.numwant {
        url.push_str(&format!("&numwant={numwant}"));
    }
    if let Some(key) = config.key {
        url.push_str(&format!("&key={key}"));
    }
    url
}

/// Percent-encodes raw bytes per RFC 3986's unreserved set (`ALPHA / DIGIT /
/// "-" / "." / "_" / "~"`), which is what every BitTorrent tracker expects
/// for `info_hash`/`peer_id` — escaping every byte (as opposed to only the
/// reserved ones) still decodes correctly but makes URLs needlessly noisy.
fn percent_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for &byte in bytes {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char);
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

fn parse_response(value: &BValue) -> Result<AnnounceResponse, TrackerError> {
    if let Some(reason) = value.get("failure reason").and_then(BValue::as_bytes) {
        return Err(TrackerError::Failure(String::from_utf8_lossy(reason).into_owned()));
    }
    let interval = value
        .get("interval")
        .and_then(BValue::as_integer)
        .ok_or_else(|| TrackerError::Malformed("missing interval".into()))? as u32;
    // `complete`/`incomplete` are inverted relative to the conventional
    // BitTorrent meaning (complete = seeders). Upstream behavioral quirk,
    // preserved here for parity rather than corrected.
    let leechers = value.get("complete").and_then(BValue::as_integer).unwrap_or(0) as u32;
    let seeders = value.get("incomplete").and_then(BValue::as_integer).unwrap_or(0) as u32;
    let peers = match value.get("peers") {
        Some(BValue::Bytes(compact)) => parse_compact_peers(compact)?,
        Some(BValue::List(list)) => parse_dict_peers(list)?,
        _ => Vec::new(),
    };
    Ok(AnnounceResponse {
        interval,
        seeders,
        leechers,
        peers,
    })
}

fn parse_compact_peers(bytes: &[u8]) -> Result<Vec<PeerAddr>, TrackerError> {
    if bytes.len() % 6 != 0 {
        return Err(TrackerError::Malformed(format!(
            "compact peers length {} is not a multiple of 6",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(6)
        .map(|chunk| {
            let ip = Ipv4Addr::new(chunk[0], chunk[1], chunk[2], chunk[3]);
            let port = u16::from_be_bytes([chunk[4], chunk[5]]);
            PeerAddr {
                ip: IpAddr::V4(ip),
                port,
                peer_id: None,
            }
        })
        .collect())
}

fn parse_dict_peers(list: &[BValue]) -> Result<Vec<PeerAddr>, TrackerError> {
    list.iter()
        .map(|entry| {
            let ip_bytes = entry
                .get("ip")
                .and_then(BValue::as_bytes)
                .ok_or_else(|| TrackerError::Malformed("peer missing ip".into()))?;
            let ip: IpAddr = std::str::from_utf8(ip_bytes)
                .ok()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| TrackerError::Malformed("peer ip is not a valid address".into()))?;
            let port = entry
                .get("port")
                .and_then(BValue::as_integer)
                .ok_or_else(|| TrackerError::Malformed("peer missing port".into()))? as u16;
            let peer_id = entry
                .get("peer id")
                .and_then(BValue::as_bytes)
                .and_then(|b| <[u8; 20]>::try_from(b).ok());
            Ok(PeerAddr { ip, port, peer_id })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn percent_encode_leaves_unreserved_bytes_untouched() {
        assert_eq!(percent_encode(b"abcXYZ019-._~"), "abcXYZ019-._~");
    }

    #[test]
    fn percent_encode_escapes_everything_else() {
        assert_eq!(percent_encode(&[0xff, 0x00, b' ']), "%FF%00%20");
    }

    #[test]
    fn parses_compact_peers() {
        let bytes = [192, 168, 1, 1, 0x1a, 0xe1];
        let peers = parse_compact_peers(&bytes).unwrap();
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].ip, IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1)));
        assert_eq!(peers[0].port, 0x1ae1);
    }

    #[test]
    fn inverts_complete_and_incomplete_into_leechers_and_seeders() {
        let mut dict = BTreeMap::new();
        dict.insert(b"interval".to_vec(), BValue::Integer(1800));
        dict.insert(b"complete".to_vec(), BValue::Integer(10));
        dict.insert(b"incomplete".to_vec(), BValue::Integer(5));
        let response = parse_response(&BValue::Dict(dict)).unwrap();
        assert_eq!(response.leechers, 10);
        assert_eq!(response.seeders, 5);
    }

    #[test]
    fn failure_reason_becomes_an_error() {
        let mut dict = BTreeMap::new();
        dict.insert(b"failure reason".to_vec(), BValue::Bytes(b"bad request".to_vec()));
        let result = parse_response(&BValue::Dict(dict));
        assert!(matches!(result, Err(TrackerError::Failure(_))));
    }
}
