//! The fixed 68-byte handshake that opens a peer connection: 1-byte
//! protocol-string length, the protocol string itself, 8 reserved bytes,
//! the 20-byte info-hash, and the 20-byte peer-id.

use crate::peer::error::PeerError;

const PROTOCOL: &[u8; 19] = b"BitTorrent protocol";
pub const HANDSHAKE_LEN: usize = 1 + 19 + 8 + 20 + 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub info_hash: [u8; 20],
    pub peer_id: [u8; 20],
}

impl Handshake {
    pub fn new(info_hash: [u8; 20], peer_id: [u8; 20]) -> Self {
        Handshake { info_hash, peer_id }
    }

    pub fn to_bytes(&self) -> [u8; HANDSHAKE_LEN] {
        let mut buf = [0u8; HANDSHAKE_LEN];
        buf[0] = 19;
        buf[1..20].copy_from_slice(PROTOCOL);
        // bytes 20..28 are the reserved bytes, left zero.
        buf[28..48].copy_from_slice(&self.info_hash);
        buf[48..68].copy_from_slice(&self.peer_id);
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Handshake, PeerError> {
        if buf.len() != HANDSHAKE_LEN {
            return Err(PeerError::InvalidHandshake(format!(
                "expected {HANDSHAKE_LEN} bytes, got {}",
                buf.len()
            )));
        }
        if buf[0] != 19 || &buf[1..20] != PROTOCOL {
            return Err(PeerError::InvalidHandshake(
                "unrecognized protocol string".into(),
            ));
        }
        let mut info_hash = [0u8; 20];
        info_hash.copy_from_slice(&buf[28..48]);
        let mut peer_id = [0u8; 20];
        peer_id.copy_from_slice(&buf[48..68]);
        Ok(Handshake { info_hash, peer_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let handshake = Handshake::new([1u8; 20], [2u8; 20]);
        let bytes = handshake.to_bytes();
        assert_eq!(bytes.len(), HANDSHAKE_LEN);
        assert_eq!(Handshake::from_bytes(&bytes).unwrap(), handshake);
    }

    #[test]
    fn rejects_wrong_protocol_string() {
        let mut bytes = Handshake::new([0u8; 20], [0u8; 20]).to_bytes();
        bytes[1] = b'X';
        assert!(Handshake::from_bytes(&bytes).is_err());
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(Handshake::from_bytes(&[0u8; 10]).is_err());
    }
}
