//! The ten message kinds (plus keep-alive) that travel over a peer wire
//! connection after the handshake, each as `length` (u32 BE) then `length`
//! bytes of payload: `length == 0` is a keep-alive, otherwise the first
//! payload byte is the message id.

use crate::peer::error::PeerError;

pub const ID_CHOKE: u8 = 0;
pub const ID_UNCHOKE: u8 = 1;
pub const ID_INTERESTED: u8 = 2;
pub const ID_NOT_INTERESTED: u8 = 3;
pub const ID_HAVE: u8 = 4;
pub const ID_BITFIELD: u8 = 5;
pub const ID_REQUEST: u8 = 6;
pub const ID_PIECE: u8 = 7;
pub const ID_CANCEL: u8 = 8;
pub const ID_PORT: u8 = 9;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    KeepAlive,
    Choke,
    Unchoke,
    Interested,
    NotInterested,
    Have(u32),
    Bitfield(Vec<u8>),
    Request { index: u32, begin: u32, length: u32 },
    Piece { index: u32, begin: u32, block: Vec<u8> },
    Cancel { index: u32, begin: u32, length: u32 },
    Port(u16),
    /// An unrecognized message id. Routed only to the generic
    /// `on_message` callback, never a kind-specific one.
    Unknown { id: u8, payload: Vec<u8> },
}

impl Message {
    /// Encodes the full wire frame: 4-byte big-endian length prefix
    /// followed by the id byte (if any) and body.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut body = Vec::new();
        match self {
            Message::KeepAlive => {}
            Message::Choke => body.push(ID_CHOKE),
            Message::Unchoke => body.push(ID_UNCHOKE),
            Message::Interested => body.push(ID_INTERESTED),
            Message::NotInterested => body.push(ID_NOT_INTERESTED),
            Message::Have(index) => {
                body.push(ID_HAVE);
                body.extend_from_slice(&index.to_be_bytes());
            }
            Message::Bitfield(bits) => {
                body.push(ID_BITFIELD);
                body.extend_from_slice(bits);
            }
            Message::Request { index, begin, length } => {
                body.push(ID_REQUEST);
                body.extend_from_slice(&index.to_be_bytes());
                body.extend_from_slice(&begin.to_be_bytes());
                body.extend_from_slice(&length.to_be_bytes());
            }
            Message::Piece { index, begin, block } => {
                body.push(ID_PIECE);
                body.extend_from_slice(&index.to_be_bytes());
                body.extend_from_slice(&begin.to_be_bytes());
                body.extend_from_slice(block);
            }
            Message::Cancel { index, begin, length } => {
                body.push(ID_CANCEL);
                body.extend_from_slice(&index.to_be_bytes());
                body.extend_from_slice(&begin.to_be_bytes());
                body.extend_from_slice(&length.to_be_bytes());
            }
            Message::Port(port) => {
                body.push(ID_PORT);
                body.extend_from_slice(&port.to_be_bytes());
            }
            Message::Unknown { id, payload } => {
                body.push(*id);
                body.extend_from_slice(payload);
            }
        }
        let mut frame = Vec::with_capacity(4 + body.len());
        frame.extend_from_slice(&(body.len() as u32).to_be_bytes());
        frame.extend_from_slice(&body);
        frame
    }

    /// Parses one frame's payload (everything after the 4-byte length
    /// prefix; empty means keep-alive).
    pub fn decode_frame(payload: &[u8]) -> Result<Message, PeerError> {
        let Some((&id, body)) = payload.split_first() else {
            return Ok(Message::KeepAlive);
        };
        match id {
            ID_CHOKE => expect_empty(body, "choke").map(|_| Message::Choke),
            ID_UNCHOKE => expect_empty(body, "unchoke").map(|_| Message::Unchoke),
            ID_INTERESTED => expect_empty(body, "interested").map(|_| Message::Interested),
            ID_NOT_INTERESTED => expect_empty(body, "not interested").map(|_| Message::NotInterested),
            ID_HAVE => Ok(Message::Have(read_u32(body, 0, "have")?)),
            ID_BITFIELD => Ok(Message::Bitfield(body.to_vec())),
            ID_REQUEST => Ok(Message::Request {
                index: read_u32(body, 0, "request")?,
                begin: read_u32(body, 4, "request")?,
                length: read_u32(body, 8, "request")?,
            }),
            ID_PIECE => {
                if body.len() < 8 {
                    return Err(PeerError::MalformedMessage("piece body too short".into()));
                }
                Ok(Message::Piece {
                    index: read_u32(body, 0, "piece")?,
                    begin: read_u32(body, 4, "piece")?,
                    block: body[8..].to_vec(),
                })
            }
            ID_CANCEL => Ok(Message::Cancel {
                index: read_u32(body, 0, "cancel")?,
                begin: read_u32(body, 4, "cancel")?,
                length: read_u32(body, 8, "cancel")?,
            }),
            ID_PORT => {
                if body.len() < 2 {
                    return Err(PeerError::MalformedMessage("port body too short".into()));
                }
                Ok(Message::Port(u16::from_be_bytes([body[0], body[1]])))
            }
            other => Ok(Message::Unknown {
                id: other,
                payload: body.to_vec(),
            }),
        }
    }
}

fn expect_empty(body: &[u8], label: &'static str) -> Result<(), PeerError> {
    if body.is_empty() {
        Ok(())
    } else {
        Err(PeerError::MalformedMessage(format!("{label} expects an empty body")))
    }
}

fn read_u32(body: &[u8], offset: usize, label: &'static str) -> Result<u32, PeerError> {
    body.get(offset..offset + 4)
        .map(|slice| u32::from_be_bytes(slice.try_into().unwrap()))
        .ok_or_else(|| PeerError::MalformedMessage(format!("{label} body too short")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_choke() {
        assert_eq!(Message::Choke.to_bytes(), vec![0, 0, 0, 1, 0]);
    }

    #[test]
    fn encodes_have() {
        assert_eq!(
            Message::Have(42).to_bytes(),
            vec![0, 0, 0, 5, 4, 0, 0, 0, 42]
        );
    }

    #[test]
    fn encodes_request() {
        let message = Message::Request {
            index: 1,
            begin: 2,
            length: 16384,
        };
        assert_eq!(
            message.to_bytes(),
            vec![0, 0, 0, 13, 6, 0, 0, 0, 1, 0, 0, 0, 2, 0, 0, 64, 0]
        );
    }

    #[test]
    fn encodes_keep_alive_as_zero_length_frame() {
        assert_eq!(Message::KeepAlive.to_bytes(), vec![0, 0, 0, 0]);
    }

    #[test]
    fn decodes_keep_alive_from_empty_payload() {
        assert_eq!(Message::decode_frame(&[]).unwrap(), Message::KeepAlive);
    }

    #[test]
    fn decodes_bitfield() {
        let payload = [ID_BITFIELD, 0b1010_0000];
        assert_eq!(
            Message::decode_frame(&payload).unwrap(),
            Message::Bitfield(vec![0b1010_0000])
        );
    }

    #[test]
    fn decodes_piece() {
        let mut payload = vec![ID_PIECE];
        payload.extend_from_slice(&1u32.to_be_bytes());
        payload.extend_from_slice(&0u32.to_be_bytes());
        payload.extend_from_slice(b"data");
        assert_eq!(
            Message::decode_frame(&payload).unwrap(),
            Message::Piece {
                index: 1,
                begin: 0,
                block: b"data".to_vec(),
            }
        );
    }

    #[test]
    fn unrecognized_id_becomes_unknown() {
        let payload = [200u8, 1, 2, 3];
        assert_eq!(
            Message::decode_frame(&payload).unwrap(),
            Message::Unknown {
                id: 200,
                payload: vec![1, 2, 3],
            }
        );
    }

    #[test]
    fn rejects_truncated_have() {
        assert!(Message::decode_frame(&[ID_HAVE, 0, 0]).is_err());
    }

    #[test]
    fn rejects_non_empty_choke_body() {
        assert!(Message::decode_frame(&[ID_CHOKE, 1]).is_err());
    }

    #[test]
    fn round_trips_through_to_bytes_and_decode_frame() {
        let message = Message::Cancel {
            index: 7,
            begin: 8,
            length: 9,
        };
        let frame = message.to_bytes();
        let payload = &frame[4..];
        assert_eq!(Message::decode_frame(payload).unwrap(), message);
    }
}
