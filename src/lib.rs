//! BitTorrent v1 building blocks: a byte-safe bencode codec, metainfo
//! (`.torrent`) construction and mutation, a dual-transport tracker client,
//! and a blocking peer wire session.
//!
//! The four modules are independent and compose the way a download manager
//! would: decode or build a [`metainfo::Metainfo`], derive its info-hash,
//! announce it through [`tracker::TrackerClient`] to get a peer list, then
//! open a [`peer::PeerSession`] per peer.

pub mod bencode;
pub mod metainfo;
pub mod peer;
pub mod tracker;

pub use bencode::{BValue, BencodeError};
pub use metainfo::{FileEntry, FileError, Metainfo};
pub use peer::{Bitfield, Handshake, Message, PeerError, PeerSession, PeerSessionConfig};
pub use tracker::{
    AnnounceRequest, AnnounceResponse, Event as TrackerEvent, PeerAddr, TrackerClient,
    TrackerConfig, TrackerError,
};
