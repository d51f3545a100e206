//! Torrent metainfo: a typed view over a decoded bencode dictionary.
//!
//! A `Metainfo` owns the pieces digest, the file layout (single- or
//! multi-file) and the handful of top-level keys (`announce`, `comment`,
//! `creation date`). Its info-hash is a pure function of the `info`
//! sub-dictionary's canonical bencoding, which is why every mutation here
//! goes through the same `info_bvalue` builder that `info_hash` hashes.

mod error;

pub use error::FileError;

use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use sha1::{Digest, Sha1};
use tracing::{debug, instrument};

use crate::bencode::{self, BValue};

const DEFAULT_PIECE_LENGTH: i64 = 262_144;
const DIGEST_LEN: usize = 20;

/// One file within a multi-file torrent, or the synthetic single entry
/// `files()` returns for a single-file torrent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub path: Vec<String>,
    pub length: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Layout {
    SingleFile { length: u64 },
    MultiFile { files: Vec<FileEntry> },
    Empty,
}

#[derive(Debug, Clone)]
pub struct Metainfo {
    announce: Option<String>,
    comment: Option<String>,
    creation_date: Option<i64>,
    name: Option<String>,
    piece_length: i64,
    pieces: Vec<u8>,
    layout: Layout,
}

impl Metainfo {
    /// A fresh metainfo with the defaults the original spec calls for:
    /// a 256 KiB piece length, no files, no announce URL yet.
    pub fn new() -> Self {
        Metainfo {
            announce: None,
            comment: None,
            creation_date: Some(now_posix()),
            name: None,
            piece_length: DEFAULT_PIECE_LENGTH,
            pieces: Vec::new(),
            layout: Layout::Empty,
        }
    }

    /// Reads `path` and decodes it as bencode if it exists; otherwise
    /// returns a fresh, empty metainfo so callers can start building one.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, FileError> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("no existing metainfo at this path, starting fresh");
            return Ok(Metainfo::new());
        }
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    /// Decodes an in-memory bencoded metainfo dictionary.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FileError> {
        let top = bencode::decode(bytes)?;
        let announce = top
            .get("announce")
            .and_then(BValue::as_bytes)
            .map(|b| String::from_utf8_lossy(b).into_owned());
        let comment = top
            .get("comment")
            .and_then(BValue::as_bytes)
            .map(|b| String::from_utf8_lossy(b).into_owned());
        let creation_date = top.get("creation date").and_then(BValue::as_integer);

        let info = top.get("info").ok_or(FileError::MissingInfo)?;
        let name = info
            .get("name")
            .and_then(BValue::as_bytes)
            .map(|b| String::from_utf8_lossy(b).into_owned());
        let piece_length = info
            .get("piece length")
            .and_then(BValue::as_integer)
            .ok_or(FileError::MissingField { key: "piece length" })?;
        let pieces = info
            .get("pieces")
            .and_then(BValue::as_bytes)
            .ok_or(FileError::MissingField { key: "pieces" })?
            .to_vec();
        if pieces.len() % DIGEST_LEN != 0 {
            return Err(FileError::InvalidPiecesLength { len: pieces.len() });
        }

        let layout = if let Some(files) = info.get("files").and_then(BValue::as_list) {
            let mut entries = Vec::with_capacity(files.len());
            for file in files {
                let length = file
                    .get("length")
                    .and_then(BValue::as_integer)
                    .ok_or(FileError::MissingField { key: "length" })? as u64;
                let path_segments = file
                    .get("path")
                    .and_then(BValue::as_list)
                    .ok_or(FileError::MissingField { key: "path" })?
                    .iter()
                    .map(|segment| {
                        segment
                            .as_bytes()
                            .map(|b| String::from_utf8_lossy(b).into_owned())
                            .ok_or(FileError::InvalidFieldType { key: "path" })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                entries.push(FileEntry {
                    path: path_segments,
                    length,
                });
            }
            Layout::MultiFile { files: entries }
        } else if let Some(length) = info.get("length").and_then(BValue::as_integer) {
            Layout::SingleFile {
                length: length as u64,
            }
        } else {
            Layout::Empty
        };

        Ok(Metainfo {
            announce,
            comment,
            creation_date,
            name,
            piece_length,
            pieces,
            layout,
        })
    }

    pub fn announce(&self) -> Option<&str> {
        self.announce.as_deref()
    }

    pub fn set_announce(&mut self, url: impl Into<String>) {
        self.announce = Some(url.into());
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    pub fn creation_date(&self) -> Option<SystemTime> {
        self.creation_date
            .map(|secs| UNIX_EPOCH + std::time::Duration::from_secs(secs.max(0) as u64))
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn piece_length(&self) -> i64 {
        self.piece_length
    }

    /// The `pieces` byte-string sliced into successive 20-byte digests.
    pub fn pieces(&self) -> impl Iterator<Item = &[u8]> {
        self.pieces.chunks(DIGEST_LEN)
    }

    /// A flat list of every file in the torrent. For a single-file torrent
    /// this is a single synthetic entry whose path is just the torrent name.
    pub fn files(&self) -> Vec<FileEntry> {
        match &self.layout {
            Layout::Empty => Vec::new(),
            Layout::SingleFile { length } => vec![FileEntry {
                path: vec![self.name.clone().unwrap_or_default()],
                length: *length,
            }],
            Layout::MultiFile { files } => files.clone(),
        }
    }

    pub fn total_length(&self) -> u64 {
        self.files().iter().map(|f| f.length).sum()
    }

    /// SHA-1 of the canonical bencoding of the `info` sub-dictionary — the
    /// torrent's identity. Fails if no file has been added yet.
    #[instrument(skip_all)]
    pub fn info_hash(&self) -> Result<[u8; DIGEST_LEN], FileError> {
        if matches!(self.layout, Layout::Empty) {
            return Err(FileError::MissingInfo);
        }
        let encoded = bencode::encode(&self.info_bvalue()?);
        let digest = Sha1::digest(&encoded);
        let mut out = [0u8; DIGEST_LEN];
        out.copy_from_slice(&digest);
        Ok(out)
    }

    fn info_bvalue(&self) -> Result<BValue, FileError> {
        let mut info = BValue::dict();
        info.insert(
            "name",
            BValue::bytes(self.name.clone().unwrap_or_default().into_bytes()),
        );
        info.insert("piece length", BValue::integer(self.piece_length));
        info.insert("pieces", BValue::bytes(self.pieces.clone()));
        match &self.layout {
            Layout::Empty => return Err(FileError::MissingInfo),
            Layout::SingleFile { length } => {
                info.insert("length", BValue::integer(*length as i64));
            }
            Layout::MultiFile { files } => {
                let list = files
                    .iter()
                    .map(|file| {
                        let mut entry = BValue::dict();
                        entry.insert("length", BValue::integer(file.length as i64));
                        entry.insert(
                            "path",
                            BValue::list(
                                file.path
                                    .iter()
                                    .map(|segment| BValue::bytes(segment.clone().into_bytes()))
                                    .collect(),
                            ),
                        );
                        entry
                    })
                    .collect();
                info.insert("files", BValue::list(list));
            }
        }
        Ok(info)
    }

    fn top_bvalue(&self) -> Result<BValue, FileError> {
        let mut top = BValue::dict();
        if let Some(announce) = &self.announce {
            top.insert("announce", BValue::bytes(announce.clone().into_bytes()));
        }
        if let Some(comment) = &self.comment {
            top.insert("comment", BValue::bytes(comment.clone().into_bytes()));
        }
        if let Some(date) = self.creation_date {
            top.insert("creation date", BValue::integer(date));
        }
        top.insert("info", self.info_bvalue()?);
        Ok(top)
    }

    /// Hashes `path` into `piece_length`-sized SHA-1 digests and appends
    /// them to the torrent, migrating single-file layouts to multi-file on
    /// the second call and initializing an empty metainfo on the first.
    #[instrument(skip(self), fields(path = %path.as_ref().display()))]
    pub fn add_file(&mut self, path: impl AsRef<Path>) -> Result<(), FileError> {
        if self.piece_length <= 0 {
            return Err(FileError::InvalidPieceLength);
        }
        let path = path.as_ref();
        if !path.exists() {
            return Err(FileError::FileNotFound(path.to_path_buf()));
        }
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let (length, digests) = hash_file(path, self.piece_length as u64)?;
        self.pieces.extend(digests.into_iter().flatten());

        self.layout = match std::mem::replace(&mut self.layout, Layout::Empty) {
            Layout::Empty => {
                self.name = Some(file_name);
                Layout::SingleFile { length }
            }
            Layout::SingleFile {
                length: existing_length,
            } => {
                let mut files = vec![FileEntry {
                    path: vec![self.name.clone().unwrap_or_default()],
                    length: existing_length,
                }];
                files.push(FileEntry {
                    path: vec![file_name],
                    length,
                });
                Layout::MultiFile { files }
            }
            Layout::MultiFile { mut files } => {
                files.push(FileEntry {
                    path: vec![file_name],
                    length,
                });
                Layout::MultiFile { files }
            }
        };
        Ok(())
    }

    /// Removes `path` (matched against a file's joined path segments) from
    /// the torrent, rebuilding `pieces` by dropping that file's per-file
    /// digest range. Collapses back to single-file form when exactly one
    /// file remains. A path that isn't present is a silent no-op.
    #[instrument(skip(self))]
    pub fn remove_file(&mut self, path: &[String]) -> Result<(), FileError> {
        match std::mem::replace(&mut self.layout, Layout::Empty) {
            Layout::Empty => {
                self.layout = Layout::Empty;
            }
            Layout::SingleFile { length } => {
                let matches = self.name.as_deref() == path.last().map(|s| s.as_str());
                if matches && path.len() == 1 {
                    self.name = None;
                    self.pieces.clear();
                    self.layout = Layout::Empty;
                } else {
                    self.layout = Layout::SingleFile { length };
                }
            }
            Layout::MultiFile { files } => {
                let piece_length = self.piece_length as u64;
                let mut offset_digests = 0usize;
                let mut new_pieces = Vec::with_capacity(self.pieces.len());
                let mut remaining = Vec::with_capacity(files.len());
                for file in files {
                    let digest_count = div_ceil(file.length, piece_length) as usize;
                    let start = offset_digests * DIGEST_LEN;
                    let end = start + digest_count * DIGEST_LEN;
                    if file.path == path {
                        // dropped: its digest range is skipped entirely.
                    } else {
                        new_pieces.extend_from_slice(&self.pieces[start..end.min(self.pieces.len())]);
                        remaining.push(file);
                    }
                    offset_digests += digest_count;
                }
                self.pieces = new_pieces;
                self.layout = match remaining.len() {
                    0 => {
                        self.name = None;
                        Layout::Empty
                    }
                    1 => {
                        let only = remaining.into_iter().next().unwrap();
                        self.name = only.path.last().cloned();
                        Layout::SingleFile { length: only.length }
                    }
                    _ => Layout::MultiFile { files: remaining },
                };
            }
        }
        Ok(())
    }

    /// Serializes to canonical bencode and writes it to `path`.
    #[instrument(skip(self), fields(path = %path.as_ref().display()))]
    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), FileError> {
        let encoded = bencode::encode(&self.top_bvalue()?);
        std::fs::write(path, encoded)?;
        Ok(())
    }
}

impl Default for Metainfo {
    fn default() -> Self {
        Metainfo::new()
    }
}

fn div_ceil(numerator: u64, denominator: u64) -> u64 {
    if denominator == 0 {
        0
    } else {
        (numerator + denominator - 1) / denominator
    }
}

fn hash_file(path: &Path, piece_length: u64) -> Result<(u64, Vec<[u8; DIGEST_LEN]>), FileError> {
    let mut file = std::fs::File::open(path)?;
    let mut digests = Vec::new();
    let mut total = 0u64;
    let mut buffer = vec![0u8; piece_length as usize];
    loop {
        let mut filled = 0usize;
        while filled < buffer.len() {
            let read = file.read(&mut buffer[filled..])?;
            if read == 0 {
                break;
            }
            filled += read;
        }
        if filled == 0 {
            break;
        }
        let digest = Sha1::digest(&buffer[..filled]);
        let mut out = [0u8; DIGEST_LEN];
        out.copy_from_slice(&digest);
        digests.push(out);
        total += filled as u64;
        if filled < buffer.len() {
            break;
        }
    }
    Ok((total, digests))
}

fn now_posix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
