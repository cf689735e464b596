//! Durable snapshots of a run.
//!
//! Layout, little endian:
//!
//! ```text
//! "SMCK" | version u8 | header length u32 | header JSON
//!        | record count u64 | (outcome u32, count u64, example u64)*
//!        | XxHash64 of everything before it, u64
//! ```
//!
//! The JSON header carries the leaf count, the walk cursor and the scope.

use crate::CheckpointStore;
use crate::aggregate::{AggregateRecord, Aggregator};
use crate::codec::{OutcomeCode, TraversalCode};
use crate::tree::{Cursor, Scope};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::hash::Hasher;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use twox_hash::XxHash64;

pub const MAGIC: [u8; 4] = *b"SMCK";
pub const FORMAT_VERSION: u8 = 1;

const RECORD_BYTES: usize = 4 + 8 + 8;
const FIXED_BYTES: usize = MAGIC.len() + 1 + 4 + 8 + 8;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("checkpoint I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("checkpoint is corrupt: {reason}")]
    Corrupt { reason: String },
    #[error("unsupported checkpoint version {found} (expected {})", FORMAT_VERSION)]
    UnsupportedVersion { found: u8 },
    #[error("checkpoint header could not be encoded: {0}")]
    Encode(serde_json::Error),
}

impl CheckpointError {
    fn corrupt(reason: impl Into<String>) -> Self {
        Self::Corrupt {
            reason: reason.into(),
        }
    }

    /// True for damage that a fresh start can recover from.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Corrupt { .. } | Self::UnsupportedVersion { .. }
        )
    }
}

#[derive(Serialize, Deserialize)]
struct Header {
    leaves: u64,
    cursor: Cursor,
    scope: Scope,
}

/// Everything needed to continue a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Checkpoint {
    /// Leaves counted so far; always the aggregator total.
    pub leaves: u64,
    pub cursor: Cursor,
    pub scope: Scope,
    pub aggregator: Aggregator,
}

impl Checkpoint {
    /// A run that has not emitted anything yet.
    #[must_use]
    pub fn fresh(scope: Scope) -> Self {
        Self {
            scope,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.cursor.is_done()
    }

    /// Serialises to the binary layout.
    ///
    /// # Errors
    ///
    /// Returns `CheckpointError::Encode` if the header cannot be written.
    pub fn encode(&self) -> Result<Vec<u8>, CheckpointError> {
        let header = serde_json::to_vec(&Header {
            leaves: self.leaves,
            cursor: self.cursor.clone(),
            scope: self.scope.clone(),
        })
        .map_err(CheckpointError::Encode)?;
        let header_len = u32::try_from(header.len())
            .map_err(|_| CheckpointError::corrupt("header longer than 4 GiB"))?;

        let mut out =
            Vec::with_capacity(FIXED_BYTES + header.len() + self.aggregator.len() * RECORD_BYTES);
        out.extend_from_slice(&MAGIC);
        out.push(FORMAT_VERSION);
        out.extend_from_slice(&header_len.to_le_bytes());
        out.extend_from_slice(&header);
        out.extend_from_slice(&(self.aggregator.len() as u64).to_le_bytes());
        for (code, record) in self.aggregator.iter() {
            out.extend_from_slice(&code.raw().to_le_bytes());
            out.extend_from_slice(&record.count.to_le_bytes());
            out.extend_from_slice(&record.example.raw().to_le_bytes());
        }
        let digest = checksum(&out);
        out.extend_from_slice(&digest.to_le_bytes());
        Ok(out)
    }

    /// Parses and validates the binary layout.
    ///
    /// # Errors
    ///
    /// Returns `CheckpointError::UnsupportedVersion` for another format
    /// version and `CheckpointError::Corrupt` for anything else amiss.
    pub fn decode(bytes: &[u8]) -> Result<Self, CheckpointError> {
        if bytes.len() < FIXED_BYTES {
            return Err(CheckpointError::corrupt(format!(
                "truncated to {} bytes",
                bytes.len()
            )));
        }
        let mut reader = Reader::new(bytes);
        if reader.take(MAGIC.len())? != MAGIC {
            return Err(CheckpointError::corrupt("bad magic"));
        }
        let version = reader.u8()?;
        if version != FORMAT_VERSION {
            return Err(CheckpointError::UnsupportedVersion { found: version });
        }

        let (body, stored) = bytes.split_at(bytes.len() - 8);
        let stored = u64::from_le_bytes(
            stored
                .try_into()
                .map_err(|_| CheckpointError::corrupt("missing checksum"))?,
        );
        if checksum(body) != stored {
            return Err(CheckpointError::corrupt("checksum mismatch"));
        }
        let mut reader = Reader::new(body);
        reader.take(MAGIC.len() + 1)?;

        let header_len = reader.u32()? as usize;
        let header: Header = serde_json::from_slice(reader.take(header_len)?)
            .map_err(|err| CheckpointError::corrupt(format!("header: {err}")))?;

        let count = usize::try_from(reader.u64()?)
            .map_err(|_| CheckpointError::corrupt("record count overflows"))?;
        let expected = count
            .checked_mul(RECORD_BYTES)
            .ok_or_else(|| CheckpointError::corrupt("record count overflows"))?;
        if reader.remaining() != expected {
            return Err(CheckpointError::corrupt(format!(
                "{count} records need {expected} bytes, found {}",
                reader.remaining()
            )));
        }

        let mut records = Vec::with_capacity(count);
        for _ in 0..count {
            let outcome = OutcomeCode::new(reader.u32()?)
                .map_err(|err| CheckpointError::corrupt(err.to_string()))?;
            let count = reader.u64()?;
            let example = TraversalCode::new(reader.u64()?)
                .map_err(|err| CheckpointError::corrupt(err.to_string()))?;
            if count == 0 {
                return Err(CheckpointError::corrupt(format!(
                    "outcome {outcome} has a zero count"
                )));
            }
            records.push((outcome, AggregateRecord { count, example }));
        }
        let aggregator = Aggregator::from_sorted(records)
            .ok_or_else(|| CheckpointError::corrupt("records out of order"))?;
        if aggregator.total() != header.leaves {
            return Err(CheckpointError::corrupt(format!(
                "header says {} leaves, records sum to {}",
                header.leaves,
                aggregator.total()
            )));
        }

        Ok(Self {
            leaves: header.leaves,
            cursor: header.cursor,
            scope: header.scope,
            aggregator,
        })
    }
}

fn checksum(bytes: &[u8]) -> u64 {
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(bytes);
    hasher.finish()
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    const fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CheckpointError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| CheckpointError::corrupt("unexpected end of data"))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], CheckpointError> {
        self.take(N)?
            .try_into()
            .map_err(|_| CheckpointError::corrupt("unexpected end of data"))
    }

    fn u8(&mut self) -> Result<u8, CheckpointError> {
        Ok(self.array::<1>()?[0])
    }

    fn u32(&mut self) -> Result<u32, CheckpointError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn u64(&mut self) -> Result<u64, CheckpointError> {
        Ok(u64::from_le_bytes(self.array()?))
    }
}

/// Checkpoint file replaced atomically on every save.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

impl CheckpointStore for FileStore {
    fn save(&mut self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        let bytes = checkpoint.encode()?;
        let temp = self.temp_path();
        {
            let mut file = File::create(&temp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        fs::rename(&temp, &self.path)?;
        Ok(())
    }

    fn load(&self) -> Result<Option<Checkpoint>, CheckpointError> {
        match fs::read(&self.path) {
            Ok(bytes) => Checkpoint::decode(&bytes).map(Some),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn clear(&mut self) -> Result<(), CheckpointError> {
        for path in [self.path.clone(), self.temp_path()] {
            match fs::remove_file(&path) {
                Err(err) if err.kind() != ErrorKind::NotFound => return Err(err.into()),
                _ => {}
            }
        }
        Ok(())
    }
}

/// In-memory store holding the encoded bytes of the latest save.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    bytes: Option<Vec<u8>>,
    saves: usize,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds `bytes`, valid or not.
    #[must_use]
    pub const fn with_bytes(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Some(bytes),
            saves: 0,
        }
    }

    #[must_use]
    pub fn bytes(&self) -> Option<&[u8]> {
        self.bytes.as_deref()
    }

    /// Number of successful saves.
    #[must_use]
    pub const fn saves(&self) -> usize {
        self.saves
    }
}

impl CheckpointStore for MemoryStore {
    fn save(&mut self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        self.bytes = Some(checkpoint.encode()?);
        self.saves += 1;
        Ok(())
    }

    fn load(&self) -> Result<Option<Checkpoint>, CheckpointError> {
        self.bytes.as_deref().map(Checkpoint::decode).transpose()
    }

    fn clear(&mut self) -> Result<(), CheckpointError> {
        self.bytes = None;
        Ok(())
    }
}
