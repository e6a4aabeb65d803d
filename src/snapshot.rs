// https://rdb.fnordig.de/file_format.html

use bytes::Bytes;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use thiserror::Error as ThisError;
use tracing::{debug, warn};

use crate::config::Config;

/// `REDIS` magic string followed by a four digit version, e.g. `REDIS0011`.
const HEADER_LEN: usize = 9;

// Opcodes understood by the reader. Any other byte met before the records is skipped.
const OPCODE_EOF: u8 = 0xFF;
const OPCODE_SELECTDB: u8 = 0xFE;
const OPCODE_RESIZEDB: u8 = 0xFB;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("snapshot read failed: {0}")]
    Io(#[from] io::Error),
    #[error("unsupported special length encoding {0:#04x}")]
    UnsupportedEncoding(u8),
}

/// Read-only access to the on-disk snapshot. Every call opens the file again and walks it from
/// the start, nothing is cached between calls.
///
/// A missing, unreadable or corrupt snapshot is not an error for callers: lookups simply find
/// nothing.
#[derive(Debug, Clone)]
pub struct Snapshot {
    path: Option<PathBuf>,
}

impl Snapshot {
    pub fn new(config: &Config) -> Snapshot {
        Snapshot {
            path: config.snapshot_path(),
        }
    }

    pub fn from_path(path: impl Into<PathBuf>) -> Snapshot {
        Snapshot {
            path: Some(path.into()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Returns the value stored under `key`, if the snapshot has it.
    pub fn lookup(&self, key: &[u8]) -> Option<Bytes> {
        let reader = self.open()?;
        self.soften(reader.lookup(key))
    }

    /// Returns the key of the first record in the snapshot.
    pub fn first_key(&self) -> Option<Bytes> {
        let reader = self.open()?;
        self.soften(reader.first_key())
    }

    fn open(&self) -> Option<SnapshotReader<BufReader<File>>> {
        let Some(path) = self.path.as_deref() else {
            debug!("Snapshot directory or file name is not set");
            return None;
        };

        match File::open(path) {
            Ok(file) => Some(SnapshotReader::new(BufReader::new(file))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("Snapshot file not found: {}", path.display());
                None
            }
            Err(e) => {
                warn!("Failed to open snapshot file {}: {}", path.display(), e);
                None
            }
        }
    }

    fn soften<T>(&self, result: Result<Option<T>, Error>) -> Option<T> {
        result.unwrap_or_else(|e| {
            let path = self.path.as_deref().unwrap_or(Path::new(""));
            warn!("Failed to decode snapshot file {}: {}", path.display(), e);
            None
        })
    }
}

/// Walks the snapshot format over any byte source:
///
/// ```text
/// <5 byte magic><4 byte version>
/// (FE <db index> | <other metadata bytes>)*
/// FB <length: hash table size> <length: expiry table size>
/// (<length-prefixed key> <length-prefixed value>)*
/// FF
/// ```
///
/// Only plain string records are understood.
pub struct SnapshotReader<R> {
    reader: R,
}

impl<R: Read> SnapshotReader<R> {
    pub fn new(reader: R) -> SnapshotReader<R> {
        SnapshotReader { reader }
    }

    pub fn lookup(mut self, key: &[u8]) -> Result<Option<Bytes>, Error> {
        if !self.seek_records()? {
            return Ok(None);
        }

        while let Some(record_key) = self.next_key()? {
            if record_key == key {
                return self.read_value().map(Some);
            }
            self.skip_value()?;
        }

        Ok(None)
    }

    pub fn first_key(mut self) -> Result<Option<Bytes>, Error> {
        if !self.seek_records()? {
            return Ok(None);
        }

        self.next_key()
    }

    /// Consumes the header and the metadata opcodes. Returns `false` when the file ends before a
    /// record region starts.
    fn seek_records(&mut self) -> Result<bool, Error> {
        let mut header = [0u8; HEADER_LEN];
        self.reader.read_exact(&mut header)?;

        while let Some(opcode) = self.read_byte()? {
            match opcode {
                OPCODE_EOF => return Ok(false),
                OPCODE_SELECTDB => {
                    self.expect_byte()?;
                }
                OPCODE_RESIZEDB => {
                    let _hash_table_size = self.read_length()?;
                    let _expiry_table_size = self.read_length()?;
                    return Ok(true);
                }
                _ => {}
            }
        }

        Ok(false)
    }

    /// Reads the next record key, or `None` at the end of the records.
    fn next_key(&mut self) -> Result<Option<Bytes>, Error> {
        match self.read_byte()? {
            None | Some(OPCODE_EOF) => Ok(None),
            Some(first) => {
                let length = decode_length(first, &mut self.reader)?;
                self.read_exact_bytes(length).map(Some)
            }
        }
    }

    fn read_value(&mut self) -> Result<Bytes, Error> {
        let length = self.read_length()?;
        self.read_exact_bytes(length)
    }

    fn skip_value(&mut self) -> Result<(), Error> {
        let length = self.read_length()?;
        let skipped = io::copy(&mut (&mut self.reader).take(length as u64), &mut io::sink())?;

        if skipped != length as u64 {
            return Err(unexpected_eof().into());
        }
        Ok(())
    }

    fn read_length(&mut self) -> Result<usize, Error> {
        let first = self.expect_byte()?;
        decode_length(first, &mut self.reader)
    }

    fn read_exact_bytes(&mut self, length: usize) -> Result<Bytes, Error> {
        // The length comes from the file, so the buffer grows with the data actually read instead
        // of being allocated up front.
        let mut buf = Vec::new();
        (&mut self.reader).take(length as u64).read_to_end(&mut buf)?;

        if buf.len() != length {
            return Err(unexpected_eof().into());
        }
        Ok(Bytes::from(buf))
    }

    fn expect_byte(&mut self) -> Result<u8, Error> {
        self.read_byte()?.ok_or_else(|| unexpected_eof().into())
    }

    fn read_byte(&mut self) -> Result<Option<u8>, Error> {
        let mut byte = [0u8; 1];
        loop {
            match self.reader.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(byte[0])),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// Decodes a length whose first byte is `first`, reading any further bytes from `reader`.
///
/// The two most significant bits of `first` select the format:
///
/// * `00`: the remaining 6 bits are the length.
/// * `01`: the remaining 6 bits and the next byte form a 14 bit length.
/// * `10`: the next 4 bytes are a big endian 32 bit length.
/// * `11`: a special encoding, not supported.
pub fn decode_length<R: Read>(first: u8, reader: &mut R) -> Result<usize, Error> {
    match first >> 6 {
        0b00 => Ok((first & 0b0011_1111) as usize),
        0b01 => {
            let mut next = [0u8; 1];
            reader.read_exact(&mut next)?;
            Ok((((first & 0b0011_1111) as usize) << 8) | next[0] as usize)
        }
        0b10 => {
            let mut next = [0u8; 4];
            reader.read_exact(&mut next)?;
            Ok(u32::from_be_bytes(next) as usize)
        }
        _ => Err(Error::UnsupportedEncoding(first)),
    }
}

fn unexpected_eof() -> io::Error {
    io::Error::new(io::ErrorKind::UnexpectedEof, "snapshot is truncated")
}
