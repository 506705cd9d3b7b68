//! Streaming envelope encoder and decoder.
//!
//! ```text
//! +----------+---------------+-------------+---------+-----------------+
//! | MAGIC 8B | resource u32  | version u32 | payload | integrity tag   |
//! |          | (big endian)  | (big endian)|   ...   | 32B (hash/MAC)  |
//! +----------+---------------+-------------+---------+-----------------+
//! ```
//!
//! The tag covers the header and the payload and is written as a trailer so
//! that both directions work in a single pass without buffering the payload.

use crate::error::{ErrorKind, Result};
use crate::hashing::{Digest, Hashing, MAC_SIZE, Mac};
use crate::resources::ResourceType;
use crate::versioning::{Version, current_version, is_supported};
use std::io::{self, Cursor, Read};

pub const MAGIC: [u8; 8] = *b"COFFER\0\0";
pub const HEADER_SIZE: usize = MAGIC.len() + 4 + 4;
const CHUNK_SIZE: usize = 8 * 1024;

fn header_bytes(resource: u32, version: u32) -> [u8; HEADER_SIZE] {
    let mut header = [0u8; HEADER_SIZE];
    header[..8].copy_from_slice(&MAGIC);
    header[8..12].copy_from_slice(&resource.to_be_bytes());
    header[12..16].copy_from_slice(&version.to_be_bytes());
    header
}

/// [`Read`]er producing the encoded form of the wrapped payload.
pub struct Sealer<R> {
    header: Cursor<[u8; HEADER_SIZE]>,
    inner: R,
    digest: Option<Box<dyn Digest>>,
    trailer: Cursor<Vec<u8>>,
}

impl<R: Read> Read for Sealer<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let n = self.header.read(buf)?;
        if n > 0 {
            return Ok(n);
        }
        if let Some(digest) = self.digest.as_mut() {
            let n = self.inner.read(buf)?;
            if n > 0 {
                digest.update(&buf[..n]);
                return Ok(n);
            }
            if let Some(digest) = self.digest.take() {
                self.trailer = Cursor::new(digest.finalize().as_bytes().to_vec());
            }
        }
        self.trailer.read(buf)
    }
}

/// Wrap `payload` into an envelope.
///
/// Nothing is read from `payload` until the returned reader is consumed.
pub fn serialize<R: Read>(hashing: &dyn Hashing, resource: ResourceType, version: Version, payload: R) -> Sealer<R> {
    let header = header_bytes(resource.tag(), version.raw());
    let mut digest = hashing.digest();
    digest.update(&header);
    Sealer {
        header: Cursor::new(header),
        inner: payload,
        digest: Some(digest),
        trailer: Cursor::new(Vec::new()),
    }
}

enum UnsealState {
    Streaming,
    Verified,
    Failed,
}

/// [`Read`]er yielding the payload of an envelope.
///
/// The last [`MAC_SIZE`] bytes of the stream are always held back; once the
/// underlying stream is exhausted they are compared against the recomputed
/// tag and a mismatch is returned as an error *instead of* end-of-file.
/// Errors carry an [`ErrorKind`] that [`ErrorKind::from_io`] recovers.
pub struct Unsealer<R> {
    inner: R,
    digest: Option<Box<dyn Digest>>,
    pending: Vec<u8>,
    eof: bool,
    state: UnsealState,
}

impl<R: Read> Unsealer<R> {
    fn fill(&mut self) -> io::Result<()> {
        let mut chunk = [0u8; CHUNK_SIZE];
        while self.pending.len() <= MAC_SIZE && !self.eof {
            match self.inner.read(&mut chunk) {
                Ok(0) => self.eof = true,
                Ok(n) => self.pending.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn verify(&mut self) -> io::Result<usize> {
        let stored = <[u8; MAC_SIZE]>::try_from(self.pending.as_slice()).ok().map(Mac::from_bytes);
        let computed = self.digest.take().map(|digest| digest.finalize());
        match (stored, computed) {
            (Some(stored), Some(computed)) if stored.verify(&computed) => {
                self.state = UnsealState::Verified;
                Ok(0)
            },
            _ => {
                tracing::warn!("Envelope integrity check failed");
                self.state = UnsealState::Failed;
                Err(ErrorKind::IntegrityMismatch.into_io())
            },
        }
    }
}

impl<R: Read> Read for Unsealer<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.state {
            UnsealState::Verified => return Ok(0),
            UnsealState::Failed => return Err(ErrorKind::IntegrityMismatch.into_io()),
            UnsealState::Streaming => {},
        }
        if buf.is_empty() {
            return Ok(0);
        }
        self.fill()?;
        if self.pending.len() > MAC_SIZE {
            let n = (self.pending.len() - MAC_SIZE).min(buf.len());
            buf[..n].copy_from_slice(&self.pending[..n]);
            if let Some(digest) = self.digest.as_mut() {
                digest.update(&buf[..n]);
            }
            self.pending.drain(..n);
            return Ok(n);
        }
        self.verify()
    }
}

/// Open an envelope, validating its header.
///
/// The payload is verified lazily while the returned reader is consumed. A
/// header naming an unregistered resource type or version is verified
/// eagerly: the whole envelope is read, and a bad trailer is reported as
/// [`ErrorKind::IntegrityMismatch`] ahead of
/// [`ErrorKind::UnsupportedVersion`].
pub fn deserialize<R: Read>(hashing: &dyn Hashing, mut encoded: R) -> Result<(ResourceType, Version, Unsealer<R>)> {
    let mut header = [0u8; HEADER_SIZE];
    if let Err(e) = encoded.read_exact(&mut header) {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            exn::bail!(ErrorKind::IntegrityMismatch);
        }
        return Err(ErrorKind::from_io(e));
    }
    if header[..8] != MAGIC {
        exn::bail!(ErrorKind::IntegrityMismatch);
    }
    let tag = u32::from_be_bytes([header[8], header[9], header[10], header[11]]);
    let raw_version = u32::from_be_bytes([header[12], header[13], header[14], header[15]]);
    let version = Version::from_raw(raw_version);
    let mut digest = hashing.digest();
    digest.update(&header);
    let mut reader = Unsealer {
        inner: encoded,
        digest: Some(digest),
        pending: Vec::with_capacity(CHUNK_SIZE + MAC_SIZE),
        eof: false,
        state: UnsealState::Streaming,
    };
    match ResourceType::from_tag(tag).filter(|resource| is_supported(*resource, version)) {
        Some(resource) => Ok((resource, version, reader)),
        None => {
            // An unknown (type, version) pair is only reported once the
            // trailer vouches for the header.
            io::copy(&mut reader, &mut io::sink()).map_err(ErrorKind::from_io)?;
            exn::bail!(ErrorKind::UnsupportedVersion { resource: tag, version: raw_version })
        },
    }
}

/// Encode an in-memory payload at the current version of its resource type.
pub fn seal(hashing: &dyn Hashing, resource: ResourceType, payload: &[u8]) -> Vec<u8> {
    let mut encoded = Vec::with_capacity(HEADER_SIZE + payload.len() + MAC_SIZE);
    // Reading from a slice and writing into a Vec cannot fail.
    let mut sealer = serialize(hashing, resource, current_version(resource), payload);
    let _ = sealer.read_to_end(&mut encoded);
    encoded
}

/// Decode an in-memory envelope, returning the fully verified payload.
pub fn unseal(hashing: &dyn Hashing, encoded: &[u8]) -> Result<(ResourceType, Version, Vec<u8>)> {
    let (resource, version, mut reader) = deserialize(hashing, encoded)?;
    let mut payload = Vec::with_capacity(encoded.len().saturating_sub(HEADER_SIZE + MAC_SIZE));
    reader.read_to_end(&mut payload).map_err(ErrorKind::from_io)?;
    Ok((resource, version, payload))
}

/// Like [`unseal`], but also requires the envelope to hold `expected`.
pub fn unseal_as(hashing: &dyn Hashing, expected: ResourceType, encoded: &[u8]) -> Result<(Version, Vec<u8>)> {
    let (resource, version, payload) = unseal(hashing, encoded)?;
    if resource != expected {
        exn::bail!(ErrorKind::ResourceMismatch { expected: expected.as_str(), found: resource.as_str() });
    }
    Ok((version, payload))
}
