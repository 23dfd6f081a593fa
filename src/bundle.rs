//! Blob header codec.
//!
//! Every stored blob begins with a small fixed-size prelude declaring the
//! length of the header that follows; the header carries an ordered list of
//! "import" entries, the blob's direct outgoing references. The garbage
//! collector needs nothing else from the format: it reads a growable prefix
//! of the blob (see [`INITIAL_PREFIX_LEN`]), decodes the prelude, and if the
//! declared header length exceeds what was fetched, refetches exactly
//! `PRELUDE_LEN + header_len` bytes. Large blob payloads are never read.
//!
//! # Layout
//!
//! ```text
//! prelude:  magic "BSWB" (4) | header_len u32-LE (4)
//! header:   import_count u32-LE (4)
//!           repeated: host_len u16-LE (2) | host bytes | blob hash (32)
//! payload:  opaque, not read by the GC
//! ```

use crate::models::{BlobId, BlobLocator, Hash};
use crate::{Error, Result};

/// Magic bytes opening every blob.
pub const MAGIC: [u8; 4] = *b"BSWB";

/// Size of the fixed prelude in bytes.
pub const PRELUDE_LEN: usize = 8;

/// Initial prefix fetch size when extracting imports (64 KiB).
///
/// Large enough that almost every header fits in one read.
pub const INITIAL_PREFIX_LEN: usize = 64 * 1024;

/// Upper bound on a sane header length; guards against garbage preludes.
const MAX_HEADER_LEN: usize = 64 * 1024 * 1024;

fn read_u32(bytes: &[u8], offset: usize) -> Result<u32> {
    let end = offset
        .checked_add(4)
        .filter(|end| *end <= bytes.len())
        .ok_or_else(|| Error::InvalidHeader(format!("truncated u32 at offset {offset}")))?;
    let raw: [u8; 4] = bytes[offset..end]
        .try_into()
        .map_err(|_| Error::InvalidHeader(format!("truncated u32 at offset {offset}")))?;
    Ok(u32::from_le_bytes(raw))
}

fn read_u16(bytes: &[u8], offset: usize) -> Result<u16> {
    let end = offset
        .checked_add(2)
        .filter(|end| *end <= bytes.len())
        .ok_or_else(|| Error::InvalidHeader(format!("truncated u16 at offset {offset}")))?;
    let raw: [u8; 2] = bytes[offset..end]
        .try_into()
        .map_err(|_| Error::InvalidHeader(format!("truncated u16 at offset {offset}")))?;
    Ok(u16::from_le_bytes(raw))
}

/// Decodes the prelude and returns the declared header length in bytes
/// (the region immediately following the prelude).
///
/// # Errors
///
/// Returns [`Error::InvalidHeader`] if the prefix is shorter than
/// [`PRELUDE_LEN`], the magic does not match, or the declared length is
/// implausibly large.
pub fn read_prelude_length(bytes: &[u8]) -> Result<usize> {
    if bytes.len() < PRELUDE_LEN {
        return Err(Error::InvalidHeader(format!(
            "prefix too short for prelude: {} bytes",
            bytes.len()
        )));
    }
    if bytes[..4] != MAGIC {
        return Err(Error::InvalidHeader("bad magic".to_string()));
    }
    let header_len = read_u32(bytes, 4)? as usize;
    if header_len > MAX_HEADER_LEN {
        return Err(Error::InvalidHeader(format!(
            "declared header length {header_len} exceeds maximum"
        )));
    }
    Ok(header_len)
}

/// Parses the header region (the bytes immediately after the prelude) into
/// the ordered list of import locators.
///
/// # Errors
///
/// Returns [`Error::InvalidHeader`] on any truncation or malformed entry.
pub fn parse_header(header: &[u8]) -> Result<Vec<BlobLocator>> {
    let count = read_u32(header, 0)? as usize;
    let mut imports = Vec::with_capacity(count.min(4096));
    let mut offset = 4;

    for index in 0..count {
        let host_len = read_u16(header, offset)? as usize;
        offset += 2;

        let host_end = offset
            .checked_add(host_len)
            .filter(|end| *end <= header.len())
            .ok_or_else(|| Error::InvalidHeader(format!("truncated host in import {index}")))?;
        let host = std::str::from_utf8(&header[offset..host_end])
            .map_err(|_| Error::InvalidHeader(format!("non-utf8 host in import {index}")))?
            .to_string();
        offset = host_end;

        let hash_end = offset
            .checked_add(32)
            .filter(|end| *end <= header.len())
            .ok_or_else(|| Error::InvalidHeader(format!("truncated hash in import {index}")))?;
        let raw: [u8; 32] = header[offset..hash_end]
            .try_into()
            .map_err(|_| Error::InvalidHeader(format!("truncated hash in import {index}")))?;
        offset = hash_end;

        imports.push(BlobLocator::new(host, BlobId::new(Hash::from_bytes(raw))));
    }

    Ok(imports)
}

/// Encodes a prelude + header for the given imports.
///
/// Used by uploaders and test fixtures; the returned bytes are the blob's
/// prefix, with the opaque payload appended after it.
#[must_use]
pub fn encode_header(imports: &[BlobLocator]) -> Vec<u8> {
    let mut header = Vec::new();
    header.extend_from_slice(&u32::try_from(imports.len()).unwrap_or(u32::MAX).to_le_bytes());
    for import in imports {
        let host = import.host.as_bytes();
        header.extend_from_slice(&u16::try_from(host.len()).unwrap_or(u16::MAX).to_le_bytes());
        header.extend_from_slice(host);
        header.extend_from_slice(import.blob_id.hash().as_bytes());
    }

    let mut bytes = Vec::with_capacity(PRELUDE_LEN + header.len());
    bytes.extend_from_slice(&MAGIC);
    bytes.extend_from_slice(&u32::try_from(header.len()).unwrap_or(u32::MAX).to_le_bytes());
    bytes.extend_from_slice(&header);
    bytes
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    fn locator(host: &str, content: &[u8]) -> BlobLocator {
        BlobLocator::new(host, BlobId::from_content(content))
    }

    #[test]
    fn test_encode_parse_round_trip() {
        let imports = vec![locator("store-01", b"a"), locator("store-02", b"b")];
        let bytes = encode_header(&imports);

        let header_len = read_prelude_length(&bytes).expect("valid prelude");
        assert_eq!(bytes.len(), PRELUDE_LEN + header_len);

        let parsed = parse_header(&bytes[PRELUDE_LEN..]).expect("valid header");
        assert_eq!(parsed, imports);
    }

    #[test]
    fn test_empty_import_list() {
        let bytes = encode_header(&[]);
        let header_len = read_prelude_length(&bytes).expect("valid prelude");
        let parsed = parse_header(&bytes[PRELUDE_LEN..header_len + PRELUDE_LEN]).expect("valid");
        assert!(parsed.is_empty());
    }

    #[test]
    fn test_bad_magic_rejected() {
        let mut bytes = encode_header(&[]);
        bytes[0] = b'X';
        assert!(read_prelude_length(&bytes).is_err());
    }

    #[test]
    fn test_short_prefix_rejected() {
        assert!(read_prelude_length(&[0u8; 3]).is_err());
    }

    #[test]
    fn test_truncated_header_rejected() {
        let imports = vec![locator("store-01", b"a")];
        let bytes = encode_header(&imports);
        // Drop the last byte of the hash.
        let truncated = &bytes[PRELUDE_LEN..bytes.len() - 1];
        assert!(parse_header(truncated).is_err());
    }

    #[test]
    fn test_implausible_header_length_rejected() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&MAGIC);
        bytes.extend_from_slice(&u32::MAX.to_le_bytes());
        assert!(read_prelude_length(&bytes).is_err());
    }
}
