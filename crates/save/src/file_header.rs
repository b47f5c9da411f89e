//! Save file header: magic bytes, version, flags, dimensions, checksum.
//!
//! Header layout (36 bytes, fixed-size, little-endian):
//!
//! ```text
//! [0..4]   magic "ICTY"
//! [4..8]   format version (u32)
//! [8..12]  flags (u32; bit 0 = lz4-compressed payload)
//! [12..16] world width (i32)
//! [16..20] world height (i32)
//! [20..28] world seed (u64)
//! [28..32] uncompressed payload size (u32)
//! [32..36] xxh32 checksum of the stored payload bytes
//! ```
//!
//! Everything in the header is derived from the save content; a given world
//! always produces byte-identical output.

use xxhash_rust::xxh32::xxh32;

use crate::save_error::SaveError;

/// Magic bytes identifying a save file.
pub const MAGIC: [u8; 4] = *b"ICTY";

/// Size of the header in bytes.
pub const HEADER_SIZE: usize = 36;

/// Current header/payload format version. Readers reject newer versions
/// and keep decoding all older ones.
pub const FORMAT_VERSION: u32 = 1;

/// Flags bit 0: the payload is lz4-compressed.
pub const FLAG_COMPRESSED: u32 = 1 << 0;

/// Seed for the xxh32 payload checksum.
const CHECKSUM_SEED: u32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    pub format_version: u32,
    pub flags: u32,
    pub width: i32,
    pub height: i32,
    pub seed: u64,
    pub uncompressed_size: u32,
    pub checksum: u32,
}

impl FileHeader {
    pub fn is_compressed(&self) -> bool {
        self.flags & FLAG_COMPRESSED != 0
    }
}

/// Frame a payload with the header. `payload` is the stored byte form
/// (possibly compressed); `uncompressed_size` describes the decoded form.
pub fn wrap_with_header(
    payload: &[u8],
    flags: u32,
    width: i32,
    height: i32,
    seed: u64,
    uncompressed_size: u32,
) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_SIZE + payload.len());
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&flags.to_le_bytes());
    out.extend_from_slice(&width.to_le_bytes());
    out.extend_from_slice(&height.to_le_bytes());
    out.extend_from_slice(&seed.to_le_bytes());
    out.extend_from_slice(&uncompressed_size.to_le_bytes());
    out.extend_from_slice(&xxh32(payload, CHECKSUM_SEED).to_le_bytes());
    out.extend_from_slice(payload);
    out
}

fn le_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn le_i32(bytes: &[u8], at: usize) -> i32 {
    i32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn le_u64(bytes: &[u8], at: usize) -> u64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(&bytes[at..at + 8]);
    u64::from_le_bytes(b)
}

/// Parse the header and return it with the payload slice.
///
/// `verify_checksum` controls whether the payload checksum is validated;
/// loaders pass `false` to inspect metadata from a damaged file.
pub fn unwrap_header(bytes: &[u8], verify_checksum: bool) -> Result<(FileHeader, &[u8]), SaveError> {
    if bytes.len() < 4 || bytes[..4] != MAGIC {
        return Err(SaveError::Corrupted(
            "missing ICTY magic bytes; not a save file".into(),
        ));
    }
    if bytes.len() < HEADER_SIZE {
        return Err(SaveError::Corrupted(format!(
            "file too short for header: {} bytes, need {HEADER_SIZE}",
            bytes.len()
        )));
    }

    let header = FileHeader {
        format_version: le_u32(bytes, 4),
        flags: le_u32(bytes, 8),
        width: le_i32(bytes, 12),
        height: le_i32(bytes, 16),
        seed: le_u64(bytes, 20),
        uncompressed_size: le_u32(bytes, 28),
        checksum: le_u32(bytes, 32),
    };

    if header.format_version > FORMAT_VERSION {
        return Err(SaveError::UnsupportedVersion {
            found: header.format_version,
            supported: FORMAT_VERSION,
        });
    }

    let payload = &bytes[HEADER_SIZE..];
    if verify_checksum {
        let computed = xxh32(payload, CHECKSUM_SEED);
        if computed != header.checksum {
            return Err(SaveError::Corrupted(format!(
                "checksum mismatch (stored {:#010x}, computed {computed:#010x})",
                header.checksum
            )));
        }
    }

    Ok((header, payload))
}
