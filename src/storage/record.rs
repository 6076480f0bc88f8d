//! On-disk frame formats
//!
//! Every frame shares one envelope:
//!
//! ```text
//! +------------------+
//! | Frame Length     | (u32 LE, includes this field and the checksum)
//! +------------------+
//! | Body             | (frame specific)
//! +------------------+
//! | Checksum         | (u32 LE, CRC32 over length + body)
//! +------------------+
//! ```
//!
//! A version row body is:
//!
//! ```text
//! | record_id (i64 LE) | version (i64 LE) | created_at_ms (i64 LE) |
//! | data_json (u32 LE length + UTF-8)                              |
//! ```
//!
//! A legacy row body (single row per record, latest frame wins) is:
//!
//! ```text
//! | record_id (i64 LE) | data_json (u32 LE length + UTF-8) |
//! ```
//!
//! The version log groups the frames of one commit into a block:
//!
//! ```text
//! +------------------+
//! | Body Length      | (u32 LE, bytes of frames that follow)
//! +------------------+
//! | Header Checksum  | (u32 LE, CRC32 over the body length)
//! +------------------+
//! | Frames           | (one or more version row frames)
//! +------------------+
//! ```
//!
//! Only a block whose header is intact and whose body runs past the end of
//! the file can be an interrupted append.

use std::io::{self, Cursor, Read};

use super::checksum::{compute_checksum, verify_checksum};

/// Length prefix plus trailing checksum.
pub const ENVELOPE_SIZE: usize = 4 + 4;

/// Body length plus header checksum.
pub const COMMIT_HEADER_SIZE: usize = 4 + 4;

/// Encodes `frames` as one commit block.
pub fn encode_commit_block<F: Frame>(frames: &[F]) -> io::Result<Vec<u8>> {
    let body: Vec<u8> = frames.iter().flat_map(|frame| frame.serialize()).collect();
    let body_len = u32::try_from(body.len()).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("Commit block too large: {} bytes", body.len()),
        )
    })?;

    let len_bytes = body_len.to_le_bytes();
    let mut block = Vec::with_capacity(COMMIT_HEADER_SIZE + body.len());
    block.extend_from_slice(&len_bytes);
    block.extend_from_slice(&compute_checksum(&len_bytes).to_le_bytes());
    block.extend_from_slice(&body);
    Ok(block)
}

/// Returns the body length declared by a commit header, or `None` if the
/// header checksum does not match.
pub fn decode_commit_header(header: &[u8; COMMIT_HEADER_SIZE]) -> Option<u32> {
    let len_bytes = [header[0], header[1], header[2], header[3]];
    let stored = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
    verify_checksum(&len_bytes, stored).then_some(u32::from_le_bytes(len_bytes))
}

/// A checksummed, length-prefixed frame body.
pub trait Frame: Sized {
    /// Smallest possible encoded body.
    const MIN_BODY_SIZE: usize;

    /// Appends the encoded body to `buf`.
    fn encode_body(&self, buf: &mut Vec<u8>);

    /// Parses a body that has already passed checksum verification.
    fn decode_body(cursor: &mut Cursor<&[u8]>) -> io::Result<Self>;

    /// Smallest possible complete frame.
    fn min_frame_size() -> usize {
        ENVELOPE_SIZE + Self::MIN_BODY_SIZE
    }

    /// Serialize the complete frame to bytes.
    fn serialize(&self) -> Vec<u8> {
        let mut body = Vec::new();
        self.encode_body(&mut body);

        let frame_length = (ENVELOPE_SIZE + body.len()) as u32;

        let mut frame = Vec::with_capacity(frame_length as usize);
        frame.extend_from_slice(&frame_length.to_le_bytes());
        frame.extend_from_slice(&body);
        let checksum = compute_checksum(&frame);
        frame.extend_from_slice(&checksum.to_le_bytes());

        frame
    }

    /// Deserialize a frame from bytes, verifying its checksum.
    ///
    /// Returns the frame and the number of bytes consumed.
    fn deserialize(data: &[u8]) -> io::Result<(Self, usize)> {
        if data.len() < Self::min_frame_size() {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "Frame too short"));
        }

        let frame_length = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;

        if frame_length < Self::min_frame_size() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Invalid frame length: {}", frame_length),
            ));
        }

        if data.len() < frame_length {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "Frame truncated: expected {} bytes, got {}",
                    frame_length,
                    data.len()
                ),
            ));
        }

        let checksum_offset = frame_length - 4;
        let stored_checksum = u32::from_le_bytes([
            data[checksum_offset],
            data[checksum_offset + 1],
            data[checksum_offset + 2],
            data[checksum_offset + 3],
        ]);
        let computed_checksum = compute_checksum(&data[..checksum_offset]);

        if computed_checksum != stored_checksum {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Checksum mismatch: computed {:08x}, stored {:08x}",
                    computed_checksum, stored_checksum
                ),
            ));
        }

        let mut cursor = Cursor::new(&data[4..checksum_offset]);
        let frame = Self::decode_body(&mut cursor)?;

        if cursor.position() as usize != checksum_offset - 4 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Trailing bytes in frame body",
            ));
        }

        Ok((frame, frame_length))
    }
}

fn read_i64(reader: &mut impl Read) -> io::Result<i64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(i64::from_le_bytes(buf))
}

fn read_string(reader: &mut impl Read) -> io::Result<String> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf)?;
    let len = u32::from_le_bytes(len_buf) as usize;

    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;

    String::from_utf8(buf)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("Invalid UTF-8: {}", e)))
}

fn write_string(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(&(s.len() as u32).to_le_bytes());
    buf.extend_from_slice(s.as_bytes());
}

/// One immutable `(record_id, version)` row of the version table.
///
/// `data_json` is the full JSON-encoded snapshot at this version, never a
/// delta.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRow {
    pub record_id: i64,
    pub version: i64,
    pub created_at_ms: i64,
    pub data_json: String,
}

impl Frame for VersionRow {
    const MIN_BODY_SIZE: usize = 8 + 8 + 8 + 4;

    fn encode_body(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.record_id.to_le_bytes());
        buf.extend_from_slice(&self.version.to_le_bytes());
        buf.extend_from_slice(&self.created_at_ms.to_le_bytes());
        write_string(buf, &self.data_json);
    }

    fn decode_body(cursor: &mut Cursor<&[u8]>) -> io::Result<Self> {
        Ok(Self {
            record_id: read_i64(cursor)?,
            version: read_i64(cursor)?,
            created_at_ms: read_i64(cursor)?,
            data_json: read_string(cursor)?,
        })
    }
}

/// A row of the pre-versioning store: one mutable snapshot per record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyRow {
    pub record_id: i64,
    pub data_json: String,
}

impl Frame for LegacyRow {
    const MIN_BODY_SIZE: usize = 8 + 4;

    fn encode_body(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.record_id.to_le_bytes());
        write_string(buf, &self.data_json);
    }

    fn decode_body(cursor: &mut Cursor<&[u8]>) -> io::Result<Self> {
        Ok(Self {
            record_id: read_i64(cursor)?,
            data_json: read_string(cursor)?,
        })
    }
}
