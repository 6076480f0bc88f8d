//! Sequential log readers with strict corruption detection
//!
//! Every frame's checksum is validated and any frame that does not parse is
//! corruption. The version log is read block by block: a block whose header
//! is intact but whose body runs past the end of the file is the one commit
//! that was in flight when the process died, and is reported as a torn tail.
//! Nothing else is ever treated as recoverable.

use std::fs::File;
use std::io::{BufReader, Read};
use std::marker::PhantomData;
use std::path::Path;

use super::errors::{StorageError, StorageResult};
use super::record::{decode_commit_header, Frame, COMMIT_HEADER_SIZE};

fn open_log(path: &Path) -> StorageResult<(BufReader<File>, u64)> {
    let file = File::open(path).map_err(|e| {
        StorageError::read_failed(format!("Failed to open log: {}", path.display()), e)
    })?;

    let file_size = file
        .metadata()
        .map_err(|e| StorageError::read_failed("Failed to read log metadata", e))?
        .len();

    Ok((BufReader::new(file), file_size))
}

/// Reader for a log of bare frames.
pub struct LogReader<F> {
    reader: BufReader<File>,
    current_offset: u64,
    file_size: u64,
    _frame: PhantomData<F>,
}

impl<F: Frame> LogReader<F> {
    /// Opens a log file for reading.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let (reader, file_size) = open_log(path)?;
        Ok(Self {
            reader,
            current_offset: 0,
            file_size,
            _frame: PhantomData,
        })
    }

    /// Reads the next frame. Returns `None` at a clean end of file.
    pub fn read_next(&mut self) -> StorageResult<Option<F>> {
        if self.current_offset >= self.file_size {
            return Ok(None);
        }

        let remaining = self.file_size - self.current_offset;
        if remaining < F::min_frame_size() as u64 {
            return Err(StorageError::corruption_at_offset(
                self.current_offset,
                format!("Truncated frame: only {} bytes remaining", remaining),
            ));
        }

        let mut len_buf = [0u8; 4];
        self.reader.read_exact(&mut len_buf).map_err(|e| {
            StorageError::corruption_at_offset(
                self.current_offset,
                format!("Failed to read frame length: {}", e),
            )
        })?;
        let frame_length = u32::from_le_bytes(len_buf) as u64;

        if frame_length < F::min_frame_size() as u64 || frame_length > remaining {
            return Err(StorageError::corruption_at_offset(
                self.current_offset,
                format!(
                    "Invalid frame length: {} ({} bytes remaining)",
                    frame_length, remaining
                ),
            ));
        }

        let mut frame_buf = vec![0u8; frame_length as usize];
        frame_buf[0..4].copy_from_slice(&len_buf);
        self.reader.read_exact(&mut frame_buf[4..]).map_err(|e| {
            StorageError::corruption_at_offset(
                self.current_offset,
                format!("Failed to read frame body: {}", e),
            )
        })?;

        let (frame, consumed) = F::deserialize(&frame_buf)
            .map_err(|e| StorageError::corruption_at_offset(self.current_offset, e.to_string()))?;

        self.current_offset += consumed as u64;
        Ok(Some(frame))
    }

    /// Reads every frame to the end of the log.
    pub fn read_all(&mut self) -> StorageResult<Vec<F>> {
        let mut frames = Vec::new();
        while let Some(frame) = self.read_next()? {
            frames.push(frame);
        }
        Ok(frames)
    }
}

/// Outcome of reading one commit block.
#[derive(Debug, PartialEq, Eq)]
pub enum BlockRead<F> {
    /// Every frame of one complete, checksum-valid commit.
    Block(Vec<F>),
    /// Clean end of the log.
    End,
    /// The last commit never finished; the log should end at `offset`.
    TornTail { offset: u64 },
}

/// Reader for a log of commit blocks.
pub struct CommitLogReader<F> {
    reader: BufReader<File>,
    current_offset: u64,
    file_size: u64,
    _frame: PhantomData<F>,
}

impl<F: Frame> CommitLogReader<F> {
    /// Opens a log file for reading.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let (reader, file_size) = open_log(path)?;
        Ok(Self {
            reader,
            current_offset: 0,
            file_size,
            _frame: PhantomData,
        })
    }

    /// Returns the offset just past the last block read.
    pub fn current_offset(&self) -> u64 {
        self.current_offset
    }

    /// Reads the next commit block.
    pub fn read_next(&mut self) -> StorageResult<BlockRead<F>> {
        if self.current_offset >= self.file_size {
            return Ok(BlockRead::End);
        }

        let start = self.current_offset;
        let remaining = self.file_size - start;
        if remaining < COMMIT_HEADER_SIZE as u64 {
            return Ok(BlockRead::TornTail { offset: start });
        }

        let mut header = [0u8; COMMIT_HEADER_SIZE];
        self.reader.read_exact(&mut header).map_err(|e| {
            StorageError::corruption_at_offset(start, format!("Failed to read commit header: {}", e))
        })?;

        let body_len = decode_commit_header(&header).ok_or_else(|| {
            StorageError::corruption_at_offset(start, "Commit header checksum mismatch")
        })? as u64;

        if body_len < F::min_frame_size() as u64 {
            return Err(StorageError::corruption_at_offset(
                start,
                format!("Invalid commit body length: {}", body_len),
            ));
        }

        if body_len > remaining - COMMIT_HEADER_SIZE as u64 {
            return Ok(BlockRead::TornTail { offset: start });
        }

        let mut body = vec![0u8; body_len as usize];
        self.reader.read_exact(&mut body).map_err(|e| {
            StorageError::corruption_at_offset(start, format!("Failed to read commit body: {}", e))
        })?;

        let body_start = start + COMMIT_HEADER_SIZE as u64;
        let mut frames = Vec::new();
        let mut pos = 0;
        while pos < body.len() {
            let (frame, consumed) = F::deserialize(&body[pos..]).map_err(|e| {
                StorageError::corruption_at_offset(body_start + pos as u64, e.to_string())
            })?;
            frames.push(frame);
            pos += consumed;
        }

        self.current_offset = body_start + body_len;
        Ok(BlockRead::Block(frames))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::record::{encode_commit_block, LegacyRow, VersionRow};
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn row(version: i64) -> VersionRow {
        VersionRow {
            record_id: 1,
            version,
            created_at_ms: 1000 + version,
            data_json: format!(r#"{{"v":"{}"}}"#, version),
        }
    }

    fn write_blocks(dir: &TempDir, blocks: &[Vec<VersionRow>]) -> PathBuf {
        let path = dir.path().join("versions.dat");
        let mut bytes = Vec::new();
        for block in blocks {
            bytes.extend(encode_commit_block(block).unwrap());
        }
        fs::write(&path, bytes).unwrap();
        path
    }

    fn versions(read: BlockRead<VersionRow>) -> Vec<i64> {
        match read {
            BlockRead::Block(rows) => rows.iter().map(|r| r.version).collect(),
            other => panic!("expected a block, got {:?}", other),
        }
    }

    #[test]
    fn test_reads_blocks_in_order() {
        let dir = TempDir::new().unwrap();
        let path = write_blocks(&dir, &[vec![row(1), row(2)], vec![row(3)]]);

        let mut reader = CommitLogReader::<VersionRow>::open(&path).unwrap();
        assert_eq!(versions(reader.read_next().unwrap()), vec![1, 2]);
        assert_eq!(versions(reader.read_next().unwrap()), vec![3]);
        assert_eq!(reader.read_next().unwrap(), BlockRead::End);
        assert_eq!(reader.current_offset(), fs::metadata(&path).unwrap().len());
    }

    #[test]
    fn test_short_final_block_is_torn_tail() {
        let dir = TempDir::new().unwrap();
        let path = write_blocks(&dir, &[vec![row(1)], vec![row(2), row(3)]]);
        let full = fs::read(&path).unwrap();
        let first_len = encode_commit_block(&[row(1)]).unwrap().len() as u64;
        fs::write(&path, &full[..full.len() - 5]).unwrap();

        let mut reader = CommitLogReader::<VersionRow>::open(&path).unwrap();
        assert_eq!(versions(reader.read_next().unwrap()), vec![1]);
        assert_eq!(
            reader.read_next().unwrap(),
            BlockRead::TornTail { offset: first_len }
        );
    }

    #[test]
    fn test_partial_header_is_torn_tail() {
        let dir = TempDir::new().unwrap();
        let path = write_blocks(&dir, &[vec![row(1)]]);
        let committed = fs::metadata(&path).unwrap().len();
        let mut bytes = fs::read(&path).unwrap();
        bytes.extend_from_slice(&encode_commit_block(&[row(2)]).unwrap()[..3]);
        fs::write(&path, bytes).unwrap();

        let mut reader = CommitLogReader::<VersionRow>::open(&path).unwrap();
        reader.read_next().unwrap();
        assert_eq!(
            reader.read_next().unwrap(),
            BlockRead::TornTail { offset: committed }
        );
    }

    #[test]
    fn test_flipped_block_length_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = write_blocks(&dir, &[vec![row(1)], vec![row(2)]]);
        let mut bytes = fs::read(&path).unwrap();
        bytes[3] ^= 0x01;
        fs::write(&path, bytes).unwrap();

        let mut reader = CommitLogReader::<VersionRow>::open(&path).unwrap();
        let err = reader.read_next().unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("byte_offset: 0"));
    }

    #[test]
    fn test_flipped_frame_length_inside_block_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = write_blocks(&dir, &[vec![row(1), row(2)]]);
        let mut bytes = fs::read(&path).unwrap();
        bytes[COMMIT_HEADER_SIZE + 3] ^= 0x80;
        fs::write(&path, bytes).unwrap();

        let mut reader = CommitLogReader::<VersionRow>::open(&path).unwrap();
        assert!(reader.read_next().unwrap_err().is_fatal());
    }

    #[test]
    fn test_corrupt_complete_block_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = write_blocks(&dir, &[vec![row(1)]]);
        let mut bytes = fs::read(&path).unwrap();
        let mid = bytes.len() / 2;
        bytes[mid] ^= 0xFF;
        fs::write(&path, bytes).unwrap();

        let mut reader = CommitLogReader::<VersionRow>::open(&path).unwrap();
        let err = reader.read_next().unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().to_lowercase().contains("checksum"));
    }

    fn legacy(record_id: i64) -> LegacyRow {
        LegacyRow {
            record_id,
            data_json: "{}".to_string(),
        }
    }

    #[test]
    fn test_reads_bare_frames() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("records.dat");
        let bytes: Vec<u8> = [legacy(1), legacy(2)]
            .iter()
            .flat_map(|f| f.serialize())
            .collect();
        fs::write(&path, bytes).unwrap();

        let rows = LogReader::<LegacyRow>::open(&path).unwrap().read_all().unwrap();
        assert_eq!(rows, vec![legacy(1), legacy(2)]);
    }

    #[test]
    fn test_bare_frame_running_past_eof_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("records.dat");
        let mut bytes = legacy(1).serialize();
        let second = legacy(2).serialize();
        bytes.extend_from_slice(&second[..second.len() - 2]);
        fs::write(&path, bytes).unwrap();

        let mut reader = LogReader::<LegacyRow>::open(&path).unwrap();
        assert_eq!(reader.read_next().unwrap(), Some(legacy(1)));
        assert!(reader.read_next().unwrap_err().is_fatal());
    }
}
