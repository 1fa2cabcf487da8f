//! Streams the complete records that begin inside one worker's byte range.
//!
//! A record belongs to the worker whose range holds its first byte. The
//! reader therefore skips the tail of a record that started in the previous
//! range, and finishes the record that straddles its own `end` even if that
//! means reading past it.

use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::partition::ByteRange;

/// One line of the input file, terminator stripped.
pub type RawRecord = Vec<u8>;

const RECORD_TERMINATOR: u8 = b'\n';
const READ_BUFFER_BYTES: usize = 1 << 20;

/// A forward-only iterator over the records of a [`ByteRange`].
///
/// Not restartable: reading again means opening a new reader.
pub struct RangeReader<R> {
    inner: R,
    /// Offset of the next unread byte.
    pos: u64,
    end: u64,
    done: bool,
}

impl RangeReader<BufReader<File>> {
    /// Opens `path` and positions a reader at the first record of `range`.
    pub fn open(path: impl AsRef<Path>, range: ByteRange) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
        let file_size = file
            .metadata()
            .with_context(|| format!("stat {}", path.display()))?
            .len();
        if range.end > file_size {
            bail!(
                "range {}..{} reaches past the end of {} ({} bytes)",
                range.start,
                range.end,
                path.display(),
                file_size
            );
        }
        let reader = BufReader::with_capacity(READ_BUFFER_BYTES, file);
        Self::new(reader, range).with_context(|| format!("seek {}", path.display()))
    }
}

impl<R: BufRead + Seek> RangeReader<R> {
    /// Wraps an already opened source.
    ///
    /// For `start > 0` the reader backs up one byte and discards through the
    /// next terminator. When `start` sits exactly on a record boundary the
    /// discarded bytes are just the previous record's terminator, so that
    /// record is still emitted here and nowhere else.
    pub fn new(mut inner: R, range: ByteRange) -> Result<Self> {
        if range.is_empty() {
            return Ok(Self {
                inner,
                pos: range.start,
                end: range.end,
                done: true,
            });
        }
        let pos = if range.start == 0 {
            inner.seek(SeekFrom::Start(0))?;
            0
        } else {
            let back = range.start - 1;
            inner.seek(SeekFrom::Start(back))?;
            let mut fragment = Vec::new();
            let skipped = inner.read_until(RECORD_TERMINATOR, &mut fragment)?;
            back + skipped as u64
        };
        Ok(Self {
            inner,
            pos,
            end: range.end,
            done: false,
        })
    }

    /// Offset of the next byte the reader would consume.
    pub fn position(&self) -> u64 {
        self.pos
    }
}

impl<R: BufRead> Iterator for RangeReader<R> {
    type Item = Result<RawRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        // Never start a record at or past `end`; that one belongs to the next range.
        if self.done || self.pos >= self.end {
            self.done = true;
            return None;
        }
        let mut line = Vec::new();
        match self.inner.read_until(RECORD_TERMINATOR, &mut line) {
            Ok(0) => {
                self.done = true;
                None
            }
            Ok(read) => {
                self.pos += read as u64;
                if line.last() == Some(&RECORD_TERMINATOR) {
                    line.pop();
                    if line.last() == Some(&b'\r') {
                        line.pop();
                    }
                }
                Some(Ok(line))
            }
            Err(err) => {
                self.done = true;
                Some(Err(anyhow::Error::new(err).context(format!("read at offset {}", self.pos))))
            }
        }
    }
}
