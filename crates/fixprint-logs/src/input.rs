use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

/// Longest line handed to the decoder; the rest of a longer line is dropped
pub const MAX_LINE_LEN: usize = 4096;

#[derive(Debug, Error)]
pub enum InputError {
    #[error("could not open {}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// One line read from the input, without its line separator
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawLine {
    number: u64,
    bytes: Vec<u8>,
    truncated: bool,
}

impl RawLine {
    /// 1-based physical line number
    pub fn number(&self) -> u64 {
        self.number
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Whether the line was cut at `MAX_LINE_LEN`
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// The line with the first `offset` bytes skipped (empty if the line is shorter)
    pub fn payload(&self, offset: usize) -> &[u8] {
        self.bytes.get(offset..).unwrap_or_default()
    }
}

/// Line source backed by a file it owns or by a stream it borrows
pub enum InputSource<'a> {
    /// Opened here; closed when the source is dropped
    File {
        path: PathBuf,
        reader: BufReader<File>,
        lines_read: u64,
    },

    /// Handed in by the caller (e.g. stdin); never closed here
    Borrowed {
        reader: &'a mut (dyn AsyncBufRead + Unpin),
        lines_read: u64,
    },
}

impl<'a> InputSource<'a> {
    /// Open a file for reading; an error means the source is unusable
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, InputError> {
        let path = path.as_ref();
        let file = File::open(path).await.map_err(|source| InputError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        tracing::debug!(path = %path.display(), "opened input file");
        Ok(Self::File {
            path: path.to_path_buf(),
            reader: BufReader::new(file),
            lines_read: 0,
        })
    }

    /// Wrap an already open stream without taking ownership of it
    pub fn from_reader(reader: &'a mut (dyn AsyncBufRead + Unpin)) -> Self {
        Self::Borrowed {
            reader,
            lines_read: 0,
        }
    }

    /// Whether dropping this source releases the underlying resource
    pub fn is_owned(&self) -> bool {
        matches!(self, Self::File { .. })
    }

    /// Number of lines returned so far
    pub fn lines_read(&self) -> u64 {
        match self {
            Self::File { lines_read, .. } | Self::Borrowed { lines_read, .. } => *lines_read,
        }
    }

    fn parts(&mut self) -> (&mut (dyn AsyncBufRead + Unpin + 'a), &mut u64) {
        match self {
            Self::File {
                reader, lines_read, ..
            } => (reader as &mut (dyn AsyncBufRead + Unpin + 'a), lines_read),
            Self::Borrowed { reader, lines_read } => (&mut **reader, lines_read),
        }
    }

    /// Read the next line, or `None` at end of stream
    ///
    /// Lines end at `\n`; a trailing `\r` is removed unless the line was cut.
    /// A line longer than `MAX_LINE_LEN` is cut at the limit and the remainder
    /// up to the next separator is consumed and discarded. The future may be dropped while
    /// pending; any partially read line is lost.
    pub async fn next_line(&mut self) -> io::Result<Option<RawLine>> {
        let (reader, lines_read) = self.parts();

        let mut bytes = Vec::new();
        let mut truncated = false;
        let mut consumed_any = false;

        loop {
            let (used, found_separator) = {
                let available = reader.fill_buf().await?;
                if available.is_empty() {
                    break;
                }

                let (chunk, used, found) = match available.iter().position(|&b| b == b'\n') {
                    Some(i) => (&available[..i], i + 1, true),
                    None => (available, available.len(), false),
                };

                let room = MAX_LINE_LEN - bytes.len();
                if chunk.len() > room {
                    truncated = true;
                }
                bytes.extend_from_slice(&chunk[..chunk.len().min(room)]);
                (used, found)
            };

            reader.consume(used);
            consumed_any = true;
            if found_separator {
                break;
            }
        }

        if !consumed_any {
            return Ok(None);
        }

        // A cut line keeps its last byte; only a real line ending loses the CR
        if !truncated && bytes.last() == Some(&b'\r') {
            bytes.pop();
        }

        *lines_read += 1;
        if truncated {
            tracing::warn!(
                line = *lines_read,
                limit = MAX_LINE_LEN,
                "line exceeds maximum length, truncated"
            );
        }

        Ok(Some(RawLine {
            number: *lines_read,
            bytes,
            truncated,
        }))
    }
}

impl fmt::Debug for InputSource<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File {
                path, lines_read, ..
            } => f
                .debug_struct("File")
                .field("path", path)
                .field("lines_read", lines_read)
                .finish(),
            Self::Borrowed { lines_read, .. } => f
                .debug_struct("Borrowed")
                .field("lines_read", lines_read)
                .finish(),
        }
    }
}

impl Drop for InputSource<'_> {
    fn drop(&mut self) {
        if let Self::File { path, .. } = self {
            tracing::debug!(path = %path.display(), "closing input file");
        }
    }
}
