//! Line input for chat connections.
//!
//! This module turns a raw byte stream into lines. LF, CR and CRLF all end
//! a line, so telnet-style and Unix clients behave the same.

use std::collections::VecDeque;

use tokio::io::{AsyncRead, AsyncReadExt};

/// Control bytes with special meaning to the line buffer.
pub mod control {
    /// NUL - Null character
    pub const NUL: u8 = 0x00;

    /// LF - Line Feed
    pub const LF: u8 = 0x0A;

    /// CR - Carriage Return
    pub const CR: u8 = 0x0D;

    /// TAB - Horizontal tab (kept as whitespace)
    pub const TAB: u8 = 0x09;
}

/// A line buffer for input processing.
#[derive(Debug)]
pub struct LineBuffer {
    /// The current buffer contents.
    buffer: Vec<u8>,
    /// Maximum buffer size.
    max_size: usize,
    /// Whether the previous byte ended a line with CR.
    after_cr: bool,
    /// Whether bytes were discarded from the current line.
    truncated: bool,
}

impl LineBuffer {
    /// Create a new line buffer with the given maximum size.
    pub fn new(max_size: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(max_size.min(1024)),
            max_size,
            after_cr: false,
            truncated: false,
        }
    }

    /// Create a new line buffer with default settings.
    pub fn with_defaults() -> Self {
        Self::new(1024)
    }

    /// Get the current buffer length.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Process a single byte of input.
    ///
    /// Returns the completed line when `byte` terminates one.
    pub fn process_byte(&mut self, byte: u8) -> Option<String> {
        let after_cr = std::mem::replace(&mut self.after_cr, false);

        match byte {
            control::LF if after_cr => None,
            control::LF => Some(self.take_line()),
            control::CR => {
                self.after_cr = true;
                Some(self.take_line())
            }
            control::NUL => None,
            control::TAB => self.push(byte),
            _ if byte < 32 || byte == 0x7F => None,
            _ => self.push(byte),
        }
    }

    /// Process multiple bytes of input, collecting completed lines.
    pub fn process_bytes(&mut self, bytes: &[u8]) -> Vec<String> {
        bytes.iter().filter_map(|&b| self.process_byte(b)).collect()
    }

    /// Take whatever is buffered as a final, unterminated line.
    pub fn take_partial(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(self.take_line())
        }
    }

    fn push(&mut self, byte: u8) -> Option<String> {
        // Overlong input is truncated; the rest of the line is discarded.
        if self.buffer.len() < self.max_size {
            self.buffer.push(byte);
        } else {
            self.truncated = true;
        }
        None
    }

    /// Take the current buffer contents as a string and clear the buffer.
    fn take_line(&mut self) -> String {
        let mut bytes = std::mem::take(&mut self.buffer);
        if std::mem::replace(&mut self.truncated, false) {
            trim_split_char(&mut bytes);
        }
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

/// Drop a UTF-8 sequence cut short at the end of `bytes`.
fn trim_split_char(bytes: &mut Vec<u8>) {
    let len = bytes.len();
    for back in 1..=len.min(4) {
        let byte = bytes[len - back];
        if byte & 0xC0 == 0x80 {
            continue;
        }
        let width = match byte {
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => 1,
        };
        if width > back {
            bytes.truncate(len - back);
        }
        return;
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Reads lines from any async byte stream.
pub struct LineReader<R> {
    reader: R,
    buffer: LineBuffer,
    pending: VecDeque<String>,
    eof: bool,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    /// Wrap `reader`, truncating lines at `max_line_length` bytes.
    pub fn new(reader: R, max_line_length: usize) -> Self {
        Self {
            reader,
            buffer: LineBuffer::new(max_line_length),
            pending: VecDeque::new(),
            eof: false,
        }
    }

    /// Read the next line.
    ///
    /// Returns `Ok(None)` once the peer has closed the stream. A final line
    /// without a terminator is still returned before that.
    pub async fn read_line(&mut self) -> std::io::Result<Option<String>> {
        let mut chunk = [0u8; 1024];

        loop {
            if let Some(line) = self.pending.pop_front() {
                return Ok(Some(line));
            }
            if self.eof {
                return Ok(None);
            }

            let n = self.reader.read(&mut chunk).await?;
            if n == 0 {
                self.eof = true;
                if let Some(line) = self.buffer.take_partial() {
                    self.pending.push_back(line);
                }
                continue;
            }

            self.pending.extend(self.buffer.process_bytes(&chunk[..n]));
        }
    }
}
