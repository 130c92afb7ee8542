use flate2::read::MultiGzDecoder;
use poolscope_types::Error as StreamError;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Longest line prefix kept for resynchronization after a malformed document
const LINE_HEAD_CAP: usize = 4096;

/// Position bookkeeping over the bytes handed out by an [`InputStream`]
#[derive(Debug, Default)]
struct Position {
    offset: u64,
    last_byte: Option<u8>,
    /// Offset of the first byte of the current line
    line_start: u64,
    /// Bytes of the current line handed out so far, up to `LINE_HEAD_CAP`
    line_head: Vec<u8>,
    line_head_truncated: bool,
}

impl Position {
    fn advance(&mut self, bytes: &[u8]) {
        let Some(&last) = bytes.last() else {
            return;
        };
        self.last_byte = Some(last);

        let rest = match bytes.iter().rposition(|b| *b == b'\n') {
            Some(pos) => {
                self.line_head.clear();
                self.line_head_truncated = false;
                self.line_start = self.offset + pos as u64 + 1;
                &bytes[pos + 1..]
            }
            None => bytes,
        };
        let room = LINE_HEAD_CAP - self.line_head.len();
        if rest.len() > room {
            self.line_head_truncated = true;
        }
        self.line_head.extend_from_slice(&rest[..rest.len().min(room)]);

        self.offset += bytes.len() as u64;
    }
}

/// Buffered, possibly decompressed input that tracks its byte offset in the
/// decompressed stream.
pub struct InputStream {
    inner: BufReader<Box<dyn Read + Send>>,
    pos: Position,
    /// Bytes pushed back by [`InputStream::rewind_line`], read before `inner`
    replay: Vec<u8>,
    replay_at: usize,
    compressed: bool,
}

impl InputStream {
    pub fn offset(&self) -> u64 {
        self.pos.offset
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    /// Last byte handed out, through either `read` or `consume`
    pub fn last_byte(&self) -> Option<u8> {
        self.pos.last_byte
    }

    pub fn line_start(&self) -> u64 {
        self.pos.line_start
    }

    /// Consumed part of the current line (bounded)
    pub fn line_head(&self) -> &[u8] {
        &self.pos.line_head
    }

    /// Push the consumed part of the current line back so that it is read
    /// again. Returns `false` when the line head was too long to keep.
    pub fn rewind_line(&mut self) -> bool {
        if self.pos.line_head_truncated || self.pos.line_head.is_empty() {
            return false;
        }
        let mut replay = std::mem::take(&mut self.pos.line_head);
        replay.extend_from_slice(&self.replay[self.replay_at..]);
        self.replay = replay;
        self.replay_at = 0;
        self.pos.offset = self.pos.line_start;
        if self.pos.line_start > 0 {
            self.pos.last_byte = Some(b'\n');
        }
        true
    }

    fn replaying(&self) -> bool {
        self.replay_at < self.replay.len()
    }

    fn finish_replay_if_drained(&mut self) {
        if !self.replaying() {
            self.replay.clear();
            self.replay_at = 0;
        }
    }
}

impl Read for InputStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.replaying() {
            let pending = &self.replay[self.replay_at..];
            let n = pending.len().min(buf.len());
            buf[..n].copy_from_slice(&pending[..n]);
            self.pos.advance(&pending[..n]);
            self.replay_at += n;
            self.finish_replay_if_drained();
            return Ok(n);
        }
        let n = self.inner.read(buf)?;
        self.pos.advance(&buf[..n]);
        Ok(n)
    }
}

impl BufRead for InputStream {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        if self.replaying() {
            return Ok(&self.replay[self.replay_at..]);
        }
        self.inner.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        if self.replaying() {
            let end = (self.replay_at + amt).min(self.replay.len());
            self.pos.advance(&self.replay[self.replay_at..end]);
            self.replay_at = end;
            self.finish_replay_if_drained();
            return;
        }
        let buffered = self.inner.buffer();
        self.pos.advance(&buffered[..amt.min(buffered.len())]);
        self.inner.consume(amt);
    }
}

/// Open a log file, transparently decompressing gzip input.
///
/// Gzip is detected by a `.gz` suffix or by the magic bytes, so renamed
/// archives are read correctly too. Concatenated gzip members are supported.
pub fn open_input(path: &Path) -> poolscope_types::Result<InputStream> {
    let file = File::open(path).map_err(|e| StreamError::io(path, 0, e))?;
    let mut raw = BufReader::new(file);

    let by_name = path.extension().is_some_and(|ext| ext == "gz");
    let by_magic = raw
        .fill_buf()
        .map_err(|e| StreamError::io(path, 0, e))?
        .starts_with(&GZIP_MAGIC);
    let compressed = by_name || by_magic;

    let source: Box<dyn Read + Send> = if compressed {
        Box::new(MultiGzDecoder::new(raw))
    } else {
        Box::new(raw)
    };

    Ok(InputStream {
        inner: BufReader::with_capacity(64 * 1024, source),
        pos: Position::default(),
        replay: Vec::new(),
        replay_at: 0,
        compressed,
    })
}

/// Map a read failure to the file-level taxonomy
fn stream_error(path: &Path, offset: u64, compressed: bool, err: io::Error) -> StreamError {
    let corrupt = matches!(
        err.kind(),
        io::ErrorKind::InvalidData | io::ErrorKind::InvalidInput | io::ErrorKind::UnexpectedEof
    );
    if compressed && corrupt {
        StreamError::decode(path, offset, format!("corrupt gzip stream: {}", err))
    } else {
        StreamError::io(path, offset, err)
    }
}

// --- Lines ---

/// One physical line, without its terminator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLine {
    /// 1-based line number
    pub number: u64,
    /// Offset of the first byte of the line in the decompressed stream
    pub offset: u64,
    pub text: String,
}

/// Lazy line sequence over an input file; memory is bounded by one line
pub struct LineReader {
    path: PathBuf,
    input: InputStream,
    number: u64,
    lossy: bool,
    buf: Vec<u8>,
    failed: bool,
}

impl LineReader {
    pub fn open(path: &Path) -> poolscope_types::Result<Self> {
        Ok(Self {
            path: path.to_path_buf(),
            input: open_input(path)?,
            number: 0,
            lossy: false,
            buf: Vec::new(),
            failed: false,
        })
    }

    /// Replace invalid UTF-8 instead of failing the file
    pub fn lossy(mut self, lossy: bool) -> Self {
        self.lossy = lossy;
        self
    }

    pub fn bytes_read(&self) -> u64 {
        self.input.offset()
    }

    pub fn next_line(&mut self) -> poolscope_types::Result<Option<RawLine>> {
        self.buf.clear();
        let offset = self.input.offset();
        let n = self
            .input
            .read_until(b'\n', &mut self.buf)
            .map_err(|e| {
                stream_error(&self.path, self.input.offset(), self.input.compressed, e)
            })?;
        if n == 0 {
            return Ok(None);
        }

        if self.buf.last() == Some(&b'\n') {
            self.buf.pop();
            if self.buf.last() == Some(&b'\r') {
                self.buf.pop();
            }
        }

        let text = match std::str::from_utf8(&self.buf) {
            Ok(text) => text.to_string(),
            Err(_) if self.lossy => String::from_utf8_lossy(&self.buf).into_owned(),
            Err(e) => {
                return Err(StreamError::decode(
                    &self.path,
                    offset + e.valid_up_to() as u64,
                    format!("invalid UTF-8 on line {}", self.number + 1),
                ));
            }
        };

        self.number += 1;
        Ok(Some(RawLine {
            number: self.number,
            offset,
            text,
        }))
    }
}

impl Iterator for LineReader {
    type Item = poolscope_types::Result<RawLine>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.next_line() {
            Ok(line) => line.map(Ok),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

// --- Documents ---

/// Streaming JSON deserializer positioned at the start of one document
pub type JsonDeserializer<'a> = serde_json::Deserializer<serde_json::de::IoRead<&'a mut InputStream>>;

/// A document that was read to its end
#[derive(Debug)]
pub struct Document<T> {
    /// 0-based position of the document in the file
    pub index: u64,
    pub offset: u64,
    /// Encoded size in bytes
    pub len: u64,
    pub value: T,
}

/// Outcome of reading one top-level document
#[derive(Debug)]
pub enum DocumentRead<T> {
    Parsed(Document<T>),
    /// The document could not be decoded; the reader has skipped ahead to the
    /// next line that can start a document
    Malformed {
        index: u64,
        offset: u64,
        error: serde_json::Error,
    },
}

/// Lazy sequence of top-level JSON documents.
///
/// Documents may be newline-delimited or whitespace-separated and span
/// several lines. Each one is handed to a caller-supplied deserialization
/// step, so nothing larger than what that step retains is ever buffered.
pub struct DocumentReader {
    path: PathBuf,
    input: InputStream,
    index: u64,
}

impl DocumentReader {
    pub fn open(path: &Path) -> poolscope_types::Result<Self> {
        Ok(Self {
            path: path.to_path_buf(),
            input: open_input(path)?,
            index: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bytes_read(&self) -> u64 {
        self.input.offset()
    }

    /// Documents attempted so far, parsed or malformed
    pub fn documents_read(&self) -> u64 {
        self.index
    }

    /// Read the next document with `read`, or return `None` at end of input.
    ///
    /// Syntax and shape errors yield [`DocumentRead::Malformed`]; failures of
    /// the underlying stream are returned as file-level errors. Invalid UTF-8
    /// inside a document is a syntax error of that document, unlike
    /// [`LineReader`] where it is a [`StreamError::Decode`].
    pub fn next_document<T, F>(
        &mut self,
        read: F,
    ) -> poolscope_types::Result<Option<DocumentRead<T>>>
    where
        F: FnOnce(&mut JsonDeserializer<'_>) -> serde_json::Result<T>,
    {
        if !self.skip_whitespace()? {
            return Ok(None);
        }

        let index = self.index;
        self.index += 1;
        let start = self.input.offset();

        let result = {
            let mut de = serde_json::Deserializer::from_reader(&mut self.input);
            read(&mut de)
        };

        match result {
            Ok(value) => Ok(Some(DocumentRead::Parsed(Document {
                index,
                offset: start,
                len: self.input.offset() - start,
                value,
            }))),
            Err(error) if error.is_io() => {
                let offset = self.input.offset();
                Err(stream_error(
                    &self.path,
                    offset,
                    self.input.compressed,
                    io::Error::from(error),
                ))
            }
            Err(error) => {
                self.resync(start)?;
                Ok(Some(DocumentRead::Malformed {
                    index,
                    offset: start,
                    error,
                }))
            }
        }
    }

    /// Skip inter-document whitespace; `false` at end of input
    fn skip_whitespace(&mut self) -> poolscope_types::Result<bool> {
        loop {
            let offset = self.input.offset();
            let compressed = self.input.compressed;
            let buf = self
                .input
                .fill_buf()
                .map_err(|e| stream_error(&self.path, offset, compressed, e))?;
            if buf.is_empty() {
                return Ok(false);
            }
            let blank = buf.iter().take_while(|b| b.is_ascii_whitespace()).count();
            let more = blank < buf.len();
            self.input.consume(blank);
            if more {
                return Ok(true);
            }
        }
    }

    /// Move to the next line that starts with `{` (or EOF).
    ///
    /// When the failure was detected on a later line than the one the
    /// document started on, and that line itself opens a document (the
    /// previous write was cut short), the line is rewound instead of skipped.
    fn resync(&mut self, start: u64) -> poolscope_types::Result<()> {
        let opens_document = self.input.line_start() > start
            && self.input.line_head().first() == Some(&b'{');
        if opens_document && self.input.rewind_line() {
            return Ok(());
        }

        if self.input.last_byte() != Some(b'\n') {
            self.skip_line()?;
        }
        loop {
            let offset = self.input.offset();
            let compressed = self.input.compressed;
            let buf = self
                .input
                .fill_buf()
                .map_err(|e| stream_error(&self.path, offset, compressed, e))?;
            if buf.is_empty() || buf[0] == b'{' {
                return Ok(());
            }
            self.skip_line()?;
        }
    }

    fn skip_line(&mut self) -> poolscope_types::Result<()> {
        loop {
            let offset = self.input.offset();
            let compressed = self.input.compressed;
            let buf = self
                .input
                .fill_buf()
                .map_err(|e| stream_error(&self.path, offset, compressed, e))?;
            if buf.is_empty() {
                return Ok(());
            }
            match buf.iter().position(|b| *b == b'\n') {
                Some(pos) => {
                    self.input.consume(pos + 1);
                    return Ok(());
                }
                None => {
                    let len = buf.len();
                    self.input.consume(len);
                }
            }
        }
    }
}
