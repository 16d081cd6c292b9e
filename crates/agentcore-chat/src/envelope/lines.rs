use crate::errors::FramingError;

/// Prefix that marks a structured event line.
pub const DATA_PREFIX: &str = "data: ";

/// Classification of a single framed line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line<'a> {
    /// Payload after the `data: ` prefix.
    Data(&'a str),
    /// Any other non-empty line.
    Other(&'a str),
    /// Empty line (SSE frame separator).
    Blank,
}

/// Classifies a framed line. Only the exact `data: ` prefix marks an event.
pub fn classify_line(line: &str) -> Line<'_> {
    if line.is_empty() {
        return Line::Blank;
    }
    match line.strip_prefix(DATA_PREFIX) {
        Some(payload) => Line::Data(payload),
        None => Line::Other(line),
    }
}

/// Splits an arbitrarily chunked byte stream into newline-terminated lines.
#[derive(Default)]
pub struct LineDecoder {
    buf: Vec<u8>,
    lines_seen: u64,
}

impl LineDecoder {
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Result<Vec<String>, FramingError> {
        self.buf.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(idx) = self.buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=idx).collect();
            lines.push(self.decode(&line[..idx])?);
        }
        Ok(lines)
    }

    /// Flushes the trailing line when the stream ends without a newline.
    pub fn finish(&mut self) -> Result<Option<String>, FramingError> {
        if self.buf.is_empty() {
            return Ok(None);
        }
        let rest = std::mem::take(&mut self.buf);
        self.decode(&rest).map(Some)
    }

    fn decode(&mut self, bytes: &[u8]) -> Result<String, FramingError> {
        self.lines_seen += 1;
        let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
        String::from_utf8(bytes.to_vec()).map_err(|e| FramingError::InvalidUtf8 {
            line: self.lines_seen,
            message: e.to_string(),
        })
    }
}
