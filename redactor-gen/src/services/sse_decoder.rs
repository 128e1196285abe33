//! Server-sent event decoding for provider streams
//!
//! Byte chunks arrive at arbitrary boundaries, possibly inside a UTF-8
//! sequence or between the `\r` and `\n` of a line ending. Bytes are buffered
//! until a blank line closes a block, and only whole blocks are decoded.

/// Splits a byte stream into the `data:` payloads of complete SSE blocks
#[derive(Debug, Default)]
pub struct SseDecoder {
    pending: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk to the buffer
    pub fn push_chunk(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);
    }

    /// Next complete block's data payload, if one is buffered
    ///
    /// Blocks without `data:` lines (comments, keep-alives) are skipped.
    pub fn next_data(&mut self) -> Option<String> {
        loop {
            let (end, separator_len) = find_block_end(&self.pending)?;
            let block: Vec<u8> = self.pending.drain(..end + separator_len).take(end).collect();

            if let Some(data) = block_data(&block) {
                return Some(data);
            }
        }
    }

    /// Data payload of an unterminated final block, draining the buffer
    pub fn finish(&mut self) -> Option<String> {
        let block = std::mem::take(&mut self.pending);
        block_data(&block)
    }
}

/// Position and length of the first blank-line separator
fn find_block_end(buf: &[u8]) -> Option<(usize, usize)> {
    let lf = find(buf, b"\n\n").map(|pos| (pos, 2));
    let crlf = find(buf, b"\r\n\r\n").map(|pos| (pos, 4));

    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Join the `data:` lines of one block
fn block_data(block: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(block);
    let mut data: Option<String> = None;

    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if let Some(value) = line.strip_prefix("data:") {
            let value = value.strip_prefix(' ').unwrap_or(value);
            match data.as_mut() {
                Some(existing) => {
                    existing.push('\n');
                    existing.push_str(value);
                }
                None => data = Some(value.to_string()),
            }
        }
    }

    data
}
