//! Server-Sent Events
//!
//! Both providers stream with SSE: events are separated by a blank line and
//! the payload sits on `data:` lines. Each adapter supplies a parser that
//! turns one payload into an optional text delta.

use assistant_core::error::Result;
use assistant_core::provider::TextStream;

use crate::error::from_reqwest;

/// Pull complete `data:` payloads out of `buffer`, leaving any partial
/// trailing event in place
pub(crate) fn drain_data_lines(buffer: &mut String) -> Vec<String> {
    let mut data_lines = Vec::new();

    while let Some(pos) = buffer.find("\n\n") {
        let block: String = buffer.drain(..pos + 2).collect();

        for line in block.lines() {
            if let Some(data) = line.trim().strip_prefix("data:") {
                let data = data.trim();
                if !data.is_empty() {
                    data_lines.push(data.to_string());
                }
            }
        }
    }

    data_lines
}

/// Decoded SSE text plus the bytes of a character that a network chunk
/// boundary split in two
#[derive(Debug, Default)]
pub(crate) struct SseBuffer {
    text: String,
    pending: Vec<u8>,
}

impl SseBuffer {
    /// Append raw bytes; an incomplete trailing UTF-8 sequence waits for
    /// the next chunk
    pub(crate) fn push(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);

        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    self.text.push_str(text);
                    self.pending.clear();
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    self.text
                        .push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match e.error_len() {
                        None => {
                            self.pending.drain(..valid);
                            break;
                        }
                        Some(len) => {
                            self.text.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + len);
                        }
                    }
                }
            }
        }

        // CRLF framing; a lone trailing '\r' waits for its '\n'
        if self.text.contains("\r\n") {
            self.text = self.text.replace("\r\n", "\n");
        }
    }

    pub(crate) fn drain_data_lines(&mut self) -> Vec<String> {
        drain_data_lines(&mut self.text)
    }

    /// Flush whatever is left once the body has ended
    pub(crate) fn finish(&mut self) -> Vec<String> {
        if !self.pending.is_empty() {
            self.text.push_str(&String::from_utf8_lossy(&self.pending));
            self.pending.clear();
        }
        if self.text.trim().is_empty() {
            return Vec::new();
        }
        self.text.push_str("\n\n");
        drain_data_lines(&mut self.text)
    }
}

/// Turn an SSE response into a stream of text chunks.
///
/// The parser returns `None` for payloads that carry no text (pings, block
/// starts, the `[DONE]` sentinel). An `Err` from the parser ends the stream.
pub(crate) fn text_stream<F>(response: reqwest::Response, mut parse: F) -> TextStream
where
    F: FnMut(&str) -> Option<Result<String>> + Send + 'static,
{
    let stream = async_stream::stream! {
        let mut response = response;
        let mut buffer = SseBuffer::default();

        'read: loop {
            match response.chunk().await {
                Ok(Some(bytes)) => {
                    buffer.push(&bytes);
                    for data in buffer.drain_data_lines() {
                        match parse(&data) {
                            Some(Ok(text)) if text.is_empty() => {}
                            Some(Ok(text)) => yield Ok(text),
                            Some(Err(e)) => {
                                yield Err(e);
                                break 'read;
                            }
                            None => {}
                        }
                    }
                }
                Ok(None) => {
                    for data in buffer.finish() {
                        if let Some(item) = parse(&data) {
                            yield item;
                        }
                    }
                    break;
                }
                Err(e) => {
                    yield Err(from_reqwest(&e));
                    break;
                }
            }
        }
    };

    Box::pin(stream)
}
