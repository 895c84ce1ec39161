//! Incremental `Content-Length` stream re-assembly.
//!
//! The base protocol frames every message as a header block terminated
//! by a blank line, with a mandatory `Content-Length` field giving the
//! body size in bytes:
//!
//! ```text
//! Content-Length: <length>\r\n
//! \r\n
//! <body>
//! ```
//!
//! [`MessageFramer`] does not read from a source itself; each
//! [`MessageFramer::pull`] is handed a read function and performs exactly
//! one bounded read, then drains every complete message the buffer now
//! holds. The single-read contract is what allows a pull to sit directly
//! inside a readiness callback without starving other descriptors.

use std::io;

use girder_config::HeaderCompat;

use crate::errors::FramerError;

const END_HEADER_MARKER: &[u8] = b"\r\n\r\n";
const CONTENT_LENGTH_HEADER: &[u8] = b"Content-Length: ";

/// Longest prefix of a corrupt header echoed back in the error message.
const HEADER_PREVIEW_LIMIT: usize = 256;

type Processor = Box<dyn FnMut(&[u8], &[u8])>;

enum FrameParse {
    /// The buffer holds no complete message yet.
    NeedMoreData,
    /// A complete header block lacked a parseable `Content-Length`.
    BadHeader,
    /// A complete message starts at the front of the buffer.
    Complete { header_len: usize, body_len: usize },
}

/// Re-assembles framed messages from a byte stream.
///
/// One fixed-capacity buffer lives for the whole session; its capacity
/// bounds the largest admissible message. Unparsed bytes retained from a
/// previous pull are compacted to the front of the buffer before each
/// read.
pub struct MessageFramer {
    buffer: Box<[u8]>,
    pending_start: usize,
    pending_len: usize,
    processor: Option<Processor>,
    compat: HeaderCompat,
    total_bytes_read: u64,
    largest_body_seen: usize,
}

impl MessageFramer {
    /// Builds a framer with a read buffer of `capacity` bytes, which
    /// must exceed the largest expected message.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self::with_compat(capacity, HeaderCompat::default())
    }

    /// Builds a framer with an explicit header matching mode.
    #[must_use]
    pub fn with_compat(capacity: usize, compat: HeaderCompat) -> Self {
        Self {
            buffer: vec![0u8; capacity].into_boxed_slice(),
            pending_start: 0,
            pending_len: 0,
            processor: None,
            compat,
            total_bytes_read: 0,
            largest_body_seen: 0,
        }
    }

    /// Installs the callback receiving each complete `(header, body)`
    /// pair. The slices are valid only for the duration of the call.
    ///
    /// The header slice spans up to and including the blank line, so a
    /// processor may inspect header fields beyond `Content-Length`.
    pub fn set_processor<P>(&mut self, processor: P)
    where
        P: FnMut(&[u8], &[u8]) + 'static,
    {
        self.processor = Some(Box::new(processor));
    }

    /// Total bytes obtained from read functions so far.
    #[must_use]
    pub fn total_bytes_read(&self) -> u64 {
        self.total_bytes_read
    }

    /// Size of the largest message body emitted so far.
    #[must_use]
    pub fn largest_body_seen(&self) -> usize {
        self.largest_body_seen
    }

    /// Calls `read_fn` exactly once, then emits every complete message
    /// the buffer now contains to the processor.
    ///
    /// `read_fn` follows the `read(2)` contract mapped onto
    /// [`io::Result`]: `Ok(n)` with `n > 0` delivers bytes, `Ok(0)` is
    /// end-of-stream, `Err` is a read failure. Partial data is retained
    /// for the next pull.
    ///
    /// # Errors
    ///
    /// - [`FramerError::ProcessorMissing`] when no processor is installed.
    /// - [`FramerError::Eof`] on a clean end-of-stream.
    /// - [`FramerError::TruncatedMessage`] when the stream ends (or
    ///   fails) while a partial message is pending, including the case
    ///   of a message larger than the buffer capacity.
    /// - [`FramerError::MalformedHeader`] when a header block carries no
    ///   parseable `Content-Length`.
    /// - [`FramerError::Read`] when the read fails with nothing pending.
    pub fn pull<R>(&mut self, read_fn: R) -> Result<(), FramerError>
    where
        R: FnOnce(&mut [u8]) -> io::Result<usize>,
    {
        if self.processor.is_none() {
            return Err(FramerError::ProcessorMissing);
        }

        // Compact the retained tail to the front so the read can use the
        // rest of the buffer.
        if self.pending_len > 0 && self.pending_start > 0 {
            self.buffer
                .copy_within(self.pending_start..self.pending_start + self.pending_len, 0);
        }
        self.pending_start = 0;

        let bytes_read = match read_fn(&mut self.buffer[self.pending_len..]) {
            Ok(0) if self.pending_len > 0 => {
                return Err(FramerError::TruncatedMessage {
                    pending: self.pending_len,
                });
            }
            Ok(0) => return Err(FramerError::Eof),
            Ok(count) => count,
            Err(_) if self.pending_len > 0 => {
                return Err(FramerError::TruncatedMessage {
                    pending: self.pending_len,
                });
            }
            Err(error) => return Err(FramerError::Read(error)),
        };
        self.total_bytes_read += bytes_read as u64;

        let total_len = self.pending_len + bytes_read;
        let mut processor = self
            .processor
            .take()
            .expect("presence checked at pull entry");
        let mut cursor = 0usize;
        let mut largest = self.largest_body_seen;
        let mut failure = None;

        while cursor < total_len {
            let data = &self.buffer[cursor..total_len];
            match parse_frame(data, self.compat) {
                FrameParse::NeedMoreData => break,
                FrameParse::BadHeader => {
                    failure = Some(malformed_header(data));
                    break;
                }
                FrameParse::Complete {
                    header_len,
                    body_len,
                } => {
                    let (header, rest) = data.split_at(header_len);
                    processor(header, &rest[..body_len]);
                    largest = largest.max(body_len);
                    cursor += header_len + body_len;
                }
            }
        }

        self.processor = Some(processor);
        self.largest_body_seen = largest;
        self.pending_start = cursor;
        self.pending_len = total_len - cursor;

        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// Parses the front of `data` as one framed message.
fn parse_frame(data: &[u8], compat: HeaderCompat) -> FrameParse {
    let Some(marker) = find_subslice(data, END_HEADER_MARKER) else {
        return FrameParse::NeedMoreData;
    };
    let header_len = marker + END_HEADER_MARKER.len();
    let header_region = &data[..marker];

    let Some(key) = find_content_length(header_region, compat) else {
        return FrameParse::BadHeader;
    };
    let value_start = key + CONTENT_LENGTH_HEADER.len();
    let Some(body_len) = parse_leading_digits(&header_region[value_start..]) else {
        return FrameParse::BadHeader;
    };

    if data.len() < header_len + body_len {
        return FrameParse::NeedMoreData;
    }
    FrameParse::Complete {
        header_len,
        body_len,
    }
}

fn find_content_length(header: &[u8], compat: HeaderCompat) -> Option<usize> {
    match compat {
        HeaderCompat::Strict => find_subslice(header, CONTENT_LENGTH_HEADER),
        HeaderCompat::CaseInsensitive => header
            .windows(CONTENT_LENGTH_HEADER.len())
            .position(|window| window.eq_ignore_ascii_case(CONTENT_LENGTH_HEADER)),
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn parse_leading_digits(value: &[u8]) -> Option<usize> {
    let digits: &[u8] = match value.iter().position(|byte| !byte.is_ascii_digit()) {
        Some(0) => return None,
        Some(end) => &value[..end],
        None if value.is_empty() => return None,
        None => value,
    };
    // The digit run is pure ASCII by construction.
    std::str::from_utf8(digits).ok()?.parse().ok()
}

fn malformed_header(data: &[u8]) -> FramerError {
    let preview_len = data.len().min(HEADER_PREVIEW_LIMIT);
    FramerError::MalformedHeader {
        preview: String::from_utf8_lossy(&data[..preview_len]).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use rstest::rstest;

    use super::*;

    type Captured = Rc<RefCell<Vec<(Vec<u8>, Vec<u8>)>>>;

    fn capturing_framer(capacity: usize) -> (MessageFramer, Captured) {
        capturing_framer_with_compat(capacity, HeaderCompat::Strict)
    }

    fn capturing_framer_with_compat(
        capacity: usize,
        compat: HeaderCompat,
    ) -> (MessageFramer, Captured) {
        let mut framer = MessageFramer::with_compat(capacity, compat);
        let captured: Captured = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&captured);
        framer.set_processor(move |header, body| {
            sink.borrow_mut().push((header.to_vec(), body.to_vec()));
        });
        (framer, captured)
    }

    /// Reader delivering a fixed byte stream in chunks of `chunk` bytes.
    fn chunked_reader(stream: &[u8], chunk: usize) -> impl FnMut(&mut [u8]) -> io::Result<usize> {
        let stream = stream.to_vec();
        let mut offset = 0;
        move |buffer: &mut [u8]| {
            let count = chunk.min(stream.len() - offset).min(buffer.len());
            buffer[..count].copy_from_slice(&stream[offset..offset + count]);
            offset += count;
            Ok(count)
        }
    }

    fn drain<R>(framer: &mut MessageFramer, mut read_fn: R) -> FramerError
    where
        R: FnMut(&mut [u8]) -> io::Result<usize>,
    {
        loop {
            if let Err(error) = framer.pull(&mut read_fn) {
                return error;
            }
        }
    }

    #[rstest]
    fn pull_without_processor_is_a_precondition_failure() {
        let mut framer = MessageFramer::new(64);

        let error = framer
            .pull(|_| Ok(0))
            .expect_err("pull should require a processor");

        assert!(matches!(error, FramerError::ProcessorMissing));
    }

    #[rstest]
    fn extracts_a_single_message() {
        let (mut framer, captured) = capturing_framer(256);

        framer
            .pull(chunked_reader(b"Content-Length: 3\r\n\r\nfoo", 256))
            .expect("complete message should parse");
        let error = framer
            .pull(|_buffer: &mut [u8]| Ok(0))
            .expect_err("second pull should hit end of stream");

        assert!(error.is_clean_eof());
        let messages = captured.borrow();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].0, b"Content-Length: 3\r\n\r\n");
        assert_eq!(messages[0].1, b"foo");
        assert_eq!(framer.total_bytes_read(), 24);
        assert_eq!(framer.largest_body_seen(), 3);
    }

    #[rstest]
    fn reassembles_messages_from_two_byte_reads() {
        let stream = b"Content-Length: 3\r\n\r\nfooContent-Length: 3\r\n\r\nbar";
        let (mut framer, captured) = capturing_framer(256);

        let error = drain(&mut framer, chunked_reader(stream, 2));

        assert!(error.is_clean_eof());
        let messages = captured.borrow();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].1, b"foo");
        assert_eq!(messages[1].1, b"bar");
        assert_eq!(framer.total_bytes_read(), stream.len() as u64);
    }

    #[rstest]
    fn truncated_stream_is_data_loss() {
        let (mut framer, captured) = capturing_framer(256);

        let error = drain(&mut framer, chunked_reader(b"Content-Length: 3\r\n\r\nfo", 256));

        assert!(matches!(error, FramerError::TruncatedMessage { .. }));
        assert!(captured.borrow().is_empty());
    }

    #[rstest]
    fn missing_content_length_is_invalid() {
        let (mut framer, captured) = capturing_framer(256);

        let error = framer
            .pull(chunked_reader(b"not-content-length: 3\r\n\r\nfoo", 256))
            .expect_err("corrupt header should be rejected");

        assert!(error.to_string().contains("header"));
        assert!(matches!(error, FramerError::MalformedHeader { .. }));
        assert!(captured.borrow().is_empty());
    }

    #[rstest]
    fn non_numeric_content_length_is_invalid() {
        let (mut framer, _captured) = capturing_framer(256);

        let error = framer
            .pull(chunked_reader(b"Content-Length: many\r\n\r\nfoo", 256))
            .expect_err("corrupt length should be rejected");

        assert!(matches!(error, FramerError::MalformedHeader { .. }));
    }

    #[rstest]
    fn header_preview_is_capped() {
        let mut stream = vec![b'x'; 600];
        stream.extend_from_slice(b"\r\n\r\n");
        let (mut framer, _captured) = capturing_framer(1024);

        let error = framer
            .pull(chunked_reader(&stream, 1024))
            .expect_err("corrupt header should be rejected");

        let FramerError::MalformedHeader { preview } = error else {
            panic!("expected a malformed header error");
        };
        assert_eq!(preview.len(), 256);
    }

    #[rstest]
    fn extra_header_fields_reach_the_processor() {
        let stream = b"Content-Length: 2\r\nX-Custom: yes\r\n\r\nok";
        let (mut framer, captured) = capturing_framer(256);

        framer
            .pull(chunked_reader(stream, 256))
            .expect("message with extra headers should parse");

        let messages = captured.borrow();
        assert_eq!(messages[0].0, b"Content-Length: 2\r\nX-Custom: yes\r\n\r\n");
        assert_eq!(messages[0].1, b"ok");
    }

    #[rstest]
    fn strict_mode_rejects_lowercase_header() {
        let (mut framer, _captured) = capturing_framer(256);

        let error = framer
            .pull(chunked_reader(b"content-length: 2\r\n\r\nok", 256))
            .expect_err("strict matching should reject lowercase");

        assert!(matches!(error, FramerError::MalformedHeader { .. }));
    }

    #[rstest]
    fn compat_mode_accepts_lowercase_header() {
        let (mut framer, captured) =
            capturing_framer_with_compat(256, HeaderCompat::CaseInsensitive);

        framer
            .pull(chunked_reader(b"content-length: 2\r\n\r\nok", 256))
            .expect("compat matching should accept lowercase");

        assert_eq!(captured.borrow()[0].1, b"ok");
    }

    #[rstest]
    fn oversized_message_surfaces_as_truncation() {
        // Capacity cannot hold the promised body, so the buffer fills and
        // the next read is offered no space.
        let (mut framer, captured) = capturing_framer(32);

        let error = drain(
            &mut framer,
            chunked_reader(b"Content-Length: 64\r\n\r\n0123456789", 32),
        );

        assert!(matches!(error, FramerError::TruncatedMessage { .. }));
        assert!(captured.borrow().is_empty());
    }

    #[rstest]
    fn read_error_with_pending_bytes_is_data_loss() {
        let (mut framer, _captured) = capturing_framer(256);

        framer
            .pull(chunked_reader(b"Content-Length: 9\r\n\r\npart", 256))
            .expect("partial message should be retained");
        let error = framer
            .pull(|_buffer: &mut [u8]| Err(io::Error::other("boom")))
            .expect_err("failed read should surface");

        assert!(matches!(
            error,
            FramerError::TruncatedMessage { pending: 25 }
        ));
    }

    #[rstest]
    fn read_error_without_pending_bytes_is_a_read_failure() {
        let (mut framer, _captured) = capturing_framer(256);

        let error = framer
            .pull(|_buffer: &mut [u8]| Err(io::Error::other("boom")))
            .expect_err("failed read should surface");

        assert!(matches!(error, FramerError::Read(_)));
    }
}
