//! A single line-addressed document buffer.

use girder_config::PositionEncoding;
use lsp_types::TextDocumentContentChangeEvent;

/// One open document, stored as a vector of owned lines.
///
/// Every line except possibly the last ends with `\n`. A document whose
/// text ended with `\n` has no trailing empty line; one without a final
/// `\n` leaves its last line unterminated. Carriage returns are ordinary
/// line bytes: splitting happens on `\n` alone, so CRLF round-trips
/// byte-identically.
#[derive(Debug)]
pub struct Document {
    lines: Vec<String>,
    document_length: usize,
    edit_count: u64,
    last_global_version: u64,
    encoding: PositionEncoding,
}

impl Document {
    /// Builds a document from its initial text using byte-offset
    /// position columns.
    #[must_use]
    pub fn new(initial_text: &str) -> Self {
        Self::with_encoding(initial_text, PositionEncoding::default())
    }

    /// Builds a document with an explicit position column unit.
    #[must_use]
    pub fn with_encoding(initial_text: &str, encoding: PositionEncoding) -> Self {
        let mut document = Self {
            lines: Vec::new(),
            document_length: 0,
            edit_count: 0,
            last_global_version: 0,
            encoding,
        };
        document.replace_document(initial_text);
        document
    }

    /// Number of lines currently held.
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Length of the document in bytes.
    #[must_use]
    pub fn document_length(&self) -> usize {
        self.document_length
    }

    /// Number of accepted edits since the document was opened.
    #[must_use]
    pub fn edit_count(&self) -> u64 {
        self.edit_count
    }

    /// Collection-wide version stamped at the last mutation.
    #[must_use]
    pub fn last_global_version(&self) -> u64 {
        self.last_global_version
    }

    /// Hands a flat view of the whole document to `processor`.
    ///
    /// The view is assembled once in O(document length) and is valid
    /// only for the duration of the call.
    pub fn request_content<R>(&self, processor: impl FnOnce(&str) -> R) -> R {
        let mut flat = String::with_capacity(self.document_length);
        for line in &self.lines {
            flat.push_str(line);
        }
        processor(&flat)
    }

    /// Hands the `line`-th line (including its trailing `\n`, if any) to
    /// `processor`, or an empty string when out of range.
    pub fn request_line<R>(&self, line: usize, processor: impl FnOnce(&str) -> R) -> R {
        processor(self.lines.get(line).map_or("", String::as_str))
    }

    /// Applies one content change, returning whether it was accepted.
    ///
    /// A change without a range replaces the whole document. Ranged
    /// changes follow the text-sync semantics: the end column clamps to
    /// the end of its line, a start column past the end of its line is
    /// rejected, and an end line one past the last line extends the
    /// document by a single empty line first. Rejected changes leave the
    /// document untouched and do not advance [`Self::edit_count`].
    pub fn apply_change(&mut self, change: &TextDocumentContentChangeEvent) -> bool {
        let Some(range) = change.range else {
            self.replace_document(&change.text);
            self.edit_count += 1;
            return true;
        };

        if (range.end.line, range.end.character) < (range.start.line, range.start.character) {
            return false;
        }
        let start_line = range.start.line as usize;
        let end_line = range.end.line as usize;
        let pre_extended = end_line == self.lines.len();
        if pre_extended {
            // Edits are allowed to address the position just past the
            // last line.
            self.lines.push(String::new());
        }
        if start_line > end_line || end_line >= self.lines.len() {
            if pre_extended {
                self.lines.pop();
            }
            return false;
        }

        let accepted = if start_line == end_line && !change.text.contains('\n') {
            self.edit_single_line(start_line, range.start.character, range.end.character, &change.text)
        } else {
            self.edit_multi_line(start_line, end_line, range.start.character, range.end.character, &change.text)
        };
        if accepted {
            self.edit_count += 1;
        } else if pre_extended {
            self.lines.pop();
        }
        accepted
    }

    /// Applies a sequence of changes in order; rejected changes do not
    /// abort the sequence.
    pub fn apply_changes(&mut self, changes: &[TextDocumentContentChangeEvent]) {
        for change in changes {
            self.apply_change(change);
        }
    }

    pub(crate) fn stamp_global_version(&mut self, version: u64) {
        self.last_global_version = version;
    }

    fn replace_document(&mut self, content: &str) {
        self.document_length = content.len();
        self.lines = generate_lines(content);
    }

    /// In-place edit of one line where the replacement text contains no
    /// newline.
    fn edit_single_line(&mut self, index: usize, start_col: u32, end_col: u32, text: &str) -> bool {
        let (start, end) = {
            let line = self.lines[index].as_str();
            // The addressable content excludes the line terminator.
            let content_end = line.len() - usize::from(line.ends_with('\n'));
            let content = &line[..content_end];
            let Some(start) = column_to_byte(content, start_col, self.encoding) else {
                return false;
            };
            let Some(end) = column_to_byte_clamped(content, end_col, self.encoding) else {
                return false;
            };
            if end < start {
                return false;
            }
            (start, end)
        };

        let line = &mut self.lines[index];
        let old_len = line.len();
        line.replace_range(start..end, text);
        self.document_length = self.document_length - old_len + line.len();
        true
    }

    /// Splices a range spanning lines (or inserting newlines) by
    /// re-line-ifying prefix + text + suffix.
    fn edit_multi_line(
        &mut self,
        start_line: usize,
        end_line: usize,
        start_col: u32,
        end_col: u32,
        text: &str,
    ) -> bool {
        let first = self.lines[start_line].as_str();
        let last = self.lines[end_line].as_str();
        let Some(start) = column_to_byte(first, start_col, self.encoding) else {
            return false;
        };
        let Some(end) = column_to_byte_clamped(last, end_col, self.encoding) else {
            return false;
        };

        let composite = [&first[..start], text, &last[end..]].concat();
        let removed: usize = self.lines[start_line..=end_line]
            .iter()
            .map(|line| line.len())
            .sum();
        let replacement = generate_lines(&composite);
        self.lines.splice(start_line..=end_line, replacement);
        self.document_length = self.document_length - removed + composite.len();
        true
    }
}

/// Splits `content` into owned lines, each ending in `\n` except
/// possibly the last.
fn generate_lines(content: &str) -> Vec<String> {
    if content.is_empty() {
        return Vec::new();
    }
    let mut lines: Vec<String> = content
        .split('\n')
        .map(|piece| {
            let mut line = String::with_capacity(piece.len() + 1);
            line.push_str(piece);
            line.push('\n');
            line
        })
        .collect();

    // Represent trailing-newline and unterminated files correctly: the
    // split produced one synthetic piece too many or one `\n` too many.
    if content.ends_with('\n') {
        lines.pop();
    } else if let Some(last) = lines.last_mut() {
        last.pop();
    }
    lines
}

/// Translates a position column into a byte offset within `content`.
///
/// Returns `None` when the column lies past the end of the content or
/// does not land on a character boundary.
fn column_to_byte(content: &str, column: u32, encoding: PositionEncoding) -> Option<usize> {
    match encoding {
        PositionEncoding::Utf8ByteOffset => {
            let offset = column as usize;
            (offset <= content.len() && content.is_char_boundary(offset)).then_some(offset)
        }
        PositionEncoding::Utf16CodeUnit => {
            let target = column as usize;
            let mut units = 0usize;
            for (byte_index, character) in content.char_indices() {
                if units == target {
                    return Some(byte_index);
                }
                if units > target {
                    // The column points inside a surrogate pair.
                    return None;
                }
                units += character.len_utf16();
            }
            (units == target).then_some(content.len())
        }
    }
}

/// As [`column_to_byte`], but columns past the end clamp to the end.
fn column_to_byte_clamped(
    content: &str,
    column: u32,
    encoding: PositionEncoding,
) -> Option<usize> {
    match encoding {
        PositionEncoding::Utf8ByteOffset => {
            let offset = (column as usize).min(content.len());
            content.is_char_boundary(offset).then_some(offset)
        }
        PositionEncoding::Utf16CodeUnit => {
            column_to_byte(content, column, encoding).or_else(|| {
                let total: usize = content.chars().map(char::len_utf16).sum();
                (column as usize >= total).then_some(content.len())
            })
        }
    }
}
