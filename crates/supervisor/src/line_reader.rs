// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pure helpers for turning a child process's raw byte stream into
//! UTF-8 lines, with long-line splitting and invalid-byte replacement.

/// Replace invalid UTF-8 byte sequences with U+FFFD, matching
/// `String::from_utf8_lossy` semantics exactly (this wraps it, it exists
/// to give the substitution a name at call sites).
pub fn to_utf8_lossy(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

/// Split one logical line into chunks no larger than `max_line_bytes`.
/// Chunks always break on a UTF-8 char boundary. Every chunk but the last
/// gets a trailing continuation marker so a reader can tell the line was
/// split rather than naturally ending there.
pub fn split_into_chunks(content: &str, max_line_bytes: usize) -> Vec<String> {
    if max_line_bytes == 0 || content.len() <= max_line_bytes {
        return vec![content.to_string()];
    }
    let mut chunks = Vec::new();
    let bytes = content.as_bytes();
    let mut start = 0;
    while start < bytes.len() {
        let mut end = (start + max_line_bytes).min(bytes.len());
        while end > start && !content.is_char_boundary(end) {
            end -= 1;
        }
        if end == start {
            end = (start + max_line_bytes).min(bytes.len());
        }
        chunks.push(content[start..end].to_string());
        start = end;
    }
    let last = chunks.len() - 1;
    for chunk in &mut chunks[..last] {
        chunk.push_str(" \\");
    }
    chunks
}
