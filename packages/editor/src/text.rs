//! UTF-16 offset helpers
//!
//! Selection offsets inside text nodes count UTF-16 code units, so they line
//! up with what a browser-like host reports. Content is stored as `String`;
//! these helpers translate between the two.

/// Length of `text` in UTF-16 code units
pub fn utf16_len(text: &str) -> usize {
    text.chars().map(char::len_utf16).sum()
}

/// Byte index for a UTF-16 offset, clamped to the end of `text`.
/// An offset landing inside a surrogate pair rounds down to the char start.
pub fn byte_index(text: &str, offset: usize) -> usize {
    let mut units = 0;
    for (index, ch) in text.char_indices() {
        let next = units + ch.len_utf16();
        if next > offset {
            return index;
        }
        units = next;
    }
    text.len()
}

/// UTF-16 offset for a byte index (which must be a char boundary)
pub fn utf16_offset(text: &str, byte_index: usize) -> usize {
    utf16_len(&text[..byte_index.min(text.len())])
}

/// Split `text` at the given ascending UTF-16 offsets. Offsets of zero, at or
/// beyond the end, or repeated are ignored, so no empty pieces are produced
/// except for an empty input.
pub fn split_utf16<'a>(text: &'a str, offsets: &[usize]) -> Vec<&'a str> {
    let mut bytes: Vec<usize> = offsets
        .iter()
        .map(|&offset| byte_index(text, offset))
        .filter(|&index| index > 0 && index < text.len())
        .collect();
    bytes.sort_unstable();
    bytes.dedup();

    let mut pieces = Vec::with_capacity(bytes.len() + 1);
    let mut start = 0;
    for index in bytes {
        pieces.push(&text[start..index]);
        start = index;
    }
    pieces.push(&text[start..]);
    pieces
}

/// Replace `delete` UTF-16 units at `offset` with `insert`
pub fn splice_utf16(text: &str, offset: usize, delete: usize, insert: &str) -> String {
    let start = byte_index(text, offset);
    let end = byte_index(text, offset.saturating_add(delete)).max(start);
    let mut result = String::with_capacity(text.len() + insert.len());
    result.push_str(&text[..start]);
    result.push_str(insert);
    result.push_str(&text[end..]);
    result
}
