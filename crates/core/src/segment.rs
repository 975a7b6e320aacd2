//! Splitting long text into message-sized pieces.

/// Splits `content` into pieces of at most `limit` characters.
///
/// Pieces are cut from the end backwards, so every piece but the first is
/// exactly `limit` characters long and the tail of the text (where the
/// mention lives) is never split. Concatenating the pieces in order gives
/// back `content`. A `limit` of zero or empty content yields no pieces.
#[must_use]
pub fn reverse_segment(content: &str, limit: usize) -> Vec<String> {
    if limit == 0 || content.is_empty() {
        return Vec::new();
    }

    let mut bounds: Vec<usize> = content.char_indices().map(|(i, _)| i).collect();
    bounds.push(content.len());
    let chars = bounds.len() - 1;

    let head = match chars % limit {
        0 => limit,
        rest => rest,
    };

    let mut chunks = Vec::with_capacity(chars.div_ceil(limit));
    let mut start = 0;
    let mut end = head;
    loop {
        chunks.push(content[bounds[start]..bounds[end]].to_string());
        if end == chars {
            break;
        }
        start = end;
        end += limit;
    }
    chunks
}
