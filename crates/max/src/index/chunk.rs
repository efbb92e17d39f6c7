/// Maximum size of a chunk, in characters.
pub const CHUNK_SIZE: usize = 800;

/// How much of the end of a chunk is repeated at the start of the next one,
/// in characters.
pub const CHUNK_OVERLAP: usize = 100;

/// A run of whole lines of a file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Chunk {
    /// 1-based.
    pub start_line: usize,
    /// 1-based, inclusive.
    pub end_line: usize,
    pub text: String,
    /// Lowercased `text`, for matching.
    pub folded: String,
}

/// Splits `text` into chunks of whole lines.
///
/// A chunk ends before the line that would take it past [`CHUNK_SIZE`]; a
/// line longer than that forms a chunk on its own. The next chunk starts with
/// as many trailing lines of the previous one as fit in [`CHUNK_OVERLAP`],
/// and always makes progress. Blank chunks are dropped.
pub(crate) fn split(text: &str) -> Vec<Chunk> {
    let lines: Vec<&str> = text.lines().collect();
    let line_len = |index: usize| lines[index].chars().count() + 1;

    let mut chunks = vec![];
    let mut start = 0;
    while start < lines.len() {
        let mut end = start;
        let mut size = 0;
        while end < lines.len() {
            let len = line_len(end);
            if size > 0 && size + len > CHUNK_SIZE {
                break;
            }
            size += len;
            end += 1;
        }

        let text = lines[start..end].join("\n");
        if !text.trim().is_empty() {
            chunks.push(Chunk {
                start_line: start + 1,
                end_line: end,
                folded: text.to_lowercase(),
                text,
            });
        }
        if end == lines.len() {
            break;
        }

        let mut next = end;
        let mut overlap = 0;
        while next > start + 1 {
            let len = line_len(next - 1);
            if overlap + len > CHUNK_OVERLAP {
                break;
            }
            overlap += len;
            next -= 1;
        }
        start = next;
    }
    chunks
}
