/// A single match found in a data source.
///
/// Offsets and lengths are counted in characters, not bytes: `context` may be
/// sliced at arbitrary positions of multi-byte text, and consumers index it
/// for highlighting with `match_start`/`match_len`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchMatch {
    /// 1-based line number of the matched line.
    pub line_number: usize,
    /// The matched line, windowed around the match and bounded by the
    /// configured maximum context length.
    pub context: String,
    /// Character offset of the match within `context`.
    pub match_start: usize,
    /// Character length of the match. When the match itself is longer than
    /// the context bound, `context` holds its truncated prefix and this keeps
    /// the full span length.
    pub match_len: usize,
    /// Lines preceding the matched line, oldest first.
    pub context_before: Vec<String>,
    /// Lines following the matched line, nearest first.
    pub context_after: Vec<String>,
}
