use crate::buffer::CircularLineBuffer;
use crate::results::SearchMatch;

/// Builds bounded match records from a matched line and its line window.
///
/// All arithmetic runs in characters; the byte offsets coming from the regex
/// engine are converted first so that slicing stays on boundaries.
pub(crate) struct ContextExtractor {
    context_lines: usize,
    max_context_length: usize,
}

impl ContextExtractor {
    pub(crate) fn new(context_lines: usize, max_context_length: usize) -> Self {
        Self {
            context_lines,
            max_context_length,
        }
    }

    /// Produces the match record for one regex hit.
    ///
    /// `match_start..match_end` is the byte span within `line`; `window` is
    /// the full line ring with `line` in its middle slot; `line_number` is
    /// 1-based.
    pub(crate) fn extract(
        &self,
        line: &str,
        match_start: usize,
        match_end: usize,
        window: &CircularLineBuffer,
        line_number: usize,
    ) -> SearchMatch {
        let char_offsets: Vec<usize> = line.char_indices().map(|(offset, _)| offset).collect();
        let total_chars = char_offsets.len();
        let byte_at = |char_index: usize| {
            if char_index == total_chars {
                line.len()
            } else {
                char_offsets[char_index]
            }
        };
        let char_at = |byte_offset: usize| {
            char_offsets
                .binary_search(&byte_offset)
                .unwrap_or_else(|insertion| insertion)
        };

        let start_char = char_at(match_start);
        let end_char = if match_end == line.len() {
            total_chars
        } else {
            char_at(match_end)
        };
        let match_chars = end_char - start_char;

        let (context, adjusted_start) = if match_chars >= self.max_context_length {
            // The match alone fills the budget: keep its truncated prefix.
            let cut = start_char + self.max_context_length;
            (line[byte_at(start_char)..byte_at(cut)].to_string(), 0)
        } else {
            let mut remaining = self.max_context_length - match_chars;
            let mut window_start = start_char;
            let mut window_end = end_char;

            // Grow the tail by half the budget, then the head by whatever is
            // left, then hand unused head budget back to the tail.
            let grow = (remaining / 2).min(total_chars - window_end);
            window_end += grow;
            remaining -= grow;
            let grow = remaining.min(window_start);
            window_start -= grow;
            remaining -= grow;
            if remaining > 0 {
                window_end += remaining.min(total_chars - window_end);
            }

            if window_start == 0 && window_end == total_chars {
                (line.to_string(), start_char)
            } else {
                (
                    line[byte_at(window_start)..byte_at(window_end)].to_string(),
                    start_char - window_start,
                )
            }
        };

        SearchMatch {
            line_number,
            context,
            match_start: adjusted_start,
            match_len: match_chars,
            context_before: self.collect_lines(window, 0, self.context_lines),
            context_after: self.collect_lines(window, self.context_lines + 1, window.capacity()),
        }
    }

    fn collect_lines(
        &self,
        window: &CircularLineBuffer,
        from: usize,
        to: usize,
    ) -> Vec<String> {
        let mut lines = Vec::new();
        for index in from..to {
            if let Some(text) = window.get(index) {
                lines.push(truncate_chars(text, self.max_context_length));
            }
        }
        lines
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((offset, _)) => text[..offset].to_string(),
        None => text.to_string(),
    }
}
