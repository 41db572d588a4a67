use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;
use tracing::{trace, warn};

use super::binary::{build_classifier, is_likely_binary, MimeClassifier};
use super::context::ContextExtractor;
use super::reader::LineReader;
use super::EngineInner;
use crate::buffer::CircularLineBuffer;
use crate::errors::{SearchError, SearchResult};
use crate::events::SearchEvent;
use crate::pattern::CompiledPattern;
use crate::results::SearchMatch;
use crate::source::DataSource;

/// Sources longer than this are passed over without reading.
pub const MAX_FILE_SIZE: u64 = 256 * 1024 * 1024;

enum ScanOutcome {
    Completed(Vec<SearchMatch>),
    SkippedBinary,
    Cancelled,
}

/// Per-worker scanning state: a pattern clone and a lazily built classifier
/// handle, reused across every source the worker is handed and dropped when
/// the worker exits.
pub(crate) struct FileScanner {
    engine: Arc<EngineInner>,
    pattern: CompiledPattern,
    classifier: Option<Box<dyn MimeClassifier>>,
    extractor: ContextExtractor,
}

impl FileScanner {
    pub(crate) fn new(engine: Arc<EngineInner>) -> Self {
        let pattern = engine.pattern.clone();
        let extractor = ContextExtractor::new(
            engine.settings.context_lines,
            engine.settings.max_context_length,
        );
        Self {
            engine,
            pattern,
            classifier: None,
            extractor,
        }
    }

    /// Scans one source, routing the outcome into counters and events.
    /// Failures never escape; cancellation unwinds silently.
    pub(crate) fn scan_source(&mut self, source: &dyn DataSource) {
        match self.scan_inner(source) {
            Ok(ScanOutcome::Completed(matches)) => {
                if !matches.is_empty() {
                    self.engine.counters.record_matched_file();
                    self.engine.emit(&SearchEvent::MatchFound {
                        source_id: source.identifier().to_string(),
                        matches,
                    });
                }
                self.engine.counters.record_done();
            }
            Ok(ScanOutcome::SkippedBinary) => {
                trace!("{}: skipped as binary", source.identifier());
                self.engine.counters.record_skipped();
                self.engine.counters.record_done();
            }
            Ok(ScanOutcome::Cancelled) => {}
            Err(error) => {
                warn!("{}: scan failed: {}", source.identifier(), error);
                self.engine.counters.record_failed();
                self.engine.emit(&SearchEvent::Error {
                    source_id: source.identifier().to_string(),
                    error,
                });
                self.engine.counters.record_done();
            }
        }
    }

    fn scan_inner(&mut self, source: &dyn DataSource) -> SearchResult<ScanOutcome> {
        let engine = Arc::clone(&self.engine);

        let mut stream = source.open().map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => SearchError::source_not_found(source.identifier()),
            io::ErrorKind::PermissionDenied => SearchError::access_denied(source.identifier()),
            _ => SearchError::Io(e),
        })?;

        let length = stream.len()?;
        if length == 0 || length > MAX_FILE_SIZE {
            trace!("{}: passed over, length {}", source.identifier(), length);
            return Ok(ScanOutcome::Completed(Vec::new()));
        }

        if engine.cancel.is_cancelled() {
            return Ok(ScanOutcome::Cancelled);
        }

        {
            let mut prefix = engine.buffers.rent();
            let sniffed = read_prefix(&mut stream, &mut prefix)?;
            if engine.settings.skip_binary_files {
                let classifier = self.classifier_handle()?;
                if is_likely_binary(&prefix[..sniffed], source.identifier(), classifier) {
                    return Ok(ScanOutcome::SkippedBinary);
                }
            }
        }
        stream.seek(SeekFrom::Start(0))?;

        let context_lines = engine.settings.context_lines;
        let capacity = 2 * context_lines + 1;
        let mut reader = LineReader::new(stream);
        let mut window = CircularLineBuffer::with_capacity(capacity);
        for _ in 0..context_lines {
            window.push_back(None);
        }

        // Prime the window so the current-line slot is populated, padding
        // with nulls when the file is shorter than the window.
        let mut read_line_count = 0usize;
        let mut primed = 0usize;
        while primed < context_lines + 1 {
            match reader.next_line()? {
                Some(line) => {
                    read_line_count += 1;
                    primed += 1;
                    window.push_back(Some(line));
                }
                None => break,
            }
        }
        let mut post_match_lines = primed.saturating_sub(1);
        for _ in primed..context_lines + 1 {
            window.push_back(None);
        }

        let mut matches = Vec::new();
        loop {
            {
                let current = match window.get(context_lines) {
                    Some(line) => line,
                    None => break,
                };
                let line_number = read_line_count - post_match_lines;
                for (start, end) in self.pattern.find_matches(current) {
                    matches.push(
                        self.extractor
                            .extract(current, start, end, &window, line_number),
                    );
                }
            }

            if engine.cancel.is_cancelled() {
                return Ok(ScanOutcome::Cancelled);
            }
            let next = reader.next_line()?;
            match next {
                Some(_) => read_line_count += 1,
                None => {
                    if post_match_lines > 0 {
                        post_match_lines -= 1;
                    }
                }
            }
            window.push_back(next);
        }

        Ok(ScanOutcome::Completed(matches))
    }

    fn classifier_handle(&mut self) -> SearchResult<&mut dyn MimeClassifier> {
        match self.classifier {
            Some(ref mut handle) => Ok(handle.as_mut()),
            None => {
                let handle = build_classifier(self.engine.classifier_factory.as_ref())?;
                Ok(self.classifier.insert(handle).as_mut())
            }
        }
    }
}

fn read_prefix(stream: &mut dyn Read, buffer: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        let read = stream.read(&mut buffer[filled..])?;
        if read == 0 {
            break;
        }
        filled += read;
    }
    Ok(filled)
}
