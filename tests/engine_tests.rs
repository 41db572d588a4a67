use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tempfile::tempdir;

use linescout::{
    ClassifierFactory, CompiledPattern, DataSource, FileListProvider, MimeClassifier,
    PatternOptions, ProgressSnapshot, SearchCoordinator, SearchError, SearchEvent, SearchMatch,
    SearchObserver, SearchSettings, SourceIter, SourceProvider, SourceStream, GENERAL_ERROR_ID,
    MAX_FILE_SIZE,
};

// ---------------------------------------------------------------------------
// Test fixtures
// ---------------------------------------------------------------------------

/// Lightweight copy of each observed event, safe to clone and inspect.
#[derive(Debug, Clone)]
enum Recorded {
    Progress(ProgressSnapshot),
    Matches {
        source_id: String,
        matches: Vec<SearchMatch>,
    },
    Error {
        source_id: String,
        message: String,
    },
    Reset,
    Completed {
        counters: ProgressSnapshot,
        error: Option<String>,
    },
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<Recorded>>,
}

impl Recorder {
    fn take(&self) -> Vec<Recorded> {
        self.events.lock().unwrap().clone()
    }
}

impl SearchObserver for Recorder {
    fn notify(&self, event: &SearchEvent) {
        let recorded = match event {
            SearchEvent::Progress(snapshot) => Recorded::Progress(*snapshot),
            SearchEvent::MatchFound { source_id, matches } => Recorded::Matches {
                source_id: source_id.clone(),
                matches: matches.clone(),
            },
            SearchEvent::Error { source_id, error } => Recorded::Error {
                source_id: source_id.clone(),
                message: error.to_string(),
            },
            SearchEvent::Reset => Recorded::Reset,
            SearchEvent::Completed {
                counters, error, ..
            } => Recorded::Completed {
                counters: *counters,
                error: error.as_ref().map(|e| e.to_string()),
            },
        };
        self.events.lock().unwrap().push(recorded);
    }
}

struct MemoryStream {
    cursor: Cursor<Vec<u8>>,
    reported_len: u64,
}

impl Read for MemoryStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.cursor.read(buf)
    }
}

impl Seek for MemoryStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.cursor.seek(pos)
    }
}

impl SourceStream for MemoryStream {
    fn len(&self) -> io::Result<u64> {
        Ok(self.reported_len)
    }
}

/// In-memory data source, optionally lying about its length to exercise the
/// size gate without materializing huge files.
#[derive(Clone)]
struct MemorySource {
    id: String,
    content: Arc<Vec<u8>>,
    reported_len: Option<u64>,
}

impl MemorySource {
    fn new(id: &str, content: &[u8]) -> Self {
        Self {
            id: id.to_string(),
            content: Arc::new(content.to_vec()),
            reported_len: None,
        }
    }

    fn with_reported_len(id: &str, content: &[u8], len: u64) -> Self {
        Self {
            reported_len: Some(len),
            ..Self::new(id, content)
        }
    }
}

impl DataSource for MemorySource {
    fn identifier(&self) -> &str {
        &self.id
    }

    fn open(&self) -> io::Result<Box<dyn SourceStream>> {
        let reported_len = self.reported_len.unwrap_or(self.content.len() as u64);
        Ok(Box::new(MemoryStream {
            cursor: Cursor::new((*self.content).clone()),
            reported_len,
        }))
    }
}

struct MemoryProvider {
    sources: Vec<MemorySource>,
}

impl MemoryProvider {
    fn new(sources: Vec<MemorySource>) -> Self {
        Self { sources }
    }
}

impl SourceProvider for MemoryProvider {
    fn sources(&self) -> SourceIter<'_> {
        Box::new(
            self.sources
                .iter()
                .cloned()
                .map(|source| Ok(Box::new(source) as Box<dyn DataSource>)),
        )
    }
}

/// Provider whose first enumeration from inside a worker pool fails with an
/// I/O error before yielding anything. The counter probe runs on a plain
/// thread and always sees the clean sequence, so the failure deterministically
/// hits the first scan pass.
struct FlakyProvider {
    sources: Vec<MemorySource>,
    failed: AtomicBool,
}

impl FlakyProvider {
    fn new(sources: Vec<MemorySource>) -> Self {
        Self {
            sources,
            failed: AtomicBool::new(false),
        }
    }
}

impl SourceProvider for FlakyProvider {
    fn sources(&self) -> SourceIter<'_> {
        let mut items: Vec<io::Result<Box<dyn DataSource>>> = Vec::new();
        if rayon::current_thread_index().is_some() && !self.failed.swap(true, Ordering::SeqCst) {
            items.push(Err(io::Error::new(
                io::ErrorKind::Other,
                "walk interrupted",
            )));
        }
        for source in &self.sources {
            items.push(Ok(Box::new(source.clone()) as Box<dyn DataSource>));
        }
        Box::new(items.into_iter())
    }
}

fn settings(context_lines: usize) -> SearchSettings {
    SearchSettings {
        context_lines,
        ..Default::default()
    }
}

fn run_search(
    pattern: &str,
    provider: Arc<dyn SourceProvider>,
    settings: SearchSettings,
) -> Vec<Recorded> {
    let compiled = CompiledPattern::new(pattern, PatternOptions::default()).unwrap();
    let coordinator = SearchCoordinator::new(compiled, provider, settings).unwrap();
    let recorder = Arc::new(Recorder::default());
    coordinator.subscribe(recorder.clone());
    coordinator.begin().unwrap();
    coordinator.wait();
    recorder.take()
}

fn match_events(events: &[Recorded]) -> Vec<(String, Vec<SearchMatch>)> {
    events
        .iter()
        .filter_map(|event| match event {
            Recorded::Matches { source_id, matches } => {
                Some((source_id.clone(), matches.clone()))
            }
            _ => None,
        })
        .collect()
}

fn completions(events: &[Recorded]) -> Vec<(ProgressSnapshot, Option<String>)> {
    events
        .iter()
        .filter_map(|event| match event {
            Recorded::Completed { counters, error } => Some((*counters, error.clone())),
            _ => None,
        })
        .collect()
}

fn write_file(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

// ---------------------------------------------------------------------------
// End-to-end scenarios
// ---------------------------------------------------------------------------

#[test]
fn test_plain_hit_with_one_context_line() {
    let dir = tempdir().unwrap();
    let path = write_file(dir.path(), "a.txt", b"alpha\nbeta\ngamma\n");
    let provider = Arc::new(FileListProvider::new(vec![path.clone()]));

    let events = run_search("beta", provider, settings(1));

    let found = match_events(&events);
    assert_eq!(found.len(), 1);
    let (source_id, matches) = &found[0];
    assert_eq!(source_id, &path.to_string_lossy());
    assert_eq!(
        matches,
        &vec![SearchMatch {
            line_number: 2,
            context: "beta".to_string(),
            match_start: 0,
            match_len: 4,
            context_before: vec!["alpha".to_string()],
            context_after: vec!["gamma".to_string()],
        }]
    );

    let completed = completions(&events);
    assert_eq!(completed.len(), 1);
    let (counters, error) = &completed[0];
    assert_eq!(counters.done, 1);
    assert_eq!(counters.failed, 0);
    assert_eq!(counters.skipped, 0);
    assert!(error.is_none());
}

#[test]
fn test_two_hits_on_one_line_without_context() {
    let provider = Arc::new(MemoryProvider::new(vec![MemorySource::new(
        "mem:line",
        b"foo bar foo",
    )]));

    let events = run_search("foo", provider, settings(0));

    let found = match_events(&events);
    assert_eq!(found.len(), 1);
    let matches = &found[0].1;
    assert_eq!(matches.len(), 2);
    for m in matches {
        assert_eq!(m.line_number, 1);
        assert_eq!(m.match_len, 3);
        assert!(m.context_before.is_empty());
        assert!(m.context_after.is_empty());
    }
    assert_eq!(matches[0].match_start, 0);
    assert_eq!(matches[1].match_start, 8);
}

#[test]
fn test_binary_source_is_skipped() {
    let mut content = vec![0x00, 0x00, b'A', b'B', 0x00, 0x00, 0x00];
    content.extend_from_slice(b"needle hidden in binary\n");
    let provider = Arc::new(MemoryProvider::new(vec![MemorySource::new(
        "mem:blob",
        &content,
    )]));
    let settings = SearchSettings {
        skip_binary_files: true,
        ..Default::default()
    };

    let events = run_search("needle", provider, settings);

    assert!(match_events(&events).is_empty());
    let completed = completions(&events);
    assert_eq!(completed.len(), 1);
    let (counters, _) = &completed[0];
    assert_eq!(counters.skipped, 1);
    assert_eq!(counters.done, 1);
}

#[test]
fn test_oversized_source_is_passed_over_silently() {
    let provider = Arc::new(MemoryProvider::new(vec![MemorySource::with_reported_len(
        "mem:huge",
        b"needle\n",
        MAX_FILE_SIZE + 1,
    )]));

    let events = run_search("needle", provider, settings(0));

    assert!(match_events(&events).is_empty());
    assert!(!events
        .iter()
        .any(|event| matches!(event, Recorded::Error { .. })));
    let (counters, _) = &completions(&events)[0];
    assert_eq!(counters.done, 1);
    assert_eq!(counters.skipped, 0);
}

#[test]
fn test_empty_source_counts_as_done_not_skipped() {
    let provider = Arc::new(MemoryProvider::new(vec![MemorySource::new("mem:empty", b"")]));

    let events = run_search("anything", provider, settings(0));

    assert!(match_events(&events).is_empty());
    let (counters, _) = &completions(&events)[0];
    assert_eq!(counters.done, 1);
    assert_eq!(counters.skipped, 0);
}

#[test]
fn test_match_longer_than_context_budget_is_truncated() {
    let line = "x".repeat(1000);
    let provider = Arc::new(MemoryProvider::new(vec![MemorySource::new(
        "mem:long",
        line.as_bytes(),
    )]));
    let settings = SearchSettings {
        max_context_length: 10,
        ..Default::default()
    };

    let events = run_search("x+", provider, settings);

    let found = match_events(&events);
    let matches = &found[0].1;
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].context, "xxxxxxxxxx");
    assert_eq!(matches[0].match_start, 0);
    assert_eq!(matches[0].match_len, 1000);
}

#[test]
fn test_parallel_walk_failure_falls_back_to_sequential() {
    let sources = vec![
        MemorySource::new("mem:first", b"one needle\n"),
        MemorySource::new("mem:second", b"another needle\n"),
    ];
    let provider = Arc::new(FlakyProvider::new(sources));

    let events = run_search("needle", provider, settings(0));

    let reset_index = events
        .iter()
        .position(|event| matches!(event, Recorded::Reset))
        .expect("reset must fire on fallback");

    let general_error_index = events
        .iter()
        .position(|event| {
            matches!(event, Recorded::Error { source_id, .. } if source_id == GENERAL_ERROR_ID)
        })
        .expect("fallback notice must fire");
    assert!(reset_index < general_error_index);

    // The sequential pass re-delivers results for both sources after Reset.
    let late_matches: Vec<_> = events[reset_index..]
        .iter()
        .filter_map(|event| match event {
            Recorded::Matches { source_id, .. } => Some(source_id.clone()),
            _ => None,
        })
        .collect();
    assert!(late_matches.contains(&"mem:first".to_string()));
    assert!(late_matches.contains(&"mem:second".to_string()));

    let completed = completions(&events);
    assert_eq!(completed.len(), 1, "exactly one completion even after fallback");
    let (counters, error) = &completed[0];
    assert_eq!(counters.done, 2);
    assert_eq!(counters.failed, 0);
    assert!(error.is_none());
}

#[test]
fn test_per_source_failure_does_not_abort_the_run() {
    struct BrokenSource;

    impl DataSource for BrokenSource {
        fn identifier(&self) -> &str {
            "mem:broken"
        }

        fn open(&self) -> io::Result<Box<dyn SourceStream>> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "locked"))
        }
    }

    struct MixedProvider {
        healthy: MemorySource,
    }

    impl SourceProvider for MixedProvider {
        fn sources(&self) -> SourceIter<'_> {
            let items: Vec<io::Result<Box<dyn DataSource>>> = vec![
                Ok(Box::new(BrokenSource)),
                Ok(Box::new(self.healthy.clone())),
            ];
            Box::new(items.into_iter())
        }
    }

    let provider = Arc::new(MixedProvider {
        healthy: MemorySource::new("mem:ok", b"needle\n"),
    });

    let events = run_search("needle", provider, settings(0));

    assert!(events
        .iter()
        .any(|event| matches!(event, Recorded::Error { source_id, .. } if source_id == "mem:broken")));
    assert!(!events.iter().any(|event| matches!(event, Recorded::Reset)));

    let found = match_events(&events);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].0, "mem:ok");

    let (counters, error) = &completions(&events)[0];
    assert_eq!(counters.done, 2);
    assert_eq!(counters.failed, 1);
    assert!(error.is_none());
}

// ---------------------------------------------------------------------------
// Ordering, boundaries, encodings
// ---------------------------------------------------------------------------

#[test]
fn test_matches_arrive_in_line_order_within_a_source() {
    let mut content = String::new();
    for i in 0..50 {
        content.push_str(&format!("line {} with needle\n", i));
    }
    let provider = Arc::new(MemoryProvider::new(vec![MemorySource::new(
        "mem:ordered",
        content.as_bytes(),
    )]));

    let events = run_search("needle", provider, settings(2));

    let found = match_events(&events);
    let matches = &found[0].1;
    assert_eq!(matches.len(), 50);
    let mut previous = 0;
    for m in matches {
        assert!(m.line_number > previous, "line numbers must not decrease");
        previous = m.line_number;
    }

    // With a single source, any progress sample is bounded by it.
    for event in &events {
        if let Recorded::Progress(snapshot) = event {
            assert!(snapshot.done <= 1);
            assert!(snapshot.total <= 1);
        }
    }
}

#[test]
fn test_classifier_failure_is_a_per_source_error() {
    struct BrokenFactory;

    impl ClassifierFactory for BrokenFactory {
        fn create(&self) -> Result<Box<dyn MimeClassifier>, SearchError> {
            Err(SearchError::classifier("magic database unavailable"))
        }
    }

    let provider = Arc::new(MemoryProvider::new(vec![MemorySource::new(
        "mem:plain",
        b"needle\n",
    )]));
    let compiled = CompiledPattern::new("needle", PatternOptions::default()).unwrap();
    let settings = SearchSettings {
        skip_binary_files: true,
        ..Default::default()
    };
    let coordinator = SearchCoordinator::new(compiled, provider, settings)
        .unwrap()
        .with_classifier_factory(Arc::new(BrokenFactory));
    let recorder = Arc::new(Recorder::default());
    coordinator.subscribe(recorder.clone());
    coordinator.begin().unwrap();
    coordinator.wait();

    let events = recorder.take();
    assert!(events.iter().any(|event| matches!(
        event,
        Recorded::Error { source_id, message }
            if source_id == "mem:plain" && message.contains("magic database unavailable")
    )));
    let (counters, error) = &completions(&events)[0];
    assert_eq!(counters.failed, 1);
    assert_eq!(counters.done, 1);
    assert_eq!(counters.skipped, 0);
    assert!(error.is_none());
}

#[test]
fn test_context_window_at_file_boundaries() {
    let content = b"l1\nl2\nl3\nl4\nl5\nl6\n";
    let provider = Arc::new(MemoryProvider::new(vec![MemorySource::new(
        "mem:window",
        content,
    )]));

    let events = run_search("l1", provider.clone(), settings(2));
    let matches = &match_events(&events)[0].1;
    assert!(matches[0].context_before.is_empty());
    assert_eq!(matches[0].context_after, ["l2", "l3"]);

    let events = run_search("l4", provider.clone(), settings(2));
    let matches = &match_events(&events)[0].1;
    assert_eq!(matches[0].line_number, 4);
    assert_eq!(matches[0].context_before, ["l2", "l3"]);
    assert_eq!(matches[0].context_after, ["l5", "l6"]);

    let events = run_search("l6", provider, settings(2));
    let matches = &match_events(&events)[0].1;
    assert_eq!(matches[0].line_number, 6);
    assert_eq!(matches[0].context_before, ["l4", "l5"]);
    assert!(matches[0].context_after.is_empty());
}

#[test]
fn test_mixed_line_terminators() {
    let provider = Arc::new(MemoryProvider::new(vec![MemorySource::new(
        "mem:eol",
        b"one\r\ntwo\rthree\n",
    )]));

    let events = run_search("t", provider, settings(0));

    let matches = &match_events(&events)[0].1;
    let lines: Vec<usize> = matches.iter().map(|m| m.line_number).collect();
    assert_eq!(lines, [2, 3]);
}

#[test]
fn test_utf16_source_is_searched() {
    let mut content = vec![0xFF, 0xFE];
    for unit in "alpha\nbeta\n".encode_utf16() {
        content.extend_from_slice(&unit.to_le_bytes());
    }
    let provider = Arc::new(MemoryProvider::new(vec![MemorySource::new(
        "mem:utf16",
        &content,
    )]));

    let events = run_search("beta", provider, settings(0));

    let matches = &match_events(&events)[0].1;
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].line_number, 2);
    assert_eq!(matches[0].context, "beta");
}

#[test]
fn test_repeated_runs_yield_identical_match_sets() {
    let dir = tempdir().unwrap();
    let a = write_file(dir.path(), "a.txt", b"needle one\nfiller\nneedle two\n");
    let b = write_file(dir.path(), "b.txt", b"nothing here\n");
    let c = write_file(dir.path(), "c.txt", b"needle three\n");

    let collect = || {
        let provider = Arc::new(FileListProvider::new(vec![a.clone(), b.clone(), c.clone()]));
        let mut found = match_events(&run_search("needle", provider, settings(1)));
        found.sort_by(|x, y| x.0.cmp(&y.0));
        found
    };

    assert_eq!(collect(), collect());
}

#[test]
fn test_cancel_completes_without_error() {
    let sources: Vec<MemorySource> = (0..128)
        .map(|i| MemorySource::new(&format!("mem:{}", i), b"some needle text\n"))
        .collect();
    let provider = Arc::new(MemoryProvider::new(sources));
    let compiled = CompiledPattern::new("needle", PatternOptions::default()).unwrap();
    let coordinator = SearchCoordinator::new(compiled, provider, settings(0)).unwrap();
    let recorder = Arc::new(Recorder::default());
    coordinator.subscribe(recorder.clone());

    coordinator.begin().unwrap();
    coordinator.cancel();
    coordinator.cancel();

    let events = recorder.take();
    let completed = completions(&events);
    assert_eq!(completed.len(), 1);
    assert!(completed[0].1.is_none(), "cancellation is not an error");
}
