use once_cell::sync::Lazy;
use std::sync::{Mutex, PoisonError};
use tracing::trace;

use crate::errors::SearchResult;

/// Number of prefix bytes sniffed per file.
pub const PREFIX_SNIFF_SIZE: usize = 4096;

/// Maps a file prefix to a MIME type string.
///
/// Implementations may be path-based (like the default) or content-based
/// (libmagic-style). `None` means the classifier could not name a type and
/// is treated as non-text.
pub trait MimeClassifier: Send {
    fn classify(&mut self, identifier: &str, prefix: &[u8]) -> Option<String>;
}

/// Builds one classifier handle per worker.
///
/// Construction is serialized process-wide because some classifier libraries
/// mutate global state while loading their databases. Once built, a handle
/// belongs to a single worker and is dropped when that worker exits.
pub trait ClassifierFactory: Send + Sync {
    fn create(&self) -> SearchResult<Box<dyn MimeClassifier>>;
}

static CLASSIFIER_INIT_GATE: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

pub(crate) fn build_classifier(
    factory: &dyn ClassifierFactory,
) -> SearchResult<Box<dyn MimeClassifier>> {
    let _guard = CLASSIFIER_INIT_GATE
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    factory.create()
}

/// Default classifier: guesses from the identifier's file extension.
#[derive(Debug, Default)]
pub struct MimeGuessClassifier;

impl MimeClassifier for MimeGuessClassifier {
    fn classify(&mut self, identifier: &str, _prefix: &[u8]) -> Option<String> {
        mime_guess::from_path(identifier)
            .first()
            .map(|mime| mime.essence_str().to_string())
    }
}

#[derive(Debug, Default)]
pub struct MimeGuessFactory;

impl ClassifierFactory for MimeGuessFactory {
    fn create(&self) -> SearchResult<Box<dyn MimeClassifier>> {
        Ok(Box::new(MimeGuessClassifier))
    }
}

/// Checks if a file prefix is likely to be binary.
///
/// Fast path: a run of two consecutive NUL bytes together with more than two
/// NULs overall marks the file binary without consulting the classifier.
/// Otherwise the classifier decides: binary unless the MIME type starts with
/// `text/`.
pub(crate) fn is_likely_binary(
    prefix: &[u8],
    identifier: &str,
    classifier: &mut dyn MimeClassifier,
) -> bool {
    let mut nul_count = 0usize;
    let mut consecutive_nuls = false;
    let mut previous_was_nul = false;
    for &byte in prefix {
        if byte == 0 {
            nul_count += 1;
            if previous_was_nul {
                consecutive_nuls = true;
            }
            previous_was_nul = true;
        } else {
            previous_was_nul = false;
        }
    }
    if consecutive_nuls && nul_count > 2 {
        trace!("{}: binary by NUL run", identifier);
        return true;
    }

    match classifier.classify(identifier, prefix) {
        Some(mime) => !mime.starts_with("text/"),
        None => true,
    }
}
