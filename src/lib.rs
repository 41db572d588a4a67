pub mod buffer;
pub mod config;
pub mod errors;
pub mod events;
pub mod pattern;
pub mod progress;
pub mod results;
pub mod search;
pub mod source;

// Re-export commonly used types
pub use buffer::CircularLineBuffer;
pub use config::SearchSettings;
pub use errors::{SearchError, SearchResult};
pub use events::{SearchEvent, SearchObserver, GENERAL_ERROR_ID};
pub use pattern::{CompiledPattern, PatternOptions};
pub use progress::ProgressSnapshot;
pub use results::SearchMatch;
pub use search::binary::{ClassifierFactory, MimeClassifier, MimeGuessClassifier, MimeGuessFactory};
pub use search::{SearchCoordinator, MAX_FILE_SIZE};
pub use source::{DataSource, FileListProvider, FileSource, SourceIter, SourceProvider, SourceStream};
