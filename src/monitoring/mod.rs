pub mod journal;
pub mod metrics;
pub mod refresh;

pub use journal::{JournalEntry, SubmissionJournal};
pub use refresh::{RefreshCoordinator, WatchGuard};
