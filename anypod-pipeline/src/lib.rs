pub mod coordinator;
pub mod downloader;
pub mod enqueuer;
pub mod pruner;
pub mod rss;

pub use coordinator::{Coordinator, ManualSubmissionOutcome, PassOutcome, RefreshOutcome};
pub use downloader::{DownloadOutcome, Downloader};
pub use enqueuer::{EnqueueOutcome, Enqueuer};
pub use pruner::{PruneOutcome, Pruner};
pub use rss::render_feed_xml;
