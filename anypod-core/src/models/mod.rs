mod download;
mod feed;
mod ids;

pub use download::{Download, DownloadStatus};
pub use feed::{Explicit, Feed, PodcastType, SourceType, TranscriptSource};
pub use ids::{DownloadId, FeedId};
