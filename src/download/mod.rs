//! Download management and processing

pub mod error;
pub mod executor;
pub mod formats;
pub mod progress;
pub mod request;
pub mod scratch;
pub mod source;
pub mod thumbnail;
pub mod ytdlp;

// Re-exports for convenience
pub use error::{DownloadError, ExtractionError, ThumbnailError};
pub use executor::{build_caption, DownloadExecutor, DownloadResult, MediaKind};
pub use formats::{resolve, Catalog, FormatDescriptor};
pub use progress::{ChannelSink, NullSink, Phase, ProgressSink, ProgressSnapshot, ProgressTracker};
pub use request::{DownloadRequest, FormatChoice, JobKind};
pub use scratch::{JobDir, ScratchDir};
pub use source::Extractor;
pub use thumbnail::ThumbnailProcessor;
pub use ytdlp::YtDlp;
