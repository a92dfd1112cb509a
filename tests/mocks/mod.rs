//! Fake implementations of the backend and transport seams
//!
//! Scenario tests drive the real controller, executor and uploader against
//! these, with no network or yt-dlp binary involved.

pub mod fake_extractor;
pub mod fake_relay;

#[allow(unused_imports)]
pub use fake_extractor::{ExtractorCall, FakeExtractor};
#[allow(unused_imports)]
pub use fake_relay::{callback_data, FakeRelay, RelayCall};
